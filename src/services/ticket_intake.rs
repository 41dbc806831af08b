use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::database::models::NewTicket;
use crate::database::{DatabaseError, HelpdeskStore};
use crate::services::ticket_number::{TicketNumberSource, TimestampNumbers};

/// Longest subject stored in the custom-data table
pub const MAX_SUBJECT_CHARS: usize = 255;

/// Attempts made when a generated number collides with an existing ticket
const NUMBER_ATTEMPTS: u32 = 3;

/// Ticket writes that exist as endpoints but are not implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketWrite {
    Update,
    Reply,
    Note,
    LegacyCreate,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Help topic is required")]
    MissingTopic,

    #[error("Subject is required")]
    BlankSubject,

    #[error("Message is required")]
    BlankMessage,

    #[error("Only users can create tickets")]
    NotEndUser,

    #[error("Invalid help topic")]
    InvalidTopic,

    #[error("Unable to find default ticket status")]
    NoDefaultStatus,

    #[error("Write operations not yet implemented")]
    NotYetSupported(TicketWrite),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Body of a create-ticket request. Every field is optional on the wire so
/// missing values surface as validation errors rather than decode failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub topic_id: Option<Value>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CreateTicketRequest {
    /// Numbers and numeric strings are accepted. Absent, null, zero and empty
    /// values mean no topic was chosen; anything else cannot name a topic.
    fn topic(&self) -> Result<i64, IntakeError> {
        match &self.topic_id {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Err(IntakeError::MissingTopic),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => Err(IntakeError::MissingTopic),
                Some(id) => Ok(id),
                None => Err(IntakeError::InvalidTopic),
            },
            Some(Value::String(s)) if s.is_empty() => Err(IntakeError::MissingTopic),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| IntakeError::InvalidTopic),
            Some(_) => Err(IntakeError::InvalidTopic),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedTicket {
    pub ticket_id: i64,
    pub number: String,
    pub subject: String,
    pub status: &'static str,
    pub department: Option<String>,
    pub created: NaiveDateTime,
}

/// Creates tickets on behalf of end users.
pub struct TicketIntake {
    store: Arc<dyn HelpdeskStore>,
    numbers: Arc<dyn TicketNumberSource>,
}

impl TicketIntake {
    pub fn new(store: Arc<dyn HelpdeskStore>) -> Self {
        Self::with_numbers(store, Arc::new(TimestampNumbers))
    }

    pub fn with_numbers(store: Arc<dyn HelpdeskStore>, numbers: Arc<dyn TicketNumberSource>) -> Self {
        Self { store, numbers }
    }

    /// Only end users get past the first check. Then validate, resolve topic
    /// and status, and write the ticket, its subject, its thread and the first
    /// message in one transaction.
    pub async fn create(&self, caller: &Identity, request: CreateTicketRequest) -> Result<CreatedTicket, IntakeError> {
        if !caller.is_user() {
            return Err(IntakeError::NotEndUser);
        }

        let topic_id = request.topic();
        if matches!(topic_id, Err(IntakeError::MissingTopic)) {
            return Err(IntakeError::MissingTopic);
        }
        let subject = trimmed(request.subject.as_deref()).ok_or(IntakeError::BlankSubject)?;
        let message = trimmed(request.message.as_deref()).ok_or(IntakeError::BlankMessage)?;

        let topic = self
            .store
            .find_intake_topic(topic_id?)
            .await?
            .ok_or(IntakeError::InvalidTopic)?;

        let status_id = self
            .store
            .default_open_status()
            .await?
            .ok_or(IntakeError::NoDefaultStatus)?;

        let poster = match caller.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self
                .store
                .user_email(caller.id)
                .await?
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "User".to_string()),
        };

        let mut ticket = NewTicket {
            number: String::new(),
            user_id: caller.id,
            dept_id: topic.dept_id,
            topic_id: topic.topic_id,
            status_id,
            subject: subject.chars().take(MAX_SUBJECT_CHARS).collect(),
            poster,
            body: message.to_string(),
            created: Utc::now().naive_utc(),
        };

        let mut attempt = 1;
        let ticket_id = loop {
            ticket.number = self.numbers.next_number();
            match self.store.insert_ticket(&ticket).await {
                Ok(id) => break id,
                Err(err) if err.is_duplicate_key() && attempt < NUMBER_ATTEMPTS => {
                    warn!(
                        "Ticket number {} already taken (attempt {}/{}), generating another",
                        ticket.number, attempt, NUMBER_ATTEMPTS
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(
            "User {} created ticket {} ({}) in department {}",
            caller.id, ticket.number, ticket_id, topic.dept_id
        );

        Ok(CreatedTicket {
            ticket_id,
            number: ticket.number,
            subject: subject.to_string(),
            status: "open",
            department: topic.dept_name,
            created: ticket.created,
        })
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
