use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::{full_name, DepartmentRef, PriorityRef, SlaRef, StaffRef, StatusRef, TeamRef, TopicRef};
use crate::database::query_builder::SortDirection;
use crate::database::row::RowExt;

/// Ticket as it appears in list responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketSummary {
    pub ticket_id: i64,
    pub number: String,
    pub subject: Option<String>,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub status_id: i64,
    pub status: StatusRef,
    pub dept_id: i64,
    pub department: DepartmentRef,
    pub topic_id: i64,
    pub topic: Option<TopicRef>,
    pub priority: PriorityRef,
    pub staff_id: i64,
    pub staff_name: Option<String>,
    pub team_id: i64,
    pub source: Option<String>,
    pub isoverdue: bool,
    pub isanswered: bool,
    pub duedate: Option<NaiveDateTime>,
    pub est_duedate: Option<NaiveDateTime>,
    pub closed: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl TicketSummary {
    /// Columns expected: `t.*` plus the aliases selected by the list and detail queries.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let status_id = row.int("status_id")?;
        let dept_id = row.int("dept_id")?;
        let topic_id = row.int("topic_id")?;
        let topic = row
            .opt_text("topic_name")?
            .map(|name| TopicRef { topic_id, topic: Some(name) });

        Ok(Self {
            ticket_id: row.int("ticket_id")?,
            number: row.text("number")?,
            subject: row.opt_text("subject")?,
            user_id: row.int("user_id")?,
            user_name: row.opt_text("user_name")?,
            status_id,
            status: StatusRef {
                id: status_id,
                name: row.opt_text("status_name")?,
                state: row.opt_text("status_state")?,
            },
            dept_id,
            department: DepartmentRef {
                id: dept_id,
                name: row.opt_text("dept_name")?,
            },
            topic_id,
            topic,
            priority: PriorityRef {
                priority_id: row.opt_int("priority_id")?,
                priority: row.opt_text("priority_name")?,
                priority_color: row.opt_text("priority_color")?,
                priority_urgency: None,
            },
            staff_id: row.int("staff_id")?,
            staff_name: row.opt_text("staff_name")?,
            team_id: row.int("team_id")?,
            source: row.opt_text("source")?,
            isoverdue: row.flag("isoverdue")?,
            isanswered: row.flag("isanswered")?,
            duedate: row.opt_datetime("duedate")?,
            est_duedate: row.opt_datetime("est_duedate")?,
            closed: row.opt_datetime("closed")?,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketUser {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadInfo {
    pub id: Option<i64>,
    pub lastresponse: Option<NaiveDateTime>,
    pub lastmessage: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collaborator {
    pub id: i64,
    pub user_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Collaborator {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            user_id: row.int("user_id")?,
            name: row.opt_text("name")?,
            email: row.opt_text("email")?,
            role: row.opt_text("role")?,
        })
    }
}

/// Ticket with owner, assignee, SLA, thread and collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub summary: TicketSummary,
    pub user: TicketUser,
    pub staff: Option<StaffRef>,
    pub team: Option<TeamRef>,
    pub sla: Option<SlaRef>,
    pub thread: ThreadInfo,
    pub collaborators: Vec<Collaborator>,
}

impl TicketDetail {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut summary = TicketSummary::from_row(row)?;
        summary.priority.priority_urgency = row.opt_int("priority_urgency")?;

        let staff = match row.int("staff_id")? {
            0 => None,
            staff_id => Some(StaffRef {
                staff_id,
                name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
                email: row.opt_text("staff_email")?,
            }),
        };
        let team = match row.int("team_id")? {
            0 => None,
            team_id => Some(TeamRef {
                team_id,
                name: row.opt_text("team_name")?,
            }),
        };
        let sla = match row.int("sla_id")? {
            0 => None,
            id => Some(SlaRef {
                id,
                name: row.opt_text("sla_name")?,
                grace_period: row.opt_int("grace_period")?,
            }),
        };

        Ok(Self {
            user: TicketUser {
                id: summary.user_id,
                name: summary.user_name.clone(),
                email: row.opt_text("user_email")?,
            },
            staff,
            team,
            sla,
            thread: ThreadInfo {
                id: row.opt_int("thread_id")?,
                lastresponse: row.opt_datetime("lastresponse")?,
                lastmessage: row.opt_datetime("lastmessage")?,
            },
            collaborators: Vec::new(),
            summary,
        })
    }
}

/// A ticket is addressed either by its numeric id or by its public number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketRef {
    Id(i64),
    Number(String),
}

impl TicketRef {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) => TicketRef::Id(id),
            Err(_) => TicketRef::Number(raw.to_string()),
        }
    }
}

/// Sortable ticket columns for the list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketSort {
    TicketId,
    Number,
    #[default]
    Created,
    Updated,
    DueDate,
    StatusId,
    Priority,
}

impl TicketSort {
    /// Unknown sort keys fall back to creation time.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("ticket_id") => TicketSort::TicketId,
            Some("number") => TicketSort::Number,
            Some("updated") => TicketSort::Updated,
            Some("duedate") => TicketSort::DueDate,
            Some("status_id") => TicketSort::StatusId,
            Some("priority") | Some("priority_id") => TicketSort::Priority,
            _ => TicketSort::Created,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            TicketSort::TicketId => "t.ticket_id",
            TicketSort::Number => "t.number",
            TicketSort::Created => "t.created",
            TicketSort::Updated => "t.updated",
            TicketSort::DueDate => "t.duedate",
            TicketSort::StatusId => "t.status_id",
            TicketSort::Priority => "tp.priority_urgency",
        }
    }
}

/// Filters for the ticket list. `owner` is forced for end users.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub state: Option<String>,
    pub dept_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Tickets opened by members of this organization
    pub org_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub priority_id: Option<i64>,
    pub overdue_only: bool,
    pub search: Option<String>,
    pub owner: Option<i64>,
    pub sort: TicketSort,
    pub direction: SortDirection,
}

/// Topic fields needed to route a new ticket
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeTopic {
    pub topic_id: i64,
    pub dept_id: i64,
    pub dept_name: Option<String>,
    pub priority_id: i64,
}

/// Fully resolved ticket ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub number: String,
    pub user_id: i64,
    pub dept_id: i64,
    pub topic_id: i64,
    pub status_id: i64,
    pub subject: String,
    pub poster: String,
    pub body: String,
    pub created: NaiveDateTime,
}
