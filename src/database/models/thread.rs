use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::mysql::MySqlRow;

use super::refs::full_name;
use crate::database::row::RowExt;

/// Kind of thread entry, stored as a single letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadEntryType {
    #[serde(rename = "M")]
    Message,
    #[serde(rename = "R")]
    Response,
    #[serde(rename = "N")]
    Note,
}

impl ThreadEntryType {
    pub fn code(&self) -> &'static str {
        match self {
            ThreadEntryType::Message => "M",
            ThreadEntryType::Response => "R",
            ThreadEntryType::Note => "N",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(ThreadEntryType::Message),
            "R" => Some(ThreadEntryType::Response),
            "N" => Some(ThreadEntryType::Note),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadEntry {
    pub id: i64,
    pub thread_id: i64,
    pub staff_id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub entry_type: ThreadEntryType,
    pub poster: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub format: Option<String>,
    pub source: Option<String>,
    pub created: Option<NaiveDateTime>,
}

impl ThreadEntry {
    /// Blank posters fall back to the staff member's name, then the user's name.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let staff_id = row.int("staff_id")?;
        let type_code = row.text("type")?;
        let entry_type = ThreadEntryType::from_code(&type_code).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "type".to_string(),
            source: format!("unknown thread entry type '{}'", type_code).into(),
        })?;

        let poster = match row.opt_text("poster")?.filter(|p| !p.is_empty()) {
            Some(poster) => Some(poster),
            None if staff_id != 0 => Some(full_name(
                row.opt_text("firstname")?.as_deref(),
                row.opt_text("lastname")?.as_deref(),
            )),
            None => row.opt_text("user_name")?,
        };
        let email = if staff_id != 0 {
            row.opt_text("staff_email")?
        } else {
            row.opt_text("user_email")?
        };

        Ok(Self {
            id: row.int("id")?,
            thread_id: row.int("thread_id")?,
            staff_id,
            user_id: row.int("user_id")?,
            entry_type,
            poster,
            email,
            title: row.opt_text("title")?,
            body: row.text("body")?,
            format: row.opt_text("format")?,
            source: row.opt_text("source")?,
            created: row.opt_datetime("created")?,
        })
    }
}

/// Audit event recorded against a thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadEvent {
    pub id: i64,
    pub thread_id: i64,
    pub event_id: Option<i64>,
    pub event_name: Option<String>,
    pub staff_id: i64,
    pub username: Option<String>,
    pub data: Option<Value>,
    pub timestamp: Option<NaiveDateTime>,
}

impl ThreadEvent {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            thread_id: row.int("thread_id")?,
            event_id: row.opt_int("event_id")?,
            event_name: row.opt_text("event_name")?,
            staff_id: row.int("staff_id")?,
            username: row.opt_text("username")?,
            data: row.opt_json("data")?,
            timestamp: row.opt_datetime("timestamp")?,
        })
    }
}
