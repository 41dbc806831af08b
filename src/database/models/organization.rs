use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::MySqlRow;

use crate::database::row::RowExt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub domain: Option<String>,
    pub status: i64,
    #[serde(rename = "userCount")]
    pub user_count: i64,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl Organization {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            name: row.text("name")?,
            domain: row.opt_text("domain")?,
            status: row.int("status")?,
            user_count: row.int("user_count")?,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}

/// Account manager of an organization. Only staff managers are resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrganizationManager {
    Staff {
        staff_id: i64,
        name: String,
        email: Option<String>,
    },
}

/// Staff id from a `manager` column value such as `s:12`. Team managers
/// (`t:ID`) and malformed values yield `None`.
pub fn manager_staff_id(raw: &str) -> Option<i64> {
    let (kind, id) = raw.split_once(':')?;
    match kind {
        "s" => id.trim().parse().ok().filter(|id| *id > 0),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub manager: Option<OrganizationManager>,
    pub extra: Option<Value>,
    #[serde(rename = "ticketCount")]
    pub ticket_count: i64,
    #[serde(skip)]
    pub manager_ref: Option<String>,
}

impl OrganizationDetail {
    /// Manager and ticket count are filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            organization: Organization::from_row(row)?,
            manager: None,
            extra: row.opt_json("extra")?,
            ticket_count: 0,
            manager_ref: row.opt_text("manager")?,
        })
    }
}
