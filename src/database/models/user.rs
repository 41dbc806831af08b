use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::OrganizationRef;
use crate::database::row::RowExt;

/// Filters for the user directory
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub org_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub org_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<OrganizationRef>,
    pub status: i64,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl UserSummary {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let org_id = row.int("org_id")?;
        let organization = match row.opt_text("org_name")? {
            Some(name) if org_id != 0 => Some(OrganizationRef {
                id: org_id,
                name: Some(name),
                domain: None,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.int("id")?,
            org_id,
            name: row.opt_text("name")?,
            email: row.opt_text("email")?,
            organization,
            status: row.int("status")?,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEmail {
    pub id: i64,
    pub address: String,
    pub flags: i64,
    #[serde(rename = "isDefault")]
    pub is_default: bool,
}

impl UserEmail {
    /// `is_default` is set by the caller, which knows the user's default address.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            address: row.text("address")?,
            flags: row.int("flags")?,
            is_default: false,
        })
    }
}

/// User profile with every address and a ticket count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDetail {
    pub id: i64,
    pub name: Option<String>,
    pub status: i64,
    pub organization: Option<OrganizationRef>,
    pub emails: Vec<UserEmail>,
    #[serde(rename = "ticketCount")]
    pub ticket_count: i64,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
    #[serde(skip)]
    pub default_email_id: i64,
}

impl UserDetail {
    /// Addresses and the ticket count are filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let org_id = row.int("org_id")?;
        let organization = match org_id {
            0 => None,
            _ => Some(OrganizationRef {
                id: org_id,
                name: row.opt_text("org_name")?,
                domain: row.opt_text("org_domain")?,
            }),
        };

        Ok(Self {
            id: row.int("id")?,
            name: row.opt_text("name")?,
            status: row.int("status")?,
            organization,
            emails: Vec::new(),
            ticket_count: 0,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
            default_email_id: row.int("default_email_id")?,
        })
    }
}
