use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::MySqlRow;

use crate::database::row::RowExt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketStatus {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub flags: i64,
    pub sort: i64,
    pub properties: Option<Value>,
}

impl TicketStatus {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            name: row.text("name")?,
            state: row.text("state")?,
            flags: row.int("flags")?,
            sort: row.int("sort")?,
            properties: row.opt_json("properties")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Priority {
    pub priority_id: i64,
    pub priority: String,
    pub priority_desc: Option<String>,
    pub priority_color: Option<String>,
    pub priority_urgency: i64,
    pub ispublic: bool,
}

impl Priority {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            priority_id: row.int("priority_id")?,
            priority: row.text("priority")?,
            priority_desc: row.opt_text("priority_desc")?,
            priority_color: row.opt_text("priority_color")?,
            priority_urgency: row.int("priority_urgency")?,
            ispublic: row.flag("ispublic")?,
        })
    }
}

/// Upload limit when `max_file_size` is unset or unparseable
pub const DEFAULT_MAX_FILE_SIZE: i64 = 1_048_576;

/// Settings read from the `core` namespace of the config table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemConfig {
    pub helpdesk_url: Option<String>,
    pub helpdesk_title: Option<String>,
    pub default_dept_id: Option<i64>,
    pub default_sla_id: Option<i64>,
    pub default_priority_id: Option<i64>,
    pub enable_kb: bool,
    pub enable_captcha: bool,
    pub max_file_size: i64,
    pub allowed_filetypes: String,
    pub auto_claim_tickets: bool,
}

impl SystemConfig {
    /// Keys fetched from the config table
    pub const KEYS: [&'static str; 12] = [
        "helpdesk_url",
        "helpdesk_title",
        "default_dept_id",
        "default_sla_id",
        "default_priority_id",
        "default_template_id",
        "enable_kb",
        "enable_captcha",
        "max_file_size",
        "allowed_filetypes",
        "ticket_autolock",
        "auto_claim_tickets",
    ];

    /// Ids of 0 or garbage are absent and switches are on only for `"1"`.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let values: HashMap<String, String> = pairs.into_iter().collect();
        let id = |key: &str| {
            values
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|id| *id != 0)
        };
        let switch = |key: &str| values.get(key).map(String::as_str) == Some("1");

        Self {
            helpdesk_url: values.get("helpdesk_url").cloned(),
            helpdesk_title: values.get("helpdesk_title").cloned(),
            default_dept_id: id("default_dept_id"),
            default_sla_id: id("default_sla_id"),
            default_priority_id: id("default_priority_id"),
            enable_kb: switch("enable_kb"),
            enable_captcha: switch("enable_captcha"),
            max_file_size: id("max_file_size").unwrap_or(DEFAULT_MAX_FILE_SIZE),
            allowed_filetypes: values.get("allowed_filetypes").cloned().unwrap_or_default(),
            auto_claim_tickets: switch("auto_claim_tickets"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub open: i64,
    pub closed: i64,
    /// Open and overdue
    pub overdue: i64,
    /// Open with no assignee
    pub unassigned: i64,
    /// Created since midnight, server time
    pub today: i64,
}

impl TicketStats {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            total: row.int("total")?,
            open: row.int("open")?,
            closed: row.int("closed")?,
            overdue: row.int("overdue")?,
            unassigned: row.int("unassigned")?,
            today: 0,
        })
    }
}

/// Help-desk wide counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemStats {
    pub tickets: TicketStats,
    pub users: i64,
    /// Active staff only
    pub staff: i64,
    pub departments: i64,
    pub teams: i64,
    pub organizations: i64,
}
