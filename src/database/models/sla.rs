use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use crate::database::row::RowExt;

/// Bits of `sla.flags`
pub mod flags {
    pub const ACTIVE: i64 = 1;
    pub const ESCALATE: i64 = 2;
    pub const NO_ALERTS: i64 = 4;
    pub const TRANSIENT: i64 = 8;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaPlan {
    pub id: i64,
    pub name: String,
    pub grace_period: i64,
    pub flags: i64,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub escalate: bool,
    #[serde(rename = "noAlerts")]
    pub no_alerts: bool,
    #[serde(rename = "isTransient")]
    pub is_transient: bool,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl SlaPlan {
    pub fn new(id: i64, name: String, grace_period: i64, bits: i64) -> Self {
        Self {
            id,
            name,
            grace_period,
            flags: bits,
            is_active: bits & flags::ACTIVE != 0,
            escalate: bits & flags::ESCALATE != 0,
            no_alerts: bits & flags::NO_ALERTS != 0,
            is_transient: bits & flags::TRANSIENT != 0,
            created: None,
            updated: None,
        }
    }

    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut plan = Self::new(
            row.int("id")?,
            row.text("name")?,
            row.int("grace_period")?,
            row.int("flags")?,
        );
        plan.created = row.opt_datetime("created")?;
        plan.updated = row.opt_datetime("updated")?;
        Ok(plan)
    }
}

/// Where an SLA plan is referenced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlaUsage {
    #[serde(rename = "openTickets")]
    pub open_tickets: i64,
    pub departments: i64,
    #[serde(rename = "helpTopics")]
    pub help_topics: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaDetail {
    #[serde(flatten)]
    pub plan: SlaPlan,
    pub notes: Option<String>,
    pub usage: SlaUsage,
}

impl SlaDetail {
    /// Usage is filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            plan: SlaPlan::from_row(row)?,
            notes: row.opt_text("notes")?,
            usage: SlaUsage::default(),
        })
    }
}
