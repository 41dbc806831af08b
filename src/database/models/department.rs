use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::{display_name, full_name, DepartmentRef, SlaRef, StaffRef};
use crate::database::row::RowExt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Department {
    pub id: i64,
    pub pid: i64,
    pub name: String,
    pub path: Option<String>,
    pub ispublic: bool,
    pub flags: i64,
    pub parent: Option<DepartmentRef>,
    pub manager: Option<StaffRef>,
    pub sla: Option<SlaRef>,
    pub created: Option<NaiveDateTime>,
}

impl Department {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let pid = row.int("pid")?;
        let manager_id = row.int("manager_id")?;
        let sla_id = row.int("sla_id")?;

        let parent = match pid {
            0 => None,
            _ => Some(DepartmentRef {
                id: pid,
                name: row.opt_text("parent_name")?,
            }),
        };
        let manager = match manager_id {
            0 => None,
            _ => Some(StaffRef {
                staff_id: manager_id,
                name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
                email: None,
            }),
        };
        let sla = match sla_id {
            0 => None,
            _ => Some(SlaRef {
                id: sla_id,
                name: row.opt_text("sla_name")?,
                grace_period: None,
            }),
        };

        Ok(Self {
            id: row.int("id")?,
            pid,
            name: row.text("name")?,
            path: row.opt_text("path")?,
            ispublic: row.flag("ispublic")?,
            flags: row.int("flags")?,
            parent,
            manager,
            sla,
            created: row.opt_datetime("created")?,
        })
    }
}

/// Department with settings and live counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentDetail {
    #[serde(flatten)]
    pub department: Department,
    pub signature: Option<String>,
    pub ticket_auto_response: bool,
    pub message_auto_response: bool,
    #[serde(rename = "staffCount")]
    pub staff_count: i64,
    #[serde(rename = "ticketCount")]
    pub open_ticket_count: i64,
    pub updated: Option<NaiveDateTime>,
}

impl DepartmentDetail {
    /// Counts are filled in by the caller from separate queries.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut department = Department::from_row(row)?;
        if let Some(manager) = department.manager.as_mut() {
            manager.email = row.opt_text("manager_email")?;
        }
        if let Some(sla) = department.sla.as_mut() {
            sla.grace_period = row.opt_int("grace_period")?;
        }

        Ok(Self {
            department,
            signature: row.opt_text("signature")?,
            ticket_auto_response: row.flag("ticket_auto_response")?,
            message_auto_response: row.flag("message_auto_response")?,
            staff_count: 0,
            open_ticket_count: 0,
            updated: row.opt_datetime("updated")?,
        })
    }
}

/// Active staff member who works in a department, directly or through extended access
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentMember {
    pub staff_id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "isPrimary")]
    pub is_primary: bool,
    pub onvacation: bool,
}

impl DepartmentMember {
    pub fn from_row(row: &MySqlRow, is_primary: bool) -> Result<Self, sqlx::Error> {
        let username = row.text("username")?;
        Ok(Self {
            name: display_name(
                row.opt_text("firstname")?.as_deref(),
                row.opt_text("lastname")?.as_deref(),
                &username,
            ),
            staff_id: row.int("staff_id")?,
            username,
            email: row.opt_text("email")?,
            role: row.opt_text("role_name")?,
            is_primary,
            onvacation: row.flag("onvacation")?,
        })
    }

    pub fn primary_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Self::from_row(row, true)
    }

    pub fn extended_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Self::from_row(row, false)
    }
}
