use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::{display_name, full_name, DepartmentRef, StaffRef};
use crate::database::row::RowExt;

fn lead_from_row(row: &MySqlRow) -> Result<Option<StaffRef>, sqlx::Error> {
    Ok(match row.int("lead_id")? {
        0 => None,
        staff_id => Some(StaffRef {
            staff_id,
            name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
            email: row.opt_text("lead_email")?,
        }),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub team_id: i64,
    pub name: String,
    pub lead: Option<StaffRef>,
    pub flags: i64,
    #[serde(rename = "memberCount")]
    pub member_count: i64,
    pub created: Option<NaiveDateTime>,
}

impl Team {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            team_id: row.int("team_id")?,
            name: row.text("name")?,
            lead: lead_from_row(row)?,
            flags: row.int("flags")?,
            member_count: row.int("member_count")?,
            created: row.opt_datetime("created")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMember {
    pub staff_id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub department: DepartmentRef,
    #[serde(rename = "isLead")]
    pub is_lead: bool,
    pub isactive: bool,
    pub onvacation: bool,
}

impl TeamMember {
    /// Expects an `is_lead` column computed against the team's lead.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
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
            department: DepartmentRef {
                id: row.int("dept_id")?,
                name: row.opt_text("dept_name")?,
            },
            is_lead: row.flag("is_lead")?,
            isactive: row.flag("isactive")?,
            onvacation: row.flag("onvacation")?,
        })
    }
}

/// Team with notes and its active members
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamDetail {
    pub team_id: i64,
    pub name: String,
    pub notes: Option<String>,
    pub flags: i64,
    pub lead: Option<StaffRef>,
    pub members: Vec<TeamMember>,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl TeamDetail {
    /// Members are filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            team_id: row.int("team_id")?,
            name: row.text("name")?,
            notes: row.opt_text("notes")?,
            flags: row.int("flags")?,
            lead: lead_from_row(row)?,
            members: Vec::new(),
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}
