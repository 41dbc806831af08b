use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::{full_name, DepartmentRef, StaffRef, TeamRef};
use crate::database::row::RowExt;

/// Filters for the task list
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub staff_id: Option<i64>,
    pub dept_id: Option<i64>,
    pub team_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: i64,
    pub number: Option<String>,
    pub title: Option<String>,
    pub object_id: i64,
    pub object_type: Option<String>,
    pub dept_id: i64,
    pub department: Option<DepartmentRef>,
    pub staff_id: i64,
    pub staff_name: Option<String>,
    pub team_id: i64,
    pub team_name: Option<String>,
    pub flags: i64,
    #[serde(rename = "isClosed")]
    pub is_closed: bool,
    pub duedate: Option<NaiveDateTime>,
    pub closed: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl TaskSummary {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let dept_id = row.int("dept_id")?;
        let department = row
            .opt_text("dept_name")?
            .map(|name| DepartmentRef { id: dept_id, name: Some(name) });
        let closed = row.opt_datetime("closed")?;

        Ok(Self {
            id: row.int("id")?,
            number: row.opt_text("number")?,
            title: row.opt_text("title")?,
            object_id: row.int("object_id")?,
            object_type: row.opt_text("object_type")?,
            dept_id,
            department,
            staff_id: row.int("staff_id")?,
            staff_name: row.opt_text("staff_name")?,
            team_id: row.int("team_id")?,
            team_name: row.opt_text("team_name")?,
            flags: row.int("flags")?,
            is_closed: closed.is_some(),
            duedate: row.opt_datetime("duedate")?,
            closed,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}

/// Ticket a task was opened from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTicket {
    pub ticket_id: i64,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: TaskSummary,
    pub description: Option<String>,
    pub staff: Option<StaffRef>,
    pub team: Option<TeamRef>,
    pub ticket: Option<TaskTicket>,
    pub thread_id: Option<i64>,
}

impl TaskDetail {
    /// Expects the task row joined to its assignee, team, linked ticket and thread.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let task = TaskSummary::from_row(row)?;
        let staff = match task.staff_id {
            0 => None,
            staff_id => Some(StaffRef {
                staff_id,
                name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
                email: row.opt_text("staff_email")?,
            }),
        };
        let team = match task.team_id {
            0 => None,
            team_id => Some(TeamRef {
                team_id,
                name: task.team_name.clone(),
            }),
        };
        let ticket = match (row.opt_int("ticket_id")?, row.opt_text("ticket_number")?) {
            (Some(ticket_id), Some(number)) => Some(TaskTicket { ticket_id, number }),
            _ => None,
        };

        Ok(Self {
            description: row.opt_text("description")?,
            staff,
            team,
            ticket,
            thread_id: row.opt_int("thread_id")?,
            task,
        })
    }
}
