use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::{full_name, DepartmentRef, PriorityRef, SlaRef, TopicRef};
use crate::database::row::RowExt;

/// Default assignee of a help topic: a staff member or a team
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DefaultAssignee {
    Staff { staff_id: i64, name: String },
    Team { team_id: i64, name: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicForm {
    pub form_id: i64,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub form_type: Option<String>,
    pub sort: i64,
}

impl TopicForm {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            form_id: row.int("form_id")?,
            title: row.opt_text("title")?,
            form_type: row.opt_text("type")?,
            sort: row.int("sort")?,
        })
    }
}

/// Help topic. Detail lookups additionally fill the fields marked optional below.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub topic_id: i64,
    pub topic_pid: i64,
    pub topic: String,
    pub isactive: bool,
    pub ispublic: bool,
    pub noautoresp: bool,
    pub flags: i64,
    pub sort: i64,
    pub parent: Option<TopicRef>,
    pub department: Option<DepartmentRef>,
    pub priority: Option<PriorityRef>,
    pub sla: Option<SlaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "defaultAssignee", skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<DefaultAssignee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forms: Option<Vec<TopicForm>>,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl Topic {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let topic_pid = row.int("topic_pid")?;
        let dept_id = row.int("dept_id")?;
        let priority_id = row.int("priority_id")?;
        let sla_id = row.int("sla_id")?;

        let parent = match topic_pid {
            0 => None,
            _ => Some(TopicRef {
                topic_id: topic_pid,
                topic: row.opt_text("parent_topic")?,
            }),
        };
        let department = match dept_id {
            0 => None,
            _ => Some(DepartmentRef {
                id: dept_id,
                name: row.opt_text("dept_name")?,
            }),
        };
        let priority = match priority_id {
            0 => None,
            _ => Some(PriorityRef {
                priority_id: Some(priority_id),
                priority: row.opt_text("priority_name")?,
                priority_color: None,
                priority_urgency: None,
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
            topic_id: row.int("topic_id")?,
            topic_pid,
            topic: row.text("topic")?,
            isactive: row.flag("isactive")?,
            ispublic: row.flag("ispublic")?,
            noautoresp: row.flag("noautoresp")?,
            flags: row.int("flags")?,
            sort: row.int("sort")?,
            parent,
            department,
            priority,
            sla,
            number_format: None,
            notes: None,
            default_assignee: None,
            forms: None,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }

    /// Detail rows also carry priority colour, SLA grace period, assignee and notes.
    pub fn detail_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut topic = Self::from_row(row)?;
        if let Some(priority) = topic.priority.as_mut() {
            priority.priority_color = row.opt_text("priority_color")?;
        }
        if let Some(sla) = topic.sla.as_mut() {
            sla.grace_period = row.opt_int("grace_period")?;
        }
        topic.number_format = row.opt_text("number_format")?;
        topic.notes = row.opt_text("notes")?;

        let staff_id = row.int("staff_id")?;
        let team_id = row.int("team_id")?;
        topic.default_assignee = if staff_id != 0 {
            Some(DefaultAssignee::Staff {
                staff_id,
                name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
            })
        } else if team_id != 0 {
            Some(DefaultAssignee::Team {
                team_id,
                name: row.opt_text("team_name")?,
            })
        } else {
            None
        };
        Ok(topic)
    }
}
