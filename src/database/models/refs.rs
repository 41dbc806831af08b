use serde::{Deserialize, Serialize};

/// Compact references embedded in ticket, topic and department payloads.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentRef {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRef {
    pub topic_id: i64,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRef {
    pub id: i64,
    pub name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRef {
    pub priority_id: Option<i64>,
    pub priority: Option<String>,
    pub priority_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_urgency: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffRef {
    pub staff_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub team_id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaRef {
    pub id: i64,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: i64,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Visibility filter for topic and department listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only public rows (anonymous callers and end users)
    PublicOnly,
    /// Staff view, optionally narrowed by `ispublic`
    Staff(Option<bool>),
}

/// "First Last" with missing parts dropped
pub fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or("")).trim().to_string()
}

/// Full name, or `username` when both name parts are blank
pub fn display_name(first: Option<&str>, last: Option<&str>, username: &str) -> String {
    let name = full_name(first, last);
    if name.is_empty() {
        username.to_string()
    } else {
        name
    }
}
