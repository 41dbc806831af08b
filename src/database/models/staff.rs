use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::MySqlRow;

use super::refs::{display_name, DepartmentRef};
use crate::database::row::RowExt;

/// Filters for the staff directory
#[derive(Debug, Clone, Default)]
pub struct StaffQuery {
    pub dept_id: Option<i64>,
    pub isactive: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleRef {
    pub id: i64,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffSummary {
    pub staff_id: i64,
    pub username: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dept_id: i64,
    pub department: DepartmentRef,
    pub role_id: i64,
    pub role: RoleRef,
    pub isactive: bool,
    pub isadmin: bool,
    pub onvacation: bool,
    pub created: Option<NaiveDateTime>,
}

impl StaffSummary {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let username = row.text("username")?;
        let firstname = row.opt_text("firstname")?;
        let lastname = row.opt_text("lastname")?;
        let dept_id = row.int("dept_id")?;
        let role_id = row.int("role_id")?;

        Ok(Self {
            name: display_name(firstname.as_deref(), lastname.as_deref(), &username),
            staff_id: row.int("staff_id")?,
            username,
            firstname,
            lastname,
            email: row.opt_text("email")?,
            phone: row.opt_text("phone")?,
            dept_id,
            department: DepartmentRef {
                id: dept_id,
                name: row.opt_text("dept_name")?,
            },
            role_id,
            role: RoleRef {
                id: role_id,
                name: row.opt_text("role_name")?,
                permissions: None,
            },
            isactive: row.flag("isactive")?,
            isadmin: row.flag("isadmin")?,
            onvacation: row.flag("onvacation")?,
            created: row.opt_datetime("created")?,
        })
    }
}

/// Department a staff member can work in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDepartment {
    pub id: i64,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "isPrimary")]
    pub is_primary: bool,
}

impl StaffDepartment {
    /// Expects `dept_id`, `dept_name`, `path` and `role_name` columns.
    pub fn from_row(row: &MySqlRow, is_primary: bool) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("dept_id")?,
            name: row.opt_text("dept_name")?,
            path: row.opt_text("path")?,
            role: row.opt_text("role_name")?,
            is_primary,
        })
    }

    pub fn primary_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Self::from_row(row, true)
    }

    pub fn extended_from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Self::from_row(row, false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffTeam {
    pub team_id: i64,
    pub name: Option<String>,
    #[serde(rename = "isLead")]
    pub is_lead: bool,
    pub created: Option<NaiveDateTime>,
}

impl StaffTeam {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            team_id: row.int("team_id")?,
            name: row.opt_text("name")?,
            is_lead: row.flag("is_lead")?,
            created: row.opt_datetime("created")?,
        })
    }
}

/// Staff profile with role permissions, department access and teams
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDetail {
    #[serde(flatten)]
    pub staff: StaffSummary,
    pub phone_ext: Option<String>,
    pub mobile: Option<String>,
    pub signature: Option<String>,
    pub timezone: Option<String>,
    pub departments: Vec<StaffDepartment>,
    pub teams: Vec<StaffTeam>,
    pub isvisible: bool,
    pub assigned_only: bool,
    pub lastlogin: Option<NaiveDateTime>,
}

impl StaffDetail {
    /// Departments and teams are filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut staff = StaffSummary::from_row(row)?;
        staff.role.permissions = Some(row.opt_json("role_permissions")?.unwrap_or_else(|| Value::Object(Default::default())));

        Ok(Self {
            staff,
            phone_ext: row.opt_text("phone_ext")?,
            mobile: row.opt_text("mobile")?,
            signature: row.opt_text("signature")?,
            timezone: row.opt_text("timezone")?,
            departments: Vec::new(),
            teams: Vec::new(),
            isvisible: row.flag("isvisible")?,
            assigned_only: row.flag("assigned_only")?,
            lastlogin: row.opt_datetime("lastlogin")?,
        })
    }
}
