use serde_json::Value;
use sqlx::mysql::MySqlRow;

use super::refs::display_name;
use crate::database::row::RowExt;

/// End-user login row (`user_account` joined to `user` and its default e-mail)
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub user_id: i64,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub passwd: Option<String>,
}

impl UserAccount {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.int("user_id")?,
            username: row.opt_text("username")?,
            name: row.opt_text("name")?,
            email: row.opt_text("email")?,
            passwd: row.opt_text("passwd")?,
        })
    }
}

/// Active staff login row with its role permissions
#[derive(Debug, Clone, PartialEq)]
pub struct StaffAccount {
    pub staff_id: i64,
    pub username: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub passwd: Option<String>,
    pub is_admin: bool,
    pub dept_id: i64,
    pub role_id: i64,
    pub permissions: Option<Value>,
}

impl StaffAccount {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            staff_id: row.int("staff_id")?,
            username: row.text("username")?,
            firstname: row.opt_text("firstname")?,
            lastname: row.opt_text("lastname")?,
            email: row.opt_text("email")?,
            passwd: row.opt_text("passwd")?,
            is_admin: row.flag("isadmin")?,
            dept_id: row.int("dept_id")?,
            role_id: row.int("role_id")?,
            permissions: row.opt_json("role_permissions")?,
        })
    }

    /// Full name, or the username when both name parts are blank
    pub fn display_name(&self) -> String {
        display_name(self.firstname.as_deref(), self.lastname.as_deref(), &self.username)
    }
}

/// Active API key
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKey {
    pub id: i64,
    pub ipaddr: Option<String>,
    pub can_create_tickets: bool,
    pub can_exec_cron: bool,
}

impl ApiKey {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.int("id")?,
            ipaddr: row.opt_text("ipaddr")?,
            can_create_tickets: row.flag("can_create_tickets")?,
            can_exec_cron: row.flag("can_exec_cron")?,
        })
    }

    /// Keys bound to an address only accept requests from it; empty and
    /// `0.0.0.0` mean unrestricted.
    pub fn allows_ip(&self, peer: Option<&str>) -> bool {
        match self.ipaddr.as_deref().map(str::trim) {
            None | Some("") | Some("0.0.0.0") => true,
            Some(bound) => peer == Some(bound),
        }
    }
}
