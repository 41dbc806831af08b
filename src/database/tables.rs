use crate::database::manager::DatabaseError;

/// Resolves logical table names against the configured prefix.
///
/// The prefix is validated once, so every name handed out is safe to splice
/// into SQL text. Values are always bound as parameters.
#[derive(Debug, Clone)]
pub struct Tables {
    prefix: String,
}

impl Tables {
    pub fn new(prefix: &str) -> Result<Self, DatabaseError> {
        let valid = prefix.len() <= 32 && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(DatabaseError::InvalidTablePrefix(prefix.to_string()));
        }
        Ok(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefixed name of any table
    pub fn name(&self, table: &str) -> String {
        format!("{}{}", self.prefix, table)
    }

    pub fn ticket(&self) -> String {
        self.name("ticket")
    }

    pub fn ticket_cdata(&self) -> String {
        self.name("ticket__cdata")
    }

    pub fn ticket_status(&self) -> String {
        self.name("ticket_status")
    }

    pub fn ticket_priority(&self) -> String {
        self.name("ticket_priority")
    }

    pub fn thread(&self) -> String {
        self.name("thread")
    }

    pub fn thread_entry(&self) -> String {
        self.name("thread_entry")
    }

    pub fn thread_event(&self) -> String {
        self.name("thread_event")
    }

    pub fn thread_collaborator(&self) -> String {
        self.name("thread_collaborator")
    }

    pub fn event(&self) -> String {
        self.name("event")
    }

    pub fn help_topic(&self) -> String {
        self.name("help_topic")
    }

    pub fn help_topic_form(&self) -> String {
        self.name("help_topic_form")
    }

    pub fn form(&self) -> String {
        self.name("form")
    }

    pub fn department(&self) -> String {
        self.name("department")
    }

    pub fn user(&self) -> String {
        self.name("user")
    }

    pub fn user_email(&self) -> String {
        self.name("user_email")
    }

    pub fn user_account(&self) -> String {
        self.name("user_account")
    }

    pub fn staff(&self) -> String {
        self.name("staff")
    }

    pub fn role(&self) -> String {
        self.name("role")
    }

    pub fn team(&self) -> String {
        self.name("team")
    }

    pub fn sla(&self) -> String {
        self.name("sla")
    }

    pub fn api_key(&self) -> String {
        self.name("api_key")
    }

    pub fn organization(&self) -> String {
        self.name("organization")
    }

    pub fn staff_dept_access(&self) -> String {
        self.name("staff_dept_access")
    }

    pub fn team_member(&self) -> String {
        self.name("team_member")
    }

    pub fn task(&self) -> String {
        self.name("task")
    }

    pub fn task_cdata(&self) -> String {
        self.name("task__cdata")
    }

    pub fn faq(&self) -> String {
        self.name("faq")
    }

    pub fn faq_category(&self) -> String {
        self.name("faq_category")
    }

    pub fn faq_topic(&self) -> String {
        self.name("faq_topic")
    }

    pub fn config(&self) -> String {
        self.name("config")
    }
}
