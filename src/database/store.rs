use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ApiKey, Department, DepartmentDetail, DepartmentMember, Faq, FaqCategory, FaqDetail, FaqQuery, IntakeTopic,
    NewTicket, Organization, OrganizationDetail, PageRequest, Paged, Priority, SlaDetail, SlaPlan, StaffAccount,
    StaffDepartment, StaffDetail, StaffQuery, StaffSummary, StaffTeam, SystemConfig, SystemStats, TaskDetail,
    TaskQuery, TaskSummary, Team, TeamDetail, TeamMember, ThreadEntry, ThreadEvent, TicketDetail, TicketQuery,
    TicketRef, TicketStatus, TicketSummary, Topic, UserAccount, UserDetail, UserQuery, UserSummary, Visibility,
};

/// Everything the HTTP layer needs from the help-desk database.
///
/// `MySqlStore` is the production implementation. Lookups that can miss
/// return `Ok(None)`; `Err` is reserved for store failures.
#[async_trait]
pub trait HelpdeskStore: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn close(&self);

    /// Active, public topic with its routing department.
    async fn find_intake_topic(&self, topic_id: i64) -> Result<Option<IntakeTopic>, DatabaseError>;

    /// Lowest-sorted status with state `open` and mode 1.
    async fn default_open_status(&self) -> Result<Option<i64>, DatabaseError>;

    /// Address of the user's default e-mail
    async fn user_email(&self, user_id: i64) -> Result<Option<String>, DatabaseError>;

    /// Insert ticket, custom data, thread and first message atomically.
    /// Returns the new ticket id. Nothing is left behind on error.
    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<i64, DatabaseError>;

    async fn list_tickets(&self, query: &TicketQuery, page: PageRequest) -> Result<Paged<TicketSummary>, DatabaseError>;

    async fn get_ticket(&self, ticket: &TicketRef) -> Result<Option<TicketDetail>, DatabaseError>;

    async fn ticket_owner(&self, ticket: &TicketRef) -> Result<Option<i64>, DatabaseError>;

    /// `None` when the ticket has no thread
    async fn thread_entries(
        &self,
        ticket: &TicketRef,
        page: PageRequest,
    ) -> Result<Option<Paged<ThreadEntry>>, DatabaseError>;

    async fn thread_events(&self, ticket: &TicketRef) -> Result<Option<Vec<ThreadEvent>>, DatabaseError>;

    async fn list_topics(&self, visibility: Visibility, page: PageRequest) -> Result<Paged<Topic>, DatabaseError>;

    /// Topic detail including attached forms, regardless of visibility
    async fn get_topic(&self, topic_id: i64) -> Result<Option<Topic>, DatabaseError>;

    async fn list_departments(
        &self,
        visibility: Visibility,
        page: PageRequest,
    ) -> Result<Paged<Department>, DatabaseError>;

    async fn get_department(&self, dept_id: i64) -> Result<Option<DepartmentDetail>, DatabaseError>;

    /// Active staff whose primary department is `dept_id`, then those with extended access
    async fn department_staff(&self, dept_id: i64) -> Result<Vec<DepartmentMember>, DatabaseError>;

    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> Result<Paged<UserSummary>, DatabaseError>;

    /// Profile with every e-mail address and the number of tickets opened
    async fn get_user(&self, user_id: i64) -> Result<Option<UserDetail>, DatabaseError>;

    /// Zero or one organization; users belong to at most one
    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>, DatabaseError>;

    async fn list_staff(&self, query: &StaffQuery, page: PageRequest) -> Result<Paged<StaffSummary>, DatabaseError>;

    async fn get_staff(&self, staff_id: i64) -> Result<Option<StaffDetail>, DatabaseError>;

    /// Primary department first, then extended access. `None` for unknown staff.
    async fn staff_departments(&self, staff_id: i64) -> Result<Option<Vec<StaffDepartment>>, DatabaseError>;

    async fn staff_teams(&self, staff_id: i64) -> Result<Vec<StaffTeam>, DatabaseError>;

    async fn list_teams(&self, page: PageRequest) -> Result<Paged<Team>, DatabaseError>;

    /// Team with its active members
    async fn get_team(&self, team_id: i64) -> Result<Option<TeamDetail>, DatabaseError>;

    /// Every member, active or not. `None` for unknown teams.
    async fn team_members(&self, team_id: i64) -> Result<Option<Vec<TeamMember>>, DatabaseError>;

    async fn list_organizations(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paged<Organization>, DatabaseError>;

    async fn get_organization(&self, org_id: i64) -> Result<Option<OrganizationDetail>, DatabaseError>;

    async fn list_slas(&self) -> Result<Vec<SlaPlan>, DatabaseError>;

    async fn get_sla(&self, sla_id: i64) -> Result<Option<SlaDetail>, DatabaseError>;

    async fn list_tasks(&self, query: &TaskQuery, page: PageRequest) -> Result<Paged<TaskSummary>, DatabaseError>;

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskDetail>, DatabaseError>;

    /// `None` when the task has no thread
    async fn task_thread(&self, task_id: i64, page: PageRequest) -> Result<Option<Paged<ThreadEntry>>, DatabaseError>;

    /// Published articles only
    async fn list_faqs(&self, query: &FaqQuery, page: PageRequest) -> Result<Paged<Faq>, DatabaseError>;

    async fn list_faq_categories(&self, public_only: bool) -> Result<Vec<FaqCategory>, DatabaseError>;

    /// Article with related topics, regardless of visibility
    async fn get_faq(&self, faq_id: i64) -> Result<Option<FaqDetail>, DatabaseError>;

    async fn system_config(&self) -> Result<SystemConfig, DatabaseError>;

    async fn system_stats(&self) -> Result<SystemStats, DatabaseError>;

    async fn list_statuses(&self) -> Result<Vec<TicketStatus>, DatabaseError>;

    async fn list_priorities(&self, public_only: bool) -> Result<Vec<Priority>, DatabaseError>;

    /// Enabled end-user account by username
    async fn find_user_account(&self, username: &str) -> Result<Option<UserAccount>, DatabaseError>;

    /// Active staff member by username or e-mail
    async fn find_staff_account(&self, login: &str) -> Result<Option<StaffAccount>, DatabaseError>;

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, DatabaseError>;
}
