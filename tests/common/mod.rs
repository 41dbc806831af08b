#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde_json::json;

use helpdesk_api::auth::{generate_jwt, Identity};
use helpdesk_api::config::AppConfig;
use helpdesk_api::database::models::sla::flags as sla_flags;
use helpdesk_api::database::models::{
    manager_staff_id, ApiKey, Department, DepartmentDetail, DepartmentMember, DepartmentRef, Faq, FaqCategory,
    FaqCategoryRef, FaqDetail, FaqQuery, IntakeTopic, NewTicket, Organization, OrganizationDetail,
    OrganizationManager, OrganizationRef, PageRequest, Paged, Priority, PriorityRef, RoleRef, SlaDetail, SlaPlan,
    SlaRef, SlaUsage, StaffAccount, StaffDepartment, StaffDetail, StaffQuery, StaffRef, StaffSummary, StaffTeam,
    StatusRef, SystemConfig, SystemStats, TaskDetail, TaskQuery, TaskSummary, Team, TeamDetail, TeamMember, TeamRef,
    ThreadEntry, ThreadEntryType, ThreadEvent, ThreadInfo, TicketDetail, TicketQuery, TicketRef, TicketSort,
    TicketStats, TicketStatus, TicketSummary, TicketUser, Topic, TopicRef, UserAccount, UserDetail, UserEmail,
    UserQuery, UserSummary, Visibility,
};
use helpdesk_api::database::query_builder::SortDirection;
use helpdesk_api::database::{DatabaseError, HelpdeskStore};
use helpdesk_api::server::{app, AppState};
use helpdesk_api::services::{TicketNumberSource, TimestampNumbers};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const USER_PASSWORD: &str = "s3cret";

pub const BILLING_TOPIC: i64 = 3;
pub const PRIVATE_TOPIC: i64 = 4;
pub const INACTIVE_TOPIC: i64 = 5;
pub const BILLING_DEPT: i64 = 7;

pub const CUSTOMER: i64 = 42;
pub const OTHER_CUSTOMER: i64 = 43;
pub const NAMELESS_CUSTOMER: i64 = 44;
pub const AGENT: i64 = 7;
pub const ADMIN: i64 = 1;

pub const ACME_ORG: i64 = 5;
pub const GLOBEX_ORG: i64 = 6;
pub const SUPPORT_TEAM: i64 = 2;
pub const DEFAULT_SLA: i64 = 1;
pub const CALLBACK_TASK: i64 = 9;
pub const PUBLIC_FAQ_CATEGORY: i64 = 1;
pub const PRIVATE_FAQ_CATEGORY: i64 = 2;
pub const PUBLIC_FAQ: i64 = 11;
pub const PRIVATE_FAQ: i64 = 12;
pub const DRAFT_FAQ: i64 = 13;

pub const CRON_KEY: &str = "cron-key-0001";
pub const PLAIN_KEY: &str = "plain-key-0002";
pub const BOUND_KEY: &str = "bound-key-0003";

/// Rows written per table, used to assert nothing leaks from failed writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub tickets: usize,
    pub cdata: usize,
    pub threads: usize,
    pub entries: usize,
}

impl RowCounts {
    pub const ZERO: RowCounts = RowCounts {
        tickets: 0,
        cdata: 0,
        threads: 0,
        entries: 0,
    };
}

#[derive(Debug, Clone)]
pub struct StoredTicket {
    pub ticket_id: i64,
    pub number: String,
    pub user_id: i64,
    pub dept_id: i64,
    pub topic_id: i64,
    pub status_id: i64,
    pub staff_id: i64,
    pub created: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: i64,
    pub thread_id: i64,
    pub user_id: i64,
    pub entry_type: ThreadEntryType,
    pub poster: String,
    pub body: String,
    pub created: NaiveDateTime,
}

#[derive(Default)]
struct Tables {
    topics: Vec<Topic>,
    departments: Vec<DepartmentDetail>,
    statuses: Vec<TicketStatus>,
    default_status: Option<i64>,
    priorities: Vec<Priority>,
    users: Vec<UserAccount>,
    staff: Vec<StaffAccount>,
    api_keys: Vec<(String, ApiKey)>,
    tickets: Vec<StoredTicket>,
    cdata: Vec<(i64, String)>,
    threads: Vec<(i64, i64)>,
    entries: Vec<StoredEntry>,
    events: Vec<ThreadEvent>,
    user_orgs: Vec<(i64, i64)>,
    organizations: Vec<OrganizationDetail>,
    dept_access: Vec<(i64, i64, String)>,
    teams: Vec<TeamDetail>,
    team_members: Vec<(i64, i64)>,
    slas: Vec<SlaDetail>,
    tasks: Vec<TaskDetail>,
    task_entries: Vec<ThreadEntry>,
    faq_categories: Vec<FaqCategory>,
    faqs: Vec<FaqDetail>,
    config: Vec<(String, String)>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_ticket(&self, ticket: &TicketRef) -> Option<&StoredTicket> {
        self.tickets.iter().find(|t| match ticket {
            TicketRef::Id(id) => t.ticket_id == *id,
            TicketRef::Number(number) => &t.number == number,
        })
    }

    fn thread_of(&self, ticket_id: i64) -> Option<i64> {
        self.threads.iter().find(|(_, owner)| *owner == ticket_id).map(|(id, _)| *id)
    }

    fn subject_of(&self, ticket_id: i64) -> Option<String> {
        self.cdata.iter().find(|(id, _)| *id == ticket_id).map(|(_, s)| s.clone())
    }

    fn status(&self, status_id: i64) -> Option<&TicketStatus> {
        self.statuses.iter().find(|s| s.id == status_id)
    }

    fn org_of(&self, user_id: i64) -> i64 {
        self.user_orgs
            .iter()
            .find(|(user, _)| *user == user_id)
            .map(|(_, org)| *org)
            .unwrap_or(0)
    }

    fn department_name(&self, dept_id: i64) -> Option<String> {
        self.departments
            .iter()
            .find(|d| d.department.id == dept_id)
            .map(|d| d.department.name.clone())
    }

    fn organization(&self, org_id: i64) -> Option<Organization> {
        let mut org = self
            .organizations
            .iter()
            .find(|o| o.organization.id == org_id)?
            .organization
            .clone();
        org.user_count = self.user_orgs.iter().filter(|(_, org)| *org == org_id).count() as i64;
        Some(org)
    }

    fn user_summary(&self, user: &UserAccount) -> UserSummary {
        let org_id = self.org_of(user.user_id);
        UserSummary {
            id: user.user_id,
            org_id,
            name: user.name.clone(),
            email: user.email.clone(),
            organization: self.organization(org_id).map(|o| OrganizationRef {
                id: o.id,
                name: Some(o.name),
                domain: None,
            }),
            status: 0,
            created: None,
            updated: None,
        }
    }

    fn staff_summary(&self, staff: &StaffAccount) -> StaffSummary {
        StaffSummary {
            staff_id: staff.staff_id,
            username: staff.username.clone(),
            firstname: staff.firstname.clone(),
            lastname: staff.lastname.clone(),
            name: staff.display_name(),
            email: staff.email.clone(),
            phone: None,
            dept_id: staff.dept_id,
            department: DepartmentRef {
                id: staff.dept_id,
                name: self.department_name(staff.dept_id),
            },
            role_id: staff.role_id,
            role: RoleRef {
                id: staff.role_id,
                name: Some("Agent".to_string()),
                permissions: None,
            },
            isactive: true,
            isadmin: staff.is_admin,
            onvacation: false,
            created: None,
        }
    }

    fn team_member(&self, team: &TeamDetail, staff: &StaffAccount) -> TeamMember {
        TeamMember {
            staff_id: staff.staff_id,
            username: staff.username.clone(),
            name: staff.display_name(),
            email: staff.email.clone(),
            department: DepartmentRef {
                id: staff.dept_id,
                name: self.department_name(staff.dept_id),
            },
            is_lead: team.lead.as_ref().map(|l| l.staff_id) == Some(staff.staff_id),
            isactive: true,
            onvacation: false,
        }
    }

    fn members_of(&self, team: &TeamDetail) -> Vec<TeamMember> {
        self.team_members
            .iter()
            .filter(|(team_id, _)| *team_id == team.team_id)
            .filter_map(|(_, staff_id)| self.staff.iter().find(|s| s.staff_id == *staff_id))
            .map(|staff| self.team_member(team, staff))
            .collect()
    }

    fn faq_category(&self, category_id: i64) -> Option<&FaqCategory> {
        self.faq_categories.iter().find(|c| c.category_id == category_id)
    }

    fn summary(&self, ticket: &StoredTicket) -> TicketSummary {
        let status = self.status(ticket.status_id);
        let topic = self.topics.iter().find(|t| t.topic_id == ticket.topic_id);
        let dept = self.departments.iter().find(|d| d.department.id == ticket.dept_id);
        let user = self.users.iter().find(|u| u.user_id == ticket.user_id);
        let priority = topic
            .and_then(|t| t.priority.as_ref())
            .and_then(|p| p.priority_id)
            .and_then(|id| self.priorities.iter().find(|p| p.priority_id == id));

        TicketSummary {
            ticket_id: ticket.ticket_id,
            number: ticket.number.clone(),
            subject: self.subject_of(ticket.ticket_id),
            user_id: ticket.user_id,
            user_name: user.and_then(|u| u.name.clone()),
            status_id: ticket.status_id,
            status: StatusRef {
                id: ticket.status_id,
                name: status.map(|s| s.name.clone()),
                state: status.map(|s| s.state.clone()),
            },
            dept_id: ticket.dept_id,
            department: DepartmentRef {
                id: ticket.dept_id,
                name: dept.map(|d| d.department.name.clone()),
            },
            topic_id: ticket.topic_id,
            topic: topic.map(|t| TopicRef {
                topic_id: t.topic_id,
                topic: Some(t.topic.clone()),
            }),
            priority: PriorityRef {
                priority_id: priority.map(|p| p.priority_id),
                priority: priority.map(|p| p.priority.clone()),
                priority_color: priority.and_then(|p| p.priority_color.clone()),
                priority_urgency: None,
            },
            staff_id: ticket.staff_id,
            staff_name: None,
            team_id: 0,
            source: Some("Web".to_string()),
            isoverdue: false,
            isanswered: false,
            duedate: None,
            est_duedate: None,
            closed: None,
            created: Some(ticket.created),
            updated: Some(ticket.created),
        }
    }
}

fn page_of<T>(items: Vec<T>, page: PageRequest) -> Paged<T> {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    Paged { items, total }
}

/// In-memory help desk used by the integration tests.
///
/// `insert_ticket` stages all four rows and only keeps them when every
/// step succeeded, mirroring the transactional MySQL write.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_thread_entry: AtomicBool,
    fail_ping: AtomicBool,
}

impl MemoryStore {
    pub fn empty() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_thread_entry: AtomicBool::new(false),
            fail_ping: AtomicBool::new(false),
        }
    }

    /// Billing/Internal departments, a public, a private and an inactive topic,
    /// three end users, two staff members and three API keys, plus the
    /// directory: two organizations, a team, an SLA plan, a task with a
    /// thread and public, private and draft FAQ articles.
    pub fn seeded() -> Self {
        let store = Self::empty();
        {
            let mut t = store.lock();
            t.next_id = 1000;

            t.departments = vec![department(BILLING_DEPT, "Billing", true), department(8, "Internal", false)];
            t.topics = vec![
                topic(BILLING_TOPIC, "Billing question", (BILLING_DEPT, "Billing"), true, true),
                topic(PRIVATE_TOPIC, "Internal escalation", (8, "Internal"), false, true),
                topic(INACTIVE_TOPIC, "Retired topic", (BILLING_DEPT, "Billing"), true, false),
            ];
            t.statuses = vec![
                status(1, "Open", "open", 1),
                status(2, "Resolved", "closed", 2),
                status(3, "Closed", "closed", 3),
            ];
            t.default_status = Some(1);
            t.priorities = vec![
                priority(1, "Low", 4, true),
                priority(2, "Normal", 3, true),
                priority(3, "High", 2, true),
                priority(4, "Emergency", 1, false),
            ];

            let hash = bcrypt::hash(USER_PASSWORD, 4).expect("bcrypt hash");
            t.users = vec![
                user(CUSTOMER, "pat", Some("Pat Customer"), "pat@example.com", &hash),
                user(OTHER_CUSTOMER, "sam", Some("Sam Other"), "sam@example.com", &hash),
                user(NAMELESS_CUSTOMER, "anon", None, "anon@example.com", &hash),
            ];
            t.staff = vec![
                staff(AGENT, "agent", "Alex", "Agent", false, &hash),
                staff(ADMIN, "admin", "Ada", "Admin", true, &hash),
            ];
            t.api_keys = vec![
                (CRON_KEY.to_string(), api_key(1, None, true)),
                (PLAIN_KEY.to_string(), api_key(2, Some("0.0.0.0"), false)),
                (BOUND_KEY.to_string(), api_key(3, Some("10.1.2.3"), true)),
            ];

            t.user_orgs = vec![(CUSTOMER, ACME_ORG)];
            t.organizations = vec![
                organization(ACME_ORG, "Acme", Some("acme.example"), Some("s:7")),
                organization(GLOBEX_ORG, "Globex", None, Some("t:1")),
            ];
            t.dept_access = vec![(ADMIN, 8, "Manager".to_string())];
            t.teams = vec![team(SUPPORT_TEAM, "Support", AGENT, "Alex Agent")];
            t.team_members = vec![(SUPPORT_TEAM, AGENT), (SUPPORT_TEAM, ADMIN)];
            t.slas = vec![SlaDetail {
                plan: SlaPlan::new(DEFAULT_SLA, "Default SLA".to_string(), 18, sla_flags::ACTIVE | sla_flags::ESCALATE),
                notes: None,
                usage: SlaUsage::default(),
            }];
            if let Some(billing) = t.departments.iter_mut().find(|d| d.department.id == BILLING_DEPT) {
                billing.department.sla = Some(SlaRef {
                    id: DEFAULT_SLA,
                    name: Some("Default SLA".to_string()),
                    grace_period: None,
                });
            }

            let created = chrono::Utc::now().naive_utc();
            t.tasks = vec![task(CALLBACK_TASK, "Call the customer back", 900)];
            t.task_entries = ["Left a voicemail", "Customer called back"]
                .into_iter()
                .enumerate()
                .map(|(i, body)| ThreadEntry {
                    id: 950 + i as i64,
                    thread_id: 900,
                    staff_id: AGENT,
                    user_id: 0,
                    entry_type: ThreadEntryType::Note,
                    poster: Some("Alex Agent".to_string()),
                    email: None,
                    title: None,
                    body: body.to_string(),
                    format: Some("text".to_string()),
                    source: None,
                    created: Some(created + chrono::Duration::seconds(i as i64)),
                })
                .collect();

            t.faq_categories = vec![
                faq_category(PUBLIC_FAQ_CATEGORY, "Accounts", true),
                faq_category(PRIVATE_FAQ_CATEGORY, "Runbooks", false),
            ];
            t.faqs = vec![
                faq(PUBLIC_FAQ, (PUBLIC_FAQ_CATEGORY, "Accounts", true), "How do I reset my password?", true),
                faq(PRIVATE_FAQ, (PRIVATE_FAQ_CATEGORY, "Runbooks", false), "How are refunds approved?", true),
                faq(DRAFT_FAQ, (PUBLIC_FAQ_CATEGORY, "Accounts", true), "How do I close my account?", false),
            ];
            t.config = [
                ("helpdesk_title", "Test Help Desk"),
                ("default_dept_id", "7"),
                ("enable_kb", "1"),
                ("max_file_size", "2097152"),
                ("unrelated_key", "ignored"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_thread_entry_inserts(&self, fail: bool) {
        self.fail_thread_entry.store(fail, Ordering::SeqCst);
    }

    pub fn fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub fn clear_default_status(&self) {
        self.lock().default_status = None;
    }

    pub fn counts(&self) -> RowCounts {
        let t = self.lock();
        RowCounts {
            tickets: t.tickets.len(),
            cdata: t.cdata.len(),
            threads: t.threads.len(),
            entries: t.entries.len(),
        }
    }

    pub fn ticket(&self, ticket_id: i64) -> Option<StoredTicket> {
        self.lock().tickets.iter().find(|t| t.ticket_id == ticket_id).cloned()
    }

    pub fn subject(&self, ticket_id: i64) -> Option<String> {
        self.lock().subject_of(ticket_id)
    }

    pub fn entries(&self, ticket_id: i64) -> Vec<StoredEntry> {
        let t = self.lock();
        match t.thread_of(ticket_id) {
            Some(thread_id) => t.entries.iter().filter(|e| e.thread_id == thread_id).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn assign_ticket(&self, ticket_id: i64, staff_id: i64) {
        if let Some(ticket) = self.lock().tickets.iter_mut().find(|t| t.ticket_id == ticket_id) {
            ticket.staff_id = staff_id;
        }
    }

    /// Existing ticket owned by `user_id`, bypassing the HTTP layer
    pub fn seed_ticket(&self, number: &str, user_id: i64, subject: &str) -> i64 {
        let mut t = self.lock();
        let ticket_id = t.next_id();
        let thread_id = t.next_id();
        let created = chrono::Utc::now().naive_utc();
        t.tickets.push(StoredTicket {
            ticket_id,
            number: number.to_string(),
            user_id,
            dept_id: BILLING_DEPT,
            topic_id: BILLING_TOPIC,
            status_id: 1,
            staff_id: 0,
            created,
        });
        t.cdata.push((ticket_id, subject.to_string()));
        t.threads.push((thread_id, ticket_id));
        for (i, (entry_type, body)) in [
            (ThreadEntryType::Message, "First message"),
            (ThreadEntryType::Response, "Agent reply"),
            (ThreadEntryType::Note, "Internal note"),
        ]
        .into_iter()
        .enumerate()
        {
            let id = t.next_id();
            t.entries.push(StoredEntry {
                id,
                thread_id,
                user_id,
                entry_type,
                poster: "Pat Customer".to_string(),
                body: body.to_string(),
                created: created + chrono::Duration::seconds(i as i64),
            });
        }
        for (i, name) in ["created", "assigned"].into_iter().enumerate() {
            let id = t.next_id();
            t.events.push(ThreadEvent {
                id,
                thread_id,
                event_id: Some(i as i64 + 1),
                event_name: Some(name.to_string()),
                staff_id: 0,
                username: Some("SYSTEM".to_string()),
                data: None,
                timestamp: Some(created + chrono::Duration::seconds(i as i64)),
            });
        }
        ticket_id
    }
}

#[async_trait]
impl HelpdeskStore for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn close(&self) {}

    async fn find_intake_topic(&self, topic_id: i64) -> Result<Option<IntakeTopic>, DatabaseError> {
        let t = self.lock();
        Ok(t.topics
            .iter()
            .find(|topic| topic.topic_id == topic_id && topic.isactive && topic.ispublic)
            .map(|topic| IntakeTopic {
                topic_id: topic.topic_id,
                dept_id: topic.department.as_ref().map(|d| d.id).unwrap_or(0),
                dept_name: topic.department.as_ref().and_then(|d| d.name.clone()),
                priority_id: topic.priority.as_ref().and_then(|p| p.priority_id).unwrap_or(0),
            }))
    }

    async fn default_open_status(&self) -> Result<Option<i64>, DatabaseError> {
        Ok(self.lock().default_status)
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let t = self.lock();
        Ok(t.users.iter().find(|u| u.user_id == user_id).and_then(|u| u.email.clone()))
    }

    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<i64, DatabaseError> {
        let mut t = self.lock();
        if t.tickets.iter().any(|existing| existing.number == ticket.number) {
            return Err(DatabaseError::DuplicateKey(format!("number '{}'", ticket.number)));
        }

        let ticket_id = t.next_id();
        let thread_id = t.next_id();
        let entry_id = t.next_id();
        if self.fail_thread_entry.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("thread entry insert failed".to_string()));
        }

        t.tickets.push(StoredTicket {
            ticket_id,
            number: ticket.number.clone(),
            user_id: ticket.user_id,
            dept_id: ticket.dept_id,
            topic_id: ticket.topic_id,
            status_id: ticket.status_id,
            staff_id: 0,
            created: ticket.created,
        });
        t.cdata.push((ticket_id, ticket.subject.clone()));
        t.threads.push((thread_id, ticket_id));
        t.entries.push(StoredEntry {
            id: entry_id,
            thread_id,
            user_id: ticket.user_id,
            entry_type: ThreadEntryType::Message,
            poster: ticket.poster.clone(),
            body: ticket.body.clone(),
            created: ticket.created,
        });
        Ok(ticket_id)
    }

    async fn list_tickets(&self, query: &TicketQuery, page: PageRequest) -> Result<Paged<TicketSummary>, DatabaseError> {
        let t = self.lock();
        let mut matching: Vec<&StoredTicket> = t
            .tickets
            .iter()
            .filter(|ticket| query.owner.map_or(true, |owner| ticket.user_id == owner))
            .filter(|ticket| query.user_id.map_or(true, |id| ticket.user_id == id))
            .filter(|ticket| query.org_id.map_or(true, |org| t.org_of(ticket.user_id) == org))
            .filter(|ticket| query.dept_id.map_or(true, |id| ticket.dept_id == id))
            .filter(|ticket| query.staff_id.map_or(true, |id| ticket.staff_id == id))
            .filter(|ticket| query.topic_id.map_or(true, |id| ticket.topic_id == id))
            .filter(|ticket| {
                query
                    .state
                    .as_deref()
                    .map_or(true, |state| t.status(ticket.status_id).map(|s| s.state.as_str()) == Some(state))
            })
            .filter(|ticket| {
                query.search.as_deref().map_or(true, |term| {
                    ticket.number.contains(term) || t.subject_of(ticket.ticket_id).unwrap_or_default().contains(term)
                })
            })
            .filter(|_| !query.overdue_only)
            .collect();

        matching.sort_by(|a, b| match query.sort {
            TicketSort::TicketId => a.ticket_id.cmp(&b.ticket_id),
            _ => (a.created, a.ticket_id).cmp(&(b.created, b.ticket_id)),
        });
        if query.direction == SortDirection::Desc {
            matching.reverse();
        }

        let summaries = matching.into_iter().map(|ticket| t.summary(ticket)).collect();
        Ok(page_of(summaries, page))
    }

    async fn get_ticket(&self, ticket: &TicketRef) -> Result<Option<TicketDetail>, DatabaseError> {
        let t = self.lock();
        let Some(stored) = t.find_ticket(ticket) else {
            return Ok(None);
        };
        let user = t.users.iter().find(|u| u.user_id == stored.user_id);

        Ok(Some(TicketDetail {
            summary: t.summary(stored),
            user: TicketUser {
                id: stored.user_id,
                name: user.and_then(|u| u.name.clone()),
                email: user.and_then(|u| u.email.clone()),
            },
            staff: None,
            team: None,
            sla: None,
            thread: ThreadInfo {
                id: t.thread_of(stored.ticket_id),
                lastresponse: None,
                lastmessage: Some(stored.created),
            },
            collaborators: Vec::new(),
        }))
    }

    async fn ticket_owner(&self, ticket: &TicketRef) -> Result<Option<i64>, DatabaseError> {
        Ok(self.lock().find_ticket(ticket).map(|t| t.user_id))
    }

    async fn thread_entries(
        &self,
        ticket: &TicketRef,
        page: PageRequest,
    ) -> Result<Option<Paged<ThreadEntry>>, DatabaseError> {
        let t = self.lock();
        let Some(thread_id) = t.find_ticket(ticket).and_then(|s| t.thread_of(s.ticket_id)) else {
            return Ok(None);
        };

        let mut entries: Vec<&StoredEntry> = t.entries.iter().filter(|e| e.thread_id == thread_id).collect();
        entries.sort_by_key(|e| (e.created, e.id));
        let entries = entries
            .into_iter()
            .map(|e| ThreadEntry {
                id: e.id,
                thread_id: e.thread_id,
                staff_id: 0,
                user_id: e.user_id,
                entry_type: e.entry_type,
                poster: Some(e.poster.clone()),
                email: None,
                title: None,
                body: e.body.clone(),
                format: Some("text".to_string()),
                source: Some("Web".to_string()),
                created: Some(e.created),
            })
            .collect();
        Ok(Some(page_of(entries, page)))
    }

    async fn thread_events(&self, ticket: &TicketRef) -> Result<Option<Vec<ThreadEvent>>, DatabaseError> {
        let t = self.lock();
        let Some(thread_id) = t.find_ticket(ticket).and_then(|s| t.thread_of(s.ticket_id)) else {
            return Ok(None);
        };
        let mut events: Vec<ThreadEvent> = t.events.iter().filter(|e| e.thread_id == thread_id).cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Some(events))
    }

    async fn list_topics(&self, visibility: Visibility, page: PageRequest) -> Result<Paged<Topic>, DatabaseError> {
        let t = self.lock();
        let topics = t
            .topics
            .iter()
            .filter(|topic| match visibility {
                Visibility::PublicOnly => topic.ispublic,
                Visibility::Staff(flag) => flag.map_or(true, |public| topic.ispublic == public),
            })
            .cloned()
            .collect();
        Ok(page_of(topics, page))
    }

    async fn get_topic(&self, topic_id: i64) -> Result<Option<Topic>, DatabaseError> {
        let t = self.lock();
        Ok(t.topics.iter().find(|topic| topic.topic_id == topic_id).cloned().map(|mut topic| {
            topic.forms = Some(Vec::new());
            topic
        }))
    }

    async fn list_departments(
        &self,
        visibility: Visibility,
        page: PageRequest,
    ) -> Result<Paged<Department>, DatabaseError> {
        let t = self.lock();
        let departments = t
            .departments
            .iter()
            .map(|d| d.department.clone())
            .filter(|d| match visibility {
                Visibility::PublicOnly => d.ispublic,
                Visibility::Staff(flag) => flag.map_or(true, |public| d.ispublic == public),
            })
            .collect();
        Ok(page_of(departments, page))
    }

    async fn get_department(&self, dept_id: i64) -> Result<Option<DepartmentDetail>, DatabaseError> {
        let t = self.lock();
        let Some(detail) = t.departments.iter().find(|d| d.department.id == dept_id) else {
            return Ok(None);
        };
        let mut detail = detail.clone();
        detail.staff_count = t.staff.iter().filter(|s| s.dept_id == dept_id).count() as i64;
        detail.open_ticket_count = t
            .tickets
            .iter()
            .filter(|ticket| ticket.dept_id == dept_id)
            .filter(|ticket| t.status(ticket.status_id).map(|s| s.state.as_str()) == Some("open"))
            .count() as i64;
        Ok(Some(detail))
    }

    async fn department_staff(&self, dept_id: i64) -> Result<Vec<DepartmentMember>, DatabaseError> {
        let t = self.lock();
        let member = |staff: &StaffAccount, role: Option<String>, is_primary: bool| DepartmentMember {
            staff_id: staff.staff_id,
            username: staff.username.clone(),
            name: staff.display_name(),
            email: staff.email.clone(),
            role,
            is_primary,
            onvacation: false,
        };
        let mut members: Vec<DepartmentMember> = t
            .staff
            .iter()
            .filter(|s| s.dept_id == dept_id)
            .map(|s| member(s, Some("Agent".to_string()), true))
            .collect();
        for (staff_id, _, role) in t.dept_access.iter().filter(|(_, dept, _)| *dept == dept_id) {
            if let Some(staff) = t.staff.iter().find(|s| s.staff_id == *staff_id) {
                members.push(member(staff, Some(role.clone()), false));
            }
        }
        Ok(members)
    }

    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> Result<Paged<UserSummary>, DatabaseError> {
        let t = self.lock();
        let users = t
            .users
            .iter()
            .filter(|u| query.org_id.map_or(true, |org| t.org_of(u.user_id) == org))
            .filter(|u| {
                query.search.as_deref().map_or(true, |term| {
                    u.name.as_deref().unwrap_or("").contains(term) || u.email.as_deref().unwrap_or("").contains(term)
                })
            })
            .map(|u| t.user_summary(u))
            .collect();
        Ok(page_of(users, page))
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserDetail>, DatabaseError> {
        let t = self.lock();
        let Some(user) = t.users.iter().find(|u| u.user_id == user_id) else {
            return Ok(None);
        };
        let org_id = t.org_of(user_id);
        let organization = t.organizations.iter().find(|o| o.organization.id == org_id).map(|o| OrganizationRef {
            id: org_id,
            name: Some(o.organization.name.clone()),
            domain: o.organization.domain.clone(),
        });

        Ok(Some(UserDetail {
            id: user.user_id,
            name: user.name.clone(),
            status: 0,
            organization,
            emails: user
                .email
                .iter()
                .map(|address| UserEmail {
                    id: user.user_id * 10,
                    address: address.clone(),
                    flags: 0,
                    is_default: true,
                })
                .collect(),
            ticket_count: t.tickets.iter().filter(|ticket| ticket.user_id == user_id).count() as i64,
            created: None,
            updated: None,
            default_email_id: user.user_id * 10,
        }))
    }

    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>, DatabaseError> {
        let t = self.lock();
        Ok(t.organization(t.org_of(user_id)).into_iter().collect())
    }

    async fn list_staff(&self, query: &StaffQuery, page: PageRequest) -> Result<Paged<StaffSummary>, DatabaseError> {
        let t = self.lock();
        let staff = t
            .staff
            .iter()
            .filter(|s| query.dept_id.map_or(true, |id| s.dept_id == id))
            .filter(|_| query.isactive.unwrap_or(true))
            .map(|s| t.staff_summary(s))
            .collect();
        Ok(page_of(staff, page))
    }

    async fn get_staff(&self, staff_id: i64) -> Result<Option<StaffDetail>, DatabaseError> {
        let summary = {
            let t = self.lock();
            let Some(staff) = t.staff.iter().find(|s| s.staff_id == staff_id) else {
                return Ok(None);
            };
            let mut summary = t.staff_summary(staff);
            summary.role.permissions = Some(staff.permissions.clone().unwrap_or_else(|| json!({})));
            summary
        };

        Ok(Some(StaffDetail {
            staff: summary,
            phone_ext: None,
            mobile: None,
            signature: None,
            timezone: Some("UTC".to_string()),
            departments: self.staff_departments(staff_id).await?.unwrap_or_default(),
            teams: self.staff_teams(staff_id).await?,
            isvisible: true,
            assigned_only: false,
            lastlogin: None,
        }))
    }

    async fn staff_departments(&self, staff_id: i64) -> Result<Option<Vec<StaffDepartment>>, DatabaseError> {
        let t = self.lock();
        let Some(staff) = t.staff.iter().find(|s| s.staff_id == staff_id) else {
            return Ok(None);
        };
        let department = |dept_id: i64, role: Option<String>, is_primary: bool| StaffDepartment {
            id: dept_id,
            name: t.department_name(dept_id),
            path: Some(format!("/{}/", dept_id)),
            role,
            is_primary,
        };

        let mut departments = vec![department(staff.dept_id, None, true)];
        departments.extend(
            t.dept_access
                .iter()
                .filter(|(staff, _, _)| *staff == staff_id)
                .map(|(_, dept_id, role)| department(*dept_id, Some(role.clone()), false)),
        );
        Ok(Some(departments))
    }

    async fn staff_teams(&self, staff_id: i64) -> Result<Vec<StaffTeam>, DatabaseError> {
        let t = self.lock();
        Ok(t.team_members
            .iter()
            .filter(|(_, staff)| *staff == staff_id)
            .filter_map(|(team_id, _)| t.teams.iter().find(|team| team.team_id == *team_id))
            .map(|team| StaffTeam {
                team_id: team.team_id,
                name: Some(team.name.clone()),
                is_lead: team.lead.as_ref().map(|l| l.staff_id) == Some(staff_id),
                created: team.created,
            })
            .collect())
    }

    async fn list_teams(&self, page: PageRequest) -> Result<Paged<Team>, DatabaseError> {
        let t = self.lock();
        let teams = t
            .teams
            .iter()
            .map(|team| Team {
                team_id: team.team_id,
                name: team.name.clone(),
                lead: team.lead.clone(),
                flags: team.flags,
                member_count: t.team_members.iter().filter(|(id, _)| *id == team.team_id).count() as i64,
                created: team.created,
            })
            .collect();
        Ok(page_of(teams, page))
    }

    async fn get_team(&self, team_id: i64) -> Result<Option<TeamDetail>, DatabaseError> {
        let t = self.lock();
        Ok(t.teams.iter().find(|team| team.team_id == team_id).map(|team| {
            let mut detail = team.clone();
            detail.members = t.members_of(team);
            detail
        }))
    }

    async fn team_members(&self, team_id: i64) -> Result<Option<Vec<TeamMember>>, DatabaseError> {
        let t = self.lock();
        Ok(t.teams.iter().find(|team| team.team_id == team_id).map(|team| t.members_of(team)))
    }

    async fn list_organizations(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paged<Organization>, DatabaseError> {
        let t = self.lock();
        let mut organizations: Vec<Organization> = t
            .organizations
            .iter()
            .filter(|o| {
                search.map_or(true, |term| {
                    o.organization.name.contains(term) || o.organization.domain.as_deref().unwrap_or("").contains(term)
                })
            })
            .filter_map(|o| t.organization(o.organization.id))
            .collect();
        organizations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page_of(organizations, page))
    }

    async fn get_organization(&self, org_id: i64) -> Result<Option<OrganizationDetail>, DatabaseError> {
        let t = self.lock();
        let Some(stored) = t.organizations.iter().find(|o| o.organization.id == org_id) else {
            return Ok(None);
        };
        let mut detail = stored.clone();
        if let Some(organization) = t.organization(org_id) {
            detail.organization = organization;
        }
        detail.ticket_count = t
            .tickets
            .iter()
            .filter(|ticket| t.org_of(ticket.user_id) == org_id)
            .count() as i64;
        detail.manager = detail
            .manager_ref
            .as_deref()
            .and_then(manager_staff_id)
            .and_then(|staff_id| t.staff.iter().find(|s| s.staff_id == staff_id))
            .map(|staff| OrganizationManager::Staff {
                staff_id: staff.staff_id,
                name: staff.display_name(),
                email: staff.email.clone(),
            });
        Ok(Some(detail))
    }

    async fn list_slas(&self) -> Result<Vec<SlaPlan>, DatabaseError> {
        let mut plans: Vec<SlaPlan> = self.lock().slas.iter().map(|s| s.plan.clone()).collect();
        plans.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(plans)
    }

    async fn get_sla(&self, sla_id: i64) -> Result<Option<SlaDetail>, DatabaseError> {
        let t = self.lock();
        Ok(t.slas.iter().find(|s| s.plan.id == sla_id).map(|sla| {
            let mut detail = sla.clone();
            detail.usage = SlaUsage {
                open_tickets: 0,
                departments: t
                    .departments
                    .iter()
                    .filter(|d| d.department.sla.as_ref().map(|s| s.id) == Some(sla_id))
                    .count() as i64,
                help_topics: t
                    .topics
                    .iter()
                    .filter(|topic| topic.sla.as_ref().map(|s| s.id) == Some(sla_id))
                    .count() as i64,
            };
            detail
        }))
    }

    async fn list_tasks(&self, query: &TaskQuery, page: PageRequest) -> Result<Paged<TaskSummary>, DatabaseError> {
        let t = self.lock();
        let tasks = t
            .tasks
            .iter()
            .map(|detail| &detail.task)
            .filter(|task| query.staff_id.map_or(true, |id| task.staff_id == id))
            .filter(|task| query.dept_id.map_or(true, |id| task.dept_id == id))
            .filter(|task| query.team_id.map_or(true, |id| task.team_id == id))
            .cloned()
            .collect();
        Ok(page_of(tasks, page))
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskDetail>, DatabaseError> {
        Ok(self.lock().tasks.iter().find(|detail| detail.task.id == task_id).cloned())
    }

    async fn task_thread(&self, task_id: i64, page: PageRequest) -> Result<Option<Paged<ThreadEntry>>, DatabaseError> {
        let t = self.lock();
        let Some(thread_id) = t
            .tasks
            .iter()
            .find(|detail| detail.task.id == task_id)
            .and_then(|detail| detail.thread_id)
        else {
            return Ok(None);
        };
        let entries = t.task_entries.iter().filter(|e| e.thread_id == thread_id).cloned().collect();
        Ok(Some(page_of(entries, page)))
    }

    async fn list_faqs(&self, query: &FaqQuery, page: PageRequest) -> Result<Paged<Faq>, DatabaseError> {
        let t = self.lock();
        let mut faqs: Vec<Faq> = t
            .faqs
            .iter()
            .filter(|detail| detail.faq.ispublished)
            .filter(|detail| !query.public_only || detail.is_public())
            .map(|detail| &detail.faq)
            .filter(|faq| query.category_id.map_or(true, |id| faq.category_id == id))
            .filter(|faq| {
                query.search.as_deref().map_or(true, |term| {
                    faq.question.contains(term)
                        || faq.answer.contains(term)
                        || faq.keywords.as_deref().unwrap_or("").contains(term)
                })
            })
            .cloned()
            .collect();
        faqs.sort_by(|a, b| a.question.cmp(&b.question));
        Ok(page_of(faqs, page))
    }

    async fn list_faq_categories(&self, public_only: bool) -> Result<Vec<FaqCategory>, DatabaseError> {
        let t = self.lock();
        let mut categories: Vec<FaqCategory> = t
            .faq_categories
            .iter()
            .filter(|c| !public_only || c.ispublic)
            .map(|c| {
                let mut category = c.clone();
                category.faq_count = t
                    .faqs
                    .iter()
                    .filter(|f| f.faq.category_id == c.category_id && f.faq.ispublished)
                    .count() as i64;
                category
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_faq(&self, faq_id: i64) -> Result<Option<FaqDetail>, DatabaseError> {
        let t = self.lock();
        Ok(t.faqs.iter().find(|f| f.faq.faq_id == faq_id).map(|f| {
            let mut detail = f.clone();
            detail.category_public = t.faq_category(f.faq.category_id).map_or(false, |c| c.ispublic);
            detail
        }))
    }

    async fn system_config(&self) -> Result<SystemConfig, DatabaseError> {
        let t = self.lock();
        let pairs = t
            .config
            .iter()
            .filter(|(key, _)| SystemConfig::KEYS.contains(&key.as_str()))
            .cloned();
        Ok(SystemConfig::from_pairs(pairs))
    }

    async fn system_stats(&self) -> Result<SystemStats, DatabaseError> {
        let t = self.lock();
        let state_of = |ticket: &StoredTicket| t.status(ticket.status_id).map(|s| s.state.clone());
        let open = t.tickets.iter().filter(|ticket| state_of(ticket).as_deref() == Some("open"));
        let today = chrono::Utc::now().naive_utc().date();

        Ok(SystemStats {
            tickets: TicketStats {
                total: t.tickets.len() as i64,
                open: open.clone().count() as i64,
                closed: t
                    .tickets
                    .iter()
                    .filter(|ticket| state_of(ticket).as_deref() == Some("closed"))
                    .count() as i64,
                overdue: 0,
                unassigned: open.filter(|ticket| ticket.staff_id == 0).count() as i64,
                today: t.tickets.iter().filter(|ticket| ticket.created.date() == today).count() as i64,
            },
            users: t.users.len() as i64,
            staff: t.staff.len() as i64,
            departments: t.departments.len() as i64,
            teams: t.teams.len() as i64,
            organizations: t.organizations.len() as i64,
        })
    }

    async fn list_statuses(&self) -> Result<Vec<TicketStatus>, DatabaseError> {
        let mut statuses = self.lock().statuses.clone();
        statuses.sort_by_key(|s| s.sort);
        Ok(statuses)
    }

    async fn list_priorities(&self, public_only: bool) -> Result<Vec<Priority>, DatabaseError> {
        let mut priorities: Vec<Priority> = self
            .lock()
            .priorities
            .iter()
            .filter(|p| !public_only || p.ispublic)
            .cloned()
            .collect();
        priorities.sort_by(|a, b| b.priority_urgency.cmp(&a.priority_urgency));
        Ok(priorities)
    }

    async fn find_user_account(&self, username: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let t = self.lock();
        Ok(t.users.iter().find(|u| u.username.as_deref() == Some(username)).cloned())
    }

    async fn find_staff_account(&self, login: &str) -> Result<Option<StaffAccount>, DatabaseError> {
        let t = self.lock();
        Ok(t.staff
            .iter()
            .find(|s| s.username == login || s.email.as_deref() == Some(login))
            .cloned())
    }

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, DatabaseError> {
        let t = self.lock();
        Ok(t.api_keys.iter().find(|(k, _)| k == key).map(|(_, found)| found.clone()))
    }
}

fn department(id: i64, name: &str, ispublic: bool) -> DepartmentDetail {
    DepartmentDetail {
        department: Department {
            id,
            pid: 0,
            name: name.to_string(),
            path: Some(format!("/{}/", id)),
            ispublic,
            flags: 0,
            parent: None,
            manager: None,
            sla: None,
            created: None,
        },
        signature: None,
        ticket_auto_response: true,
        message_auto_response: true,
        staff_count: 0,
        open_ticket_count: 0,
        updated: None,
    }
}

fn topic(id: i64, name: &str, dept: (i64, &str), ispublic: bool, isactive: bool) -> Topic {
    Topic {
        topic_id: id,
        topic_pid: 0,
        topic: name.to_string(),
        isactive,
        ispublic,
        noautoresp: false,
        flags: 0,
        sort: id,
        parent: None,
        department: Some(DepartmentRef {
            id: dept.0,
            name: Some(dept.1.to_string()),
        }),
        priority: Some(PriorityRef {
            priority_id: Some(2),
            priority: Some("Normal".to_string()),
            priority_color: None,
            priority_urgency: None,
        }),
        sla: None,
        number_format: None,
        notes: None,
        default_assignee: None,
        forms: None,
        created: None,
        updated: None,
    }
}

fn status(id: i64, name: &str, state: &str, sort: i64) -> TicketStatus {
    TicketStatus {
        id,
        name: name.to_string(),
        state: state.to_string(),
        flags: 0,
        sort,
        properties: None,
    }
}

fn priority(id: i64, name: &str, urgency: i64, ispublic: bool) -> Priority {
    Priority {
        priority_id: id,
        priority: name.to_string(),
        priority_desc: Some(name.to_string()),
        priority_color: Some("#DDFFDD".to_string()),
        priority_urgency: urgency,
        ispublic,
    }
}

fn user(id: i64, username: &str, name: Option<&str>, email: &str, hash: &str) -> UserAccount {
    UserAccount {
        user_id: id,
        username: Some(username.to_string()),
        name: name.map(str::to_string),
        email: Some(email.to_string()),
        passwd: Some(hash.to_string()),
    }
}

fn staff(id: i64, username: &str, first: &str, last: &str, is_admin: bool, hash: &str) -> StaffAccount {
    StaffAccount {
        staff_id: id,
        username: username.to_string(),
        firstname: Some(first.to_string()),
        lastname: Some(last.to_string()),
        email: Some(format!("{}@helpdesk.example.com", username)),
        passwd: Some(hash.to_string()),
        is_admin,
        dept_id: BILLING_DEPT,
        role_id: 1,
        permissions: Some(json!({"ticket.create": true, "ticket.assign": true})),
    }
}

fn organization(id: i64, name: &str, domain: Option<&str>, manager: Option<&str>) -> OrganizationDetail {
    OrganizationDetail {
        organization: Organization {
            id,
            name: name.to_string(),
            domain: domain.map(str::to_string),
            status: 0,
            user_count: 0,
            created: None,
            updated: None,
        },
        manager: None,
        extra: None,
        ticket_count: 0,
        manager_ref: manager.map(str::to_string),
    }
}

fn team(id: i64, name: &str, lead_id: i64, lead_name: &str) -> TeamDetail {
    TeamDetail {
        team_id: id,
        name: name.to_string(),
        notes: Some("First line support".to_string()),
        flags: 1,
        lead: Some(StaffRef {
            staff_id: lead_id,
            name: lead_name.to_string(),
            email: None,
        }),
        members: Vec::new(),
        created: None,
        updated: None,
    }
}

fn task(id: i64, title: &str, thread_id: i64) -> TaskDetail {
    TaskDetail {
        task: TaskSummary {
            id,
            number: Some(format!("T{}", id)),
            title: Some(title.to_string()),
            object_id: 0,
            object_type: None,
            dept_id: BILLING_DEPT,
            department: Some(DepartmentRef {
                id: BILLING_DEPT,
                name: Some("Billing".to_string()),
            }),
            staff_id: AGENT,
            staff_name: Some("Alex Agent".to_string()),
            team_id: SUPPORT_TEAM,
            team_name: Some("Support".to_string()),
            flags: 1,
            is_closed: false,
            duedate: None,
            closed: None,
            created: None,
            updated: None,
        },
        description: Some("Follow up on the billing question".to_string()),
        staff: Some(StaffRef {
            staff_id: AGENT,
            name: "Alex Agent".to_string(),
            email: Some("agent@helpdesk.example.com".to_string()),
        }),
        team: Some(TeamRef {
            team_id: SUPPORT_TEAM,
            name: Some("Support".to_string()),
        }),
        ticket: None,
        thread_id: Some(thread_id),
    }
}

fn faq_category(id: i64, name: &str, ispublic: bool) -> FaqCategory {
    FaqCategory {
        category_id: id,
        category_pid: 0,
        name: name.to_string(),
        description: None,
        ispublic,
        faq_count: 0,
        created: None,
    }
}

fn faq(id: i64, category: (i64, &str, bool), question: &str, ispublished: bool) -> FaqDetail {
    FaqDetail {
        faq: Faq {
            faq_id: id,
            category_id: category.0,
            category: Some(FaqCategoryRef {
                category_id: category.0,
                name: Some(category.1.to_string()),
            }),
            question: question.to_string(),
            answer: format!("Answer to: {}", question),
            keywords: None,
            ispublished,
            created: None,
            updated: None,
        },
        notes: None,
        topics: Vec::new(),
        category_public: category.2,
    }
}

fn api_key(id: i64, ipaddr: Option<&str>, can_exec_cron: bool) -> ApiKey {
    ApiKey {
        id,
        ipaddr: ipaddr.map(str::to_string),
        can_create_tickets: true,
        can_exec_cron,
    }
}

/// Replays the given numbers, then falls back to generated ones.
pub struct ScriptedNumbers {
    queue: Mutex<VecDeque<String>>,
}

impl ScriptedNumbers {
    pub fn new(numbers: &[&str]) -> Self {
        Self {
            queue: Mutex::new(numbers.iter().map(|n| n.to_string()).collect()),
        }
    }
}

impl TicketNumberSource for ScriptedNumbers {
    fn next_number(&self) -> String {
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.unwrap_or_else(|| TimestampNumbers.next_number())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        "HELPDESK_TITLE" => Some("Test Help Desk".to_string()),
        "API_RATE_LIMIT" => Some("10000".to_string()),
        _ => None,
    })
}

/// Router served in-process on a free port for the lifetime of the test.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub config: AppConfig,
    pub client: reqwest::Client,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(Arc::new(MemoryStore::seeded()), None).await
    }

    pub async fn start_with(store: Arc<MemoryStore>, numbers: Option<Arc<dyn TicketNumberSource>>) -> Result<Self> {
        Self::launch(store, numbers, test_config()).await
    }

    /// Seeded store with a custom configuration
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        Self::launch(Arc::new(MemoryStore::seeded()), None, config).await
    }

    async fn launch(
        store: Arc<MemoryStore>,
        numbers: Option<Arc<dyn TicketNumberSource>>,
        config: AppConfig,
    ) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let dyn_store: Arc<dyn HelpdeskStore> = store.clone();
        let state = match numbers {
            Some(numbers) => AppState::with_numbers(config.clone(), dyn_store, numbers),
            None => AppState::new(config.clone(), dyn_store),
        };

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let task = tokio::spawn(async move {
            let service = app(state).into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                eprintln!("test server stopped: {}", e);
            }
        });

        let server = Self {
            port,
            base_url,
            store,
            config,
            client: reqwest::Client::new(),
            task,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token_for(&self, identity: Identity) -> String {
        generate_jwt(identity, &self.config.security).expect("sign test token")
    }

    pub fn customer_token(&self) -> String {
        self.token_for(customer(CUSTOMER))
    }

    pub fn agent_token(&self) -> String {
        self.token_for(staff_identity(AGENT, false))
    }

    pub fn admin_token(&self) -> String {
        self.token_for(staff_identity(ADMIN, true))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn customer(id: i64) -> Identity {
    let (name, email) = match id {
        CUSTOMER => (Some("Pat Customer"), "pat@example.com"),
        OTHER_CUSTOMER => (Some("Sam Other"), "sam@example.com"),
        _ => (None, "anon@example.com"),
    };
    Identity::from_user(&UserAccount {
        user_id: id,
        username: None,
        name: name.map(str::to_string),
        email: Some(email.to_string()),
        passwd: None,
    })
}

pub fn staff_identity(id: i64, is_admin: bool) -> Identity {
    Identity::from_staff(&StaffAccount {
        staff_id: id,
        username: format!("staff{}", id),
        firstname: Some("Test".to_string()),
        lastname: Some("Staff".to_string()),
        email: None,
        passwd: None,
        is_admin,
        dept_id: BILLING_DEPT,
        role_id: 1,
        permissions: None,
    })
}
