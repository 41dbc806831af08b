use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlRow};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::refs::full_name;
use crate::database::models::{
    manager_staff_id, ApiKey, Collaborator, Department, DepartmentDetail, DepartmentMember, Faq, FaqCategory,
    FaqDetail, FaqQuery, IntakeTopic, NewTicket, Organization, OrganizationDetail, OrganizationManager, PageRequest,
    Paged, Priority, SlaDetail, SlaPlan, StaffAccount, StaffDepartment, StaffDetail, StaffQuery, StaffSummary,
    StaffTeam, SystemConfig, SystemStats, TaskDetail, TaskQuery, TaskSummary, Team, TeamDetail, TeamMember,
    ThreadEntry, ThreadEvent, TicketDetail, TicketQuery, TicketRef, TicketStats, TicketStatus, TicketSummary, Topic,
    TopicForm, TopicRef, UserAccount, UserDetail, UserEmail, UserQuery, UserSummary, Visibility,
};
use crate::database::query_builder::{bound_query, SelectQuery, SqlResult};
use crate::database::retry::{with_retry, RetryPolicy};
use crate::database::row::RowExt;
use crate::database::store::HelpdeskStore;
use crate::database::tables::Tables;

type RowMapper<T> = fn(&MySqlRow) -> Result<T, sqlx::Error>;

/// `HelpdeskStore` over a MySQL pool. Every statement is parameterized and
/// every read goes through the retry policy.
pub struct MySqlStore {
    db: DatabaseManager,
    retry: RetryPolicy,
    log_queries: bool,
}

impl MySqlStore {
    pub fn new(db: DatabaseManager, config: &DatabaseConfig) -> Self {
        Self {
            db,
            retry: RetryPolicy::from_config(config),
            log_queries: config.enable_query_logging,
        }
    }

    /// Open the pool described by `config` and wrap it.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db = DatabaseManager::open(config).await?;
        Ok(Self::new(db, config))
    }

    fn pool(&self) -> &MySqlPool {
        self.db.pool()
    }

    fn tables(&self) -> &Tables {
        self.db.tables()
    }

    fn trace(&self, label: &str, sql: &SqlResult) {
        if self.log_queries {
            debug!("{}: {} {:?}", label, sql.query, sql.params);
        }
    }

    async fn fetch_all<T: Send>(&self, label: &str, sql: SqlResult, map: RowMapper<T>) -> Result<Vec<T>, DatabaseError> {
        self.trace(label, &sql);
        let pool = self.pool();
        let sql = &sql;
        with_retry(self.retry, label, move || async move {
            let rows = bound_query(sql).fetch_all(pool).await?;
            rows.iter()
                .map(map)
                .collect::<Result<Vec<_>, _>>()
                .map_err(DatabaseError::from)
        })
        .await
    }

    async fn fetch_optional<T: Send>(
        &self,
        label: &str,
        sql: SqlResult,
        map: RowMapper<T>,
    ) -> Result<Option<T>, DatabaseError> {
        self.trace(label, &sql);
        let pool = self.pool();
        let sql = &sql;
        with_retry(self.retry, label, move || async move {
            let row = bound_query(sql).fetch_optional(pool).await?;
            row.as_ref().map(map).transpose().map_err(DatabaseError::from)
        })
        .await
    }

    async fn count(&self, label: &str, sql: SqlResult) -> Result<i64, DatabaseError> {
        Ok(self
            .fetch_optional(label, sql, |row| row.int("count"))
            .await?
            .unwrap_or(0))
    }

    async fn paged<T: Send>(
        &self,
        label: &str,
        query: SelectQuery,
        page: PageRequest,
        map: RowMapper<T>,
    ) -> Result<Paged<T>, DatabaseError> {
        let total = self.count(label, query.to_count_sql()).await?;
        let items = self
            .fetch_all(label, query.paginate(page.limit, page.offset()).to_sql(), map)
            .await?;
        Ok(Paged { items, total })
    }

    /// `t.ticket_id = ?` or `t.number = ?`
    fn ticket_condition(ticket: &TicketRef) -> (&'static str, Value) {
        match ticket {
            TicketRef::Id(id) => ("t.ticket_id = ?", Value::from(*id)),
            TicketRef::Number(number) => ("t.number = ?", Value::from(number.as_str())),
        }
    }

    async fn thread_id(&self, ticket: &TicketRef) -> Result<Option<i64>, DatabaseError> {
        let tables = self.tables();
        let (condition, value) = Self::ticket_condition(ticket);
        let sql = SelectQuery::new(
            "th.id",
            format!(
                "{} th JOIN {} t ON th.object_id = t.ticket_id AND th.object_type = 'T'",
                tables.thread(),
                tables.ticket()
            ),
        )
        .and_where(condition, [value])
        .to_sql();
        self.fetch_optional("thread_id", sql, |row| row.int("id")).await
    }

    /// Staff on a team, optionally only the active ones
    async fn members_of(&self, team_id: i64, active_only: bool) -> Result<Vec<TeamMember>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            "s.*, d.name AS dept_name, (s.staff_id = t.lead_id) AS is_lead",
            format!(
                "{} tm JOIN {} s ON tm.staff_id = s.staff_id \
                 JOIN {} t ON tm.team_id = t.team_id \
                 LEFT JOIN {} d ON s.dept_id = d.id",
                tables.team_member(),
                tables.staff(),
                tables.team(),
                tables.department()
            ),
        )
        .and_where("tm.team_id = ?", [Value::from(team_id)]);
        if active_only {
            select = select.and_where_sql("s.isactive = 1");
        }
        let sql = select.order_by("s.lastname, s.firstname").to_sql();
        self.fetch_all("team_members", sql, TeamMember::from_row).await
    }

    /// Entries of one thread, oldest first
    async fn entries_page(&self, thread_id: i64, page: PageRequest) -> Result<Paged<ThreadEntry>, DatabaseError> {
        let tables = self.tables();
        let select = SelectQuery::new(
            "te.*, s.firstname, s.lastname, s.email AS staff_email, u.name AS user_name, ue.address AS user_email",
            format!(
                "{} te LEFT JOIN {} s ON te.staff_id = s.staff_id \
                 LEFT JOIN {} u ON te.user_id = u.id \
                 LEFT JOIN {} ue ON u.default_email_id = ue.id",
                tables.thread_entry(),
                tables.staff(),
                tables.user(),
                tables.user_email()
            ),
        )
        .and_where("te.thread_id = ?", [Value::from(thread_id)])
        .order_by("te.created ASC, te.id ASC");

        self.paged("thread_entries", select, page, ThreadEntry::from_row).await
    }
}

fn inserted_id(id: u64) -> Result<i64, DatabaseError> {
    i64::try_from(id).map_err(|_| DatabaseError::IdOutOfRange(id))
}

/// One attempt at the intake write. Failures before COMMIT roll back when the
/// transaction is dropped and may be retried. A failed COMMIT is reported as
/// `CommitFailed` because the server may already have applied it.
async fn insert_ticket_tx(pool: &MySqlPool, tables: &Tables, ticket: &NewTicket) -> Result<i64, DatabaseError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (number, user_id, dept_id, topic_id, status_id, source, isoverdue, isanswered, \
         duedate, est_duedate, created, updated) VALUES (?, ?, ?, ?, ?, 'Web', 0, 0, NULL, NULL, ?, ?)",
        tables.ticket()
    ))
    .bind(&ticket.number)
    .bind(ticket.user_id)
    .bind(ticket.dept_id)
    .bind(ticket.topic_id)
    .bind(ticket.status_id)
    .bind(ticket.created)
    .bind(ticket.created)
    .execute(&mut *tx)
    .await?;
    let ticket_id = inserted_id(result.last_insert_id())?;

    sqlx::query(&format!("INSERT INTO {} (ticket_id, subject) VALUES (?, ?)", tables.ticket_cdata()))
        .bind(ticket_id)
        .bind(&ticket.subject)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (object_id, object_type, lastmessage, created) VALUES (?, 'T', ?, ?)",
        tables.thread()
    ))
    .bind(ticket_id)
    .bind(ticket.created)
    .bind(ticket.created)
    .execute(&mut *tx)
    .await?;
    let thread_id = inserted_id(result.last_insert_id())?;

    sqlx::query(&format!(
        "INSERT INTO {} (thread_id, user_id, type, poster, source, body, format, created) \
         VALUES (?, ?, 'M', ?, 'Web', ?, 'text', ?)",
        tables.thread_entry()
    ))
    .bind(thread_id)
    .bind(ticket.user_id)
    .bind(&ticket.poster)
    .bind(&ticket.body)
    .bind(ticket.created)
    .execute(&mut *tx)
    .await?;

    tx.commit().await.map_err(DatabaseError::CommitFailed)?;
    Ok(ticket_id)
}

#[async_trait]
impl HelpdeskStore for MySqlStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.db.health_check().await
    }

    async fn close(&self) {
        self.db.close().await;
    }

    async fn find_intake_topic(&self, topic_id: i64) -> Result<Option<IntakeTopic>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "ht.topic_id, ht.dept_id, ht.priority_id, d.name AS dept_name",
            format!("{} ht LEFT JOIN {} d ON ht.dept_id = d.id", tables.help_topic(), tables.department()),
        )
        .and_where("ht.topic_id = ?", [Value::from(topic_id)])
        .and_where_sql("ht.isactive = 1")
        .and_where_sql("ht.ispublic = 1")
        .to_sql();

        self.fetch_optional("find_intake_topic", sql, |row| {
            Ok(IntakeTopic {
                topic_id: row.int("topic_id")?,
                dept_id: row.int("dept_id")?,
                dept_name: row.opt_text("dept_name")?,
                priority_id: row.int("priority_id")?,
            })
        })
        .await
    }

    async fn default_open_status(&self) -> Result<Option<i64>, DatabaseError> {
        let sql = SelectQuery::new("id", self.tables().ticket_status())
            .and_where_sql("state = 'open'")
            .and_where_sql("mode = 1")
            .order_by("sort ASC")
            .paginate(1, 0)
            .to_sql();
        self.fetch_optional("default_open_status", sql, |row| row.int("id")).await
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "ue.address AS email",
            format!("{} u LEFT JOIN {} ue ON u.default_email_id = ue.id", tables.user(), tables.user_email()),
        )
        .and_where("u.id = ?", [Value::from(user_id)])
        .to_sql();
        Ok(self
            .fetch_optional("user_email", sql, |row| row.opt_text("email"))
            .await?
            .flatten())
    }

    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<i64, DatabaseError> {
        let pool = self.pool();
        let tables = self.tables();
        let ticket_id = with_retry(self.retry, "insert_ticket", move || async move {
            insert_ticket_tx(pool, tables, ticket).await
        })
        .await?;
        info!("Inserted ticket {} ({})", ticket_id, ticket.number);
        Ok(ticket_id)
    }

    async fn list_tickets(&self, query: &TicketQuery, page: PageRequest) -> Result<Paged<TicketSummary>, DatabaseError> {
        let tables = self.tables();
        let from = format!(
            "{ticket} t \
             LEFT JOIN {status} ts ON t.status_id = ts.id \
             LEFT JOIN {dept} d ON t.dept_id = d.id \
             LEFT JOIN {topic} ht ON t.topic_id = ht.topic_id \
             LEFT JOIN {priority} tp ON ht.priority_id = tp.priority_id \
             LEFT JOIN {user} u ON t.user_id = u.id \
             LEFT JOIN {staff} s ON t.staff_id = s.staff_id \
             LEFT JOIN {cdata} tc ON t.ticket_id = tc.ticket_id",
            ticket = tables.ticket(),
            status = tables.ticket_status(),
            dept = tables.department(),
            topic = tables.help_topic(),
            priority = tables.ticket_priority(),
            user = tables.user(),
            staff = tables.staff(),
            cdata = tables.ticket_cdata(),
        );
        let columns = "t.*, ts.name AS status_name, ts.state AS status_state, d.name AS dept_name, \
                       ht.topic AS topic_name, tp.priority_id, tp.priority AS priority_name, tp.priority_color, \
                       u.name AS user_name, CONCAT(s.firstname, ' ', s.lastname) AS staff_name, tc.subject";

        let mut select = SelectQuery::new(columns, from)
            .and_where_opt("ts.state = ?", query.state.clone())
            .and_where_opt("t.dept_id = ?", query.dept_id)
            .and_where_opt("t.staff_id = ?", query.staff_id)
            .and_where_opt("t.user_id = ?", query.user_id)
            .and_where_opt("u.org_id = ?", query.org_id)
            .and_where_opt("t.topic_id = ?", query.topic_id)
            .and_where_opt("ht.priority_id = ?", query.priority_id);
        if query.overdue_only {
            select = select.and_where_sql("t.isoverdue = 1");
        }
        if let Some(search) = &query.search {
            let term = Value::from(format!("%{}%", search));
            select = select.and_where("(t.number LIKE ? OR tc.subject LIKE ?)", [term.clone(), term]);
        }
        select = select
            .and_where_opt("t.user_id = ?", query.owner)
            .order_by(format!("{} {}", query.sort.column(), query.direction.to_sql()));

        self.paged("list_tickets", select, page, TicketSummary::from_row).await
    }

    async fn get_ticket(&self, ticket: &TicketRef) -> Result<Option<TicketDetail>, DatabaseError> {
        let tables = self.tables();
        let from = format!(
            "{ticket} t \
             LEFT JOIN {status} ts ON t.status_id = ts.id \
             LEFT JOIN {dept} d ON t.dept_id = d.id \
             LEFT JOIN {topic} ht ON t.topic_id = ht.topic_id \
             LEFT JOIN {priority} tp ON ht.priority_id = tp.priority_id \
             LEFT JOIN {user} u ON t.user_id = u.id \
             LEFT JOIN {email} ue ON u.default_email_id = ue.id \
             LEFT JOIN {staff} s ON t.staff_id = s.staff_id \
             LEFT JOIN {team} tm ON t.team_id = tm.team_id \
             LEFT JOIN {sla} sla ON t.sla_id = sla.id \
             LEFT JOIN {cdata} tc ON t.ticket_id = tc.ticket_id \
             LEFT JOIN {thread} th ON th.object_id = t.ticket_id AND th.object_type = 'T'",
            ticket = tables.ticket(),
            status = tables.ticket_status(),
            dept = tables.department(),
            topic = tables.help_topic(),
            priority = tables.ticket_priority(),
            user = tables.user(),
            email = tables.user_email(),
            staff = tables.staff(),
            team = tables.team(),
            sla = tables.sla(),
            cdata = tables.ticket_cdata(),
            thread = tables.thread(),
        );
        let columns = "t.*, ts.name AS status_name, ts.state AS status_state, d.name AS dept_name, \
                       ht.topic AS topic_name, tp.priority_id, tp.priority AS priority_name, tp.priority_color, \
                       tp.priority_urgency, u.name AS user_name, ue.address AS user_email, \
                       s.firstname, s.lastname, s.email AS staff_email, \
                       CONCAT(s.firstname, ' ', s.lastname) AS staff_name, tm.name AS team_name, \
                       sla.name AS sla_name, sla.grace_period, tc.subject, \
                       th.id AS thread_id, th.lastresponse, th.lastmessage";
        let (condition, value) = Self::ticket_condition(ticket);
        let sql = SelectQuery::new(columns, from).and_where(condition, [value]).to_sql();

        let Some(mut detail) = self.fetch_optional("get_ticket", sql, TicketDetail::from_row).await? else {
            return Ok(None);
        };

        if let Some(thread_id) = detail.thread.id {
            let sql = SelectQuery::new(
                "tc.id, tc.user_id, tc.role, u.name, ue.address AS email",
                format!(
                    "{} tc JOIN {} u ON tc.user_id = u.id LEFT JOIN {} ue ON u.default_email_id = ue.id",
                    tables.thread_collaborator(),
                    tables.user(),
                    tables.user_email()
                ),
            )
            .and_where("tc.thread_id = ?", [Value::from(thread_id)])
            .to_sql();
            detail.collaborators = self.fetch_all("collaborators", sql, Collaborator::from_row).await?;
        }

        Ok(Some(detail))
    }

    async fn ticket_owner(&self, ticket: &TicketRef) -> Result<Option<i64>, DatabaseError> {
        let (condition, value) = Self::ticket_condition(ticket);
        let sql = SelectQuery::new("t.user_id", format!("{} t", self.tables().ticket()))
            .and_where(condition, [value])
            .to_sql();
        self.fetch_optional("ticket_owner", sql, |row| row.int("user_id")).await
    }

    async fn thread_entries(
        &self,
        ticket: &TicketRef,
        page: PageRequest,
    ) -> Result<Option<Paged<ThreadEntry>>, DatabaseError> {
        let Some(thread_id) = self.thread_id(ticket).await? else {
            return Ok(None);
        };
        self.entries_page(thread_id, page).await.map(Some)
    }

    async fn thread_events(&self, ticket: &TicketRef) -> Result<Option<Vec<ThreadEvent>>, DatabaseError> {
        let Some(thread_id) = self.thread_id(ticket).await? else {
            return Ok(None);
        };
        let tables = self.tables();
        let sql = SelectQuery::new(
            "te.*, e.name AS event_name",
            format!("{} te LEFT JOIN {} e ON te.event_id = e.id", tables.thread_event(), tables.event()),
        )
        .and_where("te.thread_id = ?", [Value::from(thread_id)])
        .order_by("te.timestamp DESC")
        .to_sql();

        self.fetch_all("thread_events", sql, ThreadEvent::from_row).await.map(Some)
    }

    async fn list_topics(&self, visibility: Visibility, page: PageRequest) -> Result<Paged<Topic>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            "ht.*, p.topic AS parent_topic, d.name AS dept_name, tp.priority AS priority_name, sla.name AS sla_name",
            format!(
                "{topic} ht \
                 LEFT JOIN {topic} p ON ht.topic_pid = p.topic_id \
                 LEFT JOIN {dept} d ON ht.dept_id = d.id \
                 LEFT JOIN {priority} tp ON ht.priority_id = tp.priority_id \
                 LEFT JOIN {sla} sla ON ht.sla_id = sla.id",
                topic = tables.help_topic(),
                dept = tables.department(),
                priority = tables.ticket_priority(),
                sla = tables.sla(),
            ),
        );
        select = match visibility {
            Visibility::PublicOnly => select.and_where_sql("ht.ispublic = 1"),
            Visibility::Staff(flag) => select.and_where_opt("ht.ispublic = ?", flag.map(i64::from)),
        };
        select = select.order_by("ht.sort, ht.topic");

        self.paged("list_topics", select, page, Topic::from_row).await
    }

    async fn get_topic(&self, topic_id: i64) -> Result<Option<Topic>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "ht.*, p.topic AS parent_topic, d.name AS dept_name, tp.priority AS priority_name, tp.priority_color, \
             sla.name AS sla_name, sla.grace_period, s.firstname, s.lastname, tm.name AS team_name",
            format!(
                "{topic} ht \
                 LEFT JOIN {topic} p ON ht.topic_pid = p.topic_id \
                 LEFT JOIN {dept} d ON ht.dept_id = d.id \
                 LEFT JOIN {priority} tp ON ht.priority_id = tp.priority_id \
                 LEFT JOIN {sla} sla ON ht.sla_id = sla.id \
                 LEFT JOIN {staff} s ON ht.staff_id = s.staff_id \
                 LEFT JOIN {team} tm ON ht.team_id = tm.team_id",
                topic = tables.help_topic(),
                dept = tables.department(),
                priority = tables.ticket_priority(),
                sla = tables.sla(),
                staff = tables.staff(),
                team = tables.team(),
            ),
        )
        .and_where("ht.topic_id = ?", [Value::from(topic_id)])
        .to_sql();

        let Some(mut topic) = self.fetch_optional("get_topic", sql, Topic::detail_from_row).await? else {
            return Ok(None);
        };

        let sql = SelectQuery::new(
            "htf.form_id, htf.sort, f.title, f.type",
            format!("{} htf JOIN {} f ON htf.form_id = f.id", tables.help_topic_form(), tables.form()),
        )
        .and_where("htf.topic_id = ?", [Value::from(topic_id)])
        .order_by("htf.sort")
        .to_sql();
        topic.forms = Some(self.fetch_all("topic_forms", sql, TopicForm::from_row).await?);

        Ok(Some(topic))
    }

    async fn list_departments(
        &self,
        visibility: Visibility,
        page: PageRequest,
    ) -> Result<Paged<Department>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            "d.*, p.name AS parent_name, s.firstname, s.lastname, sla.name AS sla_name",
            format!(
                "{dept} d \
                 LEFT JOIN {dept} p ON d.pid = p.id \
                 LEFT JOIN {staff} s ON d.manager_id = s.staff_id \
                 LEFT JOIN {sla} sla ON d.sla_id = sla.id",
                dept = tables.department(),
                staff = tables.staff(),
                sla = tables.sla(),
            ),
        );
        select = match visibility {
            Visibility::PublicOnly => select.and_where_sql("d.ispublic = 1"),
            Visibility::Staff(flag) => select.and_where_opt("d.ispublic = ?", flag.map(i64::from)),
        };
        select = select.order_by("d.name");

        self.paged("list_departments", select, page, Department::from_row).await
    }

    async fn get_department(&self, dept_id: i64) -> Result<Option<DepartmentDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "d.*, p.name AS parent_name, s.firstname, s.lastname, s.email AS manager_email, \
             sla.name AS sla_name, sla.grace_period",
            format!(
                "{dept} d \
                 LEFT JOIN {dept} p ON d.pid = p.id \
                 LEFT JOIN {staff} s ON d.manager_id = s.staff_id \
                 LEFT JOIN {sla} sla ON d.sla_id = sla.id",
                dept = tables.department(),
                staff = tables.staff(),
                sla = tables.sla(),
            ),
        )
        .and_where("d.id = ?", [Value::from(dept_id)])
        .to_sql();

        let Some(mut detail) = self.fetch_optional("get_department", sql, DepartmentDetail::from_row).await? else {
            return Ok(None);
        };

        let staff = SelectQuery::new("COUNT(*) AS count", tables.staff())
            .and_where("dept_id = ?", [Value::from(dept_id)])
            .and_where_sql("isactive = 1")
            .to_sql();
        detail.staff_count = self.count("department_staff_count", staff).await?;

        let open = SelectQuery::new(
            "COUNT(*) AS count",
            format!("{} t JOIN {} ts ON t.status_id = ts.id", tables.ticket(), tables.ticket_status()),
        )
        .and_where("t.dept_id = ?", [Value::from(dept_id)])
        .and_where_sql("ts.state = 'open'")
        .to_sql();
        detail.open_ticket_count = self.count("department_open_tickets", open).await?;

        Ok(Some(detail))
    }

    async fn department_staff(&self, dept_id: i64) -> Result<Vec<DepartmentMember>, DatabaseError> {
        let tables = self.tables();
        let primary = SelectQuery::new(
            "s.*, r.name AS role_name",
            format!("{} s LEFT JOIN {} r ON s.role_id = r.id", tables.staff(), tables.role()),
        )
        .and_where("s.dept_id = ?", [Value::from(dept_id)])
        .and_where_sql("s.isactive = 1")
        .order_by("s.lastname, s.firstname")
        .to_sql();
        let mut members = self
            .fetch_all("department_staff", primary, DepartmentMember::primary_from_row)
            .await?;

        let extended = SelectQuery::new(
            "s.*, r.name AS role_name",
            format!(
                "{} sda JOIN {} s ON sda.staff_id = s.staff_id LEFT JOIN {} r ON sda.role_id = r.id",
                tables.staff_dept_access(),
                tables.staff(),
                tables.role()
            ),
        )
        .and_where("sda.dept_id = ?", [Value::from(dept_id)])
        .and_where_sql("s.isactive = 1")
        .order_by("s.lastname, s.firstname")
        .to_sql();
        members.extend(
            self.fetch_all("department_staff_access", extended, DepartmentMember::extended_from_row)
                .await?,
        );
        Ok(members)
    }

    async fn list_users(&self, query: &UserQuery, page: PageRequest) -> Result<Paged<UserSummary>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            "u.*, ue.address AS email, o.name AS org_name",
            format!(
                "{} u LEFT JOIN {} ue ON u.default_email_id = ue.id LEFT JOIN {} o ON u.org_id = o.id",
                tables.user(),
                tables.user_email(),
                tables.organization()
            ),
        )
        .and_where_opt("u.org_id = ?", query.org_id);
        if let Some(search) = &query.search {
            let term = Value::from(format!("%{}%", search));
            select = select.and_where("(u.name LIKE ? OR ue.address LIKE ?)", [term.clone(), term]);
        }
        select = select.order_by("u.created DESC, u.id DESC");

        self.paged("list_users", select, page, UserSummary::from_row).await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "u.*, o.name AS org_name, o.domain AS org_domain",
            format!("{} u LEFT JOIN {} o ON u.org_id = o.id", tables.user(), tables.organization()),
        )
        .and_where("u.id = ?", [Value::from(user_id)])
        .to_sql();
        let Some(mut detail) = self.fetch_optional("get_user", sql, UserDetail::from_row).await? else {
            return Ok(None);
        };

        let sql = SelectQuery::new("id, address, flags", tables.user_email())
            .and_where("user_id = ?", [Value::from(user_id)])
            .order_by("id")
            .to_sql();
        detail.emails = self.fetch_all("user_emails", sql, UserEmail::from_row).await?;
        for email in detail.emails.iter_mut() {
            email.is_default = email.id == detail.default_email_id;
        }

        let sql = SelectQuery::new("COUNT(*) AS count", tables.ticket())
            .and_where("user_id = ?", [Value::from(user_id)])
            .to_sql();
        detail.ticket_count = self.count("user_ticket_count", sql).await?;

        Ok(Some(detail))
    }

    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            format!(
                "o.*, (SELECT COUNT(*) FROM {} m WHERE m.org_id = o.id) AS user_count",
                tables.user()
            ),
            format!("{} u JOIN {} o ON u.org_id = o.id", tables.user(), tables.organization()),
        )
        .and_where("u.id = ?", [Value::from(user_id)])
        .to_sql();
        self.fetch_all("user_organizations", sql, Organization::from_row).await
    }

    async fn list_staff(&self, query: &StaffQuery, page: PageRequest) -> Result<Paged<StaffSummary>, DatabaseError> {
        let tables = self.tables();
        let select = SelectQuery::new(
            "s.*, d.name AS dept_name, r.name AS role_name",
            format!(
                "{} s LEFT JOIN {} d ON s.dept_id = d.id LEFT JOIN {} r ON s.role_id = r.id",
                tables.staff(),
                tables.department(),
                tables.role()
            ),
        )
        .and_where_opt("s.dept_id = ?", query.dept_id)
        .and_where_opt("s.isactive = ?", query.isactive.map(i64::from))
        .order_by("s.lastname, s.firstname");

        self.paged("list_staff", select, page, StaffSummary::from_row).await
    }

    async fn get_staff(&self, staff_id: i64) -> Result<Option<StaffDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "s.*, d.name AS dept_name, r.name AS role_name, r.permissions AS role_permissions",
            format!(
                "{} s LEFT JOIN {} d ON s.dept_id = d.id LEFT JOIN {} r ON s.role_id = r.id",
                tables.staff(),
                tables.department(),
                tables.role()
            ),
        )
        .and_where("s.staff_id = ?", [Value::from(staff_id)])
        .to_sql();
        let Some(mut detail) = self.fetch_optional("get_staff", sql, StaffDetail::from_row).await? else {
            return Ok(None);
        };

        detail.departments = self.staff_departments(staff_id).await?.unwrap_or_default();
        detail.teams = self.staff_teams(staff_id).await?;
        Ok(Some(detail))
    }

    async fn staff_departments(&self, staff_id: i64) -> Result<Option<Vec<StaffDepartment>>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "s.staff_id, d.id AS dept_id, d.name AS dept_name, d.path, NULL AS role_name",
            format!("{} s LEFT JOIN {} d ON s.dept_id = d.id", tables.staff(), tables.department()),
        )
        .and_where("s.staff_id = ?", [Value::from(staff_id)])
        .to_sql();
        let primary = self
            .fetch_optional("staff_primary_department", sql, |row| match row.opt_int("dept_id")? {
                Some(_) => StaffDepartment::primary_from_row(row).map(Some),
                None => Ok(None),
            })
            .await?;
        let Some(primary) = primary else {
            return Ok(None);
        };

        let sql = SelectQuery::new(
            "d.id AS dept_id, d.name AS dept_name, d.path, r.name AS role_name",
            format!(
                "{} sda JOIN {} d ON sda.dept_id = d.id LEFT JOIN {} r ON sda.role_id = r.id",
                tables.staff_dept_access(),
                tables.department(),
                tables.role()
            ),
        )
        .and_where("sda.staff_id = ?", [Value::from(staff_id)])
        .order_by("d.name")
        .to_sql();
        let extended = self
            .fetch_all("staff_extended_departments", sql, StaffDepartment::extended_from_row)
            .await?;

        Ok(Some(primary.into_iter().chain(extended).collect()))
    }

    async fn staff_teams(&self, staff_id: i64) -> Result<Vec<StaffTeam>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "t.team_id, t.name, t.created, (t.lead_id = tm.staff_id) AS is_lead",
            format!("{} tm JOIN {} t ON tm.team_id = t.team_id", tables.team_member(), tables.team()),
        )
        .and_where("tm.staff_id = ?", [Value::from(staff_id)])
        .order_by("t.name")
        .to_sql();
        self.fetch_all("staff_teams", sql, StaffTeam::from_row).await
    }

    async fn list_teams(&self, page: PageRequest) -> Result<Paged<Team>, DatabaseError> {
        let tables = self.tables();
        let select = SelectQuery::new(
            format!(
                "t.*, s.firstname, s.lastname, s.email AS lead_email, \
                 (SELECT COUNT(*) FROM {} tm WHERE tm.team_id = t.team_id) AS member_count",
                tables.team_member()
            ),
            format!("{} t LEFT JOIN {} s ON t.lead_id = s.staff_id", tables.team(), tables.staff()),
        )
        .order_by("t.name");

        self.paged("list_teams", select, page, Team::from_row).await
    }

    async fn get_team(&self, team_id: i64) -> Result<Option<TeamDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "t.*, s.firstname, s.lastname, s.email AS lead_email",
            format!("{} t LEFT JOIN {} s ON t.lead_id = s.staff_id", tables.team(), tables.staff()),
        )
        .and_where("t.team_id = ?", [Value::from(team_id)])
        .to_sql();
        let Some(mut detail) = self.fetch_optional("get_team", sql, TeamDetail::from_row).await? else {
            return Ok(None);
        };

        detail.members = self.members_of(team_id, true).await?;
        Ok(Some(detail))
    }

    async fn team_members(&self, team_id: i64) -> Result<Option<Vec<TeamMember>>, DatabaseError> {
        let sql = SelectQuery::new("team_id", self.tables().team())
            .and_where("team_id = ?", [Value::from(team_id)])
            .to_sql();
        if self.fetch_optional("team_exists", sql, |row| row.int("team_id")).await?.is_none() {
            return Ok(None);
        }
        self.members_of(team_id, false).await.map(Some)
    }

    async fn list_organizations(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paged<Organization>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            format!(
                "o.*, (SELECT COUNT(*) FROM {} u WHERE u.org_id = o.id) AS user_count",
                tables.user()
            ),
            format!("{} o", tables.organization()),
        );
        if let Some(search) = search {
            let term = Value::from(format!("%{}%", search));
            select = select.and_where("(o.name LIKE ? OR o.domain LIKE ?)", [term.clone(), term]);
        }
        select = select.order_by("o.name");

        self.paged("list_organizations", select, page, Organization::from_row).await
    }

    async fn get_organization(&self, org_id: i64) -> Result<Option<OrganizationDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            format!(
                "o.*, (SELECT COUNT(*) FROM {} u WHERE u.org_id = o.id) AS user_count",
                tables.user()
            ),
            format!("{} o", tables.organization()),
        )
        .and_where("o.id = ?", [Value::from(org_id)])
        .to_sql();
        let Some(mut detail) = self
            .fetch_optional("get_organization", sql, OrganizationDetail::from_row)
            .await?
        else {
            return Ok(None);
        };

        let sql = SelectQuery::new(
            "COUNT(*) AS count",
            format!("{} t JOIN {} u ON t.user_id = u.id", tables.ticket(), tables.user()),
        )
        .and_where("u.org_id = ?", [Value::from(org_id)])
        .to_sql();
        detail.ticket_count = self.count("organization_ticket_count", sql).await?;

        if let Some(staff_id) = detail.manager_ref.as_deref().and_then(manager_staff_id) {
            let sql = SelectQuery::new("staff_id, firstname, lastname, email", tables.staff())
                .and_where("staff_id = ?", [Value::from(staff_id)])
                .to_sql();
            detail.manager = self
                .fetch_optional("organization_manager", sql, |row| {
                    Ok(OrganizationManager::Staff {
                        staff_id: row.int("staff_id")?,
                        name: full_name(row.opt_text("firstname")?.as_deref(), row.opt_text("lastname")?.as_deref()),
                        email: row.opt_text("email")?,
                    })
                })
                .await?;
        }

        Ok(Some(detail))
    }

    async fn list_slas(&self) -> Result<Vec<SlaPlan>, DatabaseError> {
        let sql = SelectQuery::new("*", self.tables().sla()).order_by("name").to_sql();
        self.fetch_all("list_slas", sql, SlaPlan::from_row).await
    }

    async fn get_sla(&self, sla_id: i64) -> Result<Option<SlaDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new("*", tables.sla())
            .and_where("id = ?", [Value::from(sla_id)])
            .to_sql();
        let Some(mut detail) = self.fetch_optional("get_sla", sql, SlaDetail::from_row).await? else {
            return Ok(None);
        };

        let open = SelectQuery::new(
            "COUNT(*) AS count",
            format!("{} t JOIN {} ts ON t.status_id = ts.id", tables.ticket(), tables.ticket_status()),
        )
        .and_where("t.sla_id = ?", [Value::from(sla_id)])
        .and_where_sql("ts.state = 'open'")
        .to_sql();
        detail.usage.open_tickets = self.count("sla_open_tickets", open).await?;

        let departments = SelectQuery::new("COUNT(*) AS count", tables.department())
            .and_where("sla_id = ?", [Value::from(sla_id)])
            .to_sql();
        detail.usage.departments = self.count("sla_departments", departments).await?;

        let topics = SelectQuery::new("COUNT(*) AS count", tables.help_topic())
            .and_where("sla_id = ?", [Value::from(sla_id)])
            .to_sql();
        detail.usage.help_topics = self.count("sla_topics", topics).await?;

        Ok(Some(detail))
    }

    async fn list_tasks(&self, query: &TaskQuery, page: PageRequest) -> Result<Paged<TaskSummary>, DatabaseError> {
        let tables = self.tables();
        let select = SelectQuery::new(
            "t.*, d.name AS dept_name, CONCAT(s.firstname, ' ', s.lastname) AS staff_name, \
             tm.name AS team_name, tc.title, tc.description",
            format!(
                "{task} t \
                 LEFT JOIN {dept} d ON t.dept_id = d.id \
                 LEFT JOIN {staff} s ON t.staff_id = s.staff_id \
                 LEFT JOIN {team} tm ON t.team_id = tm.team_id \
                 LEFT JOIN {cdata} tc ON t.id = tc.task_id",
                task = tables.task(),
                dept = tables.department(),
                staff = tables.staff(),
                team = tables.team(),
                cdata = tables.task_cdata(),
            ),
        )
        .and_where_opt("t.staff_id = ?", query.staff_id)
        .and_where_opt("t.dept_id = ?", query.dept_id)
        .and_where_opt("t.team_id = ?", query.team_id)
        .order_by("t.created DESC, t.id DESC");

        self.paged("list_tasks", select, page, TaskSummary::from_row).await
    }

    async fn get_task(&self, task_id: i64) -> Result<Option<TaskDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "t.*, d.name AS dept_name, s.firstname, s.lastname, s.email AS staff_email, \
             CONCAT(s.firstname, ' ', s.lastname) AS staff_name, tm.name AS team_name, \
             tc.title, tc.description, th.id AS thread_id, tk.ticket_id, tk.number AS ticket_number",
            format!(
                "{task} t \
                 LEFT JOIN {dept} d ON t.dept_id = d.id \
                 LEFT JOIN {staff} s ON t.staff_id = s.staff_id \
                 LEFT JOIN {team} tm ON t.team_id = tm.team_id \
                 LEFT JOIN {cdata} tc ON t.id = tc.task_id \
                 LEFT JOIN {thread} th ON th.object_id = t.id AND th.object_type = 'A' \
                 LEFT JOIN {ticket} tk ON t.object_type = 'T' AND tk.ticket_id = t.object_id",
                task = tables.task(),
                dept = tables.department(),
                staff = tables.staff(),
                team = tables.team(),
                cdata = tables.task_cdata(),
                thread = tables.thread(),
                ticket = tables.ticket(),
            ),
        )
        .and_where("t.id = ?", [Value::from(task_id)])
        .to_sql();
        self.fetch_optional("get_task", sql, TaskDetail::from_row).await
    }

    async fn task_thread(&self, task_id: i64, page: PageRequest) -> Result<Option<Paged<ThreadEntry>>, DatabaseError> {
        let sql = SelectQuery::new("id", self.tables().thread())
            .and_where("object_id = ?", [Value::from(task_id)])
            .and_where_sql("object_type = 'A'")
            .to_sql();
        let Some(thread_id) = self.fetch_optional("task_thread_id", sql, |row| row.int("id")).await? else {
            return Ok(None);
        };
        self.entries_page(thread_id, page).await.map(Some)
    }

    async fn list_faqs(&self, query: &FaqQuery, page: PageRequest) -> Result<Paged<Faq>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            "f.*, c.name AS category_name",
            format!(
                "{} f LEFT JOIN {} c ON f.category_id = c.category_id",
                tables.faq(),
                tables.faq_category()
            ),
        )
        .and_where_sql("f.ispublished = 1");
        if query.public_only {
            select = select.and_where_sql("(c.ispublic = 1 OR c.category_id IS NULL)");
        }
        select = select.and_where_opt("f.category_id = ?", query.category_id);
        if let Some(search) = &query.search {
            let term = Value::from(format!("%{}%", search));
            select = select.and_where(
                "(f.question LIKE ? OR f.answer LIKE ? OR f.keywords LIKE ?)",
                [term.clone(), term.clone(), term],
            );
        }
        select = select.order_by("f.question");

        self.paged("list_faqs", select, page, Faq::from_row).await
    }

    async fn list_faq_categories(&self, public_only: bool) -> Result<Vec<FaqCategory>, DatabaseError> {
        let tables = self.tables();
        let mut select = SelectQuery::new(
            format!(
                "c.*, (SELECT COUNT(*) FROM {} f WHERE f.category_id = c.category_id AND f.ispublished = 1) \
                 AS faq_count",
                tables.faq()
            ),
            format!("{} c", tables.faq_category()),
        );
        if public_only {
            select = select.and_where_sql("c.ispublic = 1");
        }
        let sql = select.order_by("c.name").to_sql();
        self.fetch_all("list_faq_categories", sql, FaqCategory::from_row).await
    }

    async fn get_faq(&self, faq_id: i64) -> Result<Option<FaqDetail>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "f.*, c.name AS category_name, c.ispublic AS category_ispublic",
            format!(
                "{} f LEFT JOIN {} c ON f.category_id = c.category_id",
                tables.faq(),
                tables.faq_category()
            ),
        )
        .and_where("f.faq_id = ?", [Value::from(faq_id)])
        .to_sql();
        let Some(mut detail) = self.fetch_optional("get_faq", sql, FaqDetail::from_row).await? else {
            return Ok(None);
        };

        let sql = SelectQuery::new(
            "ht.topic_id, ht.topic",
            format!("{} ft JOIN {} ht ON ft.topic_id = ht.topic_id", tables.faq_topic(), tables.help_topic()),
        )
        .and_where("ft.faq_id = ?", [Value::from(faq_id)])
        .order_by("ht.topic")
        .to_sql();
        detail.topics = self
            .fetch_all("faq_topics", sql, |row| {
                Ok(TopicRef {
                    topic_id: row.int("topic_id")?,
                    topic: row.opt_text("topic")?,
                })
            })
            .await?;

        Ok(Some(detail))
    }

    async fn system_config(&self) -> Result<SystemConfig, DatabaseError> {
        let placeholders = vec!["?"; SystemConfig::KEYS.len()].join(", ");
        let sql = SelectQuery::new("`key`, value", self.tables().config())
            .and_where_sql("namespace = 'core'")
            .and_where(
                format!("`key` IN ({})", placeholders),
                SystemConfig::KEYS.iter().map(|key| Value::from(*key)),
            )
            .to_sql();
        let pairs = self
            .fetch_all("system_config", sql, |row| Ok((row.text("key")?, row.text("value")?)))
            .await?;
        Ok(SystemConfig::from_pairs(pairs))
    }

    async fn system_stats(&self) -> Result<SystemStats, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "COUNT(*) AS total, \
             CAST(COALESCE(SUM(ts.state = 'open'), 0) AS SIGNED) AS open, \
             CAST(COALESCE(SUM(ts.state = 'closed'), 0) AS SIGNED) AS closed, \
             CAST(COALESCE(SUM(t.isoverdue = 1 AND ts.state = 'open'), 0) AS SIGNED) AS overdue, \
             CAST(COALESCE(SUM(t.staff_id = 0 AND ts.state = 'open'), 0) AS SIGNED) AS unassigned",
            format!("{} t JOIN {} ts ON t.status_id = ts.id", tables.ticket(), tables.ticket_status()),
        )
        .to_sql();
        let mut tickets = self
            .fetch_optional("ticket_stats", sql, TicketStats::from_row)
            .await?
            .unwrap_or_default();

        let today = SelectQuery::new("COUNT(*) AS count", tables.ticket())
            .and_where_sql("DATE(created) = CURDATE()")
            .to_sql();
        tickets.today = self.count("tickets_today", today).await?;

        let total = |table: String| SelectQuery::new("COUNT(*) AS count", table);
        Ok(SystemStats {
            tickets,
            users: self.count("user_count", total(tables.user()).to_sql()).await?,
            staff: self
                .count("staff_count", total(tables.staff()).and_where_sql("isactive = 1").to_sql())
                .await?,
            departments: self.count("department_count", total(tables.department()).to_sql()).await?,
            teams: self.count("team_count", total(tables.team()).to_sql()).await?,
            organizations: self.count("organization_count", total(tables.organization()).to_sql()).await?,
        })
    }

    async fn list_statuses(&self) -> Result<Vec<TicketStatus>, DatabaseError> {
        let sql = SelectQuery::new("*", self.tables().ticket_status()).order_by("sort").to_sql();
        self.fetch_all("list_statuses", sql, TicketStatus::from_row).await
    }

    async fn list_priorities(&self, public_only: bool) -> Result<Vec<Priority>, DatabaseError> {
        let mut select = SelectQuery::new("*", self.tables().ticket_priority());
        if public_only {
            select = select.and_where_sql("ispublic = 1");
        }
        let sql = select.order_by("priority_urgency DESC").to_sql();
        self.fetch_all("list_priorities", sql, Priority::from_row).await
    }

    async fn find_user_account(&self, username: &str) -> Result<Option<UserAccount>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "ua.username, ua.passwd, u.id AS user_id, u.name, ue.address AS email",
            format!(
                "{} ua JOIN {} u ON ua.user_id = u.id LEFT JOIN {} ue ON u.default_email_id = ue.id",
                tables.user_account(),
                tables.user(),
                tables.user_email()
            ),
        )
        .and_where("ua.username = ?", [Value::from(username)])
        .and_where_sql("ua.status = 1")
        .to_sql();
        self.fetch_optional("find_user_account", sql, UserAccount::from_row).await
    }

    async fn find_staff_account(&self, login: &str) -> Result<Option<StaffAccount>, DatabaseError> {
        let tables = self.tables();
        let sql = SelectQuery::new(
            "s.*, r.permissions AS role_permissions",
            format!("{} s LEFT JOIN {} r ON s.role_id = r.id", tables.staff(), tables.role()),
        )
        .and_where("(s.username = ? OR s.email = ?)", [Value::from(login), Value::from(login)])
        .and_where_sql("s.isactive = 1")
        .to_sql();
        self.fetch_optional("find_staff_account", sql, StaffAccount::from_row).await
    }

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, DatabaseError> {
        let sql = SelectQuery::new("*", self.tables().api_key())
            .and_where("apikey = ?", [Value::from(key)])
            .and_where_sql("isactive = 1")
            .to_sql();
        self.fetch_optional("find_api_key", sql, ApiKey::from_row).await
    }
}
