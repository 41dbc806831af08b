use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments};

/// Rendered SQL text plus positional parameters
#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// `asc` selects ascending; anything else, including absence, is descending.
    pub fn parse_or_desc(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

/// Incrementally assembles a paginated SELECT with `?` placeholders.
///
/// Columns, joins and ORDER BY fragments come from code, never from request
/// input; request values only ever land in `params`.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    columns: String,
    from: String,
    conditions: Vec<String>,
    params: Vec<Value>,
    order_by: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SelectQuery {
    pub fn new(columns: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            from: from.into(),
            conditions: Vec::new(),
            params: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Add an `AND` condition with its bound values (one per `?`).
    pub fn and_where(mut self, condition: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        self.conditions.push(condition.into());
        self.params.extend(params);
        self
    }

    /// Add a fixed `AND` condition that takes no parameters.
    pub fn and_where_sql(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Same as `and_where` but only when a value is present.
    pub fn and_where_opt<T: Into<Value>>(self, condition: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.and_where(condition, [v.into()]),
            None => self,
        }
    }

    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut query = format!("SELECT {} FROM {}{}", self.columns, self.from, self.where_clause());
        let mut params = self.params.clone();

        if let Some(order) = &self.order_by {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }
        if let Some(limit) = self.limit {
            query.push_str(" LIMIT ?");
            params.push(Value::from(limit));
        }
        if let Some(offset) = self.offset {
            query.push_str(" OFFSET ?");
            params.push(Value::from(offset));
        }

        SqlResult { query, params }
    }

    /// COUNT over the same FROM/WHERE, ignoring order and pagination.
    pub fn to_count_sql(&self) -> SqlResult {
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {}{}", self.from, self.where_clause()),
            params: self.params.clone(),
        }
    }
}

/// Bind a JSON parameter onto a MySQL query
pub fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, MySql, MySqlArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Arrays and objects are stored as JSON text
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}

/// Build a query with every parameter of `sql` bound in order.
pub fn bound_query(sql: &SqlResult) -> sqlx::query::Query<'_, MySql, MySqlArguments> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param_query(q, p);
    }
    q
}
