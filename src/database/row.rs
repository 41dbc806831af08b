use chrono::NaiveDateTime;
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::Row;

/// Lenient column accessors for the help-desk schema.
///
/// Ids are a mix of signed and unsigned INT columns and flags are TINYINTs,
/// so integers are read without sqlx's strict signedness check.
pub trait RowExt {
    fn int(&self, column: &str) -> Result<i64, sqlx::Error>;
    fn opt_int(&self, column: &str) -> Result<Option<i64>, sqlx::Error>;
    fn flag(&self, column: &str) -> Result<bool, sqlx::Error>;
    fn text(&self, column: &str) -> Result<String, sqlx::Error>;
    fn opt_text(&self, column: &str) -> Result<Option<String>, sqlx::Error>;
    fn opt_datetime(&self, column: &str) -> Result<Option<NaiveDateTime>, sqlx::Error>;
    fn opt_json(&self, column: &str) -> Result<Option<Value>, sqlx::Error>;
}

impl RowExt for MySqlRow {
    fn int(&self, column: &str) -> Result<i64, sqlx::Error> {
        Ok(self.opt_int(column)?.unwrap_or(0))
    }

    fn opt_int(&self, column: &str) -> Result<Option<i64>, sqlx::Error> {
        self.try_get_unchecked::<Option<i64>, _>(column)
    }

    fn flag(&self, column: &str) -> Result<bool, sqlx::Error> {
        Ok(self.int(column)? != 0)
    }

    fn text(&self, column: &str) -> Result<String, sqlx::Error> {
        Ok(self.opt_text(column)?.unwrap_or_default())
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>, sqlx::Error> {
        self.try_get_unchecked::<Option<String>, _>(column)
    }

    fn opt_datetime(&self, column: &str) -> Result<Option<NaiveDateTime>, sqlx::Error> {
        self.try_get::<Option<NaiveDateTime>, _>(column)
    }

    /// JSON stored in a TEXT column; unparseable text is treated as absent.
    fn opt_json(&self, column: &str) -> Result<Option<Value>, sqlx::Error> {
        Ok(self
            .opt_text(column)?
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| serde_json::from_str(&s).ok()))
    }
}
