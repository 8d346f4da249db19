//! Span tags.

use std::fmt;
use std::time::Duration;

/// Tag keys recorded on database spans.
pub mod keys {
    pub const DB_INSTANCE: &str = "db.instance";
    pub const DB_USER: &str = "db.user";
    pub const DB_TYPE: &str = "db.type";
    pub const DB_STATEMENT: &str = "db.statement";
    pub const DB_OPERATION: &str = "db.operation";
    pub const DB_TABLE: &str = "db.sql.table";
    pub const AUTO_COMMIT: &str = "db.auto_commit";
    pub const NESTING_LEVEL: &str = "db.nesting_level";
    pub const ROWS: &str = "db.rows";
    pub const ERROR_CODE: &str = "db.error";
    pub const ERROR: &str = "error";
    pub const DURATION_MS: &str = "db.duration_ms";
    pub const SLOW_QUERY: &str = "db.slow_query";
}

/// The typed value carried by a [`Tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Bool(bool),
    Str(String),
    Long(i64),
}

impl TagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            TagValue::Long(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(value) => write!(f, "{value}"),
            TagValue::Str(value) => f.write_str(value),
            TagValue::Long(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Str(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_owned())
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Long(value)
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        TagValue::Long(i64::from(value))
    }
}

impl From<u64> for TagValue {
    fn from(value: u64) -> Self {
        TagValue::Long(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// One immutable fact about a traced operation.
///
/// Tags are plain data: the tracer decides how to store or export them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    key: &'static str,
    value: TagValue,
}

impl Tag {
    pub fn new(key: &'static str, value: impl Into<TagValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    pub fn into_parts(self) -> (&'static str, TagValue) {
        (self.key, self.value)
    }

    /// Database (instance) name.
    pub fn instance(name: impl Into<String>) -> Self {
        Self::new(keys::DB_INSTANCE, name.into())
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(keys::DB_USER, name.into())
    }

    /// Database platform, e.g. `postgresql`.
    pub fn db_type(platform: impl Into<String>) -> Self {
        Self::new(keys::DB_TYPE, platform.into())
    }

    pub fn statement(sql: impl Into<String>) -> Self {
        Self::new(keys::DB_STATEMENT, sql.into())
    }

    pub fn operation(verb: &str) -> Self {
        Self::new(keys::DB_OPERATION, verb)
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(keys::DB_TABLE, name.into())
    }

    pub fn auto_commit(enabled: bool) -> Self {
        Self::new(keys::AUTO_COMMIT, enabled)
    }

    pub fn nesting_level(depth: u32) -> Self {
        Self::new(keys::NESTING_LEVEL, depth)
    }

    /// Affected or returned row count.
    pub fn rows(count: u64) -> Self {
        Self::new(keys::ROWS, count)
    }

    /// Code of the error raised by the wrapped call.
    pub fn error_code(code: impl fmt::Display) -> Self {
        Self::new(keys::ERROR_CODE, code.to_string())
    }

    /// Error flag, always `true`.
    pub fn error() -> Self {
        Self::new(keys::ERROR, true)
    }

    pub fn duration(elapsed: Duration) -> Self {
        Self::new(
            keys::DURATION_MS,
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        )
    }

    pub fn slow_query() -> Self {
        Self::new(keys::SLOW_QUERY, true)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
