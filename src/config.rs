//! Configuration for tracing behavior.

use std::time::Duration;

/// Span naming convention.
///
/// Older trace dashboards key on the short transaction names
/// (`db.transaction`, `db.commit`, `db.rollback`, `db.prepare.execute`);
/// newer ones on the dotted `db.transaction.*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanNaming {
    #[default]
    Standard,
    Legacy,
}

/// Configuration options shared by every decorator in a chain.
///
/// # Example
///
/// ```rust
/// use db_tracing_middleware::{SpanNaming, TracingConfig};
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_max_sql_length(512)
///     .with_naming(SpanNaming::Legacy)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Maximum number of characters of SQL recorded in `db.statement`.
    /// Default: `None` (record the full statement)
    pub max_sql_length: Option<usize>,

    /// Whether to record SQL text, operation and table on spans.
    /// Default: `true`
    pub record_statements: bool,

    /// Whether to record the number of rows affected/returned.
    /// Default: `true`
    pub record_row_counts: bool,

    /// Calls slower than this get `db.slow_query` and a WARN event.
    /// Default: 500ms
    pub slow_query_threshold: Duration,

    /// Overrides the `db.instance` tag reported by the connection.
    /// Default: `None`
    pub database_name: Option<String>,

    /// Default: [`SpanNaming::Standard`]
    pub naming: SpanNaming,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            max_sql_length: None,
            record_statements: true,
            record_row_counts: true,
            slow_query_threshold: Duration::from_millis(500),
            database_name: None,
            naming: SpanNaming::Standard,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncate recorded SQL to at most `max` characters.
    ///
    /// The statement handed to the database is never truncated.
    pub fn with_max_sql_length(mut self, max: usize) -> Self {
        self.max_sql_length = Some(max);
        self
    }

    /// Enable or disable SQL statement recording.
    ///
    /// **Security Warning**: SQL text may carry literals with credentials or PII.
    pub fn with_statement_recording(mut self, enabled: bool) -> Self {
        self.record_statements = enabled;
        self
    }

    /// Enable or disable row count recording.
    pub fn with_row_count_recording(mut self, enabled: bool) -> Self {
        self.record_row_counts = enabled;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Set a database name to report instead of the connection's own.
    ///
    /// Useful when your application connects to multiple databases.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn with_naming(mut self, naming: SpanNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Create a development-friendly configuration: full SQL, low slow threshold.
    pub fn development() -> Self {
        Self {
            slow_query_threshold: Duration::from_millis(100),
            ..Self::default()
        }
    }

    /// Create a production-safe configuration: bounded SQL text.
    pub fn production() -> Self {
        Self {
            max_sql_length: Some(1024),
            slow_query_threshold: Duration::from_secs(1),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_max_sql_length(10)
            .with_database_name("test_db")
            .with_naming(SpanNaming::Legacy);

        assert_eq!(config.max_sql_length, Some(10));
        assert_eq!(config.database_name, Some("test_db".to_string()));
        assert_eq!(config.naming, SpanNaming::Legacy);
        assert!(config.record_statements);
    }

    #[test]
    fn test_default_records_full_sql() {
        let config = TracingConfig::new();
        assert_eq!(config.max_sql_length, None);
        assert!(config.record_row_counts);
        assert_eq!(config.naming, SpanNaming::Standard);
    }

    #[test]
    fn test_presets() {
        assert_eq!(TracingConfig::development().max_sql_length, None);
        assert_eq!(TracingConfig::production().max_sql_length, Some(1024));
        assert!(
            TracingConfig::production().slow_query_threshold
                > TracingConfig::development().slow_query_threshold
        );
    }
}
