//! The database client interface the decorators wrap.
//!
//! A client library plugs into the decoration chain by implementing
//! [`Driver`], [`Connection`] and [`Statement`]. The traced wrappers implement
//! the very same traits, so application code cannot tell a decorated client
//! from a bare one.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::Value;

/// An error raised by the wrapped client.
///
/// The decorators never wrap or convert these; they only read the code for
/// the `db.error` tag.
pub trait DbError: std::error::Error + Send + Sync + 'static {
    /// Driver-level error code (SQLSTATE, vendor code or a symbolic name).
    fn code(&self) -> String;
}

/// Result of a query, as far as the decorators care about it.
pub trait RowSet: Send {
    /// Number of rows, if known without consuming the result.
    fn row_count(&self) -> Option<u64> {
        None
    }
}

impl<T: Send> RowSet for Vec<T> {
    fn row_count(&self) -> Option<u64> {
        u64::try_from(self.len()).ok()
    }
}

impl RowSet for u64 {
    fn row_count(&self) -> Option<u64> {
        Some(*self)
    }
}

impl RowSet for () {}

/// A prepared statement.
#[async_trait]
pub trait Statement: Send + Sync {
    type Rows: RowSet;
    type Error: DbError;

    /// The SQL this statement was prepared from.
    fn sql(&self) -> &str;

    /// Bind `value` to the 1-based positional parameter `position`.
    fn bind_value(&mut self, position: usize, value: Value) -> Result<(), Self::Error>;

    /// Execute the statement, with `params` replacing any bound values.
    async fn execute(&mut self, params: Option<Vec<Value>>) -> Result<Self::Rows, Self::Error>;
}

/// A live (or lazily connecting) database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    type Statement: Statement;
    type Rows: RowSet;
    type Error: DbError;

    /// Establish the connection. Returns `false` if it was already established.
    async fn connect(&self) -> Result<bool, Self::Error>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), Self::Error>;

    fn database(&self) -> Option<String>;

    fn username(&self) -> Option<String>;

    /// Name of the database platform. Fails when it cannot be determined,
    /// typically because the connection is not established yet.
    fn platform(&self) -> Result<String, Self::Error>;

    fn is_auto_commit(&self) -> bool;

    fn set_auto_commit(&self, auto_commit: bool);

    fn transaction_nesting_level(&self) -> u32;

    fn is_transaction_active(&self) -> bool {
        self.transaction_nesting_level() > 0
    }

    async fn prepare(&self, sql: &str) -> Result<Self::Statement, Self::Error>;

    /// Run a query without parameters.
    async fn query(&self, sql: &str) -> Result<Self::Rows, Self::Error>;

    /// Execute a statement without parameters, returning the affected rows.
    async fn exec(&self, sql: &str) -> Result<u64, Self::Error>;

    async fn execute_query(&self, sql: &str, params: Vec<Value>)
        -> Result<Self::Rows, Self::Error>;

    /// Execute a data-modifying statement, returning the affected rows.
    async fn execute_statement(&self, sql: &str, params: Vec<Value>) -> Result<u64, Self::Error>;

    async fn begin_transaction(&self) -> Result<(), Self::Error>;

    async fn commit(&self) -> Result<(), Self::Error>;

    async fn roll_back(&self) -> Result<(), Self::Error>;

    fn quote(&self, value: &str) -> String;

    fn quote_identifier(&self, identifier: &str) -> String;

    fn last_insert_id(&self) -> Option<u64>;

    async fn create_savepoint(&self, name: &str) -> Result<(), Self::Error>;

    async fn release_savepoint(&self, name: &str) -> Result<(), Self::Error>;

    async fn rollback_savepoint(&self, name: &str) -> Result<(), Self::Error>;

    /// Mark the current transaction so that it can only be rolled back.
    fn set_rollback_only(&self) -> Result<(), Self::Error>;

    fn is_rollback_only(&self) -> Result<bool, Self::Error>;
}

/// Opens connections.
#[async_trait]
pub trait Driver: Send + Sync {
    type Connection: Connection;
    type Error: DbError;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Connection, Self::Error>;
}

/// Something that wraps a driver in another driver.
pub trait Middleware<D: Driver> {
    type Driver: Driver;

    fn wrap(&self, driver: D) -> Self::Driver;
}

// scheme://[user[:password]@]host[/database][?query]
static URL_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:([^:@/]+)(?::[^@/]*)?@)?[^/?#]*(?:/([^?#]+))?")
        .unwrap()
});

/// Connection parameters handed to [`Driver::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    url: String,
    database: Option<String>,
    username: Option<String>,
}

impl ConnectionParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
            username: None,
        }
    }

    /// Override the database name parsed from the URL.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Override the user name parsed from the URL.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> Option<String> {
        self.database.clone().or_else(|| self.url_part(2))
    }

    pub fn username(&self) -> Option<String> {
        self.username.clone().or_else(|| self.url_part(1))
    }

    fn url_part(&self, group: usize) -> Option<String> {
        URL_PARTS
            .captures(&self.url)
            .and_then(|caps| caps.get(group))
            .map(|m| m.as_str().to_owned())
    }
}
