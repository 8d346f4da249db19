//! SeaORM implementation of the client traits.
//!
//! Lets the decoration chain sit in front of a real database:
//!
//! ```rust,ignore
//! use db_tracing_middleware::prelude::*;
//!
//! let driver = SeaOrmDriver::new().with_tracing(TracingTracer);
//! let db = driver.connect(&ConnectionParams::new("postgres://localhost/mydb")).await?;
//! db.exec("UPDATE users SET active = true").await?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    DbErr, ExecResult, QueryResult, SqlErr, Statement as SeaStatement, TransactionTrait, Value,
};
use tokio::sync::Mutex as AsyncMutex;

use crate::client::{Connection, ConnectionParams, DbError, Driver, RowSet, Statement};
use crate::sql;

/// Errors raised by the SeaORM backend.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    #[error("the connection is not established")]
    NotConnected,

    #[error("there is no active transaction")]
    NoActiveTransaction,

    #[error("the transaction is marked rollback-only")]
    RollbackOnly,

    #[error("no value bound for parameter {0}")]
    MissingParameter(usize),

    #[error(transparent)]
    Db(#[from] DbErr),
}

impl DbError for OrmError {
    fn code(&self) -> String {
        match self {
            OrmError::NotConnected => "not_connected".to_owned(),
            OrmError::NoActiveTransaction => "no_active_transaction".to_owned(),
            OrmError::RollbackOnly => "rollback_only".to_owned(),
            OrmError::MissingParameter(_) => "missing_parameter".to_owned(),
            OrmError::Db(err) => err.code(),
        }
    }
}

impl DbError for DbErr {
    fn code(&self) -> String {
        match self.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => return "unique_violation".to_owned(),
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                return "foreign_key_violation".to_owned()
            }
            _ => {}
        }
        let code = match self {
            DbErr::ConnectionAcquire(_) => "connection_acquire",
            DbErr::Conn(_) => "conn",
            DbErr::Exec(_) => "exec",
            DbErr::Query(_) => "query",
            DbErr::RecordNotFound(_) => "record_not_found",
            DbErr::Custom(_) => "custom",
            _ => "db_err",
        };
        code.to_owned()
    }
}

/// Get the database backend name for span attributes.
fn backend_name(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => "postgresql",
        DbBackend::MySql => "mysql",
        DbBackend::Sqlite => "sqlite",
    }
}

struct Shared {
    params: ConnectionParams,
    options: ConnectSettings,
    database: RwLock<Option<Arc<DatabaseConnection>>>,
    // Innermost transaction last. Held across the nested begin/commit awaits.
    transactions: AsyncMutex<Vec<DatabaseTransaction>>,
    depth: AtomicU32,
    auto_commit: AtomicBool,
    rollback_only: AtomicBool,
    last_insert_id: Mutex<Option<u64>>,
}

impl Shared {
    fn database(&self) -> Result<Arc<DatabaseConnection>, OrmError> {
        self.database.read().clone().ok_or(OrmError::NotConnected)
    }

    fn backend(&self) -> Result<DbBackend, OrmError> {
        self.database
            .read()
            .as_ref()
            .map(|db| db.get_database_backend())
            .ok_or(OrmError::NotConnected)
    }

    fn statement(&self, sql: &str, values: Vec<Value>) -> Result<SeaStatement, OrmError> {
        Ok(SeaStatement::from_sql_and_values(self.backend()?, sql, values))
    }

    async fn execute(&self, statement: SeaStatement) -> Result<u64, OrmError> {
        let backend = statement.db_backend;
        let transactions = self.transactions.lock().await;
        let result = match transactions.last() {
            Some(transaction) => transaction.execute(statement).await?,
            None => self.database()?.execute(statement).await?,
        };
        drop(transactions);
        self.remember_insert_id(backend, &result);
        Ok(result.rows_affected())
    }

    async fn query(&self, statement: SeaStatement) -> Result<Vec<QueryResult>, OrmError> {
        let transactions = self.transactions.lock().await;
        match transactions.last() {
            Some(transaction) => Ok(transaction.query_all(statement).await?),
            None => Ok(self.database()?.query_all(statement).await?),
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<(), OrmError> {
        let transactions = self.transactions.lock().await;
        match transactions.last() {
            Some(transaction) => transaction.execute_unprepared(sql).await?,
            None => return Err(OrmError::NoActiveTransaction),
        };
        Ok(())
    }

    fn remember_insert_id(&self, backend: DbBackend, result: &ExecResult) {
        // Postgres reports ids through RETURNING only.
        if backend != DbBackend::Postgres {
            *self.last_insert_id.lock() = Some(result.last_insert_id());
        }
    }

    async fn begin(&self) -> Result<(), OrmError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = match transactions.last() {
            Some(outer) => outer.begin().await?,
            None => self.database()?.begin().await?,
        };
        transactions.push(transaction);
        self.sync_depth(&transactions);
        Ok(())
    }

    async fn finish(&self, commit: bool) -> Result<(), OrmError> {
        let mut transactions = self.transactions.lock().await;
        if transactions.is_empty() {
            return Err(OrmError::NoActiveTransaction);
        }
        if commit && self.rollback_only.load(Ordering::SeqCst) {
            return Err(OrmError::RollbackOnly);
        }
        let transaction = transactions.pop().ok_or(OrmError::NoActiveTransaction)?;
        let result = if commit {
            transaction.commit().await
        } else {
            transaction.rollback().await
        };
        self.sync_depth(&transactions);

        if transactions.is_empty() {
            self.rollback_only.store(false, Ordering::SeqCst);
            if result.is_ok() && !self.auto_commit.load(Ordering::SeqCst) {
                // The outcome above stands; a failed restart surfaces on the next statement.
                if let Err(error) = self.restart(&mut transactions).await {
                    tracing::warn!(error = %error, commit, "Failed to open the next transaction");
                }
            }
        }
        result.map_err(OrmError::from)
    }

    async fn restart(&self, transactions: &mut Vec<DatabaseTransaction>) -> Result<(), OrmError> {
        let transaction = self.database()?.begin().await?;
        transactions.push(transaction);
        self.sync_depth(transactions);
        Ok(())
    }

    fn sync_depth(&self, transactions: &[DatabaseTransaction]) {
        let depth = u32::try_from(transactions.len()).unwrap_or(u32::MAX);
        self.depth.store(depth, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
struct ConnectSettings {
    max_connections: Option<u32>,
    connect_timeout: Option<Duration>,
    sqlx_logging: Option<bool>,
}

impl ConnectSettings {
    fn options(&self, url: &str) -> ConnectOptions {
        let mut options = ConnectOptions::new(url.to_owned());
        if let Some(max) = self.max_connections {
            options.max_connections(max);
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout(timeout);
        }
        if let Some(enabled) = self.sqlx_logging {
            options.sqlx_logging(enabled);
        }
        options
    }
}

/// A [`Connection`] backed by a SeaORM `DatabaseConnection`.
///
/// Transactions nest: the first `begin_transaction` opens a database
/// transaction, further ones open savepoints inside it. Statements run in
/// the innermost open transaction.
///
/// With auto-commit disabled a transaction is opened on connect and again
/// after every outermost commit or rollback.
#[derive(Clone)]
pub struct SeaOrmConnection {
    shared: Arc<Shared>,
}

impl SeaOrmConnection {
    /// Wrap an established SeaORM connection.
    pub fn from_connection(database: DatabaseConnection, params: ConnectionParams) -> Self {
        Self::build(Some(Arc::new(database)), params, ConnectSettings::default())
    }

    /// A connection that connects on the first [`Connection::connect`].
    pub fn lazy(params: ConnectionParams) -> Self {
        Self::build(None, params, ConnectSettings::default())
    }

    fn build(
        database: Option<Arc<DatabaseConnection>>,
        params: ConnectionParams,
        options: ConnectSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                params,
                options,
                database: RwLock::new(database),
                transactions: AsyncMutex::new(Vec::new()),
                depth: AtomicU32::new(0),
                auto_commit: AtomicBool::new(true),
                rollback_only: AtomicBool::new(false),
                last_insert_id: Mutex::new(None),
            }),
        }
    }

    /// The underlying SeaORM connection, if established.
    pub fn database_connection(&self) -> Option<Arc<DatabaseConnection>> {
        self.shared.database.read().clone()
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.shared.params
    }
}

impl fmt::Debug for SeaOrmConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeaOrmConnection")
            .field("params", &self.shared.params)
            .field("connected", &self.is_connected())
            .field("depth", &self.shared.depth.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Connection for SeaOrmConnection {
    type Statement = SeaOrmStatement;
    type Rows = Vec<QueryResult>;
    type Error = OrmError;

    async fn connect(&self) -> Result<bool, OrmError> {
        if self.is_connected() {
            return Ok(false);
        }
        let options = self.shared.options.options(self.shared.params.url());
        let database = Database::connect(options).await?;
        *self.shared.database.write() = Some(Arc::new(database));
        if !self.is_auto_commit() {
            self.shared.begin().await?;
        }
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.shared.database.read().is_some()
    }

    async fn close(&self) -> Result<(), OrmError> {
        // Dropped transactions roll back.
        self.shared.transactions.lock().await.clear();
        self.shared.depth.store(0, Ordering::SeqCst);
        self.shared.rollback_only.store(false, Ordering::SeqCst);
        let database = self.shared.database.write().take();
        // Handles given out by `database_connection` keep the pool open until dropped.
        if let Some(Ok(database)) = database.map(Arc::try_unwrap) {
            database.close().await?;
        }
        Ok(())
    }

    fn database(&self) -> Option<String> {
        self.shared.params.database()
    }

    fn username(&self) -> Option<String> {
        self.shared.params.username()
    }

    fn platform(&self) -> Result<String, OrmError> {
        self.shared.backend().map(|backend| backend_name(backend).to_owned())
    }

    fn is_auto_commit(&self) -> bool {
        self.shared.auto_commit.load(Ordering::SeqCst)
    }

    fn set_auto_commit(&self, auto_commit: bool) {
        self.shared.auto_commit.store(auto_commit, Ordering::SeqCst);
    }

    fn transaction_nesting_level(&self) -> u32 {
        self.shared.depth.load(Ordering::SeqCst)
    }

    async fn prepare(&self, sql: &str) -> Result<SeaOrmStatement, OrmError> {
        // Nothing to send yet; SeaORM prepares on execution.
        self.shared.backend()?;
        Ok(SeaOrmStatement {
            shared: Arc::clone(&self.shared),
            sql: sql.to_owned(),
            bound: Vec::new(),
        })
    }

    async fn query(&self, sql: &str) -> Result<Vec<QueryResult>, OrmError> {
        let statement = self.shared.statement(sql, Vec::new())?;
        self.shared.query(statement).await
    }

    async fn exec(&self, sql: &str) -> Result<u64, OrmError> {
        let statement = self.shared.statement(sql, Vec::new())?;
        self.shared.execute(statement).await
    }

    async fn execute_query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<QueryResult>, OrmError> {
        let statement = self.shared.statement(sql, params)?;
        self.shared.query(statement).await
    }

    async fn execute_statement(&self, sql: &str, params: Vec<Value>) -> Result<u64, OrmError> {
        let statement = self.shared.statement(sql, params)?;
        self.shared.execute(statement).await
    }

    async fn begin_transaction(&self) -> Result<(), OrmError> {
        self.shared.begin().await
    }

    async fn commit(&self) -> Result<(), OrmError> {
        self.shared.finish(true).await
    }

    async fn roll_back(&self) -> Result<(), OrmError> {
        self.shared.finish(false).await
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        let quote = match self.shared.backend() {
            Ok(DbBackend::MySql) => '`',
            _ => '"',
        };
        identifier
            .split('.')
            .map(|part| {
                let escaped = part.replace(quote, &format!("{quote}{quote}"));
                format!("{quote}{escaped}{quote}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn last_insert_id(&self) -> Option<u64> {
        *self.shared.last_insert_id.lock()
    }

    async fn create_savepoint(&self, name: &str) -> Result<(), OrmError> {
        let sql = format!("SAVEPOINT {}", self.quote_identifier(name));
        self.shared.execute_unprepared(&sql).await
    }

    async fn release_savepoint(&self, name: &str) -> Result<(), OrmError> {
        let sql = format!("RELEASE SAVEPOINT {}", self.quote_identifier(name));
        self.shared.execute_unprepared(&sql).await
    }

    async fn rollback_savepoint(&self, name: &str) -> Result<(), OrmError> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", self.quote_identifier(name));
        self.shared.execute_unprepared(&sql).await
    }

    fn set_rollback_only(&self) -> Result<(), OrmError> {
        if !self.is_transaction_active() {
            return Err(OrmError::NoActiveTransaction);
        }
        self.shared.rollback_only.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_rollback_only(&self) -> Result<bool, OrmError> {
        if !self.is_transaction_active() {
            return Err(OrmError::NoActiveTransaction);
        }
        Ok(self.shared.rollback_only.load(Ordering::SeqCst))
    }
}

/// Outcome of [`SeaOrmStatement::execute`].
pub enum StatementResult {
    Rows(Vec<QueryResult>),
    Affected(u64),
}

impl fmt::Debug for StatementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementResult::Rows(rows) => f.debug_tuple("Rows").field(&rows.len()).finish(),
            StatementResult::Affected(affected) => f.debug_tuple("Affected").field(affected).finish(),
        }
    }
}

impl RowSet for StatementResult {
    fn row_count(&self) -> Option<u64> {
        match self {
            StatementResult::Rows(rows) => rows.row_count(),
            StatementResult::Affected(affected) => Some(*affected),
        }
    }
}

/// A statement prepared on a [`SeaOrmConnection`].
///
/// Row-returning statements (`SELECT`, `WITH`, `SHOW`, anything with a
/// `RETURNING` clause) yield [`StatementResult::Rows`]; everything else
/// yields the affected row count.
pub struct SeaOrmStatement {
    shared: Arc<Shared>,
    sql: String,
    bound: Vec<Option<Value>>,
}

impl SeaOrmStatement {
    fn bound_values(&self) -> Result<Vec<Value>, OrmError> {
        self.bound
            .iter()
            .enumerate()
            .map(|(index, value)| value.clone().ok_or(OrmError::MissingParameter(index + 1)))
            .collect()
    }
}

impl fmt::Debug for SeaOrmStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeaOrmStatement")
            .field("sql", &self.sql)
            .field("bound", &self.bound.len())
            .finish()
    }
}

#[async_trait]
impl Statement for SeaOrmStatement {
    type Rows = StatementResult;
    type Error = OrmError;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind_value(&mut self, position: usize, value: Value) -> Result<(), OrmError> {
        let index = position.checked_sub(1).ok_or(OrmError::MissingParameter(position))?;
        if self.bound.len() <= index {
            self.bound.resize(index + 1, None);
        }
        self.bound[index] = Some(value);
        Ok(())
    }

    async fn execute(&mut self, params: Option<Vec<Value>>) -> Result<StatementResult, OrmError> {
        let values = match params {
            Some(values) => values,
            None => self.bound_values()?,
        };
        let statement = self.shared.statement(&self.sql, values)?;
        if sql::returns_rows(&self.sql) {
            Ok(StatementResult::Rows(self.shared.query(statement).await?))
        } else {
            Ok(StatementResult::Affected(self.shared.execute(statement).await?))
        }
    }
}

/// A [`Driver`] opening SeaORM connections.
#[derive(Debug, Clone, Default)]
pub struct SeaOrmDriver {
    settings: ConnectSettings,
}

impl SeaOrmDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.settings.max_connections = Some(max);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = Some(timeout);
        self
    }

    /// Toggle sqlx's own statement logging.
    pub fn with_sqlx_logging(mut self, enabled: bool) -> Self {
        self.settings.sqlx_logging = Some(enabled);
        self
    }
}

#[async_trait]
impl Driver for SeaOrmDriver {
    type Connection = SeaOrmConnection;
    type Error = OrmError;

    async fn connect(&self, params: &ConnectionParams) -> Result<SeaOrmConnection, OrmError> {
        let connection = SeaOrmConnection::build(None, params.clone(), self.settings.clone());
        connection.connect().await?;
        Ok(connection)
    }
}
