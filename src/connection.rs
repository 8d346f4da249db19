//! Traced database connection wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::Value;

use crate::client::{Connection, RowSet};
use crate::config::TracingConfig;
use crate::span::{ActiveSpan, Operation};
use crate::statement::TracedStatement;
use crate::tag::Tag;
use crate::tracer::Tracer;

/// A traced wrapper around any [`Connection`].
///
/// `TracedConnection` implements `Connection` itself, making it a drop-in
/// replacement for the connection it wraps. Connecting, preparing, querying,
/// executing and the transaction boundaries each open a span; everything
/// else (quoting, savepoints, accessors) is forwarded untraced.
///
/// # Span Nesting
///
/// With [`TracingTracer`](crate::TracingTracer), spans become children of
/// the current tracing span context, and anything the wrapped client logs
/// while serving the call appears under the database span.
///
/// # Example
///
/// ```rust,ignore
/// use db_tracing_middleware::{TracedConnection, TracingConfig, TracingTracer};
///
/// let traced = TracedConnection::new(connection, TracingTracer, TracingConfig::default());
/// let rows = traced.query("SELECT * FROM users").await?;
/// ```
#[derive(Debug)]
pub struct TracedConnection<C, T> {
    inner: C,
    tracer: Arc<T>,
    config: Arc<TracingConfig>,
}

impl<C: Connection, T: Tracer> TracedConnection<C, T> {
    /// Wrap `connection` with its own tracer and configuration.
    pub fn new(connection: C, tracer: T, config: TracingConfig) -> Self {
        Self::from_shared(connection, Arc::new(tracer), Arc::new(config))
    }

    pub(crate) fn from_shared(connection: C, tracer: Arc<T>, config: Arc<TracingConfig>) -> Self {
        Self {
            inner: connection,
            tracer,
            config,
        }
    }

    /// Get a reference to the underlying connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Get the tracing configuration.
    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    /// Consume the wrapper and return the underlying connection.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Open a span carrying the connection context known before the call.
    fn open(&self, operation: Operation) -> ActiveSpan<T::Span> {
        let mut span = ActiveSpan::start(&*self.tracer, operation, &self.config);
        let database = self
            .config
            .database_name
            .clone()
            .or_else(|| self.inner.database());
        span.tag_opt(database.map(Tag::instance))
            .tag_opt(self.inner.username().map(Tag::user));
        if operation != Operation::Connect {
            // Unknown until connected; skipped rather than failing the call.
            span.tag_opt(self.inner.platform().ok().map(Tag::db_type));
        }
        span.tag(Tag::auto_commit(self.inner.is_auto_commit()));
        span
    }

    /// Record the state left behind by the call and finish the span.
    fn settle(&self, mut span: ActiveSpan<T::Span>) {
        span.tag(Tag::nesting_level(self.inner.transaction_nesting_level()));
        span.finish();
    }
}

#[async_trait]
impl<C: Connection, T: Tracer> Connection for TracedConnection<C, T> {
    type Statement = TracedStatement<C::Statement, T>;
    type Rows = C::Rows;
    type Error = C::Error;

    async fn connect(&self) -> Result<bool, C::Error> {
        if self.inner.is_connected() {
            return Ok(false);
        }
        let mut span = self.open(Operation::Connect);
        let result = span.observe(self.inner.connect()).await;
        span.tag_opt(self.inner.platform().ok().map(Tag::db_type));
        self.settle(span);
        result
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn close(&self) -> Result<(), C::Error> {
        self.inner.close().await
    }

    fn database(&self) -> Option<String> {
        self.inner.database()
    }

    fn username(&self) -> Option<String> {
        self.inner.username()
    }

    fn platform(&self) -> Result<String, C::Error> {
        self.inner.platform()
    }

    fn is_auto_commit(&self) -> bool {
        self.inner.is_auto_commit()
    }

    fn set_auto_commit(&self, auto_commit: bool) {
        self.inner.set_auto_commit(auto_commit);
    }

    fn transaction_nesting_level(&self) -> u32 {
        self.inner.transaction_nesting_level()
    }

    fn is_transaction_active(&self) -> bool {
        self.inner.is_transaction_active()
    }

    async fn prepare(&self, sql: &str) -> Result<Self::Statement, C::Error> {
        let mut span = self.open(Operation::Prepare);
        span.statement(sql);
        let result = span.observe(self.inner.prepare(sql)).await;
        self.settle(span);
        result.map(|statement| {
            TracedStatement::new(statement, Arc::clone(&self.tracer), Arc::clone(&self.config))
        })
    }

    async fn query(&self, sql: &str) -> Result<C::Rows, C::Error> {
        let mut span = self.open(Operation::Query);
        span.statement(sql);
        let result = span.observe(self.inner.query(sql)).await;
        span.rows(result.as_ref().ok().and_then(RowSet::row_count));
        self.settle(span);
        result
    }

    async fn exec(&self, sql: &str) -> Result<u64, C::Error> {
        let mut span = self.open(Operation::Exec);
        span.statement(sql);
        let result = span.observe(self.inner.exec(sql)).await;
        span.rows(result.as_ref().ok().copied());
        self.settle(span);
        result
    }

    async fn execute_query(&self, sql: &str, params: Vec<Value>) -> Result<C::Rows, C::Error> {
        let mut span = self.open(Operation::Execute);
        span.statement(sql);
        let result = span.observe(self.inner.execute_query(sql, params)).await;
        span.rows(result.as_ref().ok().and_then(RowSet::row_count));
        self.settle(span);
        result
    }

    async fn execute_statement(&self, sql: &str, params: Vec<Value>) -> Result<u64, C::Error> {
        let mut span = self.open(Operation::Execute);
        span.statement(sql);
        let result = span.observe(self.inner.execute_statement(sql, params)).await;
        span.rows(result.as_ref().ok().copied());
        self.settle(span);
        result
    }

    async fn begin_transaction(&self) -> Result<(), C::Error> {
        let mut span = self.open(Operation::Begin);
        let result = span.observe(self.inner.begin_transaction()).await;
        self.settle(span);
        result
    }

    async fn commit(&self) -> Result<(), C::Error> {
        let mut span = self.open(Operation::Commit);
        let result = span.observe(self.inner.commit()).await;
        self.settle(span);
        result
    }

    async fn roll_back(&self) -> Result<(), C::Error> {
        let mut span = self.open(Operation::Rollback);
        let result = span.observe(self.inner.roll_back()).await;
        self.settle(span);
        result
    }

    fn quote(&self, value: &str) -> String {
        self.inner.quote(value)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        self.inner.quote_identifier(identifier)
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.inner.last_insert_id()
    }

    async fn create_savepoint(&self, name: &str) -> Result<(), C::Error> {
        self.inner.create_savepoint(name).await
    }

    async fn release_savepoint(&self, name: &str) -> Result<(), C::Error> {
        self.inner.release_savepoint(name).await
    }

    async fn rollback_savepoint(&self, name: &str) -> Result<(), C::Error> {
        self.inner.rollback_savepoint(name).await
    }

    fn set_rollback_only(&self) -> Result<(), C::Error> {
        self.inner.set_rollback_only()
    }

    fn is_rollback_only(&self) -> Result<bool, C::Error> {
        self.inner.is_rollback_only()
    }
}
