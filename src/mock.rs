//! Scripted client used by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sea_orm::Value;

use crate::client::{Connection, ConnectionParams, DbError, Driver, Statement};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub(crate) struct MockError {
    pub(crate) code: String,
    pub(crate) message: String,
}

impl MockError {
    pub(crate) fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_owned(),
            message: message.to_owned(),
        }
    }
}

impl DbError for MockError {
    fn code(&self) -> String {
        self.code.clone()
    }
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    auto_commit: bool,
    depth: u32,
    rollback_only: bool,
    affected: u64,
    rows: Vec<String>,
    failures: HashMap<&'static str, MockError>,
    calls: Vec<String>,
}

/// A connection whose results come from a script.
#[derive(Debug, Clone)]
pub(crate) struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                auto_commit: true,
                depth: 0,
                rollback_only: false,
                affected: 0,
                rows: Vec::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub(crate) fn disconnected() -> Self {
        let connection = Self::new();
        connection.state.lock().connected = false;
        connection
    }

    pub(crate) fn with_affected_rows(self, affected: u64) -> Self {
        self.state.lock().affected = affected;
        self
    }

    pub(crate) fn with_rows(self, rows: &[&str]) -> Self {
        self.state.lock().rows = rows.iter().map(|row| (*row).to_owned()).collect();
        self
    }

    /// Make `operation` fail with `error` from now on.
    pub(crate) fn failing(self, operation: &'static str, error: MockError) -> Self {
        self.state.lock().failures.insert(operation, error);
        self
    }

    /// Calls received so far, as `operation` or `operation:sql`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn call(&self, operation: &'static str, sql: Option<&str>) -> Result<(), MockError> {
        let mut state = self.state.lock();
        state.calls.push(match sql {
            Some(sql) => format!("{operation}:{sql}"),
            None => operation.to_owned(),
        });
        match state.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Statement = MockStatement;
    type Rows = Vec<String>;
    type Error = MockError;

    async fn connect(&self) -> Result<bool, MockError> {
        if self.is_connected() {
            return Ok(false);
        }
        self.call("connect", None)?;
        self.state.lock().connected = true;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn close(&self) -> Result<(), MockError> {
        self.call("close", None)?;
        self.state.lock().connected = false;
        Ok(())
    }

    fn database(&self) -> Option<String> {
        Some("shop".to_owned())
    }

    fn username(&self) -> Option<String> {
        Some("app".to_owned())
    }

    fn platform(&self) -> Result<String, MockError> {
        if self.is_connected() {
            Ok("postgresql".to_owned())
        } else {
            Err(MockError::new("08003", "connection does not exist"))
        }
    }

    fn is_auto_commit(&self) -> bool {
        self.state.lock().auto_commit
    }

    fn set_auto_commit(&self, auto_commit: bool) {
        self.state.lock().auto_commit = auto_commit;
    }

    fn transaction_nesting_level(&self) -> u32 {
        self.state.lock().depth
    }

    async fn prepare(&self, sql: &str) -> Result<MockStatement, MockError> {
        self.call("prepare", Some(sql))?;
        Ok(MockStatement {
            sql: sql.to_owned(),
            bound: Vec::new(),
            connection: self.clone(),
        })
    }

    async fn query(&self, sql: &str) -> Result<Vec<String>, MockError> {
        self.call("query", Some(sql))?;
        if sql == "PENDING" {
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().rows.clone())
    }

    async fn exec(&self, sql: &str) -> Result<u64, MockError> {
        self.call("exec", Some(sql))?;
        Ok(self.state.lock().affected)
    }

    async fn execute_query(&self, sql: &str, _params: Vec<Value>) -> Result<Vec<String>, MockError> {
        self.call("execute_query", Some(sql))?;
        Ok(self.state.lock().rows.clone())
    }

    async fn execute_statement(&self, sql: &str, _params: Vec<Value>) -> Result<u64, MockError> {
        self.call("execute_statement", Some(sql))?;
        Ok(self.state.lock().affected)
    }

    async fn begin_transaction(&self) -> Result<(), MockError> {
        self.call("begin_transaction", None)?;
        self.state.lock().depth += 1;
        Ok(())
    }

    async fn commit(&self) -> Result<(), MockError> {
        self.call("commit", None)?;
        let mut state = self.state.lock();
        if state.depth == 0 {
            return Err(MockError::new("25000", "no active transaction"));
        }
        state.depth -= 1;
        Ok(())
    }

    async fn roll_back(&self) -> Result<(), MockError> {
        self.call("roll_back", None)?;
        let mut state = self.state.lock();
        if state.depth == 0 {
            return Err(MockError::new("25000", "no active transaction"));
        }
        state.depth -= 1;
        Ok(())
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{identifier}\"")
    }

    fn last_insert_id(&self) -> Option<u64> {
        Some(42)
    }

    async fn create_savepoint(&self, name: &str) -> Result<(), MockError> {
        self.call("create_savepoint", Some(name))
    }

    async fn release_savepoint(&self, name: &str) -> Result<(), MockError> {
        self.call("release_savepoint", Some(name))
    }

    async fn rollback_savepoint(&self, name: &str) -> Result<(), MockError> {
        self.call("rollback_savepoint", Some(name))
    }

    fn set_rollback_only(&self) -> Result<(), MockError> {
        self.state.lock().rollback_only = true;
        Ok(())
    }

    fn is_rollback_only(&self) -> Result<bool, MockError> {
        Ok(self.state.lock().rollback_only)
    }
}

#[derive(Debug)]
pub(crate) struct MockStatement {
    sql: String,
    bound: Vec<Value>,
    connection: MockConnection,
}

impl MockStatement {
    pub(crate) fn bound(&self) -> &[Value] {
        &self.bound
    }
}

#[async_trait]
impl Statement for MockStatement {
    type Rows = Vec<String>;
    type Error = MockError;

    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind_value(&mut self, _position: usize, value: Value) -> Result<(), MockError> {
        self.bound.push(value);
        Ok(())
    }

    async fn execute(&mut self, _params: Option<Vec<Value>>) -> Result<Vec<String>, MockError> {
        self.connection.call("statement.execute", Some(&self.sql))?;
        Ok(self.connection.state.lock().rows.clone())
    }
}

/// Hands out clones of one scripted connection.
#[derive(Debug, Clone)]
pub(crate) struct MockDriver {
    connection: MockConnection,
    failure: Option<MockError>,
}

impl MockDriver {
    pub(crate) fn new(connection: MockConnection) -> Self {
        Self {
            connection,
            failure: None,
        }
    }

    pub(crate) fn failing(error: MockError) -> Self {
        Self {
            connection: MockConnection::new(),
            failure: Some(error),
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Connection = MockConnection;
    type Error = MockError;

    async fn connect(&self, _params: &ConnectionParams) -> Result<MockConnection, MockError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.connection.clone()),
        }
    }
}
