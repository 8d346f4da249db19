//! Traced prepared statement.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::Value;

use crate::client::{RowSet, Statement};
use crate::config::TracingConfig;
use crate::span::{ActiveSpan, Operation};
use crate::tracer::Tracer;

/// A prepared statement whose executions are traced.
///
/// Obtained from [`TracedConnection::prepare`](crate::TracedConnection).
/// Only [`execute`](Statement::execute) opens a span; binding values is
/// forwarded as is.
#[derive(Debug)]
pub struct TracedStatement<S, T> {
    inner: S,
    tracer: Arc<T>,
    config: Arc<TracingConfig>,
}

impl<S: Statement, T: Tracer> TracedStatement<S, T> {
    pub(crate) fn new(inner: S, tracer: Arc<T>, config: Arc<TracingConfig>) -> Self {
        Self {
            inner,
            tracer,
            config,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Statement, T: Tracer> Statement for TracedStatement<S, T> {
    type Rows = S::Rows;
    type Error = S::Error;

    fn sql(&self) -> &str {
        self.inner.sql()
    }

    fn bind_value(&mut self, position: usize, value: Value) -> Result<(), S::Error> {
        self.inner.bind_value(position, value)
    }

    async fn execute(&mut self, params: Option<Vec<Value>>) -> Result<S::Rows, S::Error> {
        let mut span = ActiveSpan::start(&*self.tracer, Operation::StatementExecute, &self.config);
        span.statement(self.inner.sql());

        let result = span.observe(self.inner.execute(params)).await;
        if let Ok(rows) = &result {
            span.rows(rows.row_count());
        }
        span.finish();

        result
    }
}
