//! Span lifecycle shared by all decorators.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::client::DbError;
use crate::config::{SpanNaming, TracingConfig};
use crate::sql;
use crate::tag::Tag;
use crate::tracer::{TraceSpan, Tracer};

/// The traced operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DriverConnect,
    Connect,
    Prepare,
    Query,
    Exec,
    Execute,
    Begin,
    Commit,
    Rollback,
    StatementExecute,
}

impl Operation {
    pub fn span_name(self, naming: SpanNaming) -> &'static str {
        match (self, naming) {
            (Operation::DriverConnect, _) => "db.driver.connect",
            (Operation::Connect, _) => "db.connect",
            (Operation::Prepare, _) => "db.prepare",
            (Operation::Query, _) => "db.query",
            (Operation::Exec, _) => "db.exec",
            (Operation::Execute, _) => "db.execute",
            (Operation::Begin, SpanNaming::Standard) => "db.transaction.begin",
            (Operation::Begin, SpanNaming::Legacy) => "db.transaction",
            (Operation::Commit, SpanNaming::Standard) => "db.transaction.commit",
            (Operation::Commit, SpanNaming::Legacy) => "db.commit",
            (Operation::Rollback, SpanNaming::Standard) => "db.transaction.rollback",
            (Operation::Rollback, SpanNaming::Legacy) => "db.rollback",
            (Operation::StatementExecute, SpanNaming::Standard) => "db.stmt.execute",
            (Operation::StatementExecute, SpanNaming::Legacy) => "db.prepare.execute",
        }
    }
}

/// An open span owned by one intercepted call.
///
/// The span is finished when this guard goes away, whichever way the call
/// exits: normal return, `?`, or the future being dropped mid-await.
pub(crate) struct ActiveSpan<S: TraceSpan> {
    span: Option<S>,
    name: &'static str,
    config: Arc<TracingConfig>,
}

impl<S: TraceSpan> ActiveSpan<S> {
    pub(crate) fn start<T>(tracer: &T, operation: Operation, config: &Arc<TracingConfig>) -> Self
    where
        T: Tracer<Span = S>,
    {
        let name = operation.span_name(config.naming);
        Self {
            span: Some(tracer.start(name)),
            name,
            config: Arc::clone(config),
        }
    }

    pub(crate) fn tag(&mut self, tag: Tag) -> &mut Self {
        if let Some(span) = self.span.as_mut() {
            span.add_tag(tag);
        }
        self
    }

    /// Tag only if the value could be obtained.
    pub(crate) fn tag_opt(&mut self, tag: Option<Tag>) -> &mut Self {
        match tag {
            Some(tag) => self.tag(tag),
            None => self,
        }
    }

    /// SQL text (truncated), operation and table.
    pub(crate) fn statement(&mut self, sql: &str) -> &mut Self {
        if !self.config.record_statements {
            return self;
        }
        let text = sql::truncate(sql, self.config.max_sql_length).into_owned();
        let table = sql::extract_table(sql).map(Tag::table);
        self.tag(Tag::statement(text))
            .tag(Tag::operation(sql::parse_operation(sql).as_str()))
            .tag_opt(table)
    }

    pub(crate) fn rows(&mut self, count: Option<u64>) -> &mut Self {
        if !self.config.record_row_counts {
            return self;
        }
        self.tag_opt(count.map(Tag::rows))
    }

    /// Await the delegated call inside the span and record how it went.
    ///
    /// The result is handed back untouched.
    pub(crate) async fn observe<F, T, E>(&mut self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: DbError,
    {
        let context = self
            .span
            .as_ref()
            .map_or_else(tracing::Span::none, TraceSpan::context);
        let started = Instant::now();
        let result = call.instrument(context.clone()).await;
        let elapsed = started.elapsed();

        self.tag(Tag::duration(elapsed));
        if elapsed > self.config.slow_query_threshold {
            self.tag(Tag::slow_query());
            let threshold_ms = self.config.slow_query_threshold.as_millis() as u64;
            context.in_scope(|| {
                tracing::warn!(
                    operation = self.name,
                    duration_ms = elapsed.as_millis() as u64,
                    threshold_ms,
                    "Slow database operation"
                );
            });
        }

        if let Err(error) = &result {
            let code = error.code();
            context.in_scope(|| {
                tracing::error!(
                    operation = self.name,
                    code = %code,
                    error = %error,
                    "Database operation failed"
                );
            });
            self.tag(Tag::error_code(code)).tag(Tag::error());
        }

        result
    }

    pub(crate) fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(span) = self.span.take() {
            span.finish();
        }
    }
}

impl<S: TraceSpan> Drop for ActiveSpan<S> {
    fn drop(&mut self) {
        self.close();
    }
}
