//! Tracer interface consumed by the decorators, and its `tracing` implementation.

use tracing::{field, Span};

use crate::tag::{keys, Tag, TagValue};

/// Source of spans.
///
/// Tracers are shared by every decorator in a chain, so they must be
/// `Send + Sync`; any bookkeeping they do happens behind their own locks.
pub trait Tracer: Send + Sync + 'static {
    type Span: TraceSpan;

    /// Start a span for `operation`, e.g. `db.query`.
    fn start(&self, operation: &'static str) -> Self::Span;
}

/// One open span.
pub trait TraceSpan: Send {
    /// Attach a tag. Chainable.
    fn add_tag(&mut self, tag: Tag) -> &mut Self;

    /// Terminate the span. Consumes it, so a span can only finish once.
    fn finish(self);

    /// The `tracing` span to run the delegated call in, if any.
    ///
    /// Work done by the wrapped client (its own events and spans) nests under
    /// this span. The default is a disabled span.
    fn context(&self) -> Span {
        Span::none()
    }
}

/// Emits database spans through the `tracing` crate.
///
/// Spans become children of the current span context, so when the host runs
/// an HTTP tracing middleware the database spans show up under the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl TracingTracer {
    pub fn new() -> Self {
        Self
    }
}

macro_rules! db_span {
    ($name:literal, $operation:expr) => {
        tracing::info_span!(
            $name,
            otel.name = $operation,
            otel.kind = "client",
            otel.status_code = field::Empty,
            "db.instance" = field::Empty,
            "db.user" = field::Empty,
            "db.type" = field::Empty,
            "db.statement" = field::Empty,
            "db.operation" = field::Empty,
            "db.sql.table" = field::Empty,
            "db.auto_commit" = field::Empty,
            "db.nesting_level" = field::Empty,
            "db.rows" = field::Empty,
            "db.error" = field::Empty,
            "db.duration_ms" = field::Empty,
            "db.slow_query" = field::Empty,
            error = field::Empty,
        )
    };
}

impl Tracer for TracingTracer {
    type Span = TracingSpan;

    fn start(&self, operation: &'static str) -> TracingSpan {
        // Span names are part of the callsite metadata and have to be literals;
        // `otel.name` always carries the operation itself.
        let span = match operation {
            "db.driver.connect" => db_span!("db.driver.connect", operation),
            "db.connect" => db_span!("db.connect", operation),
            "db.prepare" => db_span!("db.prepare", operation),
            "db.query" => db_span!("db.query", operation),
            "db.exec" => db_span!("db.exec", operation),
            "db.execute" => db_span!("db.execute", operation),
            "db.transaction" => db_span!("db.transaction", operation),
            "db.transaction.begin" => db_span!("db.transaction.begin", operation),
            "db.transaction.commit" => db_span!("db.transaction.commit", operation),
            "db.transaction.rollback" => db_span!("db.transaction.rollback", operation),
            "db.commit" => db_span!("db.commit", operation),
            "db.rollback" => db_span!("db.rollback", operation),
            "db.stmt.execute" => db_span!("db.stmt.execute", operation),
            "db.prepare.execute" => db_span!("db.prepare.execute", operation),
            _ => db_span!("db", operation),
        };
        TracingSpan {
            span,
            failed: false,
        }
    }
}

/// A span started by [`TracingTracer`].
#[derive(Debug)]
pub struct TracingSpan {
    span: Span,
    failed: bool,
}

impl TraceSpan for TracingSpan {
    fn add_tag(&mut self, tag: Tag) -> &mut Self {
        let (key, value) = tag.into_parts();
        if key == keys::ERROR {
            self.failed = true;
        }
        match value {
            TagValue::Bool(value) => self.span.record(key, value),
            TagValue::Str(value) => self.span.record(key, value.as_str()),
            TagValue::Long(value) => self.span.record(key, value),
        };
        self
    }

    fn finish(self) {
        let status = if self.failed { "ERROR" } else { "OK" };
        self.span.record("otel.status_code", status);
    }

    fn context(&self) -> Span {
        self.span.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{span, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    #[test]
    fn test_tracing_spans_accept_every_tag() {
        let tracer = TracingTracer::new();
        let mut span = tracer.start("db.query");
        span.add_tag(Tag::statement("SELECT 1"))
            .add_tag(Tag::rows(1))
            .add_tag(Tag::auto_commit(true));
        assert!(!span.failed);
        span.finish();
    }

    #[test]
    fn test_error_tag_marks_span_failed() {
        let tracer = TracingTracer::new();
        let mut span = tracer.start("db.transaction.begin");
        span.add_tag(Tag::error_code("40001")).add_tag(Tag::error());
        assert!(span.failed);
        span.finish();
    }

    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<(&'static str, String)>>>);

    impl<S: Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _: &span::Id, _: Context<'_, S>) {
            let mut otel_name = OtelName::default();
            attrs.record(&mut otel_name);
            self.0
                .lock()
                .push((attrs.metadata().name(), otel_name.0.unwrap_or_default()));
        }
    }

    #[derive(Default)]
    struct OtelName(Option<String>);

    impl Visit for OtelName {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "otel.name" {
                self.0 = Some(value.to_owned());
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "otel.name" {
                self.0 = Some(format!("{value:?}"));
            }
        }
    }

    #[test]
    fn test_otel_name_carries_the_operation() {
        let names = SpanNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());

        tracing::subscriber::with_default(subscriber, || {
            TracingTracer.start("db.transaction.begin").finish();
            TracingTracer.start("db.vacuum").finish();
        });

        let names = names.0.lock().clone();
        assert_eq!(
            names,
            vec![
                ("db.transaction.begin", "db.transaction.begin".to_string()),
                ("db", "db.vacuum".to_string()),
            ]
        );
    }
}
