//! In-memory tracer, for tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::tag::{keys, Tag, TagValue};
use crate::tracer::{TraceSpan, Tracer};

/// A tracer that keeps every finished span in memory.
///
/// Clones share the same storage, so a test can hand one clone to the
/// middleware and inspect the other.
///
/// ```rust
/// use db_tracing_middleware::{MemoryTracer, Tag, TraceSpan, Tracer};
///
/// let tracer = MemoryTracer::new();
/// let mut span = tracer.start("db.query");
/// span.add_tag(Tag::rows(3));
/// span.finish();
///
/// let spans = tracer.finished();
/// assert_eq!(spans[0].name, "db.query");
/// assert_eq!(spans[0].tag("db.rows").and_then(|v| v.as_long()), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTracer {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    started: u64,
    // Spans alive right now; survives `clear`.
    open: u64,
    finished: Vec<FinishedSpan>,
}

/// A span that has been finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSpan {
    /// Start order, from 0.
    pub id: u64,
    pub name: &'static str,
    pub tags: Vec<Tag>,
    pub duration: Duration,
}

impl FinishedSpan {
    /// The last value recorded for `key`.
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags
            .iter()
            .rev()
            .find(|tag| tag.key() == key)
            .map(Tag::value)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tag(key).is_some()
    }

    /// Whether the span carries the error flag.
    pub fn is_error(&self) -> bool {
        self.tag(keys::ERROR).and_then(TagValue::as_bool) == Some(true)
    }
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spans started so far.
    pub fn started(&self) -> u64 {
        self.state.lock().started
    }

    /// Spans started but not finished yet.
    pub fn open(&self) -> u64 {
        self.state.lock().open
    }

    /// Finished spans, in finish order.
    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.state.lock().finished.clone()
    }

    /// The most recently finished span named `name`.
    pub fn last(&self, name: &str) -> Option<FinishedSpan> {
        self.state
            .lock()
            .finished
            .iter()
            .rev()
            .find(|span| span.name == name)
            .cloned()
    }

    /// Forget every recorded span. Spans still open are recorded when they finish.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.started = 0;
        state.finished.clear();
    }
}

impl Tracer for MemoryTracer {
    type Span = MemorySpan;

    fn start(&self, operation: &'static str) -> MemorySpan {
        let id = {
            let mut state = self.state.lock();
            state.started += 1;
            state.open += 1;
            state.started - 1
        };
        MemorySpan {
            id,
            name: operation,
            tags: Vec::new(),
            started_at: Instant::now(),
            state: Arc::clone(&self.state),
        }
    }
}

/// A span started by [`MemoryTracer`].
#[derive(Debug)]
pub struct MemorySpan {
    id: u64,
    name: &'static str,
    tags: Vec<Tag>,
    started_at: Instant,
    state: Arc<Mutex<State>>,
}

impl TraceSpan for MemorySpan {
    fn add_tag(&mut self, tag: Tag) -> &mut Self {
        self.tags.push(tag);
        self
    }

    fn finish(self) {
        let span = FinishedSpan {
            id: self.id,
            name: self.name,
            tags: self.tags,
            duration: self.started_at.elapsed(),
        };
        let mut state = self.state.lock();
        state.open = state.open.saturating_sub(1);
        state.finished.push(span);
    }
}
