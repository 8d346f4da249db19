//! Traced driver wrapper.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{Connection, ConnectionParams, Driver};
use crate::config::TracingConfig;
use crate::connection::TracedConnection;
use crate::span::{ActiveSpan, Operation};
use crate::tag::Tag;
use crate::tracer::Tracer;

/// A driver whose connections come out traced.
///
/// Produced by [`TracingMiddleware::wrap`](crate::TracingMiddleware::wrap).
#[derive(Debug)]
pub struct TracedDriver<D, T> {
    inner: D,
    tracer: Arc<T>,
    config: Arc<TracingConfig>,
}

impl<D: Driver, T: Tracer> TracedDriver<D, T> {
    pub(crate) fn new(inner: D, tracer: Arc<T>, config: Arc<TracingConfig>) -> Self {
        Self {
            inner,
            tracer,
            config,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

#[async_trait]
impl<D: Driver, T: Tracer> Driver for TracedDriver<D, T> {
    type Connection = TracedConnection<D::Connection, T>;
    type Error = D::Error;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Connection, D::Error> {
        let mut span = ActiveSpan::start(&*self.tracer, Operation::DriverConnect, &self.config);
        let database = self.config.database_name.clone().or_else(|| params.database());
        span.tag_opt(database.map(Tag::instance))
            .tag_opt(params.username().map(Tag::user));

        let result = span.observe(self.inner.connect(params)).await;
        let connection = result.map(|connection| {
            TracedConnection::from_shared(connection, Arc::clone(&self.tracer), Arc::clone(&self.config))
        });
        if let Ok(connection) = &connection {
            span.tag_opt(connection.platform().ok().map(Tag::db_type));
        }
        span.finish();

        connection
    }
}
