//! Entry point: installs the tracing decorators around a driver.

use std::sync::Arc;

use crate::client::{Connection, Driver, Middleware};
use crate::config::TracingConfig;
use crate::connection::TracedConnection;
use crate::driver::TracedDriver;
use crate::tracer::Tracer;

/// Wraps drivers so that everything done through them is traced.
///
/// Every decorator produced from one middleware shares its tracer and
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use db_tracing_middleware::{ConnectionParams, Driver, SeaOrmDriver, TracingMiddleware, TracingTracer};
///
/// let middleware = TracingMiddleware::new(TracingTracer, Some(2048));
/// let driver = middleware.wrap(SeaOrmDriver::new());
/// let db = driver.connect(&ConnectionParams::new("postgres://localhost/mydb")).await?;
/// ```
#[derive(Debug)]
pub struct TracingMiddleware<T> {
    tracer: Arc<T>,
    config: Arc<TracingConfig>,
}

impl<T> Clone for TracingMiddleware<T> {
    fn clone(&self) -> Self {
        Self {
            tracer: Arc::clone(&self.tracer),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Tracer> TracingMiddleware<T> {
    /// Create a middleware recording at most `max_sql_length` characters of SQL.
    pub fn new(tracer: T, max_sql_length: Option<usize>) -> Self {
        let config = TracingConfig {
            max_sql_length,
            ..TracingConfig::default()
        };
        Self::with_config(tracer, config)
    }

    pub fn with_config(tracer: T, config: TracingConfig) -> Self {
        Self {
            tracer: Arc::new(tracer),
            config: Arc::new(config),
        }
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    pub fn wrap<D: Driver>(&self, driver: D) -> TracedDriver<D, T> {
        TracedDriver::new(driver, Arc::clone(&self.tracer), Arc::clone(&self.config))
    }

    /// Decorate a connection that was opened without going through a driver.
    pub fn wrap_connection<C: Connection>(&self, connection: C) -> TracedConnection<C, T> {
        TracedConnection::from_shared(connection, Arc::clone(&self.tracer), Arc::clone(&self.config))
    }
}

impl<D: Driver, T: Tracer> Middleware<D> for TracingMiddleware<T> {
    type Driver = TracedDriver<D, T>;

    fn wrap(&self, driver: D) -> TracedDriver<D, T> {
        TracingMiddleware::wrap(self, driver)
    }
}

/// Extension trait for easy wrapping of drivers.
pub trait DriverExt: Driver + Sized {
    /// Wrap this driver with tracing instrumentation.
    fn with_tracing<T: Tracer>(self, tracer: T) -> TracedDriver<Self, T> {
        TracingMiddleware::with_config(tracer, TracingConfig::default()).wrap(self)
    }

    /// Wrap this driver with custom tracing configuration.
    fn with_tracing_config<T: Tracer>(self, tracer: T, config: TracingConfig) -> TracedDriver<Self, T> {
        TracingMiddleware::with_config(tracer, config).wrap(self)
    }
}

impl<D: Driver> DriverExt for D {}
