//! # db-tracing-middleware
//!
//! Tracing decorators for database drivers, connections and prepared statements.
//!
//! This crate wraps a database client (anything implementing [`Driver`],
//! [`Connection`] and [`Statement`]) so that every database operation runs
//! inside a span, while the wrapped client's behavior (return values, errors,
//! resource lifecycle) passes through unchanged.
//!
//! ## Features
//!
//! - **Transparent Decoration**: traced wrappers implement the same traits they wrap
//! - **Transitive Tracing**: connections from a traced driver and statements from a
//!   traced connection are traced too
//! - **Pluggable Tracers**: spans go to the `tracing` crate via [`TracingTracer`], to
//!   memory via [`MemoryTracer`], or to any [`Tracer`] you implement
//! - **SQL Visibility**: the statement text, optionally truncated, plus operation and table
//! - **SeaORM Backend**: [`SeaOrmDriver`] puts the chain in front of a real database
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use db_tracing_middleware::prelude::*;
//!
//! let middleware = TracingMiddleware::new(TracingTracer, Some(1024));
//! let driver = middleware.wrap(SeaOrmDriver::new());
//!
//! let db = driver.connect(&ConnectionParams::new("postgres://localhost/mydb")).await?;
//! db.begin_transaction().await?;
//! db.execute_statement("UPDATE users SET active = $1", vec![true.into()]).await?;
//! db.commit().await?;
//! ```
//!
//! ## Span Names
//!
//! | Operation | Span |
//! |-----------|------|
//! | `Driver::connect` | `db.driver.connect` |
//! | `Connection::connect` | `db.connect` |
//! | `prepare` | `db.prepare` |
//! | `query` | `db.query` |
//! | `exec` | `db.exec` |
//! | `execute_query`, `execute_statement` | `db.execute` |
//! | `begin_transaction` | `db.transaction.begin` (legacy: `db.transaction`) |
//! | `commit` | `db.transaction.commit` (legacy: `db.commit`) |
//! | `roll_back` | `db.transaction.rollback` (legacy: `db.rollback`) |
//! | `Statement::execute` | `db.stmt.execute` (legacy: `db.prepare.execute`) |
//!
//! ## Span Tags
//!
//! | Tag | Description |
//! |-----|-------------|
//! | `db.instance` | Database name |
//! | `db.user` | User name |
//! | `db.type` | Platform: "postgresql", "mysql", "sqlite", … |
//! | `db.statement` | SQL text, truncated to `max_sql_length` |
//! | `db.operation` | SQL operation (SELECT, INSERT, UPDATE, DELETE, …) |
//! | `db.sql.table` | Target table name (when detectable) |
//! | `db.auto_commit` | Auto-commit flag |
//! | `db.nesting_level` | Transaction depth after the call |
//! | `db.rows` | Number of rows returned/affected |
//! | `db.error` | Error code (on failure) |
//! | `error` | `true` (on failure) |
//! | `db.duration_ms`, `db.slow_query` | Timing |

mod client;
mod config;
mod connection;
mod driver;
mod memory;
mod middleware;
mod orm;
mod span;
mod sql;
mod statement;
mod tag;
mod tracer;

#[cfg(test)]
mod mock;

pub use client::{Connection, ConnectionParams, DbError, Driver, Middleware, RowSet, Statement};
pub use config::{SpanNaming, TracingConfig};
pub use connection::TracedConnection;
pub use driver::TracedDriver;
pub use memory::{FinishedSpan, MemorySpan, MemoryTracer};
pub use middleware::{DriverExt, TracingMiddleware};
pub use orm::{OrmError, SeaOrmConnection, SeaOrmDriver, SeaOrmStatement, StatementResult};
pub use span::Operation;
pub use sql::{extract_table, parse_operation, returns_rows, truncate, SqlOperation};
pub use statement::TracedStatement;
pub use tag::{keys, Tag, TagValue};
pub use tracer::{TraceSpan, Tracer, TracingSpan, TracingTracer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Connection, ConnectionParams, Driver, DriverExt, SeaOrmDriver, Statement,
        TracingConfig, TracingMiddleware, TracingTracer,
    };
}
