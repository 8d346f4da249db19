//! Basic example showing how to install the tracing middleware.
//!
//! Run with: cargo run --example basic

use db_tracing_middleware::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,db_tracing_middleware=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    // Option 1: explicit middleware, recording at most 256 characters of SQL
    let middleware = TracingMiddleware::new(TracingTracer, Some(256));
    let driver = middleware.wrap(SeaOrmDriver::new());

    // Option 2: using the extension trait (more fluent)
    // let driver = SeaOrmDriver::new().with_tracing(TracingTracer);

    // Option 3: with custom configuration
    // let driver = SeaOrmDriver::new().with_tracing_config(
    //     TracingTracer,
    //     TracingConfig::default()
    //         .with_naming(SpanNaming::Legacy)
    //         .with_slow_query_threshold(Duration::from_millis(100)),
    // );

    tracing::info!("Connecting to database...");

    let db = driver.connect(&ConnectionParams::new(database_url)).await?;

    db.begin_transaction().await?;
    let rows = db.query("SELECT 1").await?;
    tracing::info!(rows = rows.len(), "Query finished");
    db.commit().await?;

    let mut statement = db.prepare("SELECT $1::int AS answer").await?;
    statement.execute(Some(vec![42i32.into()])).await?;

    db.close().await?;

    Ok(())
}
