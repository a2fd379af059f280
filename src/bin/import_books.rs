use anyhow::Context;
use bookstore_api::{
    db::{create_pool, run_migrations},
    services::import_service::{import_books, parse_records},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_INPUT: &str = "./out.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_INPUT.to_string());
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {path}"))?;
    let (records, malformed) =
        parse_records(&raw).with_context(|| format!("{path} is not a JSON array"))?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let summary = import_books(&pool, records).await;
    println!(
        "Inserted {} books, skipped {}",
        summary.inserted,
        summary.skipped + malformed
    );
    Ok(())
}
