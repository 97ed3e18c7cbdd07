//! Maintenance binary for the reference backend: prepares the database and
//! runs the weekly allowance reset sweep.

use chrono::Utc;
use civic_ideas::{
    config::{database, engine},
    core::weekly,
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load engine configuration
    let config = engine::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    let schedule = config.engine.reset_schedule()?;

    // 4. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Restore allowances whose weekly boundary has passed
    let now = Utc::now();
    if weekly::is_weekly_reset_due(&db, now).await? {
        let result = weekly::process_weekly_resets(&db, &schedule, now).await?;
        info!("{}", weekly::format_weekly_reset_summary(&result));
    } else {
        info!("No weekly resets due.");
    }

    Ok(())
}
