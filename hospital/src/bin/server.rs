//! Hospital backend HTTP server.
//!
//! Rooms and admissions, doctor slots and appointment booking over REST.

use hospital::config::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hospital=info,medbay_postgres=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hospital server");

    let config = Config::from_env();
    info!(
        storage = ?config.storage,
        address = %config.server.bind_address(),
        display_offset = %config.scheduling.display_offset(),
        reminders = config.reminders.enabled,
        "Configuration loaded"
    );

    hospital::bootstrap::run(config).await
}
