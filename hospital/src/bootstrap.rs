//! Process bootstrap: storage, identity, engines, background jobs and the
//! HTTP listener.
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! hospital::bootstrap::run(config).await?;
//! ```
//!
//! Startup order:
//! 1. Prometheus exporter on the metrics listener
//! 2. Storage backend (`PostgreSQL` with migrations, or the in-memory store)
//! 3. Identity providers
//! 4. Engines, notification dispatcher and the reminder job
//! 5. HTTP server until SIGINT/SIGTERM, then a bounded wait for the job

use crate::auth::{Identity, IdentityChain, IdentityProvider, SessionDirectory, StaticIdentityProvider};
use crate::booking::BookingCoordinator;
use crate::config::{Config, StorageBackend};
use crate::metrics::register_hospital_metrics;
use crate::notifications::{LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier};
use crate::occupancy::OccupancyEngine;
use crate::reminders::ReminderJob;
use crate::scheduling::SlotScheduler;
use crate::server::{AppState, build_router};
use crate::store::{HospitalStore, InMemoryStore};
use crate::types::Designation;
use anyhow::Context;
use medbay_core::environment::{Clock, SystemClock};
use medbay_postgres::{PgDatabase, connect};
use medbay_runtime::RetryPolicy;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Engines wired over one backend.
pub struct Services<D> {
    /// Router state.
    pub state: AppState<D>,
    /// Reminder job, when enabled.
    pub reminders: Option<ReminderJob<D>>,
}

/// Build the notifier named by the configuration.
#[must_use]
pub fn notifier(config: &Config) -> Arc<dyn Notifier> {
    match &config.notifications.webhook_url {
        Some(url) => {
            info!(url = %url, "Notifications delivered by webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            info!("Notifications logged only (NOTIFICATION_WEBHOOK_URL unset)");
            Arc::new(LogNotifier)
        }
    }
}

/// Static tokens from the configuration; empty when none are configured.
///
/// # Errors
///
/// Fails when `AUTH_STATIC_TOKENS` is malformed.
pub fn static_tokens(config: &Config) -> anyhow::Result<StaticIdentityProvider> {
    let Some(entries) = config.auth.static_tokens.as_deref() else {
        return Ok(StaticIdentityProvider::new());
    };
    let provider = StaticIdentityProvider::parse(entries)
        .map_err(|e| anyhow::anyhow!("AUTH_STATIC_TOKENS: {e}"))?;
    info!(tokens = provider.len(), "Static bearer tokens loaded");
    Ok(provider)
}

/// Wire the engines over `db`.
pub fn assemble<D: HospitalStore>(
    config: &Config,
    db: D,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    identity: Arc<dyn IdentityProvider>,
) -> Services<D> {
    let notifications = NotificationDispatcher::new(notifier, config.notifications.retry_policy());

    let state = AppState::new(
        db.clone(),
        OccupancyEngine::new(db.clone(), Arc::clone(&clock)),
        SlotScheduler::new(
            db.clone(),
            Arc::clone(&clock),
            config.scheduling.display_offset(),
        ),
        BookingCoordinator::new(db.clone(), Arc::clone(&clock), notifications.clone()),
        Identity(identity),
    );

    let reminders = config.reminders.enabled.then(|| {
        ReminderJob::new(
            db,
            clock,
            notifications,
            config.reminders.lead(),
            config.reminders.scan_interval(),
        )
    });

    Services { state, reminders }
}

/// Run the server until a shutdown signal arrives.
///
/// # Errors
///
/// Fails when the metrics exporter, storage backend or HTTP listener cannot
/// be set up, or when the server stops with an I/O error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let metrics_address: SocketAddr = config
        .server
        .metrics_address()
        .parse()
        .context("invalid METRICS_HOST/METRICS_PORT")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_address)
        .install()
        .context("failed to install Prometheus exporter")?;
    register_hospital_metrics();
    info!(address = %metrics_address, "Metrics exporter listening");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = notifier(&config);
    let tokens = Arc::new(static_tokens(&config)?);

    match config.storage {
        StorageBackend::Postgres => {
            info!("Connecting to PostgreSQL...");
            let pool = connect(&config.postgres, &RetryPolicy::default()).await?;

            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("database migrations failed")?;
            info!("Migrations complete");

            let identity = IdentityChain::new()
                .then(tokens)
                .then(Arc::new(SessionDirectory::new(pool.clone(), Arc::clone(&clock))));
            let db = PgDatabase::from_pool(pool);
            let services = assemble(&config, db, clock, notifier, Arc::new(identity));
            serve(&config, services).await
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; data is lost on exit");
            if tokens.is_empty() {
                warn!("No AUTH_STATIC_TOKENS configured; authenticated routes will reject every request");
            }
            let db = seeded_memory_store().await;
            let services = assemble(&config, db, clock, notifier, tokens);
            serve(&config, services).await
        }
    }
}

/// In-memory store with a small demo directory.
pub async fn seeded_memory_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let patient = store.seed_patient("asha", "Asha Rao").await;
    let doctor = store.seed_hcp("Dr. Meera Iyer", Designation::Doctor).await;
    let nurse = store.seed_hcp("Ravi Nair", Designation::Nurse).await;
    info!(
        patient_id = %patient.id,
        doctor_id = %doctor.id,
        nurse_id = %nurse.id,
        "Seeded demo directory"
    );
    store
}

async fn serve<D: HospitalStore>(config: &Config, services: Services<D>) -> anyhow::Result<()> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let reminder_handle: Option<JoinHandle<()>> = services
        .reminders
        .map(|job| tokio::spawn(job.run(shutdown_tx.subscribe())));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, "HTTP server listening");

    axum::serve(listener, build_router(services.state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, initiating graceful shutdown...");
    let _ = shutdown_tx.send(());

    if let Some(handle) = reminder_handle {
        let timeout = Duration::from_secs(config.server.shutdown_timeout);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => info!("Reminder job stopped gracefully"),
            Ok(Err(e)) => warn!(error = %e, "Reminder job failed"),
            Err(_) => warn!("Reminder job shutdown timed out"),
        }
    }

    info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A signal that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
