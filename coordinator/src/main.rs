//! Process entry point (ambient, SPEC_FULL.md §4.11): loads configuration,
//! runs pending migrations, wires the engine, and serves the HTTP surface
//! alongside the periodic workers (scheduler kick, retransmission sweep,
//! housekeeper). Grounded on the axum/diesel/r2d2/tokio-cron-scheduler stack
//! already declared in `Cargo.toml`.

use clap::Parser;
use coordinator::app_state::Engine;
use coordinator::app_state::PgPool;
use coordinator::broker::InProcessBroker;
use coordinator::housekeeper;
use coordinator::invoice::LightningChargeClient;
use coordinator::message_store::MessageStore;
use coordinator::retransmission;
use coordinator::routes;
use coordinator::scheduler;
use coordinator::settings::Settings;
use coordinator::MIGRATIONS;
use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::Job;
use tokio_cron_scheduler::JobScheduler;
use tracing::error;
use tracing::info;

/// Retransmission sweep cadence (spec.md §4.8): short enough to catch a
/// channel's acknowledgement timeout (tens of seconds) promptly.
const RETRANSMISSION_SWEEP_CRON: &str = "*/10 * * * * *";
/// Housekeeper cadence (spec.md §4.9): invoice/order expiry and payload
/// retention do not need second-level resolution.
const HOUSEKEEPER_CRON: &str = "0 */5 * * * *";

#[derive(Debug, Parser)]
#[command(name = "coordinator", about = "Satellite broadcast order-queue coordinator")]
struct Cli {
    /// Run pending migrations and exit without starting the server.
    #[arg(long)]
    migrate_only: bool,
}

fn build_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Ok(Pool::builder().build(manager)?)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let pool = build_pool(&settings.database_url)?;
    {
        let mut conn = pool.get()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    }
    if cli.migrate_only {
        info!("migrations applied, exiting (--migrate-only)");
        return Ok(());
    }

    let invoice_issuer = Arc::new(LightningChargeClient::new(&settings.charge_root)?);
    let broker = Arc::new(InProcessBroker::new());
    let message_store = MessageStore::new(&settings.msg_store_path)?;
    let server_port = settings.server_port;

    let engine = Arc::new(Engine::new(pool, settings, invoice_issuer, broker, message_store));

    scheduler::tx_start(&engine, None)?;
    spawn_periodic_workers(engine.clone()).await?;

    let app = routes::router(engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    info!(%addr, "coordinator listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// Starts the retransmission sweep and housekeeper as `tokio-cron-scheduler`
/// jobs against the same [`Engine`]. Errors from an individual tick are
/// logged, never propagated: a single failed sweep must not stop the
/// process (spec.md §7).
async fn spawn_periodic_workers(engine: Arc<Engine>) -> anyhow::Result<()> {
    let scheduler = JobScheduler::new().await?;

    let sweep_engine = engine.clone();
    scheduler.add(Job::new(RETRANSMISSION_SWEEP_CRON, move |_uuid, _l| {
        if let Err(err) = retransmission::sweep(&sweep_engine) {
            error!(error = ?err, "retransmission sweep failed");
        }
    })?)?;

    let housekeeper_engine = engine.clone();
    scheduler.add(Job::new(HOUSEKEEPER_CRON, move |_uuid, _l| {
        if let Err(err) = housekeeper::run(&housekeeper_engine) {
            error!(error = ?err, "housekeeper run failed");
        }
    })?)?;

    scheduler.start().await?;
    // Hold the job definitions alive for the process lifetime.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(u64::MAX)).await;
    });
    Ok(())
}
