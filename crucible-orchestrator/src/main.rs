use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;

use crucible_billing::HttpBillingClient;
use crucible_engine::audit::TracingAuditService;
use crucible_engine::cancel::CancellationRegistry;
use crucible_engine::estimator::CostEstimator;
use crucible_engine::executor::MockStepExecutor;
use crucible_engine::usecase::{CancelPipeline, RunPipeline, ValidatePipeline};
use crucible_store::{PgStore, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crucible_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Crucible Orchestrator...");

    let config = config::Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool));

    let http = reqwest::Client::builder()
        .timeout(config.billing_timeout)
        .connect_timeout(Duration::from_secs(2))
        .build()?;
    let billing = Arc::new(HttpBillingClient::with_client(&config.billing_url, http));

    // TODO: swap the mock for the agent-backed executor once that service lands
    let executor = Arc::new(MockStepExecutor::new());
    let audit = Arc::new(TracingAuditService);
    let cancellations = CancellationRegistry::new();

    let state = api::AppState {
        validate: Arc::new(ValidatePipeline::new(
            store.clone(),
            billing.clone(),
            CostEstimator::new(),
        )),
        run: Arc::new(RunPipeline::new(
            store.clone(),
            billing,
            executor,
            audit.clone(),
            CostEstimator::new(),
            cancellations.clone(),
        )),
        cancel: Arc::new(CancelPipeline::new(store, audit, cancellations)),
    };

    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
