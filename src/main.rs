use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use xrain_coordinator::{
    api::{create_router, ApiState, RateLimiter},
    claim::ClaimOrchestrator,
    config::CoordinatorConfig,
    database::DatabasePool,
    gateway::XrplGateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all payment-safety settings
    let config = CoordinatorConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting XRAIN reward-claim coordinator");
    info!(
        endpoint = %config.ledger.active_endpoint(),
        test_mode = config.ledger.test_mode,
        "Ledger settings"
    );

    let pool = Arc::new(DatabasePool::new(&config.database).await?);
    pool.init_schema().await?;

    let gateway = Arc::new(XrplGateway::new(config.ledger.clone())?);

    let orchestrator = Arc::new(ClaimOrchestrator::new(
        pool.clone(),
        gateway,
        config.rewards.clone(),
    ));

    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(
        config.rewards.claim_rate_limit_secs,
    )));

    let app = create_router(ApiState {
        orchestrator,
        store: pool,
        limiter,
        admin_api_key: std::env::var("XRAIN_ADMIN_API_KEY").ok(),
    })
    .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Claim coordinator listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &CoordinatorConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::NONE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
