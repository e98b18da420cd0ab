use infant_health_service::{AppState, ServiceConfig, build_router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `LOG_FORMAT=pretty` for development, JSON lines otherwise.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "infant_health_service=debug,assess_flow=debug,tower_http=info".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServiceConfig::from_env()?;
    config.warn_missing_secrets();

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    let addr = listener.local_addr()?;

    info!("Infant Health Assessment API starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Configuration endpoint: http://{}/config", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
