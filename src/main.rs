use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use wxpay_backend::api::{self, AppState};
use wxpay_backend::config::Config;
use wxpay_backend::WxPayService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Log startup info
    tracing::info!("Starting WeChat Pay backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Sandbox: {}", config.wxpay.use_sandbox);

    // A sandbox key failure aborts startup here
    let service = WxPayService::connect(config.wxpay.clone()).await?;

    let state = AppState {
        service: Arc::new(service),
        environment: config.server.environment.clone(),
    };
    let app = api::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
