use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("ZBXGATE_HTTP_PORT").unwrap_or_else(|_| "3000".to_string());
    let backend = std::env::var("ZBXGATE_BACKEND_URL").unwrap_or_else(|_| "<unset>".to_string());
    let env = std::env::var("ZBXGATE_ENV").unwrap_or_else(|_| "development".to_string());
    info!(
        target: "zbxgate",
        "zbxgate starting: RUST_LOG='{}', http_port={}, backend='{}', env={}",
        rust_log, http_port, backend, env
    );

    zbxgate::server::run().await
}
