use liquidity_factors::config::ServiceConfig;
use liquidity_factors::service::Service;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Logs go to stderr; stdout carries the score records.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // WSS needs a process-wide crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        version = liquidity_factors::SERVICE_VERSION,
        market = %config.market,
        "Starting liquidity factor service"
    );

    Service::new(config).run().await?;

    Ok(())
}
