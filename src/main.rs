//! simforge server binary.

use simforge::api;
use simforge::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simforge=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        provider = %config.provider,
        host = %config.host,
        port = config.port,
        "starting simforge"
    );

    api::serve(config).await
}
