use anyhow::Context;

use parish_api::app::{self, services};
use parish_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    parish_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let services = services::build_services(&config)
        .await
        .context("failed to initialise identity services")?;
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
