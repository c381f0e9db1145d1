use anyhow::Context;

use templeerp_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    templeerp_observability::init();

    let config = AppConfig::from_env()?;
    let app = templeerp_api::app::build_app_from_config(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
