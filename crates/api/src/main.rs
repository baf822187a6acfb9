use anyhow::Context;

use exactmatch_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    exactmatch_observability::init();

    let config = Config::from_env().context("reading configuration")?;

    let app = exactmatch_api::app::build_app(&config)
        .await
        .context("initialising store")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
