use anyhow::Context;
use cartsmart::datasource::HttpDealApi;
use cartsmart::{api, config::Config, Composer, ComposerSettings, DealApi};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let deal_api: Arc<dyn DealApi> = Arc::new(HttpDealApi::from_config(&config));
    let composer = Arc::new(Composer::new(
        deal_api,
        ComposerSettings {
            page_size: config.page_size,
            condition_id: config.condition_id,
            idle_timeout: Duration::from_secs(config.session_idle_secs),
        },
    ));
    let sweep_every = Duration::from_secs((config.session_idle_secs / 4).clamp(1, 60));
    composer.spawn_idle_sweeper(sweep_every);

    let app = api::create_router(api::AppState::new(composer));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(
        "Stack composer listening on {} (backend {})",
        addr,
        config.api_base_url
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
