use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vault_jobs::{
    Config, HttpAuthorizer, HttpExecutionBackend, PgJobStore, RequestHandler, server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vault_jobs=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        vaults = config.vault_ids.len(),
        region = %config.region,
        application_id = %config.application_id,
        "configuration loaded"
    );

    let authorizer = HttpAuthorizer::new(&config.management_url, config.auth_timeout)?;
    let store = PgJobStore::connect_lazy(&config.database, config.store_timeout);
    let backend = HttpExecutionBackend::new(
        reqwest::Client::builder().build()?,
        &config.execution_endpoint,
        &config.application_id,
        config.cancel_timeout,
    );

    let handler = RequestHandler::new(
        config.vault_ids.clone(),
        Arc::new(authorizer),
        Arc::new(store),
        Arc::new(backend),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("vault-jobs listening on http://{}", config.bind_addr);
    axum::serve(listener, server::build_router(Arc::new(handler)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
