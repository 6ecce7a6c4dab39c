//! Shovel Heroes API service entry point.
//!
//! # Purpose
//! Wires configuration, storage, token verification, and the HTTP router, then
//! serves until Ctrl-C.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use shovel_api::app::{AppState, build_router};
use shovel_api::config::{self, ApiConfig};
use shovel_api::observability;
use shovel_api::store::ReliefStore;
use shovel_api::store::memory::InMemoryStore;
use shovel_api::store::postgres::PostgresStore;
use shovel_authz::TokenVerifier;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env_or_yaml().context("load api config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ApiConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("shovel-api")?;
    let state = build_state(config.clone()).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());
    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        storage = state.store.backend_name(),
        "relief api listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: ApiConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn ReliefStore + Send + Sync> = match config.storage {
        config::StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        config::StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(
                PostgresStore::connect(pg)
                    .await
                    .context("connect postgres pool")?,
            )
        }
    };

    Ok(AppState {
        api_version: "v1".to_string(),
        store,
        verifier: Arc::new(TokenVerifier::new(
            config.auth.jwt_issuer,
            config.auth.jwt_secret.as_bytes(),
            config.auth.leeway_secs,
        )),
        list_limit: config.list_limit,
    })
}
