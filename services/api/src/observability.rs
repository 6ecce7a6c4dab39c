//! Observability wiring for the relief API.
//!
//! # Purpose
//! Initializes tracing and the Prometheus metrics endpoint, and names the
//! counters the request guard and registration handlers emit.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const AUTHZ_DECISIONS_TOTAL: &str = "shovel_authz_decisions_total";
pub const AUDIT_WRITE_FAILURES_TOTAL: &str = "shovel_audit_write_failures_total";
pub const REGISTRATION_TRANSITIONS_TOTAL: &str = "shovel_registration_transitions_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
    let handle = install_metrics_recorder()?;
    tracing::debug!(service = service_name, "observability initialized");
    Ok(handle)
}

/// Count one guard outcome: `allowed`, `denied`, `unauthenticated` or `error`.
pub fn record_authz_decision(outcome: &'static str) {
    metrics::counter!(AUTHZ_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_audit_write_failure() {
    metrics::counter!(AUDIT_WRITE_FAILURES_TOTAL).increment(1);
}

pub fn record_registration_transition(to: &'static str) {
    metrics::counter!(REGISTRATION_TRANSITIONS_TOTAL, "to" => to).increment(1);
}

/// Serve `GET /metrics` on `addr` until the task is aborted.
pub async fn serve_metrics(handle: PrometheusHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    serve_metrics_on(listener, handle, std::future::pending()).await
}

fn metrics_router(handle: PrometheusHandle) -> axum::Router {
    axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

async fn serve_metrics_on<F>(
    listener: tokio::net::TcpListener,
    handle: PrometheusHandle,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, metrics_router(handle).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

/// The process-wide recorder; later calls reuse the first handle.
fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| anyhow::anyhow!("install metrics recorder: {err}"))?;
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}
