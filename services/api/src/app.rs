//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::store::ReliefStore;
use axum::Router;
use shovel_authz::TokenVerifier;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub store: Arc<dyn ReliefStore + Send + Sync>,
    pub verifier: Arc<TokenVerifier>,
    /// Upper bound for every list endpoint.
    pub list_limit: u32,
}

impl AppState {
    /// Requested page size, capped at the configured limit.
    pub fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.list_limit)
            .clamp(1, self.list_limit.max(1))
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/v1/me", axum::routing::get(api::users::me))
        .route(
            "/v1/me/permissions",
            axum::routing::get(api::users::my_permissions),
        )
        .route(
            "/v1/disaster-areas",
            axum::routing::get(api::disaster_areas::list_disaster_areas)
                .post(api::disaster_areas::create_disaster_area),
        )
        .route(
            "/v1/disaster-areas/:id",
            axum::routing::get(api::disaster_areas::get_disaster_area)
                .put(api::disaster_areas::update_disaster_area)
                .delete(api::disaster_areas::delete_disaster_area),
        )
        .route(
            "/v1/grids",
            axum::routing::get(api::grids::list_grids).post(api::grids::create_grid),
        )
        .route(
            "/v1/grids/:id",
            axum::routing::get(api::grids::get_grid)
                .put(api::grids::update_grid)
                .delete(api::grids::delete_grid),
        )
        .route(
            "/v1/volunteer-registrations",
            axum::routing::get(api::registrations::list_registrations)
                .post(api::registrations::create_registration),
        )
        .route(
            "/v1/volunteer-registrations/:id",
            axum::routing::put(api::registrations::update_registration)
                .delete(api::registrations::delete_registration),
        )
        .route(
            "/v1/volunteers",
            axum::routing::get(api::volunteers::list_volunteers),
        )
        .route(
            "/v1/supply-donations",
            axum::routing::get(api::donations::list_donations)
                .post(api::donations::create_donation),
        )
        .route(
            "/v1/supply-donations/:id",
            axum::routing::put(api::donations::update_donation)
                .delete(api::donations::delete_donation),
        )
        .route(
            "/v1/grid-discussions",
            axum::routing::get(api::discussions::list_discussions)
                .post(api::discussions::create_discussion),
        )
        .route(
            "/v1/grid-discussions/:id",
            axum::routing::put(api::discussions::update_discussion)
                .delete(api::discussions::delete_discussion),
        )
        .route(
            "/v1/announcements",
            axum::routing::get(api::announcements::list_announcements)
                .post(api::announcements::create_announcement),
        )
        .route(
            "/v1/announcements/:id",
            axum::routing::get(api::announcements::get_announcement)
                .put(api::announcements::update_announcement)
                .delete(api::announcements::delete_announcement),
        )
        .route("/v1/users", axum::routing::get(api::users::list_users))
        .route(
            "/v1/users/:id",
            axum::routing::patch(api::users::update_user_access),
        )
        .route(
            "/v1/permissions",
            axum::routing::get(api::permissions::list_permission_catalog),
        )
        .route(
            "/v1/users/:id/permissions",
            axum::routing::get(api::permissions::list_user_permissions)
                .post(api::permissions::change_user_permission),
        )
        .route(
            "/v1/users/:id/permissions/:permission",
            axum::routing::delete(api::permissions::delete_user_permission),
        )
        .route(
            "/v1/audit-logs",
            axum::routing::get(api::audit_logs::list_audit_logs),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn state(list_limit: u32) -> AppState {
        AppState {
            api_version: "v1".to_string(),
            store: Arc::new(InMemoryStore::new()),
            verifier: Arc::new(TokenVerifier::new("shovel-heroes", b"app-test", 0)),
            list_limit,
        }
    }

    #[test]
    fn page_limit_defaults_and_caps() {
        let state = state(100);
        assert_eq!(state.page_limit(None), 100);
        assert_eq!(state.page_limit(Some(20)), 20);
        assert_eq!(state.page_limit(Some(5000)), 100);
        assert_eq!(state.page_limit(Some(0)), 1);
    }
}
