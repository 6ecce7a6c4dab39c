//! Supply donation handlers.
//!
//! Listing is public. Authenticated users pledge donations in their own name;
//! row policies restrict edits to the donor, the grid's manager, and admins.
use crate::api::error::{ApiError, api_not_found, api_store_error, api_validation_error};
use crate::api::types::{DonationCreateRequest, DonationListResponse, DonationUpdateRequest};
use crate::api::{QueryParams, optional_text, parse_id, query_limit, query_uuid, required_text};
use crate::app::AppState;
use crate::auth::guard::{AccessRule, authorize};
use crate::model::{DonationStatus, SupplyDonation};
use crate::store::{ListFilter, StoreError};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use shovel_authz::{Action, Permission, Resource, RlsContext, RoleGate};
use uuid::Uuid;

fn rule(action: Action) -> AccessRule {
    AccessRule::new(RoleGate::ANY, Permission::new(Resource::SupplyDonations, action))
}

fn check_quantity(quantity: i32) -> Result<i32, ApiError> {
    if quantity <= 0 {
        return Err(api_validation_error("quantity must be positive"));
    }
    Ok(quantity)
}

fn apply_update(
    mut donation: SupplyDonation,
    body: DonationUpdateRequest,
) -> Result<SupplyDonation, ApiError> {
    if let Some(name) = body.donor_name {
        donation.donor_name = required_text(&name, "donor_name")?;
    }
    if body.donor_phone.is_some() {
        donation.donor_phone = optional_text(body.donor_phone);
    }
    if let Some(supply) = body.supply_name {
        donation.supply_name = required_text(&supply, "supply_name")?;
    }
    if let Some(quantity) = body.quantity {
        donation.quantity = check_quantity(quantity)?;
    }
    if let Some(unit) = body.unit {
        donation.unit = required_text(&unit, "unit")?;
    }
    if body.delivery_method.is_some() {
        donation.delivery_method = optional_text(body.delivery_method);
    }
    if let Some(status) = body.status {
        donation.status = status;
    }
    if body.notes.is_some() {
        donation.notes = optional_text(body.notes);
    }
    Ok(donation)
}

#[utoipa::path(
    get,
    path = "/v1/supply-donations",
    tag = "supply_donations",
    params(
        ("grid_id" = Option<String>, Query, description = "Only donations for this grid"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "List donations", body = DonationListResponse)
    )
)]
pub(crate) async fn list_donations(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<DonationListResponse>, ApiError> {
    let filter = ListFilter {
        grid_id: query_uuid(&params, "grid_id")?,
        limit: state.page_limit(query_limit(&params)?),
    };
    let items = state
        .store
        .list_donations(&RlsContext::anonymous(), filter)
        .await
        .map_err(|err| api_store_error("donation", err))?;
    Ok(Json(DonationListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/supply-donations",
    tag = "supply_donations",
    request_body = DonationCreateRequest,
    responses(
        (status = 201, description = "Donation pledged", body = SupplyDonation),
        (status = 404, description = "Grid not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_donation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DonationCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = authorize(&state, &headers, rule(Action::Create)).await?;
    let donation = SupplyDonation {
        id: Uuid::new_v4(),
        grid_id: body.grid_id,
        donor_id: auth.user.id,
        donor_name: required_text(&body.donor_name, "donor_name")?,
        donor_phone: optional_text(body.donor_phone),
        supply_name: required_text(&body.supply_name, "supply_name")?,
        quantity: check_quantity(body.quantity)?,
        unit: required_text(&body.unit, "unit")?,
        delivery_method: optional_text(body.delivery_method),
        status: DonationStatus::Pledged,
        notes: optional_text(body.notes),
        created_at: Utc::now(),
    };
    let created = state
        .store
        .create_donation(&auth.rls, donation)
        .await
        .map_err(|err| match err {
            StoreError::NotFound(_) => api_not_found("grid not found"),
            err => api_store_error("donation", err),
        })?;
    tracing::info!(donation_id = %created.id, grid_id = %created.grid_id, "donation pledged");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/v1/supply-donations/{id}",
    tag = "supply_donations",
    params(("id" = String, Path, description = "Donation id")),
    request_body = DonationUpdateRequest,
    responses(
        (status = 200, description = "Donation updated", body = SupplyDonation),
        (status = 403, description = "Not the donor", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DonationUpdateRequest>,
) -> Result<Json<SupplyDonation>, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Update).on(id)).await?;
    let current = state
        .store
        .get_donation(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("donation", err))?;
    let updated = state
        .store
        .update_donation(&auth.rls, apply_update(current, body)?)
        .await
        .map_err(|err| api_store_error("donation", err))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/v1/supply-donations/{id}",
    tag = "supply_donations",
    params(("id" = String, Path, description = "Donation id")),
    responses(
        (status = 204, description = "Donation deleted"),
        (status = 404, description = "Not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    let auth = authorize(&state, &headers, rule(Action::Delete).on(id)).await?;
    state
        .store
        .delete_donation(&auth.rls, id)
        .await
        .map_err(|err| api_store_error("donation", err))?;
    Ok(StatusCode::NO_CONTENT)
}
