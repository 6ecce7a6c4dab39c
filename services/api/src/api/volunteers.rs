//! Public volunteer roster for a grid.
//!
//! Anyone may read the roster. Phone numbers are masked unless the viewer is
//! an admin, the grid's manager, or the volunteer the row belongs to.
use crate::api::error::{ApiError, api_store_error, api_validation_error};
use crate::api::types::{VolunteerView, VolunteersResponse};
use crate::api::{QueryParams, query_limit, query_uuid};
use crate::app::AppState;
use crate::auth::guard::{AuthContext, authenticate_optional};
use crate::model::VolunteerRegistration;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use shovel_authz::{RegistrationStatus, RlsContext};
use std::collections::BTreeMap;

const VISIBLE_PREFIX: usize = 4;
const VISIBLE_SUFFIX: usize = 3;

/// Keep the first four and last three characters; shorter numbers are fully masked.
pub(crate) fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= VISIBLE_PREFIX + VISIBLE_SUFFIX {
        return "*".repeat(chars.len());
    }
    let hidden = chars.len() - VISIBLE_PREFIX - VISIBLE_SUFFIX;
    let mut masked: String = chars[..VISIBLE_PREFIX].iter().collect();
    masked.push_str(&"*".repeat(hidden));
    masked.extend(&chars[chars.len() - VISIBLE_SUFFIX..]);
    masked
}

fn view(registration: VolunteerRegistration, show_phone: bool) -> VolunteerView {
    let volunteer_phone = if show_phone {
        registration.volunteer_phone
    } else {
        registration.volunteer_phone.as_deref().map(mask_phone)
    };
    VolunteerView {
        id: registration.id,
        user_id: registration.user_id,
        volunteer_name: registration.volunteer_name,
        volunteer_phone,
        status: registration.status,
        available_time: registration.available_time,
        skills: registration.skills,
        equipment: registration.equipment,
        created_at: registration.created_at,
    }
}

fn status_counts(rows: &[VolunteerRegistration]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = RegistrationStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for row in rows {
        *counts.entry(row.status.as_str().to_string()).or_default() += 1;
    }
    counts
}

#[utoipa::path(
    get,
    path = "/v1/volunteers",
    tag = "volunteers",
    params(
        ("grid_id" = String, Query, description = "Grid whose roster to list"),
        ("limit" = Option<u32>, Query, description = "Maximum rows")
    ),
    responses(
        (status = 200, description = "Roster with masked contact data", body = VolunteersResponse),
        (status = 400, description = "Missing grid_id", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Grid not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_volunteers(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    headers: HeaderMap,
) -> Result<Json<VolunteersResponse>, ApiError> {
    let Some(grid_id) = query_uuid(&params, "grid_id")? else {
        return Err(api_validation_error("grid_id is required"));
    };
    let viewer: Option<AuthContext> = authenticate_optional(&state, &headers).await?;
    let grid = state
        .store
        .get_grid(&RlsContext::anonymous(), grid_id)
        .await
        .map_err(|err| api_store_error("grid", err))?;
    let rows = state
        .store
        .list_grid_volunteers(grid_id, state.page_limit(query_limit(&params)?))
        .await
        .map_err(|err| api_store_error("registration", err))?;

    let can_view_phone = viewer
        .as_ref()
        .is_some_and(|auth| auth.is_admin() || grid.grid_manager_id == Some(auth.user.id));
    let viewer_id = viewer.as_ref().map(|auth| auth.user.id);
    let status_counts = status_counts(&rows);
    let items: Vec<VolunteerView> = rows
        .into_iter()
        .map(|row| {
            let own_row = viewer_id == Some(row.user_id);
            view(row, can_view_phone || own_row)
        })
        .collect();
    Ok(Json(VolunteersResponse {
        grid_id,
        total: items.len(),
        items,
        status_counts,
        can_view_phone,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn mask_keeps_prefix_and_suffix() {
        assert_eq!(mask_phone("0912345678"), "0912***678");
        assert_eq!(mask_phone("12345678"), "1234*678");
    }

    #[test]
    fn short_numbers_are_fully_masked() {
        assert_eq!(mask_phone("1234567"), "*******");
        assert_eq!(mask_phone(""), "");
    }

    #[test]
    fn counts_include_every_status() {
        let now = Utc::now();
        let row = VolunteerRegistration {
            id: Uuid::new_v4(),
            grid_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            volunteer_name: "Mei".to_string(),
            volunteer_phone: None,
            status: RegistrationStatus::Confirmed,
            available_time: None,
            skills: Vec::new(),
            equipment: Vec::new(),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let counts = status_counts(&[row.clone(), row]);
        assert_eq!(counts.len(), RegistrationStatus::ALL.len());
        assert_eq!(counts["confirmed"], 2);
        assert_eq!(counts["pending"], 0);
    }
}
