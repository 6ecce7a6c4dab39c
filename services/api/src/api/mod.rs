//! Relief HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared helpers they use to parse
//! path/query ids and validate request bodies. Every validation failure is a
//! 400 `validation_error`.
pub mod announcements;
pub mod audit_logs;
pub mod disaster_areas;
pub mod discussions;
pub mod donations;
pub mod error;
pub mod grids;
pub mod openapi;
pub mod permissions;
pub mod registrations;
pub mod system;
pub mod types;
pub mod users;
pub mod volunteers;

use crate::api::error::{ApiError, api_validation_error};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) type QueryParams = HashMap<String, String>;

pub(crate) fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| api_validation_error(&format!("{field} must be a uuid")))
}

pub(crate) fn query_uuid(params: &QueryParams, field: &str) -> Result<Option<Uuid>, ApiError> {
    params
        .get(field)
        .filter(|value| !value.is_empty())
        .map(|value| parse_id(value, field))
        .transpose()
}

pub(crate) fn query_limit(params: &QueryParams) -> Result<Option<u32>, ApiError> {
    params
        .get("limit")
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| api_validation_error("limit must be a non-negative integer"))
        })
        .transpose()
}

/// Trim and require a non-empty value.
pub(crate) fn required_text(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(api_validation_error(&format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trim; blank strings become `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn check_latitude(value: Option<f64>, field: &str) -> Result<(), ApiError> {
    match value {
        Some(lat) if !(-90.0..=90.0).contains(&lat) => Err(api_validation_error(&format!(
            "{field} must be between -90 and 90"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn check_longitude(value: Option<f64>, field: &str) -> Result<(), ApiError> {
    match value {
        Some(lng) if !(-180.0..=180.0).contains(&lng) => Err(api_validation_error(&format!(
            "{field} must be between -180 and 180"
        ))),
        _ => Ok(()),
    }
}
