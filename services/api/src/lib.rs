//! Shovel Heroes API library crate.
//!
//! # Purpose
//! Exposes the HTTP surface, the request guard, configuration, and storage
//! backends for use by the binary and integration tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod model;
pub mod observability;
pub mod store;
