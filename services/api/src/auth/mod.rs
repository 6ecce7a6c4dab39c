//! Request authentication, authorization, and audit side effects.
//!
//! # Purpose
//! Groups the bearer-token guard that turns a request into an
//! [`guard::AuthContext`] and the best-effort audit writer it reports to.
pub mod audit;
pub mod guard;
