//! HTTP API module.
//!
//! # Purpose
//! Exposes the send/get message handlers and the service endpoints
//! (liveness, readiness, metrics, log tags).
pub mod error;
pub mod messages;
pub mod system;
pub mod timeout;
pub mod types;
