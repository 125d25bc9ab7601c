//! ssqueue service library crate.
//!
//! # Purpose
//! Exposes the HTTP API, configuration, observability and snapshot file
//! handling around the `ssqueue-core` registry, for use by the binary and
//! tests.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod snapshots;
