//! Rategate Server - an HTTP front for the rategate request-rate governor.
//!
//! The governance core lives in `rategate-service`, the axum adapter in
//! `rategate-http`. This crate adds CLI/env configuration and bootstrap.

pub mod config;

pub use rategate_http::{AppState, router, serve};
pub use rategate_service::sweeper::spawn_sweeper;
