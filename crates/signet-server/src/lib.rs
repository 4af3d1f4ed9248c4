//! # signet-server
//!
//! Demonstration web client that delegates user authentication to an
//! external OpenID Connect Identity Provider and displays the resulting
//! profile. The protocol work — token verification, flow orchestration,
//! session ownership — lives in the `signet-rp` crate; this crate provides
//! configuration, routing and the pages.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod pages;
pub mod state;

pub use config::{ConfigError, ServerConfig, load_config};
pub use handlers::router;
pub use state::AppState;
