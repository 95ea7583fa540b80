//! Web API module for Cumulus.
//!
//! This module provides the REST API consumed by the single-page client:
//! authentication with bearer access tokens and a refresh cookie, and the
//! file and folder endpoints of the drive.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_app, create_router};
pub use server::WebServer;
