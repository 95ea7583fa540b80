//! API handlers.

pub mod auth;
pub mod file;
pub mod folder;

pub use auth::*;
pub use file::*;
pub use folder::*;
