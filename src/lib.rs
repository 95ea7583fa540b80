//! Cumulus - a multi-tenant cloud drive backend.
//!
//! Users register, upload files to an object store, organize them in
//! nested folders, share them with other users or through public links,
//! and manage a trash and star lifecycle. The REST API lives in [`web`];
//! [`client`] is a typed client for it.

pub mod auth;
pub mod client;
pub mod config;
pub mod datetime;
pub mod db;
pub mod drive;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{hash_password, validate_password, verify_password, PasswordError};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{CumulusError, Result};
