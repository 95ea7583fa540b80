//! Access control for files and folders.
//!
//! Visibility is decided per entity from three sources, checked in order:
//! the public flag, ownership, then the entity's share list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CumulusError;

/// Permission granted by a share entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Viewer,
    Editor,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Viewer => "viewer",
            Permission::Editor => "editor",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown permission strings.
#[derive(Debug, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Permission::Viewer),
            "editor" => Ok(Permission::Editor),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Owner,
    Editor,
    Viewer,
    Public,
    Denied,
}

impl AccessLevel {
    /// Whether the entity may be read.
    pub fn can_read(&self) -> bool {
        !matches!(self, AccessLevel::Denied)
    }

    /// Whether the entity's content may be changed (rename).
    pub fn can_write(&self) -> bool {
        matches!(self, AccessLevel::Owner | AccessLevel::Editor)
    }
}

impl From<Permission> for AccessLevel {
    fn from(p: Permission) -> Self {
        match p {
            Permission::Viewer => AccessLevel::Viewer,
            Permission::Editor => AccessLevel::Editor,
        }
    }
}

/// Entities carrying owner, public flag and share list.
pub trait Shareable {
    fn owner_id(&self) -> i64;
    fn is_public(&self) -> bool;
    /// Permission of `user_id` in the share list, if present.
    fn shared_permission(&self, user_id: i64) -> Option<Permission>;
}

/// Decide what `requester` may do with `entity`.
///
/// First match wins: public, owner, shared, denied. A public entity is
/// readable without any identity.
pub fn resolve_access<E: Shareable + ?Sized>(entity: &E, requester: Option<i64>) -> AccessLevel {
    if entity.is_public() {
        return AccessLevel::Public;
    }
    match requester {
        Some(user_id) => identity_access(entity, user_id),
        None => AccessLevel::Denied,
    }
}

/// Access derived from identity alone, ignoring the public flag.
///
/// Write checks use this so an owner keeps write access to a public entity.
pub fn identity_access<E: Shareable + ?Sized>(entity: &E, user_id: i64) -> AccessLevel {
    if entity.owner_id() == user_id {
        return AccessLevel::Owner;
    }
    entity
        .shared_permission(user_id)
        .map(AccessLevel::from)
        .unwrap_or(AccessLevel::Denied)
}

/// Fail unless `entity` is readable by `requester`.
///
/// An anonymous requester is told to authenticate; a known one is refused.
pub fn require_read<E: Shareable + ?Sized>(
    entity: &E,
    requester: Option<i64>,
) -> crate::Result<AccessLevel> {
    match resolve_access(entity, requester) {
        AccessLevel::Denied if requester.is_none() => {
            Err(CumulusError::Auth("authentication required".to_string()))
        }
        AccessLevel::Denied => Err(CumulusError::Permission("Access denied".to_string())),
        level => Ok(level),
    }
}

/// Fail unless `user_id` may change `entity`'s content.
pub fn require_write<E: Shareable + ?Sized>(entity: &E, user_id: i64) -> crate::Result<AccessLevel> {
    let level = identity_access(entity, user_id);
    if level.can_write() {
        Ok(level)
    } else {
        Err(CumulusError::Permission("Write access denied".to_string()))
    }
}
