//! User model for Cumulus.

/// User entity representing a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email (unique, lowercased).
    pub email: String,
    /// Password hash (Argon2).
    pub password: String,
    /// Storage quota in bytes.
    pub storage_limit: i64,
    /// Account creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email; normalized on construction.
    pub email: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password: String,
    /// Storage quota in bytes.
    pub storage_limit: i64,
}

impl NewUser {
    /// Create a new user. The email is trimmed and lowercased.
    pub fn new(
        name: impl Into<String>,
        email: &str,
        password: impl Into<String>,
        storage_limit: i64,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: normalize_email(email),
            password: password.into(),
            storage_limit,
        }
    }
}

/// Canonical form used for storing and looking up emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
