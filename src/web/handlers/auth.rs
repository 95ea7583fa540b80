//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

use crate::config::Config;
use crate::db::{NewRefreshToken, NewUser, RefreshTokenRepository, UserRepository};
use crate::drive::{DriveSettings, FileService, FolderService, ObjectStore};
use crate::web::dto::{
    ApiResponse, AuthResponse, LoginRequest, MessageResponse, RefreshResponse, RegisterRequest,
    UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, JwtClaims};
use crate::Database;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path the refresh cookie is scoped to.
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Database,
    /// Object store holding file content.
    pub store: Arc<dyn ObjectStore>,
    /// Drive limits and link settings.
    pub drive: DriveSettings,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Refresh token expiry in days.
    pub refresh_token_expiry: u64,
    /// Whether the refresh cookie is marked `Secure`.
    pub cookie_secure: bool,
    /// Quota assigned at registration.
    pub default_storage_limit: i64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self {
            db,
            store,
            drive: DriveSettings::from_config(config),
            encoding_key: EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
            access_token_expiry: config.auth.jwt_access_token_expiry_secs,
            refresh_token_expiry: config.auth.jwt_refresh_token_expiry_days,
            cookie_secure: config.auth.cookie_secure,
            default_storage_limit: config.drive.default_storage_limit,
        }
    }

    /// File service bound to this state.
    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, self.store.as_ref(), &self.drive)
    }

    /// Folder service bound to this state.
    pub fn folders(&self) -> FolderService<'_> {
        FolderService::new(&self.db, self.store.as_ref(), &self.drive)
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user_id: i64, email: &str) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// Generate a refresh token.
    pub fn generate_refresh_token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        let same_site = if self.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        };

        Cookie::build((REFRESH_COOKIE, token))
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(same_site)
            .path(REFRESH_COOKIE_PATH)
            .max_age(time::Duration::days(self.refresh_token_expiry as i64))
            .build()
    }

    /// Issue a fresh token pair and attach the refresh cookie.
    async fn start_session(
        &self,
        jar: CookieJar,
        user_id: i64,
        email: &str,
    ) -> Result<(CookieJar, String), ApiError> {
        let access_token = self.generate_access_token(user_id, email)?;
        let refresh_token = self.generate_refresh_token();

        let new_token =
            NewRefreshToken::expiring_in_days(user_id, &refresh_token, self.refresh_token_expiry);
        RefreshTokenRepository::new(self.db.pool())
            .create(&new_token)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store refresh token: {}", e);
                ApiError::internal("Failed to create session")
            })?;

        Ok((jar.add(self.refresh_cookie(refresh_token)), access_token))
    }
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path(REFRESH_COOKIE_PATH)
        .build()
}

/// POST /api/auth/register - User registration.
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<AuthResponse>>), ApiError> {
    crate::auth::validate_password(&req.password)
        .map_err(|e| ApiError::bad_request(format!("Password error: {}", e)))?;

    let password_hash = crate::auth::hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    let new_user = NewUser::new(
        &req.name,
        &req.email,
        password_hash,
        state.default_storage_limit,
    );
    let user = UserRepository::new(state.db.pool()).create(&new_user).await?;
    tracing::info!(user_id = user.id, "User registered");

    let (jar, access_token) = state.start_session(jar, user.id, &user.email).await?;

    let response = AuthResponse {
        access_token,
        expires_in: state.access_token_expiry,
        user: UserResponse::from(&user),
    };

    Ok((StatusCode::CREATED, jar, Json(ApiResponse::new(response))))
}

/// POST /api/auth/login - User login.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<AuthResponse>>), ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    crate::auth::verify_password(&req.password, &user.password)
        .map_err(|_| ApiError::unauthorized("Invalid email or password"))?;

    let (jar, access_token) = state.start_session(jar, user.id, &user.email).await?;
    tracing::info!(user_id = user.id, "User logged in");

    let response = AuthResponse {
        access_token,
        expires_in: state.access_token_expiry,
        user: UserResponse::from(&user),
    };

    Ok((jar, Json(ApiResponse::new(response))))
}

/// POST /api/auth/refresh - Exchange the refresh cookie for a new access token.
///
/// The cookie is rotated; presenting an already rotated token fails.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<RefreshResponse>>), ApiError> {
    let old_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?;

    let tokens = RefreshTokenRepository::new(state.db.pool());
    let stored = tokens
        .get_valid_token(&old_token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let user = UserRepository::new(state.db.pool())
        .get_by_id(stored.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let new_refresh_token = state.generate_refresh_token();
    let new_token =
        NewRefreshToken::expiring_in_days(user.id, &new_refresh_token, state.refresh_token_expiry);
    if !tokens.rotate(&old_token, &new_token).await? {
        tracing::warn!(user_id = user.id, "Refresh token replayed");
        return Err(ApiError::unauthorized("Invalid or expired refresh token"));
    }

    let access_token = state.generate_access_token(user.id, &user.email)?;
    let response = RefreshResponse {
        access_token,
        expires_in: state.access_token_expiry,
    };

    Ok((
        jar.add(state.refresh_cookie(new_refresh_token)),
        Json(ApiResponse::new(response)),
    ))
}

/// POST /api/auth/logout - Revoke the refresh token and clear the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<MessageResponse>>), ApiError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        let repo = RefreshTokenRepository::new(state.db.pool());
        if let Err(e) = repo.revoke(cookie.value()).await {
            tracing::warn!("Failed to revoke refresh token: {}", e);
        }
    }

    Ok((
        jar.remove(removal_cookie()),
        Json(ApiResponse::new(MessageResponse::new("Logged out"))),
    ))
}

/// GET /api/auth/me - Get current user info.
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(UserResponse::from(&user))))
}
