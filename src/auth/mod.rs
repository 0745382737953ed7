/*!
 * # Authentication and Authorization Module
 *
 * JWT (HS256) bearer authentication for the purchase request API.
 *
 * - [`AuthService`] issues and validates tokens
 * - [`auth_middleware`] authenticates every protected route
 * - [`AuthUser`] is the extractor handlers use; [`Actor`] is what commands see
 * - [`password`] hashes and verifies credentials with argon2
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{sector, user};
use crate::errors::ServiceError;
use crate::metrics::AUTH_FAILURES;
use crate::models::Role;

pub mod password;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,         // Subject (user ID)
    pub role: Role,          // admin | requester
    pub name: String,        // User's name
    pub email: String,       // User's email
    pub sector_id: Uuid,     // Requester's sector
    pub sector_name: String, // Denormalized for clients
    pub iat: i64,            // Issued at time
    pub exp: i64,            // Expiration time
}

/// The acting user as seen by commands and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the actor is an administrator.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator role required".to_string(),
            ))
        }
    }

    /// Admins may act on anything; requesters only on what they own.
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<(), ServiceError> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "access restricted to the request owner".to_string(),
            ))
        }
    }
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub sector_id: Uuid,
    pub sector_name: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            role: claims.role,
            name: claims.name,
            email: claims.email,
            sector_id: claims.sector_id,
            sector_name: claims.sector_name,
        })
    }
}

/// Handlers take this to require an authenticated caller.
pub type AuthenticatedUser = AuthUser;

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration: std::time::Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_expiration: std::time::Duration) -> Self {
        Self {
            jwt_secret,
            token_expiration,
        }
    }
}

/// Issues and validates access tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_expiration", &self.config.token_expiration)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn token_expiration(&self) -> std::time::Duration {
        self.config.token_expiration
    }

    /// Generate a signed token for a user and their sector
    pub fn issue_token(
        &self,
        user: &user::Model,
        sector: &sector::Model,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            sector_id: sector.id,
            sector_name: sector.name.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;
        Ok(data.claims)
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let result = self.validate_token(token).and_then(AuthUser::try_from);
        if let Err(e) = &result {
            AUTH_FAILURES.with_label_values(&[e.metric_label()]).inc();
        }
        result
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::MissingAuth => "missing",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "expired",
            Self::TokenCreation(_) => "token_creation",
            Self::InsufficientPermissions => "forbidden",
            Self::InternalError(_) => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware that validates the bearer token and stores the
/// resulting [`AuthUser`] in the request extensions.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match bearer_token(request.headers()) {
        Some(token) => auth.authenticate(token),
        None => {
            AUTH_FAILURES.with_label_values(&["missing"]).inc();
            Err(AuthError::MissingAuth)
        }
    };

    match user {
        Ok(user) => {
            debug!(user_id = %user.user_id, role = %user.role, "request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamTokenQuery {
    pub token: Option<String>,
}

/// Variant of [`auth_middleware`] for the event stream. Browsers cannot set
/// headers on an `EventSource`, so a `?token=` query parameter is accepted
/// when no `Authorization` header is present.
pub async fn stream_auth_middleware(
    State(auth): State<Arc<AuthService>>,
    Query(query): Query<StreamTokenQuery>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers())
        .map(str::to_string)
        .or(query.token.filter(|t| !t.is_empty()));

    let user = match token {
        Some(token) => auth.authenticate(&token),
        None => {
            AUTH_FAILURES.with_label_values(&["missing"]).inc();
            Err(AuthError::MissingAuth)
        }
    };

    match user {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Router helpers that put a group of routes behind authentication.
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_stream_auth(self, auth: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn with_stream_auth(self, auth: Arc<AuthService>) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            auth,
            stream_auth_middleware,
        ))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Set by the middleware when the route is behind it
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let auth = Arc::<AuthService>::from_ref(state);
        match bearer_token(&parts.headers) {
            Some(token) => auth.authenticate(token),
            None => Err(AuthError::MissingAuth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    const SECRET: &str = "q8Vn2Lx7Rt4Wz1Ky6Hs3Jd9Mb5Pc0Fg_unit";

    fn service(ttl: Duration) -> AuthService {
        AuthService::new(AuthConfig::new(SECRET.to_string(), ttl))
    }

    fn fixtures(role: Role) -> (user::Model, sector::Model) {
        let now = Utc::now();
        let sector = sector::Model {
            id: Uuid::new_v4(),
            name: "Compras".into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let user = user::Model {
            id: Uuid::new_v4(),
            name: "Dana".into(),
            email: "dana@example.com".into(),
            password_hash: String::new(),
            role,
            sector_id: sector.id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        (user, sector)
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let auth = service(Duration::from_secs(3600));
        let (user, sector) = fixtures(Role::Admin);

        let token = auth.issue_token(&user, &sector).unwrap();
        let authed = auth.authenticate(&token).unwrap();

        assert_eq!(authed.user_id, user.id);
        assert_eq!(authed.role, Role::Admin);
        assert_eq!(authed.sector_name, "Compras");
        assert!(authed.actor().is_admin());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (user, sector) = fixtures(Role::Requester);
        let other = AuthService::new(AuthConfig::new(
            "another-secret-that-is-long-enough-000".into(),
            Duration::from_secs(3600),
        ));
        let token = other.issue_token(&user, &sector).unwrap();

        assert_matches!(
            service(Duration::from_secs(3600)).validate_token(&token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let auth = service(Duration::from_secs(3600));
        let (user, sector) = fixtures(Role::Requester);
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            name: user.name.clone(),
            email: user.email.clone(),
            sector_id: sector.id,
            sector_name: sector.name.clone(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_matches!(
            auth.validate_token(&token),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn actor_guards() {
        let owner = Uuid::new_v4();
        let requester = Actor::new(owner, Role::Requester);
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        assert!(requester.require_admin().is_err());
        assert!(requester.require_owner_or_admin(owner).is_ok());
        assert_matches!(
            requester.require_owner_or_admin(Uuid::new_v4()),
            Err(ServiceError::Forbidden(_))
        );
        assert!(admin.require_owner_or_admin(owner).is_ok());
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
