// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::ROLE_ADMIN};

/// Claims carried by every session token.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    pub role: String,
    /// Display name, shown by clients without another lookup.
    pub name: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn new(user_id: i64, name: &str, role: &str, ttl_seconds: u64) -> Self {
        let now = get_current_timestamp();
        Self {
            sub: user_id.to_string(),
            role: role.to_owned(),
            name: name.to_owned(),
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// The authenticated user's id, used as the student key of attempts and results.
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

/// Signs an HS256 session token valid for `ttl_seconds`.
pub fn sign_jwt(
    user_id: i64,
    name: &str,
    role: &str,
    secret: &str,
    ttl_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, name, role, ttl_seconds);
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::AuthError("Invalid or expired token".to_string())
        })
}

/// Token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies the bearer token and stores its `Claims` in the request
/// extensions. Answers 401 otherwise.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;
    let claims = verify_jwt(token, &config.jwt_secret)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Lets only admins through. Runs inside `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Missing credentials".to_string()))?;

    if !claims.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
