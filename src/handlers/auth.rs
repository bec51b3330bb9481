// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{ChangePasswordRequest, CreateUserRequest, LoginRequest, ROLE_STUDENT, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

pub(crate) async fn fetch_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, name FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch user: {:?}", e);
        AppError::from(e)
    })
}

/// Maps a unique violation on `users.username` to 409.
pub(crate) fn map_user_insert_error(e: sqlx::Error, username: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Username '{}' already exists", username))
        }
        e => {
            tracing::error!("Failed to insert user: {:?}", e);
            AppError::from(e)
        }
    }
}

/// Registers a new student.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;
    let name = payload.name.clone().unwrap_or_else(|| payload.username.clone());

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, name)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, role, name
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(ROLE_STUDENT)
    .bind(&name)
    .fetch_one(&pool)
    .await
    .map_err(|e| map_user_insert_error(e, &payload.username))?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Verifies the username and password against the database.
/// If valid, signs a JWT token with the user's ID, name and role.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = fetch_user_by_username(&pool, &payload.username)
        .await?
        .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(
        user.id,
        &user.name,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
        "name": user.name
    })))
}

/// Changes the caller's password after checking the old one.
pub async fn change_password(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let current: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&payload.old_password, &current)? {
        return Err(AppError::AuthError("Old password is incorrect".to_string()));
    }

    let hashed = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
