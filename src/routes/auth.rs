use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::{
    auth::create_jwt,
    models::{AuthResponse, SigninRequest, SignupRequest},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}

fn message_error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"message": message})))
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Missing email/password or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, Json<Value>)> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let password = payload.password.as_deref().filter(|p| !p.is_empty());

    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            return Err(message_error(
                StatusCode::BAD_REQUEST,
                "Missing email or password",
            ))
        }
    };

    // Read-then-write existence check; two concurrent signups with the same
    // email can both pass it.
    let existing = state.db.get_user_by_email(email).await.map_err(|e| {
        error!("Error in signup: {}", e);
        message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error creating user")
    })?;

    if existing.is_some() {
        return Err(message_error(StatusCode::BAD_REQUEST, "User already exists"));
    }

    let password_hash = bcrypt::hash(password, 12).map_err(|e| {
        error!("Error hashing password: {}", e);
        message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error creating user")
    })?;

    let name = payload.name.unwrap_or_default();
    let user = state
        .db
        .create_user(email, &password_hash, &name)
        .await
        .map_err(|e| {
            error!("Error in signup: {}", e);
            message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error creating user")
        })?;

    let token = create_jwt(&user, &state.config.jwt_secret).map_err(|e| {
        error!("Error issuing token: {}", e);
        message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error creating user")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            token,
            user_id: user.id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "auth",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Logged in successfully", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, Json<Value>)> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let password = payload.password.as_deref().filter(|p| !p.is_empty());

    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            return Err(message_error(
                StatusCode::BAD_REQUEST,
                "Missing email or password",
            ))
        }
    };

    let user = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(|e| {
            error!("Error in signin: {}", e);
            message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error during signin")
        })?
        .ok_or_else(|| message_error(StatusCode::UNAUTHORIZED, "User not found"))?;

    let is_valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
        error!("Error verifying password: {}", e);
        message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error during signin")
    })?;

    if !is_valid {
        return Err(message_error(StatusCode::UNAUTHORIZED, "Invalid password"));
    }

    let token = create_jwt(&user, &state.config.jwt_secret).map_err(|e| {
        error!("Error issuing token: {}", e);
        message_error(StatusCode::INTERNAL_SERVER_ERROR, "Error during signin")
    })?;

    Ok(Json(AuthResponse {
        message: "Logged in successfully".to_string(),
        token,
        user_id: user.id,
    }))
}
