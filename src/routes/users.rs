use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::{
    auth::AuthUser,
    models::{UpdateAvatarRequest, UpdateProfileRequest, UserResponse},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/avatar", post(update_avatar))
}

#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account record minus the password hash", body = UserResponse),
        (status = 401, description = "Unauthorized - invalid or missing token")
    )
)]
pub async fn get_profile(auth_user: AuthUser) -> Json<UserResponse> {
    Json(auth_user.user.into())
}

#[utoipa::path(
    put,
    path = "/api/user/profile",
    tag = "user",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(update): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .db
        .update_user_profile(auth_user.user.id, update)
        .await
        .map_err(|e| {
            error!("Error updating profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Error updating profile"})),
            )
        })?;

    Ok(Json(json!({"message": "Profile updated successfully"})))
}

#[utoipa::path(
    post,
    path = "/api/user/avatar",
    tag = "user",
    security(("bearer_auth" = [])),
    request_body = UpdateAvatarRequest,
    responses(
        (status = 200, description = "Avatar updated successfully"),
        (status = 400, description = "No avatar provided"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(update): Json<UpdateAvatarRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let avatar = update.avatar.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "No avatar provided"})),
        )
    })?;

    state
        .db
        .update_user_avatar(auth_user.user.id, &avatar)
        .await
        .map_err(|e| {
            error!("Error updating avatar: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Error updating avatar"})),
            )
        })?;

    Ok(Json(json!({"message": "Avatar updated successfully"})))
}
