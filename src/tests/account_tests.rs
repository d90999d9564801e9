use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::auth::verify_jwt;
use crate::models::{SigninRequest, SignupRequest};
use crate::routes::auth::{signin, signup};
use crate::tests::helpers::spawn_test_app;

fn signup_request(email: &str) -> SignupRequest {
    SignupRequest {
        email: Some(email.to_string()),
        password: Some("password123".to_string()),
        name: Some("Test User".to_string()),
    }
}

async fn user_count(state: &crate::AppState, email: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(state.db.get_pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_signup_creates_user_and_issues_token() {
    let app = spawn_test_app().await;

    let (status, body) = signup(State(app.state.clone()), Json(signup_request("new@example.com")))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.message, "User created successfully");

    let claims = verify_jwt(&body.token, "test_secret").unwrap();
    assert_eq!(claims.sub, body.user_id);
    assert_eq!(claims.email, "new@example.com");

    assert_eq!(user_count(&app.state, "new@example.com").await, 1);
}

#[tokio::test]
async fn test_duplicate_signup_is_rejected_and_creates_no_second_row() {
    let app = spawn_test_app().await;

    signup(State(app.state.clone()), Json(signup_request("dup@example.com")))
        .await
        .unwrap();

    let (status, body) = signup(State(app.state.clone()), Json(signup_request("dup@example.com")))
        .await
        .unwrap_err();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["message"], "User already exists");

    assert_eq!(user_count(&app.state, "dup@example.com").await, 1);
}

#[tokio::test]
async fn test_signup_missing_fields_is_rejected() {
    let app = spawn_test_app().await;

    let (status, body) = signup(
        State(app.state.clone()),
        Json(SignupRequest {
            email: Some("half@example.com".to_string()),
            password: None,
            name: None,
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.0["message"], "Missing email or password");
    assert_eq!(user_count(&app.state, "half@example.com").await, 0);
}

#[tokio::test]
async fn test_signin_round_trip() {
    let app = spawn_test_app().await;
    signup(State(app.state.clone()), Json(signup_request("login@example.com")))
        .await
        .unwrap();

    let body = signin(
        State(app.state.clone()),
        Json(SigninRequest {
            email: Some("login@example.com".to_string()),
            password: Some("password123".to_string()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(body.message, "Logged in successfully");
    assert!(verify_jwt(&body.token, "test_secret").is_ok());
}

#[tokio::test]
async fn test_signin_wrong_password_is_unauthorized() {
    let app = spawn_test_app().await;
    signup(State(app.state.clone()), Json(signup_request("victim@example.com")))
        .await
        .unwrap();

    let (status, body) = signin(
        State(app.state.clone()),
        Json(SigninRequest {
            email: Some("victim@example.com".to_string()),
            password: Some("not-the-password".to_string()),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["message"], "Invalid password");
}

#[tokio::test]
async fn test_signin_unknown_email_is_unauthorized() {
    let app = spawn_test_app().await;

    let (status, body) = signin(
        State(app.state.clone()),
        Json(SigninRequest {
            email: Some("nobody@example.com".to_string()),
            password: Some("password123".to_string()),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.0["message"], "User not found");
}
