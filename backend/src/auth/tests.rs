use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn set_env_vars() {
    unsafe {
        env::set_var("JWT_USER_SECRET", SECRET);
    }
}

fn token(secret: &str, sub: &str, exp: usize) -> String {
    let claims = UserClaims {
        sub: sub.to_string(),
        email: Some("test@example.com".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn parts_with_authorization(value: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/api/v1/payments/checkout");
    if let Some(value) = value {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

#[test]
fn test_validate_user_jwt_success() {
    let token = token(SECRET, USER_ID, 9999999999);

    let claims = validate_user_jwt(&token, SECRET).expect("Valid token should pass");
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_user_jwt_expired() {
    let token = token(SECRET, USER_ID, 1);

    assert!(validate_user_jwt(&token, SECRET).is_err());
}

#[test]
fn test_validate_user_jwt_invalid_signature() {
    let token = token("wrongsecret", USER_ID, 9999999999);

    assert!(validate_user_jwt(&token, SECRET).is_err());
}

#[tokio::test]
async fn extractor_reads_bearer_token() {
    set_env_vars();
    let token = token(SECRET, USER_ID, 9999999999);
    let mut parts = parts_with_authorization(Some(&format!("Bearer {token}")));

    let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();

    assert_eq!(user.user_id, Uuid::parse_str(USER_ID).unwrap());
}

#[tokio::test]
async fn extractor_rejects_missing_or_malformed_header() {
    let mut missing = parts_with_authorization(None);
    let (status, _) = AuthUser::from_request_parts(&mut missing, &())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut basic = parts_with_authorization(Some("Basic dXNlcjpwYXNz"));
    let (status, message) = AuthUser::from_request_parts(&mut basic, &())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Invalid Authorization header format");
}

#[tokio::test]
async fn extractor_rejects_non_uuid_subject() {
    set_env_vars();
    let token = token(SECRET, "not-a-uuid", 9999999999);
    let mut parts = parts_with_authorization(Some(&format!("Bearer {token}")));

    let (status, message) = AuthUser::from_request_parts(&mut parts, &())
        .await
        .unwrap_err();

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Invalid user ID in token");
}
