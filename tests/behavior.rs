mod common;

use axum::{http::StatusCode, response::IntoResponse};
use bookshelf_api::{
    AppError, build_rate_limiter, create_jwt_tokens, decode_jwt, excerpt, hash_password,
    requests::{LoginRequest, RegisterRequest, StoreBookRequest},
    verify_password,
};
use common::test_config;
use http_body_util::BodyExt;
use serde_json::Value;
use validator::Validate;

#[tokio::test]
async fn password_hash_and_verify_success_and_failure() {
    let pwd = "correctHorseBatteryStaple";
    let hash = hash_password(pwd).expect("hash should succeed");
    assert_ne!(hash, pwd, "hash should differ from password");
    assert!(
        verify_password(pwd, &hash).unwrap(),
        "verification should succeed"
    );
    assert!(
        !verify_password("wrong", &hash).unwrap(),
        "wrong password should fail"
    );
}

#[tokio::test]
async fn jwt_create_and_decode_access_refresh() {
    let cfg = test_config();
    let tokens = create_jwt_tokens(42, &cfg).unwrap();
    let access_claims = decode_jwt(&tokens.access, &cfg).unwrap();
    let refresh_claims = decode_jwt(&tokens.refresh, &cfg).unwrap();
    assert_eq!(access_claims.sub, 42);
    assert!(!access_claims.refresh, "access token refresh flag false");
    assert!(refresh_claims.refresh, "refresh token refresh flag true");
    assert_ne!(
        access_claims.jti, refresh_claims.jti,
        "each token carries its own id"
    );
}

#[tokio::test]
async fn jwt_decode_unauthorized_invalid() {
    let cfg = test_config();
    let res = decode_jwt("not.a.valid.token", &cfg);
    assert!(
        matches!(res, Err(AppError::Unauthorized)),
        "invalid token yields Unauthorized error"
    );
}

#[tokio::test]
async fn jwt_signed_with_another_secret_is_rejected() {
    let cfg = test_config();
    let mut other = test_config();
    other.jwt_secret = "a_different_secret".into();
    let tokens = create_jwt_tokens(1, &other).unwrap();
    assert!(matches!(
        decode_jwt(&tokens.access, &cfg),
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn rate_limiter_allows_first_blocks_second() {
    let limiter = build_rate_limiter(1);
    let key = "user123".to_string();
    assert!(
        limiter.check_key(&key).is_ok(),
        "first acquisition should pass"
    );
    assert!(
        limiter.check_key(&key).is_err(),
        "second acquisition should fail due to quota"
    );
    assert!(
        limiter.check_key(&"someone-else".to_string()).is_ok(),
        "quota is tracked per key"
    );
}

#[tokio::test]
async fn app_error_status_codes_mapping() {
    let mk = |e: AppError| e.into_response().status();
    assert_eq!(mk(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    assert_eq!(mk(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(mk(AppError::Forbidden), StatusCode::FORBIDDEN);
    assert_eq!(mk(AppError::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(mk(AppError::conflict("x")), StatusCode::CONFLICT);
    assert_eq!(
        mk(AppError::invalid("name", "required")),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(mk(AppError::TooManyRequests), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        mk(AppError::Anyhow(anyhow::anyhow!("boom"))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(mk(sqlx::Error::RowNotFound.into()), StatusCode::NOT_FOUND);
}

async fn body_json(error: AppError) -> Value {
    let bytes = error
        .into_response()
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn validation_error_envelope_lists_fields() {
    let body = body_json(AppError::invalid("email", "The email has already been taken.")).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation errors");
    assert_eq!(body["data"]["email"][0], "The email has already been taken.");
}

#[tokio::test]
async fn server_error_envelope_hides_details() {
    let body = body_json(AppError::Anyhow(anyhow::anyhow!("secret connection string"))).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Server error");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn register_request_reports_every_missing_field() {
    let req: RegisterRequest = serde_json::from_str("{}").unwrap();
    let err = AppError::from(req.validate().unwrap_err());
    let AppError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert_eq!(
        fields.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["email", "name", "password"]
    );
    assert_eq!(fields["name"][0], "The name field is required.");
}

#[tokio::test]
async fn register_request_validation_invalid_email() {
    let req = RegisterRequest {
        name: Some("Reader".into()),
        email: Some("not-an-email".into()),
        password: Some("longenough".into()),
    };
    assert!(
        req.validate().is_err(),
        "invalid email should fail validation"
    );
}

#[tokio::test]
async fn login_request_validation_short_password() {
    let req = LoginRequest {
        email: Some("user@example.com".into()),
        password: Some("short".into()),
    };
    assert!(
        req.validate().is_err(),
        "short password should fail validation"
    );
}

#[tokio::test]
async fn store_book_request_requires_an_author() {
    let req: StoreBookRequest = serde_json::from_value(serde_json::json!({
        "title": "Emma",
        "synopsis": "Matchmaking.",
        "isbn": "9780141439587",
        "pages_amount": 474,
        "chapters_amount": 55,
        "published_at": "1815-12-23",
        "author_ids": []
    }))
    .unwrap();
    let AppError::Validation(fields) = AppError::from(req.validate().unwrap_err()) else {
        panic!("expected validation error");
    };
    assert!(fields.contains_key("author_ids"));
}

#[test]
fn excerpt_takes_leading_words() {
    assert_eq!(excerpt("one two  three four", 3), "one two three");
    assert_eq!(excerpt("short", 8), "short");
    assert_eq!(excerpt("", 8), "");
}

#[tokio::test]
async fn health_check_behavior() {
    let res = bookshelf_api::handlers::health_check().await;
    assert_eq!(res, "OK");
}
