mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, header, request::Parts},
};
use chrono::{Duration, TimeZone, Utc};
use common::{seed_user, test_env};
use jsonwebtoken::{EncodingKey, Header, encode};
use shareboard::{
    auth::{AuthUser, Claims, decode_token, hash_password, issue_token, verify_password},
    config::Env,
    error::CoreError,
    identity::Role,
    moderation,
};
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "a_very_secure_test_secret_that_is_long_enough";

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts() -> Parts {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

// --- Token issuance and validation ---

#[test]
fn test_issue_and_decode_round_trip() {
    let mut config = shareboard::AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config.jwt_ttl_hours = 2;
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).single().unwrap();
    let user_id = Uuid::new_v4();

    let (token, expires_at) = issue_token(&config, user_id, &now).unwrap();
    assert_eq!(expires_at, now + Duration::hours(2));

    let claims = decode_token(&config, &token, &(now + Duration::minutes(119))).unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.iat as i64, now.timestamp());
}

#[test]
fn test_decode_rejects_expired_token() {
    let config = shareboard::AppConfig::default();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).single().unwrap();
    let (token, expires_at) = issue_token(&config, Uuid::new_v4(), &now).unwrap();

    assert_eq!(
        decode_token(&config, &token, &expires_at).unwrap_err(),
        CoreError::Unauthenticated
    );
}

#[test]
fn test_decode_rejects_foreign_signature() {
    let config = shareboard::AppConfig::default();
    let now = Utc::now();
    let claims = Claims {
        sub: Uuid::new_v4(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(1)).timestamp() as usize,
    };
    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"someone-elses-secret"),
    )
    .unwrap();

    assert_eq!(
        decode_token(&config, &forged, &now).unwrap_err(),
        CoreError::Unauthenticated
    );
}

#[test]
fn test_password_hash_verifies_only_the_original() {
    let hash = hash_password("hunter2hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2hunter2", &hash));
    assert!(!verify_password("hunter3hunter3", &hash));
    assert!(!verify_password("hunter2hunter2", "not a phc string"));
}

// --- AuthUser extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let mut env = test_env();
    env.state.config.env = Env::Production;
    let user = seed_user(&env, "alice", &[Role::User, Role::Moderator]).await;
    let (token, _) = issue_token(&env.state.config, user.id, &env.state.clock.now()).unwrap();

    let mut parts = get_request_parts();
    with_bearer(&mut parts, &token);

    let AuthUser(actor) = AuthUser::from_request_parts(&mut parts, &env.state)
        .await
        .unwrap();
    assert_eq!(actor.id, user.id);
    assert!(actor.is_moderator());
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let env = test_env();
    let mut parts = get_request_parts();

    let result = AuthUser::from_request_parts(&mut parts, &env.state).await;
    assert_eq!(result.unwrap_err(), CoreError::Unauthenticated);
}

#[tokio::test]
async fn test_auth_failure_for_deleted_account() {
    let env = test_env();
    let (token, _) = issue_token(&env.state.config, Uuid::new_v4(), &env.state.clock.now()).unwrap();

    let mut parts = get_request_parts();
    with_bearer(&mut parts, &token);

    let result = AuthUser::from_request_parts(&mut parts, &env.state).await;
    assert_eq!(result.unwrap_err(), CoreError::Unauthenticated);
}

#[tokio::test]
async fn test_token_issued_before_ban_still_authenticates() {
    let env = test_env();
    let moderator = seed_user(&env, "mod", &[Role::Moderator]).await;
    let user = seed_user(&env, "bob", &[Role::User]).await;
    let (token, _) = issue_token(&env.state.config, user.id, &env.state.clock.now()).unwrap();

    moderation::ban(&env.state, &moderator, user.id, 3).await.unwrap();

    let mut parts = get_request_parts();
    with_bearer(&mut parts, &token);
    let AuthUser(actor) = AuthUser::from_request_parts(&mut parts, &env.state)
        .await
        .unwrap();

    // The snapshot carries the ban so services can see it.
    assert!(actor.is_banned(&env.state.clock.now()));
}

#[tokio::test]
async fn test_local_bypass_success() {
    let env = test_env();
    let user = seed_user(&env, "dev", &[Role::User, Role::Admin]).await;

    let mut parts = get_request_parts();
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let AuthUser(actor) = AuthUser::from_request_parts(&mut parts, &env.state)
        .await
        .unwrap();
    assert_eq!(actor.id, user.id);
    assert!(actor.is_admin());
}

#[tokio::test]
async fn test_local_bypass_ignored_in_production() {
    let mut env = test_env();
    env.state.config.env = Env::Production;
    let user = seed_user(&env, "dev", &[Role::User]).await;

    let mut parts = get_request_parts();
    parts.headers.insert(
        "x-user-id",
        header::HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let result = AuthUser::from_request_parts(&mut parts, &env.state).await;
    assert_eq!(result.unwrap_err(), CoreError::Unauthenticated);
}
