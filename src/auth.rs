use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::ClockState,
    config::{AppConfig, Env},
    error::{CoreError, CoreResult},
    identity::Identity,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the bearer tokens issued by `issue_token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 token for `user_id` valid for `config.jwt_ttl_hours`.
/// Callers are responsible for refusing banned users before getting here.
pub fn issue_token<Tz: TimeZone>(
    config: &AppConfig,
    user_id: Uuid,
    now: &DateTime<Tz>,
) -> CoreResult<(String, DateTime<Utc>)> {
    let issued_at = now.with_timezone(&Utc);
    let expires_at = issued_at + Duration::hours(config.jwt_ttl_hours);
    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp().max(0) as usize,
        iat: issued_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(CoreError::internal)?;

    Ok((token, expires_at))
}

/// decode_token
///
/// Checks the signature, then expiry against `now` from the application clock
/// rather than the host time, so issuance and validation share one notion of "now".
pub fn decode_token<Tz: TimeZone>(
    config: &AppConfig,
    token: &str,
    now: &DateTime<Tz>,
) -> CoreResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = false;

    let claims = match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => data.claims,
        Err(e) => {
            match e.kind() {
                ErrorKind::InvalidSignature => tracing::debug!("rejected token: bad signature"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            return Err(CoreError::Unauthenticated);
        }
    };

    if (claims.exp as i64) <= now.timestamp() {
        tracing::debug!(user_id = %claims.sub, "rejected expired token");
        return Err(CoreError::Unauthenticated);
    }
    Ok(claims)
}

/// Hashes a password with Argon2 default parameters and a random salt.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| CoreError::internal("failed to hash password"))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// AuthUser Extractor Result
///
/// The authenticated actor of a request: a snapshot of the user's id, roles and
/// ban state as stored when the request arrived.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// AuthUser Extractor Implementation
///
/// 1. In `Env::Local`, an `x-user-id` header naming an existing user is accepted as-is.
/// 2. Otherwise a `Bearer` token is required and validated (signature, then expiry
///    against the application clock).
/// 3. The user is re-read from the repository so roles reflect the current state
///    and deleted accounts are refused even with a valid token.
///
/// Rejection: `CoreError::Unauthenticated` (401).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    ClockState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.find_user(user_id).await? {
                    return Ok(AuthUser(Identity::from(&user)));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(CoreError::Unauthenticated)?;

        let clock = ClockState::from_ref(state);
        let claims = decode_token(&config, token, &clock.now())?;

        let user = repo
            .find_user(claims.sub)
            .await?
            .ok_or(CoreError::Unauthenticated)?;

        Ok(AuthUser(Identity::from(&user)))
    }
}
