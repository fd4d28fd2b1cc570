use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::auth::Claims,
    error::{AppError, AppResult},
};

pub const ACCESS_TOKEN_MINUTES: i64 = 60;
pub const REFRESH_TOKEN_DAYS: i64 = 7;
pub const ACTIVATION_TOKEN_HOURS: i64 = 24;
pub const RESET_TOKEN_MINUTES: i64 = 60;

/// Opaque URL-safe token for activation and password-reset emails.
pub fn generate_secure_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

fn secret_from_env(name: &str) -> AppResult<String> {
    std::env::var(name)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("{name} is not set")))
}

fn create_token(
    user_id: Uuid,
    role: &str,
    secret: &str,
    lifetime: Duration,
) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn create_access_token(user_id: Uuid, role: &str) -> AppResult<String> {
    let secret = secret_from_env("JWT_SECRET_ACCESS")?;
    create_token(user_id, role, &secret, Duration::minutes(ACCESS_TOKEN_MINUTES))
}

pub fn create_refresh_token(user_id: Uuid, role: &str) -> AppResult<String> {
    let secret = secret_from_env("JWT_SECRET_REFRESH")?;
    create_token(user_id, role, &secret, Duration::days(REFRESH_TOKEN_DAYS))
}

pub fn decode_refresh_token(token: &str) -> AppResult<Claims> {
    let secret = secret_from_env("JWT_SECRET_REFRESH")?;
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token".into()))?;
    Ok(decoded.claims)
}

/// Delete expired activation, password-reset and refresh tokens. Called by
/// the hourly scheduler job; returns the number of rows removed per table.
pub async fn sweep_expired_tokens(pool: &DbPool) -> AppResult<(u64, u64, u64)> {
    let now = Utc::now();

    let activation = sqlx::query("DELETE FROM activation_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

    let reset = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

    let refresh = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

    Ok((activation, reset, refresh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_tokens_are_long_and_distinct() {
        let a = generate_secure_token();
        let b = generate_secure_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn access_token_roundtrip() {
        // SAFETY: test-local env mutation, no other thread reads this key here.
        unsafe {
            std::env::set_var("JWT_SECRET_ACCESS", "unit-test-secret");
        }
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "moderator").unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"unit-test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, user_id.to_string());
        assert_eq!(decoded.claims.role, "moderator");
    }

    #[test]
    fn refresh_token_rejects_wrong_secret() {
        unsafe {
            std::env::set_var("JWT_SECRET_REFRESH", "refresh-secret");
            std::env::set_var("JWT_SECRET_ACCESS", "unit-test-secret");
        }
        let token = create_access_token(Uuid::new_v4(), "user").unwrap();
        // An access token must not validate as a refresh token.
        assert!(decode_refresh_token(&token).is_err());
    }
}
