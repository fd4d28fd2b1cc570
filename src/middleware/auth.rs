use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::AppError,
    models::{ROLE_ADMIN, ROLE_MODERATOR},
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Moderator endpoints are open to admins as well.
pub fn ensure_moderator(user: &AuthUser) -> Result<(), AppError> {
    if user.role == ROLE_MODERATOR || user.role == ROLE_ADMIN {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Unauthorized("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET_ACCESS")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET_ACCESS is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role.clone(),
        })
    }
}
