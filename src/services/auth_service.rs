use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::auth::{
        ActivateRequest, LoginRequest, LoginResponse, LogoutRequest,
        PasswordResetCompleteRequest, PasswordResetRequest, RegisterRequest,
        TokenRefreshRequest, TokenRefreshResponse,
    },
    entity::{
        activation_tokens::{
            ActiveModel as ActivationTokenActive, Column as ActivationCol,
            Entity as ActivationTokens,
        },
        password_reset_tokens::{
            ActiveModel as ResetTokenActive, Column as ResetCol, Entity as PasswordResetTokens,
        },
        refresh_tokens::{
            ActiveModel as RefreshTokenActive, Column as RefreshCol, Entity as RefreshTokens,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{ROLE_USER, User},
    response::{ApiResponse, Meta},
    services::token_service,
    state::AppState,
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest { email, password } = payload;
    let email = email.trim().to_lowercase();

    validate_password_strength(&password)?;

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict(format!(
            "A user with this email {email} already exists."
        )));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        role: Set(ROLE_USER.into()),
        is_active: Set(false),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let token = token_service::generate_secure_token();
    ActivationTokenActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        token: Set(token.clone()),
        expires_at: Set(
            (Utc::now() + Duration::hours(token_service::ACTIVATION_TOKEN_HOURS)).into(),
        ),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = state.mailer.send_activation_email(&user.email, &token).await {
        tracing::warn!(error = %err, "activation email failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created, check your email for the activation token",
        user_from_entity(user),
        None,
    ))
}

pub async fn activate_account(
    state: &AppState,
    payload: ActivateRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let email = payload.email.trim().to_lowercase();
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired activation token.".into()))?;

    let token_record = ActivationTokens::find()
        .filter(ActivationCol::UserId.eq(user.id))
        .filter(ActivationCol::Token.eq(payload.token.as_str()))
        .one(&state.orm)
        .await?;

    let token_record = match token_record {
        Some(record) => record,
        None => return Err(AppError::BadRequest("Invalid or expired activation token.".into())),
    };

    if token_record.expires_at < Utc::now() {
        ActivationTokens::delete_by_id(token_record.id)
            .exec(&state.orm)
            .await?;
        return Err(AppError::BadRequest("Invalid or expired activation token.".into()));
    }

    if user.is_active {
        return Err(AppError::BadRequest("User account is already active.".into()));
    }

    let user_id = user.id;
    let user_email = user.email.clone();
    let mut active: UserActive = user.into();
    active.is_active = Set(true);
    active.update(&state.orm).await?;

    ActivationTokens::delete_by_id(token_record.id)
        .exec(&state.orm)
        .await?;

    if let Err(err) = state.mailer.send_activation_complete_email(&user_email).await {
        tracing::warn!(error = %err, "activation complete email failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "user_activate",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User account activated successfully.",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let email = email.trim().to_lowercase();

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid email or password".into())),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    let access_token = token_service::create_access_token(user.id, &user.role)?;
    let refresh_token = token_service::create_refresh_token(user.id, &user.role)?;

    RefreshTokenActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        token: Set(refresh_token.clone()),
        expires_at: Set((Utc::now() + Duration::days(token_service::REFRESH_TOKEN_DAYS)).into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn refresh_access_token(
    state: &AppState,
    payload: TokenRefreshRequest,
) -> AppResult<ApiResponse<TokenRefreshResponse>> {
    let claims = token_service::decode_refresh_token(&payload.refresh_token)?;

    let record = RefreshTokens::find()
        .filter(RefreshCol::Token.eq(payload.refresh_token.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Refresh token has been revoked".into()))?;

    if record.expires_at < Utc::now() {
        RefreshTokens::delete_by_id(record.id).exec(&state.orm).await?;
        return Err(AppError::Unauthorized("Refresh token has expired".into()));
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".into()))?;

    // Re-read the role so a promotion or demotion takes effect on refresh.
    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    let access_token = token_service::create_access_token(user.id, &user.role)?;

    Ok(ApiResponse::success(
        "Token refreshed",
        TokenRefreshResponse {
            access_token,
            token_type: "bearer".into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn logout_user(
    state: &AppState,
    payload: LogoutRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let deleted = RefreshTokens::delete_many()
        .filter(RefreshCol::Token.eq(payload.refresh_token.as_str()))
        .exec(&state.orm)
        .await?;

    if deleted.rows_affected > 0 {
        if let Err(err) = log_audit(&state.pool, None, "user_logout", Some("users"), None).await {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn request_password_reset(
    state: &AppState,
    payload: PasswordResetRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    const NEUTRAL_MESSAGE: &str =
        "If you are registered, you will receive an email with instructions.";

    let email = payload.email.trim().to_lowercase();
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    // Respond identically whether or not the account exists.
    let Some(user) = user.filter(|u| u.is_active) else {
        return Ok(ApiResponse::success(
            NEUTRAL_MESSAGE,
            serde_json::json!({}),
            Some(Meta::empty()),
        ));
    };

    PasswordResetTokens::delete_many()
        .filter(ResetCol::UserId.eq(user.id))
        .exec(&state.orm)
        .await?;

    let token = token_service::generate_secure_token();
    ResetTokenActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        token: Set(token.clone()),
        expires_at: Set(
            (Utc::now() + Duration::minutes(token_service::RESET_TOKEN_MINUTES)).into(),
        ),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = state.mailer.send_password_reset_email(&user.email, &token).await {
        tracing::warn!(error = %err, "password reset email failed");
    }

    Ok(ApiResponse::success(
        NEUTRAL_MESSAGE,
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn complete_password_reset(
    state: &AppState,
    payload: PasswordResetCompleteRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let email = payload.email.trim().to_lowercase();
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user.filter(|u| u.is_active) {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or token.".into())),
    };

    let token_record = PasswordResetTokens::find()
        .filter(ResetCol::UserId.eq(user.id))
        .one(&state.orm)
        .await?;

    let token_record = match token_record {
        Some(record) if record.token == payload.token => record,
        Some(record) => {
            // A mismatched token invalidates the outstanding one.
            PasswordResetTokens::delete_by_id(record.id)
                .exec(&state.orm)
                .await?;
            return Err(AppError::BadRequest("Invalid email or token.".into()));
        }
        None => return Err(AppError::BadRequest("Invalid email or token.".into())),
    };

    if token_record.expires_at < Utc::now() {
        PasswordResetTokens::delete_by_id(token_record.id)
            .exec(&state.orm)
            .await?;
        return Err(AppError::BadRequest("Invalid email or token.".into()));
    }

    validate_password_strength(&payload.password)?;
    let password_hash = hash_password(&payload.password)?;

    let user_id = user.id;
    let user_email = user.email.clone();
    let mut active: UserActive = user.into();
    active.password_hash = Set(password_hash);
    active.update(&state.orm).await?;

    PasswordResetTokens::delete_by_id(token_record.id)
        .exec(&state.orm)
        .await?;

    // Changing the password revokes every open session.
    RefreshTokens::delete_many()
        .filter(RefreshCol::UserId.eq(user_id))
        .exec(&state.orm)
        .await?;

    if let Err(err) = state.mailer.send_password_reset_complete_email(&user_email).await {
        tracing::warn!(error = %err, "password reset complete email failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "password_reset",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password reset successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Registration and reset passwords must be at least 8 characters and carry
/// an uppercase letter, a lowercase letter, a digit and a special character.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must contain at least 8 characters.".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one uppercase letter.".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one lowercase letter.".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one digit.".into(),
        ));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(
            "Password must contain at least one special character.".into(),
        ));
    }
    Ok(())
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        role: model.role,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(validate_password_strength("Str0ng!pass").is_ok());
    }

    #[test]
    fn short_password_fails() {
        assert!(validate_password_strength("S1!a").is_err());
    }

    #[test]
    fn password_without_digit_fails() {
        assert!(validate_password_strength("NoDigits!here").is_err());
    }

    #[test]
    fn password_without_special_char_fails() {
        assert!(validate_password_strength("OnlyAlnum123").is_err());
    }

    #[test]
    fn password_without_uppercase_fails() {
        assert!(validate_password_strength("all1ower!case").is_err());
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Str0ng!pass").unwrap();
        assert!(verify_password("Str0ng!pass", &hash).unwrap());
        assert!(!verify_password("WrongPass1!", &hash).unwrap());
    }
}
