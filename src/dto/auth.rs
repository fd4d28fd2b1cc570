use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ActivateRequest {
    pub email: String,
    pub token: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct PasswordResetCompleteRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
