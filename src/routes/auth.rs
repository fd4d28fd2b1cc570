use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{
        ActivateRequest, LoginRequest, LoginResponse, LogoutRequest,
        PasswordResetCompleteRequest, PasswordResetRequest, RegisterRequest,
        TokenRefreshRequest, TokenRefreshResponse,
    },
    error::AppResult,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/activate", post(activate))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/password-reset/request", post(password_reset_request))
        .route("/password-reset/complete", post(password_reset_complete))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 400, description = "Weak password"),
        (status = 409, description = "Email already taken"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/activate",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Activate account"),
        (status = 400, description = "Invalid or expired activation token"),
    ),
    tag = "Auth"
)]
pub async fn activate(
    State(state): State<AppState>,
    Json(payload): Json<ActivateRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::activate_account(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not activated"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<TokenRefreshResponse>),
        (status = 401, description = "Expired or revoked refresh token"),
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<TokenRefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenRefreshResponse>>> {
    let resp = auth_service::refresh_access_token(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logout, refresh token revoked"),
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::logout_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset requested (neutral response)"),
    ),
    tag = "Auth"
)]
pub async fn password_reset_request(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::request_password_reset(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/complete",
    request_body = PasswordResetCompleteRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid email or token"),
    ),
    tag = "Auth"
)]
pub async fn password_reset_complete(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetCompleteRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::complete_password_reset(&state, payload).await?;
    Ok(Json(resp))
}
