use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{CreateRefundRequest, PaymentDto, PaymentList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::RefundRequest,
    response::ApiResponse,
    routes::params::Pagination,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/webhook", post(webhook))
        .route("/{id}", get(get_payment))
        .route("/{id}/refund-request", post(create_refund_request))
}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List own payments", body = ApiResponse<PaymentList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = payment_service::list_payments(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(
        ("id" = Uuid, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment detail", body = ApiResponse<PaymentDto>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentDto>>> {
    let resp = payment_service::get_payment(&state, &user, id).await?;
    Ok(Json(resp))
}

/// Gateway callback. Takes the raw body so the signature can be verified
/// over the exact bytes.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body(content = String, description = "Raw webhook payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook processed"),
        (status = 400, description = "Bad signature or payload"),
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok());
    let resp = payment_service::handle_webhook(&state, &body, signature).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund-request",
    params(
        ("id" = Uuid, Path, description = "Payment ID")
    ),
    request_body = CreateRefundRequest,
    responses(
        (status = 201, description = "Refund request submitted", body = ApiResponse<RefundRequest>),
        (status = 400, description = "Payment not refundable"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Refund request already open"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_refund_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateRefundRequest>,
) -> AppResult<Json<ApiResponse<RefundRequest>>> {
    let resp = payment_service::create_refund_request(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
