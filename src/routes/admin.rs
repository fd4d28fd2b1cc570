use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{OrderList, OrderWithItems},
        payments::{PaymentList, RefundDecisionRequest, RefundRequestList},
        users::{UpdateUserRoleRequest, UserList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{RefundRequest, User},
    response::ApiResponse,
    routes::params::{AdminOrderQuery, AdminPaymentQuery, Pagination, RefundQueueQuery},
    services::{admin_service, payment_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/payments", get(list_all_payments))
        .route("/refund-requests", get(list_refund_requests))
        .route("/refund-requests/{id}/decide", post(decide_refund_request))
        .route("/users", get(list_users))
        .route("/users/{id}/role", patch(update_user_role))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("user_id" = Option<Uuid>, Query, description = "Filter by user"),
        ("created_from" = Option<String>, Query, description = "Created after (RFC 3339)"),
        ("created_to" = Option<String>, Query, description = "Created before (RFC 3339)"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "All orders (moderator)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminOrderQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Any order with items (moderator)", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/payments",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("user_id" = Option<Uuid>, Query, description = "Filter by user"),
        ("created_from" = Option<String>, Query, description = "Created after (RFC 3339)"),
        ("created_to" = Option<String>, Query, description = "Created before (RFC 3339)")
    ),
    responses(
        (status = 200, description = "All payments (moderator)", body = ApiResponse<PaymentList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminPaymentQuery>,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = admin_service::list_all_payments(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/refund-requests",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status")
    ),
    responses(
        (status = 200, description = "Refund request queue (moderator)", body = ApiResponse<RefundRequestList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_refund_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RefundQueueQuery>,
) -> AppResult<Json<ApiResponse<RefundRequestList>>> {
    let resp = admin_service::list_refund_requests(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/refund-requests/{id}/decide",
    params(
        ("id" = Uuid, Path, description = "Refund request ID")
    ),
    request_body = RefundDecisionRequest,
    responses(
        (status = 200, description = "Refund decided", body = ApiResponse<RefundRequest>),
        (status = 400, description = "Already decided or not refundable"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn decide_refund_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundDecisionRequest>,
) -> AppResult<Json<ApiResponse<RefundRequest>>> {
    let resp = payment_service::decide_refund_request(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "All users (admin only)", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = admin_service::list_users(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid role"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = admin_service::update_user_role(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
