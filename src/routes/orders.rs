use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{CheckoutResponse, OrderList, OrderWithItems},
        payments::PayOrderResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{order_service, payment_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/pay", post(pay_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List own orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    responses(
        (status = 201, description = "Checkout the cart into a pending order", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Cart empty or no movies available for order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let resp = order_service::checkout(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Own order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order canceled", body = ApiResponse<Order>),
        (status = 400, description = "Order is paid or already canceled"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/pay",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Checkout session created", body = ApiResponse<PayOrderResponse>),
        (status = 400, description = "Order is not payable"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PayOrderResponse>>> {
    let resp = payment_service::pay_order(&state, &user, id).await?;
    Ok(Json(resp))
}
