use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    routes::params::Pagination,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart))
        .route("/{movie_id}", delete(remove_from_cart))
        .route("/user/{user_id}", get(user_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List cart items for current user", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cart/user/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Cart owner"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Cart of any user (moderator only)", body = ApiResponse<CartList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn user_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::get_user_cart(&state, &user, user_id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add movie to cart", body = ApiResponse<CartItem>),
        (status = 400, description = "Already purchased or unavailable"),
        (status = 404, description = "Movie not found"),
        (status = 409, description = "Movie already in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{movie_id}",
    params(
        ("movie_id" = Uuid, Path, description = "Movie ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_from_cart(&state, &user, movie_id).await?;
    Ok(Json(resp))
}
