use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::favorites::{AddFavoriteRequest, FavoriteMovieList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Favorite,
    response::ApiResponse,
    routes::params::MovieQuery,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites).post(add_favorite))
        .route("/{movie_id}", delete(remove_favorite))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("search" = Option<String>, Query, description = "Match title or description"),
        ("year" = Option<i32>, Query, description = "Filter by release year"),
    ),
    responses(
        (status = 200, description = "List favorite movies", body = ApiResponse<FavoriteMovieList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MovieQuery>,
) -> AppResult<Json<ApiResponse<FavoriteMovieList>>> {
    let resp = favorite_service::list_favorites(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = AddFavoriteRequest,
    responses(
        (status = 200, description = "Add favorite", body = ApiResponse<Favorite>),
        (status = 404, description = "Movie not found"),
        (status = 409, description = "Already in favorites"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> AppResult<Json<ApiResponse<Favorite>>> {
    let resp = favorite_service::add_favorite(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{movie_id}",
    params(
        ("movie_id" = Uuid, Path, description = "Movie ID")
    ),
    responses(
        (status = 200, description = "Removed favorite"),
        (status = 404, description = "Favorite not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(movie_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = favorite_service::remove_favorite(&state, &user, movie_id).await?;
    Ok(Json(resp))
}
