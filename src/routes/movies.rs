use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::movies::{
        CommentList, CreateCommentRequest, CreateMovieRequest, DeleteMovieResponse, LikeResponse,
        MovieDetail, MovieList, RateMovieRequest, UpdateMovieRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Comment, Movie},
    response::ApiResponse,
    routes::params::{MovieQuery, Pagination},
    services::{comment_service, movie_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movies).post(create_movie))
        .route("/{id}", get(get_movie))
        .route("/{id}", put(update_movie))
        .route("/{id}", delete(delete_movie))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/rating", post(rate_movie))
        .route("/{id}/comments", get(list_comments).post(create_comment))
}

#[utoipa::path(
    get,
    path = "/api/movies",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("search" = Option<String>, Query, description = "Match title, description or actor name"),
        ("genre" = Option<String>, Query, description = "Filter by genre name"),
        ("year" = Option<i32>, Query, description = "Filter by release year"),
        ("min_rating" = Option<f64>, Query, description = "Minimum IMDb rating"),
        ("max_rating" = Option<f64>, Query, description = "Maximum IMDb rating"),
        ("certification" = Option<String>, Query, description = "Filter by certification"),
        ("sort_by" = Option<String>, Query, description = "Sort by: price, year, rating, votes, created_at"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc"),
    ),
    responses(
        (status = 200, description = "List movies", body = ApiResponse<MovieList>),
        (status = 404, description = "Movies not found"),
    ),
    tag = "Movies"
)]
pub async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<MovieQuery>,
) -> AppResult<Json<ApiResponse<MovieList>>> {
    let resp = movie_service::list_movies(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/movies/{id}",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    responses(
        (status = 200, description = "Movie detail", body = ApiResponse<MovieDetail>),
        (status = 404, description = "Movie not found"),
    ),
    tag = "Movies"
)]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MovieDetail>>> {
    let resp = movie_service::get_movie(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/movies",
    request_body = CreateMovieRequest,
    responses(
        (status = 201, description = "Create movie", body = ApiResponse<Movie>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn create_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateMovieRequest>,
) -> AppResult<Json<ApiResponse<Movie>>> {
    let resp = movie_service::create_movie(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/movies/{id}",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    request_body = UpdateMovieRequest,
    responses(
        (status = 200, description = "Updated movie", body = ApiResponse<Movie>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Movie not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn update_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMovieRequest>,
) -> AppResult<Json<ApiResponse<Movie>>> {
    let resp = movie_service::update_movie(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/movies/{id}",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    responses(
        (status = 200, description = "Deleted movie", body = ApiResponse<DeleteMovieResponse>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Movie not found"),
        (status = 409, description = "Movie is purchased or referenced by orders"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn delete_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeleteMovieResponse>>> {
    let resp = movie_service::delete_movie(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/movies/{id}/like",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    responses(
        (status = 200, description = "Like toggled", body = ApiResponse<LikeResponse>),
        (status = 404, description = "Movie not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let resp = movie_service::toggle_like(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/movies/{id}/rating",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    request_body = RateMovieRequest,
    responses(
        (status = 200, description = "Rating saved"),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Movie not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn rate_movie(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateMovieRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = movie_service::rate_movie(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/movies/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Movie ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "List comments", body = ApiResponse<CommentList>),
        (status = 404, description = "Movie not found"),
    ),
    tag = "Movies"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CommentList>>> {
    let resp = comment_service::list_comments(&state, id, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/movies/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Movie ID")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = ApiResponse<Comment>),
        (status = 400, description = "Empty body or bad parent"),
        (status = 404, description = "Movie not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Movies"
)]
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    let resp = comment_service::create_comment(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
