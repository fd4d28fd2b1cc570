use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    dto::movies::{CreateGenreRequest, GenreList},
    entity::genres::{ActiveModel as GenreActive, Column as GenreCol, Entity as Genres},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Genre,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_genres).post(create_genre))
        .route("/{id}", delete(delete_genre))
}

#[utoipa::path(
    get,
    path = "/api/genres",
    responses(
        (status = 200, description = "List genres", body = ApiResponse<GenreList>)
    ),
    tag = "Catalog"
)]
pub async fn list_genres(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<GenreList>>> {
    let items = Genres::find()
        .order_by_asc(GenreCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|g| Genre { id: g.id, name: g.name })
        .collect();

    Ok(Json(ApiResponse::success(
        "Genres",
        GenreList { items },
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/genres",
    request_body = CreateGenreRequest,
    responses(
        (status = 201, description = "Create genre", body = ApiResponse<Genre>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Genre already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_genre(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateGenreRequest>,
) -> AppResult<Json<ApiResponse<Genre>>> {
    ensure_admin(&user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }

    let exist = Genres::find()
        .filter(GenreCol::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Genre already exists".into()));
    }

    let genre = GenreActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
    }
    .insert(&state.orm)
    .await?;

    Ok(Json(ApiResponse::success(
        "Genre created",
        Genre {
            id: genre.id,
            name: genre.name,
        },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/genres/{id}",
    params(
        ("id" = Uuid, Path, description = "Genre ID")
    ),
    responses(
        (status = 200, description = "Deleted genre"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Genre not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_genre(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;

    let result = Genres::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}
