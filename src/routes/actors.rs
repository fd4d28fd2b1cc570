use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    dto::movies::{ActorList, CreateActorRequest},
    entity::actors::{ActiveModel as ActorActive, Column as ActorCol, Entity as Actors},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Actor,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_actors).post(create_actor))
        .route("/{id}", delete(delete_actor))
}

#[utoipa::path(
    get,
    path = "/api/actors",
    responses(
        (status = 200, description = "List actors", body = ApiResponse<ActorList>)
    ),
    tag = "Catalog"
)]
pub async fn list_actors(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ActorList>>> {
    let items = Actors::find()
        .order_by_asc(ActorCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|a| Actor { id: a.id, name: a.name })
        .collect();

    Ok(Json(ApiResponse::success(
        "Actors",
        ActorList { items },
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/actors",
    request_body = CreateActorRequest,
    responses(
        (status = 201, description = "Create actor", body = ApiResponse<Actor>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Actor already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_actor(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateActorRequest>,
) -> AppResult<Json<ApiResponse<Actor>>> {
    ensure_admin(&user)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }

    let exist = Actors::find()
        .filter(ActorCol::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Actor already exists".into()));
    }

    let actor = ActorActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
    }
    .insert(&state.orm)
    .await?;

    Ok(Json(ApiResponse::success(
        "Actor created",
        Actor {
            id: actor.id,
            name: actor.name,
        },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/actors/{id}",
    params(
        ("id" = Uuid, Path, description = "Actor ID")
    ),
    responses(
        (status = 200, description = "Deleted actor"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Actor not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_actor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;

    let result = Actors::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Json(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}
