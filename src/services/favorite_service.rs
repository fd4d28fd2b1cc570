use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::favorites::{AddFavoriteRequest, FavoriteMovieList},
    entity::{
        favorites::{ActiveModel as FavoriteActive, Column as FavoriteCol, Entity as Favorites},
        movies::{Column as MovieCol, Entity as Movies},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Favorite,
    response::{ApiResponse, Meta},
    routes::params::MovieQuery,
    services::movie_service::movie_from_entity,
    state::AppState,
};

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: AddFavoriteRequest,
) -> AppResult<ApiResponse<Favorite>> {
    Movies::find_by_id(payload.movie_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let exist = Favorites::find()
        .filter(FavoriteCol::UserId.eq(user.user_id))
        .filter(FavoriteCol::MovieId.eq(payload.movie_id))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Movie is already in favorites".into()));
    }

    let favorite = FavoriteActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        movie_id: Set(payload.movie_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "favorite_add",
        Some("favorites"),
        Some(serde_json::json!({ "movie_id": payload.movie_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Added to favorites",
        Favorite {
            id: favorite.id,
            movie_id: favorite.movie_id,
            user_id: favorite.user_id,
            created_at: favorite.created_at.with_timezone(&chrono::Utc),
        },
        None,
    ))
}

pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    movie_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Favorites::delete_many()
        .filter(FavoriteCol::UserId.eq(user.user_id))
        .filter(FavoriteCol::MovieId.eq(movie_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "favorite_remove",
        Some("favorites"),
        Some(serde_json::json!({ "movie_id": movie_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// The favorites listing reuses the movie search/sort parameters so the
/// watchlist can be filtered like the catalog.
pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
    query: MovieQuery,
) -> AppResult<ApiResponse<FavoriteMovieList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let favorite_movie_ids: Vec<Uuid> = Favorites::find()
        .filter(FavoriteCol::UserId.eq(user.user_id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|f| f.movie_id)
        .collect();

    let mut condition = Condition::all().add(MovieCol::Id.is_in(favorite_movie_ids));
    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(MovieCol::Title).ilike(pattern.clone()))
                .add(Expr::col(MovieCol::Description).ilike(pattern)),
        );
    }
    if let Some(year) = query.year {
        condition = condition.add(MovieCol::Year.eq(year));
    }

    let finder = Movies::find()
        .filter(condition)
        .order_by_desc(MovieCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(movie_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        FavoriteMovieList { items },
        Some(meta),
    ))
}
