use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::movies::{
        CreateMovieRequest, DeleteMovieResponse, LikeResponse, MovieDetail, MovieList,
        RateMovieRequest, UpdateMovieRequest,
    },
    entity::{
        actors::{Column as ActorCol, Entity as Actors},
        cart_items::{Column as CartCol, Entity as CartItems},
        genres::{Column as GenreCol, Entity as Genres},
        likes::{ActiveModel as LikeActive, Column as LikeCol, Entity as Likes},
        movie_actors::{ActiveModel as MovieActorActive, Column as MovieActorCol, Entity as MovieActors},
        movie_genres::{ActiveModel as MovieGenreActive, Column as MovieGenreCol, Entity as MovieGenres},
        movies::{ActiveModel as MovieActive, Column as MovieCol, Entity as Movies, Model as MovieModel},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol},
        ratings::{ActiveModel as RatingActive, Column as RatingCol, Entity as Ratings},
        favorites::{Column as FavoriteCol, Entity as Favorites},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Actor, Genre, Movie, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{MovieQuery, MovieSortBy, SortOrder},
    state::AppState,
};

pub async fn list_movies(
    state: &AppState,
    query: MovieQuery,
) -> AppResult<ApiResponse<MovieList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);

        // Movies by matching actor names; two queries keep the main
        // statement free of joins.
        let actor_ids: Vec<Uuid> = Actors::find()
            .filter(Expr::col(ActorCol::Name).ilike(pattern.clone()))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        let movie_ids_by_actor: Vec<Uuid> = if actor_ids.is_empty() {
            Vec::new()
        } else {
            MovieActors::find()
                .filter(MovieActorCol::ActorId.is_in(actor_ids))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|link| link.movie_id)
                .collect()
        };

        let mut search_condition = Condition::any()
            .add(Expr::col(MovieCol::Title).ilike(pattern.clone()))
            .add(Expr::col(MovieCol::Description).ilike(pattern));
        if !movie_ids_by_actor.is_empty() {
            search_condition = search_condition.add(MovieCol::Id.is_in(movie_ids_by_actor));
        }
        condition = condition.add(search_condition);
    }

    if let Some(genre) = query.genre.as_ref().filter(|g| !g.is_empty()) {
        let genre_record = Genres::find()
            .filter(GenreCol::Name.eq(genre.as_str()))
            .one(&state.orm)
            .await?;
        let movie_ids: Vec<Uuid> = match genre_record {
            Some(g) => MovieGenres::find()
                .filter(MovieGenreCol::GenreId.eq(g.id))
                .all(&state.orm)
                .await?
                .into_iter()
                .map(|link| link.movie_id)
                .collect(),
            None => Vec::new(),
        };
        condition = condition.add(MovieCol::Id.is_in(movie_ids));
    }

    if let Some(year) = query.year {
        condition = condition.add(MovieCol::Year.eq(year));
    }
    if let Some(min_rating) = query.min_rating {
        condition = condition.add(MovieCol::ImdbRating.gte(min_rating));
    }
    if let Some(max_rating) = query.max_rating {
        condition = condition.add(MovieCol::ImdbRating.lte(max_rating));
    }
    if let Some(certification) = query.certification.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(MovieCol::Certification.eq(certification.clone()));
    }

    let sort_by = query.sort_by.unwrap_or(MovieSortBy::Year);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        MovieSortBy::Price => MovieCol::Price,
        MovieSortBy::Year => MovieCol::Year,
        MovieSortBy::Rating => MovieCol::ImdbRating,
        MovieSortBy::Votes => MovieCol::Votes,
        MovieSortBy::CreatedAt => MovieCol::CreatedAt,
    };

    let mut finder = Movies::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    if total == 0 {
        return Err(AppError::NotFound);
    }

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(movie_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Movies", MovieList { items }, Some(meta)))
}

pub async fn get_movie(state: &AppState, id: Uuid) -> AppResult<ApiResponse<MovieDetail>> {
    let movie = Movies::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let genres: Vec<Genre> = movie
        .find_related(Genres)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|g| Genre { id: g.id, name: g.name })
        .collect();

    let actors: Vec<Actor> = movie
        .find_related(Actors)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|a| Actor { id: a.id, name: a.name })
        .collect();

    let ratings: Vec<i32> = Ratings::find()
        .filter(RatingCol::MovieId.eq(id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let rating_count = ratings.len() as i64;
    let rating_avg = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<i32>() as f64 / rating_count as f64)
    };

    let like_count = Likes::find()
        .filter(LikeCol::MovieId.eq(id))
        .count(&state.orm)
        .await? as i64;
    let favorite_count = Favorites::find()
        .filter(FavoriteCol::MovieId.eq(id))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "Movie",
        MovieDetail {
            movie: movie_from_entity(movie),
            genres,
            actors,
            rating_avg,
            rating_count,
            like_count,
            favorite_count,
        },
        None,
    ))
}

pub async fn create_movie(
    state: &AppState,
    user: &AuthUser,
    payload: CreateMovieRequest,
) -> AppResult<ApiResponse<Movie>> {
    ensure_admin(user)?;

    if payload.price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let txn = state.orm.begin().await?;

    let movie = MovieActive {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        description: Set(payload.description),
        year: Set(payload.year),
        duration_min: Set(payload.duration_min),
        imdb_rating: Set(payload.imdb_rating),
        votes: Set(payload.votes.unwrap_or(0)),
        price: Set(payload.price),
        certification: Set(payload.certification),
        is_available: Set(true),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    link_genres(&txn, movie.id, &payload.genre_ids).await?;
    link_actors(&txn, movie.id, &payload.actor_ids).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "movie_create",
        Some("movies"),
        Some(serde_json::json!({ "movie_id": movie.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Movie created",
        movie_from_entity(movie),
        Some(Meta::empty()),
    ))
}

pub async fn update_movie(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateMovieRequest,
) -> AppResult<ApiResponse<Movie>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let existing = Movies::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: MovieActive = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    if let Some(duration_min) = payload.duration_min {
        active.duration_min = Set(duration_min);
    }
    if let Some(imdb_rating) = payload.imdb_rating {
        active.imdb_rating = Set(imdb_rating);
    }
    if let Some(votes) = payload.votes {
        active.votes = Set(votes);
    }
    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::BadRequest("price must not be negative".into()));
        }
        active.price = Set(price);
    }
    if let Some(certification) = payload.certification {
        active.certification = Set(Some(certification));
    }
    if let Some(is_available) = payload.is_available {
        active.is_available = Set(is_available);
    }
    let movie = active.update(&txn).await?;

    if let Some(genre_ids) = payload.genre_ids {
        MovieGenres::delete_many()
            .filter(MovieGenreCol::MovieId.eq(movie.id))
            .exec(&txn)
            .await?;
        link_genres(&txn, movie.id, &genre_ids).await?;
    }
    if let Some(actor_ids) = payload.actor_ids {
        MovieActors::delete_many()
            .filter(MovieActorCol::MovieId.eq(movie.id))
            .exec(&txn)
            .await?;
        link_actors(&txn, movie.id, &actor_ids).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "movie_update",
        Some("movies"),
        Some(serde_json::json!({ "movie_id": movie.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        movie_from_entity(movie),
        Some(Meta::empty()),
    ))
}

/// Delete a movie. A movie that was ever purchased stays; a movie sitting in
/// carts is pulled out of them and the owners are notified.
pub async fn delete_movie(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<DeleteMovieResponse>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let movie = Movies::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let paid_references = OrderItems::find()
        .join(
            sea_orm::JoinType::InnerJoin,
            crate::entity::order_items::Relation::Orders.def(),
        )
        .filter(OrderItemCol::MovieId.eq(id))
        .filter(OrderCol::Status.eq(OrderStatus::Paid.as_str()))
        .count(&txn)
        .await?;
    if paid_references > 0 {
        return Err(AppError::Conflict(
            "Movie has been purchased and cannot be deleted.".into(),
        ));
    }

    let order_references = OrderItems::find()
        .filter(OrderItemCol::MovieId.eq(id))
        .count(&txn)
        .await?;
    if order_references > 0 {
        return Err(AppError::Conflict(
            "Movie is referenced by existing orders and cannot be deleted.".into(),
        ));
    }

    let cart_rows = CartItems::find()
        .filter(CartCol::MovieId.eq(id))
        .all(&txn)
        .await?;
    let carts_touched = cart_rows.len() as i64;

    let affected_user_ids: Vec<Uuid> = cart_rows.iter().map(|row| row.user_id).collect();
    let affected_emails: Vec<String> = if affected_user_ids.is_empty() {
        Vec::new()
    } else {
        Users::find()
            .filter(crate::entity::users::Column::Id.is_in(affected_user_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|u| u.email)
            .collect()
    };

    CartItems::delete_many()
        .filter(CartCol::MovieId.eq(id))
        .exec(&txn)
        .await?;

    let movie_title = movie.title.clone();
    Movies::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    for email in &affected_emails {
        if let Err(err) = state.mailer.send_movie_retired_email(email, &movie_title).await {
            tracing::warn!(error = %err, "movie retired email failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "movie_delete",
        Some("movies"),
        Some(serde_json::json!({ "movie_id": id, "carts_touched": carts_touched })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        DeleteMovieResponse { carts_touched },
        Some(Meta::empty()),
    ))
}

pub async fn toggle_like(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<LikeResponse>> {
    Movies::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = Likes::find()
        .filter(LikeCol::UserId.eq(user.user_id))
        .filter(LikeCol::MovieId.eq(id))
        .one(&state.orm)
        .await?;

    let liked = match existing {
        Some(like) => {
            Likes::delete_by_id(like.id).exec(&state.orm).await?;
            false
        }
        None => {
            LikeActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                movie_id: Set(id),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
            true
        }
    };

    let like_count = Likes::find()
        .filter(LikeCol::MovieId.eq(id))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success(
        "OK",
        LikeResponse { liked, like_count },
        None,
    ))
}

pub async fn rate_movie(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RateMovieRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !(1..=10).contains(&payload.rating) {
        return Err(AppError::BadRequest("rating must be between 1 and 10".into()));
    }

    Movies::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = Ratings::find()
        .filter(RatingCol::UserId.eq(user.user_id))
        .filter(RatingCol::MovieId.eq(id))
        .one(&state.orm)
        .await?;

    match existing {
        Some(rating) => {
            let mut active: RatingActive = rating.into();
            active.rating = Set(payload.rating);
            active.update(&state.orm).await?;
        }
        None => {
            RatingActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                movie_id: Set(id),
                rating: Set(payload.rating),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
        }
    }

    Ok(ApiResponse::success(
        "Rating saved",
        serde_json::json!({ "rating": payload.rating }),
        Some(Meta::empty()),
    ))
}

async fn link_genres<C: sea_orm::ConnectionTrait>(
    conn: &C,
    movie_id: Uuid,
    genre_ids: &[Uuid],
) -> AppResult<()> {
    if genre_ids.is_empty() {
        return Ok(());
    }
    let known = Genres::find()
        .filter(GenreCol::Id.is_in(genre_ids.to_vec()))
        .count(conn)
        .await?;
    if known as usize != genre_ids.len() {
        return Err(AppError::BadRequest("Unknown genre id".into()));
    }
    for genre_id in genre_ids {
        MovieGenreActive {
            movie_id: Set(movie_id),
            genre_id: Set(*genre_id),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn link_actors<C: sea_orm::ConnectionTrait>(
    conn: &C,
    movie_id: Uuid,
    actor_ids: &[Uuid],
) -> AppResult<()> {
    if actor_ids.is_empty() {
        return Ok(());
    }
    let known = Actors::find()
        .filter(ActorCol::Id.is_in(actor_ids.to_vec()))
        .count(conn)
        .await?;
    if known as usize != actor_ids.len() {
        return Err(AppError::BadRequest("Unknown actor id".into()));
    }
    for actor_id in actor_ids {
        MovieActorActive {
            movie_id: Set(movie_id),
            actor_id: Set(*actor_id),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

pub fn movie_from_entity(model: MovieModel) -> Movie {
    Movie {
        id: model.id,
        title: model.title,
        description: model.description,
        year: model.year,
        duration_min: model.duration_min,
        imdb_rating: model.imdb_rating,
        votes: model.votes,
        price: model.price,
        certification: model.certification,
        is_available: model.is_available,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
