use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, RelationTrait,
    QuerySelect, Set,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartCol, Entity as CartItems},
        movies::Entity as Movies,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::Column as OrderCol,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_moderator},
    models::{CartItem, Movie, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

#[derive(FromRow)]
struct CartWithMovieRow {
    cart_id: Uuid,
    added_at: DateTime<Utc>,
    movie_id: Uuid,
    title: String,
    description: String,
    year: i32,
    duration_min: i32,
    imdb_rating: f64,
    votes: i32,
    price: i64,
    certification: Option<String>,
    is_available: bool,
    created_at: DateTime<Utc>,
}

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    cart_for_user(state, user.user_id, pagination).await
}

/// Moderators can inspect any user's cart.
pub async fn get_user_cart(
    state: &AppState,
    user: &AuthUser,
    user_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    ensure_moderator(user)?;
    cart_for_user(state, user_id, pagination).await
}

async fn cart_for_user(
    state: &AppState,
    user_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CartWithMovieRow>(
        r#"
        SELECT ci.id AS cart_id, ci.added_at,
               m.id AS movie_id, m.title, m.description, m.year, m.duration_min,
               m.imdb_rating, m.votes, m.price, m.certification, m.is_available,
               m.created_at
        FROM cart_items ci
        JOIN movies m ON m.id = ci.movie_id
        WHERE ci.user_id = $1
        ORDER BY ci.added_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            movie: Movie {
                id: row.movie_id,
                title: row.title,
                description: row.description,
                year: row.year,
                duration_min: row.duration_min,
                imdb_rating: row.imdb_rating,
                votes: row.votes,
                price: row.price,
                certification: row.certification,
                is_available: row.is_available,
                created_at: row.created_at,
            },
            added_at: row.added_at,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let movie = Movies::find_by_id(payload.movie_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !movie.is_available {
        return Err(AppError::BadRequest(
            "Movie is not available for purchase".into(),
        ));
    }

    if has_purchased(state, user.user_id, payload.movie_id).await? {
        return Err(AppError::BadRequest(
            "You have already bought this movie.".into(),
        ));
    }

    let exist = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::MovieId.eq(payload.movie_id))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Movie is already in the cart.".into()));
    }

    let cart_item = CartItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        movie_id: Set(payload.movie_id),
        added_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "movie_id": payload.movie_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!("{} added to cart successfully", movie.title),
        CartItem {
            id: cart_item.id,
            movie_id: cart_item.movie_id,
            user_id: cart_item.user_id,
            added_at: cart_item.added_at.with_timezone(&Utc),
        },
        None,
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    movie_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let exist = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::MovieId.eq(movie_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    CartItems::delete_by_id(exist.id).exec(&state.orm).await?;

    let movie_title = Movies::find_by_id(movie_id)
        .one(&state.orm)
        .await?
        .map(|m| m.title)
        .unwrap_or_else(|| "Unknown movie".to_string());
    if let Some(account) = Users::find_by_id(user.user_id).one(&state.orm).await? {
        if let Err(err) = state
            .mailer
            .send_cart_removal_email(&account.email, &movie_title)
            .await
        {
            tracing::warn!(error = %err, "cart removal email failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "movie_id": movie_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// A movie counts as purchased when it appears on any of the user's paid
/// orders.
pub async fn has_purchased(
    state: &AppState,
    user_id: Uuid,
    movie_id: Uuid,
) -> AppResult<bool> {
    let count = OrderItems::find()
        .join(
            sea_orm::JoinType::InnerJoin,
            crate::entity::order_items::Relation::Orders.def(),
        )
        .filter(OrderItemCol::MovieId.eq(movie_id))
        .filter(OrderCol::UserId.eq(user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Paid.as_str()))
        .count(&state.orm)
        .await?;
    Ok(count > 0)
}
