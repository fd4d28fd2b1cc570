use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutResponse, ExcludedItem, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        movies::{Column as MovieCol, Entity as Movies},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Snapshot the cart into a pending order. Movies that are no longer
/// available or were purchased since being added are dropped and reported
/// back in the `excluded` list; the rest become immutable order items with
/// their price at order time.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let txn = state.orm.begin().await?;

    let cart_rows = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .all(&txn)
        .await?;

    if cart_rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let movie_ids: Vec<Uuid> = cart_rows.iter().map(|row| row.movie_id).collect();

    let movies = Movies::find()
        .filter(MovieCol::Id.is_in(movie_ids.clone()))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let purchased_ids: Vec<Uuid> = OrderItems::find()
        .select_only()
        .column(OrderItemCol::MovieId)
        .join(
            sea_orm::JoinType::InnerJoin,
            crate::entity::order_items::Relation::Orders.def(),
        )
        .filter(OrderCol::UserId.eq(user.user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Paid.as_str()))
        .filter(OrderItemCol::MovieId.is_in(movie_ids.clone()))
        .into_tuple()
        .all(&txn)
        .await?;

    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for row in &cart_rows {
        let movie = movies.iter().find(|m| m.id == row.movie_id);
        match movie {
            Some(movie) if purchased_ids.contains(&movie.id) => {
                excluded.push(ExcludedItem {
                    movie_id: movie.id,
                    title: movie.title.clone(),
                    reason: "already purchased".into(),
                });
            }
            Some(movie) if !movie.is_available => {
                excluded.push(ExcludedItem {
                    movie_id: movie.id,
                    title: movie.title.clone(),
                    reason: "no longer available".into(),
                });
            }
            Some(movie) => included.push(movie.clone()),
            None => {
                excluded.push(ExcludedItem {
                    movie_id: row.movie_id,
                    title: "Unknown movie".into(),
                    reason: "no longer available".into(),
                });
            }
        }
    }

    if included.is_empty() {
        return Err(AppError::BadRequest("No movies available for order".into()));
    }

    let total_amount: i64 = included.iter().map(|movie| movie.price).sum();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for movie in &included {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            movie_id: Set(movie.id),
            price_at_order: Set(movie.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(item));
    }

    // The cart is consumed by checkout; excluded rows go too, they can
    // never be ordered.
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "excluded": excluded.len(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let message = if excluded.is_empty() {
        "Order created".to_string()
    } else {
        let titles: Vec<&str> = excluded.iter().map(|e| e.title.as_str()).collect();
        format!("Order created; excluded from order: {}", titles.join(", "))
    };

    Ok(ApiResponse::success(
        message,
        CheckoutResponse {
            order: order_from_entity(order),
            items: order_items,
            excluded,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Cancel a pending order. A paid order cannot be flipped here; cancellation
/// after payment goes through the refund request flow.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;

    if status == OrderStatus::Paid {
        return Err(AppError::BadRequest(
            "Paid orders cannot be canceled directly; request a refund instead.".into(),
        ));
    }
    if !status.can_transition(OrderStatus::Canceled) {
        return Err(AppError::BadRequest("Order cannot be canceled".into()));
    }

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Canceled.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    // Any checkout session that was opened for this order is dead now.
    let stale_payments = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending.as_str()))
        .all(&txn)
        .await?;
    for payment in stale_payments {
        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Cancelled.as_str().into());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order canceled successfully",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        movie_id: model.movie_id,
        price_at_order: model.price_at_order,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
