use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        orders::{OrderList, OrderWithItems},
        payments::{PaymentList, RefundRequestList},
        users::{UpdateUserRoleRequest, UserList},
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        payments::{Column as PaymentCol, Entity as Payments},
        refund_requests::{Column as RefundCol, Entity as RefundRequests},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_moderator},
    models::{User, is_valid_role},
    response::{ApiResponse, Meta},
    routes::params::{AdminOrderQuery, AdminPaymentQuery, Pagination, RefundQueueQuery, SortOrder},
    services::{
        auth_service::user_from_entity,
        order_service::{order_from_entity, order_item_from_entity},
        payment_service::refund_from_entity,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: AdminOrderQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_moderator(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(created_from) = query.created_from {
        condition = condition.add(OrderCol::CreatedAt.gte(created_from));
    }
    if let Some(created_to) = query.created_to {
        condition = condition.add(OrderCol::CreatedAt.lte(created_to));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
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
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_moderator(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity);
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

    let data = OrderWithItems { order, items };
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

pub async fn list_all_payments(
    state: &AppState,
    user: &AuthUser,
    query: AdminPaymentQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    ensure_moderator(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::Status.eq(status.clone()));
    }
    if let Some(user_id) = query.user_id {
        condition = condition.add(PaymentCol::UserId.eq(user_id));
    }
    if let Some(created_from) = query.created_from {
        condition = condition.add(PaymentCol::CreatedAt.gte(created_from));
    }
    if let Some(created_to) = query.created_to {
        condition = condition.add(PaymentCol::CreatedAt.lte(created_to));
    }

    let finder = Payments::find()
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|payment| crate::dto::payments::PaymentDto {
            id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status,
            created_at: payment.created_at.with_timezone(&Utc),
            movies: Vec::new(),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Payments", PaymentList { items }, Some(meta)))
}

pub async fn list_refund_requests(
    state: &AppState,
    user: &AuthUser,
    query: RefundQueueQuery,
) -> AppResult<ApiResponse<RefundRequestList>> {
    ensure_moderator(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(RefundCol::Status.eq(status.clone()));
    }

    let finder = RefundRequests::find()
        .filter(condition)
        .order_by_asc(RefundCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(refund_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Refund requests",
        RefundRequestList { items },
        Some(meta),
    ))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_asc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn update_user_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    if !is_valid_role(&payload.role) {
        return Err(AppError::BadRequest("Invalid role".into()));
    }
    if user.user_id == id {
        return Err(AppError::BadRequest("You cannot change your own role".into()));
    }

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    active.role = Set(payload.role.clone());
    let updated = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "user_role_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": id, "role": payload.role })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Role updated",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}
