use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        CreateRefundRequest, PayOrderResponse, PaymentDto, PaymentList, RefundDecisionRequest,
    },
    entity::{
        movies::{Column as MovieCol, Entity as Movies},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        refund_requests::{
            ActiveModel as RefundActive, Column as RefundCol, Entity as RefundRequests,
            Model as RefundModel,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    gateway::WebhookEvent,
    middleware::auth::{AuthUser, ensure_moderator},
    models::{OrderStatus, PaymentStatus, RefundRequest, RefundStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Open a gateway checkout session for a pending order. The payment row is
/// recorded as pending and resolved later by the webhook.
pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PayOrderResponse>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
    if status != OrderStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Order in status '{}' is not payable",
            order.status
        )));
    }

    // Line items for the checkout page: title and price at order time.
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    let movie_ids: Vec<Uuid> = items.iter().map(|item| item.movie_id).collect();
    let movies = Movies::find()
        .filter(MovieCol::Id.is_in(movie_ids))
        .all(&state.orm)
        .await?;
    let line_items: Vec<(String, i64)> = items
        .iter()
        .map(|item| {
            let title = movies
                .iter()
                .find(|movie| movie.id == item.movie_id)
                .map(|movie| movie.title.clone())
                .unwrap_or_else(|| "Movie".to_string());
            (title, item.price_at_order)
        })
        .collect();

    let session = state
        .gateway
        .create_checkout_session(order.id, &line_items)
        .await?;

    // Re-trying payment replaces the stale session on the open payment row.
    let existing = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending.as_str()))
        .one(&state.orm)
        .await?;

    let payment = match existing {
        Some(payment) => {
            let mut active: PaymentActive = payment.into();
            active.external_session_id = Set(session.id.clone());
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
        None => {
            PaymentActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                order_id: Set(order.id),
                amount: Set(order.total_amount),
                status: Set(PaymentStatus::Pending.as_str().into()),
                external_session_id: Set(session.id.clone()),
                external_payment_id: Set(None),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_started",
        Some("payments"),
        Some(serde_json::json!({ "order_id": order.id, "payment_id": payment.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Redirect to the payment gateway to complete the purchase",
        PayOrderResponse {
            payment_id: payment.id,
            checkout_url: session.url,
        },
        Some(Meta::empty()),
    ))
}

/// Gateway callback. The gateway is the source of truth for payment
/// success; a completed session marks the payment successful and the order
/// paid, an expired session cancels the pending payment.
pub async fn handle_webhook(
    state: &AppState,
    body: &[u8],
    signature: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state.gateway.verify_webhook_signature(body, signature)?;

    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload".into()))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            complete_checkout(state, &event.data.object.id, event.data.object.payment_intent)
                .await?;
        }
        "checkout.session.expired" => {
            expire_checkout(state, &event.data.object.id).await?;
        }
        other => {
            tracing::debug!(event_type = %other, "ignoring webhook event");
        }
    }

    Ok(ApiResponse::success(
        "ok",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn complete_checkout(
    state: &AppState,
    session_id: &str,
    payment_intent: Option<String>,
) -> AppResult<()> {
    let txn = state.orm.begin().await?;

    let payment = Payments::find()
        .filter(PaymentCol::ExternalSessionId.eq(session_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let Some(payment) = payment else {
        tracing::warn!(%session_id, "webhook for unknown checkout session");
        return Ok(());
    };

    let payment_status = PaymentStatus::parse(&payment.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt payment status")))?;
    if payment_status == PaymentStatus::Successful {
        // Gateway retries deliver the same event more than once.
        return Ok(());
    }
    if !payment_status.can_transition(PaymentStatus::Successful) {
        tracing::warn!(payment_id = %payment.id, status = %payment.status,
            "completed session for non-pending payment");
        return Ok(());
    }

    let order = Orders::find_by_id(payment.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payment without order")))?;

    let payment_user = payment.user_id;
    let payment_amount = payment.amount;
    let order_id = order.id;

    let mut payment_active: PaymentActive = payment.into();
    payment_active.status = Set(PaymentStatus::Successful.as_str().into());
    payment_active.external_payment_id = Set(payment_intent);
    payment_active.updated_at = Set(Utc::now().into());
    payment_active.update(&txn).await?;

    let order_status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
    if order_status.can_transition(OrderStatus::Paid) {
        let mut order_active: OrderActive = order.into();
        order_active.status = Set(OrderStatus::Paid.as_str().into());
        order_active.updated_at = Set(Utc::now().into());
        order_active.update(&txn).await?;
    } else {
        tracing::warn!(%order_id, status = %order_status.as_str(),
            "payment completed for order that is not pending");
    }

    txn.commit().await?;

    if let Some(account) = Users::find_by_id(payment_user).one(&state.orm).await? {
        if let Err(err) = state
            .mailer
            .send_order_confirmation_email(&account.email, order_id, payment_amount)
            .await
        {
            tracing::warn!(error = %err, "order confirmation email failed");
        }
        if let Err(err) = state
            .mailer
            .send_payment_confirmation_email(&account.email, order_id, payment_amount)
            .await
        {
            tracing::warn!(error = %err, "payment confirmation email failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(payment_user),
        "payment_completed",
        Some("payments"),
        Some(serde_json::json!({ "order_id": order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(())
}

async fn expire_checkout(state: &AppState, session_id: &str) -> AppResult<()> {
    let payment = Payments::find()
        .filter(PaymentCol::ExternalSessionId.eq(session_id))
        .filter(PaymentCol::Status.eq(PaymentStatus::Pending.as_str()))
        .one(&state.orm)
        .await?;
    if let Some(payment) = payment {
        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Cancelled.as_str().into());
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?;
    }
    Ok(())
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Payments::find()
        .filter(PaymentCol::UserId.eq(user.user_id))
        .order_by_desc(PaymentCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let payments = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(payments.len());
    for payment in payments {
        let movies = movie_titles_for_order(state, payment.order_id).await?;
        items.push(payment_dto(payment, movies));
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", PaymentList { items }, Some(meta)))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<PaymentDto>> {
    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if payment.user_id != user.user_id {
        ensure_moderator(user)?;
    }

    let movies = movie_titles_for_order(state, payment.order_id).await?;
    Ok(ApiResponse::success(
        "OK",
        payment_dto(payment, movies),
        Some(Meta::empty()),
    ))
}

pub async fn create_refund_request(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
    payload: CreateRefundRequest,
) -> AppResult<ApiResponse<RefundRequest>> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("A refund reason is required".into()));
    }

    let payment = Payments::find()
        .filter(
            Condition::all()
                .add(PaymentCol::Id.eq(payment_id))
                .add(PaymentCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = PaymentStatus::parse(&payment.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt payment status")))?;
    if status != PaymentStatus::Successful {
        return Err(AppError::BadRequest(
            "Only successful payments can be refunded".into(),
        ));
    }

    let open_request = RefundRequests::find()
        .filter(RefundCol::PaymentId.eq(payment.id))
        .filter(RefundCol::Status.eq(RefundStatus::Pending.as_str()))
        .one(&state.orm)
        .await?;
    if open_request.is_some() {
        return Err(AppError::Conflict(
            "A refund request for this payment is already open".into(),
        ));
    }

    let request = RefundActive {
        id: Set(Uuid::new_v4()),
        payment_id: Set(payment.id),
        user_id: Set(user.user_id),
        reason: Set(payload.reason),
        status: Set(RefundStatus::Pending.as_str().into()),
        created_at: NotSet,
        decided_at: Set(None),
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "refund_requested",
        Some("refund_requests"),
        Some(serde_json::json!({ "payment_id": payment.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Refund request submitted",
        refund_from_entity(request),
        Some(Meta::empty()),
    ))
}

/// Moderator decision on a refund request. Approval refunds the gateway
/// payment, marks the payment refunded and cancels the paid order. This is
/// the only path from paid to canceled.
pub async fn decide_refund_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    payload: RefundDecisionRequest,
) -> AppResult<ApiResponse<RefundRequest>> {
    ensure_moderator(user)?;

    let txn = state.orm.begin().await?;

    let request = RefundRequests::find_by_id(request_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let request_status = RefundStatus::parse(&request.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt refund status")))?;
    if request_status != RefundStatus::Pending {
        return Err(AppError::BadRequest(
            "Refund request has already been decided".into(),
        ));
    }

    let payment = Payments::find_by_id(request.payment_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("refund request without payment")))?;

    let requester = request.user_id;
    let order_id = payment.order_id;

    let decided = if payload.approve {
        let payment_status = PaymentStatus::parse(&payment.status)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt payment status")))?;
        if !payment_status.can_transition(PaymentStatus::Refunded) {
            return Err(AppError::BadRequest(
                "Payment is not in a refundable state".into(),
            ));
        }

        if let Some(payment_intent) = payment.external_payment_id.clone() {
            state.gateway.refund(&payment_intent).await?;
        } else {
            tracing::warn!(payment_id = %payment.id,
                "no gateway payment id recorded, refund recorded locally only");
        }

        let order = Orders::find_by_id(order_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payment without order")))?;
        let order_status = OrderStatus::parse(&order.status)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
        if !order_status.can_transition_via_refund(OrderStatus::Canceled) {
            return Err(AppError::BadRequest(
                "Order is not in a refundable state".into(),
            ));
        }

        let mut payment_active: PaymentActive = payment.into();
        payment_active.status = Set(PaymentStatus::Refunded.as_str().into());
        payment_active.updated_at = Set(Utc::now().into());
        payment_active.update(&txn).await?;

        let mut order_active: OrderActive = order.into();
        order_active.status = Set(OrderStatus::Canceled.as_str().into());
        order_active.updated_at = Set(Utc::now().into());
        order_active.update(&txn).await?;

        RefundStatus::Approved
    } else {
        RefundStatus::Rejected
    };

    let mut request_active: RefundActive = request.into();
    request_active.status = Set(decided.as_str().into());
    request_active.decided_at = Set(Some(Utc::now().into()));
    let request = request_active.update(&txn).await?;

    txn.commit().await?;

    if let Some(account) = Users::find_by_id(requester).one(&state.orm).await? {
        if let Err(err) = state
            .mailer
            .send_refund_decision_email(&account.email, order_id, payload.approve)
            .await
        {
            tracing::warn!(error = %err, "refund decision email failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "refund_decided",
        Some("refund_requests"),
        Some(serde_json::json!({ "request_id": request.id, "approved": payload.approve })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        if payload.approve {
            "Refund approved"
        } else {
            "Refund rejected"
        },
        refund_from_entity(request),
        Some(Meta::empty()),
    ))
}

async fn movie_titles_for_order(state: &AppState, order_id: Uuid) -> AppResult<Vec<String>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?;
    let movie_ids: Vec<Uuid> = items.iter().map(|item| item.movie_id).collect();
    if movie_ids.is_empty() {
        return Ok(Vec::new());
    }
    let titles = Movies::find()
        .filter(MovieCol::Id.is_in(movie_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|movie| movie.title)
        .collect();
    Ok(titles)
}

fn payment_dto(model: PaymentModel, movies: Vec<String>) -> PaymentDto {
    PaymentDto {
        id: model.id,
        order_id: model.order_id,
        amount: model.amount,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        movies,
    }
}

pub fn refund_from_entity(model: RefundModel) -> RefundRequest {
    RefundRequest {
        id: model.id,
        payment_id: model.payment_id,
        user_id: model.user_id,
        reason: model.reason,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        decided_at: model.decided_at.map(|dt| dt.with_timezone(&Utc)),
    }
}
