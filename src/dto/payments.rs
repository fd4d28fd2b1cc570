use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::RefundRequest;

#[derive(Debug, Serialize, ToSchema)]
pub struct PayOrderResponse {
    pub payment_id: Uuid,
    pub checkout_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentDto {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub movies: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentList {
    pub items: Vec<PaymentDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRefundRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundDecisionRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundRequestList {
    pub items: Vec<RefundRequest>,
}
