use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// A cart entry that did not make it into the order, with the reason shown
/// to the user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExcludedItem {
    pub movie_id: Uuid,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub excluded: Vec<ExcludedItem>,
}
