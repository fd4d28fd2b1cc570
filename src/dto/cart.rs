use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Movie;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub movie_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub movie: Movie,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
}
