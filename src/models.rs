use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub duration_min: i32,
    pub imdb_rating: f64,
    pub votes: i32,
    pub price: i64,
    pub certification: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Favorite {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub movie_id: Uuid,
    pub price_at_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundRequest {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Order lifecycle. Stored as text in the database; every status change in
/// the services goes through [`OrderStatus::can_transition`] so a paid order
/// can never be flipped to canceled outside the refund path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        }
    }

    /// Direct transitions a request handler may perform.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Pending, Self::Canceled)
        )
    }

    /// The one exception to the monotonic lifecycle: an approved refund
    /// cancels a paid order.
    pub fn can_transition_via_refund(self, next: OrderStatus) -> bool {
        matches!((self, next), (Self::Paid, Self::Canceled))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Successful,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "successful" => Some(Self::Successful),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Successful)
                | (Self::Pending, Self::Cancelled)
                | (Self::Successful, Self::Refunded)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
}

impl RefundStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_MODERATOR: &str = "moderator";
pub const ROLE_ADMIN: &str = "admin";

pub fn is_valid_role(role: &str) -> bool {
    matches!(role, ROLE_USER | ROLE_MODERATOR | ROLE_ADMIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_order_can_be_paid_or_canceled() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Canceled));
    }

    #[test]
    fn paid_order_cannot_be_canceled_directly() {
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Canceled));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn refund_is_the_only_path_from_paid_to_canceled() {
        assert!(OrderStatus::Paid.can_transition_via_refund(OrderStatus::Canceled));
        assert!(!OrderStatus::Pending.can_transition_via_refund(OrderStatus::Canceled));
        assert!(!OrderStatus::Canceled.can_transition_via_refund(OrderStatus::Canceled));
    }

    #[test]
    fn canceled_order_is_terminal() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Canceled,
        ] {
            assert!(!OrderStatus::Canceled.can_transition(next));
        }
    }

    #[test]
    fn payment_status_roundtrip_and_guards() {
        assert_eq!(
            PaymentStatus::parse("successful"),
            Some(PaymentStatus::Successful)
        );
        assert_eq!(PaymentStatus::parse("nope"), None);
        assert!(PaymentStatus::Pending.can_transition(PaymentStatus::Successful));
        assert!(PaymentStatus::Successful.can_transition(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Cancelled.can_transition(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition(PaymentStatus::Successful));
    }

    #[test]
    fn order_status_parse_matches_as_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Canceled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
    }
}
