use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MovieSortBy {
    Price,
    Year,
    Rating,
    Votes,
    CreatedAt,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MovieQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub certification: Option<String>,
    pub sort_by: Option<MovieSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminPaymentQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundQueueQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let pagination = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(pagination.normalize(), (1, 20, 0));
    }

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let pagination = Pagination {
            page: Some(-4),
            per_page: Some(10_000),
        };
        let (page, per_page, offset) = pagination.normalize();
        assert_eq!(page, 1);
        assert_eq!(per_page, 100);
        assert_eq!(offset, 0);
    }

    #[test]
    fn pagination_offset_is_page_based() {
        let pagination = Pagination {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(pagination.normalize(), (3, 25, 50));
    }
}
