pub mod complaints;
pub mod fee_rules;
pub mod fees;
pub mod incidents;
pub mod payments;
pub mod residences;
pub mod residents;
pub mod uploads;
pub mod users;

use crate::middleware::AppState;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Успешный ответ без данных
#[derive(Serialize, utoipa::ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// (limit, offset), не больше 100 записей на страницу
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        let offset = self.page.unwrap_or(0).max(0).saturating_mul(limit);
        (limit, offset)
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::routes())
        .nest("/residences", residences::routes())
        .nest("/residents", residents::routes())
        .nest("/fee-rules", fee_rules::routes())
        .nest("/fees", fees::routes())
        .nest("/payments", payments::routes())
        .nest("/complaints", complaints::routes())
        .nest("/incidents", incidents::routes())
        .nest("/uploads", uploads::routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination {
            page: Some(2),
            limit: Some(500),
        };
        assert_eq!(p.limit_offset(), (100, 200));

        assert_eq!(Pagination::default().limit_offset(), (20, 0));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let p = Pagination {
            page: Some(i64::MAX),
            limit: Some(50),
        };
        assert_eq!(p.limit_offset(), (50, i64::MAX));

        let negative = Pagination {
            page: Some(i64::MIN),
            limit: None,
        };
        assert_eq!(negative.limit_offset(), (20, 0));
    }
}
