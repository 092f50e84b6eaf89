use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Residence {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub syndic_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Balances {
    pub cash_on_hand: Decimal,
    pub bank_balance: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub residence: Residence,
    pub balances: Balances,
    pub currency: String,
    pub residents_count: i64,
    pub unpaid_total: Decimal,
    pub overdue_count: i64,
    pub open_incidents: i64,
    pub unresolved_complaints: i64,
}
