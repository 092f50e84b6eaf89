use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    Transfer,
    BankTransfer,
    OnlineCard,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "Espèces",
            Self::Check => "Chèque",
            Self::Transfer => "Virement",
            Self::BankTransfer => "Virement bancaire",
            Self::OnlineCard => "Carte en ligne",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub residence_id: Uuid,
    pub fee_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub note: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// DTOs
#[derive(Debug, Deserialize, ToSchema)]
pub struct SettleFeesRequest {
    pub fee_ids: Vec<Uuid>,
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    pub success: bool,
    pub payments: Vec<Payment>,
    pub total: Decimal,
    /// Ссылки на квитанции, только для наличных
    pub receipts: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomPaymentRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CorrectPaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptDocument {
    pub receipt_number: String,
    pub payment_id: Uuid,
    pub residence_name: String,
    pub resident_name: String,
    pub apartment_number: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub fee_title: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub verified_by_name: Option<String>,
    /// PNG в формате data URL
    pub qr_code: String,
}
