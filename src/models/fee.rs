use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "coverage_period_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoveragePeriodType {
    Week,
    Month,
    Year,
}

/// Старый формат периодичности из ранних версий формы
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LegacyFrequency {
    Monthly,
    Quarterly,
    Yearly,
}

/// Отрезок времени, который покрывает один платёж
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoveragePeriod {
    pub value: i32,
    pub kind: CoveragePeriodType,
}

impl From<LegacyFrequency> for CoveragePeriod {
    fn from(frequency: LegacyFrequency) -> Self {
        match frequency {
            LegacyFrequency::Monthly => Self {
                value: 1,
                kind: CoveragePeriodType::Month,
            },
            LegacyFrequency::Quarterly => Self {
                value: 3,
                kind: CoveragePeriodType::Month,
            },
            LegacyFrequency::Yearly => Self {
                value: 1,
                kind: CoveragePeriodType::Year,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FeeRule {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub coverage_period_value: i32,
    pub coverage_period_type: CoveragePeriodType,
    pub start_date: NaiveDate,
    pub next_due_date: NaiveDate,
    pub is_active: bool,
    pub reminder_enabled: bool,
    pub reminder_days_before: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeeRule {
    pub fn coverage(&self) -> CoveragePeriod {
        CoveragePeriod {
            value: self.coverage_period_value,
            kind: self.coverage_period_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "fee_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Unpaid,
    Paid,
    Overdue,
}

impl Default for FeeStatus {
    fn default() -> Self {
        Self::Unpaid
    }
}

impl FeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct FeeInstance {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub user_id: Uuid,
    pub residence_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: FeeStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FeeInstance {
    /// Просрочка вычисляется, в базе хранится только unpaid/paid
    pub fn effective_status(&self, today: NaiveDate) -> FeeStatus {
        match self.status {
            FeeStatus::Unpaid if self.due_date < today => FeeStatus::Overdue,
            status => status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeeResponse {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: FeeStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl FeeResponse {
    pub fn from_instance(fee: FeeInstance, today: NaiveDate) -> Self {
        Self {
            status: fee.effective_status(today),
            id: fee.id,
            rule_id: fee.rule_id,
            user_id: fee.user_id,
            title: fee.title,
            amount: fee.amount,
            due_date: fee.due_date,
            paid_at: fee.paid_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct FeeSummary {
    pub total_due: Decimal,
    pub overdue_count: i64,
    pub paid_total: Decimal,
}

// DTOs
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFeeRuleRequest {
    pub title: String,
    pub amount: Decimal,
    pub coverage_period_value: Option<i32>,
    pub coverage_period_type: Option<CoveragePeriodType>,
    pub frequency: Option<LegacyFrequency>,
    pub start_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub reminder_enabled: bool,
    pub reminder_days_before: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateFeeRuleRequest {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub coverage_period_value: Option<i32>,
    pub coverage_period_type: Option<CoveragePeriodType>,
    pub next_due_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i32>,
}

/// Проверенное правило, готовое к записи
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeeRule {
    pub title: String,
    pub amount: Decimal,
    pub coverage: CoveragePeriod,
    pub start_date: NaiveDate,
    pub next_due_date: NaiveDate,
    pub reminder_enabled: bool,
    pub reminder_days_before: i32,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GenerateFeesRequest {
    /// Дата, относительно которой определяется текущий период
    pub anchor: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationReport {
    pub rule_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeletionAction {
    Deleted,
    Deactivated,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteRuleResponse {
    pub success: bool,
    pub action: DeletionAction,
    pub dependent_fees: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFeeRequest {
    pub user_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReminderReport {
    pub sent: u32,
    pub failed: u32,
}
