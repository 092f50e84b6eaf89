use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{Pagination, SuccessResponse};
use crate::error::{AppError, AppResult};
use crate::middleware::{ensure_residence_syndic, AppState, AuthContext, Capability};
use crate::models::{CreateFeeRequest, FeeInstance, FeeResponse, FeeStatus, FeeSummary};
use crate::services::{
    billing_service::{check_fee_deletable, summarize_fees},
    ResidentService,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fees).post(create_fee))
        .route("/summary", get(get_summary))
        .route("/:id", get(get_fee).delete(delete_fee))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct FeesQuery {
    /// Только для синдика: взносы конкретного жителя
    pub user_id: Option<Uuid>,
    pub status: Option<FeeStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SummaryQuery {
    pub user_id: Option<Uuid>,
}

/// Житель видит только свои взносы
fn scoped_user(auth: &AuthContext, requested: Option<Uuid>) -> AppResult<Option<Uuid>> {
    if auth.can(Capability::ManageFees) {
        return Ok(requested);
    }
    match requested {
        Some(user_id) if user_id != auth.user_id => Err(AppError::Forbidden),
        _ => Ok(Some(auth.user_id)),
    }
}

async fn load_fee(state: &AppState, auth: &AuthContext, fee_id: Uuid) -> AppResult<FeeInstance> {
    let fee = sqlx::query_as::<_, FeeInstance>("SELECT * FROM fees WHERE id = $1")
        .bind(fee_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Взнос не найден".to_string()))?;

    auth.ensure_same_residence(fee.residence_id)?;
    if fee.user_id != auth.user_id && !auth.can(Capability::ManageFees) {
        return Err(AppError::NotFound("Взнос не найден".to_string()));
    }
    Ok(fee)
}

/// Список взносов
#[utoipa::path(
    get,
    path = "/api/v1/fees",
    tag = "fees",
    security(("bearer_auth" = [])),
    params(FeesQuery),
    responses(
        (status = 200, description = "Список взносов", body = Vec<FeeResponse>),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn list_fees(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<FeesQuery>,
) -> AppResult<Json<Vec<FeeResponse>>> {
    let residence_id = auth.residence()?;
    let user_id = scoped_user(&auth, query.user_id)?;
    let today = Utc::now().date_naive();
    let (limit, offset) = Pagination {
        page: query.page,
        limit: query.limit,
    }
    .limit_offset();

    // overdue в базе не хранится, фильтр повторяет effective_status
    let fees = sqlx::query_as::<_, FeeInstance>(
        r#"
        SELECT * FROM fees
        WHERE residence_id = $1
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::text IS NULL
               OR ($3 = 'paid' AND status = 'paid')
               OR ($3 = 'unpaid' AND status = 'unpaid' AND due_date >= $4)
               OR ($3 = 'overdue' AND status = 'unpaid' AND due_date < $4))
        ORDER BY due_date DESC, created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(residence_id)
    .bind(user_id)
    .bind(query.status.map(|s| s.as_str()))
    .bind(today)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let response = fees
        .into_iter()
        .map(|fee| FeeResponse::from_instance(fee, today))
        .collect();

    Ok(Json(response))
}

/// Итоги: к оплате, просрочено, оплачено
#[utoipa::path(
    get,
    path = "/api/v1/fees/summary",
    tag = "fees",
    security(("bearer_auth" = [])),
    params(SummaryQuery),
    responses(
        (status = 200, description = "Итоги по взносам", body = FeeSummary)
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<FeeSummary>> {
    let residence_id = auth.residence()?;
    let user_id = scoped_user(&auth, query.user_id)?;

    let fees = sqlx::query_as::<_, FeeInstance>(
        "SELECT * FROM fees WHERE residence_id = $1 AND ($2::uuid IS NULL OR user_id = $2)",
    )
    .bind(residence_id)
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(summarize_fees(&fees, Utc::now().date_naive())))
}

/// Разовый взнос для конкретного жителя
#[utoipa::path(
    post,
    path = "/api/v1/fees",
    tag = "fees",
    security(("bearer_auth" = [])),
    request_body = CreateFeeRequest,
    responses(
        (status = 200, description = "Взнос создан", body = FeeResponse),
        (status = 400, description = "Ошибка валидации"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn create_fee(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateFeeRequest>,
) -> AppResult<Json<FeeResponse>> {
    auth.require(Capability::ManageFees)?;
    let residence_id = auth.residence()?;
    ensure_residence_syndic(&state.pool, residence_id, auth.user_id).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title", "Укажите название взноса"));
    }
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::validation("amount", "Сумма должна быть больше нуля"));
    }
    if !ResidentService::is_member(&state.pool, residence_id, payload.user_id).await? {
        return Err(AppError::NotFound("Житель не найден".to_string()));
    }

    let fee = sqlx::query_as::<_, FeeInstance>(
        r#"
        INSERT INTO fees (user_id, residence_id, title, amount, due_date, status)
        VALUES ($1, $2, $3, $4, $5, 'unpaid')
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(residence_id)
    .bind(title)
    .bind(payload.amount)
    .bind(payload.due_date)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(fee_id = %fee.id, user_id = %fee.user_id, "Ad hoc fee created");
    Ok(Json(FeeResponse::from_instance(fee, Utc::now().date_naive())))
}

/// Получение взноса
#[utoipa::path(
    get,
    path = "/api/v1/fees/{id}",
    tag = "fees",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID взноса")),
    responses(
        (status = 200, description = "Взнос", body = FeeResponse),
        (status = 404, description = "Взнос не найден")
    )
)]
pub async fn get_fee(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(fee_id): Path<Uuid>,
) -> AppResult<Json<FeeResponse>> {
    let fee = load_fee(&state, &auth, fee_id).await?;
    Ok(Json(FeeResponse::from_instance(fee, Utc::now().date_naive())))
}

/// Удаление взноса без платежей
#[utoipa::path(
    delete,
    path = "/api/v1/fees/{id}",
    tag = "fees",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID взноса")),
    responses(
        (status = 200, description = "Взнос удалён", body = SuccessResponse),
        (status = 400, description = "По взносу есть платежи"),
        (status = 404, description = "Взнос не найден")
    )
)]
pub async fn delete_fee(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(fee_id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    auth.require(Capability::DeleteRecords)?;
    let fee = load_fee(&state, &auth, fee_id).await?;
    ensure_residence_syndic(&state.pool, fee.residence_id, auth.user_id).await?;

    let mut tx = state.pool.begin().await?;

    let (linked,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE fee_id = $1")
        .bind(fee.id)
        .fetch_one(&mut *tx)
        .await?;
    check_fee_deletable(&fee, linked)?;

    sqlx::query("DELETE FROM fees WHERE id = $1 AND status = 'unpaid'")
        .bind(fee.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(SuccessResponse::ok()))
}
