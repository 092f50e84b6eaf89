use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::Pagination;
use crate::error::{AppError, AppResult};
use crate::middleware::{ensure_residence_syndic, AppState, AuthContext, Capability};
use crate::models::{
    Balances, CorrectPaymentStatusRequest, CustomPaymentRequest, Payment, PaymentMethod,
    PaymentStatus, ReceiptDocument, SettleFeesRequest, SettlementResponse,
};
use crate::services::{receipt_service::render_html, PaymentService, ReceiptService};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/settle", post(settle_fees))
        .route("/custom", post(record_custom_payment))
        .route("/balances", get(get_balances))
        .route("/:id", get(get_payment))
        .route("/:id/status", patch(correct_payment_status))
        .route("/:id/receipt", get(get_receipt))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PaymentsQuery {
    pub user_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ReceiptQuery {
    /// json (по умолчанию) или html
    pub format: Option<String>,
}

async fn syndic_residence(state: &AppState, auth: &AuthContext) -> AppResult<Uuid> {
    auth.require(Capability::RecordPayments)?;
    let residence_id = auth.residence()?;
    ensure_residence_syndic(&state.pool, residence_id, auth.user_id).await?;
    Ok(residence_id)
}

async fn load_payment(state: &AppState, auth: &AuthContext, payment_id: Uuid) -> AppResult<Payment> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Платёж не найден".to_string()))?;

    auth.ensure_same_residence(payment.residence_id)?;
    if payment.user_id != auth.user_id && !auth.can(Capability::RecordPayments) {
        return Err(AppError::NotFound("Платёж не найден".to_string()));
    }
    Ok(payment)
}

/// История платежей
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(PaymentsQuery),
    responses(
        (status = 200, description = "Список платежей", body = Vec<Payment>)
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let residence_id = auth.residence()?;
    let user_id = if auth.can(Capability::RecordPayments) {
        query.user_id
    } else {
        Some(auth.user_id)
    };
    let (limit, offset) = Pagination {
        page: query.page,
        limit: query.limit,
    }
    .limit_offset();

    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT * FROM payments
        WHERE residence_id = $1
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::payment_method IS NULL OR method = $3)
          AND ($4::payment_status IS NULL OR status = $4)
        ORDER BY paid_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(residence_id)
    .bind(user_id)
    .bind(query.method)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(payments))
}

/// Оплата выбранных взносов (все или ни одного)
#[utoipa::path(
    post,
    path = "/api/v1/payments/settle",
    tag = "payments",
    security(("bearer_auth" = [])),
    request_body = SettleFeesRequest,
    responses(
        (status = 200, description = "Взносы оплачены", body = SettlementResponse),
        (status = 404, description = "Взнос не найден"),
        (status = 409, description = "Взнос уже оплачен")
    )
)]
pub async fn settle_fees(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<SettleFeesRequest>,
) -> AppResult<Json<SettlementResponse>> {
    let residence_id = syndic_residence(&state, &auth).await?;

    let response = PaymentService::settle_fees(
        &state.pool,
        residence_id,
        auth.user_id,
        &payload.fee_ids,
        payload.method,
    )
    .await?;

    Ok(Json(response))
}

/// Произвольный платёж без привязки к взносу
#[utoipa::path(
    post,
    path = "/api/v1/payments/custom",
    tag = "payments",
    security(("bearer_auth" = [])),
    request_body = CustomPaymentRequest,
    responses(
        (status = 200, description = "Платёж записан", body = Payment),
        (status = 400, description = "Ошибка валидации"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn record_custom_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CustomPaymentRequest>,
) -> AppResult<Json<Payment>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    let payment =
        PaymentService::record_custom(&state.pool, residence_id, auth.user_id, &payload).await?;
    Ok(Json(payment))
}

/// Касса и банковский счёт резиденции
#[utoipa::path(
    get,
    path = "/api/v1/payments/balances",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Балансы", body = Balances),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn get_balances(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Balances>> {
    auth.require(Capability::ViewBalances)?;
    let residence_id = auth.residence()?;
    let balances = PaymentService::balances(&state.pool, residence_id).await?;
    Ok(Json(balances))
}

/// Получение платежа
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID платежа")),
    responses(
        (status = 200, description = "Платёж", body = Payment),
        (status = 404, description = "Платёж не найден")
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    let payment = load_payment(&state, &auth, payment_id).await?;
    Ok(Json(payment))
}

/// Исправление статуса платежа
#[utoipa::path(
    patch,
    path = "/api/v1/payments/{id}/status",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID платежа")),
    request_body = CorrectPaymentStatusRequest,
    responses(
        (status = 200, description = "Статус исправлен", body = Payment),
        (status = 400, description = "Статус уже установлен"),
        (status = 404, description = "Платёж не найден"),
        (status = 409, description = "Взнос уже оплачен другим платежом")
    )
)]
pub async fn correct_payment_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<CorrectPaymentStatusRequest>,
) -> AppResult<Json<Payment>> {
    syndic_residence(&state, &auth).await?;
    let payment = load_payment(&state, &auth, payment_id).await?;
    let updated = PaymentService::correct_status(&state.pool, payment.id, payload.status).await?;
    Ok(Json(updated))
}

/// Квитанция за наличный платёж
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}/receipt",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "ID платежа"),
        ReceiptQuery
    ),
    responses(
        (status = 200, description = "Квитанция", body = ReceiptDocument),
        (status = 400, description = "Квитанция недоступна для этого платежа"),
        (status = 404, description = "Платёж не найден")
    )
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payment_id): Path<Uuid>,
    Query(query): Query<ReceiptQuery>,
) -> AppResult<Response> {
    let payment = load_payment(&state, &auth, payment_id).await?;
    let receipt = ReceiptService::build(&state.pool, &payment, &state.config.currency).await?;

    match query.format.as_deref() {
        Some("html") => Ok(Html(render_html(&receipt)).into_response()),
        None | Some("json") => Ok(Json(receipt).into_response()),
        Some(other) => Err(AppError::BadRequest(format!(
            "Неизвестный формат квитанции: {}",
            other
        ))),
    }
}
