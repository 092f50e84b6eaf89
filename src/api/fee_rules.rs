use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{ensure_residence_syndic, AppState, AuthContext, Capability};
use crate::models::{
    CreateFeeRuleRequest, DeleteRuleResponse, FeeRule, GenerateFeesRequest, GenerationReport,
    ReminderReport, UpdateFeeRuleRequest,
};
use crate::services::{
    billing_service::{apply_rule_update, prepare_rule},
    email_service::payment_reminder_template,
    BillingService, EmailService,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/:id/generate", post(generate_fees))
        .route("/:id/reminders", post(send_reminders))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct RulesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Правило из резиденции текущего синдика
async fn owned_rule(state: &AppState, auth: &AuthContext, rule_id: Uuid) -> AppResult<FeeRule> {
    auth.require(Capability::ManageFees)?;
    let rule = BillingService::get_rule(&state.pool, rule_id).await?;
    auth.ensure_same_residence(rule.residence_id)?;
    ensure_residence_syndic(&state.pool, rule.residence_id, auth.user_id).await?;
    Ok(rule)
}

/// Правила взносов резиденции
#[utoipa::path(
    get,
    path = "/api/v1/fee-rules",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(RulesQuery),
    responses(
        (status = 200, description = "Список правил", body = Vec<FeeRule>),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn list_rules(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<RulesQuery>,
) -> AppResult<Json<Vec<FeeRule>>> {
    let residence_id = auth.residence()?;

    let rules = sqlx::query_as::<_, FeeRule>(
        r#"
        SELECT * FROM fee_rules
        WHERE residence_id = $1 AND ($2 OR is_active = true)
        ORDER BY is_active DESC, next_due_date
        "#,
    )
    .bind(residence_id)
    .bind(query.include_inactive && auth.can(Capability::ManageFees))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rules))
}

/// Создание правила взноса
#[utoipa::path(
    post,
    path = "/api/v1/fee-rules",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    request_body = CreateFeeRuleRequest,
    responses(
        (status = 200, description = "Правило создано", body = FeeRule),
        (status = 400, description = "Ошибка валидации"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn create_rule(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateFeeRuleRequest>,
) -> AppResult<Json<FeeRule>> {
    auth.require(Capability::ManageFees)?;
    let residence_id = auth.residence()?;
    ensure_residence_syndic(&state.pool, residence_id, auth.user_id).await?;

    let rule = prepare_rule(&payload)?;
    let created = BillingService::create_rule(&state.pool, residence_id, &rule).await?;

    Ok(Json(created))
}

/// Получение правила
#[utoipa::path(
    get,
    path = "/api/v1/fee-rules/{id}",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID правила")),
    responses(
        (status = 200, description = "Правило", body = FeeRule),
        (status = 404, description = "Правило не найдено")
    )
)]
pub async fn get_rule(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(rule_id): Path<Uuid>,
) -> AppResult<Json<FeeRule>> {
    let rule = BillingService::get_rule(&state.pool, rule_id).await?;
    auth.ensure_same_residence(rule.residence_id)?;
    Ok(Json(rule))
}

/// Редактирование правила (уже созданные взносы не меняются)
#[utoipa::path(
    put,
    path = "/api/v1/fee-rules/{id}",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID правила")),
    request_body = UpdateFeeRuleRequest,
    responses(
        (status = 200, description = "Правило обновлено", body = FeeRule),
        (status = 400, description = "Ошибка валидации"),
        (status = 404, description = "Правило не найдено")
    )
)]
pub async fn update_rule(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(rule_id): Path<Uuid>,
    Json(payload): Json<UpdateFeeRuleRequest>,
) -> AppResult<Json<FeeRule>> {
    let rule = owned_rule(&state, &auth, rule_id).await?;
    let updated = apply_rule_update(&rule, &payload)?;
    let saved = BillingService::save_rule(&state.pool, &updated).await?;
    Ok(Json(saved))
}

/// Удаление правила: без экземпляров удаляется, иначе деактивируется
#[utoipa::path(
    delete,
    path = "/api/v1/fee-rules/{id}",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID правила")),
    responses(
        (status = 200, description = "Правило удалено или деактивировано", body = DeleteRuleResponse),
        (status = 404, description = "Правило не найдено")
    )
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(rule_id): Path<Uuid>,
) -> AppResult<Json<DeleteRuleResponse>> {
    owned_rule(&state, &auth, rule_id).await?;
    let (action, dependent_fees) = BillingService::delete_rule(&state.pool, rule_id).await?;

    Ok(Json(DeleteRuleResponse {
        success: true,
        action,
        dependent_fees,
    }))
}

/// Генерация взносов за текущий период
#[utoipa::path(
    post,
    path = "/api/v1/fee-rules/{id}/generate",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID правила")),
    request_body = GenerateFeesRequest,
    responses(
        (status = 200, description = "Отчёт о генерации", body = GenerationReport),
        (status = 400, description = "Правило неактивно"),
        (status = 404, description = "Правило не найдено")
    )
)]
pub async fn generate_fees(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(rule_id): Path<Uuid>,
    payload: Option<Json<GenerateFeesRequest>>,
) -> AppResult<Json<GenerationReport>> {
    owned_rule(&state, &auth, rule_id).await?;
    let anchor = payload.and_then(|Json(p)| p.anchor);

    let report = BillingService::generate(&state.pool, rule_id, anchor).await?;
    Ok(Json(report))
}

/// Письма-напоминания по неоплаченным взносам правила
#[utoipa::path(
    post,
    path = "/api/v1/fee-rules/{id}/reminders",
    tag = "fee-rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID правила")),
    responses(
        (status = 200, description = "Напоминания отправлены", body = ReminderReport),
        (status = 400, description = "Напоминания выключены"),
        (status = 404, description = "Правило не найдено")
    )
)]
pub async fn send_reminders(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(rule_id): Path<Uuid>,
) -> AppResult<Json<ReminderReport>> {
    let rule = owned_rule(&state, &auth, rule_id).await?;
    if !rule.reminder_enabled {
        return Err(AppError::BadRequest(
            "Напоминания для правила выключены".to_string(),
        ));
    }

    let horizon = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(rule.reminder_days_before.max(0) as u64))
        .ok_or_else(|| AppError::Internal("Некорректная дата напоминания".to_string()))?;

    let due = sqlx::query_as::<_, (String, String, String, Decimal, NaiveDate)>(
        r#"
        SELECT p.email, p.full_name, f.title, f.amount, f.due_date
        FROM fees f
        JOIN profiles p ON p.id = f.user_id
        WHERE f.rule_id = $1 AND f.status = 'unpaid' AND f.due_date <= $2
        ORDER BY f.due_date
        "#,
    )
    .bind(rule.id)
    .bind(horizon)
    .fetch_all(&state.pool)
    .await?;

    let email_service = EmailService::new(state.config.clone());
    let mut report = ReminderReport { sent: 0, failed: 0 };

    for (email, full_name, title, amount, due_date) in due {
        let template =
            payment_reminder_template(&full_name, &title, amount, &state.config.currency, due_date);
        if email_service.send_logged(&email, &template).await {
            report.sent += 1;
        } else {
            report.failed += 1;
        }
    }

    tracing::info!(%rule_id, sent = report.sent, failed = report.failed, "Reminders dispatched");
    Ok(Json(report))
}
