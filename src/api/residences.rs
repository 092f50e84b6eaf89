use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthContext, Capability};
use crate::models::{DashboardResponse, Residence};
use crate::services::PaymentService;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/current", get(get_current_residence))
        .route("/current/dashboard", get(get_dashboard))
}

async fn current_residence(state: &AppState, auth: &AuthContext) -> AppResult<Residence> {
    let residence_id = auth.residence()?;
    sqlx::query_as::<_, Residence>("SELECT * FROM residences WHERE id = $1")
        .bind(residence_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Резиденция не найдена".to_string()))
}

/// Текущая резиденция
#[utoipa::path(
    get,
    path = "/api/v1/residences/current",
    tag = "residences",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Резиденция", body = Residence),
        (status = 404, description = "Резиденция не найдена")
    )
)]
pub async fn get_current_residence(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Residence>> {
    let residence = current_residence(&state, &auth).await?;
    Ok(Json(residence))
}

/// Сводка для синдика: кассы, долги, открытые обращения.
/// Балансы пересчитываются при каждом запросе.
#[utoipa::path(
    get,
    path = "/api/v1/residences/current/dashboard",
    tag = "residences",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Сводка", body = DashboardResponse),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<DashboardResponse>> {
    auth.require(Capability::ViewBalances)?;
    let residence = current_residence(&state, &auth).await?;
    let today = Utc::now().date_naive();

    let balances = PaymentService::balances(&state.pool, residence.id).await?;

    let (residents_count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM profile_residences pr
        JOIN profiles p ON p.id = pr.profile_id
        WHERE pr.residence_id = $1 AND p.role = 'resident'
        "#,
    )
    .bind(residence.id)
    .fetch_one(&state.pool)
    .await?;

    let (unpaid_total, overdue_count): (Option<Decimal>, i64) = sqlx::query_as(
        r#"
        SELECT SUM(amount), COUNT(*) FILTER (WHERE due_date < $2)
        FROM fees
        WHERE residence_id = $1 AND status = 'unpaid'
        "#,
    )
    .bind(residence.id)
    .bind(today)
    .fetch_one(&state.pool)
    .await?;

    let (open_incidents,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM incidents WHERE residence_id = $1 AND status IN ('open', 'in_progress')",
    )
    .bind(residence.id)
    .fetch_one(&state.pool)
    .await?;

    let (unresolved_complaints,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM complaints WHERE residence_id = $1 AND status <> 'resolved'",
    )
    .bind(residence.id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(DashboardResponse {
        residence,
        balances,
        currency: state.config.currency.clone(),
        residents_count,
        unpaid_total: unpaid_total.unwrap_or(Decimal::ZERO),
        overdue_count,
        open_incidents,
        unresolved_complaints,
    }))
}
