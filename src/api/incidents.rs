use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{Pagination, SuccessResponse};
use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthContext, Capability};
use crate::models::{
    AssignIncidentRequest, CreateIncidentRequest, Incident, IncidentStatus,
    UpdateIncidentStatusRequest,
};
use crate::services::ResidentService;
use crate::utils::validators::sanitize_string;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_incidents).post(create_incident))
        .route("/:id", get(get_incident).delete(delete_incident))
        .route("/:id/status", put(update_incident_status))
        .route("/:id/assign", put(assign_incident))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct IncidentsQuery {
    pub status: Option<IncidentStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

async fn load_incident(state: &AppState, auth: &AuthContext, incident_id: Uuid) -> AppResult<Incident> {
    let incident = sqlx::query_as::<_, Incident>("SELECT * FROM incidents WHERE id = $1")
        .bind(incident_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Инцидент не найден".to_string()))?;

    auth.ensure_same_residence(incident.residence_id)?;
    if incident.user_id != auth.user_id && !auth.can(Capability::ViewAllIncidents) {
        return Err(AppError::NotFound("Инцидент не найден".to_string()));
    }
    Ok(incident)
}

/// Список инцидентов (житель видит только свои)
#[utoipa::path(
    get,
    path = "/api/v1/incidents",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(IncidentsQuery),
    responses(
        (status = 200, description = "Список инцидентов", body = Vec<Incident>)
    )
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<IncidentsQuery>,
) -> AppResult<Json<Vec<Incident>>> {
    let residence_id = auth.residence()?;
    let author = if auth.can(Capability::ViewAllIncidents) {
        None
    } else {
        Some(auth.user_id)
    };
    let (limit, offset) = Pagination {
        page: query.page,
        limit: query.limit,
    }
    .limit_offset();

    let incidents = sqlx::query_as::<_, Incident>(
        r#"
        SELECT * FROM incidents
        WHERE residence_id = $1
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::incident_status IS NULL OR status = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(residence_id)
    .bind(author)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(incidents))
}

/// Сообщить об инциденте
#[utoipa::path(
    post,
    path = "/api/v1/incidents",
    tag = "incidents",
    security(("bearer_auth" = [])),
    request_body = CreateIncidentRequest,
    responses(
        (status = 200, description = "Инцидент создан", body = Incident),
        (status = 400, description = "Ошибка валидации")
    )
)]
pub async fn create_incident(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateIncidentRequest>,
) -> AppResult<Json<Incident>> {
    let residence_id = auth.residence()?;
    payload.validate()?;

    let incident = sqlx::query_as::<_, Incident>(
        r#"
        INSERT INTO incidents (residence_id, user_id, title, description, photo_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(residence_id)
    .bind(auth.user_id)
    .bind(sanitize_string(&payload.title))
    .bind(sanitize_string(&payload.description))
    .bind(&payload.photo_url)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(incident_id = %incident.id, %residence_id, "Incident reported");
    Ok(Json(incident))
}

/// Получение инцидента
#[utoipa::path(
    get,
    path = "/api/v1/incidents/{id}",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID инцидента")),
    responses(
        (status = 200, description = "Инцидент", body = Incident),
        (status = 404, description = "Инцидент не найден")
    )
)]
pub async fn get_incident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(incident_id): Path<Uuid>,
) -> AppResult<Json<Incident>> {
    let incident = load_incident(&state, &auth, incident_id).await?;
    Ok(Json(incident))
}

/// Смена статуса инцидента
#[utoipa::path(
    put,
    path = "/api/v1/incidents/{id}/status",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID инцидента")),
    request_body = UpdateIncidentStatusRequest,
    responses(
        (status = 200, description = "Статус обновлён", body = Incident),
        (status = 400, description = "Недопустимый переход"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn update_incident_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<UpdateIncidentStatusRequest>,
) -> AppResult<Json<Incident>> {
    auth.require(Capability::AssignIncidents)?;
    let incident = load_incident(&state, &auth, incident_id).await?;

    if !incident.status.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Недопустимый переход статуса инцидента: {:?} -> {:?}",
            incident.status, payload.status
        )));
    }

    let updated = sqlx::query_as::<_, Incident>(
        "UPDATE incidents SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(incident_id)
    .bind(payload.status)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(updated))
}

/// Назначение ответственного
#[utoipa::path(
    put,
    path = "/api/v1/incidents/{id}/assign",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID инцидента")),
    request_body = AssignIncidentRequest,
    responses(
        (status = 200, description = "Ответственный назначен", body = Incident),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn assign_incident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<AssignIncidentRequest>,
) -> AppResult<Json<Incident>> {
    auth.require(Capability::AssignIncidents)?;
    let incident = load_incident(&state, &auth, incident_id).await?;

    if !ResidentService::is_member(&state.pool, incident.residence_id, payload.assigned_to).await? {
        return Err(AppError::NotFound(
            "Ответственный не состоит в резиденции".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Incident>(
        "UPDATE incidents SET assigned_to = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(incident_id)
    .bind(payload.assigned_to)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(updated))
}

/// Удаление инцидента
#[utoipa::path(
    delete,
    path = "/api/v1/incidents/{id}",
    tag = "incidents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID инцидента")),
    responses(
        (status = 200, description = "Инцидент удалён", body = SuccessResponse),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn delete_incident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(incident_id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    auth.require(Capability::DeleteRecords)?;
    load_incident(&state, &auth, incident_id).await?;

    sqlx::query("DELETE FROM incidents WHERE id = $1")
        .bind(incident_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
