use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, put},
    Json, Router,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::api::SuccessResponse;
use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthContext, Capability};
use crate::models::{
    Complaint, ComplaintEvidence, ComplaintPrivacy, ComplaintResponse, ComplaintStatus,
    CreateComplaintResponse, UpdateComplaintStatusRequest,
};
use crate::services::{
    complaint_service::{
        can_view_complaint, can_view_evidence, check_status_transition, complainant_label,
        upload_summary,
    },
    FileService, ResidentService,
};
use crate::utils::validators::sanitize_string;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_complaints).post(create_complaint))
        .route("/:id", get(get_complaint).delete(delete_complaint))
        .route("/:id/status", put(update_complaint_status))
}

#[derive(Debug, FromRow)]
struct ComplaintRow {
    #[sqlx(flatten)]
    complaint: Complaint,
    complainant_name: String,
    complained_about_name: String,
}

const COMPLAINT_SELECT: &str = r#"
    SELECT c.*, a.full_name AS complainant_name, b.full_name AS complained_about_name
    FROM complaints c
    JOIN profiles a ON a.id = c.complainant_id
    JOIN profiles b ON b.id = c.complained_about_id
"#;

struct EvidenceFile {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct ComplaintForm {
    complained_about_id: Option<Uuid>,
    reason: Option<String>,
    privacy: Option<ComplaintPrivacy>,
    title: Option<String>,
    description: Option<String>,
    files: Vec<EvidenceFile>,
}

fn required(value: Option<String>, field: &str, message: &str) -> AppResult<String> {
    value
        .map(|v| sanitize_string(&v))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(field, message))
}

async fn read_form(mut multipart: Multipart) -> AppResult<ComplaintForm> {
    let mut form = ComplaintForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "evidence" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let file_name = field.file_name().unwrap_or("evidence").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.files.push(EvidenceFile {
                file_name,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        match name.as_str() {
            "complained_about_id" => {
                let id = Uuid::parse_str(value.trim()).map_err(|_| {
                    AppError::validation("complained_about_id", "Неверный идентификатор жителя")
                })?;
                form.complained_about_id = Some(id);
            }
            "privacy" => {
                let privacy = ComplaintPrivacy::parse(value.trim()).ok_or_else(|| {
                    AppError::validation("privacy", "Приватность: private или anonymous")
                })?;
                form.privacy = Some(privacy);
            }
            "reason" => form.reason = Some(value),
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

fn to_response(
    row: ComplaintRow,
    evidence: Option<Vec<ComplaintEvidence>>,
    auth: &AuthContext,
) -> ComplaintResponse {
    let label = complainant_label(&row.complaint, &row.complainant_name, auth.user_id, auth.role);
    let complaint = row.complaint;

    ComplaintResponse {
        id: complaint.id,
        reason: complaint.reason,
        privacy: complaint.privacy,
        title: complaint.title,
        description: complaint.description,
        status: complaint.status,
        resolution_notes: complaint.resolution_notes,
        complainant_label: label.into_display(),
        complained_about_id: complaint.complained_about_id,
        complained_about_name: row.complained_about_name,
        evidence,
        created_at: complaint.created_at,
    }
}

async fn load_complaint(
    state: &AppState,
    auth: &AuthContext,
    complaint_id: Uuid,
) -> AppResult<ComplaintRow> {
    let row = sqlx::query_as::<_, ComplaintRow>(&format!("{} WHERE c.id = $1", COMPLAINT_SELECT))
        .bind(complaint_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Жалоба не найдена".to_string()))?;

    auth.ensure_same_residence(row.complaint.residence_id)?;
    if !can_view_complaint(&row.complaint, auth.user_id, auth.role) {
        return Err(AppError::NotFound("Жалоба не найдена".to_string()));
    }
    Ok(row)
}

/// Список жалоб
#[utoipa::path(
    get,
    path = "/api/v1/complaints",
    tag = "complaints",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Список жалоб", body = Vec<ComplaintResponse>),
        (status = 401, description = "Не авторизован")
    )
)]
pub async fn list_complaints(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<ComplaintResponse>>> {
    let residence_id = auth.residence()?;

    let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
        "{} WHERE c.residence_id = $1 ORDER BY c.created_at DESC",
        COMPLAINT_SELECT
    ))
    .bind(residence_id)
    .fetch_all(&state.pool)
    .await?;

    let rows: Vec<ComplaintRow> = rows
        .into_iter()
        .filter(|row| can_view_complaint(&row.complaint, auth.user_id, auth.role))
        .collect();

    let mut evidence: HashMap<Uuid, Vec<ComplaintEvidence>> = HashMap::new();
    if can_view_evidence(auth.role) && !rows.is_empty() {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.complaint.id).collect();
        let files = sqlx::query_as::<_, ComplaintEvidence>(
            "SELECT * FROM complaint_evidence WHERE complaint_id = ANY($1) ORDER BY created_at",
        )
        .bind(&ids)
        .fetch_all(&state.pool)
        .await?;
        for file in files {
            evidence.entry(file.complaint_id).or_default().push(file);
        }
    }

    let response = rows
        .into_iter()
        .map(|row| {
            let files = if can_view_evidence(auth.role) {
                Some(evidence.remove(&row.complaint.id).unwrap_or_default())
            } else {
                None
            };
            to_response(row, files, &auth)
        })
        .collect();

    Ok(Json(response))
}

/// Подача жалобы с доказательствами (multipart, файлы в поле evidence)
#[utoipa::path(
    post,
    path = "/api/v1/complaints",
    tag = "complaints",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Жалоба подана", body = CreateComplaintResponse),
        (status = 400, description = "Ошибка валидации")
    )
)]
pub async fn create_complaint(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> AppResult<Json<CreateComplaintResponse>> {
    let residence_id = auth.residence()?;
    let form = read_form(multipart).await?;

    let complained_about_id = form.complained_about_id.ok_or_else(|| {
        AppError::validation("complained_about_id", "Укажите, на кого подаётся жалоба")
    })?;
    if complained_about_id == auth.user_id {
        return Err(AppError::validation(
            "complained_about_id",
            "Нельзя подать жалобу на самого себя",
        ));
    }
    if !ResidentService::is_member(&state.pool, residence_id, complained_about_id).await? {
        return Err(AppError::NotFound("Житель не найден".to_string()));
    }

    let reason = required(form.reason, "reason", "Укажите причину")?;
    let title = required(form.title, "title", "Укажите заголовок")?;
    let description = required(form.description, "description", "Опишите ситуацию")?;
    let privacy = form.privacy.unwrap_or(ComplaintPrivacy::Private);

    let complaint = sqlx::query_as::<_, Complaint>(
        r#"
        INSERT INTO complaints
            (residence_id, complainant_id, complained_about_id, reason, privacy, title, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(residence_id)
    .bind(auth.user_id)
    .bind(complained_about_id)
    .bind(&reason)
    .bind(privacy)
    .bind(&title)
    .bind(&description)
    .fetch_one(&state.pool)
    .await?;

    // Загрузка по одному файлу: ошибка не отменяет уже созданную жалобу
    let mut uploaded = 0;
    let mut failed = 0;
    if !form.files.is_empty() {
        let file_service = FileService::new(&state.config).await?;
        let folder = format!("complaints/{}", complaint.id);

        for file in form.files {
            let stored = match file_service
                .upload_file(&folder, &file.file_name, &file.content_type, file.data)
                .await
            {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(complaint_id = %complaint.id, "Evidence upload failed: {}", e);
                    failed += 1;
                    continue;
                }
            };

            let attached = sqlx::query(
                r#"
                INSERT INTO complaint_evidence
                    (complaint_id, url, file_name, file_type, file_size, mime_type)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(complaint.id)
            .bind(&stored.url)
            .bind(&stored.file_name)
            .bind(&stored.file_type)
            .bind(stored.file_size)
            .bind(&stored.mime_type)
            .execute(&state.pool)
            .await;

            match attached {
                Ok(_) => uploaded += 1,
                Err(e) => {
                    tracing::warn!(complaint_id = %complaint.id, "Evidence record failed: {}", e);
                    failed += 1;
                }
            }
        }
    }

    tracing::info!(complaint_id = %complaint.id, uploaded, failed, "Complaint submitted");

    Ok(Json(CreateComplaintResponse {
        success: true,
        complaint_id: complaint.id,
        uploaded,
        failed,
        message: upload_summary(uploaded, failed),
    }))
}

/// Получение жалобы
#[utoipa::path(
    get,
    path = "/api/v1/complaints/{id}",
    tag = "complaints",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID жалобы")),
    responses(
        (status = 200, description = "Жалоба", body = ComplaintResponse),
        (status = 404, description = "Жалоба не найдена")
    )
)]
pub async fn get_complaint(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(complaint_id): Path<Uuid>,
) -> AppResult<Json<ComplaintResponse>> {
    let row = load_complaint(&state, &auth, complaint_id).await?;

    let evidence = if can_view_evidence(auth.role) {
        let files = sqlx::query_as::<_, ComplaintEvidence>(
            "SELECT * FROM complaint_evidence WHERE complaint_id = $1 ORDER BY created_at",
        )
        .bind(complaint_id)
        .fetch_all(&state.pool)
        .await?;
        Some(files)
    } else {
        None
    };

    Ok(Json(to_response(row, evidence, &auth)))
}

/// Рассмотрение жалобы синдиком
#[utoipa::path(
    put,
    path = "/api/v1/complaints/{id}/status",
    tag = "complaints",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID жалобы")),
    request_body = UpdateComplaintStatusRequest,
    responses(
        (status = 200, description = "Статус обновлён", body = SuccessResponse),
        (status = 400, description = "Недопустимый переход"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn update_complaint_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(complaint_id): Path<Uuid>,
    Json(payload): Json<UpdateComplaintStatusRequest>,
) -> AppResult<Json<SuccessResponse>> {
    auth.require(Capability::ReviewComplaints)?;
    let row = load_complaint(&state, &auth, complaint_id).await?;
    check_status_transition(row.complaint.status, payload.status)?;

    let notes = match payload.status {
        ComplaintStatus::Resolved => payload
            .resolution_notes
            .as_deref()
            .map(sanitize_string)
            .filter(|n| !n.is_empty()),
        _ => None,
    };

    sqlx::query(
        r#"
        UPDATE complaints
        SET status = $2, resolution_notes = COALESCE($3, resolution_notes), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(complaint_id)
    .bind(payload.status)
    .bind(notes)
    .execute(&state.pool)
    .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// Удаление жалобы: синдик, либо заявитель пока жалоба не рассмотрена
#[utoipa::path(
    delete,
    path = "/api/v1/complaints/{id}",
    tag = "complaints",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID жалобы")),
    responses(
        (status = 200, description = "Жалоба удалена", body = SuccessResponse),
        (status = 403, description = "Недостаточно прав"),
        (status = 404, description = "Жалоба не найдена")
    )
)]
pub async fn delete_complaint(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(complaint_id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    let row = load_complaint(&state, &auth, complaint_id).await?;

    let own_pending = row.complaint.complainant_id == auth.user_id
        && row.complaint.status == ComplaintStatus::Submitted;
    if !auth.can(Capability::DeleteRecords) && !own_pending {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM complaints WHERE id = $1")
        .bind(complaint_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
