use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::{Pagination, SuccessResponse};
use crate::error::{AppError, AppResult};
use crate::middleware::{ensure_residence_syndic, AppState, AuthContext, Capability};
use crate::models::{
    CreateResidentRequest, EmailLookupResponse, RejectRegistrationRequest, Resident, Role,
    UpdateResidentRequest,
};
use crate::services::{
    email_service::{registration_approved_template, registration_rejected_template},
    resident_service::{check_resident_update, resolve_identity, INHERITED_FIELDS},
    AuthService, EmailService, ResidentService,
};
use crate::utils::validators::{normalize_email, validate_email};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_residents).post(create_resident))
        .route("/lookup", get(lookup_email))
        .route(
            "/:id",
            get(get_resident).put(update_resident).delete(remove_resident),
        )
        .route("/:id/approve", post(approve_registration))
        .route("/:id/reject", post(reject_registration))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ResidentsQuery {
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LookupQuery {
    pub email: String,
}

/// Синдик своей резиденции
async fn syndic_residence(state: &AppState, auth: &AuthContext) -> AppResult<Uuid> {
    auth.require(Capability::ManageResidents)?;
    let residence_id = auth.residence()?;
    ensure_residence_syndic(&state.pool, residence_id, auth.user_id).await?;
    Ok(residence_id)
}

async fn residence_name(state: &AppState, residence_id: Uuid) -> AppResult<String> {
    let (name,): (String,) = sqlx::query_as("SELECT name FROM residences WHERE id = $1")
        .bind(residence_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(name)
}

/// Список жителей резиденции
#[utoipa::path(
    get,
    path = "/api/v1/residents",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(ResidentsQuery),
    responses(
        (status = 200, description = "Список жителей", body = Vec<Resident>),
        (status = 401, description = "Не авторизован"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn list_residents(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ResidentsQuery>,
) -> AppResult<Json<Vec<Resident>>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    let (limit, offset) = Pagination {
        page: query.page,
        limit: query.limit,
    }
    .limit_offset();

    let search = query.search.as_deref().map(|s| format!("%{}%", s.trim()));

    let residents = sqlx::query_as::<_, Resident>(
        r#"
        SELECT p.id, p.full_name, p.email, p.phone_number, p.role, p.verified,
               pr.residence_id, pr.apartment_number, pr.created_at AS joined_at
        FROM profiles p
        JOIN profile_residences pr ON pr.profile_id = p.id
        WHERE pr.residence_id = $1
          AND ($2::user_role IS NULL OR p.role = $2)
          AND ($3::boolean IS NULL OR p.verified = $3)
          AND ($4::text IS NULL OR p.full_name ILIKE $4 OR p.email ILIKE $4 OR pr.apartment_number ILIKE $4)
        ORDER BY p.role DESC, pr.apartment_number, p.full_name
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(residence_id)
    .bind(query.role)
    .bind(query.verified)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(residents))
}

/// Поиск email по всем резиденциям перед добавлением жителя
#[utoipa::path(
    get,
    path = "/api/v1/residents/lookup",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(LookupQuery),
    responses(
        (status = 200, description = "Результат поиска", body = EmailLookupResponse),
        (status = 400, description = "Неверный email"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn lookup_email(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<EmailLookupResponse>> {
    let residence_id = syndic_residence(&state, &auth).await?;

    let email = normalize_email(&query.email);
    if !validate_email(&email) {
        return Err(AppError::validation("email", "Неверный формат email"));
    }

    let existing = AuthService::get_profile_by_email(&state.pool, &email).await?;
    let response = match existing {
        Some(profile) => {
            let already_member =
                ResidentService::is_member(&state.pool, residence_id, profile.id).await?;
            EmailLookupResponse {
                exists: true,
                is_syndic: profile.role == Role::Syndic,
                already_member,
                locked_fields: INHERITED_FIELDS.iter().map(|f| f.to_string()).collect(),
                profile: Some(profile),
            }
        }
        None => EmailLookupResponse {
            exists: false,
            is_syndic: false,
            already_member: false,
            locked_fields: Vec::new(),
            profile: None,
        },
    };

    Ok(Json(response))
}

/// Добавление жителя (или существующего человека из другой резиденции)
#[utoipa::path(
    post,
    path = "/api/v1/residents",
    tag = "residents",
    security(("bearer_auth" = [])),
    request_body = CreateResidentRequest,
    responses(
        (status = 200, description = "Житель добавлен", body = Resident),
        (status = 400, description = "Ошибка валидации"),
        (status = 403, description = "Недостаточно прав")
    )
)]
pub async fn create_resident(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateResidentRequest>,
) -> AppResult<Json<Resident>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    payload.validate()?;

    let existing = AuthService::get_profile_by_email(&state.pool, &payload.email).await?;
    let already_member = match &existing {
        Some(profile) => ResidentService::is_member(&state.pool, residence_id, profile.id).await?,
        None => false,
    };

    let resolution = resolve_identity(existing.as_ref(), already_member, &payload)?;
    let resident = ResidentService::create(&state.pool, residence_id, resolution).await?;

    Ok(Json(resident))
}

/// Получение жителя
#[utoipa::path(
    get,
    path = "/api/v1/residents/{id}",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID профиля")),
    responses(
        (status = 200, description = "Житель", body = Resident),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn get_resident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<Resident>> {
    let residence_id = auth.residence()?;
    if profile_id != auth.user_id {
        auth.require(Capability::ManageResidents)?;
    }

    let resident = ResidentService::get(&state.pool, residence_id, profile_id).await?;
    Ok(Json(resident))
}

/// Редактирование жителя
#[utoipa::path(
    put,
    path = "/api/v1/residents/{id}",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID профиля")),
    request_body = UpdateResidentRequest,
    responses(
        (status = 200, description = "Житель обновлён", body = Resident),
        (status = 400, description = "Ошибка валидации"),
        (status = 403, description = "Недостаточно прав"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn update_resident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
    Json(mut payload): Json<UpdateResidentRequest>,
) -> AppResult<Json<Resident>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    let target = ResidentService::get(&state.pool, residence_id, profile_id).await?;

    if payload.role.is_some() {
        auth.require(Capability::EditRoles)?;
    }

    let email_owner = match &payload.email {
        Some(email) => {
            let email = normalize_email(email);
            if !validate_email(&email) {
                return Err(AppError::validation("email", "Неверный формат email"));
            }
            let owner = AuthService::get_profile_by_email(&state.pool, &email)
                .await?
                .map(|p| p.id);
            payload.email = Some(email);
            owner
        }
        None => None,
    };

    let memberships = ResidentService::membership_count(&state.pool, profile_id).await?;
    check_resident_update(&target, &payload, email_owner, memberships)?;

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE profiles SET
            full_name = COALESCE($2, full_name),
            email = COALESCE($3, email),
            phone_number = COALESCE($4, phone_number),
            role = COALESCE($5, role),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(profile_id)
    .bind(payload.full_name.as_deref().map(str::trim))
    .bind(&payload.email)
    .bind(&payload.phone_number)
    .bind(payload.role)
    .execute(&mut *tx)
    .await?;

    if let Some(apartment) = &payload.apartment_number {
        sqlx::query(
            "UPDATE profile_residences SET apartment_number = $3 WHERE profile_id = $1 AND residence_id = $2",
        )
        .bind(profile_id)
        .bind(residence_id)
        .bind(apartment.trim())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let resident = ResidentService::get(&state.pool, residence_id, profile_id).await?;
    Ok(Json(resident))
}

/// Исключение жителя из резиденции (история взносов сохраняется)
#[utoipa::path(
    delete,
    path = "/api/v1/residents/{id}",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID профиля")),
    responses(
        (status = 200, description = "Житель исключён", body = SuccessResponse),
        (status = 400, description = "Синдика нельзя исключить"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn remove_resident(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    auth.require(Capability::DeleteRecords)?;

    if profile_id == auth.user_id {
        return Err(AppError::BadRequest(
            "Синдик не может исключить сам себя".to_string(),
        ));
    }

    let result = sqlx::query(
        "DELETE FROM profile_residences WHERE profile_id = $1 AND residence_id = $2",
    )
    .bind(profile_id)
    .bind(residence_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Житель не найден".to_string()));
    }

    tracing::info!(%profile_id, %residence_id, "Resident removed");
    Ok(Json(SuccessResponse::ok()))
}

/// Подтверждение регистрации жителя
#[utoipa::path(
    post,
    path = "/api/v1/residents/{id}/approve",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID профиля")),
    responses(
        (status = 200, description = "Регистрация подтверждена", body = Resident),
        (status = 400, description = "Уже подтверждён"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn approve_registration(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<Resident>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    let target = ResidentService::get(&state.pool, residence_id, profile_id).await?;

    if target.verified {
        return Err(AppError::BadRequest("Регистрация уже подтверждена".to_string()));
    }

    sqlx::query("UPDATE profiles SET verified = true, updated_at = NOW() WHERE id = $1")
        .bind(profile_id)
        .execute(&state.pool)
        .await?;

    let name = residence_name(&state, residence_id).await?;
    let template = registration_approved_template(&target.full_name, &name);
    EmailService::new(state.config.clone())
        .send_logged(&target.email, &template)
        .await;

    let resident = ResidentService::get(&state.pool, residence_id, profile_id).await?;
    Ok(Json(resident))
}

/// Отклонение регистрации: членство удаляется, жителю уходит письмо
#[utoipa::path(
    post,
    path = "/api/v1/residents/{id}/reject",
    tag = "residents",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "ID профиля")),
    request_body = RejectRegistrationRequest,
    responses(
        (status = 200, description = "Регистрация отклонена", body = SuccessResponse),
        (status = 400, description = "Житель уже подтверждён"),
        (status = 404, description = "Житель не найден")
    )
)]
pub async fn reject_registration(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(profile_id): Path<Uuid>,
    Json(payload): Json<RejectRegistrationRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let residence_id = syndic_residence(&state, &auth).await?;
    let target = ResidentService::get(&state.pool, residence_id, profile_id).await?;

    if target.verified {
        return Err(AppError::BadRequest(
            "Подтверждённого жителя нельзя отклонить".to_string(),
        ));
    }

    sqlx::query("DELETE FROM profile_residences WHERE profile_id = $1 AND residence_id = $2")
        .bind(profile_id)
        .bind(residence_id)
        .execute(&state.pool)
        .await?;

    let name = residence_name(&state, residence_id).await?;
    let template =
        registration_rejected_template(&target.full_name, &name, payload.reason.as_deref());
    EmailService::new(state.config.clone())
        .send_logged(&target.email, &template)
        .await;

    Ok(Json(SuccessResponse::ok()))
}
