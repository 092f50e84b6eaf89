use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    CreateResidentRequest, Profile, Resident, Role, UpdateResidentRequest,
    GUARD_APARTMENT_NUMBER,
};
use crate::utils::validators::{normalize_email, validate_phone};

/// Поля, наследуемые от существующего профиля при присоединении к другой резиденции
pub const INHERITED_FIELDS: [&str; 4] = ["full_name", "email", "phone_number", "role"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentDraft {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub apartment_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResolution {
    /// Новый человек, создаётся профиль
    NewProfile(ResidentDraft),
    /// Существующий профиль присоединяется к резиденции
    JoinExisting {
        profile_id: Uuid,
        draft: ResidentDraft,
    },
}

/// Охрана живёт в квартире "0", жители в любой другой
pub fn validate_apartment(role: Role, apartment_number: &str) -> AppResult<()> {
    let apartment_number = apartment_number.trim();
    match role {
        Role::Guard if apartment_number != GUARD_APARTMENT_NUMBER => Err(AppError::validation(
            "apartment_number",
            "Для охраны номер квартиры должен быть 0",
        )),
        Role::Resident if apartment_number.is_empty() || apartment_number == GUARD_APARTMENT_NUMBER => {
            Err(AppError::validation(
                "apartment_number",
                "Укажите номер квартиры жителя (не 0)",
            ))
        }
        _ => Ok(()),
    }
}

/// Сопоставление email с профилем из любой резиденции.
/// Синдика нельзя сделать жителем; у существующего человека меняется только квартира.
pub fn resolve_identity(
    existing: Option<&Profile>,
    already_member: bool,
    request: &CreateResidentRequest,
) -> AppResult<IdentityResolution> {
    if request.role == Role::Syndic {
        return Err(AppError::validation(
            "role",
            "Синдика нельзя добавить как жителя",
        ));
    }

    match existing {
        Some(profile) if profile.role == Role::Syndic => Err(AppError::validation(
            "email",
            "Этот email принадлежит синдику",
        )),
        Some(_) if already_member => Err(AppError::validation(
            "email",
            "Этот человек уже состоит в резиденции",
        )),
        Some(profile) => {
            validate_apartment(profile.role, &request.apartment_number)?;
            Ok(IdentityResolution::JoinExisting {
                profile_id: profile.id,
                draft: ResidentDraft {
                    full_name: profile.full_name.clone(),
                    email: profile.email.clone(),
                    phone_number: profile.phone_number.clone(),
                    role: profile.role,
                    apartment_number: request.apartment_number.trim().to_string(),
                },
            })
        }
        None => {
            validate_apartment(request.role, &request.apartment_number)?;
            if let Some(phone) = &request.phone_number {
                if !validate_phone(phone) {
                    return Err(AppError::validation(
                        "phone_number",
                        "Неверный формат телефона",
                    ));
                }
            }
            Ok(IdentityResolution::NewProfile(ResidentDraft {
                full_name: request.full_name.trim().to_string(),
                email: normalize_email(&request.email),
                phone_number: request.phone_number.clone(),
                role: request.role,
                apartment_number: request.apartment_number.trim().to_string(),
            }))
        }
    }
}

/// Первое наследуемое поле, которое правка действительно меняет
fn changed_shared_field(target: &Resident, update: &UpdateResidentRequest) -> Option<&'static str> {
    if let Some(name) = &update.full_name {
        if name.trim() != target.full_name {
            return Some("full_name");
        }
    }
    if let Some(email) = &update.email {
        if normalize_email(email) != normalize_email(&target.email) {
            return Some("email");
        }
    }
    if let Some(phone) = &update.phone_number {
        if target.phone_number.as_deref() != Some(phone.as_str()) {
            return Some("phone_number");
        }
    }
    match update.role {
        Some(role) if role != target.role => Some("role"),
        _ => None,
    }
}

/// Проверка правок жителя: роль синдика не редактируется, email не может
/// указывать на чужой профиль. Профиль, состоящий в нескольких резиденциях,
/// общий: здесь меняется только номер квартиры.
pub fn check_resident_update(
    target: &Resident,
    update: &UpdateResidentRequest,
    email_owner: Option<Uuid>,
    memberships: i64,
) -> AppResult<()> {
    if memberships > 1 {
        if let Some(field) = changed_shared_field(target, update) {
            return Err(AppError::validation(
                field,
                "Профиль состоит в нескольких резиденциях, менять можно только номер квартиры",
            ));
        }
    }

    if let Some(role) = update.role {
        if target.role == Role::Syndic && role != Role::Syndic {
            return Err(AppError::validation("role", "Роль синдика нельзя изменить"));
        }
        if role == Role::Syndic && target.role != Role::Syndic {
            return Err(AppError::validation("role", "Назначить синдика здесь нельзя"));
        }
    }

    if let Some(owner) = email_owner {
        if owner != target.id {
            return Err(AppError::validation(
                "email",
                "Этот email принадлежит другому профилю",
            ));
        }
    }

    if let Some(phone) = &update.phone_number {
        if !validate_phone(phone) {
            return Err(AppError::validation("phone_number", "Неверный формат телефона"));
        }
    }

    let role = update.role.unwrap_or(target.role);
    let apartment = update
        .apartment_number
        .as_deref()
        .unwrap_or(&target.apartment_number);
    if role != Role::Syndic {
        validate_apartment(role, apartment)?;
    }

    Ok(())
}

pub struct ResidentService;

impl ResidentService {
    pub async fn get(pool: &PgPool, residence_id: Uuid, profile_id: Uuid) -> AppResult<Resident> {
        sqlx::query_as::<_, Resident>(
            r#"
            SELECT p.id, p.full_name, p.email, p.phone_number, p.role, p.verified,
                   pr.residence_id, pr.apartment_number, pr.created_at AS joined_at
            FROM profiles p
            JOIN profile_residences pr ON pr.profile_id = p.id
            WHERE pr.residence_id = $1 AND p.id = $2
            "#,
        )
        .bind(residence_id)
        .bind(profile_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Житель не найден".to_string()))
    }

    pub async fn is_member(pool: &PgPool, residence_id: Uuid, profile_id: Uuid) -> AppResult<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT profile_id FROM profile_residences WHERE residence_id = $1 AND profile_id = $2",
        )
        .bind(residence_id)
        .bind(profile_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    /// В скольких резиденциях состоит профиль
    pub async fn membership_count(pool: &PgPool, profile_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM profile_residences WHERE profile_id = $1")
                .bind(profile_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// Создание профиля и/или членства по результату сопоставления
    pub async fn create(
        pool: &PgPool,
        residence_id: Uuid,
        resolution: IdentityResolution,
    ) -> AppResult<Resident> {
        let mut tx = pool.begin().await?;

        let (profile_id, apartment_number) = match resolution {
            IdentityResolution::NewProfile(draft) => {
                let (id,): (Uuid,) = sqlx::query_as(
                    r#"
                    INSERT INTO profiles (full_name, email, phone_number, role, verified)
                    VALUES ($1, $2, $3, $4, true)
                    RETURNING id
                    "#,
                )
                .bind(&draft.full_name)
                .bind(&draft.email)
                .bind(&draft.phone_number)
                .bind(draft.role)
                .fetch_one(&mut *tx)
                .await?;
                (id, draft.apartment_number)
            }
            IdentityResolution::JoinExisting { profile_id, draft } => {
                (profile_id, draft.apartment_number)
            }
        };

        sqlx::query(
            r#"
            INSERT INTO profile_residences (profile_id, residence_id, apartment_number)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(profile_id)
        .bind(residence_id)
        .bind(&apartment_number)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%profile_id, %residence_id, "Resident added");
        Self::get(pool, residence_id, profile_id).await
    }
}
