use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Номер квартиры, зарезервированный за охраной
pub const GUARD_APARTMENT_NUMBER: &str = "0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Resident,
    Guard,
    Syndic,
}

impl Default for Role {
    fn default() -> Self {
        Self::Resident
    }
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "resident" => Some(Self::Resident),
            "guard" => Some(Self::Guard),
            "syndic" => Some(Self::Syndic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Guard => "guard",
            Self::Syndic => "syndic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Житель в контексте конкретной резиденции
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Resident {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub residence_id: Uuid,
    pub apartment_number: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembershipResponse {
    pub residence_id: Uuid,
    pub residence_name: String,
    pub apartment_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub profile: Profile,
    pub memberships: Vec<MembershipResponse>,
}

// DTOs
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateResidentRequest {
    #[validate(length(min = 1, max = 255, message = "Укажите имя"))]
    pub full_name: String,
    #[validate(email(message = "Неверный формат email"))]
    pub email: String,
    pub phone_number: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Укажите номер квартиры"))]
    pub apartment_number: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateResidentRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub apartment_number: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRegistrationRequest {
    pub reason: Option<String>,
}

/// Результат поиска email по всем резиденциям
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailLookupResponse {
    pub exists: bool,
    pub is_syndic: bool,
    pub already_member: bool,
    /// Поля, которые нельзя менять при присоединении существующего человека
    pub locked_fields: Vec<String>,
    pub profile: Option<Profile>,
}
