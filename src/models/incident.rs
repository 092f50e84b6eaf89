use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "incident_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Default for IncidentStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl IncidentStatus {
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;

        matches!(
            (self, next),
            (Open, InProgress)
                | (Open, Resolved)
                | (Open, Closed)
                | (InProgress, Resolved)
                | (InProgress, Closed)
                | (Resolved, Closed)
                | (Resolved, InProgress)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Incident {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub photo_url: Option<String>,
    pub status: IncidentStatus,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIncidentRequest {
    #[validate(length(min = 1, max = 255, message = "Укажите заголовок"))]
    pub title: String,
    #[validate(length(min = 1, message = "Опишите проблему"))]
    pub description: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIncidentStatusRequest {
    pub status: IncidentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignIncidentRequest {
    pub assigned_to: Uuid,
}
