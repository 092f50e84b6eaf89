use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "complaint_privacy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintPrivacy {
    Private,
    Anonymous,
}

impl ComplaintPrivacy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "anonymous" => Some(Self::Anonymous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "complaint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Submitted,
    Reviewed,
    Resolved,
}

impl Default for ComplaintStatus {
    fn default() -> Self {
        Self::Submitted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Complaint {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub complainant_id: Uuid,
    pub complained_about_id: Uuid,
    pub reason: String,
    pub privacy: ComplaintPrivacy,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ComplaintEvidence {
    pub id: Uuid,
    pub complaint_id: Uuid,
    pub url: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintResponse {
    pub id: Uuid,
    pub reason: String,
    pub privacy: ComplaintPrivacy,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub resolution_notes: Option<String>,
    /// Подпись заявителя с учётом роли смотрящего и приватности
    pub complainant_label: String,
    pub complained_about_id: Uuid,
    pub complained_about_name: String,
    /// Доказательства видит только синдик
    pub evidence: Option<Vec<ComplaintEvidence>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateComplaintResponse {
    pub success: bool,
    pub complaint_id: Uuid,
    pub uploaded: usize,
    pub failed: usize,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateComplaintStatusRequest {
    pub status: ComplaintStatus,
    pub resolution_notes: Option<String>,
}
