use axum::{
    extract::{Multipart, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthContext};
use crate::models::UploadedFile;
use crate::services::FileService;

const ALLOWED_FOLDERS: [&str; 2] = ["incidents", "complaints"];

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(upload_file))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct UploadQuery {
    /// incidents (по умолчанию) или complaints
    pub folder: Option<String>,
}

fn resolve_folder(folder: Option<&str>) -> AppResult<&'static str> {
    let requested = folder.unwrap_or("incidents");
    ALLOWED_FOLDERS
        .iter()
        .copied()
        .find(|f| *f == requested)
        .ok_or_else(|| AppError::validation("folder", "Недопустимая папка"))
}

/// Загрузка файла (фото, аудио, видео, PDF)
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    tag = "uploads",
    security(("bearer_auth" = [])),
    params(UploadQuery),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Файл загружен", body = UploadedFile),
        (status = 400, description = "Неверный формат или размер файла")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadedFile>> {
    let residence_id = auth.residence()?;
    let folder = resolve_folder(query.folder.as_deref())?;
    let file_service = FileService::new(&state.config).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .ok_or_else(|| AppError::BadRequest("Content-Type отсутствует".to_string()))?
            .to_string();
        let file_name = field.file_name().unwrap_or("upload").to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let uploaded = file_service
            .upload_file(
                &format!("{}/{}", folder, residence_id),
                &file_name,
                &content_type,
                data.to_vec(),
            )
            .await?;

        return Ok(Json(uploaded));
    }

    Err(AppError::BadRequest("Файл не найден".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_folder_whitelist() {
        assert_eq!(resolve_folder(None).unwrap(), "incidents");
        assert_eq!(resolve_folder(Some("complaints")).unwrap(), "complaints");
        assert!(resolve_folder(Some("../secrets")).is_err());
    }
}
