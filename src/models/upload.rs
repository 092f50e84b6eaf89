use serde::Serialize;
use utoipa::ToSchema;

/// Ответ объектного хранилища после загрузки файла
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedFile {
    pub url: String,
    pub file_name: String,
    /// image, audio, video или document
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
}
