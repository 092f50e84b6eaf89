use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::UploadedFile;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

pub struct FileService {
    client: Client,
    bucket: String,
    public_url: Option<String>,
    max_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Audio,
    Video,
    Document,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// Расширения, допустимые в ключе объекта; первое используется по умолчанию
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["jpg", "jpeg", "png", "gif", "webp", "heic"],
            Self::Audio => &["mp3", "m4a", "ogg", "wav", "webm"],
            Self::Video => &["mp4", "mov", "webm"],
            Self::Document => &["pdf"],
        }
    }
}

/// Расширение для ключа в хранилище: из имени файла, если оно подходит к типу
pub fn storage_extension(file_name: &str, kind: FileKind) -> &'static str {
    let allowed = kind.extensions();
    file_name
        .rsplit_once('.')
        .and_then(|(_, ext)| {
            allowed
                .iter()
                .copied()
                .find(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(allowed[0])
}

/// Допустимые типы: изображения, аудио, видео и PDF
pub fn classify_content_type(content_type: &str) -> Option<FileKind> {
    match content_type {
        "image/jpeg" | "image/png" | "image/gif" | "image/webp" | "image/heic" => {
            Some(FileKind::Image)
        }
        "audio/mpeg" | "audio/mp4" | "audio/ogg" | "audio/wav" | "audio/webm" => {
            Some(FileKind::Audio)
        }
        "video/mp4" | "video/quicktime" | "video/webm" => Some(FileKind::Video),
        "application/pdf" => Some(FileKind::Document),
        _ => None,
    }
}

pub fn validate_upload(content_type: &str, size: usize, max_size: usize) -> AppResult<FileKind> {
    let kind = classify_content_type(content_type)
        .ok_or_else(|| AppError::File(format!("Недопустимый тип файла: {}", content_type)))?;

    if size == 0 {
        return Err(AppError::File("Файл пуст".to_string()));
    }
    if size > max_size {
        return Err(AppError::File(format!(
            "Файл слишком большой (максимум {} МБ)",
            max_size / (1024 * 1024)
        )));
    }

    Ok(kind)
}

impl FileService {
    pub async fn new(config: &Config) -> AppResult<Self> {
        let credentials = Credentials::new(
            &config.minio_access_key,
            &config.minio_secret_key,
            None,
            None,
            "syndichub",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("us-east-1"))
            .endpoint_url(&config.minio_endpoint)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.minio_bucket.clone(),
            public_url: config.minio_public_url.clone(),
            max_size: config.max_upload_bytes(),
        })
    }

    pub async fn upload_file(
        &self,
        folder: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> AppResult<UploadedFile> {
        let kind = validate_upload(content_type, data.len(), self.max_size)?;
        let file_size = data.len() as i64;

        let extension = storage_extension(file_name, kind);
        let key = format!("{}/{}.{}", folder, Uuid::new_v4(), extension);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::File(e.to_string()))?;

        let url = match &self.public_url {
            Some(base_url) => format!("{}/{}/{}", base_url, self.bucket, key),
            None => format!("/{}/{}", self.bucket, key),
        };

        Ok(UploadedFile {
            url,
            file_name: file_name.to_string(),
            file_type: kind.as_str().to_string(),
            file_size,
            mime_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn test_media_types_are_classified() {
        assert_eq!(classify_content_type("image/png"), Some(FileKind::Image));
        assert_eq!(classify_content_type("audio/mpeg"), Some(FileKind::Audio));
        assert_eq!(classify_content_type("video/mp4"), Some(FileKind::Video));
        assert_eq!(classify_content_type("application/zip"), None);
    }

    #[test]
    fn test_upload_size_limit() {
        assert!(validate_upload("image/jpeg", 2 * MB, 10 * MB).is_ok());
        assert!(validate_upload("image/jpeg", 11 * MB, 10 * MB).is_err());
        assert!(validate_upload("image/jpeg", 0, 10 * MB).is_err());
    }

    #[test]
    fn test_storage_extension_is_whitelisted() {
        assert_eq!(storage_extension("photo.PNG", FileKind::Image), "png");
        assert_eq!(storage_extension("voice.note.m4a", FileKind::Audio), "m4a");
        assert_eq!(storage_extension("README", FileKind::Document), "pdf");
        assert_eq!(storage_extension("clip.", FileKind::Video), "mp4");
        assert_eq!(storage_extension("evil.jpg.html", FileKind::Image), "jpg");
        assert_eq!(storage_extension("x.png/../../etc", FileKind::Image), "jpg");
    }
}
