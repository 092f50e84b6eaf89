use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthContext;
use crate::models::{Profile, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // profile id
    pub role: String,
    pub residence_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

/// Сессии выдаёт внешний OAuth-провайдер, здесь только формат токена
pub struct AuthService {
    config: Config,
}

impl AuthService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Выпуск токена в формате провайдера. Маршрута для выдачи нет: используется
    /// мостом идентификации и тестами, чтобы получить токен без внешнего OAuth.
    pub fn generate_access_token(&self, context: &AuthContext) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.jwt_access_expiry);

        let claims = Claims {
            sub: context.user_id.to_string(),
            role: context.role.as_str().to_string(),
            residence_id: context.residence_id.map(|id| id.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(AppError::from)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub fn context_from_claims(&self, claims: &Claims) -> AppResult<AuthContext> {
        if claims.token_type != "access" {
            return Err(AppError::Unauthorized);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        let role = Role::parse(&claims.role).ok_or(AppError::Unauthorized)?;
        let residence_id = claims
            .residence_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::Unauthorized)?;

        Ok(AuthContext {
            user_id,
            role,
            residence_id,
        })
    }

    pub async fn get_profile_by_id(pool: &PgPool, profile_id: Uuid) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Профиль не найден".to_string()))
    }

    pub async fn get_profile_by_email(pool: &PgPool, email: &str) -> AppResult<Option<Profile>> {
        let profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE LOWER(email) = LOWER($1)")
                .bind(email.trim())
                .fetch_optional(pool)
                .await?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(secret: &str) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "postgres://localhost/test".to_string(),
            jwt_secret: secret.to_string(),
            jwt_access_expiry: 600,
            email_api_url: "http://localhost".to_string(),
            email_api_key: String::new(),
            email_from: "test@example.com".to_string(),
            email_enabled: false,
            minio_endpoint: "http://localhost:9000".to_string(),
            minio_access_key: "key".to_string(),
            minio_secret_key: "secret".to_string(),
            minio_bucket: "test".to_string(),
            minio_public_url: None,
            max_upload_size_mb: 10,
            currency: "MAD".to_string(),
        }
    }

    #[test]
    fn test_token_carries_session_context() {
        let service = AuthService::new(test_config("secret"));
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Syndic,
            residence_id: Some(Uuid::new_v4()),
        };

        let token = service.generate_access_token(&context).unwrap();
        let claims = service.verify_token(&token).unwrap();

        assert_eq!(service.context_from_claims(&claims).unwrap(), context);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = AuthService::new(test_config("one"));
        let verifier = AuthService::new(test_config("two"));
        let context = AuthContext {
            user_id: Uuid::new_v4(),
            role: Role::Resident,
            residence_id: None,
        };

        let token = issuer.generate_access_token(&context).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_unknown_role_or_token_type_is_unauthorized() {
        let service = AuthService::new(test_config("secret"));
        let mut claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "admin".to_string(),
            residence_id: None,
            exp: 0,
            iat: 0,
            token_type: "access".to_string(),
        };
        assert!(matches!(
            service.context_from_claims(&claims),
            Err(AppError::Unauthorized)
        ));

        claims.role = "resident".to_string();
        claims.token_type = "refresh".to_string();
        assert!(matches!(
            service.context_from_claims(&claims),
            Err(AppError::Unauthorized)
        ));
    }
}
