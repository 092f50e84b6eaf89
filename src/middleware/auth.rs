use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::permissions::{Capabilities, Capability};
use crate::models::Role;
use crate::services::AuthService;

/// Сессия пользователя, явно передаётся в каждую операцию
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub residence_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AuthContext {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().allows(capability)
    }

    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn residence(&self) -> AppResult<Uuid> {
        self.residence_id.ok_or(AppError::Forbidden)
    }

    /// Запись должна принадлежать текущей резиденции
    pub fn ensure_same_residence(&self, residence_id: Uuid) -> AppResult<()> {
        if self.residence_id == Some(residence_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

// Middleware для добавления AppState в extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(state);
    next.run(request).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = parts
            .extensions
            .get::<AppState>()
            .cloned()
            .ok_or_else(|| AppError::Internal("AppState отсутствует в запросе".to_string()))?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;

        let auth_service = AuthService::new(app_state.config);
        let claims = auth_service
            .verify_token(bearer.token())
            .map_err(|_| AppError::Unauthorized)?;

        auth_service.context_from_claims(&claims)
    }
}
