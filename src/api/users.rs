use axum::{extract::State, routing::get, Json, Router};

use crate::error::AppResult;
use crate::middleware::{AppState, AuthContext};
use crate::models::{MeResponse, MembershipResponse};
use crate::services::AuthService;

pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

/// Профиль текущего пользователя и его резиденции
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Профиль пользователя", body = MeResponse),
        (status = 401, description = "Не авторизован")
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<MeResponse>> {
    let profile = AuthService::get_profile_by_id(&state.pool, auth.user_id).await?;

    let memberships = sqlx::query_as::<_, (uuid::Uuid, String, String)>(
        r#"
        SELECT r.id, r.name, pr.apartment_number
        FROM profile_residences pr
        JOIN residences r ON r.id = pr.residence_id
        WHERE pr.profile_id = $1
        ORDER BY pr.created_at
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .map(
        |(residence_id, residence_name, apartment_number)| MembershipResponse {
            residence_id,
            residence_name,
            apartment_number,
        },
    )
    .collect();

    Ok(Json(MeResponse {
        profile,
        memberships,
    }))
}
