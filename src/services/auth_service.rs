use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse},
        format_system_time,
    },
    error::ServiceError,
    services::token_service::Role,
    state::SharedState,
};

/// Issue a signed token for development and local testing.
///
/// Disabled unless `auth.login_enabled` is set; production tokens come from the
/// identity provider that shares the signing secret.
pub fn login(state: &SharedState, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
    let auth = &state.config().auth;
    if !auth.login_enabled {
        return Err(ServiceError::NotFound("login is disabled".into()));
    }

    let username = request.username.trim().to_string();
    let user_id = request
        .user_id
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let role = Role::Player;

    let issued = state.tokens().issue(
        &user_id,
        &username,
        request.contest_id.as_deref(),
        role,
        auth.login_token_ttl,
    )?;

    info!(user_id = %user_id, role = role.as_str(), "issued development token");
    Ok(LoginResponse {
        token: issued.token,
        user_id,
        username,
        expires_at: format_system_time(issued.expires_at),
    })
}
