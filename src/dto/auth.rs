use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_user_id;

/// Development login. The password is accepted as-is and the token always
/// carries the `player` role.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Stable id to embed as the token subject; defaults to a fresh UUID.
    #[serde(default)]
    #[validate(custom(function = validate_user_id))]
    pub user_id: Option<String>,
    /// Restrict the token to a single contest.
    #[serde(default)]
    pub contest_id: Option<String>,
}

/// Signed token and the identity it carries.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
    /// RFC 3339 expiry.
    pub expires_at: String,
}
