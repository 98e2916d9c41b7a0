//! Signed contest token verification (HS256 JWT).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// `exp` is in the past (beyond the configured leeway).
    #[error("token expired")]
    Expired,
    /// Bad signature, malformed token, missing claims or wrong contest scope.
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Role carried by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Regular participant.
    Player,
    /// Contest creator.
    Host,
    /// Operator allowed to create rooms on behalf of others.
    Admin,
}

impl Role {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("host") => Role::Host,
            Some("admin") => Role::Admin,
            _ => Role::Player,
        }
    }

    /// Wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may create rooms.
    pub fn can_create_rooms(&self) -> bool {
        matches!(self, Role::Host | Role::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, alias = "contestId", skip_serializing_if = "Option::is_none")]
    contest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    exp: u64,
}

/// Verified identity extracted from a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Subject claim.
    pub user_id: String,
    /// Contest the token is scoped to, if any.
    pub contest_id: Option<String>,
    /// Role claim, `player` when absent.
    pub role: Role,
    /// Display name claim, falls back to the user id.
    pub username: String,
}

impl VerifiedToken {
    /// Enforce the contest scope against the requested room.
    pub fn authorize_contest(&self, contest_id: &str) -> Result<(), AuthError> {
        match self.contest_id.as_deref() {
            Some(scoped) if scoped != contest_id => Err(AuthError::Invalid(format!(
                "token is scoped to contest `{scoped}`"
            ))),
            _ => Ok(()),
        }
    }
}

/// Minted token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Absolute expiry.
    pub expires_at: SystemTime,
}

/// Stateless HS256 verifier (and development issuer).
#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier for `secret` tolerating `leeway` of clock skew.
    pub fn new(secret: &str, leeway: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway.as_secs();
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify `token` and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(err.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::Invalid("empty subject".into()));
        }

        let username = claims
            .username
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| claims.sub.clone());

        Ok(VerifiedToken {
            role: Role::parse(claims.role.as_deref()),
            contest_id: claims.contest_id,
            username,
            user_id: claims.sub,
        })
    }

    /// Sign a token for `user_id` valid for `ttl`.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        contest_id: Option<&str>,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let expires_at = SystemTime::now() + ttl;
        let exp = expires_at
            .duration_since(UNIX_EPOCH)
            .map_err(|err| AuthError::Invalid(err.to_string()))?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_string(),
            contest_id: contest_id.map(str::to_string),
            role: Some(role.as_str().to_string()),
            username: Some(username.to_string()),
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AuthError::Invalid(err.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> TokenVerifier {
        TokenVerifier::new("test-secret", Duration::ZERO)
    }

    fn raw_token(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn issued_token_round_trips_identity() {
        let verifier = verifier();
        let issued = verifier
            .issue("u1", "Ada", Some("c1"), Role::Host, Duration::from_secs(60))
            .unwrap();

        let verified = verifier.verify(&issued.token).unwrap();
        assert_eq!(verified.user_id, "u1");
        assert_eq!(verified.username, "Ada");
        assert_eq!(verified.contest_id.as_deref(), Some("c1"));
        assert_eq!(verified.role, Role::Host);
    }

    #[test]
    fn expired_token_is_distinguished() {
        let token = raw_token(
            "test-secret",
            serde_json::json!({"sub": "u1", "exp": now_secs() - 120}),
        );
        assert_eq!(verifier().verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let token = raw_token(
            "other-secret",
            serde_json::json!({"sub": "u1", "exp": now_secs() + 120}),
        );
        assert!(matches!(
            verifier().verify(&token).unwrap_err(),
            AuthError::Invalid(_)
        ));
        assert!(matches!(
            verifier().verify("not-a-jwt").unwrap_err(),
            AuthError::Invalid(_)
        ));
    }

    #[test]
    fn missing_role_defaults_to_player_and_accepts_camel_contest_id() {
        let token = raw_token(
            "test-secret",
            serde_json::json!({"sub": "u2", "contestId": "c9", "exp": now_secs() + 120}),
        );
        let verified = verifier().verify(&token).unwrap();
        assert_eq!(verified.role, Role::Player);
        assert_eq!(verified.username, "u2");
        assert!(verified.authorize_contest("c9").is_ok());
        assert!(verified.authorize_contest("c10").is_err());
    }
}
