//! Identity token extractor.
//!
//! Provides an Axum extractor for the caller's verified identity.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::profile::NewProfile;
use shared::jwt::{JwtConfig, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated caller, taken from a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuth {
    /// Identity-provider subject, used as the user id everywhere.
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl UserAuth {
    /// Verifies a bearer token and returns the identity it carries.
    pub fn validate(jwt_config: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt_config.validate_token(token)?;
        Ok(Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }

    /// Profile fields used when this user is seen for the first time.
    pub fn new_profile(&self) -> NewProfile {
        NewProfile::new(
            &self.uid,
            self.email.as_deref(),
            self.name.as_deref(),
            self.picture.as_deref(),
        )
    }
}

/// Returns the token of a `Bearer` authorization header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already verified by the auth middleware
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        UserAuth::validate(&state.jwt, token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::jwt::TokenIdentity;

    fn jwt() -> JwtConfig {
        JwtConfig::new_for_testing("extractor_test_secret_0123456789")
    }

    #[test]
    fn test_validate_copies_identity_claims() {
        let config = jwt();
        let identity = TokenIdentity {
            email: Some("ravi@example.com".to_string()),
            name: Some("Ravi".to_string()),
            picture: Some("https://img.example.com/r.png".to_string()),
        };
        let (token, _) = config.issue_token("uid-ravi", &identity).unwrap();

        let auth = UserAuth::validate(&config, &token).unwrap();
        assert_eq!(auth.uid, "uid-ravi");
        assert_eq!(auth.email.as_deref(), Some("ravi@example.com"));
        assert_eq!(auth.name.as_deref(), Some("Ravi"));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(UserAuth::validate(&jwt(), "not-a-token").is_err());
    }

    #[test]
    fn test_new_profile_falls_back_to_email_local_part() {
        let auth = UserAuth {
            uid: "u1".to_string(),
            email: Some("meera@example.com".to_string()),
            name: None,
            picture: None,
        };
        assert_eq!(auth.new_profile().display_name, "meera");
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("bearer abc"), None);
    }
}
