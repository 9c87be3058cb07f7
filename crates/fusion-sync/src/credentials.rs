//! COSMIC credential resolution

use crate::error::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// What the user supplied for the authenticated COSMIC download
#[derive(Debug, Clone, Default)]
pub struct CosmicCredentials {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CosmicCredentials {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn from_login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            token: None,
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Resolve the Basic auth token.
    ///
    /// An explicit token wins; otherwise username and password are encoded
    /// as `base64(username:password)`.
    pub fn resolve(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }

        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Ok(STANDARD.encode(format!("{}:{}", user, pass)))
            },
            _ => Err(SyncError::Credentials(
                "pass --cosmic-token, or both --cosmic-usr and --cosmic-passwd".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_takes_precedence() {
        let creds = CosmicCredentials {
            token: Some("abc123".to_string()),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };
        assert_eq!(creds.resolve().unwrap(), "abc123");
    }

    #[test]
    fn test_login_is_base64_encoded() {
        let creds = CosmicCredentials::from_login("user@example.org", "s3cret");
        let token = creds.resolve().unwrap();
        assert_eq!(STANDARD.decode(token).unwrap(), b"user@example.org:s3cret");
    }

    #[test]
    fn test_missing_credentials() {
        let creds = CosmicCredentials {
            username: Some("user".to_string()),
            ..CosmicCredentials::default()
        };
        assert!(matches!(creds.resolve(), Err(SyncError::Credentials(_))));
        assert!(CosmicCredentials::from_token("   ").resolve().is_err());
    }
}
