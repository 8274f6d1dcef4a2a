use std::sync::Arc;

use crate::error::ApiError;

/// Header carrying the shared secret on plain HTTP routes
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared-secret check consulted before any cluster work.
///
/// With no secret configured every request passes.
#[derive(Clone, Debug, Default)]
pub struct AuthGate {
    secret: Option<Arc<str>>,
}

impl AuthGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
        }
    }

    /// True when no secret is configured
    pub fn is_open(&self) -> bool {
        self.secret.is_none()
    }

    /// Accept a credential from the query string or the header
    pub fn check(&self, query_key: Option<&str>, header_key: Option<&str>) -> Result<(), ApiError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };

        if query_key == Some(secret) || header_key == Some(secret) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    /// Upgraded channels can only carry the credential in the query string
    pub fn check_query(&self, query_key: Option<&str>) -> Result<(), ApiError> {
        self.check(query_key, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_gate_permits_everything() {
        let gate = AuthGate::new(None);
        assert!(gate.is_open());
        assert!(gate.check(None, None).is_ok());
        assert!(gate.check(Some("anything"), None).is_ok());
    }

    #[test]
    fn test_empty_secret_is_open() {
        assert!(AuthGate::new(Some(String::new())).is_open());
    }

    #[test]
    fn test_secret_required() {
        let gate = AuthGate::new(Some("abc".into()));

        assert!(matches!(gate.check(None, None), Err(ApiError::Unauthorized)));
        assert!(matches!(gate.check(Some("xyz"), None), Err(ApiError::Unauthorized)));
        assert!(gate.check(Some("abc"), None).is_ok());
        assert!(gate.check(None, Some("abc")).is_ok());
        assert!(gate.check(Some("xyz"), Some("abc")).is_ok());
    }

    #[test]
    fn test_query_only_ignores_header_path() {
        let gate = AuthGate::new(Some("abc".into()));
        assert!(gate.check_query(None).is_err());
        assert!(gate.check_query(Some("abc")).is_ok());
    }
}
