//! Credential extraction from request headers.

use zeroize::Zeroizing;

use crate::error::{AuthzError, AuthzResult};

/// Header carrying the session token as `Bearer <token>`.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header carrying a service key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The credentials a request presented.
///
/// Both values are opaque. Header names match case-insensitively.
#[derive(Default)]
pub struct Credentials {
    bearer: Option<Zeroizing<String>>,
    api_key: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Extract credentials from `(name, value)` header pairs.
    ///
    /// An `Authorization` header with a scheme other than `Bearer` is ignored.
    /// Empty values count as absent.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut credentials = Self::default();
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                if let Some((scheme, token)) = value.trim().split_once(char::is_whitespace)
                    && scheme.eq_ignore_ascii_case("bearer")
                    && !token.trim().is_empty()
                {
                    credentials.bearer = Some(Zeroizing::new(token.trim().to_string()));
                }
            } else if name.eq_ignore_ascii_case(API_KEY_HEADER) && !value.trim().is_empty() {
                credentials.api_key = Some(Zeroizing::new(value.trim().to_string()));
            }
        }
        credentials
    }

    /// The bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MissingCredentials`] if none was presented.
    pub fn session_token(&self) -> AuthzResult<&str> {
        self.bearer
            .as_deref()
            .map(String::as_str)
            .ok_or(AuthzError::MissingCredentials)
    }

    /// The service key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MissingCredentials`] if none was presented.
    pub fn api_key(&self) -> AuthzResult<&str> {
        self.api_key
            .as_deref()
            .map(String::as_str)
            .ok_or(AuthzError::MissingCredentials)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer", &self.bearer.is_some())
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_both() {
        let creds = Credentials::from_headers([
            ("Authorization", "Bearer abc.def"),
            ("X-API-KEY", "wk_123"),
            ("Content-Type", "application/json"),
        ]);
        assert_eq!(creds.session_token().unwrap(), "abc.def");
        assert_eq!(creds.api_key().unwrap(), "wk_123");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let creds = Credentials::from_headers([("authorization", "bearer   tok")]);
        assert_eq!(creds.session_token().unwrap(), "tok");
    }

    #[test]
    fn test_missing_and_foreign_schemes() {
        let creds = Credentials::from_headers([
            ("Authorization", "Basic dXNlcjpwYXNz"),
            ("X-Api-Key", "  "),
        ]);
        assert!(matches!(creds.session_token(), Err(AuthzError::MissingCredentials)));
        assert!(matches!(creds.api_key(), Err(AuthzError::MissingCredentials)));
    }

    #[test]
    fn test_debug_redacts() {
        let creds = Credentials::from_headers([("Authorization", "Bearer secret-token")]);
        assert!(!format!("{creds:?}").contains("secret-token"));
    }
}
