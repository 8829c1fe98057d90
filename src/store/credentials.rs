//! Principal credential lookup.
//!
//! Tokens have been stored under several key names over time, with and
//! without a `Bearer ` prefix. A [`CredentialResolver`] walks its configured
//! keys in order and normalizes the first usable value into the single
//! `Authorization` header value the ticket service expects.
//!
//! # Security Note - Logging
//!
//! Header values are held in [`SecretBox`] and wrapped in [`AuthHeader`],
//! whose `Debug` output is redacted. Never format the exposed value.

use std::collections::HashMap;
use std::env;
use std::fmt;

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretBox};

use crate::config::CredentialConfig;
use crate::error::{DeskError, Result};

const BEARER: &str = "Bearer";

/// A key-value store that may hold the principal's token.
pub trait CredentialSource: Send + Sync {
    fn get(&self, key: &str) -> Option<SecretBox<String>>;
}

/// In-process key-value credential store.
#[derive(Default)]
pub struct MemoryCredentials {
    entries: RwLock<HashMap<String, SecretBox<String>>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .insert(key.to_string(), SecretBox::new(Box::new(value.to_string())));
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl CredentialSource for MemoryCredentials {
    fn get(&self, key: &str) -> Option<SecretBox<String>> {
        self.entries
            .read()
            .get(key)
            .map(|secret| SecretBox::new(Box::new(secret.expose_secret().clone())))
    }
}

impl fmt::Debug for MemoryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("MemoryCredentials")
            .field("keys", &keys)
            .finish()
    }
}

/// Reads `<PREFIX><KEY>` environment variables, key upper-cased.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    prefix: String,
}

impl EnvCredentials {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_ascii_uppercase())
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new("HELPDESK_")
    }
}

impl CredentialSource for EnvCredentials {
    fn get(&self, key: &str) -> Option<SecretBox<String>> {
        env::var(self.var_name(key))
            .ok()
            .map(|value| SecretBox::new(Box::new(value)))
    }
}

/// A normalized `Authorization` header value: always `Bearer <token>`.
pub struct AuthHeader(SecretBox<String>);

impl AuthHeader {
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHeader([REDACTED])")
    }
}

/// Normalize a stored token into a header value.
///
/// Accepts an already-prefixed value (prefix matched case-insensitively) or a
/// bare token. Blank input, or a prefix with nothing after it, yields `None`.
pub fn normalize_bearer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let token = match trimmed.split_once(char::is_whitespace) {
        Some((scheme, rest)) if unicase::eq_ascii(scheme, BEARER) => rest.trim(),
        _ if unicase::eq_ascii(trimmed, BEARER) => "",
        _ => trimmed,
    };
    if token.is_empty() {
        None
    } else {
        Some(format!("{BEARER} {token}"))
    }
}

/// Looks up the principal's token across legacy keys in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialResolver {
    keys: Vec<String>,
}

impl CredentialResolver {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &CredentialConfig) -> Self {
        Self::new(config.keys.iter().cloned())
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Resolve the header value, or `Auth` if no key holds a usable token.
    pub fn resolve(&self, source: &dyn CredentialSource) -> Result<AuthHeader> {
        for key in &self.keys {
            let Some(secret) = source.get(key) else {
                continue;
            };
            if let Some(header) = normalize_bearer(secret.expose_secret()) {
                tracing::debug!("using credential from key '{key}'");
                return Ok(AuthHeader(SecretBox::new(Box::new(header))));
            }
        }
        Err(DeskError::Auth(format!(
            "no access token found (looked for: {})",
            self.keys.join(", ")
        )))
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::from_config(&CredentialConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_normalize_bare_token() {
        assert_eq!(normalize_bearer("abc123"), Some("Bearer abc123".to_string()));
        assert_eq!(
            normalize_bearer("  abc123 \n"),
            Some("Bearer abc123".to_string())
        );
    }

    #[test]
    fn test_normalize_prefixed_token() {
        assert_eq!(
            normalize_bearer("Bearer abc123"),
            Some("Bearer abc123".to_string())
        );
        assert_eq!(
            normalize_bearer("bearer   abc123"),
            Some("Bearer abc123".to_string())
        );
    }

    #[test]
    fn test_normalize_empty_values() {
        assert_eq!(normalize_bearer(""), None);
        assert_eq!(normalize_bearer("   "), None);
        assert_eq!(normalize_bearer("Bearer"), None);
        assert_eq!(normalize_bearer("Bearer   "), None);
    }

    #[test]
    fn test_resolve_follows_key_precedence() {
        let source = MemoryCredentials::new()
            .with("auth_token", "Bearer from-auth-token")
            .with("token", "from-token");
        let resolver = CredentialResolver::default();

        let header = resolver.resolve(&source).unwrap();
        assert_eq!(header.expose(), "Bearer from-token");
    }

    #[test]
    fn test_resolve_falls_through_blank_keys() {
        let source = MemoryCredentials::new()
            .with("token", "  ")
            .with("auth_token", "Bearer legacy");
        let header = CredentialResolver::default().resolve(&source).unwrap();
        assert_eq!(header.expose(), "Bearer legacy");
    }

    #[test]
    fn test_resolve_missing_is_auth_error() {
        let source = MemoryCredentials::new().with("unrelated", "x");
        let err = CredentialResolver::default().resolve(&source).unwrap_err();
        assert!(matches!(err, DeskError::Auth(_)));
        assert!(err.to_string().contains("token, auth_token"));
    }

    #[test]
    fn test_resolve_after_removal() {
        let source = MemoryCredentials::new().with("token", "abc");
        source.remove("token");
        assert!(CredentialResolver::default().resolve(&source).is_err());
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let source = MemoryCredentials::new().with("token", "s3cret");
        let header = CredentialResolver::default().resolve(&source).unwrap();
        assert!(!format!("{header:?}").contains("s3cret"));
        assert!(!format!("{source:?}").contains("s3cret"));
    }

    #[test]
    #[serial]
    fn test_env_credentials() {
        let source = EnvCredentials::new("TICKETDESK_TEST_");
        unsafe {
            env::set_var("TICKETDESK_TEST_AUTH_TOKEN", "env-token");
        }
        let header = CredentialResolver::default().resolve(&source);
        unsafe {
            env::remove_var("TICKETDESK_TEST_AUTH_TOKEN");
        }
        assert_eq!(header.unwrap().expose(), "Bearer env-token");
    }
}
