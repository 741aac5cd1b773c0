//! Secure handling of provider API keys.
//!
//! Keys are wrapped in [`ApiCredential`] as soon as they are read from
//! the environment or a config file. The wrapper never renders the
//! value in `Debug`/`Display`; the raw string is only reachable
//! through an explicit [`ApiCredential::expose`] at the point an HTTP
//! header is built.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Where a credential was loaded from.
///
/// Useful when debugging configuration precedence without exposing the
/// value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Process environment variable.
    Environment,
    /// A local `.env` file.
    DotEnv,
    /// The user-home config file (`~/.mars/config`).
    ConfigFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::DotEnv => write!(f, ".env"),
            Self::ConfigFile => write!(f, "config file"),
        }
    }
}

/// A securely-stored API credential.
///
/// Memory is zeroed on drop via the `secrecy` crate, and the value
/// cannot accidentally reach logs through formatting.
#[derive(Clone)]
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self { value: SecretString::from(value.into()), source }
    }

    /// Expose the credential for use in an API call.
    ///
    /// Call this only at the point of use; never store the exposed
    /// value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED] from {}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_exposes_value() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Environment);

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "secret exposed in Debug");
        assert!(debug.contains("[REDACTED]"));

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "secret exposed in Display");
    }

    #[test]
    fn test_expose_returns_value() {
        let cred = ApiCredential::new("sk-abc", CredentialSource::DotEnv);
        assert_eq!(cred.expose(), "sk-abc");
        assert_eq!(cred.source(), CredentialSource::DotEnv);
    }

    #[test]
    fn test_empty_detection() {
        assert!(ApiCredential::new("", CredentialSource::ConfigFile).is_empty());
        assert!(!ApiCredential::new("x", CredentialSource::ConfigFile).is_empty());
    }
}
