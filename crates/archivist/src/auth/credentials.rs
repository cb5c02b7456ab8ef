//! Credential types for archivist authentication.

use std::fmt;

/// A bearer token presented on every authenticated request.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone)]
pub struct BearerToken(pub(crate) String);

impl BearerToken {
    /// Create a new bearer token.
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP authorization headers.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

/// The secret half of an app registration.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Sent only to the token endpoint during the credential exchange
#[derive(Clone)]
pub struct ClientSecret(pub(crate) String);

impl ClientSecret {
    /// Create a new client secret.
    pub(crate) fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret value for use in token exchange requests.
    ///
    /// # Security
    ///
    /// Use only when constructing token endpoint form bodies.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide secret value in Debug output
impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientSecret").field(&"[REDACTED]").finish()
    }
}

/// How the client authenticates to the service.
#[derive(Clone, Debug)]
pub enum Credential {
    /// A ready-made bearer token supplied by the caller.
    Token(BearerToken),
    /// An app registration exchanged for short-lived tokens on demand.
    AppRegistration {
        /// Registration identifier, safe to log.
        client_id: String,
        /// Registration secret.
        client_secret: ClientSecret,
    },
}
