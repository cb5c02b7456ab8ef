//! Service URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::Error;

/// Root segment prefixed to every API path.
const API_ROOT: &str = "archivist";

/// A validated archivist service URL.
///
/// This type ensures the URL is absolute, uses HTTPS (or HTTP for localhost),
/// and is properly normalized for API endpoint construction.
///
/// # Example
///
/// ```
/// use archivist::ServiceUrl;
///
/// let service = ServiceUrl::new("https://app.datatrails.ai").unwrap();
/// assert_eq!(service.api_url("v2/assets"),
///            "https://app.datatrails.ai/archivist/v2/assets");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceUrl(Url);

impl ServiceUrl {
    /// Create a new service URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| Error::IllegalArgument {
            message: format!("invalid service URL '{s}': {e}"),
        })?;

        Self::validate(&url, s)?;

        // Normalize: remove trailing slash
        let normalized = if url.path() == "/" {
            let mut u = url.clone();
            u.set_path("");
            u
        } else {
            url
        };

        Ok(Self(normalized))
    }

    /// Returns the full endpoint URL for a path under the API root.
    pub fn api_url(&self, path: &str) -> String {
        // The URL crate always adds a trailing slash to root paths,
        // so we need to handle that when constructing endpoint URLs
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}/{}/{}", base, API_ROOT, path)
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        // Must be absolute
        if url.cannot_be_a_base() {
            return Err(Error::IllegalArgument {
                message: format!("invalid service URL '{original}': must be an absolute URL"),
            });
        }

        // Must be HTTPS (or HTTP for localhost)
        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "::1");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(Error::IllegalArgument {
                message: format!(
                    "invalid service URL '{original}': must use HTTPS (HTTP allowed only for localhost)"
                ),
            });
        }

        // Must have a host
        if url.host_str().is_none() {
            return Err(Error::IllegalArgument {
                message: format!("invalid service URL '{original}': must have a host"),
            });
        }

        Ok(())
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServiceUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServiceUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ServiceUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
