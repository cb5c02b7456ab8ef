//! Error types for the archivist library.
//!
//! This module provides a unified error type with one variant per failure
//! class the service reports, so callers can match on exactly the cases
//! they want to handle (rate limiting, missing entities, duplicates)
//! without string-sniffing response bodies.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Response header carrying the wait (in seconds) after a rate-limited call.
pub(crate) const RATE_LIMIT_RESET_HEADER: &str = "archivist-rate-limit-reset";

/// Longest response body excerpt carried inside an error message.
const BODY_EXCERPT_LIMIT: usize = 200;

/// The unified error type for archivist operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request was malformed (HTTP 400).
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Credentials are missing, expired or invalid (HTTP 401).
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// The tenancy has an outstanding billing problem (HTTP 402).
    #[error("payment required: {message}")]
    PaymentRequired { message: String },

    /// Authenticated but not permitted (HTTP 403).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// The entity does not exist (HTTP 404).
    #[error("not found: {subject}")]
    NotFound { subject: String },

    /// Rate limited (HTTP 429), carrying the server-specified wait.
    #[error("too many requests: retry after {retry_after}s")]
    TooManyRequests { retry_after: f64 },

    /// The endpoint is not implemented (HTTP 501).
    #[error("not implemented: {message}")]
    NotImplemented { message: String },

    /// The service is temporarily unavailable (HTTP 503).
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// Any other 4xx response.
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// Any other 5xx response.
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// A status outside the classified ranges.
    #[error("unexpected response (HTTP {status}): {message}")]
    Unexpected { status: u16, message: String },

    /// An expected field was absent from a JSON response.
    #[error("field '{field}' absent in response from {url}")]
    BadField { field: String, url: String },

    /// An expected response header was absent or unreadable.
    #[error("header '{header}' absent in response from {url}")]
    MissingHeader { header: String, url: String },

    /// A signature lookup matched more than one record.
    #[error("{count} records match one {subject} signature, expected exactly one")]
    Duplicate { subject: String, count: usize },

    /// A resource never reached a terminal confirmation state.
    #[error("unconfirmed: {reason}")]
    Unconfirmed { reason: String },

    /// The caller supplied contradictory or insufficient parameters.
    #[error("illegal argument: {message}")]
    IllegalArgument { message: String },

    /// A story step named an action outside the registry.
    #[error("invalid operation: {action}")]
    InvalidOperation { action: String },

    /// A response body could not be decoded as JSON.
    #[error("response decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// A story file could not be parsed as YAML.
    #[error("story parse: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Reading an upload source or writing a download sink failed.
    #[error("stream I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Error body shape the service returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Classify a response by status code.
///
/// Returns `None` for anything below 400; every status from 400 upward
/// maps to exactly one [`Error`] variant. `request_body` is the JSON sent
/// with the request, used to recover the identity a 404 refers to.
pub(crate) fn status_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    request_body: Option<&str>,
) -> Option<Error> {
    if status.as_u16() < 400 {
        return None;
    }
    Some(classify_failure(status, headers, body, request_body))
}

/// Map a failed (>= 400) response to its error variant.
pub(crate) fn classify_failure(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    request_body: Option<&str>,
) -> Error {
    let message = body_message(body);
    match status.as_u16() {
        400 => Error::BadRequest { message },
        401 => Error::Unauthenticated { message },
        402 => Error::PaymentRequired { message },
        403 => Error::Forbidden { message },
        404 => Error::NotFound {
            subject: request_identity(request_body),
        },
        429 => Error::TooManyRequests {
            retry_after: retry_after(headers),
        },
        501 => Error::NotImplemented { message },
        503 => Error::Unavailable { message },
        status @ 400..=499 => Error::Client { status, message },
        status @ 500..=599 => Error::Server { status, message },
        status => Error::Unexpected { status, message },
    }
}

/// Best-effort human message from an error response body.
fn body_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => match (parsed.error, parsed.message) {
            (Some(error), Some(message)) => format!("[{error}] {message}"),
            (Some(error), None) => error,
            (None, Some(message)) => message,
            (None, None) => excerpt(body),
        },
        Err(_) => excerpt(body),
    }
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(BODY_EXCERPT_LIMIT).collect()
}

/// Identity of the entity a 404 refers to, recovered from the request
/// body that was sent. Falls back to "unknown" when the body is absent,
/// malformed or carries no identity.
fn request_identity(request_body: Option<&str>) -> String {
    request_body
        .and_then(|body| serde_json::from_str::<Value>(body).ok())
        .and_then(|value| {
            value
                .get("identity")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Seconds to wait, read from the rate-limit reset header. Unparseable
/// or absent headers count as zero, which disables the retry.
fn retry_after(headers: &HeaderMap) -> f64 {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(status: u16) -> Option<Error> {
        let status = StatusCode::from_u16(status).unwrap();
        status_error(status, &HeaderMap::new(), "", None)
    }

    #[test]
    fn success_statuses_are_not_errors() {
        assert!(classify(200).is_none());
        assert!(classify(204).is_none());
        assert!(classify(302).is_none());
    }

    #[test]
    fn known_statuses_map_to_dedicated_variants() {
        assert!(matches!(classify(400), Some(Error::BadRequest { .. })));
        assert!(matches!(classify(401), Some(Error::Unauthenticated { .. })));
        assert!(matches!(classify(402), Some(Error::PaymentRequired { .. })));
        assert!(matches!(classify(403), Some(Error::Forbidden { .. })));
        assert!(matches!(classify(404), Some(Error::NotFound { .. })));
        assert!(matches!(
            classify(429),
            Some(Error::TooManyRequests { .. })
        ));
        assert!(matches!(classify(501), Some(Error::NotImplemented { .. })));
        assert!(matches!(classify(503), Some(Error::Unavailable { .. })));
    }

    #[test]
    fn unlisted_statuses_fall_back_by_range() {
        assert!(matches!(
            classify(418),
            Some(Error::Client { status: 418, .. })
        ));
        assert!(matches!(
            classify(500),
            Some(Error::Server { status: 500, .. })
        ));
        assert!(matches!(
            classify(599),
            Some(Error::Server { status: 599, .. })
        ));
        assert!(matches!(
            classify(604),
            Some(Error::Unexpected { status: 604, .. })
        ));
    }

    #[test]
    fn retry_after_comes_from_the_reset_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RESET_HEADER, "2.5".parse().unwrap());
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "", None);
        match err {
            Some(Error::TooManyRequests { retry_after }) => assert_eq!(retry_after, 2.5),
            other => panic!("expected TooManyRequests, got {other:?}"),
        }
    }

    #[test]
    fn missing_or_garbled_reset_header_reads_as_zero() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "", None);
        assert!(matches!(
            err,
            Some(Error::TooManyRequests { retry_after }) if retry_after == 0.0
        ));

        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RESET_HEADER, "soon".parse().unwrap());
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &headers, "", None);
        assert!(matches!(
            err,
            Some(Error::TooManyRequests { retry_after }) if retry_after == 0.0
        ));
    }

    #[test]
    fn not_found_recovers_identity_from_request_body() {
        let body = r#"{"identity": "assets/1234", "attributes": {}}"#;
        let err = status_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "", Some(body));
        match err {
            Some(Error::NotFound { subject }) => assert_eq!(subject, "assets/1234"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn not_found_without_usable_identity_reads_unknown() {
        for request_body in [None, Some("not json"), Some(r#"{"attributes": {}}"#)] {
            let err = status_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "", request_body);
            match err {
                Some(Error::NotFound { subject }) => assert_eq!(subject, "unknown"),
                other => panic!("expected NotFound, got {other:?}"),
            }
        }
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error": "quota", "message": "tenancy over limit"}"#;
        let err = status_error(StatusCode::FORBIDDEN, &HeaderMap::new(), body, None);
        match err {
            Some(Error::Forbidden { message }) => {
                assert_eq!(message, "[quota] tenancy over limit");
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn error_message_falls_back_to_body_excerpt() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            &HeaderMap::new(),
            "<html>nope</html>",
            None,
        );
        match err {
            Some(Error::BadRequest { message }) => assert_eq!(message, "<html>nope</html>"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }
}
