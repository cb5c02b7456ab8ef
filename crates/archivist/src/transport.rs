//! HTTP transport: request building, response classification, recording.
//!
//! Every service round-trip funnels through here so that classification,
//! rate-limit retries and response recording behave identically for all
//! resource families.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use futures_util::StreamExt;

use crate::Result;
use crate::client::ArchivistClient;
use crate::error::{Error, TransportError, classify_failure, status_error};
use crate::history::ResponseSnapshot;
use crate::retry::with_rate_limit_retry;

/// Request header asking the service to report the total matching count.
pub(crate) const REQUEST_TOTAL_COUNT_HEADER: &str = "x-request-total-count";

/// Response header carrying that total.
pub(crate) const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Longest response body excerpt kept in the history ring.
const SNAPSHOT_BODY_LIMIT: usize = 4096;

/// Whether a request carries the bearer Authorization header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AuthMode {
    Bearer,
    Anonymous,
}

/// Headers and decoded JSON body of a successful response.
pub(crate) struct JsonResponse {
    pub(crate) headers: reqwest::header::HeaderMap,
    pub(crate) body: Value,
}

impl ArchivistClient {
    /// Authenticated GET returning the decoded JSON body.
    pub(crate) async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let response = self
            .round_trip(Method::GET, path, params, None, &[], AuthMode::Bearer)
            .await?;
        Ok(response.body)
    }

    /// Unauthenticated GET for endpoints that must not see credentials.
    pub(crate) async fn get_anonymous(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value> {
        let response = self
            .round_trip(Method::GET, path, params, None, &[], AuthMode::Anonymous)
            .await?;
        Ok(response.body)
    }

    /// Authenticated GET returning headers alongside the body.
    pub(crate) async fn get_with_headers(
        &self,
        path: &str,
        params: &[(String, String)],
        extra_headers: &[(&str, &str)],
    ) -> Result<JsonResponse> {
        self.round_trip(
            Method::GET,
            path,
            params,
            None,
            extra_headers,
            AuthMode::Bearer,
        )
        .await
    }

    /// Authenticated POST of a JSON body.
    pub(crate) async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .round_trip(Method::POST, path, &[], Some(body), &[], AuthMode::Bearer)
            .await?;
        Ok(response.body)
    }

    /// Authenticated PATCH of a JSON body.
    pub(crate) async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .round_trip(Method::PATCH, path, &[], Some(body), &[], AuthMode::Bearer)
            .await?;
        Ok(response.body)
    }

    /// Authenticated DELETE.
    pub(crate) async fn delete(&self, path: &str) -> Result<Value> {
        let response = self
            .round_trip(Method::DELETE, path, &[], None, &[], AuthMode::Bearer)
            .await?;
        Ok(response.body)
    }

    /// One classified JSON round-trip, retried while rate limited.
    async fn round_trip(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
        auth: AuthMode,
    ) -> Result<JsonResponse> {
        let endpoint = self.url().api_url(path);
        let url = endpoint.as_str();
        debug!(method = %method, url, "request");

        with_rate_limit_retry(|| {
            self.attempt(method.clone(), url, params, body, extra_headers, auth)
        })
        .await
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        extra_headers: &[(&str, &str)],
        auth: AuthMode,
    ) -> Result<JsonResponse> {
        let mut request = self.http().request(method.clone(), url);
        if !params.is_empty() {
            request = request.query(params);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if auth == AuthMode::Bearer {
            let token = self.bearer().await?;
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request_body = body.map(Value::to_string);
        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        self.snapshot(method.as_str(), url, status, &text);
        trace!(status = %status, "response");

        if let Some(err) = status_error(status, &headers, &text, request_body.as_deref()) {
            return Err(err);
        }

        // Some endpoints reply with an empty body on success.
        let body = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&text)?
        };
        Ok(JsonResponse { headers, body })
    }

    /// Anonymous form-encoded POST, used for the token exchange.
    pub(crate) async fn post_form<R>(&self, path: &str, form: &[(&str, &str)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let endpoint = self.url().api_url(path);
        let url = endpoint.as_str();
        debug!(url, "form request");

        with_rate_limit_retry(|| self.attempt_form(url, form)).await
    }

    async fn attempt_form<R>(&self, url: &str, form: &[(&str, &str)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self.http().post(url).form(form).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        // The body carries credentials, so only its presence is recorded.
        self.snapshot("POST", url, status, "[REDACTED]");

        if status.as_u16() >= 400 {
            return Err(classify_failure(status, &headers, &text, None));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Authenticated multipart upload of an in-memory blob.
    pub(crate) async fn post_multipart(
        &self,
        path: &str,
        file_name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<Value> {
        let endpoint = self.url().api_url(path);
        let url = endpoint.as_str();
        debug!(url, file_name, size = content.len(), "multipart upload");

        with_rate_limit_retry(|| {
            self.attempt_multipart(url, file_name, content_type, content.clone())
        })
        .await
    }

    async fn attempt_multipart(
        &self,
        url: &str,
        file_name: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<Value> {
        let part = reqwest::multipart::Part::bytes(content)
            .file_name(file_name.to_owned())
            .mime_str(content_type)
            .map_err(|e| Error::IllegalArgument {
                message: format!("invalid content type '{content_type}': {e}"),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let token = self.bearer().await?;
        let response = self
            .http()
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        self.snapshot("POST", url, status, &text);

        if status.as_u16() >= 400 {
            return Err(classify_failure(status, &headers, &text, None));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Authenticated GET streaming the raw body into `sink`.
    ///
    /// The status is classified before any byte reaches the sink, so a
    /// rate-limited attempt retries without writing twice.
    pub(crate) async fn get_stream<W>(
        &self,
        path: &str,
        params: &[(String, String)],
        sink: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let endpoint = self.url().api_url(path);
        let url = endpoint.as_str();
        debug!(url, "streaming download");

        let response = with_rate_limit_retry(|| self.attempt_stream(url, params)).await?;
        self.snapshot("GET", url, response.status(), "[streamed]");

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(TransportError::from)?;
            sink.write_all(&chunk).await?;
        }
        sink.flush().await?;
        Ok(())
    }

    async fn attempt_stream(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response> {
        let mut request = self.http().get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        let token = self.bearer().await?;
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            self.snapshot("GET", url, status, &text);
            return Err(classify_failure(status, &headers, &text, None));
        }
        Ok(response)
    }

    fn snapshot(&self, method: &str, url: &str, status: StatusCode, body: &str) {
        self.record_response(ResponseSnapshot {
            method: method.to_owned(),
            url: url.to_owned(),
            status: status.as_u16(),
            body: body.chars().take(SNAPSHOT_BODY_LIMIT).collect(),
        });
    }
}
