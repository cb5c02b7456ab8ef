//! Client handle, configuration and resource family accessors.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::debug;

use crate::Result;
use crate::auth::{BearerToken, ClientSecret, Credential, TokenCache};
use crate::confirm::ConfirmOptions;
use crate::error::{Error, TransportError};
use crate::history::{DEFAULT_RESPONSE_HISTORY, ResponseHistory, ResponseSnapshot};
use crate::query::deep_merge;
use crate::resources::{
    AccessPoliciesClient, ApplicationsClient, AssetsClient, AttachmentsClient, ComplianceClient,
    CompliancePoliciesClient, EventsClient, LocationsClient, SbomsClient, SubjectsClient,
    TenanciesClient,
};
use crate::types::ServiceUrl;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A connection to one archivist service tenancy.
///
/// All resource operations hang off a client: obtain family handles via
/// the accessor methods ([`assets`](Self::assets), [`events`](Self::events)
/// and so on). Clients are cheap to clone (they use internal `Arc`) and
/// safe to share across tasks; token refresh is handled internally with
/// appropriate synchronization.
///
/// # Example
///
/// ```no_run
/// use archivist::ArchivistClient;
/// use serde_json::json;
///
/// # async fn example() -> archivist::Result<()> {
/// let client = ArchivistClient::builder("https://app.datatrails.ai")
///     .with_client_credentials("my-client-id", "my-client-secret")
///     .build()?;
///
/// let asset = client
///     .assets()
///     .create(json!({"arc_display_name": "Front door"}), true)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArchivistClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    url: ServiceUrl,
    http: reqwest::Client,
    credential: Credential,
    token_cache: TokenCache,
    history: Mutex<ResponseHistory>,
    confirm: ConfirmOptions,
    fixtures: Map<String, Value>,
}

impl ArchivistClient {
    /// Start configuring a client for the service at `url`.
    pub fn builder(url: impl Into<String>) -> ArchivistClientBuilder {
        ArchivistClientBuilder::new(url)
    }

    /// Returns the service URL this client is configured for.
    pub fn url(&self) -> &ServiceUrl {
        &self.inner.url
    }

    /// The most recently received responses, oldest first.
    ///
    /// Useful when diagnosing a failed run after the fact. Bounded by the
    /// capacity configured at build time.
    pub fn recent_responses(&self) -> Vec<ResponseSnapshot> {
        match self.inner.history.lock() {
            Ok(history) => history.snapshot(),
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    pub(crate) fn token_cache(&self) -> &TokenCache {
        &self.inner.token_cache
    }

    pub(crate) fn confirm_options(&self) -> &ConfirmOptions {
        &self.inner.confirm
    }

    pub(crate) fn record_response(&self, snapshot: ResponseSnapshot) {
        // Diagnostics only; a poisoned lock just stops the recording.
        if let Ok(mut history) = self.inner.history.lock() {
            history.push(snapshot);
        }
    }

    /// Request body with the family's fixture defaults folded underneath.
    pub(crate) fn with_fixture(&self, family: &str, body: Value) -> Value {
        match self.inner.fixtures.get(family) {
            Some(fixture) => deep_merge(fixture, &body),
            None => body,
        }
    }

    /// Filter with the family's fixture defaults folded underneath.
    pub(crate) fn filter_with_fixture(&self, family: &str, filter: Option<Value>) -> Option<Value> {
        match (self.inner.fixtures.get(family), filter) {
            (Some(fixture), Some(filter)) => Some(deep_merge(fixture, &filter)),
            (Some(fixture), None) => Some(fixture.clone()),
            (None, filter) => filter,
        }
    }

    // ========================================================================
    // Resource Families
    // ========================================================================

    /// Asset operations.
    pub fn assets(&self) -> AssetsClient<'_> {
        AssetsClient { client: self }
    }

    /// Event operations.
    pub fn events(&self) -> EventsClient<'_> {
        EventsClient { client: self }
    }

    /// Attachment uploads and downloads.
    pub fn attachments(&self) -> AttachmentsClient<'_> {
        AttachmentsClient { client: self }
    }

    /// Location operations.
    pub fn locations(&self) -> LocationsClient<'_> {
        LocationsClient { client: self }
    }

    /// Subject (sharing peer) operations.
    pub fn subjects(&self) -> SubjectsClient<'_> {
        SubjectsClient { client: self }
    }

    /// Access policy operations.
    pub fn access_policies(&self) -> AccessPoliciesClient<'_> {
        AccessPoliciesClient { client: self }
    }

    /// App registration operations.
    pub fn applications(&self) -> ApplicationsClient<'_> {
        ApplicationsClient { client: self }
    }

    /// Compliance evaluation.
    pub fn compliance(&self) -> ComplianceClient<'_> {
        ComplianceClient { client: self }
    }

    /// Compliance policy operations.
    pub fn compliance_policies(&self) -> CompliancePoliciesClient<'_> {
        CompliancePoliciesClient { client: self }
    }

    /// Tenancy operations.
    pub fn tenancies(&self) -> TenanciesClient<'_> {
        TenanciesClient { client: self }
    }

    /// Software bill of materials operations.
    pub fn sboms(&self) -> SbomsClient<'_> {
        SbomsClient { client: self }
    }
}

// Custom Debug impl that hides sensitive data
impl std::fmt::Debug for ArchivistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivistClient")
            .field("url", &self.inner.url)
            .field("credential", &self.inner.credential)
            .finish()
    }
}

/// Builder for [`ArchivistClient`].
///
/// Exactly one credential source must be supplied: either a bearer token
/// or an app registration (client id and secret).
#[derive(Debug)]
pub struct ArchivistClientBuilder {
    url: String,
    bearer_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    verify_tls: bool,
    request_timeout: Duration,
    response_history: usize,
    confirm: ConfirmOptions,
    fixtures: Map<String, Value>,
}

impl ArchivistClientBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            client_id: None,
            client_secret: None,
            verify_tls: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            response_history: DEFAULT_RESPONSE_HISTORY,
            confirm: ConfirmOptions::default(),
            fixtures: Map::new(),
        }
    }

    /// Authenticate with a ready-made bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Authenticate with an app registration, exchanging its credentials
    /// for short-lived tokens as needed.
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Verify the service's TLS certificate (on by default).
    ///
    /// Disabling this is intended for test instances with self-signed
    /// certificates only.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How many recent responses to retain for inspection.
    pub fn with_response_history(mut self, capacity: usize) -> Self {
        self.response_history = capacity;
        self
    }

    /// Tuning for confirmation polling.
    pub fn with_confirm_options(mut self, options: ConfirmOptions) -> Self {
        self.confirm = options;
        self
    }

    /// Default request content for one resource family.
    ///
    /// The fixture is deep-merged underneath every request body and
    /// filter for that family; explicit caller values win collisions.
    pub fn with_fixture(mut self, family: impl Into<String>, fixture: Value) -> Self {
        self.fixtures.insert(family.into(), fixture);
        self
    }

    /// Validate the configuration and construct the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, if no credential or more
    /// than one credential source was supplied, if the confirmation
    /// multiplier is below one, or if the underlying HTTP client cannot
    /// be constructed.
    pub fn build(self) -> Result<ArchivistClient> {
        let url = ServiceUrl::new(&self.url)?;
        let credential = self.credential()?;

        if !self.confirm.multiplier.is_finite() || self.confirm.multiplier < 1.0 {
            return Err(Error::IllegalArgument {
                message: "confirmation delay multiplier must be at least 1".to_owned(),
            });
        }

        if !self.verify_tls {
            debug!("TLS certificate verification disabled");
        }

        // Bodyless verbs carry the JSON content type too; form and
        // multipart requests override it per call.
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!("archivist/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(!self.verify_tls)
            .build()
            .map_err(|e| {
                Error::Transport(TransportError::Http {
                    message: format!("failed to build HTTP client: {e}"),
                })
            })?;

        Ok(ArchivistClient {
            inner: Arc::new(ClientInner {
                url,
                http,
                credential,
                token_cache: TokenCache::new(),
                history: Mutex::new(ResponseHistory::new(self.response_history)),
                confirm: self.confirm,
                fixtures: self.fixtures,
            }),
        })
    }

    fn credential(&self) -> Result<Credential> {
        match (&self.bearer_token, &self.client_id, &self.client_secret) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::IllegalArgument {
                message: "supply either a bearer token or client credentials, not both".to_owned(),
            }),
            (Some(token), None, None) => Ok(Credential::Token(BearerToken::new(token))),
            (None, Some(id), Some(secret)) => Ok(Credential::AppRegistration {
                client_id: id.clone(),
                client_secret: ClientSecret::new(secret),
            }),
            (None, _, _) => Err(Error::IllegalArgument {
                message: "no credentials: supply a bearer token or client credentials".to_owned(),
            }),
        }
    }
}
