//! App registration operations.
//!
//! Applications are machine credentials: creating one returns the
//! client id and, once only, its secret. The secret can be rotated
//! server-side without recreating the registration.

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::paging::RecordStream;
use crate::resources::ResourceRecord;

/// Version prefix for the application endpoints.
const APPLICATIONS_SUBPATH: &str = "iam/v1";

/// Family label: URL segment and list response field.
const APPLICATIONS_LABEL: &str = "applications";

fn family_path() -> String {
    format!("{APPLICATIONS_SUBPATH}/{APPLICATIONS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{APPLICATIONS_SUBPATH}/{identity}")
}

/// Application operations, obtained via
/// [`ArchivistClient::applications`].
#[derive(Clone, Copy, Debug)]
pub struct ApplicationsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl ApplicationsClient<'_> {
    /// Register an application with optional custom JWT claims.
    ///
    /// The returned record carries the one-time `credentials` including
    /// the secret; it is not retrievable later.
    #[instrument(skip(self, custom_claims))]
    pub async fn create(&self, display_name: &str, custom_claims: Value) -> Result<ResourceRecord> {
        let body = json!({
            "display_name": display_name,
            "custom_claims": custom_claims,
        });
        debug!("creating application");

        let created = self.client.post(&family_path(), &body).await?;
        ResourceRecord::new(created)
    }

    /// Read one application by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Replace the named fields of an application.
    #[instrument(skip(self, body))]
    pub async fn update(&self, identity: &str, body: Value) -> Result<ResourceRecord> {
        let updated = self.client.patch(&record_path(identity), &body).await?;
        ResourceRecord::new(updated)
    }

    /// Delete one application by identity.
    #[instrument(skip(self))]
    pub async fn delete(&self, identity: &str) -> Result<()> {
        self.client.delete(&record_path(identity)).await?;
        Ok(())
    }

    /// Lazily list applications matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        self.client
            .list_records(&family_path(), APPLICATIONS_LABEL, page_size, filter.as_ref())
    }

    /// Issue a fresh secret for the application, invalidating the old one.
    #[instrument(skip(self))]
    pub async fn regenerate_secret(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{}:regenerate-secret", record_path(identity));
        let updated = self.client.post(&path, &json!({})).await?;
        ResourceRecord::new(updated)
    }
}
