//! Access policy operations.
//!
//! An access policy joins asset filters to subjects and the permissions
//! those subjects receive. Policy bodies are deep domain structures the
//! service validates, so this client passes them through unshaped.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::paging::RecordStream;
use crate::resources::ResourceRecord;

/// Version prefix for the access policy endpoints.
const ACCESS_POLICIES_SUBPATH: &str = "iam/v1";

/// Family label: URL segment and list response field.
const ACCESS_POLICIES_LABEL: &str = "access_policies";

fn family_path() -> String {
    format!("{ACCESS_POLICIES_SUBPATH}/{ACCESS_POLICIES_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{ACCESS_POLICIES_SUBPATH}/{identity}")
}

/// Access policy operations, obtained via
/// [`ArchivistClient::access_policies`].
#[derive(Clone, Copy, Debug)]
pub struct AccessPoliciesClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl AccessPoliciesClient<'_> {
    /// Create an access policy from a full request body.
    #[instrument(skip(self, body))]
    pub async fn create(&self, body: Value) -> Result<ResourceRecord> {
        let body = self.client.with_fixture(ACCESS_POLICIES_LABEL, body);
        debug!("creating access policy");

        let created = self.client.post(&family_path(), &body).await?;
        ResourceRecord::new(created)
    }

    /// Read one access policy by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Replace the named fields of an access policy.
    #[instrument(skip(self, body))]
    pub async fn update(&self, identity: &str, body: Value) -> Result<ResourceRecord> {
        let updated = self.client.patch(&record_path(identity), &body).await?;
        ResourceRecord::new(updated)
    }

    /// Delete one access policy by identity.
    #[instrument(skip(self))]
    pub async fn delete(&self, identity: &str) -> Result<()> {
        self.client.delete(&record_path(identity)).await?;
        Ok(())
    }

    /// Lazily list access policies matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let filter = self
            .client
            .filter_with_fixture(ACCESS_POLICIES_LABEL, filter);
        self.client.list_records(
            &family_path(),
            ACCESS_POLICIES_LABEL,
            page_size,
            filter.as_ref(),
        )
    }

    /// Count access policies matching `filter` without listing them.
    pub async fn count(&self, filter: Option<Value>) -> Result<u64> {
        let filter = self
            .client
            .filter_with_fixture(ACCESS_POLICIES_LABEL, filter);
        self.client
            .count_records(&family_path(), filter.as_ref())
            .await
    }
}
