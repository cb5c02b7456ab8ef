//! Compliance policy operations.
//!
//! A compliance policy describes a check the service applies to matching
//! assets (freshness of events, open-versus-closed cycles, attribute
//! currency). Policy bodies are passed through unshaped.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::paging::RecordStream;
use crate::resources::ResourceRecord;

/// Version prefix for the compliance policy endpoints.
const COMPLIANCE_POLICIES_SUBPATH: &str = "v1";

/// Family label: URL segment and list response field.
const COMPLIANCE_POLICIES_LABEL: &str = "compliance_policies";

fn family_path() -> String {
    format!("{COMPLIANCE_POLICIES_SUBPATH}/{COMPLIANCE_POLICIES_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{COMPLIANCE_POLICIES_SUBPATH}/{identity}")
}

/// Compliance policy operations, obtained via
/// [`ArchivistClient::compliance_policies`].
#[derive(Clone, Copy, Debug)]
pub struct CompliancePoliciesClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl CompliancePoliciesClient<'_> {
    /// Create a compliance policy from a full request body.
    #[instrument(skip(self, body))]
    pub async fn create(&self, body: Value) -> Result<ResourceRecord> {
        let body = self.client.with_fixture(COMPLIANCE_POLICIES_LABEL, body);
        debug!("creating compliance policy");

        let created = self.client.post(&family_path(), &body).await?;
        ResourceRecord::new(created)
    }

    /// Read one compliance policy by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Delete one compliance policy by identity.
    #[instrument(skip(self))]
    pub async fn delete(&self, identity: &str) -> Result<()> {
        self.client.delete(&record_path(identity)).await?;
        Ok(())
    }

    /// Lazily list compliance policies matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let filter = self
            .client
            .filter_with_fixture(COMPLIANCE_POLICIES_LABEL, filter);
        self.client.list_records(
            &family_path(),
            COMPLIANCE_POLICIES_LABEL,
            page_size,
            filter.as_ref(),
        )
    }

    /// Count compliance policies matching `filter` without listing them.
    pub async fn count(&self, filter: Option<Value>) -> Result<u64> {
        let filter = self
            .client
            .filter_with_fixture(COMPLIANCE_POLICIES_LABEL, filter);
        self.client
            .count_records(&family_path(), filter.as_ref())
            .await
    }
}
