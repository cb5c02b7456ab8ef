//! Subject operations.
//!
//! Subjects identify sharing peers (other tenancies) by their signing
//! keys; access policies refer to them when granting visibility.

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::paging::RecordStream;
use crate::resources::ResourceRecord;

/// Version prefix for the subject endpoints.
const SUBJECTS_SUBPATH: &str = "iam/v1";

/// Family label: URL segment and list response field.
const SUBJECTS_LABEL: &str = "subjects";

fn family_path() -> String {
    format!("{SUBJECTS_SUBPATH}/{SUBJECTS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{SUBJECTS_SUBPATH}/{identity}")
}

/// Subject operations, obtained via [`ArchivistClient::subjects`].
#[derive(Clone, Copy, Debug)]
pub struct SubjectsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl SubjectsClient<'_> {
    /// Register a sharing peer by its public keys.
    #[instrument(skip(self, wallet_pub_keys, tessera_pub_keys))]
    pub async fn create(
        &self,
        display_name: &str,
        wallet_pub_keys: &[String],
        tessera_pub_keys: &[String],
    ) -> Result<ResourceRecord> {
        let body = json!({
            "display_name": display_name,
            "wallet_pub_key": wallet_pub_keys,
            "tessera_pub_key": tessera_pub_keys,
        });
        self.create_from_body(body).await
    }

    /// Register a sharing peer from a full request body.
    pub async fn create_from_body(&self, body: Value) -> Result<ResourceRecord> {
        let body = self.client.with_fixture(SUBJECTS_LABEL, body);
        debug!("creating subject");

        let created = self.client.post(&family_path(), &body).await?;
        ResourceRecord::new(created)
    }

    /// Read one subject by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Replace the named fields of a subject.
    #[instrument(skip(self, body))]
    pub async fn update(&self, identity: &str, body: Value) -> Result<ResourceRecord> {
        let updated = self.client.patch(&record_path(identity), &body).await?;
        ResourceRecord::new(updated)
    }

    /// Delete one subject by identity.
    #[instrument(skip(self))]
    pub async fn delete(&self, identity: &str) -> Result<()> {
        self.client.delete(&record_path(identity)).await?;
        Ok(())
    }

    /// Lazily list subjects matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let filter = self.client.filter_with_fixture(SUBJECTS_LABEL, filter);
        self.client
            .list_records(&family_path(), SUBJECTS_LABEL, page_size, filter.as_ref())
    }

    /// Count subjects matching `filter` without listing them.
    pub async fn count(&self, filter: Option<Value>) -> Result<u64> {
        let filter = self.client.filter_with_fixture(SUBJECTS_LABEL, filter);
        self.client
            .count_records(&family_path(), filter.as_ref())
            .await
    }
}
