//! Location operations.
//!
//! Locations are plain reference records (no confirmation cycle). The
//! create-if-not-exists flow leans on signature lookups so repeated runs
//! of the same provisioning story stay idempotent.

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::error::Error;
use crate::paging::RecordStream;
use crate::query::deep_merge;
use crate::resources::ResourceRecord;

/// Version prefix for the location endpoints.
const LOCATIONS_SUBPATH: &str = "v2";

/// Family label: URL segment and list response field.
const LOCATIONS_LABEL: &str = "locations";

fn family_path() -> String {
    format!("{LOCATIONS_SUBPATH}/{LOCATIONS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{LOCATIONS_SUBPATH}/{identity}")
}

/// Location operations, obtained via [`ArchivistClient::locations`].
#[derive(Clone, Copy, Debug)]
pub struct LocationsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl LocationsClient<'_> {
    /// Create a location from top-level `props` plus `attributes`.
    ///
    /// `props` must be a JSON object (typically `display_name`,
    /// `description` and the coordinates).
    #[instrument(skip(self, props, attributes))]
    pub async fn create(&self, props: Value, attributes: Value) -> Result<ResourceRecord> {
        if !props.is_object() {
            return Err(Error::IllegalArgument {
                message: "location props must be a JSON object".to_owned(),
            });
        }
        let body = deep_merge(&props, &json!({ "attributes": attributes }));
        let body = self.client.with_fixture(LOCATIONS_LABEL, body);
        debug!("creating location");

        let created = self.client.post(&family_path(), &body).await?;
        ResourceRecord::new(created)
    }

    /// Read one location by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Lazily list locations matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let filter = self.client.filter_with_fixture(LOCATIONS_LABEL, filter);
        self.client
            .list_records(&family_path(), LOCATIONS_LABEL, page_size, filter.as_ref())
    }

    /// Count locations matching `filter` without listing them.
    pub async fn count(&self, filter: Option<Value>) -> Result<u64> {
        let filter = self.client.filter_with_fixture(LOCATIONS_LABEL, filter);
        self.client
            .count_records(&family_path(), filter.as_ref())
            .await
    }

    /// Read the single location matching `filter`.
    pub async fn read_by_signature(&self, filter: Option<Value>) -> Result<ResourceRecord> {
        let filter = self.client.filter_with_fixture(LOCATIONS_LABEL, filter);
        self.client
            .unique_record(&family_path(), LOCATIONS_LABEL, filter.as_ref())
            .await
    }

    /// Return the location matching `signature`, creating it when absent.
    ///
    /// Any other failure, a duplicate signature match included,
    /// propagates unchanged.
    #[instrument(skip(self, props, attributes, signature))]
    pub async fn create_if_not_exists(
        &self,
        props: Value,
        attributes: Value,
        signature: Value,
    ) -> Result<ResourceRecord> {
        match self.read_by_signature(Some(signature)).await {
            Ok(existing) => {
                debug!(identity = existing.identity(), "location already exists");
                Ok(existing)
            }
            Err(Error::NotFound { .. }) => self.create(props, attributes).await,
            Err(other) => Err(other),
        }
    }
}
