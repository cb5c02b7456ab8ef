//! Event operations.
//!
//! Events record things that happened to an asset. They are nested under
//! their asset's URL and are never modified once written; like assets
//! they confirm asynchronously.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::confirm::{self, ConfirmationReader};
use crate::error::Error;
use crate::paging::RecordStream;
use crate::query::deep_merge;
use crate::resources::ResourceRecord;

/// Version prefix for the event endpoints.
const EVENTS_SUBPATH: &str = "v2";

/// Family label: URL segment and list response field.
const EVENTS_LABEL: &str = "events";

/// Asset identity addressing events across every asset.
const WILDCARD_ASSET: &str = "assets/-";

fn family_path(asset_identity: &str) -> String {
    format!("{EVENTS_SUBPATH}/{asset_identity}/{EVENTS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{EVENTS_SUBPATH}/{identity}")
}

/// Event operations, obtained via [`ArchivistClient::events`].
#[derive(Clone, Copy, Debug)]
pub struct EventsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl EventsClient<'_> {
    /// Record an event against `asset_identity`.
    ///
    /// `props` carries the operation fields (`operation`, `behaviour`,
    /// timestamps and so on) and must be a JSON object; `attributes`
    /// becomes the event's attribute mapping. With `confirm` set, blocks
    /// until the event is `CONFIRMED`.
    #[instrument(skip(self, props, attributes))]
    pub async fn create(
        &self,
        asset_identity: &str,
        props: Value,
        attributes: Value,
        confirm: bool,
    ) -> Result<ResourceRecord> {
        if !props.is_object() {
            return Err(Error::IllegalArgument {
                message: "event props must be a JSON object".to_owned(),
            });
        }
        let body = deep_merge(&props, &json!({ "event_attributes": attributes }));
        let body = self.client.with_fixture(EVENTS_LABEL, body);
        debug!(asset_identity, "creating event");

        let created = self
            .client
            .post(&family_path(asset_identity), &body)
            .await?;
        let record = ResourceRecord::new(created)?;
        if !confirm {
            return Ok(record);
        }

        let identity = record.identity().ok_or_else(|| Error::BadField {
            field: "identity".to_owned(),
            url: self.client.url().api_url(&family_path(asset_identity)),
        })?;
        self.wait_for_confirmation(identity).await
    }

    /// Read one event by its full identity
    /// (`assets/<uuid>/events/<uuid>`).
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Lazily list events matching `filter`.
    ///
    /// Without `asset_identity` the listing spans every asset.
    pub fn list(
        &self,
        asset_identity: Option<&str>,
        page_size: Option<u32>,
        filter: Option<Value>,
    ) -> RecordStream {
        let asset = asset_identity.unwrap_or(WILDCARD_ASSET);
        let filter = self.client.filter_with_fixture(EVENTS_LABEL, filter);
        self.client
            .list_records(&family_path(asset), EVENTS_LABEL, page_size, filter.as_ref())
    }

    /// Count events matching `filter` without listing them.
    pub async fn count(&self, asset_identity: Option<&str>, filter: Option<Value>) -> Result<u64> {
        let asset = asset_identity.unwrap_or(WILDCARD_ASSET);
        let filter = self.client.filter_with_fixture(EVENTS_LABEL, filter);
        self.client
            .count_records(&family_path(asset), filter.as_ref())
            .await
    }

    /// Read the single event matching `filter`.
    pub async fn read_by_signature(
        &self,
        asset_identity: Option<&str>,
        filter: Option<Value>,
    ) -> Result<ResourceRecord> {
        let asset = asset_identity.unwrap_or(WILDCARD_ASSET);
        let filter = self.client.filter_with_fixture(EVENTS_LABEL, filter);
        self.client
            .unique_record(&family_path(asset), EVENTS_LABEL, filter.as_ref())
            .await
    }

    /// Block until `identity` reaches a terminal confirmation state.
    #[instrument(skip(self))]
    pub async fn wait_for_confirmation(&self, identity: &str) -> Result<ResourceRecord> {
        confirm::wait_for_confirmation(self, identity, self.client.confirm_options()).await
    }
}

#[async_trait]
impl ConfirmationReader for EventsClient<'_> {
    async fn read_record(&self, identity: &str) -> Result<ResourceRecord> {
        self.read(identity).await
    }
}
