//! Asset operations.
//!
//! Assets are the ledger's primary entities; everything else attaches to
//! or describes them. Creation is asynchronous server-side, so most
//! callers create with `confirm` set and receive the committed record.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::confirm::{self, CONFIRMATION_STATUS, ConfirmationReader, FAILED, PENDING};
use crate::error::Error;
use crate::paging::RecordStream;
use crate::query::deep_merge;
use crate::resources::ResourceRecord;

/// Version prefix for the asset endpoints.
const ASSETS_SUBPATH: &str = "v2";

/// Family label: URL segment and list response field.
const ASSETS_LABEL: &str = "assets";

/// Behaviours granted to assets created without an explicit set.
const DEFAULT_BEHAVIOURS: [&str; 2] = ["RecordEvidence", "Attachments"];

fn family_path() -> String {
    format!("{ASSETS_SUBPATH}/{ASSETS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{ASSETS_SUBPATH}/{identity}")
}

/// Asset operations, obtained via [`ArchivistClient::assets`].
#[derive(Clone, Copy, Debug)]
pub struct AssetsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl AssetsClient<'_> {
    /// Create an asset carrying `attributes`, with the default behaviours.
    ///
    /// With `confirm` set, blocks until the service reports the asset
    /// `CONFIRMED` and returns that final record; otherwise returns the
    /// initial, probably still `PENDING`, record.
    #[instrument(skip(self, attributes))]
    pub async fn create(&self, attributes: Value, confirm: bool) -> Result<ResourceRecord> {
        let body = json!({
            "behaviours": DEFAULT_BEHAVIOURS,
            "attributes": attributes,
        });
        self.create_from_body(body, confirm).await
    }

    /// Create an asset from a full request body.
    ///
    /// The body is used as-is apart from the family fixture merged
    /// underneath, so callers control behaviours and proof mechanism.
    pub async fn create_from_body(&self, body: Value, confirm: bool) -> Result<ResourceRecord> {
        let body = self.client.with_fixture(ASSETS_LABEL, body);
        debug!("creating asset");

        let created = self.client.post(&family_path(), &body).await?;
        let record = ResourceRecord::new(created)?;
        if !confirm {
            return Ok(record);
        }

        let identity = record.identity().ok_or_else(|| Error::BadField {
            field: "identity".to_owned(),
            url: self.client.url().api_url(&family_path()),
        })?;
        self.wait_for_confirmation(identity).await
    }

    /// Read one asset by identity.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let body = self.client.get(&record_path(identity), &[]).await?;
        ResourceRecord::new(body)
    }

    /// Lazily list assets matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let filter = self.client.filter_with_fixture(ASSETS_LABEL, filter);
        self.client
            .list_records(&family_path(), ASSETS_LABEL, page_size, filter.as_ref())
    }

    /// Count assets matching `filter` without listing them.
    pub async fn count(&self, filter: Option<Value>) -> Result<u64> {
        let filter = self.client.filter_with_fixture(ASSETS_LABEL, filter);
        self.client
            .count_records(&family_path(), filter.as_ref())
            .await
    }

    /// Read the single asset matching `filter`.
    ///
    /// The filter acts as a signature: zero matches is
    /// [`Error::NotFound`], more than one is [`Error::Duplicate`].
    pub async fn read_by_signature(&self, filter: Option<Value>) -> Result<ResourceRecord> {
        let filter = self.client.filter_with_fixture(ASSETS_LABEL, filter);
        self.client
            .unique_record(&family_path(), ASSETS_LABEL, filter.as_ref())
            .await
    }

    /// Block until `identity` reaches a terminal confirmation state.
    #[instrument(skip(self))]
    pub async fn wait_for_confirmation(&self, identity: &str) -> Result<ResourceRecord> {
        confirm::wait_for_confirmation(self, identity, self.client.confirm_options()).await
    }

    /// Block until no asset matching `filter` is still `PENDING`.
    ///
    /// Fails if any matching asset finished `FAILED`, or if pending
    /// assets remain at the deadline. Useful after bulk loads where
    /// waiting per asset would serialize the polling.
    #[instrument(skip(self, filter))]
    pub async fn wait_for_confirmed(&self, filter: Option<Value>) -> Result<()> {
        let base = filter.unwrap_or_else(|| json!({}));

        let pending = deep_merge(&base, &json!({ CONFIRMATION_STATUS: PENDING }));
        confirm::wait_until_none_pending(
            || {
                let filter = pending.clone();
                async move { self.count(Some(filter)).await }
            },
            self.client.confirm_options(),
        )
        .await?;

        let failed = deep_merge(&base, &json!({ CONFIRMATION_STATUS: FAILED }));
        let failures = self.count(Some(failed)).await?;
        if failures > 0 {
            return Err(Error::Unconfirmed {
                reason: format!("{failures} assets failed confirmation"),
            });
        }
        debug!("all matching assets confirmed");
        Ok(())
    }
}

#[async_trait]
impl ConfirmationReader for AssetsClient<'_> {
    async fn read_record(&self, identity: &str) -> Result<ResourceRecord> {
        self.read(identity).await
    }
}
