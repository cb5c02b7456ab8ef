//! Software bill of materials operations.
//!
//! SBOM blobs live at the bare identity URL; their queryable metadata
//! records live under `/metadata`. Uploads are SPDX XML documents.

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::paging::RecordStream;
use crate::resources::ResourceRecord;

/// Version prefix for the SBOM endpoints.
const SBOMS_SUBPATH: &str = "v1";

/// Family label: URL segment and list response field.
const SBOMS_LABEL: &str = "sboms";

/// Content type of uploaded documents.
const SBOM_CONTENT_TYPE: &str = "text/xml";

fn family_path() -> String {
    format!("{SBOMS_SUBPATH}/{SBOMS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{SBOMS_SUBPATH}/{identity}")
}

/// SBOM operations, obtained via [`ArchivistClient::sboms`].
#[derive(Clone, Copy, Debug)]
pub struct SbomsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl SbomsClient<'_> {
    /// Upload `source` as an SPDX document and return its metadata.
    #[instrument(skip(self, source))]
    pub async fn upload<R>(&self, name: &str, source: &mut R) -> Result<ResourceRecord>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut content = Vec::new();
        source.read_to_end(&mut content).await?;
        debug!(name, size = content.len(), "uploading sbom");

        let created = self
            .client
            .post_multipart(&family_path(), name, SBOM_CONTENT_TYPE, content)
            .await?;
        ResourceRecord::new(created)
    }

    /// Stream the document's bytes into `sink`.
    #[instrument(skip(self, sink))]
    pub async fn download<W>(&self, identity: &str, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.client
            .get_stream(&record_path(identity), &[], sink)
            .await
    }

    /// Read one SBOM's metadata record.
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{}/metadata", record_path(identity));
        let body = self.client.get(&path, &[]).await?;
        ResourceRecord::new(body)
    }

    /// Lazily list SBOM metadata matching `filter`.
    pub fn list(&self, page_size: Option<u32>, filter: Option<Value>) -> RecordStream {
        let path = format!("{SBOMS_SUBPATH}/{SBOMS_LABEL}/-/metadata");
        self.client
            .list_records(&path, SBOMS_LABEL, page_size, filter.as_ref())
    }

    /// Mark the SBOM as published.
    #[instrument(skip(self))]
    pub async fn publish(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{}:publish", record_path(identity));
        let body = self.client.post(&path, &json!({})).await?;
        ResourceRecord::new(body)
    }

    /// Withdraw the SBOM from publication.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{}:withdraw", record_path(identity));
        let body = self.client.post(&path, &json!({})).await?;
        ResourceRecord::new(body)
    }
}
