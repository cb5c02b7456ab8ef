//! Attachment uploads and downloads.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::resources::ResourceRecord;

/// Version prefix for the attachment endpoints.
const ATTACHMENTS_SUBPATH: &str = "v2";

/// Family label and URL segment.
const ATTACHMENTS_LABEL: &str = "attachments";

fn family_path() -> String {
    format!("{ATTACHMENTS_SUBPATH}/{ATTACHMENTS_LABEL}")
}

fn record_path(identity: &str) -> String {
    format!("{ATTACHMENTS_SUBPATH}/{identity}")
}

/// Attachment operations, obtained via [`ArchivistClient::attachments`].
///
/// Attachments are opaque blobs referenced from asset and event
/// attributes by their returned identity.
#[derive(Clone, Copy, Debug)]
pub struct AttachmentsClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl AttachmentsClient<'_> {
    /// Upload `source` as a named attachment and return its record.
    ///
    /// The source is read fully into memory before sending so the upload
    /// can participate in rate-limit retries.
    #[instrument(skip(self, source))]
    pub async fn upload<R>(
        &self,
        name: &str,
        content_type: &str,
        source: &mut R,
    ) -> Result<ResourceRecord>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut content = Vec::new();
        source.read_to_end(&mut content).await?;
        debug!(name, size = content.len(), "uploading attachment");

        let created = self
            .client
            .post_multipart(&family_path(), name, content_type, content)
            .await?;
        ResourceRecord::new(created)
    }

    /// Stream the attachment's bytes into `sink`.
    #[instrument(skip(self, sink))]
    pub async fn download<W>(&self, identity: &str, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.client
            .get_stream(&record_path(identity), &[], sink)
            .await
    }
}
