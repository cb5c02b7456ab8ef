//! Compliance evaluation.

use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;
use crate::resources::ResourceRecord;

/// Version prefix for the compliance endpoints.
const COMPLIANCE_SUBPATH: &str = "v1/compliance";

/// Query parameter requesting evaluation at a historical instant.
const COMPLIANT_AT_PARAM: &str = "compliant_at";

/// Compliance evaluation, obtained via [`ArchivistClient::compliance`].
///
/// Evaluates an asset against every applicable compliance policy and
/// reports the per-policy outcomes plus an overall verdict.
#[derive(Clone, Copy, Debug)]
pub struct ComplianceClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl ComplianceClient<'_> {
    /// Evaluate `asset_identity` now, or at `at` (an RFC 3339 timestamp)
    /// when given.
    #[instrument(skip(self))]
    pub async fn compliant_at(
        &self,
        asset_identity: &str,
        at: Option<&str>,
    ) -> Result<ResourceRecord> {
        let params = match at {
            Some(timestamp) => vec![(COMPLIANT_AT_PARAM.to_owned(), timestamp.to_owned())],
            None => Vec::new(),
        };
        debug!(asset_identity, "evaluating compliance");

        let path = format!("{COMPLIANCE_SUBPATH}/{asset_identity}");
        let body = self.client.get(&path, &params).await?;
        ResourceRecord::new(body)
    }
}
