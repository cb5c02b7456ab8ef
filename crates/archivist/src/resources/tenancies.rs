//! Tenancy operations.

use tracing::instrument;

use crate::Result;
use crate::client::ArchivistClient;
use crate::resources::ResourceRecord;

/// Version prefix for the tenancy endpoints.
const TENANCIES_SUBPATH: &str = "v1";

/// Tenancy operations, obtained via [`ArchivistClient::tenancies`].
#[derive(Clone, Copy, Debug)]
pub struct TenanciesClient<'a> {
    pub(crate) client: &'a ArchivistClient,
}

impl TenanciesClient<'_> {
    /// Read the caller's own tenancy by identity
    /// (`tenancies/<uuid>`).
    #[instrument(skip(self))]
    pub async fn read(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{TENANCIES_SUBPATH}/{identity}");
        let body = self.client.get(&path, &[]).await?;
        ResourceRecord::new(body)
    }

    /// Read the public description of any tenancy.
    ///
    /// This endpoint rejects credentials, so the request goes out
    /// without the Authorization header.
    #[instrument(skip(self))]
    pub async fn publicinfo(&self, identity: &str) -> Result<ResourceRecord> {
        let path = format!("{TENANCIES_SUBPATH}/{identity}:publicinfo");
        let body = self.client.get_anonymous(&path, &[]).await?;
        ResourceRecord::new(body)
    }
}
