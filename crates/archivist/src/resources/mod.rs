//! Resource family clients.
//!
//! Each family is a thin facade over the shared transport, pagination
//! and confirmation machinery; obtain one from the accessor methods on
//! [`ArchivistClient`](crate::ArchivistClient). The facades hold a
//! borrow of the client, so they cost nothing to create and are made
//! fresh at each call site.

mod access_policies;
mod applications;
mod assets;
mod attachments;
mod compliance;
mod compliance_policies;
mod events;
mod locations;
mod record;
mod sboms;
mod subjects;
mod tenancies;

pub use access_policies::AccessPoliciesClient;
pub use applications::ApplicationsClient;
pub use assets::AssetsClient;
pub use attachments::AttachmentsClient;
pub use compliance::ComplianceClient;
pub use compliance_policies::CompliancePoliciesClient;
pub use events::EventsClient;
pub use locations::LocationsClient;
pub use record::ResourceRecord;
pub use sboms::SbomsClient;
pub use subjects::SubjectsClient;
pub use tenancies::TenanciesClient;
