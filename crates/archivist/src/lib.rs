//! archivist - Client library for the Archivist evidence ledger API
//!
//! This library provides typed access to an Archivist tenancy with a
//! client-centric API. All operations flow through an [`ArchivistClient`];
//! resource families (assets, events, locations and so on) are reached
//! through accessor methods on it.
//!
//! # Example
//!
//! ```no_run
//! use archivist::ArchivistClient;
//! use futures_util::TryStreamExt;
//! use serde_json::json;
//!
//! # async fn example() -> archivist::Result<()> {
//! let client = ArchivistClient::builder("https://app.datatrails.ai")
//!     .with_client_credentials("client-id", "client-secret")
//!     .build()?;
//!
//! let asset = client
//!     .assets()
//!     .create(json!({"arc_display_name": "Front door"}), true)
//!     .await?;
//!
//! let mut events = client.events().list(asset.identity(), None, None);
//! while let Some(event) = events.try_next().await? {
//!     println!("{:?}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod confirm;
pub mod error;
pub mod paging;
pub mod query;
pub mod resources;
pub mod runner;
pub mod types;

mod history;
mod retry;
mod transport;

// Re-export primary types at crate root for convenience
pub use client::{ArchivistClient, ArchivistClientBuilder};
pub use confirm::ConfirmOptions;
pub use error::{Error, TransportError};
pub use history::ResponseSnapshot;
pub use paging::RecordStream;
pub use resources::ResourceRecord;
pub use runner::{Runner, Story};
pub use types::ServiceUrl;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
