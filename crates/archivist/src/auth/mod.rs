//! Authentication: credentials and bearer token acquisition.

mod credentials;
mod provider;

pub use credentials::{BearerToken, ClientSecret, Credential};
pub(crate) use provider::TokenCache;
