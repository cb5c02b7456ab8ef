//! Paginated listing, counting and signature lookups.
//!
//! List endpoints return one page of records plus a continuation token;
//! this module walks those tokens lazily behind a `Stream`, reads totals
//! from the count header, and resolves "signature" filters that must
//! match exactly one record.
//!
//! # Example
//!
//! ```no_run
//! use archivist::ArchivistClient;
//! use futures_util::TryStreamExt;
//! use serde_json::json;
//!
//! # async fn example() -> archivist::Result<()> {
//! # let client = ArchivistClient::builder("https://app.datatrails.ai")
//! #     .with_bearer_token("token")
//! #     .build()?;
//! let mut doors = client
//!     .assets()
//!     .list(Some(10), Some(json!({"attributes": {"arc_display_type": "door"}})));
//!
//! while let Some(asset) = doors.try_next().await? {
//!     println!("{}", asset.identity().unwrap_or("unknown"));
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::client::ArchivistClient;
use crate::error::Error;
use crate::query::dot_params;
use crate::resources::ResourceRecord;
use crate::transport::{REQUEST_TOTAL_COUNT_HEADER, TOTAL_COUNT_HEADER};

/// Response field carrying the continuation token.
const NEXT_PAGE_TOKEN: &str = "next_page_token";

/// Query parameter naming the continuation token on follow-up requests.
const PAGE_TOKEN: &str = "page_token";

/// Query parameter limiting the page size.
const PAGE_SIZE: &str = "page_size";

/// A lazy stream of resource records, one request per page.
///
/// Nothing is fetched until the stream is polled, and only as many pages
/// are fetched as the caller consumes. Use with `futures_util::StreamExt`
/// or `TryStreamExt` for convenient methods like `try_next()`.
pub struct RecordStream {
    inner: Pin<Box<dyn Stream<Item = Result<ResourceRecord>> + Send>>,
}

impl RecordStream {
    fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ResourceRecord>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for RecordStream {
    type Item = Result<ResourceRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl ArchivistClient {
    /// Lazily list every record under `path`, following continuation
    /// tokens until the service stops supplying one.
    ///
    /// `field` names the response field holding the page's records.
    /// Follow-up requests carry only the continuation token; the filter
    /// and page size are bound into the token server-side.
    pub(crate) fn list_records(
        &self,
        path: &str,
        field: &str,
        page_size: Option<u32>,
        filter: Option<&Value>,
    ) -> RecordStream {
        let client = self.clone();
        let path = path.to_owned();
        let field = field.to_owned();
        let url = self.url().api_url(&path);

        let mut params = filter.map(dot_params).unwrap_or_default();
        if let Some(size) = page_size {
            params.push((PAGE_SIZE.to_owned(), size.to_string()));
        }

        let stream = async_stream::try_stream! {
            let mut pages = 0u32;
            loop {
                let body = client.get(&path, &params).await?;
                let records = page_records(&body, &field, &url)?;
                pages += 1;
                debug!(page = pages, records = records.len(), "page received");

                for record in records {
                    yield record;
                }

                match continuation(&body) {
                    Some(token) => params = vec![(PAGE_TOKEN.to_owned(), token)],
                    None => break,
                }
            }
        };

        RecordStream::new(stream)
    }

    /// Total number of records under `path` matching `filter`.
    ///
    /// Asks for the smallest page the service accepts and reads the total
    /// from the count header rather than walking the listing.
    pub(crate) async fn count_records(&self, path: &str, filter: Option<&Value>) -> Result<u64> {
        let mut params = filter.map(dot_params).unwrap_or_default();
        params.push((PAGE_SIZE.to_owned(), "1".to_owned()));

        let response = self
            .get_with_headers(path, &params, &[(REQUEST_TOTAL_COUNT_HEADER, "true")])
            .await?;

        response
            .headers
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| Error::MissingHeader {
                header: TOTAL_COUNT_HEADER.to_owned(),
                url: self.url().api_url(path),
            })
    }

    /// Read the single record under `path` matching `filter`.
    ///
    /// Signature lookups must resolve to exactly one record: zero matches
    /// is [`Error::NotFound`], more than one is [`Error::Duplicate`].
    pub(crate) async fn unique_record(
        &self,
        path: &str,
        field: &str,
        filter: Option<&Value>,
    ) -> Result<ResourceRecord> {
        let mut params = filter.map(dot_params).unwrap_or_default();
        // Two is enough to tell "exactly one" from "more than one".
        params.push((PAGE_SIZE.to_owned(), "2".to_owned()));

        let body = self.get(path, &params).await?;
        let mut records = page_records(&body, field, &self.url().api_url(path))?;

        match records.len() {
            0 => Err(Error::NotFound {
                subject: format!("no matching {field}"),
            }),
            1 => Ok(records.remove(0)),
            count => Err(Error::Duplicate {
                subject: field.to_owned(),
                count,
            }),
        }
    }
}

/// Extract the page's records from the named field.
fn page_records(body: &Value, field: &str, url: &str) -> Result<Vec<ResourceRecord>> {
    let items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::BadField {
            field: field.to_owned(),
            url: url.to_owned(),
        })?;

    items
        .iter()
        .map(|item| {
            if item.is_object() {
                Ok(ResourceRecord::raw(item.clone()))
            } else {
                Err(Error::BadField {
                    field: field.to_owned(),
                    url: url.to_owned(),
                })
            }
        })
        .collect()
}

/// Non-empty continuation token, if the page carries one.
fn continuation(body: &Value) -> Option<String> {
    body.get(NEXT_PAGE_TOKEN)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}
