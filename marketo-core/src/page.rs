//! Lazy iteration over paginated REST resources.

use crate::http::{Method, Transport};
use crate::Error;
use futures_util::stream::{self, Stream};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tracing::debug;
use url::Url;

/// Query parameter carrying the continuation token.
const NEXT_PAGE_TOKEN_PARAM: &str = "nextPageToken";

/// Forward-only iterator over a paginated resource.
///
/// The first page is fetched when the iterator is created. Later pages are
/// fetched on demand from [`has_next`](Self::has_next), and only the current
/// page is kept in memory. Once exhausted, the iterator stays exhausted.
///
/// # Example
///
/// ```no_run
/// use marketo_core::http::Transport;
/// use marketo_core::page::PageIterator;
/// # use marketo_core::client::{self, Credentials};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let auth_client = client::Builder::new()
/// #     .credentials(Credentials {
/// #         client_id: "...".to_string(),
/// #         client_secret: "...".to_string(),
/// #         endpoint: "https://123-ABC-456.mktorest.com".to_string(),
/// #     })
/// #     .build()?
/// #     .connect()
/// #     .await?;
/// let transport = Transport::new(auth_client)?;
/// let url = transport.url("/rest/v1/lists.json", &[])?;
///
/// let mut lists = PageIterator::<serde_json::Value>::new(transport, url).await?;
/// while lists.has_next().await? {
///     println!("{}", lists.next().await?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PageIterator<T> {
    transport: Transport,
    url: Url,
    items: VecDeque<T>,
    next_page_token: Option<String>,
    pages: usize,
}

impl<T> PageIterator<T>
where
    T: DeserializeOwned,
{
    /// Creates the iterator and fetches the first page of `url`.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error from the first page.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn new(transport: Transport, url: Url) -> Result<Self, Error> {
        let mut iter = Self {
            transport,
            url,
            items: VecDeque::new(),
            next_page_token: None,
            pages: 0,
        };
        iter.fetch_page(None).await?;
        Ok(iter)
    }

    async fn fetch_page(&mut self, token: Option<&str>) -> Result<(), Error> {
        let mut url = self.url.clone();
        if let Some(token) = token {
            url.query_pairs_mut().append_pair(NEXT_PAGE_TOKEN_PARAM, token);
        }

        let envelope = self.transport.send::<T>(Method::Get, &url, None).await?;
        self.pages += 1;
        debug!(
            page = self.pages,
            items = envelope.result.len(),
            "Fetched page of '{}'",
            self.url.path()
        );

        self.next_page_token = envelope.next_page().map(str::to_string);
        self.items = envelope.result.into();
        Ok(())
    }

    /// Returns `true` if another item is available, fetching the next page
    /// when the current one is used up.
    ///
    /// A failed fetch keeps the continuation token, so calling again retries
    /// the same page.
    ///
    /// # Errors
    ///
    /// Returns any transport or validation error from a page fetch.
    pub async fn has_next(&mut self) -> Result<bool, Error> {
        while self.items.is_empty() {
            let Some(token) = self.next_page_token.clone() else {
                return Ok(false);
            };
            self.fetch_page(Some(&token)).await?;
        }
        Ok(true)
    }

    /// Returns the next item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchElement`] after the last item, or any error from
    /// a page fetch.
    pub async fn next(&mut self) -> Result<T, Error> {
        if !self.has_next().await? {
            return Err(Error::NoSuchElement);
        }
        self.items.pop_front().ok_or(Error::NoSuchElement)
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Converts the iterator into a [`Stream`] of items.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, Error>> {
        stream::try_unfold(self, |mut iter| async move {
            if !iter.has_next().await? {
                return Ok(None);
            }
            Ok::<_, Error>(iter.items.pop_front().map(|item| (item, iter)))
        })
    }

    /// Collects every remaining item.
    ///
    /// # Errors
    ///
    /// Returns the first error from a page fetch.
    pub async fn collect_all(mut self) -> Result<Vec<T>, Error> {
        let mut all = Vec::new();
        while self.has_next().await? {
            all.extend(self.items.drain(..));
        }
        Ok(all)
    }
}
