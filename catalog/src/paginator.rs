use crate::config::RecordFields;
use crate::errors::UpstreamError;
use crate::fetch::Fetch;
use crate::metrics_defs::{LISTING_PAGE_CEILING, LISTING_PAGES};
use crate::records::Page;
use crate::types::ItemRecord;
use shared::counter;
use tokio::time::{Duration, sleep};
use url::Url;

/// Walks a cursor-paginated listing.
pub struct Paginator<'a> {
    fetcher: &'a dyn Fetch,
    max_pages: usize,
    delay: Duration,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn Fetch, max_pages: usize, delay: Duration) -> Self {
        Paginator {
            fetcher,
            max_pages: max_pages.max(1),
            delay,
        }
    }

    /// Fetches `base` without a cursor, then with `cursor=<next>` until the
    /// listing runs out of cursors or `max_pages` pages were fetched.
    ///
    /// A failure on any page fails the whole listing; no partial results are
    /// returned.
    pub async fn collect(
        &self,
        base: &Url,
        fields: &RecordFields,
        authenticated: bool,
    ) -> Result<Vec<ItemRecord>, UpstreamError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_fetches = 0;

        loop {
            if page_fetches > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            let mut url = base.clone();
            if let Some(ref c) = cursor {
                url.query_pairs_mut().append_pair("cursor", c);
            }

            let page = self.fetch_page(url, fields, authenticated).await?;
            page_fetches += 1;
            records.extend(page.records);

            match page.next_cursor {
                None => break,
                Some(_) if page_fetches >= self.max_pages => {
                    tracing::warn!(
                        url = %base,
                        pages = page_fetches,
                        "page ceiling reached, listing truncated"
                    );
                    counter!(LISTING_PAGE_CEILING).increment(1);
                    break;
                }
                Some(next) => cursor = Some(next),
            }
        }

        tracing::debug!(
            url = %base,
            pages = page_fetches,
            records = records.len(),
            "listing complete"
        );
        Ok(records)
    }

    /// Fetches a single page and ignores any cursor it advertises.
    pub async fn first_page(
        &self,
        url: Url,
        fields: &RecordFields,
        authenticated: bool,
    ) -> Result<Vec<ItemRecord>, UpstreamError> {
        Ok(self.fetch_page(url, fields, authenticated).await?.records)
    }

    async fn fetch_page(
        &self,
        url: Url,
        fields: &RecordFields,
        authenticated: bool,
    ) -> Result<Page, UpstreamError> {
        let url_string = url.to_string();
        let body = self.fetcher.get_json(url, authenticated).await?;
        counter!(LISTING_PAGES).increment(1);

        Page::parse(&body, fields).map_err(|message| UpstreamError::Decode {
            url: url_string,
            message,
        })
    }
}
