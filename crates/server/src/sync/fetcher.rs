//! Two-stage catalog crawl.
//!
//! The list phase pages through item ids; each page's ids are then fetched in
//! detail batches before the next page is requested. The crawl is driven by
//! [`CrawlState`]:
//!
//! ```text
//! Listing --ok--> Detailing --has_next--> Listing
//!    |                 \--last page--> Merging --> Done
//!    \--error--> Aborted --> Merging
//! ```
//!
//! The fetcher owns `Listing` and `Detailing`. The orchestrator moves an
//! aborted crawl to `Merging` with [`CrawlState::into_merging`] and, once the
//! run is recorded, to `Done` with [`CrawlState::finish`].

use marketsync_core::{ItemId, ItemStatus, ShopId};
use secrecy::SecretString;
use tracing::{debug, instrument, warn};

use super::SyncError;
use crate::marketplace::{ItemListPage, MarketplaceClient, MarketplaceError};

/// Largest page the list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Largest id batch the detail endpoint accepts.
pub const MAX_DETAIL_BATCH_SIZE: usize = 50;

/// Crawl tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Ids requested per list call.
    pub page_size: u32,
    /// Ids per detail call.
    pub detail_batch_size: usize,
    /// Hard cap on list calls per run.
    pub max_pages: u32,
    /// Listing statuses to crawl.
    pub item_statuses: Vec<ItemStatus>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            detail_batch_size: MAX_DETAIL_BATCH_SIZE,
            max_pages: 10_000,
            item_statuses: ItemStatus::ACTIVE.to_vec(),
        }
    }
}

impl FetchSettings {
    /// Clamp every knob into the range the marketplace accepts.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self.detail_batch_size = self.detail_batch_size.clamp(1, MAX_DETAIL_BATCH_SIZE);
        self.max_pages = self.max_pages.max(1);
        self
    }
}

/// Position of a crawl in its lifecycle.
#[derive(Debug)]
pub enum CrawlState {
    /// About to request the id page at `offset`.
    Listing { offset: i64 },
    /// Fetching details for a listed page.
    Detailing { offset: i64, page: ItemListPage },
    /// All pages listed; collected items await merging.
    Merging,
    /// The list phase failed; collected items are still merged.
    Aborted,
    /// Items merged and the run recorded.
    Done,
}

impl CrawlState {
    /// Whether the fetcher has nothing left to do.
    #[must_use]
    pub const fn is_fetch_finished(&self) -> bool {
        matches!(self, Self::Merging | Self::Aborted | Self::Done)
    }

    /// Enter the merge phase. Items collected before an abort are merged too.
    #[must_use]
    pub fn into_merging(self) -> Self {
        match self {
            Self::Aborted => Self::Merging,
            other => other,
        }
    }

    /// Close a crawl whose items were merged and recorded.
    #[must_use]
    pub fn finish(self) -> Self {
        match self {
            Self::Merging => Self::Done,
            other => other,
        }
    }
}

/// How the list phase ended.
#[derive(Debug)]
pub enum Termination {
    /// The last page reported `has_next_page == false`.
    Completed,
    /// The page cap was reached while more pages were reported.
    PageLimit { pages: u32 },
    /// A list call failed or returned an error payload.
    Aborted(SyncError),
}

impl Termination {
    /// Whether every listed page was crawled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Reason the crawl stopped early, if it did.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Completed => None,
            Self::PageLimit { pages } => Some(format!(
                "crawl stopped after {pages} pages with more pages reported"
            )),
            Self::Aborted(err) => Some(err.to_string()),
        }
    }
}

/// Everything a crawl collected.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Raw detail records, in fetch order.
    pub items: Vec<serde_json::Value>,
    /// Ids whose detail batch failed.
    pub failed_ids: u64,
    /// Detail batch errors, in order.
    pub detail_errors: Vec<SyncError>,
    /// List calls made.
    pub pages: u32,
    /// How the list phase ended.
    pub termination: Termination,
    /// `Merging` or `Aborted`.
    pub state: CrawlState,
}

/// Next list offset after a page.
///
/// Uses the server's `next_offset` when it moves forward and falls back to
/// `offset + page_size` otherwise, so offsets strictly increase.
#[must_use]
pub fn next_offset(offset: i64, reported: Option<i64>, page_size: u32) -> i64 {
    match reported {
        Some(next) if next > offset => next,
        _ => offset.saturating_add(i64::from(page_size)),
    }
}

/// Runs the list and detail phases against the marketplace.
pub struct CatalogFetcher<'a> {
    client: &'a MarketplaceClient,
    settings: &'a FetchSettings,
}

impl<'a> CatalogFetcher<'a> {
    #[must_use]
    pub const fn new(client: &'a MarketplaceClient, settings: &'a FetchSettings) -> Self {
        Self { client, settings }
    }

    /// Crawl the shop's catalog.
    ///
    /// Never fails: list errors end the crawl early and detail errors are
    /// counted against their batch. Both are reported in the outcome.
    #[instrument(skip(self, access_token), fields(shop_id = %shop_id))]
    pub async fn crawl(&self, shop_id: ShopId, access_token: &SecretString) -> CrawlOutcome {
        let mut items = Vec::new();
        let mut failed_ids = 0_u64;
        let mut detail_errors = Vec::new();
        let mut pages = 0_u32;
        let mut termination = Termination::Completed;
        let mut state = CrawlState::Listing { offset: 0 };

        while !state.is_fetch_finished() {
            state = match state {
                CrawlState::Listing { offset } => {
                    if pages >= self.settings.max_pages {
                        warn!(pages, "page limit reached, ending crawl");
                        termination = Termination::PageLimit { pages };
                        CrawlState::Merging
                    } else {
                        match self.list_page(shop_id, access_token, offset).await {
                            Ok(page) => {
                                pages += 1;
                                CrawlState::Detailing { offset, page }
                            }
                            Err(err) => {
                                warn!(offset, error = %err, "item list request failed, ending crawl");
                                termination = Termination::Aborted(SyncError::RemoteList(err));
                                CrawlState::Aborted
                            }
                        }
                    }
                }
                CrawlState::Detailing { offset, page } => {
                    let ids = page.item_ids();
                    for batch in ids.chunks(self.settings.detail_batch_size.max(1)) {
                        match self.fetch_details(shop_id, access_token, batch).await {
                            Ok(records) => items.extend(records),
                            Err(err) => {
                                failed_ids += batch.len() as u64;
                                detail_errors.push(err);
                            }
                        }
                    }

                    if page.has_next_page {
                        CrawlState::Listing {
                            offset: next_offset(offset, page.next_offset, self.settings.page_size),
                        }
                    } else {
                        CrawlState::Merging
                    }
                }
                finished => finished,
            };
        }

        CrawlOutcome {
            items,
            failed_ids,
            detail_errors,
            pages,
            termination,
            state,
        }
    }

    async fn list_page(
        &self,
        shop_id: ShopId,
        access_token: &SecretString,
        offset: i64,
    ) -> Result<ItemListPage, MarketplaceError> {
        let page = self
            .client
            .get_item_list(
                shop_id,
                access_token,
                offset,
                self.settings.page_size,
                &self.settings.item_statuses,
            )
            .await?;
        debug!(
            offset,
            listed = page.item.len(),
            has_next_page = page.has_next_page,
            "listed item page"
        );
        Ok(page)
    }

    async fn fetch_details(
        &self,
        shop_id: ShopId,
        access_token: &SecretString,
        batch: &[ItemId],
    ) -> Result<Vec<serde_json::Value>, SyncError> {
        match self
            .client
            .get_item_base_info(shop_id, access_token, batch)
            .await
        {
            Ok(Some(records)) => Ok(records),
            Ok(None) => {
                debug!(batch_size = batch.len(), "detail response had no item_list");
                Ok(Vec::new())
            }
            Err(source) => {
                warn!(batch_size = batch.len(), error = %source, "item detail batch failed");
                Err(SyncError::RemoteDetail {
                    batch_size: batch.len(),
                    source,
                })
            }
        }
    }
}
