//! Pagination driver
//!
//! Walks an auction's listing one page at a time:
//! `Start → Fetching(n) → Fetching(n + 1) | Done | Failed`. Every page that
//! reads successfully is committed before the next one is requested, and
//! pages already committed by an earlier run are skipped without a request.
//!
//! A JSON page that exhausts its retries fails the auction. Any other JSON
//! failure switches the auction to HTML for good and restarts it at page 0.

use super::shutdown::Shutdown;
use crate::config::CrawlerConfig;
use crate::crawler::Fetcher;
use crate::extract::{ExtractError, HtmlExtractor, PageContext, PageResult, Strategy};
use crate::model::LotSource;
use crate::state::{PageUnit, PaginationState};
use crate::storage::{CheckpointStore, StorageResult};
use url::Url;

/// Page limit applied in dry-run mode regardless of the listing's depth
pub const DRY_RUN_PAGE_LIMIT: u32 = 2;

/// Effective per-auction page limit for a crawl configuration
pub fn page_limit(config: &CrawlerConfig) -> Option<u32> {
    if config.dry_run {
        Some(
            config
                .max_pages
                .map_or(DRY_RUN_PAGE_LIMIT, |max| max.min(DRY_RUN_PAGE_LIMIT)),
        )
    } else {
        config.max_pages
    }
}

/// How pagination of one auction ended
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOutcome {
    pub state: PaginationState,
    /// Strategy in use when pagination ended
    pub source: LotSource,
    /// Pages fetched and committed by this run
    pub pages_fetched: u32,
    /// Records committed by this run
    pub records: usize,
    /// Why the auction stopped early, if it did
    pub failure: Option<String>,
}

/// Drives one auction's pages through a strategy and the checkpoint store
pub struct PaginationDriver<'a> {
    fetcher: &'a Fetcher,
    store: &'a mut CheckpointStore,
    shutdown: &'a Shutdown,
    limit: Option<u32>,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        store: &'a mut CheckpointStore,
        shutdown: &'a Shutdown,
        limit: Option<u32>,
    ) -> Self {
        Self {
            fetcher,
            store,
            shutdown,
            limit,
        }
    }

    /// Paginates an auction to a terminal state
    ///
    /// # Arguments
    ///
    /// * `auction_id` - The auction being read
    /// * `detail_url` - The auction's listing page
    /// * `strategy` - Strategy chosen for the auction
    /// * `probe` - Page 0 as already read (by the JSON probe or from the rendered auction page), if any
    ///
    /// # Returns
    ///
    /// * `Ok(PaginationOutcome)` - Terminal state and counts
    /// * `Err(StorageError)` - A commit failed; the crawl cannot continue
    pub async fn run(
        &mut self,
        auction_id: &str,
        detail_url: &Url,
        mut strategy: Strategy,
        mut probe: Option<PageResult>,
    ) -> StorageResult<PaginationOutcome> {
        let mut state = PaginationState::Start.begin(self.limit);
        let mut next_url: Option<Url> = None;
        let mut previous_ids: Option<Vec<String>> = None;
        let mut pages_fetched = 0;
        let mut records = 0;
        let mut failure = None;

        while let PaginationState::Fetching(page_index) = state {
            let unit = PageUnit::new(auction_id, page_index);

            if self.store.is_done(&unit) {
                tracing::debug!("{} already committed, skipping", unit);
                probe = None;
                next_url = None;
                previous_ids = None;
                state = state.skip(self.limit);
                continue;
            }

            if self.shutdown.is_triggered() {
                state = state.stop();
                break;
            }

            let result = match probe.take() {
                Some(page) if page_index == 0 => Ok(page),
                _ => {
                    let context = PageContext {
                        fetcher: self.fetcher,
                        detail_url,
                        next_url: next_url.as_ref(),
                    };
                    let fetched = tokio::select! {
                        biased;
                        _ = self.shutdown.wait() => None,
                        result = strategy.fetch_page(&unit, &context) => Some(result),
                    };
                    match fetched {
                        Some(result) => result,
                        None => {
                            tracing::warn!("{} abandoned by shutdown; it will be fetched next run", unit);
                            state = state.stop();
                            break;
                        }
                    }
                }
            };

            let page = match result {
                Ok(page) => page,
                Err(error)
                    if matches!(strategy, Strategy::Json(_))
                        && !matches!(error, ExtractError::Exhausted { .. }) =>
                {
                    self.fall_back_to_html(auction_id, &unit, &error)?;
                    strategy = Strategy::Html(HtmlExtractor);
                    state = PaginationState::Start.begin(self.limit);
                    probe = None;
                    next_url = None;
                    previous_ids = None;
                    continue;
                }
                Err(error) => {
                    tracing::warn!("{} failed: {}", unit, error);
                    failure = Some(format!("page {}: {}", page_index, error));
                    state = state.fail();
                    break;
                }
            };

            self.store.commit(&unit, &page.records)?;
            pages_fetched += 1;
            records += page.records.len();

            let ids: Vec<String> = page.records.iter().map(|r| r.lot_id.clone()).collect();
            let repeated = !ids.is_empty() && previous_ids.as_ref() == Some(&ids);
            if repeated {
                tracing::warn!("{} repeats the previous page; treating the listing as finished", unit);
            }

            tracing::info!(
                "{}: page {} committed ({} lots via {})",
                auction_id,
                page_index,
                page.records.len(),
                strategy.source()
            );

            next_url = page.next_url;
            previous_ids = Some(ids);
            state = state.advance(page.has_next_page && !repeated, self.limit);
        }

        if state.is_exhausted() {
            self.store.mark_exhausted(auction_id)?;
        }

        Ok(PaginationOutcome {
            state,
            source: strategy.source(),
            pages_fetched,
            records,
            failure,
        })
    }

    fn fall_back_to_html(
        &mut self,
        auction_id: &str,
        unit: &PageUnit,
        error: &ExtractError,
    ) -> StorageResult<()> {
        tracing::warn!(
            "{}: JSON read of {} failed ({}); reading the auction again from page 0 via HTML",
            auction_id,
            unit,
            error
        );
        let requires_login = matches!(error, ExtractError::AuthorizationBoundary { .. });
        self.store.restart_with_html(auction_id, requires_login)
    }
}
