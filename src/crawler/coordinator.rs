//! Crawl coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the harvest, including:
//! - Loading robots.txt and widening the request spacing it asks for
//! - Discovering auctions from the landing page
//! - Choosing a strategy and paginating each auction in turn
//! - Isolating per-auction failures
//! - Handling interrupts and resumption
//! - Writing the consolidated outputs

use super::pagination::{page_limit, PaginationDriver, PaginationOutcome};
use super::selection::select_strategy;
use super::{build_http_client, Fetcher, Renderer, Shutdown};
use crate::config::Config;
use crate::discovery::{discover, parse_auction_details};
use crate::extract::{parse_lot_page, PageContext, Strategy};
use crate::model::{DiscoveredAuction, LotSource};
use crate::network::{NetworkRecorder, AUDIT_LOG_FILE};
use crate::output::{consolidate, AuctionRun};
use crate::politeness::Politeness;
use crate::robots::{fetch_robots, RobotsGate};
use crate::state::{PageUnit, PaginationState};
use crate::storage::CheckpointStore;
use crate::Result;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// How one auction ended in this run
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionReport {
    pub auction_id: String,
    /// `None` when the auction was skipped or abandoned before pagination
    pub state: Option<PaginationState>,
    pub source: Option<LotSource>,
    pub pages_fetched: u32,
    pub records: usize,
    pub failure: Option<String>,
    /// A previous run already read the whole listing
    pub skipped: bool,
}

/// Summary of a crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub auctions_discovered: usize,
    pub auctions: Vec<AuctionReport>,
    pub pages_fetched: u32,
    pub records: usize,
    pub lots_consolidated: usize,
    /// Shutdown was requested before every auction finished
    pub interrupted: bool,
}

impl CrawlReport {
    /// Auctions whose pagination did not end normally
    pub fn incomplete(&self) -> impl Iterator<Item = &AuctionReport> {
        self.auctions
            .iter()
            .filter(|a| !a.skipped && !matches!(a.state, Some(PaginationState::Done(_))))
    }
}

impl AuctionReport {
    fn skipped(auction_id: &str) -> Self {
        Self {
            auction_id: auction_id.to_string(),
            state: None,
            source: None,
            pages_fetched: 0,
            records: 0,
            failure: None,
            skipped: true,
        }
    }

    fn from_outcome(auction_id: &str, outcome: PaginationOutcome) -> Self {
        Self {
            auction_id: auction_id.to_string(),
            state: Some(outcome.state),
            source: Some(outcome.source),
            pages_fetched: outcome.pages_fetched,
            records: outcome.records,
            failure: outcome.failure,
            skipped: false,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    base_url: Url,
    output_dir: PathBuf,
    client: Client,
    politeness: Arc<Politeness>,
    recorder: Arc<NetworkRecorder>,
    renderer: Arc<dyn Renderer>,
    store: CheckpointStore,
    shutdown: Shutdown,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawl configuration
    /// * `renderer` - Page renderer held for the whole crawl
    /// * `shutdown` - Signal that ends the crawl early
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The output directory or checkpoint is unusable
    pub fn new(config: Config, renderer: Arc<dyn Renderer>, shutdown: Shutdown) -> Result<Self> {
        let base_url = Url::parse(&config.crawler.base_url)?;
        let output_dir = config.output.output_dir.clone();
        std::fs::create_dir_all(&output_dir)?;

        let client = build_http_client(&config)?;
        let politeness = Arc::new(Politeness::new(&config.crawler, &config.retry));
        let recorder = Arc::new(NetworkRecorder::new(output_dir.join(AUDIT_LOG_FILE)));
        let store = CheckpointStore::open(&output_dir)?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            output_dir,
            client,
            politeness,
            recorder,
            renderer,
            store,
            shutdown,
        })
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn recorder(&self) -> &NetworkRecorder {
        &self.recorder
    }

    /// Runs the crawl to completion or interruption
    ///
    /// The renderer is shut down exactly once before this returns, whether the
    /// crawl succeeded or not.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl finished, possibly with incomplete auctions
    /// * `Err(HarvestError)` - Discovery failed or progress could not be stored
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let result = self.crawl().await;
        self.renderer.shutdown().await;
        result
    }

    async fn crawl(&mut self) -> Result<CrawlReport> {
        let start_time = Instant::now();
        tracing::info!("Starting harvest of {}", self.base_url);

        let robots = fetch_robots(&self.client, &self.politeness, &self.base_url).await;
        let gate = RobotsGate::new(robots, self.config.user_agent.crawler_name.as_str());
        if let Some(delay) = gate.crawl_delay() {
            self.politeness.widen_interval(delay).await;
        }

        let fetcher = Fetcher::new(
            self.client.clone(),
            Arc::clone(&self.politeness),
            gate,
            Arc::clone(&self.recorder),
        );

        let mut report = CrawlReport::default();
        let mut runs = Vec::new();

        let discovered = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            result = discover(
                &fetcher,
                self.renderer.as_ref(),
                &self.base_url,
                self.config.crawler.max_auctions,
            ) => Some(result?),
        };

        match discovered {
            Some(auctions) => {
                report.auctions_discovered = auctions.len();
                for (index, auction) in auctions.into_iter().enumerate() {
                    if self.shutdown.is_triggered() {
                        report.interrupted = true;
                        break;
                    }

                    tracing::info!(
                        "Auction {}/{}: {}",
                        index + 1,
                        report.auctions_discovered,
                        auction.auction_id()
                    );

                    let (run, auction_report) = self.process_auction(&fetcher, auction).await?;
                    report.pages_fetched += auction_report.pages_fetched;
                    report.records += auction_report.records;
                    if matches!(auction_report.state, Some(PaginationState::Stopped { .. })) {
                        report.interrupted = true;
                    }
                    report.auctions.push(auction_report);
                    runs.push(run);
                }
            }
            None => report.interrupted = true,
        }

        let consolidation = consolidate(&self.output_dir, &self.store, &runs)?;
        report.lots_consolidated = consolidation.lots;

        for auction in report.incomplete() {
            tracing::warn!(
                "{} is incomplete ({}){}",
                auction.auction_id,
                auction.state.map_or("not started", |s| s.as_str()),
                auction
                    .failure
                    .as_deref()
                    .map(|f| format!(": {}", f))
                    .unwrap_or_default()
            );
        }

        tracing::info!(
            "Harvest finished in {:?}: {} auction(s), {} page(s) fetched, {} record(s) written, {} lot(s) consolidated",
            start_time.elapsed(),
            report.auctions.len(),
            report.pages_fetched,
            report.records,
            report.lots_consolidated
        );

        Ok(report)
    }

    /// Processes a single auction
    ///
    /// This method:
    /// 1. Renders the auction page (feeding the network recorder), unless a
    ///    previous run already chose a strategy and committed page 0
    /// 2. Records the JSON endpoints observed for the auction
    /// 3. Selects the extraction strategy
    /// 4. Paginates until a terminal state, reading HTML page 0 from the
    ///    render when it shows lot cards
    ///
    /// Only storage errors escape; everything else becomes auction state.
    async fn process_auction(
        &mut self,
        fetcher: &Fetcher,
        mut auction: DiscoveredAuction,
    ) -> Result<(AuctionRun, AuctionReport)> {
        let auction_id = auction.auction_id().to_string();

        if self.store.is_exhausted(&auction_id) {
            tracing::info!("{} was fully harvested by a previous run, skipping", auction_id);
            let report = AuctionReport::skipped(&auction_id);
            return Ok((AuctionRun { auction, failure: None }, report));
        }

        let detail_url = match Url::parse(&auction.reference.detail_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("{} has an unusable detail URL: {}", auction_id, e);
                let failure = Some(format!("invalid detail URL: {}", e));
                let mut report = AuctionReport::skipped(&auction_id);
                report.skipped = false;
                report.failure = failure.clone();
                return Ok((AuctionRun { auction, failure }, report));
            }
        };

        let first_page = PageUnit::new(auction_id.as_str(), 0);
        let resumable = self.store.is_done(&first_page)
            && self
                .store
                .progress(&auction_id)
                .is_some_and(|p| p.strategy.is_some());

        let mut rendered_page = None;
        if resumable {
            tracing::debug!("{}: strategy and first page known, not rendering again", auction_id);
        } else {
            let rendered = tokio::select! {
                biased;
                _ = self.shutdown.wait() => None,
                result = fetcher.render(self.renderer.as_ref(), &detail_url, Some(auction_id.as_str())) => Some(result),
            };

            match rendered {
                Some(Ok(page)) => {
                    auction.merge_metadata(parse_auction_details(&page.html));
                    rendered_page = Some(page);
                }
                Some(Err(e)) => tracing::warn!(
                    "{}: auction page did not render ({}); continuing with observed endpoints only",
                    auction_id,
                    e
                ),
                None => return Ok(Self::interrupted(auction, &auction_id)),
            }
        }

        let candidates = fetcher.recorder().candidates_for(&auction_id);
        fetcher.recorder().release(&auction_id);
        tracing::debug!("{}: {} JSON endpoint candidate(s)", auction_id, candidates.len());
        if !candidates.is_empty() {
            self.store.sink().append_endpoints(&auction_id, &candidates)?;
        }

        let context = PageContext {
            fetcher,
            detail_url: &detail_url,
            next_url: None,
        };

        let selection = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            result = select_strategy(&auction_id, candidates, &mut self.store, &context) => Some(result?),
        };
        let Some(mut selection) = selection else {
            return Ok(Self::interrupted(auction, &auction_id));
        };

        // the rendered auction page doubles as HTML page 0
        let html_page_needed = matches!(selection.strategy, Strategy::Html(_))
            && selection.probe.is_none()
            && !self.store.is_done(&first_page);
        if let (true, Some(page)) = (html_page_needed, &rendered_page) {
            let listing = parse_lot_page(&page.html, &first_page, &page.final_url);
            if !listing.records.is_empty() {
                selection.probe = Some(listing);
            }
        }

        let limit = page_limit(&self.config.crawler);
        let mut driver = PaginationDriver::new(fetcher, &mut self.store, &self.shutdown, limit);
        let outcome = driver
            .run(&auction_id, &detail_url, selection.strategy, selection.probe)
            .await?;

        tracing::info!(
            "{} finished: {} via {} ({} page(s), {} record(s) this run)",
            auction_id,
            outcome.state,
            outcome.source,
            outcome.pages_fetched,
            outcome.records
        );

        let report = AuctionReport::from_outcome(&auction_id, outcome);
        let run = AuctionRun {
            auction,
            failure: report.failure.clone(),
        };
        Ok((run, report))
    }

    fn interrupted(auction: DiscoveredAuction, auction_id: &str) -> (AuctionRun, AuctionReport) {
        tracing::warn!("{} interrupted before pagination", auction_id);
        let mut report = AuctionReport::skipped(auction_id);
        report.skipped = false;
        report.state = Some(PaginationState::Stopped { page_index: 0 });
        (AuctionRun { auction, failure: None }, report)
    }
}
