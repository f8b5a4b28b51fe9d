//! Per-auction choice between the JSON and HTML strategies
//!
//! The choice is made once per auction and persisted in the checkpoint, so a
//! resumed auction continues with the strategy it started with. Falling back
//! to HTML is permanent.

use crate::extract::{
    ExtractError, HtmlExtractor, JsonExtractor, PageContext, PageResult, Strategy,
};
use crate::model::LotSource;
use crate::network::EndpointCandidate;
use crate::state::PageUnit;
use crate::storage::{CheckpointStore, StorageResult};

/// The strategy an auction will be paginated with
#[derive(Debug)]
pub struct Selection {
    pub strategy: Strategy,
    /// Page 0 as read by a successful JSON probe, still to be committed
    pub probe: Option<PageResult>,
}

impl Selection {
    fn html() -> Self {
        Self {
            strategy: Strategy::Html(HtmlExtractor),
            probe: None,
        }
    }

    fn json(candidate: EndpointCandidate, probe: Option<PageResult>) -> Self {
        Self {
            strategy: Strategy::Json(JsonExtractor::new(candidate)),
            probe,
        }
    }
}

/// Orders candidates so that paginated, lot-looking endpoints are probed first
pub fn rank_candidates(mut candidates: Vec<EndpointCandidate>) -> Vec<EndpointCandidate> {
    let score = |c: &EndpointCandidate| {
        let template = c.url_template.to_lowercase();
        let mut score = 0;
        if template.contains("lot") {
            score += 2;
        }
        if c.page_parameter().is_some() {
            score += 1;
        }
        score
    };
    candidates.sort_by_key(|c| std::cmp::Reverse(score(c)));
    candidates
}

/// Chooses the strategy for one auction
///
/// # Selection Rules
///
/// | Situation | Result |
/// |-----------|--------|
/// | Strategy stored in the checkpoint | Reused, no probe |
/// | Page 0 already committed | JSON if a candidate exists, else HTML |
/// | No candidates | HTML |
/// | Probe returns lots | JSON with that endpoint; page 0 is the probe |
/// | Probe gets 401/403 | `requires_login`, HTML |
/// | Probe exhausts its retries | HTML |
/// | Probe fails otherwise or finds no lots | Next candidate, then HTML |
///
/// # Returns
///
/// * `Ok(Selection)` - The chosen strategy
/// * `Err(StorageError)` - The choice could not be persisted
pub async fn select_strategy(
    auction_id: &str,
    candidates: Vec<EndpointCandidate>,
    store: &mut CheckpointStore,
    context: &PageContext<'_>,
) -> StorageResult<Selection> {
    if let Some(progress) = store.progress(auction_id) {
        match (progress.strategy, &progress.endpoint) {
            (Some(LotSource::Html), _) => {
                tracing::debug!("{}: resuming with stored HTML strategy", auction_id);
                return Ok(Selection::html());
            }
            (Some(LotSource::Json), Some(endpoint)) => {
                tracing::debug!("{}: resuming with stored JSON endpoint", auction_id);
                return Ok(Selection::json(endpoint.clone(), None));
            }
            _ => {}
        }
    }

    let first_page = PageUnit::new(auction_id, 0);
    let candidates = rank_candidates(candidates);

    if store.is_done(&first_page) {
        let selection = match candidates.into_iter().next() {
            Some(candidate) => {
                store.record_strategy(auction_id, LotSource::Json, Some(candidate.clone()))?;
                Selection::json(candidate, None)
            }
            None => {
                store.record_strategy(auction_id, LotSource::Html, None)?;
                Selection::html()
            }
        };
        return Ok(selection);
    }

    if candidates.is_empty() {
        tracing::info!("{}: no JSON endpoint observed, using HTML", auction_id);
        store.record_strategy(auction_id, LotSource::Html, None)?;
        return Ok(Selection::html());
    }

    for candidate in candidates {
        let probe = Strategy::Json(JsonExtractor::new(candidate.clone()));
        match probe.fetch_page(&first_page, context).await {
            Ok(page) if !page.records.is_empty() => {
                tracing::info!(
                    "{}: using JSON endpoint {} ({} lots on first page)",
                    auction_id,
                    candidate.url_template,
                    page.records.len()
                );
                store.record_strategy(auction_id, LotSource::Json, Some(candidate.clone()))?;
                return Ok(Selection::json(candidate, Some(page)));
            }
            Ok(_) => {
                tracing::debug!(
                    "{}: endpoint {} returned no lots",
                    auction_id,
                    candidate.url_template
                );
            }
            Err(ExtractError::AuthorizationBoundary { status }) => {
                tracing::warn!(
                    "{}: JSON endpoint requires login (HTTP {}), falling back to HTML",
                    auction_id,
                    status
                );
                store.mark_requires_login(auction_id)?;
                break;
            }
            Err(e @ ExtractError::Exhausted { .. }) => {
                tracing::warn!("{}: JSON endpoint unavailable ({}), falling back to HTML", auction_id, e);
                break;
            }
            Err(e) => {
                tracing::warn!(
                    "{}: endpoint {} unusable: {}",
                    auction_id,
                    candidate.url_template,
                    e
                );
            }
        }
    }

    tracing::info!("{}: falling back to HTML", auction_id);
    store.record_strategy(auction_id, LotSource::Html, None)?;
    Ok(Selection::html())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn candidate(url: &str) -> EndpointCandidate {
        EndpointCandidate::from_url(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_rank_prefers_paginated_lot_endpoints() {
        let ranked = rank_candidates(vec![
            candidate("https://example.com/api/config"),
            candidate("https://example.com/api/banners?page=1"),
            candidate("https://example.com/api/lotes?page=1&size=8"),
        ]);

        let templates: Vec<&str> = ranked.iter().map(|c| c.url_template.as_str()).collect();
        assert_eq!(
            templates,
            vec![
                "https://example.com/api/lotes?page=&size=",
                "https://example.com/api/banners?page=",
                "https://example.com/api/config",
            ]
        );
    }
}
