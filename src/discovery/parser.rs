//! Auction links and best-effort auction metadata from HTML

use crate::extract::fields::{norm_text, parse_datetime_loose};
use crate::model::{AuctionMetadata, AuctionRef, DiscoveredAuction};
use crate::url::{derive_auction_id, normalize_url, resolve_link};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static AUCTION_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bleil[aã]o\s*(?:n[ºo°]\.?|n\.)?\s*[:\-]?\s*([0-9]{1,10}(?:/[0-9]{2,4})?)\b")
        .expect("auction number pattern should compile")
});

static CLOSING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:encerramento|encerra|t[ée]rmino|data/hora|data e hora)\b")
        .expect("closing label pattern should compile")
});

const STATUS_KEYWORDS: &[&str] = &["publicado", "aberto", "encerrado", "finalizado", "em andamento"];

const LINK_LABELS: &[&str] = &["detalhes", "details"];

const CONTAINER_TAGS: &[&str] = &["div", "article", "section", "li"];

/// `Label: value` patterns per metadata key; a value ends at the next text
/// block (`|`) or the next `Word:` label
static LABELLED_FIELDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("city", r"cidade|munic[ií]pio|local"),
        ("yard", r"p[aá]tio"),
        ("organizer", r"organizador|leiloeiro"),
    ]
    .into_iter()
    .map(|(key, labels)| {
        let pattern = format!(
            r"(?i)\b(?:{})\b\s*[:\-]\s*(?:\|\s*)?(.+?)(?:\s*\||\s+\p{{L}}+\s*:|$)",
            labels
        );
        let re = Regex::new(&pattern).expect("labelled field pattern should compile");
        (key, re)
    })
    .collect()
});

/// Extracts auctions from a landing page
///
/// Anchors whose label mentions "detalhes" (or "details") are auction links.
/// Links are resolved against `page_url`, normalized, deduplicated by auction
/// id in first-seen order and capped at `max_auctions`.
pub fn parse_auction_links(
    html: &str,
    page_url: &Url,
    max_auctions: Option<usize>,
) -> Vec<DiscoveredAuction> {
    let document = Html::parse_document(html);
    let Some(anchors) = Selector::parse("a[href]").ok() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut auctions = Vec::new();

    for anchor in document.select(&anchors) {
        if max_auctions.is_some_and(|max| auctions.len() >= max) {
            break;
        }

        let label = element_text(anchor).to_lowercase();
        if !LINK_LABELS.iter().any(|l| label.contains(l)) {
            continue;
        }

        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, page_url))
            .and_then(|url| normalize_url(url.as_str()).ok())
        else {
            continue;
        };

        let auction_id = derive_auction_id(&url);
        if !seen.insert(auction_id.clone()) {
            continue;
        }

        let container = closest_container(anchor);
        auctions.push(DiscoveredAuction {
            reference: AuctionRef::new(auction_id, url.as_str()),
            metadata: parse_metadata_text(&block_text(container)),
        });
    }

    auctions
}

/// Best-effort metadata from an auction's own page
pub fn parse_auction_details(html: &str) -> AuctionMetadata {
    let document = Html::parse_document(html);
    parse_metadata_text(&block_text(document.root_element()))
}

fn closest_container(anchor: ElementRef<'_>) -> ElementRef<'_> {
    std::iter::once(anchor)
        .chain(anchor.ancestors().filter_map(ElementRef::wrap))
        .take(5)
        .find(|e| CONTAINER_TAGS.contains(&e.value().name()))
        .unwrap_or(anchor)
}

fn element_text(element: ElementRef<'_>) -> String {
    norm_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text blocks of an element joined with ` | `
fn block_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(norm_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn parse_metadata_text(text: &str) -> AuctionMetadata {
    let mut metadata = AuctionMetadata::new();

    if let Some(number) = AUCTION_NUMBER.captures(text).and_then(|c| c.get(1)) {
        metadata.insert("number".to_string(), number.as_str().to_string());
    }

    let lower = text.to_lowercase();
    if let Some(status) = STATUS_KEYWORDS.iter().find(|k| lower.contains(*k)) {
        metadata.insert("status".to_string(), status.to_string());
    }

    for (key, re) in LABELLED_FIELDS.iter() {
        let value = re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| norm_text(m.as_str()))
            .filter(|v| !v.is_empty());
        if let Some(value) = value {
            metadata.insert(key.to_string(), value);
        }
    }

    let ends_at = CLOSING_LABEL
        .find_iter(text)
        .find_map(|m| parse_datetime_loose(&text[m.end()..]));
    if let Some(ends_at) = ends_at {
        metadata.insert("ends_at".to_string(), ends_at);
    }

    metadata
}
