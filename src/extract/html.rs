//! Lot extraction from HTML listing pages
//!
//! The site renders each lot as a `div.card.listaLotes`; pages without that
//! structure fall back to a looser scan of `article`, `li` and `div.card`
//! blocks that mention a lot number.

use super::fields::{self, norm_text, parse_money, parse_year};
use super::{ExtractError, PageContext, PageResult};
use crate::model::{FieldValue, LotRecord, LotSource};
use crate::state::PageUnit;
use crate::url::{html_page_url, resolve_link, slugify};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

static LOT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLote\s*[:#\-]?\s*([0-9]+[a-zA-Z0-9\-\.]*)\b")
        .expect("lot number pattern should compile")
});

static MONEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R\$\s*[0-9\.,]+").expect("money pattern should compile"));

static DETAIL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/lotes/detalhes/\d+").expect("detail path pattern should compile")
});

static LOT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blote\b").expect("lot word pattern should compile"));

static ENDS_AT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bencerra(?:mento)?\b").expect("closing label pattern should compile")
});

/// Situation labels, most specific first
const SITUATION_KEYWORDS: &[&str] = &[
    "sem reserva",
    "com reserva",
    "sucata",
    "recuperável",
    "recuperavel",
    "não circula",
    "nao circula",
    "circula",
];

const NEXT_LABELS: &[&str] = &["próx", "próxima", "proxima", "próximo", "proximo", "next", "»", ">", "›"];

/// Reads lot cards from the auction's HTML listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub(super) async fn fetch_page(
        &self,
        unit: &PageUnit,
        context: &PageContext<'_>,
    ) -> Result<PageResult, ExtractError> {
        let url = page_url(context.detail_url, context.next_url, unit.page_index);

        let page = context
            .fetcher
            .get(&url, Some(unit.auction_id.as_str()))
            .await?;

        Ok(parse_lot_page(&page.body, unit, &page.final_url))
    }
}

/// URL of page `page_index`: the previous page's "next" link when known
pub fn page_url(detail_url: &Url, next_url: Option<&Url>, page_index: u32) -> Url {
    match next_url {
        Some(next) if page_index > 0 => next.clone(),
        _ => html_page_url(detail_url, page_index),
    }
}

/// Parses one listing page into records and a has-next decision
///
/// A page without any lot cards ends pagination even if it shows an
/// enabled "next" control.
pub fn parse_lot_page(html: &str, unit: &PageUnit, page_url: &Url) -> PageResult {
    let document = Html::parse_document(html);

    let mut records = parse_site_cards(&document, unit, page_url);
    if records.is_empty() {
        records = parse_generic_cards(&document, unit, page_url);
    }
    let records = dedupe_by_lot_id(records);

    if records.is_empty() {
        return PageResult::empty();
    }

    let next = find_next_control(&document, page_url);
    PageResult {
        records,
        has_next_page: next.is_some(),
        next_url: next.flatten(),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    norm_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn parse_site_cards(document: &Html, unit: &PageUnit, page_url: &Url) -> Vec<LotRecord> {
    let Some(cards) = selector("div.card.listaLotes") else {
        return Vec::new();
    };

    document
        .select(&cards)
        .map(|card| parse_site_card(card, unit, page_url))
        .collect()
}

fn parse_site_card(card: ElementRef<'_>, unit: &PageUnit, page_url: &Url) -> LotRecord {
    let card_text = element_text(card);
    let card_id = card
        .value()
        .attr("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    // header reads "Lote 1 - CONSERVADO"
    let header_text = selector("div.card-body b")
        .and_then(|s| card.select(&s).next())
        .map(element_text)
        .filter(|t| !t.is_empty());

    let lot_number = LOT_NUMBER
        .captures(header_text.as_deref().unwrap_or(&card_text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let situation = selector("div.card-body b span")
        .and_then(|s| card.select(&s).nth(1))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| situation_keyword(&card_text));

    let brand_model_full = selector("div.row div.col-12.text-center b").and_then(|s| {
        card.select(&s)
            .map(element_text)
            .find(|t| !t.is_empty() && !LOT_WORD.is_match(t))
    });

    let year = brand_model_full
        .as_deref()
        .and_then(parse_year)
        .or_else(|| parse_year(&card_text));
    let brand_model = brand_model_full.map(|full| strip_trailing_year(&full, year));

    let start_bid = card_id
        .as_deref()
        .and_then(|id| selector(&format!("#valor_atual_lote_{}", id)))
        .and_then(|s| card.select(&s).next())
        .and_then(|el| parse_money(&element_text(el)))
        .or_else(|| money_in(&card_text));

    let images = image_urls(card, page_url);

    let lot_url = selector("span[onclick]")
        .and_then(|s| card.select(&s).next())
        .and_then(|el| el.value().attr("onclick"))
        .and_then(|onclick| DETAIL_PATH.find(onclick))
        .and_then(|m| page_url.join(m.as_str()).ok());

    let requires_login = selector("a")
        .map(|s| {
            card.select(&s).any(|a| {
                let label = element_text(a).to_lowercase();
                let href = a.value().attr("href").unwrap_or("").to_lowercase();
                label.contains("login obrigat") || href.contains("/ssc/login/login")
            })
        })
        .unwrap_or(false);

    let lot_id = card_id
        .or_else(|| lot_number.clone())
        .unwrap_or_else(|| fallback_lot_id(header_text.as_deref().unwrap_or(&card_text)));

    let description = header_text
        .clone()
        .or_else(|| lot_number.as_ref().map(|n| format!("Lote {}", n)))
        .unwrap_or_else(|| card_text.clone());

    let mut raw = BTreeMap::new();
    raw.insert(
        fields::DESCRIPTION.to_string(),
        FieldValue::text(fields::truncate_chars(&description, fields::DESCRIPTION_MAX_CHARS)),
    );
    raw.insert(fields::BRAND_MODEL.to_string(), brand_model.into());
    raw.insert(fields::YEAR.to_string(), year.map(|y| y as f64).into());
    raw.insert(fields::SITUATION.to_string(), situation.into());
    raw.insert(fields::START_BID.to_string(), start_bid.into());
    raw.insert(fields::ENDS_AT.to_string(), FieldValue::Null);
    raw.insert(fields::LOT_URL.to_string(), lot_url.map(String::from).into());
    insert_images(&mut raw, &images);
    raw.insert(
        fields::REQUIRES_LOGIN.to_string(),
        FieldValue::text(requires_login.to_string()),
    );
    raw.insert(fields::RAW_TEXT.to_string(), FieldValue::text(card_text));

    LotRecord::new(
        unit.auction_id.clone(),
        lot_id,
        LotSource::Html,
        unit.page_index,
        raw,
    )
}

fn parse_generic_cards(document: &Html, unit: &PageUnit, page_url: &Url) -> Vec<LotRecord> {
    let Some(blocks) = selector("article, li, div.card") else {
        return Vec::new();
    };

    document
        .select(&blocks)
        .filter_map(|block| parse_generic_card(block, unit, page_url))
        .collect()
}

/// Loose card parse; blocks without a "Lote <n>" marker are ignored
fn parse_generic_card(block: ElementRef<'_>, unit: &PageUnit, page_url: &Url) -> Option<LotRecord> {
    let text = element_text(block);
    let lot_id = LOT_NUMBER.captures(&text)?.get(1)?.as_str().to_string();

    let lower = text.to_lowercase();
    let requires_login = lower.contains("login") && lower.contains("obrig");

    let ends_at = ENDS_AT_LABEL
        .find(&text)
        .and_then(|m| fields::parse_datetime_loose(&text[m.end()..]));

    let brand_model = block
        .text()
        .map(norm_text)
        .filter(|line| !line.is_empty())
        .take(6)
        .find(|line| {
            line.chars().count() >= 3
                && !LOT_WORD.is_match(line)
                && !MONEY.is_match(line)
                && !line.to_lowercase().contains("encerr")
        });

    let lot_url = selector("a[href]").and_then(|s| {
        block.select(&s).find_map(|a| {
            let href = a.value().attr("href")?;
            let wanted = href.to_lowercase().contains("lote")
                || element_text(a).to_lowercase().contains("detal");
            if wanted {
                resolve_link(href, page_url)
            } else {
                None
            }
        })
    });

    let images = image_urls(block, page_url);

    let mut raw = BTreeMap::new();
    raw.insert(
        fields::DESCRIPTION.to_string(),
        FieldValue::text(fields::truncate_chars(&text, fields::DESCRIPTION_MAX_CHARS)),
    );
    raw.insert(fields::BRAND_MODEL.to_string(), brand_model.into());
    raw.insert(fields::YEAR.to_string(), parse_year(&text).map(|y| y as f64).into());
    raw.insert(fields::SITUATION.to_string(), situation_keyword(&text).into());
    raw.insert(fields::START_BID.to_string(), money_in(&text).into());
    raw.insert(fields::ENDS_AT.to_string(), ends_at.into());
    raw.insert(fields::LOT_URL.to_string(), lot_url.map(String::from).into());
    insert_images(&mut raw, &images);
    raw.insert(
        fields::REQUIRES_LOGIN.to_string(),
        FieldValue::text(requires_login.to_string()),
    );
    raw.insert(fields::RAW_TEXT.to_string(), FieldValue::text(text));

    Some(LotRecord::new(
        unit.auction_id.clone(),
        lot_id,
        LotSource::Html,
        unit.page_index,
        raw,
    ))
}

/// Finds an enabled "next page" control
///
/// # Returns
///
/// * `None` - No enabled control
/// * `Some(Some(url))` - Enabled control with a followable link
/// * `Some(None)` - Enabled control without a usable href (script-driven)
fn find_next_control(document: &Html, page_url: &Url) -> Option<Option<Url>> {
    if let Some(rel_next) = selector("a[rel~=\"next\"]") {
        if let Some(link) = document.select(&rel_next).find(|el| !is_disabled(*el)) {
            let href = link.value().attr("href").unwrap_or("");
            return Some(resolve_link(href, page_url));
        }
    }

    let controls = selector("a, button")?;
    document
        .select(&controls)
        .filter(|el| is_next_label(*el))
        .find(|el| !is_disabled(*el))
        .map(|el| {
            el.value()
                .attr("href")
                .and_then(|href| resolve_link(href, page_url))
        })
}

fn is_next_label(element: ElementRef<'_>) -> bool {
    let label = element_text(element).to_lowercase();
    let aria = element
        .value()
        .attr("aria-label")
        .map(str::to_lowercase)
        .unwrap_or_default();

    [label.as_str(), aria.as_str()].iter().any(|text| {
        !text.is_empty()
            && NEXT_LABELS
                .iter()
                .any(|next| *text == *next || text.starts_with(&format!("{} ", next)) || text.starts_with("próx"))
    })
}

fn is_disabled(element: ElementRef<'_>) -> bool {
    let marks_disabled = |el: ElementRef<'_>| {
        let value = el.value();
        value.classes().any(|c| c == "disabled")
            || value.attr("disabled").is_some()
            || value
                .attr("aria-disabled")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    };

    marks_disabled(element)
        || element
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(marks_disabled)
}

fn image_urls(card: ElementRef<'_>, page_url: &Url) -> Vec<String> {
    let Some(images) = selector("img[src]") else {
        return Vec::new();
    };
    card.select(&images)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve_link(src, page_url))
        .map(String::from)
        .collect()
}

fn insert_images(raw: &mut BTreeMap<String, FieldValue>, images: &[String]) {
    raw.insert(fields::IMAGE_URL.to_string(), images.first().cloned().into());
    raw.insert(
        fields::IMAGE_COUNT.to_string(),
        FieldValue::Number(images.len() as f64),
    );
}

fn situation_keyword(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    SITUATION_KEYWORDS
        .iter()
        .find(|k| lower.contains(*k))
        .map(|k| k.to_string())
}

fn money_in(text: &str) -> Option<f64> {
    MONEY.find(text).and_then(|m| parse_money(m.as_str()))
}

fn strip_trailing_year(full: &str, year: Option<i64>) -> String {
    let Some(year) = year else {
        return full.to_string();
    };
    let stripped = full
        .trim_end()
        .strip_suffix(&year.to_string())
        .filter(|rest| rest.is_empty() || rest.ends_with(char::is_whitespace))
        .map(str::trim_end)
        .unwrap_or(full);

    if stripped.is_empty() {
        full.to_string()
    } else {
        stripped.to_string()
    }
}

fn fallback_lot_id(text: &str) -> String {
    let slug = slugify(&text.chars().take(60).collect::<String>());
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

/// Keeps one record per lot id: first position, last content
fn dedupe_by_lot_id(records: Vec<LotRecord>) -> Vec<LotRecord> {
    let mut unique: Vec<LotRecord> = Vec::with_capacity(records.len());
    for record in records {
        match unique.iter_mut().find(|r| r.lot_id == record.lot_id) {
            Some(existing) => *existing = record,
            None => unique.push(record),
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_CARD: &str = r#"
    <div class='card listaLotes' id='282156'>
      <span onclick="$(location).prop('href', '/lotes/detalhes/282156');">
        <img src='/../Imagens/visualizar/leiloes/leilao_2842/img_282156_1.jpg' />
      </span>
      <div class='card-body'>
        <div class='row'><div class='col-12'>
          <b><span>Lote 1</span> - <span>CONSERVADO</span></b>
        </div></div>
        <div class='row'><div class='col-12 text-center'><b>HONDA/CBX 250 TWISTER 2006</b></div></div>
        <p class='update_info_lote' id='valor_atual_lote_282156'>R$ 400,00</p>
        <a href='/ssc/login/login' class='btn'>Login Obrigatório</a>
      </div>
    </div>
    "#;

    fn page_url() -> Url {
        Url::parse("https://leilao.example.com/lotes/lista-lotes/2842/2026").unwrap()
    }

    fn unit() -> PageUnit {
        PageUnit::new("2842-2026", 0)
    }

    #[test]
    fn test_site_card_fields() {
        let result = parse_lot_page(SITE_CARD, &unit(), &page_url());
        assert_eq!(result.records.len(), 1);

        let lot = &result.records[0];
        assert_eq!(lot.lot_id, "282156");
        assert_eq!(lot.source, LotSource::Html);
        assert_eq!(lot.field("situation"), Some(&FieldValue::text("CONSERVADO")));
        assert_eq!(lot.field("year"), Some(&FieldValue::Number(2006.0)));
        assert_eq!(lot.field("brand_model"), Some(&FieldValue::text("HONDA/CBX 250 TWISTER")));
        assert_eq!(lot.field("start_bid"), Some(&FieldValue::Number(400.0)));
        assert_eq!(lot.field("requires_login"), Some(&FieldValue::text("true")));
        assert_eq!(
            lot.field("lot_url"),
            Some(&FieldValue::text("https://leilao.example.com/lotes/detalhes/282156"))
        );
        assert_eq!(lot.field("image_count"), Some(&FieldValue::Number(1.0)));
        let image = lot.field("image_url").unwrap().as_str().unwrap();
        assert!(image.ends_with("img_282156_1.jpg"));
    }

    #[test]
    fn test_lot_number_suffixes_stay_distinct() {
        for (second, expected) in [("123A", "123A"), ("123-A", "123-A")] {
            let html = format!(
                r#"<div class='card listaLotes'><div class='card-body'><b><span>Lote 123</span></b><p>R$ 10</p></div></div>
                   <div class='card listaLotes'><div class='card-body'><b><span>Lote {}</span></b><p>R$ 20</p></div></div>"#,
                second
            );
            let result = parse_lot_page(&html, &unit(), &page_url());
            let ids: Vec<&str> = result.records.iter().map(|r| r.lot_id.as_str()).collect();
            assert_eq!(ids, vec!["123", expected]);
        }
    }

    #[test]
    fn test_generic_fallback() {
        let html = r#"
        <ul>
          <li>Lote 7 - FIAT/UNO MILLE 2010 <br/> R$ 1.500,00 <br/> Encerramento: 10/03/2026 às 14:00
              <a href="/lote/7">ver</a></li>
          <li>Contato</li>
        </ul>"#;
        let result = parse_lot_page(html, &unit(), &page_url());
        assert_eq!(result.records.len(), 1);

        let lot = &result.records[0];
        assert_eq!(lot.lot_id, "7");
        assert_eq!(lot.field("start_bid"), Some(&FieldValue::Number(1500.0)));
        assert_eq!(lot.field("year"), Some(&FieldValue::Number(2010.0)));
        assert_eq!(lot.field("ends_at"), Some(&FieldValue::text("2026-03-10T14:00:00")));
        assert_eq!(
            lot.field("lot_url"),
            Some(&FieldValue::text("https://leilao.example.com/lote/7"))
        );
    }

    #[test]
    fn test_next_link_is_followed() {
        let html = format!(
            r#"{}<ul class="pagination"><li><a href="?page=2">Próxima</a></li></ul>"#,
            SITE_CARD
        );
        let result = parse_lot_page(&html, &unit(), &page_url());
        assert!(result.has_next_page);
        assert_eq!(
            result.next_url.unwrap().as_str(),
            "https://leilao.example.com/lotes/lista-lotes/2842/2026?page=2"
        );
    }

    #[test]
    fn test_disabled_next_ends_listing() {
        let html = format!(
            r##"{}<ul class="pagination"><li class="page-item disabled"><a href="#">»</a></li></ul>"##,
            SITE_CARD
        );
        let result = parse_lot_page(&html, &unit(), &page_url());
        assert!(!result.has_next_page);
    }

    #[test]
    fn test_script_next_control_without_href() {
        let html = format!(r#"{}<button type="button">Next</button>"#, SITE_CARD);
        let result = parse_lot_page(&html, &unit(), &page_url());
        assert!(result.has_next_page);
        assert!(result.next_url.is_none());
    }

    #[test]
    fn test_rel_next() {
        let html = format!(r#"{}<a rel="next" href="/lotes/lista-lotes/2842/2026?page=3">3</a>"#, SITE_CARD);
        let result = parse_lot_page(&html, &unit(), &page_url());
        assert_eq!(
            result.next_url.unwrap().as_str(),
            "https://leilao.example.com/lotes/lista-lotes/2842/2026?page=3"
        );
    }

    #[test]
    fn test_empty_page_is_done_even_with_next_control() {
        let html = r#"<p>Nenhum lote encontrado</p><a href="?page=9">Próxima</a>"#;
        let result = parse_lot_page(html, &unit(), &page_url());
        assert!(result.records.is_empty());
        assert!(!result.has_next_page);
    }

    #[test]
    fn test_page_url_prefers_next_link() {
        let detail = page_url();
        let next = Url::parse("https://leilao.example.com/lotes/lista-lotes/2842/2026?pg=2").unwrap();

        assert_eq!(page_url_for(&detail, Some(&next), 0), detail);
        assert_eq!(page_url_for(&detail, Some(&next), 1), next);
        assert_eq!(
            page_url_for(&detail, None, 1).as_str(),
            "https://leilao.example.com/lotes/lista-lotes/2842/2026?page=2"
        );
    }

    fn page_url_for(detail: &Url, next: Option<&Url>, page_index: u32) -> Url {
        super::page_url(detail, next, page_index)
    }

    #[test]
    fn test_strip_trailing_year() {
        assert_eq!(strip_trailing_year("HONDA/CBX 250 2006", Some(2006)), "HONDA/CBX 250");
        assert_eq!(strip_trailing_year("MODEL2006", Some(2006)), "MODEL2006");
        assert_eq!(strip_trailing_year("2006", Some(2006)), "2006");
        assert_eq!(strip_trailing_year("FUSCA", None), "FUSCA");
    }
}
