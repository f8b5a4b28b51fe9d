//! Lot extraction from an observed JSON endpoint

use super::fields::{self, get_first, scalar_text};
use super::{ExtractError, PageContext, PageResult};
use crate::model::{FieldValue, LotRecord, LotSource};
use crate::network::EndpointCandidate;
use crate::state::PageUnit;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// Keys under which listings wrap their record array
const CONTAINER_KEYS: &[&str] = &[
    "items", "content", "data", "result", "results", "registros", "lotes", "lots", "rows",
];

/// Nested objects that may carry pagination fields
const PAGINATION_SCOPES: &[&str] = &["pagination", "paging", "pageInfo", "meta", "page"];

const LOT_ID_KEYS: &[&str] = &[
    "lotId", "loteId", "id", "lote", "numeroLote", "numLote", "codigoLote", "codigo", "numero",
];
const DESCRIPTION_KEYS: &[&str] = &[
    "descricaoCurta", "descricao", "descricaoResumida", "nome", "titulo", "title",
];
const BRAND_KEYS: &[&str] = &["marcaModelo", "marca_modelo", "marca", "brand"];
const MODEL_KEYS: &[&str] = &["modelo", "model"];
const YEAR_KEYS: &[&str] = &["ano", "anoModelo", "ano_modelo", "anoFabricacao", "ano_fabricacao", "year"];
const SITUATION_KEYS: &[&str] = &["situacao", "status", "tipo", "categoria"];
const START_BID_KEYS: &[&str] = &["lanceInicial", "valorInicial", "valorMinimo", "precoInicial", "startBid"];
const ENDS_AT_KEYS: &[&str] = &["dataEncerramento", "encerramento", "fim", "endsAt"];
const LOT_URL_KEYS: &[&str] = &["url", "link", "detalheUrl", "detailsUrl"];
const IMAGE_KEYS: &[&str] = &["imagens", "images", "fotos", "fotosUrl", "photos"];
const IMAGE_URL_KEYS: &[&str] = &["url", "src", "caminho", "path"];

const TOTAL_PAGES_KEYS: &[&str] = &["totalPages", "total_pages", "paginas", "qtdPaginas", "lastPage"];
const LAST_PAGE_FLAG_KEYS: &[&str] = &["last"];
const HAS_NEXT_KEYS: &[&str] = &["hasNext", "has_next", "hasNextPage"];
const PAGE_SIZE_KEYS: &[&str] = &["size", "pageSize", "limit", "per_page"];

/// Reads lot pages from one endpoint candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonExtractor {
    candidate: EndpointCandidate,
}

impl JsonExtractor {
    pub fn new(candidate: EndpointCandidate) -> Self {
        Self { candidate }
    }

    pub fn candidate(&self) -> &EndpointCandidate {
        &self.candidate
    }

    pub(super) async fn fetch_page(
        &self,
        unit: &PageUnit,
        context: &PageContext<'_>,
    ) -> Result<PageResult, ExtractError> {
        let url = self
            .candidate
            .request_url(unit.page_index)
            .map_err(|e| ExtractError::Permanent {
                reason: e.to_string(),
            })?;

        let Some(url) = url else {
            // the endpoint cannot address pages past the first
            return Ok(PageResult::empty());
        };

        let page = context
            .fetcher
            .get(&url, Some(unit.auction_id.as_str()))
            .await?;

        let body: Value = serde_json::from_str(&page.body).map_err(|e| ExtractError::Structural {
            reason: format!("body of {} is not JSON: {}", page.final_url, e),
        })?;

        parse_listing(&body, unit, &self.candidate, &page.final_url)
    }
}

/// Maps a JSON listing body to the records of one page unit
///
/// # Arguments
///
/// * `body` - The parsed response body
/// * `unit` - The page being read
/// * `candidate` - The endpoint the body came from (for page size and paging)
/// * `base` - URL relative lot links resolve against
///
/// # Returns
///
/// * `Ok(PageResult)` - Records plus the has-next decision
/// * `Err(ExtractError::Structural)` - No list of records in the body
pub fn parse_listing(
    body: &Value,
    unit: &PageUnit,
    candidate: &EndpointCandidate,
    base: &Url,
) -> Result<PageResult, ExtractError> {
    let items = find_records(body).ok_or_else(|| ExtractError::Structural {
        reason: "response does not contain a list of records".to_string(),
    })?;

    let mut records = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            tracing::warn!(
                "Skipping non-object entry {} on {} (page {})",
                position,
                unit.auction_id,
                unit.page_index
            );
            continue;
        };
        match map_record(object, unit, base) {
            Some(record) => records.push(record),
            None => tracing::warn!(
                "Skipping entry {} without a lot id on {} (page {})",
                position,
                unit.auction_id,
                unit.page_index
            ),
        }
    }

    let has_next_page = has_next_page(body, items.len(), unit.page_index, candidate);

    Ok(PageResult {
        records,
        has_next_page,
        next_url: None,
    })
}

/// Locates the record array: the root itself, a container key, or any array of objects
fn find_records(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(object) => {
            for key in CONTAINER_KEYS {
                match object.get(*key) {
                    Some(Value::Array(items)) => return Some(items),
                    Some(inner @ Value::Object(_)) => {
                        if let Some(items) = find_records(inner) {
                            return Some(items);
                        }
                    }
                    _ => {}
                }
            }

            object.values().find_map(|v| match v {
                Value::Array(items) if items.first().is_some_and(Value::is_object) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}

fn map_record(object: &Map<String, Value>, unit: &PageUnit, base: &Url) -> Option<LotRecord> {
    let lot_id = get_first(object, LOT_ID_KEYS).and_then(scalar_text)?;

    let mut raw: BTreeMap<String, FieldValue> = BTreeMap::new();

    let description = get_first(object, DESCRIPTION_KEYS)
        .and_then(scalar_text)
        .map(|d| fields::truncate_chars(&d, fields::DESCRIPTION_MAX_CHARS));

    let brand = get_first(object, BRAND_KEYS).and_then(scalar_text);
    let model = get_first(object, MODEL_KEYS).and_then(scalar_text);
    let brand_model = match (brand, model) {
        (Some(b), Some(m)) if b != m => Some(format!("{} {}", b, m)),
        (Some(b), _) => Some(b),
        (None, m) => m,
    };

    let year = get_first(object, YEAR_KEYS)
        .and_then(scalar_text)
        .and_then(|y| fields::parse_year(&y))
        .or_else(|| brand_model.as_deref().and_then(fields::parse_year))
        .or_else(|| description.as_deref().and_then(fields::parse_year));

    raw.insert(fields::DESCRIPTION.to_string(), description.into());
    raw.insert(fields::BRAND_MODEL.to_string(), brand_model.into());
    raw.insert(fields::YEAR.to_string(), year.map(|y| y as f64).into());
    raw.insert(
        fields::SITUATION.to_string(),
        get_first(object, SITUATION_KEYS).and_then(scalar_text).into(),
    );
    raw.insert(
        fields::START_BID.to_string(),
        get_first(object, START_BID_KEYS).map_or(FieldValue::Null, fields::money_value),
    );
    raw.insert(
        fields::ENDS_AT.to_string(),
        get_first(object, ENDS_AT_KEYS).map_or(FieldValue::Null, fields::timestamp_value),
    );

    let lot_url = get_first(object, LOT_URL_KEYS)
        .and_then(scalar_text)
        .map(|href| base.join(&href).map(String::from).unwrap_or(href));
    raw.insert(fields::LOT_URL.to_string(), lot_url.into());

    let images = image_urls(get_first(object, IMAGE_KEYS));
    raw.insert(fields::IMAGE_URL.to_string(), images.first().cloned().into());
    raw.insert(
        fields::IMAGE_COUNT.to_string(),
        FieldValue::Number(images.len() as f64),
    );

    Some(LotRecord::new(
        unit.auction_id.clone(),
        lot_id,
        LotSource::Json,
        unit.page_index,
        raw,
    ))
}

fn image_urls(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::Object(image) => get_first(image, IMAGE_URL_KEYS).and_then(scalar_text),
                other => scalar_text(other),
            })
            .collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Decides whether another page follows
///
/// An empty page always ends the listing. Otherwise explicit pagination
/// fields win, then a full page (count equal to the declared size) means
/// "probe the next one".
fn has_next_page(
    body: &Value,
    item_count: usize,
    page_index: u32,
    candidate: &EndpointCandidate,
) -> bool {
    if item_count == 0 || candidate.page_parameter().is_none() {
        return false;
    }

    let scopes = pagination_scopes(body);

    if let Some(total) = scopes
        .iter()
        .find_map(|scope| get_first(scope, TOTAL_PAGES_KEYS).and_then(Value::as_u64))
    {
        return u64::from(page_index) + 1 < total;
    }

    if let Some(last) = scopes
        .iter()
        .find_map(|scope| get_first(scope, LAST_PAGE_FLAG_KEYS).and_then(Value::as_bool))
    {
        return !last;
    }

    if let Some(has_next) = scopes
        .iter()
        .find_map(|scope| get_first(scope, HAS_NEXT_KEYS).and_then(Value::as_bool))
    {
        return has_next;
    }

    let declared_size = scopes
        .iter()
        .find_map(|scope| get_first(scope, PAGE_SIZE_KEYS).and_then(Value::as_u64))
        .filter(|size| *size > 0)
        .or_else(|| candidate.declared_page_size());

    match declared_size {
        Some(size) => item_count as u64 >= size,
        None => true,
    }
}

fn pagination_scopes(body: &Value) -> Vec<&Map<String, Value>> {
    let Some(root) = body.as_object() else {
        return Vec::new();
    };

    let mut scopes = vec![root];
    for key in PAGINATION_SCOPES {
        if let Some(Value::Object(inner)) = root.get(*key) {
            scopes.push(inner);
        }
    }
    for key in CONTAINER_KEYS {
        if let Some(Value::Object(inner)) = root.get(*key) {
            scopes.push(inner);
        }
    }
    scopes
}
