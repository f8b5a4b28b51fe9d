use url::Url;

/// Query parameter names that carry a page number, in priority order
pub const PAGE_PARAM_NAMES: &[&str] = &["page", "pagina", "pageNumber", "pageIndex", "p"];

/// Query parameter names that carry a page size
pub const SIZE_PARAM_NAMES: &[&str] = &["size", "limit", "pageSize", "per_page", "tamanho"];

const OFFSET_PARAM_NAMES: &[&str] = &["offset", "start", "skip"];

/// How an endpoint selects a page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageParameter {
    /// `name=<first + page_index>`
    Number { name: String, first: u32 },
    /// `name=<page_index * page_size>`
    Offset { name: String, page_size: u64 },
}

/// Splits a URL into its template (query values blanked) and its ordered parameters
///
/// ```
/// use lot_harvest::url::url_template;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/api/lotes?leilao=2842&page=1&size=8").unwrap();
/// let (template, params) = url_template(&url);
/// assert_eq!(template, "https://example.com/api/lotes?leilao=&page=&size=");
/// assert_eq!(params[1], ("page".to_string(), "1".to_string()));
/// ```
pub fn url_template(url: &Url) -> (String, Vec<(String, String)>) {
    let params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let mut template = base.to_string();
    if !params.is_empty() {
        let names: Vec<String> = params.iter().map(|(name, _)| format!("{}=", name)).collect();
        template.push('?');
        template.push_str(&names.join("&"));
    }

    (template, params)
}

/// Finds the parameter that selects the page, if the endpoint has one
///
/// A page-number parameter observed with value `0` is taken as zero-based;
/// any other example value means the site counts from one.
pub fn detect_page_parameter(params: &[(String, String)]) -> Option<PageParameter> {
    for candidate in PAGE_PARAM_NAMES {
        if let Some((name, value)) = find_param(params, candidate) {
            let first = if value.trim() == "0" { 0 } else { 1 };
            return Some(PageParameter::Number {
                name: name.to_string(),
                first,
            });
        }
    }

    for candidate in OFFSET_PARAM_NAMES {
        if let Some((name, _)) = find_param(params, candidate) {
            let page_size = page_size_hint(params)?;
            return Some(PageParameter::Offset {
                name: name.to_string(),
                page_size,
            });
        }
    }

    None
}

/// Page size declared by the request itself (`size=8`, `limit=20`, ...)
pub fn page_size_hint(params: &[(String, String)]) -> Option<u64> {
    SIZE_PARAM_NAMES.iter().find_map(|candidate| {
        find_param(params, candidate)
            .and_then(|(_, value)| value.trim().parse::<u64>().ok())
            .filter(|size| *size > 0)
    })
}

/// Returns `params` with the page parameter set for `page_index`
pub fn apply_page(
    params: &[(String, String)],
    parameter: &PageParameter,
    page_index: u32,
) -> Vec<(String, String)> {
    let (target, value) = match parameter {
        PageParameter::Number { name, first } => {
            (name.as_str(), (u64::from(*first) + u64::from(page_index)).to_string())
        }
        PageParameter::Offset { name, page_size } => {
            (name.as_str(), (u64::from(page_index) * page_size).to_string())
        }
    };

    params
        .iter()
        .map(|(name, old)| {
            if name == target {
                (name.clone(), value.clone())
            } else {
                (name.clone(), old.clone())
            }
        })
        .collect()
}

/// Replaces the query string of `url` with `params`
pub fn with_query(url: &Url, params: &[(String, String)]) -> Url {
    let mut url = url.clone();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }
    url
}

/// URL of an HTML listing page when no "next" link is known
///
/// Page 0 is the detail URL itself; later pages set the first recognised
/// page parameter (or `page`) to the one-based page number.
pub fn html_page_url(detail_url: &Url, page_index: u32) -> Url {
    if page_index == 0 {
        return detail_url.clone();
    }

    let mut params: Vec<(String, String)> = detail_url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let number = (u64::from(page_index) + 1).to_string();
    let existing = PAGE_PARAM_NAMES
        .iter()
        .find_map(|candidate| find_param(&params, candidate).map(|(name, _)| name.to_string()));

    match existing {
        Some(name) => {
            for (key, value) in params.iter_mut() {
                if *key == name {
                    *value = number.clone();
                }
            }
        }
        None => params.push(("page".to_string(), number)),
    }

    with_query(detail_url, &params)
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<(&'a str, &'a str)> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .or_else(|| params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
        .map(|(key, value)| (key.as_str(), value.as_str()))
}
