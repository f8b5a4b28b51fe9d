use url::Url;

/// Derives a stable auction id from its detail URL
///
/// Numeric path segments are the site's own identifiers and are joined with
/// `-` (`/lotes/lista-lotes/2842/2026` becomes `2842-2026`). Paths without
/// numbers fall back to a slug of path and query.
pub fn derive_auction_id(url: &Url) -> String {
    let numeric: Vec<&str> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
                .collect()
        })
        .unwrap_or_default();

    if !numeric.is_empty() {
        return numeric.join("-");
    }

    let mut basis = url.path().to_string();
    if let Some(query) = url.query() {
        basis.push('-');
        basis.push_str(query);
    }

    let slug = slugify(&basis);
    if slug.is_empty() {
        slugify(url.host_str().unwrap_or("auction"))
    } else {
        slug
    }
}

/// Lowercases and collapses every run of non-alphanumeric characters to `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
