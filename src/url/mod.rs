//! URL handling module for lot-harvest
//!
//! This module provides URL normalization, link resolution, auction id
//! derivation, endpoint templates and page-parameter rewriting.

mod auction_id;
mod normalize;
mod paginate;

// Re-export main functions
pub use auction_id::{derive_auction_id, slugify};
pub use normalize::{normalize_url, resolve_link};
pub use paginate::{
    apply_page, detect_page_parameter, html_page_url, page_size_hint, url_template, with_query,
    PageParameter, PAGE_PARAM_NAMES, SIZE_PARAM_NAMES,
};
