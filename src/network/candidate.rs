use crate::model::NetworkObservation;
use crate::url::{apply_page, detect_page_parameter, page_size_hint, url_template, with_query, PageParameter};
use crate::UrlError;
use serde::{Deserialize, Serialize};
use url::Url;

/// A JSON endpoint that may serve an auction's lot listing
///
/// The template keeps parameter names with blank values; `query_params`
/// keeps the values seen on the observed request, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub url_template: String,
    pub query_params: Vec<(String, String)>,
}

impl EndpointCandidate {
    pub fn from_url(url: &Url) -> Self {
        let (url_template, query_params) = url_template(url);
        Self {
            url_template,
            query_params,
        }
    }

    /// Builds a candidate from a JSON `GET` observation
    pub fn from_observation(observation: &NetworkObservation) -> Option<Self> {
        if !observation.is_json() || !observation.method.eq_ignore_ascii_case("GET") {
            return None;
        }
        Url::parse(&observation.url).ok().map(|url| Self::from_url(&url))
    }

    pub fn page_parameter(&self) -> Option<PageParameter> {
        detect_page_parameter(&self.query_params)
    }

    /// Page size requested by the observed call, if it declared one
    pub fn declared_page_size(&self) -> Option<u64> {
        page_size_hint(&self.query_params)
    }

    /// URL for the given page of this endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Some(url))` - The request URL for `page_index`
    /// * `Ok(None)` - The endpoint has no page parameter and `page_index > 0`
    /// * `Err(UrlError)` - The stored template is not a valid URL
    pub fn request_url(&self, page_index: u32) -> Result<Option<Url>, UrlError> {
        let base = Url::parse(&self.url_template).map_err(|e| UrlError::Parse(e.to_string()))?;

        let params = match self.page_parameter() {
            Some(parameter) => apply_page(&self.query_params, &parameter, page_index),
            None if page_index == 0 => self.query_params.clone(),
            None => return Ok(None),
        };

        Ok(Some(with_query(&base, &params)))
    }
}
