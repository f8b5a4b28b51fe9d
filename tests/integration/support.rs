//! Shared fixtures for the end-to-end crawl tests

use async_trait::async_trait;
use lot_harvest::config::Config;
use lot_harvest::crawler::{RenderError, RenderedPage, Renderer};
use lot_harvest::model::ResponseMeta;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// A rendered page served without touching the network
struct ScriptedPage {
    html: String,
    json_urls: Vec<String>,
}

/// Renderer replaying canned pages by path, standing in for a browser
///
/// Each page reports the JSON sub-requests a browser would have seen while
/// rendering it. Unknown paths render as HTTP 404.
#[derive(Default)]
pub struct ScriptedRenderer {
    pages: HashMap<String, ScriptedPage>,
    renders: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, path: &str, html: impl Into<String>, json_urls: Vec<String>) -> Self {
        self.pages.insert(
            path.to_string(),
            ScriptedPage {
                html: html.into(),
                json_urls,
            },
        );
        self
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);

        let page = match self.pages.get(url.path()) {
            Some(page) => RenderedPage {
                final_url: url.clone(),
                status: 200,
                html: page.html.clone(),
                responses: page
                    .json_urls
                    .iter()
                    .map(|u| ResponseMeta::get(u.as_str(), 200, "application/json"))
                    .collect(),
            },
            None => RenderedPage {
                final_url: url.clone(),
                status: 404,
                html: String::new(),
                responses: Vec::new(),
            },
        };
        Ok(page)
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fast configuration pointed at a mock server
pub fn test_config(server_uri: &str, output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.base_url = format!("{}/", server_uri);
    config.crawler.rate_limit = 50.0;
    config.crawler.timeout_secs = 5;
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.user_agent.crawler_name = "TestHarvester".to_string();
    config.output.output_dir = output_dir.to_path_buf();
    config
}

/// Landing page with one "Detalhes" card per auction path
pub fn home_page(auction_paths: &[&str]) -> String {
    let cards: String = auction_paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            format!(
                r#"<div class="card">
                     <h5>Leilão nº {}/2026</h5>
                     <p>Cidade: Contagem</p>
                     <a href="{}">Detalhes</a>
                   </div>"#,
                i + 1,
                path
            )
        })
        .collect();
    format!("<html><body><main>{}</main></body></html>", cards)
}

/// Auction page as rendered by the browser
pub fn auction_page(number: &str) -> String {
    format!(
        r#"<html><body>
             <h2>Leilão nº {}/2026</h2>
             <p>Organizador: Pátio Municipal</p>
             <div id="lotes"></div>
           </body></html>"#,
        number
    )
}

/// JSON listing body in the shape of the site's paged lot endpoint
pub fn lots_json(ids: std::ops::RangeInclusive<u32>, total_pages: u32) -> Value {
    let content: Vec<Value> = ids
        .map(|id| {
            json!({
                "id": id,
                "descricao": format!("VW/GOL 1.0 {}", 2000 + id),
                "lanceInicial": 1500.0 + f64::from(id),
            })
        })
        .collect();
    json!({ "content": content, "totalPages": total_pages })
}

/// HTML listing page with the site's lot cards and no next control
pub fn lot_cards(ids: &[u32]) -> String {
    lot_cards_page(ids, None)
}

/// HTML listing page with the site's lot cards and an optional next link
pub fn lot_cards_page(ids: &[u32], next_href: Option<&str>) -> String {
    let cards: String = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            format!(
                r#"<div class='card listaLotes' id='{id}'>
                     <div class='card-body'>
                       <b><span>Lote {n}</span> - <span>CONSERVADO</span></b>
                       <p>R$ 800,00</p>
                     </div>
                   </div>"#,
                id = id,
                n = i + 1
            )
        })
        .collect();
    let pager = next_href
        .map(|href| format!(r#"<nav><a rel="next" href="{}">Próxima</a></nav>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", cards, pager)
}

pub fn read_json(path: &Path) -> Value {
    let content = std::fs::read_to_string(path).expect("file should exist");
    serde_json::from_str(&content).expect("file should hold JSON")
}
