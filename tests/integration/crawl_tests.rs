//! End-to-end crawl tests
//!
//! A scripted renderer stands in for the browser and reports the JSON calls
//! each page would make; wiremock serves robots.txt, the JSON endpoint and
//! the HTML listing pages.

use crate::support::{
    auction_page, home_page, lot_cards, lot_cards_page, lots_json, read_json, test_config,
    ScriptedRenderer,
};
use lot_harvest::crawler::{crawl, Coordinator, Shutdown};
use lot_harvest::model::LotSource;
use lot_harvest::output::{AUCTIONS_FILE, CONSOLIDATED_LOTS_FILE};
use lot_harvest::state::{DoneReason, PageUnit, PaginationState};
use lot_harvest::storage::{CheckpointStore, CHECKPOINT_FILE};
use lot_harvest::HarvestError;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUCTION_A: &str = "/lotes/lista-lotes/2842/2026";
const AUCTION_B: &str = "/lotes/lista-lotes/2850/2026";

fn endpoint(server: &MockServer, leilao: &str) -> String {
    format!("{}/api/lotes?leilao={}&page=1&size=8", server.uri(), leilao)
}

async fn mount_json_page(server: &MockServer, page: &str, body: serde_json::Value, hits: u64) {
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_json_auction_is_harvested_to_the_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json_page(&server, "1", lots_json(1..=8, 2), 1).await;
    mount_json_page(&server, "2", lots_json(9..=16, 2), 1).await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer.clone(), Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions_discovered, 1);
    assert_eq!(report.records, 16);
    assert!(!report.interrupted);
    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Done(DoneReason::Exhausted))
    );
    assert_eq!(report.auctions[0].source, Some(LotSource::Json));
    assert_eq!(renderer.shutdowns(), 1);

    let state = CheckpointStore::load(&dir.path().join(CHECKPOINT_FILE)).unwrap();
    let units: Vec<PageUnit> = state.completed_units.iter().cloned().collect();
    assert_eq!(
        units,
        vec![PageUnit::new("2842-2026", 0), PageUnit::new("2842-2026", 1)]
    );
    assert!(state.auctions["2842-2026"].exhausted);

    let lots = read_json(&dir.path().join(CONSOLIDATED_LOTS_FILE));
    let lots = lots.as_array().unwrap();
    assert_eq!(lots.len(), 16);
    assert!(lots.iter().all(|lot| lot["source"] == "json"));

    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["auction_id"], "2842-2026");
    assert_eq!(auctions[0]["strategy"], "json");
    assert_eq!(auctions[0]["incomplete"], false);
    assert_eq!(auctions[0]["metadata"]["organizer"], "Pátio Municipal");
}

#[tokio::test]
async fn test_login_wall_falls_back_to_html_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(AUCTION_B))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[500101, 500102])))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_B]), vec![])
            .page(AUCTION_B, auction_page("2850"), vec![endpoint(&server, "2850")]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions[0].source, Some(LotSource::Html));
    assert_eq!(report.records, 2);

    let progress = coordinator.store().progress("2850-2026").unwrap();
    assert!(progress.requires_login);
    assert_eq!(progress.strategy, Some(LotSource::Html));

    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["requires_login"], true);
    assert_eq!(auctions[0]["lot_count"], 2);

    let lots = read_json(&dir.path().join(CONSOLIDATED_LOTS_FILE));
    assert_eq!(lots[0]["lot_id"], "500101");
    assert_eq!(lots[0]["source"], "html");
}

#[tokio::test]
async fn test_dry_run_reads_two_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json_page(&server, "1", lots_json(1..=8, 5), 1).await;
    mount_json_page(&server, "2", lots_json(9..=16, 5), 1).await;
    mount_json_page(&server, "3", lots_json(17..=24, 5), 0).await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    let mut config = test_config(&server.uri(), dir.path());
    config.crawler.dry_run = true;
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Done(DoneReason::PageLimit))
    );
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(coordinator.store().state().pages_completed("2842-2026"), 2);
    assert!(!coordinator.store().is_exhausted("2842-2026"));

    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["incomplete"], true);
}

#[tokio::test]
async fn test_resume_fetches_only_missing_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // each page is requested once across both runs
    mount_json_page(&server, "1", lots_json(1..=8, 2), 1).await;
    mount_json_page(&server, "2", lots_json(9..=16, 2), 1).await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    let mut config = test_config(&server.uri(), dir.path());
    config.crawler.max_pages = Some(1);
    let mut first = Coordinator::new(config, renderer.clone(), Shutdown::new()).unwrap();
    let report = first.run().await.unwrap();
    assert_eq!(report.pages_fetched, 1);
    drop(first);

    let config = test_config(&server.uri(), dir.path());
    let mut second = Coordinator::new(config, renderer.clone(), Shutdown::new()).unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Done(DoneReason::Exhausted))
    );
    assert_eq!(second.store().state().pages_completed("2842-2026"), 2);

    let lots = read_json(&dir.path().join(CONSOLIDATED_LOTS_FILE));
    assert_eq!(lots.as_array().unwrap().len(), 16);
    assert_eq!(renderer.shutdowns(), 2);

    // the second run reuses the stored endpoint instead of rendering the auction again
    assert_eq!(renderer.renders(), 3);
    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["metadata"]["organizer"], "Pátio Municipal");
}

#[tokio::test]
async fn test_exhausted_auction_is_skipped_on_rerun() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json_page(&server, "1", lots_json(1..=8, 1), 1).await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    for _ in 0..2 {
        let config = test_config(&server.uri(), dir.path());
        let mut coordinator = Coordinator::new(config, renderer.clone(), Shutdown::new()).unwrap();
        coordinator.run().await.unwrap();
    }

    // landing page twice, auction page only in the first run
    assert_eq!(renderer.renders(), 3);

    let raw = CheckpointStore::open(dir.path())
        .unwrap()
        .sink()
        .read_lots("2842-2026")
        .unwrap();
    assert_eq!(raw.len(), 8);
}

#[tokio::test]
async fn test_failed_auction_does_not_stop_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(AUCTION_A))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(AUCTION_B))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[700001])))
        .mount(&server)
        .await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A, AUCTION_B]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![])
            .page(AUCTION_B, auction_page("2850"), vec![]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions.len(), 2);
    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Failed { page_index: 0 })
    );
    assert!(report.auctions[0].failure.is_some());
    assert_eq!(
        report.auctions[1].state,
        Some(PaginationState::Done(DoneReason::Exhausted))
    );
    assert_eq!(report.incomplete().count(), 1);

    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["auction_id"], "2842-2026");
    assert_eq!(auctions[0]["incomplete"], true);
    assert!(auctions[0]["failure"].is_string());
    assert_eq!(auctions[1]["auction_id"], "2850-2026");
    assert_eq!(auctions[1]["incomplete"], false);
}

#[tokio::test]
async fn test_discovery_falls_back_to_plain_http() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(home_page(&[AUCTION_B])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(AUCTION_B))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[1])))
        .mount(&server)
        .await;

    // the landing page is not scripted, so rendering it answers 404
    let renderer = Arc::new(ScriptedRenderer::new().page(AUCTION_B, auction_page("2850"), vec![]));

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions_discovered, 1);
    assert_eq!(report.auctions[0].auction_id, "2850-2026");
}

#[tokio::test]
async fn test_discovery_failure_ends_the_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let renderer = Arc::new(
        ScriptedRenderer::new().page("/", "<html><body><p>Sem leilões</p></body></html>", vec![]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer.clone(), Shutdown::new()).unwrap();
    let result = coordinator.run().await;

    assert!(matches!(result, Err(HarvestError::DiscoveryFailed { .. })));
    assert_eq!(renderer.shutdowns(), 1);
    assert!(!dir.path().join(AUCTIONS_FILE).exists());
}

#[tokio::test]
async fn test_shutdown_before_discovery() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let renderer = Arc::new(ScriptedRenderer::new().page("/", home_page(&[AUCTION_A]), vec![]));

    let shutdown = Shutdown::new();
    shutdown.trigger();

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer.clone(), shutdown).unwrap();
    let report = coordinator.run().await.unwrap();

    assert!(report.interrupted);
    assert!(report.auctions.is_empty());
    assert_eq!(renderer.renders(), 0);
    assert_eq!(renderer.shutdowns(), 1);
    assert_eq!(read_json(&dir.path().join(AUCTIONS_FILE)), serde_json::json!([]));
}

#[tokio::test]
async fn test_json_page_exhaustion_fails_the_auction() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json_page(&server, "1", lots_json(1..=8, 3), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_json_page(&server, "3", lots_json(17..=24, 3), 0).await;

    Mock::given(method("GET"))
        .and(path(AUCTION_A))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[900001])))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Failed { page_index: 1 })
    );
    assert_eq!(report.auctions[0].source, Some(LotSource::Json));
    assert!(report.auctions[0].failure.is_some());

    let store = coordinator.store();
    assert!(!store.is_exhausted("2842-2026"));
    assert_eq!(store.state().pages_completed("2842-2026"), 1);
    assert_eq!(store.progress("2842-2026").unwrap().strategy, Some(LotSource::Json));

    let auctions = read_json(&dir.path().join(AUCTIONS_FILE));
    assert_eq!(auctions[0]["incomplete"], true);
}

#[tokio::test]
async fn test_json_failure_after_first_page_restarts_with_html() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json_page(&server, "1", lots_json(1..=8, 3), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mensagem": "consulta indisponível"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_json_page(&server, "3", lots_json(17..=24, 3), 0).await;

    Mock::given(method("GET"))
        .and(path(AUCTION_A))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards_page(
            &[900001, 900002],
            Some("/lotes/pagina-2/2842"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lotes/pagina-2/2842"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[900003])))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_A]), vec![])
            .page(AUCTION_A, auction_page("2842"), vec![endpoint(&server, "2842")]),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Done(DoneReason::Exhausted))
    );
    assert_eq!(report.auctions[0].source, Some(LotSource::Html));

    let store = coordinator.store();
    let progress = store.progress("2842-2026").unwrap();
    assert_eq!(progress.strategy, Some(LotSource::Html));
    assert!(progress.endpoint.is_none());
    assert!(!progress.requires_login);
    assert_eq!(store.state().pages_completed("2842-2026"), 2);

    let html_lots: Vec<String> = store
        .sink()
        .read_lots("2842-2026")
        .unwrap()
        .into_iter()
        .filter(|r| r.source == LotSource::Html)
        .map(|r| r.lot_id)
        .collect();
    assert_eq!(html_lots, vec!["900001", "900002", "900003"]);
}

#[tokio::test]
async fn test_unusable_endpoints_select_html_for_every_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/lotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mensagem": "sem lotes"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lotes-destaque"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(AUCTION_B))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards_page(
            &[500101],
            Some("/lotes/pagina-2/2850"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lotes/pagina-2/2850"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[500102])))
        .expect(1)
        .mount(&server)
        .await;

    let renderer = Arc::new(
        ScriptedRenderer::new()
            .page("/", home_page(&[AUCTION_B]), vec![])
            .page(
                AUCTION_B,
                auction_page("2850"),
                vec![
                    endpoint(&server, "2850"),
                    format!("{}/api/lotes-destaque?leilao=2850&page=1", server.uri()),
                ],
            ),
    );

    let config = test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, renderer, Shutdown::new()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.auctions[0].source, Some(LotSource::Html));
    assert_eq!(report.auctions[0].pages_fetched, 2);
    assert_eq!(report.records, 2);

    let progress = coordinator.store().progress("2850-2026").unwrap();
    assert_eq!(progress.strategy, Some(LotSource::Html));
    assert!(!progress.requires_login);
}

#[tokio::test]
async fn test_http_renderer_page_serves_as_first_listing_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(home_page(&[AUCTION_B])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(AUCTION_B))
        .respond_with(ResponseTemplate::new(200).set_body_string(lot_cards(&[500101, 500102])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), dir.path());
    let report = crawl(config, Shutdown::new()).await.unwrap();

    assert_eq!(report.auctions[0].source, Some(LotSource::Html));
    assert_eq!(report.records, 2);
    assert_eq!(
        report.auctions[0].state,
        Some(PaginationState::Done(DoneReason::Exhausted))
    );
}
