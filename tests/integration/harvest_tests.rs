//! End-to-end harvest tests
//!
//! These tests use wiremock to serve a small catalog and drive the real
//! reqwest fetcher, the listing extractor and the SQLite store.

use catalog_harvest::config::{parse_config, Config};
use catalog_harvest::harvest::run_harvest;
use catalog_harvest::output::{load_statistics, persist_results};
use catalog_harvest::storage::{OutcomeStore, RunStatus, SqliteStore};
use catalog_harvest::WorkerState;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a config for categories served by the mock server
///
/// Each category is `(id, url path, proxies)`.
fn test_config(db_path: &str, categories: &[(&str, String, Vec<&str>)], extra: &str) -> Config {
    let mut toml = format!(
        r#"
        [harvest]
        workers = 3
        outer-concurrency = 2
        requests-per-minute = 6000
        page-timeout-secs = 2
        health-check-timeout-secs = 1

        [http]
        user-agent = "catalog-harvest-test"
        probe-url = "http://127.0.0.1:9/"

        [output]
        database-path = "{}"

        {}
        "#,
        db_path, extra
    );

    for (id, url, proxies) in categories {
        let proxies: Vec<String> = proxies.iter().map(|p| format!("\"{}\"", p)).collect();
        toml.push_str(&format!(
            "\n[[category]]\nid = \"{}\"\nurl = \"{}\"\nproxies = [{}]\n",
            id,
            url,
            proxies.join(", ")
        ));
    }

    parse_config(&toml).expect("test config is valid")
}

fn listing_page(names: &[String]) -> String {
    let listings: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<div class="catalog-product">
                     <div class="catalog-product__name-wrapper"><span>{name}</span></div>
                     <a class="catalog-product__name" href="/product/{slug}/">{name}</a>
                     <div class="product-buy__price">1&#x202f;299 ₽</div>
                   </div>"#,
                name = name,
                slug = name.to_lowercase().replace(' ', "-")
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", listings)
}

fn landing_page(pages: u32) -> String {
    format!(
        r#"<html><body>
             <div class="pagination-widget">
               <a class="pagination-widget__page-link" href="?p=1">1</a>
               <a class="pagination-widget__page-link pagination-widget__page-link_last" href="?p={pages}">{pages}</a>
             </div>
           </body></html>"#,
        pages = pages
    )
}

/// Mounts `pages` listing pages with two products each, then the landing page
///
/// Page mocks are mounted first so they take precedence over the landing
/// mock, which matches the bare path.
async fn mount_category(server: &MockServer, category_path: &str, pages: u32) {
    for page in 1..=pages {
        let names = vec![
            format!("{} {}a", category_path.trim_matches('/'), page),
            format!("{} {}b", category_path.trim_matches('/'), page),
        ];
        Mock::given(method("GET"))
            .and(path(category_path))
            .and(query_param("p", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing_page(&names))
                    .insert_header("content-type", "text/html"),
            )
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(category_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(landing_page(pages))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("harvest.db").to_string_lossy().to_string()
}

#[tokio::test]
async fn test_full_harvest_single_category() {
    let server = MockServer::start().await;
    mount_category(&server, "/catalog/ram/", 4).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[("ram", format!("{}/catalog/ram/", server.uri()), vec![])],
        "",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let ram = &results["ram"];
    assert!(ram.success);
    assert_eq!(ram.total_pages, 4);
    assert_eq!(ram.pages_attempted, 4);
    assert_eq!(ram.pages_failed, 0);
    assert_eq!(ram.records.len(), 8);

    let first = &ram.records[0];
    assert_eq!(first.get("name"), Some("catalog/ram 1a"));
    assert_eq!(first.get("price"), Some("1299"));
    assert_eq!(
        first.get("url"),
        Some(format!("{}/product/catalog/ram-1a/", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_results_are_persisted() {
    let server = MockServer::start().await;
    mount_category(&server, "/catalog/ram/", 2).await;
    mount_category(&server, "/catalog/cpu/", 3).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);
    let config = test_config(
        &db,
        &[
            ("ram", format!("{}/catalog/ram/", server.uri()), vec![]),
            ("cpu", format!("{}/catalog/cpu/", server.uri()), vec![]),
        ],
        "",
    );

    let mut store = SqliteStore::new(std::path::Path::new(&db)).unwrap();
    let run_id = store.create_run("test-hash").unwrap();
    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();
    persist_results(&mut store, run_id, &results, false).unwrap();

    assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Completed);
    assert_eq!(store.count_records(run_id).unwrap(), 10);

    let cpu = store.load_records(run_id, "cpu").unwrap();
    let names: Vec<&str> = cpu.iter().filter_map(|r| r.get("name")).collect();
    assert_eq!(names.len(), 6);
    assert_eq!(names[0], "catalog/cpu 1a");
    assert_eq!(names[5], "catalog/cpu 3b");

    let stats = load_statistics(&store, run_id).unwrap();
    assert_eq!(stats.categories_succeeded, 2);
    assert_eq!(stats.total_records, 10);
}

#[tokio::test]
async fn test_server_errors_are_isolated_per_page() {
    let server = MockServer::start().await;

    // page 2 fails, mounted before the healthy pages so it wins
    Mock::given(method("GET"))
        .and(path("/catalog/gpu/"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_category(&server, "/catalog/gpu/", 3).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[("gpu", format!("{}/catalog/gpu/", server.uri()), vec![])],
        "",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let gpu = &results["gpu"];
    assert!(gpu.success);
    assert_eq!(gpu.pages_attempted, 3);
    assert_eq!(gpu.pages_failed, 1);
    assert_eq!(gpu.records.len(), 4);
    assert!(gpu.failures.iter().any(|f| f.contains("HTTP 500")));
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/catalog/ssd/"))
        .and(query_param("p", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["late".to_string()]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_category(&server, "/catalog/ssd/", 2).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[("ssd", format!("{}/catalog/ssd/", server.uri()), vec![])],
        "",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let ssd = &results["ssd"];
    assert!(ssd.success);
    assert_eq!(ssd.pages_failed, 1);
    assert_eq!(ssd.records.len(), 2);
    assert!(ssd.failures.iter().any(|f| f.contains("timed out")));
}

#[tokio::test]
async fn test_product_count_discovery() {
    let server = MockServer::start().await;

    for page in 1..=3 {
        Mock::given(method("GET"))
            .and(path("/catalog/psu/"))
            .and(query_param("p", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&[format!("psu {}", page)])),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/catalog/psu/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="products-count">Showing 20 of 45 products</div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[("psu", format!("{}/catalog/psu/", server.uri()), vec![])],
        "[scout]\npage-size = 20",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let psu = &results["psu"];
    assert_eq!(psu.total_pages, 3);
    assert_eq!(psu.records.len(), 3);
    assert!(!psu.is_degraded());
}

#[tokio::test]
async fn test_unreachable_proxies_abort_workers_not_category() {
    let server = MockServer::start().await;
    mount_category(&server, "/catalog/ram/", 2).await;
    mount_category(&server, "/catalog/cpu/", 2).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[
            // nothing listens on the discard port
            ("ram", format!("{}/catalog/ram/", server.uri()), vec!["http://127.0.0.1:9"]),
            ("cpu", format!("{}/catalog/cpu/", server.uri()), vec![]),
        ],
        "",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let ram = &results["ram"];
    assert!(ram.success, "aborted workers keep the weak success");
    assert!(ram.records.is_empty());
    assert!(ram.is_degraded());
    assert_eq!(ram.workers_aborted, 3);
    assert_eq!(ram.pages_attempted, 0);

    let cpu = &results["cpu"];
    assert!(cpu.success);
    assert_eq!(cpu.records.len(), 4);
}

#[tokio::test]
async fn test_missing_category_degrades_to_default() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[("fans", format!("{}/catalog/fans/", server.uri()), vec![])],
        "[scout]\ndefault-page-count = 2",
    );

    let results = run_harvest(&config, CancellationToken::new()).await.unwrap();

    let fans = &results["fans"];
    assert!(fans.success);
    assert!(fans.is_degraded());
    assert_eq!(fans.total_pages, 2);
    assert_eq!(fans.pages_failed, 2);
    assert!(fans.records.is_empty());
}

#[tokio::test]
async fn test_cancelled_run_returns_every_category() {
    let server = MockServer::start().await;
    mount_category(&server, "/catalog/ram/", 2).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(
        &db_path(&dir),
        &[
            ("ram", format!("{}/catalog/ram/", server.uri()), vec![]),
            ("cpu", format!("{}/catalog/cpu/", server.uri()), vec![]),
        ],
        "",
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let results = run_harvest(&config, cancel).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.values().all(|o| !o.success));
}

#[test]
fn test_worker_state_db_strings() {
    for state in WorkerState::all_states() {
        assert_eq!(WorkerState::from_db_string(state.to_db_string()), Some(state));
    }
}
