//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full listing and detail cycle end-to-end.

use listing_harvest::config::{
    parse_config, Config, CrawlerConfig, IdentityKey, LocationEntry, OutputConfig, RoutingConfig,
    SiteConfig,
};
use listing_harvest::crawler::{crawl, Coordinator, RunMode};
use listing_harvest::output::Stage;
use listing_harvest::url::detail_file_name;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path, pages: u32) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_workers: 3,
            max_retries: 3,
            pages,
            batch_limit: 2,
            fetch_timeout_secs: 5,
            retry_backoff_ms: 0,
            retry_backoff_max_ms: 0,
            close_timeout_ms: 500,
            dedup_key: IdentityKey::Url,
            preload_seen: false,
            detail_stage: false,
        },
        site: SiteConfig {
            base_url: base_url.to_string(),
        },
        routing: RoutingConfig {
            country: "us".to_string(),
        },
        proxy: None,
        output: OutputConfig {
            directory: output.display().to_string(),
        },
        locations: vec![LocationEntry {
            id_number: 7,
            state: "SC".to_string(),
            locality: "Test Town".to_string(),
        }],
    }
}

/// Listing page with one JSON-LD block per home
fn listing_page(homes: &[u32]) -> String {
    let blocks: String = homes
        .iter()
        .map(|n| {
            format!(
                r#"<script type="application/ld+json">
                [{{"@type": "Product", "name": "{n} Ocean Blvd", "url": "/home/{n}",
                  "offers": {{"@type": "Offer", "price": {n}00000, "priceCurrency": "USD"}}}},
                 {{"@type": "Event", "name": "Open house"}}]
                </script>"#
            )
        })
        .collect();
    format!("<html><head><title>Homes</title>{blocks}</head><body></body></html>")
}

fn detail_page(beds: &str, baths: &str, sqft: &str, diff_class: &str) -> String {
    format!(
        r#"<html><body>
        <div data-rf-test-id="abp-beds"><div class="statsValue">{beds}</div><div class="statsLabel">Beds</div></div>
        <div data-rf-test-id="abp-baths"><div class="statsValue">{baths}</div></div>
        <div data-rf-test-id="abp-sqFt"><span class="statsValue">{sqft}</span></div>
        <span data-rf-test-name="avmDiffValue" class="diffValue {diff_class}">$12,000</span>
        </body></html>"#
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Where the detail stage writes the item served at `/home/<n>`
fn detail_file(dir: &TempDir, server: &MockServer, name: &str, n: u32) -> PathBuf {
    dir.path()
        .join(detail_file_name(name, &format!("{}/home/{}", server.uri(), n)))
}

fn csv_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_failing_page_retried_then_isolated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/city/7/SC/Test-Town/page-1", listing_page(&[1, 2])).await;
    mount_page(&server, "/city/7/SC/Test-Town/page-3", listing_page(&[5])).await;

    // max-retries = 3, so exactly four attempts
    Mock::given(method("GET"))
        .and(path("/city/7/SC/Test-Town/page-2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path(), 3);
    let report = crawl(config, RunMode::Full).await.unwrap();

    assert_eq!(report.stages.len(), 1);
    let listing = &report.stages[0];
    assert_eq!(listing.stage, Stage::Listing);
    assert_eq!(listing.succeeded, 2);
    assert_eq!(listing.failed.len(), 1);
    assert_eq!(listing.failed[0].attempts, 4);
    assert!(listing.failed[0].url.ends_with("/city/7/SC/Test-Town/page-2"));
    assert!(listing.failed[0].cause.contains("500"));

    let lines = csv_lines(&dir.path().join("Test-Town.csv"));
    assert_eq!(lines[0], "name,price,price_currency,url");
    assert_eq!(lines.len(), 4);

    let mut names: Vec<&str> = lines[1..]
        .iter()
        .filter_map(|line| line.split(',').next())
        .collect();
    names.sort();
    assert_eq!(names, vec!["1 Ocean Blvd", "2 Ocean Blvd", "5 Ocean Blvd"]);
}

#[tokio::test]
async fn test_full_harvest_from_config_text() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Home 2 appears on both pages
    mount_page(&server, "/city/7/SC/Test-Town/page-1", listing_page(&[1, 2])).await;
    mount_page(&server, "/city/7/SC/Test-Town/page-2", listing_page(&[2, 3])).await;
    mount_page(&server, "/home/1", detail_page("3", "2.5", "1,850", "green")).await;
    mount_page(&server, "/home/2", detail_page("—", "1", "900", "red")).await;
    mount_page(&server, "/home/3", detail_page("4", "—", "—", "red")).await;

    let toml = format!(
        r#"
[crawler]
max-workers = 2
max-retries = 1
pages = 2
batch-limit = 2
retry-backoff-ms = 0
retry-backoff-max-ms = 0

[site]
base-url = "{}"

[output]
directory = "{}"

[[location]]
id-number = 7
state = "SC"
locality = "Test Town"
"#,
        server.uri(),
        dir.path().display()
    );
    let config = parse_config(&toml).unwrap();
    assert!(config.crawler.detail_stage);

    let report = crawl(config, RunMode::Full).await.unwrap();

    assert_eq!(report.total_failed(), 0);
    let listing = report.stages_of(Stage::Listing).next().unwrap();
    assert_eq!(listing.records_accepted, 3);
    assert_eq!(listing.duplicates, 1);
    let detail = report.stages_of(Stage::Detail).next().unwrap();
    assert_eq!(detail.succeeded, 3);

    // Header written once across several flushes
    let listing_lines = csv_lines(&dir.path().join("Test-Town.csv"));
    assert_eq!(listing_lines.len(), 4);
    assert_eq!(
        listing_lines
            .iter()
            .filter(|line| line.starts_with("name,"))
            .count(),
        1
    );
    assert!(listing_lines
        .iter()
        .any(|line| line == &format!("2 Ocean Blvd,200000,USD,{}/home/2", server.uri())));

    assert_eq!(
        csv_lines(&detail_file(&dir, &server, "1 Ocean Blvd", 1)),
        vec![
            "name,bedrooms,bathrooms,square_feet,price_differential",
            "1 Ocean Blvd,3,2.5,1850,12000",
        ]
    );
    assert_eq!(
        csv_lines(&detail_file(&dir, &server, "2 Ocean Blvd", 2))[1],
        "2 Ocean Blvd,0,1.0,900,-12000"
    );
    assert_eq!(
        csv_lines(&detail_file(&dir, &server, "3 Ocean Blvd", 3))[1],
        "3 Ocean Blvd,4,0.0,0,-12000"
    );
}

#[tokio::test]
async fn test_details_only_reads_earlier_listing_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/home/9", detail_page("2", "1", "640", "green")).await;

    std::fs::write(
        dir.path().join("Test-Town.csv"),
        format!(
            "name,price,price_currency,url\n9 Dune Ct,310000,USD,{}/home/9\n",
            server.uri()
        ),
    )
    .unwrap();

    let config = create_test_config(&server.uri(), dir.path(), 1);
    let coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run(RunMode::DetailsOnly).await.unwrap();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage, Stage::Detail);
    assert_eq!(report.total_records(), 1);
    assert_eq!(
        csv_lines(&detail_file(&dir, &server, "9 Dune Ct", 9))[1],
        "9 Dune Ct,2,1.0,640,12000"
    );
}

#[tokio::test]
async fn test_second_run_appends_without_second_header() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/city/7/SC/Test-Town/page-1", listing_page(&[1])).await;

    let config = create_test_config(&server.uri(), dir.path(), 1);
    crawl(config.clone(), RunMode::ListingsOnly).await.unwrap();
    crawl(config, RunMode::ListingsOnly).await.unwrap();

    // No preload, so the second run appends the same row again
    let lines = csv_lines(&dir.path().join("Test-Town.csv"));
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "name,price,price_currency,url");
    assert_eq!(lines[1], lines[2]);
}

#[tokio::test]
async fn test_preload_keeps_second_run_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/city/7/SC/Test-Town/page-1", listing_page(&[1, 4])).await;

    let mut config = create_test_config(&server.uri(), dir.path(), 1);
    config.crawler.preload_seen = true;

    crawl(config.clone(), RunMode::ListingsOnly).await.unwrap();
    let report = crawl(config, RunMode::ListingsOnly).await.unwrap();

    assert_eq!(report.stages[0].duplicates, 2);
    assert_eq!(csv_lines(&dir.path().join("Test-Town.csv")).len(), 3);
}

#[tokio::test]
async fn test_repeated_rows_fetch_each_detail_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/home/9"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
            "2", "1", "640", "green",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let row = format!("9 Dune Ct,310000,USD,{}/home/9\n", server.uri());
    std::fs::write(
        dir.path().join("Test-Town.csv"),
        format!("name,price,price_currency,url\n{row}{row}"),
    )
    .unwrap();

    let config = create_test_config(&server.uri(), dir.path(), 1);
    let report = crawl(config, RunMode::DetailsOnly).await.unwrap();

    assert_eq!(report.stages[0].duplicates, 1);
    let lines = csv_lines(&detail_file(&dir, &server, "9 Dune Ct", 9));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "9 Dune Ct,2,1.0,640,12000");
}
