use serde::Deserialize;

/// Main configuration structure for Listing-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    pub output: OutputConfig,
    #[serde(default, rename = "location")]
    pub locations: Vec<LocationEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of page fetches in flight at once
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: u32,

    /// Additional attempts after the first failed one
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Number of listing pages to fetch per location
    #[serde(default = "default_pages")]
    pub pages: u32,

    /// Staged records that trigger a batch flush
    #[serde(rename = "batch-limit", default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Per-fetch timeout (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Initial retry backoff (milliseconds, 0 disables backoff)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on a single retry backoff (milliseconds)
    #[serde(rename = "retry-backoff-max-ms", default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,

    /// How long close() waits for an in-flight flush (milliseconds)
    #[serde(rename = "close-timeout-ms", default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Field used to detect duplicate listings
    #[serde(rename = "dedup-key", default)]
    pub dedup_key: IdentityKey,

    /// Seed the seen-set from the existing listing file before crawling
    #[serde(rename = "preload-seen", default)]
    pub preload_seen: bool,

    /// Run the detail stage after each listing stage
    #[serde(rename = "detail-stage", default = "default_true")]
    pub detail_stage: bool,
}

/// Which listing field identifies a record for deduplication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKey {
    /// Canonical item URL
    #[default]
    Url,
    /// Display name
    Name,
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host that listing paths are appended to
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Routing hints handed to the fetch layer
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Target country/locale for the request
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
        }
    }
}

/// Optional proxy API that requests are routed through
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Proxy API endpoint
    #[serde(default = "default_proxy_endpoint")]
    pub endpoint: String,

    /// API key sent with every proxied request
    #[serde(rename = "api-key")]
    pub api_key: String,

    /// Render wait requested from the proxy (milliseconds)
    #[serde(rename = "wait-ms", default = "default_proxy_wait_ms")]
    pub wait_ms: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the CSV files are written to
    pub directory: String,
}

/// One location to crawl listing pages for
#[derive(Debug, Clone, Deserialize)]
pub struct LocationEntry {
    /// Site-specific numeric city identifier
    #[serde(rename = "id-number")]
    pub id_number: u64,

    /// Region (state) code
    pub state: String,

    /// Human-readable locality, e.g. "Myrtle Beach"
    pub locality: String,
}

fn default_max_workers() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_pages() -> u32 {
    1
}

fn default_batch_limit() -> usize {
    50
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_retry_backoff_max_ms() -> u64 {
    8_000
}

fn default_close_timeout_ms() -> u64 {
    3_000
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://www.redfin.com".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

fn default_proxy_endpoint() -> String {
    "https://proxy.scrapeops.io/v1/".to_string()
}

fn default_proxy_wait_ms() -> u64 {
    3_000
}
