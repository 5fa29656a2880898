//! HTTP client for storefront requests using wreq for TLS fingerprint emulation.

use crate::config::Config;
use crate::shop::site::{Site, Source};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Trait for listing/product fetching - enables mocking for tests.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Fetches one page of a source's listing and returns the HTML.
    async fn listing(&self, source: &Source, page: u32) -> Result<String>;

    /// Fetches a product page by absolute URL.
    async fn product(&self, url: &str) -> Result<String>;
}

/// Storefront HTTP client with browser impersonation and a politeness delay.
pub struct ShopClient {
    client: Client,
    site: Site,
    delay_ms: u64,
    delay_jitter_ms: u64,
}

impl ShopClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            site: config.site.clone(),
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
        })
    }

    /// Performs a GET request with browser headers and the configured delay.
    async fn get(&self, url: &str) -> Result<String> {
        self.delay().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", self.site.accept_language.as_str())
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 429 || status == 503 {
            warn!("Rate limited ({}). Consider using a proxy or increasing delay.", status.as_u16());
            anyhow::bail!("Rate limited ({}). Try increasing --delay or using a proxy.", status.as_u16());
        }

        if !status.is_success() {
            anyhow::bail!("Request failed with status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    /// Adds a random delay to spread requests out.
    async fn delay(&self) {
        if self.delay_ms == 0 && self.delay_jitter_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

#[async_trait]
impl Storefront for ShopClient {
    async fn listing(&self, source: &Source, page: u32) -> Result<String> {
        let url = self.site.listing_url(source, page);

        info!("Fetching listing: {} (page {})", source, page);
        self.get(&url).await
    }

    async fn product(&self, url: &str) -> Result<String> {
        info!("Fetching product: {}", url);
        self.get(url).await
    }
}
