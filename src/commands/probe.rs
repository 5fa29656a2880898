//! Probe command: runs extraction over one page without notifying anything.

use crate::config::Config;
use crate::extract::{is_blocked, FieldExtractor, LinkExtractor, Markup};
use crate::format::Formatter;
use crate::shop::{Offer, ShopClient, Source, Storefront};
use anyhow::{Context, Result};
use tracing::info;

/// Shows what a scan would extract from a listing or product page.
pub struct ProbeCommand {
    config: Config,
}

impl ProbeCommand {
    /// Creates a new probe command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Fetches the URL and returns formatted output.
    pub async fn execute(&self, url: &str) -> Result<String> {
        let client = ShopClient::new(&self.config).context("Failed to create HTTP client")?;

        self.execute_with_client(&client, url).await
    }

    /// Probes a URL with a provided client (for testing).
    pub async fn execute_with_client(&self, client: &impl Storefront, url: &str) -> Result<String> {
        let offers = self.probe(client, url).await?;

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_offers(&offers, &self.config.site.currency))
    }

    async fn probe(&self, client: &impl Storefront, url: &str) -> Result<Vec<Offer>> {
        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Invalid URL: '{}'. Expected an absolute http(s) URL.", url);
        }

        let site = &self.config.site;
        let fields = FieldExtractor::new();

        if site.is_product_url(url) {
            info!("Probing product page: {}", url);
            let html = client.product(url).await?;
            ensure_not_blocked(&html)?;

            let offer = Offer::new(url, fields.extract(&Markup::document(&html)));
            return Ok(vec![offer]);
        }

        info!("Probing listing page: {}", url);
        let html = client.listing(&Source::Url { url: url.to_string() }, 1).await?;
        ensure_not_blocked(&html)?;

        let links = LinkExtractor::new(site, self.config.context_chars, self.config.max_per_source)?;
        let offers = links
            .extract(&html)
            .into_iter()
            .map(|candidate| {
                let markup = Markup::fragment(&candidate.context)
                    .with_title_hint(candidate.title_hint.as_deref())
                    .with_link(&candidate.url);
                Offer::new(candidate.url.clone(), fields.extract(&markup))
            })
            .collect();

        Ok(offers)
    }
}

fn ensure_not_blocked(html: &str) -> Result<()> {
    if is_blocked(html) {
        anyhow::bail!("The storefront served a block/challenge page. Try increasing --delay or using a proxy.");
    }
    Ok(())
}
