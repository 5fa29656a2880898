//! Scan command: walks the configured sources and notifies new qualifying offers once.

use crate::config::Config;
use crate::extract::{is_blocked, FieldExtractor, LinkExtractor, Markup, OfferFields};
use crate::filters::{FilterChain, FilterChainBuilder};
use crate::format::Formatter;
use crate::notify::{offer_message, summary_message, Notifier, StdoutNotifier, TelegramNotifier};
use crate::shop::models::url_identity;
use crate::shop::{Candidate, Offer, ShopClient, Source, Storefront};
use crate::state::{SentRecord, StateStore};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counters and sent offers of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub sources: usize,
    pub pages_fetched: usize,
    pub blocked_sources: usize,
    pub candidates: usize,
    pub qualifying: usize,
    pub already_notified: usize,
    pub sent: usize,
    pub deferred: usize,
    pub failures: usize,
    pub summary_sent: bool,
    pub offers: Vec<Offer>,
}

/// Executes a scan.
pub struct ScanCommand {
    config: Config,
    dry_run: bool,
}

impl ScanCommand {
    /// Creates a new scan command.
    pub fn new(config: Config) -> Self {
        Self { config, dry_run: false }
    }

    /// Prints messages instead of sending them and leaves the state file untouched.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Runs the scan against the live storefront and returns formatted output.
    pub async fn execute(&self, reset: bool) -> Result<String> {
        let client = ShopClient::new(&self.config).context("Failed to create HTTP client")?;

        let mut state = StateStore::load(&self.config.state_file, self.config.state_cap);
        if reset {
            state.clear();
        }

        let report = if self.dry_run {
            self.execute_with(&client, &StdoutNotifier, "dry-run", &mut state).await?
        } else {
            let notifier = TelegramNotifier::new(&self.config.telegram, self.config.timeout_secs)
                .context("Failed to create Telegram notifier")?;
            let chat_id = self
                .config
                .telegram
                .chat_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .context("Telegram chat id is not configured (set DEALWATCH_CHAT_ID)")?;

            self.execute_with(&client, &notifier, chat_id, &mut state).await?
        };

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_report(&report, &self.config.site.currency))
    }

    /// Runs the scan with provided collaborators (for testing).
    pub async fn execute_with(
        &self,
        storefront: &impl Storefront,
        notifier: &impl Notifier,
        recipient: &str,
        state: &mut StateStore,
    ) -> Result<ScanReport> {
        let config = &self.config;
        let links = LinkExtractor::new(&config.site, config.context_chars, config.max_per_source)?;
        let fields = FieldExtractor::new();
        let filters = self.filters();

        debug!("Active filters: {}", filters.descriptions().join(", "));

        let mut report = ScanReport { sources: config.sources.len(), ..ScanReport::default() };

        let candidates = self.collect_candidates(storefront, &links, &mut report).await;
        report.candidates = candidates.len();
        info!("Evaluating {} candidates", candidates.len());

        for candidate in candidates {
            let offer = match self.evaluate(storefront, &fields, &candidate).await {
                Ok(offer) => offer,
                Err(e) => {
                    warn!("Skipping {}: {:#}", candidate.url, e);
                    report.failures += 1;
                    continue;
                }
            };

            if !filters.matches(&offer) {
                debug!("Not qualifying: {} ({:?}%)", offer.url, offer.discount_pct());
                continue;
            }
            report.qualifying += 1;

            if state.contains(&offer.identity) {
                debug!("Already notified: {}", offer.url);
                report.already_notified += 1;
                continue;
            }

            if report.sent >= config.max_notifications {
                report.deferred += 1;
                continue;
            }

            let message = offer_message(&offer, &config.site.currency);
            if let Err(e) = notifier.send(recipient, &message).await {
                // Keep what was already delivered, then surface the failure
                if let Err(persist_err) = self.finish(state) {
                    warn!("Failed to save state after a delivery failure: {:#}", persist_err);
                }
                return Err(e).context("Failed to deliver offer notification");
            }

            info!("Notified {}% off: {}", offer.discount_pct().unwrap_or(0), offer.title);
            state.record(offer.identity.clone(), SentRecord::for_offer(&offer));
            report.sent += 1;
            report.offers.push(offer);
        }

        if report.deferred > 0 {
            info!("{} qualifying offers deferred to the next scan", report.deferred);
        }

        self.finish(state)?;

        if report.sent == 0 {
            let message = summary_message(config.threshold, report.sources, report.candidates, report.deferred);
            notifier
                .send(recipient, &message)
                .await
                .context("Failed to deliver scan summary")?;
            report.summary_sent = true;
        }

        Ok(report)
    }

    fn filters(&self) -> FilterChain {
        FilterChainBuilder::new()
            .min_discount(self.config.threshold)
            .price_range(self.config.min_price, self.config.max_price)
            .keywords(self.config.keywords.clone())
            .exclude_keywords(self.config.exclude_keywords.clone())
            .build()
    }

    fn finish(&self, state: &mut StateStore) -> Result<()> {
        if self.dry_run {
            debug!("Dry run: state not saved");
            return Ok(());
        }
        state.persist()
    }

    /// Walks every source's pages and returns candidates deduplicated by identity.
    async fn collect_candidates(
        &self,
        storefront: &impl Storefront,
        links: &LinkExtractor,
        report: &mut ScanReport,
    ) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for source in &self.config.sources {
            let found = self.scan_source(storefront, links, source, &mut seen, report).await;
            info!("{}: {} candidates", source, found.len());
            candidates.extend(found);
        }

        candidates
    }

    async fn scan_source(
        &self,
        storefront: &impl Storefront,
        links: &LinkExtractor,
        source: &Source,
        seen: &mut HashSet<String>,
        report: &mut ScanReport,
    ) -> Vec<Candidate> {
        let max_pages = if source.is_paginated() { self.config.max_pages } else { 1 };
        let mut found = Vec::new();

        for page in 1..=max_pages {
            if found.len() >= self.config.max_per_source {
                break;
            }

            let html = match storefront.listing(source, page).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch {} page {}: {:#}", source, page, e);
                    report.failures += 1;
                    continue;
                }
            };
            report.pages_fetched += 1;

            if is_blocked(&html) {
                warn!("{} page {} is a block page; skipping the rest of this source", source, page);
                report.blocked_sources += 1;
                break;
            }

            let before = found.len();
            for candidate in links.extract(&html) {
                if found.len() >= self.config.max_per_source {
                    break;
                }
                if seen.insert(url_identity(&candidate.url)) {
                    found.push(candidate);
                }
            }

            if found.len() == before {
                debug!("No new links on {} page {}; stopping", source, page);
                break;
            }
        }

        found
    }

    /// Extracts an offer from the listing fragment, falling back to the product page.
    async fn evaluate(
        &self,
        storefront: &impl Storefront,
        fields: &FieldExtractor,
        candidate: &Candidate,
    ) -> Result<Offer> {
        let fragment = extract_fragment(fields, candidate);
        if fragment.discount().is_some() || !self.config.fetch_details {
            return Ok(Offer::new(candidate.url.clone(), fragment));
        }

        let html = storefront.product(&candidate.url).await?;
        if is_blocked(&html) {
            anyhow::bail!("Product page is a block page");
        }

        let detail = fields.extract(&Markup::document(&html));
        Ok(Offer::new(candidate.url.clone(), merge(fragment, detail)))
    }
}

fn extract_fragment(fields: &FieldExtractor, candidate: &Candidate) -> OfferFields {
    let markup = Markup::fragment(&candidate.context)
        .with_title_hint(candidate.title_hint.as_deref())
        .with_link(&candidate.url);
    fields.extract(&markup)
}

/// Prefers the product page's prices; the listing title wins when it has one.
fn merge(fragment: OfferFields, detail: OfferFields) -> OfferFields {
    let title = fragment.title.clone().or(detail.title.clone());

    if detail.discount().is_some() || fragment.price_now.is_none() {
        OfferFields { title, ..detail }
    } else {
        OfferFields { title, ..fragment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use crate::shop::Site;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// Mock storefront serving canned listing and product pages.
    #[derive(Default)]
    struct MockStorefront {
        listings: HashMap<u32, String>,
        products: HashMap<String, String>,
        listing_calls: AtomicU32,
        product_calls: AtomicU32,
    }

    impl MockStorefront {
        fn with_listing(mut self, page: u32, html: &str) -> Self {
            self.listings.insert(page, html.to_string());
            self
        }

        fn with_product(mut self, url: &str, html: &str) -> Self {
            self.products.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl Storefront for MockStorefront {
        async fn listing(&self, _source: &Source, page: u32) -> Result<String> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            self.listings.get(&page).cloned().context("connection reset")
        }

        async fn product(&self, url: &str) -> Result<String> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            self.products.get(url).cloned().context("connection reset")
        }
    }

    /// Mock notifier recording every message.
    #[derive(Default)]
    struct MockNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockNotifier {
        fn failing() -> Self {
            Self { sent: Mutex::new(Vec::new()), fail: true }
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _recipient: &str, text: &str) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Api { status: 500, message: "down".to_string() });
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            site: Site { base_url: "https://shop.test".to_string(), ..Site::default() },
            sources: vec![Source::Category { url: "https://shop.test/ofertas".to_string() }],
            context_chars: 120,
            max_pages: 1,
            delay_ms: 0,
            delay_jitter_ms: 0,
            ..Config::default()
        }
    }

    fn store(dir: &TempDir) -> StateStore {
        StateStore::load(dir.path().join("state.json"), 100)
    }

    fn item(id: u32, body: &str) -> String {
        format!(
            r#"<div class="pod"><a href="/falabella-pe/product/{id}/item">Producto {id}</a>{body}</div>{filler}"#,
            filler = "<!-- ".to_string() + &" ".repeat(200) + " -->"
        )
    }

    fn discounted(id: u32, now: &str, before: &str) -> String {
        item(id, &format!(r#"<span>-70%</span><p>{{"price": "{now}", "normalPrice": "{before}"}}</p>"#))
    }

    #[tokio::test]
    async fn test_notifies_new_qualifying_offer_once() {
        let dir = tempdir().unwrap();
        let listing = format!("{}{}", discounted(1, "30", "100"), item(2, "<p>Sin descuento</p>"));
        let shop = MockStorefront::default()
            .with_listing(1, &listing)
            .with_product("https://shop.test/falabella-pe/product/2/item", "<title>Plain</title>");
        let notifier = MockNotifier::default();
        let command = ScanCommand::new(test_config());

        let mut state = store(&dir);
        let report = command.execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.qualifying, 1);
        assert_eq!(report.sent, 1);
        assert!(!report.summary_sent);
        assert_eq!(notifier.messages().len(), 1);
        assert!(notifier.messages()[0].contains("<b>70% OFF</b>"));
        assert_eq!(state.len(), 1);

        // Second run over the same listing sends only the summary
        let mut state = store(&dir);
        let report = command.execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.already_notified, 1);
        assert!(report.summary_sent);
        assert_eq!(notifier.messages().len(), 2);
        assert!(notifier.messages()[1].contains("Scan finished"));
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let dir = tempdir().unwrap();
        let listing = format!(
            "{}{}",
            item(1, r#"<p>{"price": "51", "normalPrice": "100"}</p>"#),
            item(2, r#"<p>{"price": "50", "normalPrice": "100"}</p>"#)
        );
        let shop = MockStorefront::default().with_listing(1, &listing);
        let notifier = MockNotifier::default();

        let mut state = store(&dir);
        let report =
            ScanCommand::new(test_config()).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        // 49% is out, 50% is in
        assert_eq!(report.qualifying, 1);
        assert_eq!(report.offers[0].discount_pct(), Some(50));
        assert!(report.offers[0].url.contains("/product/2/"));
    }

    #[tokio::test]
    async fn test_notification_cap_defers_rest() {
        let dir = tempdir().unwrap();
        let listing: String = (1..=4).map(|i| discounted(i, "30", "100")).collect();
        let shop = MockStorefront::default().with_listing(1, &listing);
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.max_notifications = 2;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.deferred, 2);
        assert_eq!(state.len(), 2);
    }

    #[tokio::test]
    async fn test_pagination_stops_without_new_links() {
        let dir = tempdir().unwrap();
        let page = discounted(1, "30", "100");
        let shop = MockStorefront::default().with_listing(1, &page).with_listing(2, &page).with_listing(3, &page);
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.max_pages = 3;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(shop.listing_calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.candidates, 1);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let dir = tempdir().unwrap();
        // Page 1 is missing and errors; page 2 still gets scanned
        let shop = MockStorefront::default().with_listing(2, &discounted(1, "30", "100"));
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.max_pages = 3;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.failures, 2);
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn test_block_page_aborts_source() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default()
            .with_listing(1, "<html><div id=\"px-captcha\"></div></html>")
            .with_listing(2, &discounted(1, "30", "100"));
        let notifier = MockNotifier::default();

        let mut state = store(&dir);
        let report =
            ScanCommand::new(test_config()).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.blocked_sources, 1);
        assert_eq!(shop.listing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.candidates, 0);
        assert!(report.summary_sent);
    }

    #[tokio::test]
    async fn test_detail_page_resolves_discount() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default().with_listing(1, &item(7, "")).with_product(
            "https://shop.test/falabella-pe/product/7/item",
            r#"<html><head><meta property="og:title" content="Laptop 15"></head>
               <body><script>{"price": "1.299,90", "normalPrice": "2.999,90"}</script></body></html>"#,
        );
        let notifier = MockNotifier::default();

        let mut state = store(&dir);
        let report =
            ScanCommand::new(test_config()).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(shop.product_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.offers[0].price_now, Some(1299.9));
        assert_eq!(report.offers[0].price_before, Some(2999.9));
        assert_eq!(report.offers[0].discount_pct(), Some(57));
        // Listing anchor text came first
        assert_eq!(report.offers[0].title, "Producto 7");
    }

    #[tokio::test]
    async fn test_no_detail_fetch_when_disabled() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default().with_listing(1, &item(7, ""));
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.fetch_details = false;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(shop.product_calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.failures, 0);
        assert_eq!(report.qualifying, 0);
    }

    #[tokio::test]
    async fn test_detail_failure_skips_candidate() {
        let dir = tempdir().unwrap();
        let listing = format!("{}{}", item(1, ""), discounted(2, "30", "100"));
        let shop = MockStorefront::default().with_listing(1, &listing);
        let notifier = MockNotifier::default();

        let mut state = store(&dir);
        let report =
            ScanCommand::new(test_config()).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        // Product 1 has no page to fall back on
        assert_eq!(report.failures, 1);
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn test_notification_failure_persists_and_errors() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default().with_listing(1, &discounted(1, "30", "100"));
        let notifier = MockNotifier::failing();

        let mut state = store(&dir);
        let result = ScanCommand::new(test_config()).execute_with(&shop, &notifier, "42", &mut state).await;

        assert!(result.is_err());
        assert!(dir.path().join("state.json").exists());
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_error_survives_failed_state_save() {
        let dir = tempdir().unwrap();
        // A directory where the state file should be makes the save fail
        let state_path = dir.path().join("state");
        std::fs::create_dir(&state_path).unwrap();

        let shop = MockStorefront::default().with_listing(1, &discounted(1, "30", "100"));
        let notifier = MockNotifier::failing();

        let mut state = StateStore::load(&state_path, 100);
        let err = ScanCommand::new(test_config())
            .execute_with(&shop, &notifier, "42", &mut state)
            .await
            .unwrap_err();

        let chain = format!("{:#}", err);
        assert!(chain.contains("Failed to deliver offer notification"));
        assert!(chain.contains("down"));
    }

    #[tokio::test]
    async fn test_summary_reports_deferred_offers() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default().with_listing(1, &discounted(1, "30", "100"));
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.max_notifications = 0;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.deferred, 1);
        assert!(report.summary_sent);
        assert!(notifier.messages()[0].contains("1 new offers at or above 50% off deferred"));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_default_context_keeps_neighbours_apart() {
        let dir = tempdir().unwrap();
        let listing = format!(
            "<section>{}{}{}</section>",
            item(3, "<p>Sin precio</p>"),
            discounted(1, "30", "100"),
            item(2, "<p>Sin precio</p>")
        );
        let shop = MockStorefront::default().with_listing(1, &listing);
        let notifier = MockNotifier::default();

        let mut config = test_config();
        config.context_chars = Config::default().context_chars;
        config.fetch_details = false;

        let mut state = store(&dir);
        let report = ScanCommand::new(config).execute_with(&shop, &notifier, "42", &mut state).await.unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.qualifying, 1);
        assert_eq!(report.sent, 1);
        assert!(report.offers[0].url.ends_with("/product/1/item"));
        assert_eq!(report.offers[0].title, "Producto 1");
    }

    #[tokio::test]
    async fn test_dry_run_leaves_state_file_alone() {
        let dir = tempdir().unwrap();
        let shop = MockStorefront::default().with_listing(1, &discounted(1, "30", "100"));
        let notifier = MockNotifier::default();

        let mut state = store(&dir);
        let report = ScanCommand::new(test_config())
            .dry_run(true)
            .execute_with(&shop, &notifier, "dry-run", &mut state)
            .await
            .unwrap();

        assert_eq!(report.sent, 1);
        assert!(!dir.path().join("state.json").exists());
    }

    #[test]
    fn test_merge_prefers_listing_title() {
        let fragment = OfferFields { title: Some("Listing".to_string()), ..OfferFields::default() };
        let detail = OfferFields {
            title: Some("Page".to_string()),
            price_now: Some(40.0),
            price_before: Some(100.0),
            stated_discount: None,
        };

        let merged = merge(fragment, detail);
        assert_eq!(merged.title.as_deref(), Some("Listing"));
        assert_eq!(merged.price_now, Some(40.0));

        let merged = merge(OfferFields::default(), OfferFields { title: Some("Page".to_string()), ..OfferFields::default() });
        assert_eq!(merged.title.as_deref(), Some("Page"));
    }
}
