//! End-to-end scan against mocked storefront and Telegram endpoints.

use dealwatch::commands::ScanCommand;
use dealwatch::config::{Config, TelegramConfig};
use dealwatch::notify::{StdoutNotifier, TelegramNotifier};
use dealwatch::shop::ShopClient;
use dealwatch::state::StateStore;
use dealwatch::{Site, Source};
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const LISTING: &str = include_str!("fixtures/listing.html");
const PRODUCT: &str = include_str!("fixtures/product.html");

async fn storefront() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/falabella-pe/collection/ofertas"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/falabella-pe/product/771203/licuadora-oster-600w/771203"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT))
        .mount(&server)
        .await;

    server
}

async fn telegram() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/botTEST-TOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "result": {}})))
        .mount(&server)
        .await;

    server
}

fn config(shop: &MockServer, bot: &MockServer, state_file: &Path) -> Config {
    Config {
        site: Site { base_url: shop.uri(), ..Site::default() },
        sources: vec![Source::Category { url: format!("{}/falabella-pe/collection/ofertas", shop.uri()) }],
        threshold: 50,
        delay_ms: 0,
        delay_jitter_ms: 0,
        timeout_secs: 5,
        state_file: state_file.to_path_buf(),
        telegram: TelegramConfig {
            bot_token: Some("TEST-TOKEN".to_string()),
            chat_id: Some("42".to_string()),
            api_base: bot.uri(),
        },
        ..Config::default()
    }
}

fn sent_texts(requests: &[Request]) -> Vec<String> {
    requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            assert_eq!(body["chat_id"], "42");
            assert_eq!(body["parse_mode"], "HTML");
            body["text"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_scan_notifies_each_offer_once() {
    let shop = storefront().await;
    let bot = telegram().await;
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let config = config(&shop, &bot, &state_file);
    let client = ShopClient::new(&config).unwrap();
    let notifier = TelegramNotifier::new(&config.telegram, config.timeout_secs).unwrap();
    let command = ScanCommand::new(config.clone());

    // First run: only the 70% offer qualifies
    let mut state = StateStore::load(&state_file, config.state_cap);
    let report = command.execute_with(&client, &notifier, "42", &mut state).await.unwrap();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.qualifying, 1);
    assert_eq!(report.sent, 1);
    assert!(!report.summary_sent);
    assert_eq!(report.offers[0].discount_pct(), Some(70));
    assert_eq!(report.offers[0].price_now, Some(899.0));
    assert_eq!(report.offers[0].price_before, Some(2999.0));

    let texts = sent_texts(&bot.received_requests().await.unwrap());
    assert_eq!(texts.len(), 1);
    assert!(!texts[0].contains("Licuadora"));
    assert!(texts[0].contains("70% OFF"));
    assert!(texts[0].contains("Smart TV 55\" 4K UHD Google TV"));
    assert!(texts[0].contains("/falabella-pe/product/882741/"));

    let reloaded = StateStore::load(&state_file, config.state_cap);
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.contains(&report.offers[0].identity));

    // Second run: nothing new, only the summary goes out
    let mut state = StateStore::load(&state_file, config.state_cap);
    let report = command.execute_with(&client, &notifier, "42", &mut state).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.already_notified, 1);
    assert!(report.summary_sent);

    let texts = sent_texts(&bot.received_requests().await.unwrap());
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Scan finished"));
    assert!(!texts[1].contains("70% OFF"));

    assert_eq!(StateStore::load(&state_file, config.state_cap).len(), 1);
}

#[tokio::test]
async fn test_dry_run_keeps_state_untouched() {
    let shop = storefront().await;
    let bot = telegram().await;
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    let config = config(&shop, &bot, &state_file);
    let client = ShopClient::new(&config).unwrap();
    let command = ScanCommand::new(config.clone()).dry_run(true);

    let mut state = StateStore::load(&state_file, config.state_cap);
    let report = command.execute_with(&client, &StdoutNotifier, "dry-run", &mut state).await.unwrap();

    assert_eq!(report.qualifying, 1);
    assert_eq!(report.sent, 1);
    assert!(!state_file.exists());
    assert!(bot.received_requests().await.unwrap().is_empty());
}
