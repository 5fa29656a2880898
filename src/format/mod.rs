//! Output formatting for scan reports, probed offers and state (table or JSON).

use crate::commands::ScanReport;
use crate::config::OutputFormat;
use crate::shop::Offer;
use crate::state::StateStore;
use serde_json::json;

const TITLE_WIDTH: usize = 50;

/// Formats command results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a scan report.
    pub fn format_report(&self, report: &ScanReport, currency: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Table => self.table_report(report, currency),
        }
    }

    /// Formats offers found by a probe.
    pub fn format_offers(&self, offers: &[Offer], currency: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(offers).unwrap_or_else(|_| "[]".to_string()),
            OutputFormat::Table if offers.is_empty() => "No offers found.".to_string(),
            OutputFormat::Table => self.table_offers(offers, currency),
        }
    }

    /// Formats the state summary with up to `limit` recent entries.
    pub fn format_state(&self, store: &StateStore, limit: usize) -> String {
        let entries = store.entries();
        let recent = &entries[..entries.len().min(limit)];

        match self.format {
            OutputFormat::Json => {
                let recent: Vec<_> = recent
                    .iter()
                    .map(|(id, r)| {
                        json!({
                            "identity": id,
                            "timestamp": r.timestamp,
                            "discount_pct": r.discount_pct,
                            "title": r.title,
                            "url": r.url,
                        })
                    })
                    .collect();

                let value = json!({
                    "path": store.path().display().to_string(),
                    "entries": store.len(),
                    "cap": store.cap(),
                    "last_run": store.last_run(),
                    "recent": recent,
                });
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table => {
                let mut lines = vec![
                    format!("State:    {}", store.path().display()),
                    format!("Entries:  {} / {}", store.len(), store.cap()),
                    format!(
                        "Last run: {}",
                        store
                            .last_run()
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_else(|| "never".to_string())
                    ),
                ];

                if !recent.is_empty() {
                    lines.push(String::new());
                    lines.push(format!("{:<16}  {:>5}  {}", "Notified", "Disc", "Title"));
                    lines.push(format!("{:-<16}  {:->5}  {:-<TITLE_WIDTH$}", "", "", ""));
                    for (_, record) in recent {
                        lines.push(format!(
                            "{:<16}  {:>4}%  {}",
                            record.timestamp.format("%Y-%m-%d %H:%M"),
                            record.discount_pct,
                            truncate(&record.title, TITLE_WIDTH)
                        ));
                    }
                }

                lines.join("\n")
            }
        }
    }

    fn table_report(&self, report: &ScanReport, currency: &str) -> String {
        let mut lines = vec![
            format!(
                "Sources: {}  Pages: {}  Blocked: {}  Failures: {}",
                report.sources, report.pages_fetched, report.blocked_sources, report.failures
            ),
            format!(
                "Candidates: {}  Qualifying: {}  Already notified: {}  Sent: {}  Deferred: {}",
                report.candidates, report.qualifying, report.already_notified, report.sent, report.deferred
            ),
        ];

        if !report.offers.is_empty() {
            lines.push(String::new());
            lines.push(self.table_offers(&report.offers, currency));
        } else if report.summary_sent {
            lines.push(String::new());
            lines.push("No new offers; summary sent.".to_string());
        }

        lines.join("\n")
    }

    fn table_offers(&self, offers: &[Offer], currency: &str) -> String {
        let price_width = 12;
        let mut lines = Vec::new();

        lines.push(format!(
            "{:>5}  {:>price_width$}  {:>price_width$}  {:<7}  {}",
            "Disc", "Now", "Before", "Source", "Title"
        ));
        lines.push(format!(
            "{:->5}  {:->price_width$}  {:->price_width$}  {:-<7}  {:-<TITLE_WIDTH$}",
            "", "", "", "", ""
        ));

        for offer in offers {
            let disc = offer.discount_pct().map(|p| format!("{}%", p)).unwrap_or_else(|| "-".to_string());
            let source = match offer.discount {
                Some(d) => format!("{:?}", d.source).to_lowercase(),
                None => "-".to_string(),
            };

            lines.push(format!(
                "{:>5}  {:>price_width$}  {:>price_width$}  {:<7}  {}",
                disc,
                price(offer.price_now, currency),
                price(offer.price_before, currency),
                source,
                truncate(&offer.title, TITLE_WIDTH)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} offers", offers.len()));

        lines.join("\n")
    }
}

fn price(value: Option<f64>, currency: &str) -> String {
    value.map(|v| format!("{} {:.2}", currency, v)).unwrap_or_else(|| "N/A".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
