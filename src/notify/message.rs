//! Message rendering for the notification channel.

use crate::shop::Offer;

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_amount(currency: &str, amount: f64) -> String {
    format!("{} {:.2}", currency, amount)
}

/// Renders one offer: bold discount headline, title, prices and link.
pub fn offer_message(offer: &Offer, currency: &str) -> String {
    let headline = match offer.discount_pct() {
        Some(pct) => format!("🔥 <b>{}% OFF</b>", pct),
        None => "🔥 <b>Deal</b>".to_string(),
    };

    let mut lines = vec![headline, escape_html(&offer.title)];

    match (offer.price_now, offer.price_before) {
        (Some(now), Some(before)) => lines.push(format!(
            "<b>{}</b> (before {})",
            escape_html(&format_amount(currency, now)),
            escape_html(&format_amount(currency, before))
        )),
        (Some(now), None) => lines.push(format!("<b>{}</b>", escape_html(&format_amount(currency, now)))),
        _ => {}
    }

    if !offer.url.is_empty() {
        lines.push(escape_html(&offer.url));
    }

    lines.join("\n")
}

/// Renders the message sent when a scan sent no offer.
///
/// `deferred` counts new qualifying offers held back by the per-run cap.
pub fn summary_message(threshold: u8, sources: usize, candidates: usize, deferred: usize) -> String {
    let headline = if deferred > 0 {
        format!(
            "⏸ <b>Scan finished</b>: {} new offers at or above {}% off deferred to the next scan.",
            deferred, threshold
        )
    } else {
        format!("✅ <b>Scan finished</b>: no new offers at or above {}% off.", threshold)
    };

    format!("{}\nChecked {} products across {} sources.", headline, candidates, sources)
}
