//! Locale-aware price normalization.
//!
//! Storefronts mix `1.234,56` and `1,234.56` freely, sometimes on the same page,
//! so the decimal separator is inferred from the string itself.

/// Currency prefixes and symbols removed before number matching.
const CURRENCY_MARKERS: &[&str] =
    &["S/.", "S/", "US$", "R$", "USD", "PEN", "EUR", "GBP", "CLP", "COP", "$", "€", "£", "¥"];

/// Parses a price like `"S/ 1.234,56"` or `"$1,234.56"` into a float.
///
/// Returns `None` when the text holds no digits or the normalized number
/// does not parse.
pub fn parse_price(text: &str) -> Option<f64> {
    let mut cleaned = text.to_string();
    for marker in CURRENCY_MARKERS {
        if cleaned.contains(marker) {
            cleaned = cleaned.replace(marker, " ");
        }
    }

    let run = first_numeric_run(&cleaned)?;
    let normalized = normalize_separators(run);

    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Returns the first maximal run of digits and separators, starting at a digit.
fn first_numeric_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ',')).unwrap_or(rest.len());

    Some(rest[..len].trim_end_matches(['.', ',']))
}

/// Rewrites a digit run so that `.` is the only (decimal) separator left.
fn normalize_separators(run: &str) -> String {
    match (run.rfind(','), run.rfind('.')) {
        // Both present: whichever comes last is the decimal point
        (Some(comma), Some(dot)) => {
            if comma > dot {
                run.replace('.', "").replace(',', ".")
            } else {
                run.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let single = run.matches(',').count() == 1;
            if single && run.len() - comma - 1 <= 2 {
                run.replace(',', ".")
            } else {
                run.replace(',', "")
            }
        }
        (None, Some(dot)) => {
            // "1.299" is a thousands group, "12.5" and "0.9999" are decimals
            let single = run.matches('.').count() == 1;
            if single && run.len() - dot - 1 != 3 {
                run.to_string()
            } else {
                run.replace('.', "")
            }
        }
        (None, None) => run.to_string(),
    }
}
