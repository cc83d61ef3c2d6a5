//! Value coercions for prices, dates and size-keyed media URLs.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Integer price from a raw value.
///
/// Strings keep the first amount they contain with currency marks dropped,
/// so `"¥1,234"` becomes `1234` and a range like `"500~1,000"` becomes its
/// lower bound. Commas always group thousands. A dot or space groups
/// thousands only when every group after it has three digits (`"1.980"`,
/// `"1 980"`); otherwise it starts a fraction, which is truncated.
pub fn price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => amount(s),
        _ => None,
    }
}

fn amount(text: &str) -> Option<i64> {
    let is_separator = |c: char| matches!(c, ',' | '.' | ' ');
    let run: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || is_separator(*c))
        .filter(|c| *c != ',')
        .collect();

    let mut groups = run.trim_end_matches(is_separator).split(['.', ' ']);
    let lead = groups.next()?;
    let rest: Vec<&str> = groups.collect();
    if rest.iter().all(|g| g.len() == 3) {
        let mut digits = lead.to_string();
        rest.iter().for_each(|g| digits.push_str(g));
        digits.parse().ok()
    } else {
        lead.parse().ok()
    }
}

/// Calendar date from any of the date or timestamp layouts providers use.
pub fn date(value: &Value) -> Option<NaiveDate> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }

    // Compact YYYYMMDD; chrono's %Y would swallow all eight digits.
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&text, fmt).ok())
        })
}

/// Rank of a size key: `(tier, magnitude)`. Keys with two numbers
/// (`size_720_480`) compare by pixel area and beat single-number keys, which
/// beat named sizes.
fn size_score(key: &str) -> (u8, i64) {
    let numbers: Vec<i64> = key
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse().ok())
        .collect();

    match numbers.as_slice() {
        [w, h, ..] => (2, w.saturating_mul(*h)),
        [n] => (1, *n),
        [] => {
            let rank = match key.to_ascii_lowercase().as_str() {
                "large" | "l" | "big" | "original" => 3,
                "medium" | "m" => 2,
                "small" | "s" => 1,
                _ => 0,
            };
            (0, rank)
        }
    }
}

/// The highest-resolution URL among size-keyed variants. Plain strings pass
/// through; for lists the first URL is used.
pub fn largest_media(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, v)| {
                let url = v.as_str()?.trim();
                (!url.is_empty()).then(|| (size_score(key), url))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, url)| url.to_string()),
        Value::Array(items) => items.iter().find_map(largest_media),
        _ => None,
    }
}

/// URL list from an array of strings.
pub fn url_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
