use chrono::{DateTime, Datelike, TimeZone, Utc};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Local short-circuit for "how many days until christmas" prompts.
///
/// Returns `None` unless the prompt matches, so the router can fall through
/// to normal dispatch. The reply is a pure function of the prompt text and
/// the effective timestamp; no model is ever consulted for date arithmetic.
pub fn christmas_countdown(prompt: &str, now: DateTime<Utc>) -> Option<String> {
    let lowered = prompt.to_lowercase();
    if !lowered.contains("how many days") || !lowered.contains("christmas") {
        return None;
    }

    let year = extract_year(prompt).unwrap_or_else(|| {
        let this_year = now.year();
        if already_past_christmas(now, this_year) {
            this_year + 1
        } else {
            this_year
        }
    });

    let target = Utc.with_ymd_and_hms(year, 12, 25, 0, 0, 0).single()?;
    let millis = target.timestamp_millis() - now.timestamp_millis();
    let days = div_ceil(millis, MILLIS_PER_DAY).max(0);

    Some(format!(
        "There are {days} days until Christmas {year} (December 25, {year}), counting from {}.",
        now.format("%Y-%m-%d")
    ))
}

fn already_past_christmas(now: DateTime<Utc>, year: i32) -> bool {
    match Utc.with_ymd_and_hms(year, 12, 25, 0, 0, 0).single() {
        Some(christmas) => now > christmas,
        None => false,
    }
}

/// First four-digit year starting with "20" anywhere in the prompt.
fn extract_year(prompt: &str) -> Option<i32> {
    let bytes = prompt.as_bytes();
    for start in 0..bytes.len().saturating_sub(3) {
        let window = &bytes[start..start + 4];
        if window[0] == b'2' && window[1] == b'0' && window.iter().all(|b| b.is_ascii_digit()) {
            // Skip matches embedded in longer digit runs, e.g. "120255".
            let prev_digit = start > 0 && bytes[start - 1].is_ascii_digit();
            let next_digit = bytes.get(start + 4).is_some_and(|b| b.is_ascii_digit());
            if !prev_digit && !next_digit {
                return std::str::from_utf8(window).ok()?.parse().ok();
            }
        }
    }
    None
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    if value > 0 {
        (value + divisor - 1) / divisor
    } else {
        value / divisor
    }
}
