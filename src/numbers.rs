//! Parsing for TGStat's locale-formatted magnitude strings.
//!
//! Counters on the site come in several shapes: plain integers
//! (`"9279489"`), space-grouped integers (`"9 279 489"`), and abbreviated
//! magnitudes with a decimal comma (`"38,2k"`, `"2m"`).

/// Parse a magnitude string into an integer.
///
/// Returns `Some(0)` for an empty string, `"n/a"`, or a literal `"0"`;
/// `None` when the text is present but unparsable, so callers can tell a
/// genuine zero apart from a parse failure.
pub fn parse_magnitude(text: &str) -> Option<i64> {
    let cleaned = text
        .trim()
        .to_lowercase()
        .replace(',', ".")
        .replace([' ', '\u{a0}'], "");

    if cleaned.is_empty() || cleaned == "n/a" || cleaned == "0" {
        return Some(0);
    }

    let scaled = if let Some(stem) = cleaned.strip_suffix('m') {
        stem.parse::<f64>().ok().map(|v| (v * 1_000_000.0) as i64)
    } else if let Some(stem) = cleaned.strip_suffix('k') {
        stem.parse::<f64>().ok().map(|v| (v * 1_000.0) as i64)
    } else if let Ok(n) = cleaned.parse::<i64>() {
        Some(n)
    } else {
        // Handles values like "59.5" that are not whole numbers.
        cleaned.parse::<f64>().ok().map(|v| v as i64)
    };

    if scaled.is_none() {
        log::debug!("could not parse magnitude: {text:?}");
    }
    scaled
}
