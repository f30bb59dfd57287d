//! Transcript assembly: date extraction and the final text layout.
//!
//! Journal pages usually open with a date, and pages without one belong to
//! the most recent dated page before them. [`extract_date`] finds the date at
//! the top of a transcription; [`format_transcript`] lays every image out in
//! listing order and carries the last seen date forward.
//!
//! ## Layout
//!
//! ```text
//! ---
//! IMG_0001.jpg
//! Monday, January 1, 2024
//! <transcription>
//! ---
//! IMG_0002.jpg
//! Monday, January 1, 2024        ← carried forward
//! <transcription>
//! ```

use crate::output::PerImageResult;
use once_cell::sync::Lazy;
use regex::Regex;

/// Only this many non-blank lines at the top of a page are searched for a date.
pub const DATE_SEARCH_LINES: usize = 5;

/// Date-shaped patterns, tried in order on each candidate line.
static DATE_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        // "Monday, January 1, 2024", "Mon, Jan 1, 2024", "Tues. March 12th 2024"
        Regex::new(
            r"(?i)\b(?:[a-z]+day|mon|tues?|wed|thu|thur|thurs|fri|sat|sun)\.?,?\s+[a-z]+\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
        )
        .unwrap(),
        // "1/1/2024", "01-01-24"
        Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap(),
        // "January 1, 2024", "Jan. 1 2024"
        Regex::new(r"(?i)\b[a-z]+\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b").unwrap(),
    ]
});

/// Find a date in the first [`DATE_SEARCH_LINES`] non-blank lines of `text`.
///
/// Lines are checked top to bottom; on each line the patterns are tried in
/// order (weekday-prefixed long form, numeric, bare long form). The first
/// line that matches any pattern decides the result.
pub fn extract_date(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(DATE_SEARCH_LINES)
        .find_map(|line| {
            DATE_PATTERNS
                .iter()
                .find_map(|re| re.find(line))
                .map(|m| m.as_str().to_string())
        })
}

/// Render the transcript for `results`, which must be in listing order.
///
/// Each entry is a `---` separator, the image name, the date line (omitted
/// when no date is known yet) and the transcription, or the error text for a
/// failed image. `start_date` seeds the carry-forward date.
pub fn format_transcript(results: &[PerImageResult], start_date: Option<&str>) -> String {
    let mut out = String::new();
    for (result, date) in results.iter().zip(carry_forward_dates(results, start_date)) {
        out.push_str("---\n");
        out.push_str(&result.name);
        out.push('\n');
        if let Some(date) = date {
            out.push_str(&date);
            out.push('\n');
        }
        match &result.error {
            None => out.push_str(&result.text),
            Some(err) => out.push_str(&format!("Error processing image: {err}")),
        }
        out.push('\n');
    }
    out
}

/// The date emitted for each result after carrying the last known date forward.
pub fn carry_forward_dates(
    results: &[PerImageResult],
    start_date: Option<&str>,
) -> Vec<Option<String>> {
    let mut last = start_date
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    results
        .iter()
        .map(|r| {
            if let Some(date) = r.date.as_deref().filter(|d| !d.is_empty()) {
                last = Some(date.to_string());
            }
            last.clone()
        })
        .collect()
}
