use std::sync::OnceLock;

use gastocr_core::{ExtractionResult, Money, Word};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date,
    r"\b(\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2}))\b");
re!(re_date_whole,
    r"^(\d{1,2}[/-]\d{1,2}[/-](?:\d{4}|\d{2}))$");
re!(re_total_keyword,
    r"(?i)total");
re!(re_price,
    r"(\d+[,.]\d{2})");
re!(re_decimal_digit,
    r"^\p{Nd}$");

// ── Configuration ────────────────────────────────────────────────────────────

/// Window sizes for the total heuristic, counted in characters.
///
/// These are tuned for Spanish supermarket tickets and are heuristics, not
/// guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Characters inspected after each "TOTAL" keyword.
    pub total_window: usize,
    /// Characters at the end of the text scanned when no keyword matched.
    pub tail_window: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self { total_window: 30, tail_window: 100 }
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract the date and total from reconstructed words.
    pub fn extract(&self, words: &[Word]) -> ExtractionResult {
        let full_text = join_words(words);
        let date = Self::extract_date(&full_text, words);
        let total = self.extract_total(&full_text);
        ExtractionResult { date, total, full_text }
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    /// First date-shaped substring of `full_text`, else the first word that is
    /// entirely a date.
    pub fn extract_date(full_text: &str, words: &[Word]) -> Option<String> {
        if let Some(c) = re_date().captures(full_text) {
            let date = c.get(1)?.as_str().to_string();
            debug!("date found in full text: {date}");
            return Some(date);
        }

        let date = words
            .iter()
            .filter(|w| !w.is_placeholder())
            .find_map(|w| re_date_whole().captures(&w.text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        match &date {
            Some(d) => debug!("date found in single word: {d}"),
            None => debug!("no date found"),
        }
        date
    }

    // ── Total ────────────────────────────────────────────────────────────────

    /// Largest price following a "TOTAL" keyword, falling back to the largest
    /// price near the end of the text.
    pub fn extract_total(&self, full_text: &str) -> Option<Money> {
        let mut candidates: Vec<Money> = re_total_keyword()
            .find_iter(full_text)
            .filter_map(|m| {
                let window = char_window_after(full_text, m.end(), self.config.total_window);
                let price = re_price().captures(window)?.get(1)?.as_str();
                let parsed = parse_price(price)?;
                debug!("total candidate after keyword: {parsed} (from '{price}')");
                Some(parsed)
            })
            .collect();

        if candidates.is_empty() {
            debug!("no total after keyword, scanning end of text");
            let tail = char_tail(full_text, self.config.tail_window);
            candidates.extend(
                re_price()
                    .captures_iter(tail)
                    .filter_map(|c| parse_price(c.get(1)?.as_str())),
            );
        }

        let total = candidates.into_iter().max();
        match total {
            Some(t) => debug!("total selected: {t}"),
            None => debug!("no total found"),
        }
        total
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn join_words(words: &[Word]) -> String {
    words
        .iter()
        .filter(|w| !w.is_placeholder() && !w.text.is_empty())
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `re_price` matches digits from any script, so they are folded to ASCII
/// before parsing. Amounts too large for a decimal are dropped.
fn parse_price(raw: &str) -> Option<Money> {
    let parsed = ascii_digits(raw).and_then(|ascii| Money::parse_receipt_amount(&ascii));
    if parsed.is_none() {
        debug!("could not parse price '{raw}'");
    }
    parsed
}

fn ascii_digits(raw: &str) -> Option<String> {
    raw.chars()
        .map(|c| match c {
            _ if c.is_ascii() => Some(c),
            _ => char::from_digit(decimal_digit_value(c)?, 10),
        })
        .collect()
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    re_decimal_digit().is_match(c.encode_utf8(&mut buf))
}

/// Value of a Unicode decimal digit. Decimal digits are encoded in
/// contiguous runs of ten starting at zero, so the value is the offset from
/// the start of the run, modulo ten.
fn decimal_digit_value(c: char) -> Option<u32> {
    if !is_decimal_digit(c) {
        return None;
    }
    let mut start = u32::from(c);
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        start -= 1;
    }
    Some((u32::from(c) - start) % 10)
}

/// Up to `chars` characters of `text` starting at byte offset `start`.
fn char_window_after(text: &str, start: usize, chars: usize) -> &str {
    let rest = &text[start..];
    match rest.char_indices().nth(chars) {
        Some((end, _)) => &rest[..end],
        None => rest,
    }
}

/// The last `chars` characters of `text`.
fn char_tail(text: &str, chars: usize) -> &str {
    if chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
