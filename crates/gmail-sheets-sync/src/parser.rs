//! Turns fetched messages into sheet records.

use crate::error::{SyncError, SyncResult};
use crate::extractor::extract_text;
use chrono::{DateTime, Local};
use regex::Regex;
use shared_types::{Message, ParsedRecord};
use std::sync::LazyLock;

/// Default cap on stored body text (a Sheets cell holds at most 50k characters)
pub const DEFAULT_CONTENT_CAP: usize = 50_000;

/// Appended to content that was cut at the cap
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Timestamp layout used in the Date column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static TRAILING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("valid regex"));
// Day-of-week optional, single-digit hour and seconds-less times allowed
static LOOSE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:[a-z]+\s*,\s*)?(\d{1,2})\s+([a-z]+)\s+(\d{2,4})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s+(\S+))?\s*$",
    )
    .expect("valid regex")
});

/// Parse a message into a record.
///
/// Fails only when the message has no payload to read headers or body from.
pub fn parse_message(message: &Message, content_cap: usize) -> SyncResult<ParsedRecord> {
    let payload = message
        .payload
        .as_ref()
        .ok_or_else(|| SyncError::parse(&message.id, "message has no payload"))?;

    let from = message.header("From").unwrap_or_default().to_string();
    let subject = message.header("Subject").unwrap_or_default().to_string();
    let date = message
        .header("Date")
        .map(normalize_date)
        .unwrap_or_default();

    let content = truncate_content(extract_text(payload), content_cap);

    Ok(ParsedRecord {
        from,
        subject,
        date,
        content,
    })
}

/// Normalize an RFC 2822 date to `YYYY-MM-DD HH:MM:SS` in its own offset.
///
/// An unparseable date falls back to the current local time so a bad header
/// never costs the whole record.
pub fn normalize_date(raw: &str) -> String {
    match parse_rfc2822(raw) {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => {
            tracing::warn!("Error parsing date {:?}, using current time", raw);
            Local::now().format(DATE_FORMAT).to_string()
        }
    }
}

fn parse_rfc2822(raw: &str) -> Option<DateTime<chrono::FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }

    // e.g. "Mon, 1 Jan 2024 10:00:00 +0000 (UTC)"
    let stripped = TRAILING_COMMENT.replace(raw, "");
    if let Ok(dt) = DateTime::parse_from_rfc2822(&stripped) {
        return Some(dt);
    }

    DateTime::parse_from_rfc2822(&canonical_rfc2822(&stripped)?).ok()
}

/// Rewrite a loosely formatted date into the strict RFC 2822 shape.
///
/// The weekday is dropped, the hour is padded to
/// two digits, missing seconds become `00` and `UT`/`UTC`/`GMT`/`Z` or a
/// missing zone become `+0000`.
fn canonical_rfc2822(raw: &str) -> Option<String> {
    let caps = LOOSE_DATE.captures(raw.trim())?;

    let zone = match caps.get(7).map(|m| m.as_str()) {
        None => "+0000",
        Some(z) if ["UT", "UTC", "GMT", "Z"].iter().any(|u| z.eq_ignore_ascii_case(u)) => "+0000",
        Some(z) => z,
    };

    Some(format!(
        "{} {} {} {:0>2}:{}:{} {}",
        &caps[1],
        &caps[2],
        &caps[3],
        &caps[4],
        &caps[5],
        caps.get(6).map_or("00", |m| m.as_str()),
        zone
    ))
}

/// Cap content at `cap` characters, appending the truncation marker when cut
pub fn truncate_content(content: String, cap: usize) -> String {
    match content.char_indices().nth(cap) {
        Some((byte_index, _)) => {
            let mut truncated = content;
            truncated.truncate(byte_index);
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => content,
    }
}
