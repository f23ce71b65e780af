//! Plain-text extraction from message payloads.

use regex::{Captures, Regex};
use shared_types::Payload;
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));
// An unterminated script/style swallows the rest of the document
static OPEN_SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:script|style)\b.*\z").expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|\z)").expect("valid regex"));
static LINE_BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:br|p|div|li|tr|h[1-6])\b[^>]*>").expect("valid regex")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</?[a-zA-Z][^>]*(?:>|\z)|<[!?][^>]*(?:>|\z)").expect("valid regex"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

/// Extract a single plain-text body from a payload.
///
/// In a multipart payload the first `text/plain` part wins outright. A
/// `text/html` part is converted and kept as a fallback while scanning
/// continues; a nested multipart that yields text ends the scan. A single
/// part is decoded directly, converting it when it is HTML. Undecodable
/// parts contribute nothing.
pub fn extract_text(payload: &Payload) -> String {
    let body = match payload {
        Payload::Multipart { parts, .. } => extract_from_parts(parts),
        Payload::Leaf { mime_type, data } => {
            let text = decode_body(data);
            if mime_type == "text/html" {
                html_to_text(&text)
            } else {
                text
            }
        }
    };

    body.trim().to_string()
}

fn extract_from_parts(parts: &[Payload]) -> String {
    let mut body = String::new();

    for part in parts {
        match part {
            Payload::Leaf { mime_type, data } if mime_type == "text/plain" => {
                return decode_body(data);
            }
            Payload::Leaf { mime_type, data } if mime_type == "text/html" => {
                body = html_to_text(&decode_body(data));
            }
            Payload::Multipart { mime_type, .. } if mime_type.starts_with("multipart/") => {
                let nested = extract_text(part);
                if !nested.is_empty() {
                    return nested;
                }
            }
            _ => {}
        }
    }

    body
}

fn decode_body(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!("Skipping body part that is not valid UTF-8: {}", e);
            String::new()
        }
    }
}

/// Convert HTML to plain text.
///
/// Script and style content is dropped even when the markup is malformed.
/// Every line is trimmed and split on runs of two spaces; empty pieces are
/// removed and the rest joined one per line.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = OPEN_SCRIPT_OR_STYLE.replace_all(&text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = LINE_BREAK_TAG.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    text.split(['\n', '\r'])
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };

            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "euro" => '€',
        "pound" => '£',
        _ => return None,
    };
    Some(c)
}
