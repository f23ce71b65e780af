use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column headers of the destination sheet, in order
pub const SHEET_HEADERS: [&str; 4] = ["From", "Subject", "Date", "Content"];

/// A single message header (name/value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body structure of a message.
///
/// `Leaf` carries the transport-decoded bytes of one body part. `Multipart`
/// is an ordered list of child parts, each of which may be multipart again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Leaf { mime_type: String, data: Vec<u8> },
    Multipart { mime_type: String, parts: Vec<Payload> },
}

impl Payload {
    pub fn leaf(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Payload::Leaf {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn multipart(mime_type: impl Into<String>, parts: Vec<Payload>) -> Self {
        Payload::Multipart {
            mime_type: mime_type.into(),
            parts,
        }
    }
}

/// Message fetched from the mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub headers: Vec<Header>,
    pub payload: Option<Payload>,
}

impl Message {
    /// Value of the first header whose name matches (ASCII case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Row-ready record extracted from one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub from: String,
    pub subject: String,
    pub date: String,
    pub content: String,
}

impl ParsedRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            from: self.from.clone(),
            subject: self.subject.clone(),
            date: self.date.clone(),
        }
    }

    /// Cells in `SHEET_HEADERS` order
    pub fn into_row(self) -> Vec<String> {
        vec![self.from, self.subject, self.date, self.content]
    }
}

/// Content-equality key used to detect rows already present in the sheet.
///
/// Comparison is exact on all three fields; no trimming or case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub from: String,
    pub subject: String,
    pub date: String,
}

impl Fingerprint {
    /// Build a fingerprint from an existing sheet row.
    ///
    /// Rows with fewer than three cells carry no usable key and yield `None`.
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [from, subject, date, ..] => Some(Self {
                from: from.clone(),
                subject: subject.clone(),
                date: date.clone(),
            }),
            _ => None,
        }
    }
}

/// Persisted sync progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Ids of messages already appended to the sheet
    #[serde(default)]
    pub processed_message_ids: BTreeSet<String>,
    /// Local timestamp of the last run that appended rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
}

impl SyncState {
    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed_message_ids.contains(message_id)
    }

    pub fn mark_processed<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processed_message_ids
            .extend(ids.into_iter().map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ParsedRecord {
        ParsedRecord {
            from: "a@x.com".to_string(),
            subject: "Hi".to_string(),
            date: "2024-01-01 10:00:00".to_string(),
            content: "Hello".to_string(),
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let message = Message {
            id: "m1".to_string(),
            headers: vec![
                Header::new("FROM", "first@x.com"),
                Header::new("From", "second@x.com"),
            ],
            payload: None,
        };
        assert_eq!(message.header("from"), Some("first@x.com"));
        assert_eq!(message.header("Subject"), None);
    }

    #[test]
    fn test_record_row_order_matches_headers() {
        let row = record().into_row();
        assert_eq!(row.len(), SHEET_HEADERS.len());
        assert_eq!(row[0], "a@x.com");
        assert_eq!(row[3], "Hello");
    }

    #[test]
    fn test_fingerprint_ignores_content() {
        let mut other = record();
        other.content = "Something else".to_string();
        assert_eq!(record().fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_fingerprint_from_row() {
        let row: Vec<String> = vec!["a@x.com".into(), "Hi".into(), "2024-01-01 10:00:00".into()];
        assert_eq!(Fingerprint::from_row(&row), Some(record().fingerprint()));

        let short: Vec<String> = vec!["a@x.com".into(), "Hi".into()];
        assert_eq!(Fingerprint::from_row(&short), None);
    }

    #[test]
    fn test_sync_state_serde_uses_legacy_keys() {
        let mut state = SyncState::default();
        state.mark_processed(["b", "a"]);
        state.last_run = Some("2024-01-01 10:00:00".to_string());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["processed_message_ids"], serde_json::json!(["a", "b"]));
        assert_eq!(json["last_run"], "2024-01-01 10:00:00");
    }

    #[test]
    fn test_sync_state_accepts_missing_last_run() {
        let state: SyncState =
            serde_json::from_str(r#"{"processed_message_ids": ["m1"]}"#).unwrap();
        assert!(state.is_processed("m1"));
        assert_eq!(state.last_run, None);
    }
}
