//! Incremental sync of unread mail into the sheet.
//!
//! A run walks a fixed sequence of stages (see [`Stage`]). Mail already
//! appended in an earlier run is skipped by id using the persisted state, and
//! mail whose (from, subject, date) already appears in the sheet is skipped by
//! fingerprint. State only advances after the sheet accepted at least one row.

use crate::config::Config;
use crate::error::SyncResult;
use crate::parser::parse_message;
use crate::state::StateStore;
use chrono::Local;
use shared_types::{Fingerprint, Message, ParsedRecord, SHEET_HEADERS};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Source of unread messages.
#[allow(async_fn_in_trait)]
pub trait Mailbox {
    /// Ids of unread inbox messages, at most `max_results`, in API order.
    async fn list_unread(&self, max_results: u32) -> SyncResult<Vec<String>>;

    /// Full message for one id.
    async fn get_message(&self, message_id: &str) -> SyncResult<Message>;

    /// Clear the unread flag of one message.
    async fn mark_read(&self, message_id: &str) -> SyncResult<()>;
}

/// Tabular store receiving one row per message.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// First row of the sheet, empty when the sheet is blank.
    async fn header_row(&self) -> SyncResult<Vec<String>>;

    /// Overwrite the first row with `headers`.
    async fn write_header_row(&self, headers: &[&str]) -> SyncResult<()>;

    /// Every row below the header.
    async fn data_rows(&self) -> SyncResult<Vec<Vec<String>>>;

    /// Append rows in one batch, returning how many rows the store reports written.
    async fn append_rows(&self, rows: Vec<Vec<String>>) -> SyncResult<usize>;
}

/// Stages of a run, in the order they are reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    #[default]
    Init,
    Authenticated,
    SheetInitialized,
    ExistingLoaded,
    Fetched,
    FilteredById,
    Parsed,
    FilteredByFingerprint,
    Appended,
    StateSaved,
    Done,
}

/// Per-run settings taken from the config
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub max_results: u32,
    pub mark_as_read: bool,
    pub content_cap_chars: usize,
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_results: config.max_results,
            mark_as_read: config.mark_as_read,
            content_cap_chars: config.content_cap_chars,
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Unread messages fetched in full
    pub fetched: usize,
    /// Messages whose detail fetch failed
    pub fetch_failures: usize,
    /// Fetched messages not yet in the processed-id set
    pub new_by_id: usize,
    /// Messages that could not be parsed
    pub parse_failures: usize,
    /// Parsed records not already present in the sheet
    pub new_by_fingerprint: usize,
    /// Rows the sheet reported written
    pub appended: usize,
    /// Messages marked read
    pub marked_read: usize,
    /// Size of the processed-id set after the run
    pub total_processed: usize,
    pub state_saved: bool,
    /// Last stage the run reached
    pub stage: Stage,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total unread emails found: {}", self.fetched)?;
        writeln!(f, "New emails processed: {}", self.new_by_fingerprint)?;
        writeln!(f, "Rows added to sheet: {}", self.appended)?;
        if self.fetch_failures > 0 || self.parse_failures > 0 {
            writeln!(
                f,
                "Skipped (fetch/parse errors): {}/{}",
                self.fetch_failures, self.parse_failures
            )?;
        }
        write!(f, "Total processed (all time): {}", self.total_processed)
    }
}

/// Keep messages whose id has not been processed before, preserving order
pub fn filter_by_id(messages: Vec<Message>, processed_ids: &BTreeSet<String>) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|msg| {
            let seen = processed_ids.contains(&msg.id);
            if seen {
                tracing::debug!("Skipping already processed email: {}", msg.id);
            }
            !seen
        })
        .collect()
}

/// Drop records whose fingerprint already exists in the sheet.
///
/// `records` pairs each record with its message id. Returns the surviving
/// records and their ids in input order. Only `existing` is consulted, so two
/// new records with the same fingerprint are both kept.
pub fn filter_by_fingerprint(
    records: Vec<(String, ParsedRecord)>,
    existing: &HashSet<Fingerprint>,
) -> (Vec<ParsedRecord>, Vec<String>) {
    let mut unique = Vec::with_capacity(records.len());
    let mut ids = Vec::with_capacity(records.len());

    for (message_id, record) in records {
        if existing.contains(&record.fingerprint()) {
            tracing::info!("Skipping duplicate: {}", display_subject(&record.subject));
            continue;
        }
        unique.push(record);
        ids.push(message_id);
    }

    (unique, ids)
}

fn display_subject(subject: &str) -> &str {
    if subject.is_empty() {
        "No Subject"
    } else {
        subject
    }
}

/// Write the header row unless it is already exactly `SHEET_HEADERS`.
///
/// Returns whether a write was issued.
pub async fn initialize_sheet<D: Destination>(sheet: &D) -> SyncResult<bool> {
    let current = sheet.header_row().await?;

    if current.iter().map(String::as_str).eq(SHEET_HEADERS) {
        tracing::info!("Headers already exist");
        return Ok(false);
    }

    tracing::info!("Writing headers to sheet...");
    sheet.write_header_row(&SHEET_HEADERS).await?;
    tracing::info!("Headers written successfully");
    Ok(true)
}

/// Fingerprints of every row already in the sheet
pub async fn load_existing_fingerprints<D: Destination>(
    sheet: &D,
) -> SyncResult<HashSet<Fingerprint>> {
    let rows = sheet.data_rows().await?;
    let existing: HashSet<Fingerprint> = rows
        .iter()
        .filter_map(|row| Fingerprint::from_row(row))
        .collect();

    tracing::info!("Found {} existing email(s) in sheet", existing.len());
    Ok(existing)
}

/// Drives one run against an authenticated mailbox and sheet
pub struct SyncController<M, D> {
    mailbox: M,
    sheet: D,
    store: StateStore,
    options: SyncOptions,
}

impl<M: Mailbox, D: Destination> SyncController<M, D> {
    pub fn new(mailbox: M, sheet: D, store: StateStore, options: SyncOptions) -> Self {
        Self {
            mailbox,
            sheet,
            store,
            options,
        }
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn sheet(&self) -> &D {
        &self.sheet
    }

    /// Run one sync.
    ///
    /// Sheet setup, the existing-row read, the unread listing and the append
    /// are batch operations whose failure ends the run with an error before
    /// state changes. Single messages that fail to fetch or parse are skipped.
    /// A failed state save is logged and reported in the summary.
    pub async fn run(&self) -> SyncResult<RunSummary> {
        let mut state = self.store.load();
        let mut summary = RunSummary {
            total_processed: state.processed_message_ids.len(),
            stage: Stage::Authenticated,
            ..Default::default()
        };

        tracing::info!("[Step 2] Initializing Google Sheet...");
        initialize_sheet(&self.sheet).await?;
        summary.stage = Stage::SheetInitialized;

        tracing::info!("[Step 3] Checking for existing emails in sheet...");
        let existing = load_existing_fingerprints(&self.sheet).await?;
        summary.stage = Stage::ExistingLoaded;

        tracing::info!("[Step 4] Fetching unread emails from Gmail...");
        let messages = self.fetch_unread(&mut summary).await?;
        summary.fetched = messages.len();
        summary.stage = Stage::Fetched;
        if messages.is_empty() {
            tracing::info!("No new emails to process");
            return Ok(summary);
        }

        tracing::info!("[Step 5] Filtering new emails...");
        let new_messages = filter_by_id(messages, &state.processed_message_ids);
        summary.new_by_id = new_messages.len();
        summary.stage = Stage::FilteredById;
        if new_messages.is_empty() {
            tracing::info!("All emails have already been processed");
            return Ok(summary);
        }
        tracing::info!("Found {} new email(s) to process", new_messages.len());

        tracing::info!("[Step 6] Parsing email data...");
        let records = self.parse_all(&new_messages, &mut summary);
        summary.stage = Stage::Parsed;

        let (unique, ids_to_mark) = filter_by_fingerprint(records, &existing);
        summary.new_by_fingerprint = unique.len();
        summary.stage = Stage::FilteredByFingerprint;
        tracing::info!("Successfully parsed {} unique email(s)", unique.len());
        if unique.is_empty() {
            tracing::info!("No new unique emails to add to sheet");
            return Ok(summary);
        }

        tracing::info!("[Step 7] Adding emails to Google Sheet...");
        let rows = unique.into_iter().map(ParsedRecord::into_row).collect();
        summary.appended = self.sheet.append_rows(rows).await?;
        summary.stage = Stage::Appended;
        if summary.appended == 0 {
            tracing::warn!("Sheet reported no rows added; state left unchanged");
            return Ok(summary);
        }

        if self.options.mark_as_read {
            tracing::info!("[Step 8] Marking emails as read...");
            summary.marked_read = self.mark_all_read(&ids_to_mark).await;
        }

        tracing::info!("[Step 9] Updating state...");
        state.mark_processed(ids_to_mark);
        state.last_run = Some(Local::now().format(crate::parser::DATE_FORMAT).to_string());
        summary.total_processed = state.processed_message_ids.len();

        match self.store.save(&state) {
            Ok(()) => {
                summary.state_saved = true;
                summary.stage = Stage::Done;
            }
            Err(e) => {
                // Rows stay appended; the next run may append these messages again
                tracing::error!("Error saving state: {}", e);
            }
        }

        Ok(summary)
    }

    async fn fetch_unread(&self, summary: &mut RunSummary) -> SyncResult<Vec<Message>> {
        tracing::info!(
            "Fetching unread emails (max: {})...",
            self.options.max_results
        );
        let ids = self.mailbox.list_unread(self.options.max_results).await?;

        if ids.is_empty() {
            tracing::info!("No unread emails found.");
            return Ok(Vec::new());
        }
        tracing::info!("Found {} unread email(s)", ids.len());

        let mut messages = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            tracing::debug!("Fetching email {}/{}...", i + 1, ids.len());
            match self.mailbox.get_message(id).await {
                Ok(message) => messages.push(message),
                Err(e) => {
                    tracing::warn!("Error fetching message {}: {}", id, e);
                    summary.fetch_failures += 1;
                }
            }
        }

        tracing::info!("Successfully fetched {} email(s)", messages.len());
        Ok(messages)
    }

    fn parse_all(
        &self,
        messages: &[Message],
        summary: &mut RunSummary,
    ) -> Vec<(String, ParsedRecord)> {
        let mut records = Vec::with_capacity(messages.len());

        for (i, message) in messages.iter().enumerate() {
            tracing::debug!("Parsing email {}/{}...", i + 1, messages.len());
            match parse_message(message, self.options.content_cap_chars) {
                Ok(record) => records.push((message.id.clone(), record)),
                Err(e) => {
                    tracing::warn!("{}", e);
                    summary.parse_failures += 1;
                }
            }
        }

        records
    }

    async fn mark_all_read(&self, message_ids: &[String]) -> usize {
        let mut marked = 0;
        for id in message_ids {
            match self.mailbox.mark_read(id).await {
                Ok(()) => marked += 1,
                Err(e) => tracing::warn!("Error marking email {} as read: {}", id, e),
            }
        }

        tracing::info!(
            "Marked {}/{} email(s) as read",
            marked,
            message_ids.len()
        );
        marked
    }
}
