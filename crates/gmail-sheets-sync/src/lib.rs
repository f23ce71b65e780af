pub mod auth;
pub mod config;
pub mod error;
pub mod extractor;
pub mod gmail_client;
pub mod parser;
pub mod sheets_client;
pub mod state;
pub mod sync;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use sync::{Destination, Mailbox, RunSummary, Stage, SyncController, SyncOptions};
