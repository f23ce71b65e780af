use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "GMAIL_SHEETS_SYNC_CONFIG";

/// Config file used when the environment variable is not set
pub const DEFAULT_CONFIG_PATH: &str = "gmail-sheets-sync.toml";

const SPREADSHEET_ID_PLACEHOLDER: &str = "YOUR_SPREADSHEET_ID_HERE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ID of the destination spreadsheet (from its URL)
    pub spreadsheet_id: String,

    /// Name of the sheet tab rows are appended to
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Maximum unread emails to fetch per run
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Mark emails as read after they are added to the sheet
    #[serde(default = "default_mark_as_read")]
    pub mark_as_read: bool,

    /// Maximum characters of body text stored per row
    #[serde(default = "default_content_cap")]
    pub content_cap_chars: usize,

    /// Where processed message ids are persisted between runs
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// OAuth client and token locations
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to Google OAuth client credentials JSON file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache")]
    pub token_cache_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_cache_path: default_token_cache(),
        }
    }
}

fn default_sheet_name() -> String {
    "EmailLog".to_string()
}

fn default_max_results() -> u32 {
    100
}

fn default_mark_as_read() -> bool {
    true
}

fn default_content_cap() -> usize {
    crate::parser::DEFAULT_CONTENT_CAP
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials/credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("credentials/token.json")
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the config path from the environment, falling back to the default
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Reject values that would make every run fail or do nothing
    pub fn validate(&self) -> SyncResult<()> {
        let id = self.spreadsheet_id.trim();
        if id.is_empty() || id == SPREADSHEET_ID_PLACEHOLDER {
            return Err(SyncError::config(
                "spreadsheet_id is not set. Create a Google Sheet and copy its ID from the URL",
            ));
        }
        if self.sheet_name.trim().is_empty() {
            return Err(SyncError::config("sheet_name must not be empty"));
        }
        if self.max_results == 0 {
            return Err(SyncError::config("max_results must be at least 1"));
        }
        if self.content_cap_chars == 0 {
            return Err(SyncError::config("content_cap_chars must be at least 1"));
        }
        Ok(())
    }

    pub fn example() -> Self {
        Config {
            spreadsheet_id: SPREADSHEET_ID_PLACEHOLDER.to_string(),
            sheet_name: default_sheet_name(),
            max_results: default_max_results(),
            mark_as_read: true,
            content_cap_chars: default_content_cap(),
            state_path: default_state_path(),
            auth: AuthConfig::default(),
        }
    }
}
