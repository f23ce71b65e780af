//! OAuth scopes and credential checks shared by the Gmail and Sheets clients.
//!
//! Both clients run the installed-app flow against the same token cache and
//! request the combined scope set, so the user consents once and the cached
//! token serves both APIs.

use crate::config::AuthConfig;
use crate::error::{SyncError, SyncResult};
use anyhow::{Context, Result};
use google_gmail1::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use google_gmail1::yup_oauth2;
use hyper_util::client::legacy::connect::HttpConnector;

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Every scope the sync needs, requested together at sign-in
pub const ALL_SCOPES: &[&str] = &[GMAIL_MODIFY_SCOPE, SHEETS_SCOPE];

/// Token source shared by the Gmail and Sheets hubs
pub type Authenticator = yup_oauth2::authenticator::Authenticator<HttpsConnector<HttpConnector>>;

/// Build the one authenticator both clients use.
///
/// Runs the browser consent flow on first use; afterwards the cached token
/// is loaded and refreshed as needed.
pub async fn authenticate(config: &AuthConfig) -> SyncResult<Authenticator> {
    check_credentials(config)?;
    prepare_token_cache(config)?;
    build_authenticator(config).await.map_err(SyncError::Auth)
}

async fn build_authenticator(config: &AuthConfig) -> Result<Authenticator> {
    let secret = yup_oauth2::read_application_secret(&config.credentials_path)
        .await
        .context("Failed to read OAuth credentials")?;

    let authenticator = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(&config.token_cache_path)
    .build()
    .await
    .context("Failed to build authenticator")?;

    authenticator
        .token(ALL_SCOPES)
        .await
        .context("Failed to obtain access token")?;

    Ok(authenticator)
}

/// TLS connector for the API hubs
pub fn https_connector() -> SyncResult<HttpsConnector<HttpConnector>> {
    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .context("Failed to load native TLS roots")
        .map_err(SyncError::Auth)?
        .https_or_http()
        .enable_http1()
        .build();
    Ok(connector)
}

/// Fail early with a readable message when the client secret is missing
pub fn check_credentials(config: &AuthConfig) -> SyncResult<()> {
    if !config.credentials_path.is_file() {
        return Err(SyncError::MissingCredentials(
            config.credentials_path.clone(),
        ));
    }
    Ok(())
}

/// Create the token cache directory so the authenticator can persist into it
pub fn prepare_token_cache(config: &AuthConfig) -> SyncResult<()> {
    if let Some(parent) = config
        .token_cache_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            SyncError::Auth(anyhow::Error::new(e).context(format!(
                "Failed to create token cache directory {}",
                parent.display()
            )))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_credentials_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = AuthConfig {
            credentials_path: temp_dir.path().join("credentials.json"),
            token_cache_path: temp_dir.path().join("token.json"),
        };
        let err = check_credentials(&config).unwrap_err();
        assert!(matches!(err, SyncError::MissingCredentials(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_present_credentials_file() {
        let temp_dir = TempDir::new().unwrap();
        let credentials_path = temp_dir.path().join("credentials.json");
        std::fs::write(&credentials_path, "{}").unwrap();
        let config = AuthConfig {
            credentials_path,
            token_cache_path: temp_dir.path().join("token.json"),
        };
        assert!(check_credentials(&config).is_ok());
    }

    #[test]
    fn test_prepare_token_cache_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = AuthConfig {
            credentials_path: temp_dir.path().join("credentials.json"),
            token_cache_path: temp_dir.path().join("cache/token.json"),
        };
        prepare_token_cache(&config).unwrap();
        assert!(temp_dir.path().join("cache").is_dir());
    }

    #[tokio::test]
    async fn test_authenticate_checks_credentials_before_network() {
        let temp_dir = TempDir::new().unwrap();
        let config = AuthConfig {
            credentials_path: temp_dir.path().join("credentials.json"),
            token_cache_path: temp_dir.path().join("cache/token.json"),
        };
        let err = authenticate(&config).await.err().expect("expected authenticate to fail");
        assert!(matches!(err, SyncError::MissingCredentials(_)));
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_unreadable_secret_is_auth_error() {
        let temp_dir = TempDir::new().unwrap();
        let credentials_path = temp_dir.path().join("credentials.json");
        std::fs::write(&credentials_path, "not json").unwrap();
        let config = AuthConfig {
            credentials_path,
            token_cache_path: temp_dir.path().join("token.json"),
        };
        let err = authenticate(&config).await.err().expect("expected authenticate to fail");
        assert!(matches!(err, SyncError::Auth(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_scopes_cover_both_apis() {
        assert!(ALL_SCOPES.contains(&GMAIL_MODIFY_SCOPE));
        assert!(ALL_SCOPES.contains(&SHEETS_SCOPE));
    }
}
