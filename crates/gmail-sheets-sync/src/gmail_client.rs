//! Gmail API client for listing unread mail, fetching it and marking it read.

use crate::auth::{self, Authenticator, GMAIL_MODIFY_SCOPE};
use crate::error::{SyncError, SyncResult};
use crate::sync::Mailbox;
use anyhow::{Context, Result};
use google_gmail1::api::{Message as GmailMessage, MessagePart, ModifyMessageRequest};
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared_types::{Header, Message, Payload};

/// Search query selecting unread messages in the inbox
pub const UNREAD_QUERY: &str = "is:unread in:inbox";

const UNREAD_LABEL: &str = "UNREAD";

/// Client for interacting with Gmail API
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    /// Build the client on an authenticator from `auth::authenticate`
    pub fn new(authenticator: Authenticator) -> SyncResult<Self> {
        let client = Client::builder(TokioExecutor::new()).build(auth::https_connector()?);
        let hub = Gmail::new(client, authenticator);

        tracing::info!("Gmail service initialized successfully");
        Ok(Self { hub })
    }
}

impl Mailbox for GmailClient {
    async fn list_unread(&self, max_results: u32) -> SyncResult<Vec<String>> {
        let (_, list_response) = self
            .hub
            .users()
            .messages_list("me")
            .q(UNREAD_QUERY)
            .max_results(max_results)
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await
            .context("Failed to list messages")
            .map_err(SyncError::Mailbox)?;

        Ok(list_response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| msg.id)
            .collect())
    }

    async fn get_message(&self, message_id: &str) -> SyncResult<Message> {
        let (_, message) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("full")
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await
            .context("Failed to get message")
            .map_err(SyncError::Mailbox)?;

        convert_message(message).map_err(SyncError::Mailbox)
    }

    async fn mark_read(&self, message_id: &str) -> SyncResult<()> {
        let modify_request = ModifyMessageRequest {
            remove_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
            ..Default::default()
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .add_scope(GMAIL_MODIFY_SCOPE)
            .doit()
            .await
            .context("Failed to mark message as read")
            .map_err(SyncError::Mailbox)?;

        tracing::debug!("Marked message as read: {}", message_id);
        Ok(())
    }
}

/// Convert a Gmail API message into the domain message.
///
/// Headers are taken from the top-level payload. A part with child parts
/// becomes `Multipart`, anything else a `Leaf` holding the decoded body bytes.
pub fn convert_message(message: GmailMessage) -> Result<Message> {
    let id = message.id.context("Message has no id")?;

    let headers = message
        .payload
        .as_ref()
        .and_then(|payload| payload.headers.as_ref())
        .map(|headers| {
            headers
                .iter()
                .filter_map(|h| {
                    let name = h.name.clone()?;
                    Some(Header::new(name, h.value.clone().unwrap_or_default()))
                })
                .collect()
        })
        .unwrap_or_default();

    let payload = message.payload.map(convert_part);

    Ok(Message {
        id,
        headers,
        payload,
    })
}

fn convert_part(part: MessagePart) -> Payload {
    let mime_type = part.mime_type.unwrap_or_default();

    match part.parts {
        Some(parts) if !parts.is_empty() => {
            Payload::multipart(mime_type, parts.into_iter().map(convert_part).collect())
        }
        _ => Payload::leaf(
            mime_type,
            part.body.and_then(|body| body.data).unwrap_or_default(),
        ),
    }
}
