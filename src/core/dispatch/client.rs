// Dispatch client - delivers a NotificationRequest according to its mode.
//
// Always returns a DispatchOutcome; transport failures are classified,
// never propagated.

use async_trait::async_trait;
use chrono::Utc;

use super::model::{DeliveryMode, DispatchErrorKind, DispatchOutcome, NotificationRequest};
use crate::core::channel::channel_matches;
use crate::core::error::TransportError;

/// A destination the messaging service knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    pub name: String,
}

/// Result of a successful post.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostReceipt {
    pub message_id: Option<String>,
}

/// The two operations the dispatcher needs from the messaging service.
#[async_trait]
pub trait MessageTransport: Send {
    async fn list_destinations(&mut self) -> Result<Vec<Destination>, TransportError>;
    async fn post_message(&mut self, destination_id: &str, body: &str) -> Result<PostReceipt, TransportError>;
}

/// Transport for runs that never reach the messaging service.
pub struct Offline;

#[async_trait]
impl MessageTransport for Offline {
    async fn list_destinations(&mut self) -> Result<Vec<Destination>, TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn post_message(&mut self, _destination_id: &str, _body: &str) -> Result<PostReceipt, TransportError> {
        Err(TransportError::NotConnected)
    }
}

/// Messaging API error codes that mean "you may not do this".
const PERMISSION_CODES: &[&str] = &[
    "not_in_channel",
    "missing_scope",
    "not_authed",
    "invalid_auth",
    "account_inactive",
    "token_revoked",
    "restricted_action",
    "is_archived",
    "channel_is_archived",
];

/// Map a transport error onto the dispatch error classification.
pub fn classify(error: &TransportError) -> DispatchErrorKind {
    match error {
        TransportError::Timeout(_) => DispatchErrorKind::Timeout,
        TransportError::Tool { message, .. } => {
            let message = message.to_ascii_lowercase();
            if message.contains("channel_not_found") {
                DispatchErrorKind::DestinationNotFound
            } else if PERMISSION_CODES.iter().any(|code| message.contains(code))
                || message.contains("permission")
            {
                DispatchErrorKind::Permission
            } else {
                DispatchErrorKind::Transport
            }
        }
        _ => DispatchErrorKind::Transport,
    }
}

/// Deliver one request. Dry-run and simulation never touch `transport`.
pub async fn dispatch<T>(request: NotificationRequest, transport: &mut T) -> DispatchOutcome
where
    T: MessageTransport + ?Sized,
{
    let NotificationRequest { channel, body, mode } = request;
    match mode {
        DeliveryMode::DryRun => {
            log::info!("[dry-run] Would post to {}:\n{}", channel, body);
            DispatchOutcome::dry_run(channel)
        }
        DeliveryMode::Simulation => {
            let message_id = format!("sim-{}", Utc::now().timestamp_micros());
            log::info!("[simulation] Posted to {} as {}", channel, message_id);
            DispatchOutcome::simulated(channel, message_id)
        }
        DeliveryMode::Live => dispatch_live(channel, body, transport).await,
    }
}

async fn dispatch_live<T>(channel: String, body: String, transport: &mut T) -> DispatchOutcome
where
    T: MessageTransport + ?Sized,
{
    let destinations = match transport.list_destinations().await {
        Ok(destinations) => destinations,
        Err(e) => {
            log::warn!("Listing destinations failed: {}", e);
            return DispatchOutcome::failed(channel, classify(&e), e.to_string());
        }
    };

    let Some(destination) = destinations
        .iter()
        .find(|d| channel_matches(&channel, &d.id, &d.name))
    else {
        log::error!("Channel {} is not among {} listed destinations", channel, destinations.len());
        return DispatchOutcome::failed(
            channel,
            DispatchErrorKind::DestinationNotFound,
            "channel is not in the destination list",
        );
    };

    match transport.post_message(&destination.id, &body).await {
        Ok(receipt) => {
            log::info!(
                "Posted to {} ({}), message {}",
                channel,
                destination.id,
                receipt.message_id.as_deref().unwrap_or("<no id>")
            );
            DispatchOutcome::delivered(channel, receipt.message_id)
        }
        Err(e) => {
            log::error!("Posting to {} failed: {}", channel, e);
            DispatchOutcome::failed(channel, classify(&e), e.to_string())
        }
    }
}
