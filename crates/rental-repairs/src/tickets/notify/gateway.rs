use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::tickets::i18n::Locale;
use crate::tickets::repository::RepositoryError;

use super::links::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("could not issue link token: {0}")]
    Token(#[from] LinkError),
    #[error("notification recipient {0} is unknown")]
    MissingRecipient(String),
    #[error("push record could not be stored: {0}")]
    Record(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub recipient: String,
    pub template_id: String,
    pub locale: Locale,
    pub subject: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Outbound transport for email and device push.
pub trait NotificationGateway: Send + Sync {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError>;
    fn send_push(&self, device_ids: &[String], payload: PushPayload)
        -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum OutboundMessage {
    Email(EmailMessage),
    Push {
        device_ids: Vec<String>,
        payload: PushPayload,
    },
}

/// Gateway that keeps every message in memory instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct RecordingGateway {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    reject_email: bool,
}

impl RecordingGateway {
    /// Gateway whose email channel always fails; push still records.
    pub fn rejecting_email() -> Self {
        Self {
            reject_email: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn emails(&self) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter_map(|message| match message {
                OutboundMessage::Email(email) => Some(email),
                OutboundMessage::Push { .. } => None,
            })
            .collect()
    }

    pub fn emails_to(&self, recipient: &str) -> Vec<EmailMessage> {
        self.emails()
            .into_iter()
            .filter(|email| email.recipient == recipient)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&self, message: OutboundMessage) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

impl NotificationGateway for RecordingGateway {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if self.reject_email {
            return Err(NotificationError::Transport(format!(
                "mail relay refused {}",
                message.recipient
            )));
        }
        self.record(OutboundMessage::Email(message))
    }

    fn send_push(
        &self,
        device_ids: &[String],
        payload: PushPayload,
    ) -> Result<(), NotificationError> {
        self.record(OutboundMessage::Push {
            device_ids: device_ids.to_vec(),
            payload,
        })
    }
}
