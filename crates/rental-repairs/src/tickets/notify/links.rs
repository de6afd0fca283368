use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::tickets::domain::{ApartmentId, TicketId};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPurpose {
    DeepLink,
    Invitation,
}

/// Payload carried by a signed link token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkClaims {
    pub ticket_id: TicketId,
    pub apartment_id: ApartmentId,
    /// User id for deep links, company id for invitations.
    pub subject: String,
    pub purpose: LinkPurpose,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link token is malformed")]
    Malformed,
    #[error("link token signature mismatch")]
    BadSignature,
    #[error("link token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("link signing key rejected")]
    Key,
    #[error("link claims could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("link lifetime runs past the representable date range")]
    ExpiryOutOfRange,
}

/// Expiry for a link issued at `now`; lifetimes that overflow the calendar are refused.
pub fn expires_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, LinkError> {
    now.checked_add_signed(ttl).ok_or(LinkError::ExpiryOutOfRange)
}

/// Issues `payload.signature` tokens, both halves URL-safe base64 without padding.
#[derive(Clone)]
pub struct LinkSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

impl LinkSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn sign(&self, claims: &LinkClaims) -> Result<String, LinkError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes())?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<LinkClaims, LinkError> {
        let (payload, signature) = token.split_once('.').ok_or(LinkError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| LinkError::Malformed)?;

        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| LinkError::BadSignature)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| LinkError::Malformed)?;
        let claims: LinkClaims = serde_json::from_slice(&bytes).map_err(|_| LinkError::Malformed)?;

        if claims.expires_at <= now {
            return Err(LinkError::Expired(claims.expires_at));
        }
        Ok(claims)
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, LinkError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| LinkError::Key)?;
        mac.update(data);
        Ok(mac)
    }
}
