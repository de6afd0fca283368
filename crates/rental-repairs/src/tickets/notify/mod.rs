//! Email and push fan-out for composed ticket events.

mod gateway;
mod links;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::directory::{Apartment, CompanyProfile, RoleDirectory};
use super::domain::{
    CompanyId, LocalizedText, OfferRequest, OfferRequestId, OfferRequestStatus,
    PushNotificationRecord, RecipientKey, TextMap, Ticket, UserId,
};
use super::i18n::{Locale, Translator};
use super::repository::DamageStore;
use super::roles::Role;
use super::settings::WorkflowSettings;

pub use gateway::{
    EmailMessage, NotificationError, NotificationGateway, OutboundMessage, PushPayload,
    RecordingGateway,
};
pub use links::{expires_after, LinkClaims, LinkError, LinkPurpose, LinkSigner};

pub const UPDATE_TEMPLATE: &str = "damage_update";
pub const INVITATION_TEMPLATE: &str = "company_invitation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientTarget {
    User(UserId),
    Company(CompanyId),
}

/// One addressee of a composed event and the text-map key it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub key: RecipientKey,
    pub role: Role,
    pub target: RecipientTarget,
}

/// What happened for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    Email {
        key: RecipientKey,
        email: String,
        pushed: bool,
    },
    Invitation {
        company: CompanyId,
        email: String,
    },
    Skipped {
        key: RecipientKey,
    },
}

/// Ticket-level facts every notification of one event shares.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub ticket: &'a Ticket,
    pub apartment: &'a Apartment,
    pub actor: &'a UserId,
    pub actor_role: Role,
    pub now: DateTime<Utc>,
}

pub struct NotificationDispatcher<S, N> {
    store: Arc<S>,
    gateway: Arc<N>,
    directory: Arc<dyn RoleDirectory>,
    translator: Arc<dyn Translator>,
    signer: LinkSigner,
    settings: WorkflowSettings,
}

impl<S, N> NotificationDispatcher<S, N>
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<N>,
        directory: Arc<dyn RoleDirectory>,
        translator: Arc<dyn Translator>,
        settings: WorkflowSettings,
    ) -> Self {
        let signer = LinkSigner::new(settings.link_secret.clone());
        Self {
            store,
            gateway,
            directory,
            translator,
            signer,
            settings,
        }
    }

    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    /// Notifies every recipient in order. Failures are logged and dropped so a
    /// committed transition is never undone by a transport problem.
    pub fn dispatch_all(
        &self,
        ctx: &DispatchContext<'_>,
        texts: &TextMap,
        recipients: &[Recipient],
        subject_key: &str,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            match self.notify(ctx, texts, recipient, subject_key) {
                Ok(delivery) => deliveries.push(delivery),
                Err(error) => warn!(
                    ticket = %ctx.ticket.id,
                    recipient = %recipient.key,
                    %error,
                    "notification failed"
                ),
            }
        }
        deliveries
    }

    pub fn notify(
        &self,
        ctx: &DispatchContext<'_>,
        texts: &TextMap,
        recipient: &Recipient,
        subject_key: &str,
    ) -> Result<Delivery, NotificationError> {
        let Some(text) = text_for(texts, &recipient.key) else {
            debug!(ticket = %ctx.ticket.id, recipient = %recipient.key, "no text for recipient");
            return Ok(Delivery::Skipped {
                key: recipient.key.clone(),
            });
        };

        match &recipient.target {
            RecipientTarget::User(user) => self.notify_user(ctx, text, recipient, user, subject_key),
            RecipientTarget::Company(company) => {
                let profile = self
                    .directory
                    .company(company)
                    .ok_or_else(|| NotificationError::MissingRecipient(company.to_string()))?;
                if profile.is_registered() {
                    self.notify_company(ctx, text, recipient, &profile, subject_key)
                } else {
                    self.invite_company(ctx, text, &profile)
                }
            }
        }
    }

    fn notify_user(
        &self,
        ctx: &DispatchContext<'_>,
        text: &LocalizedText,
        recipient: &Recipient,
        user: &UserId,
        subject_key: &str,
    ) -> Result<Delivery, NotificationError> {
        let profile = self
            .directory
            .user(user)
            .ok_or_else(|| NotificationError::MissingRecipient(user.to_string()))?;
        let locale = profile.locale.unwrap_or(self.settings.default_locale);

        let link = self.deep_link(ctx, user.as_str())?;
        let subject = self.subject(ctx.ticket, subject_key, locale);
        self.gateway.send_email(EmailMessage {
            recipient: profile.email.clone(),
            template_id: UPDATE_TEMPLATE.to_string(),
            locale,
            subject: subject.clone(),
            data: email_data(ctx, text.get(locale), &link),
        })?;

        let pushed = self.push(ctx, recipient, user, &profile.device_tokens, text, &subject, locale);
        Ok(Delivery::Email {
            key: recipient.key.clone(),
            email: profile.email,
            pushed,
        })
    }

    fn notify_company(
        &self,
        ctx: &DispatchContext<'_>,
        text: &LocalizedText,
        recipient: &Recipient,
        company: &CompanyProfile,
        subject_key: &str,
    ) -> Result<Delivery, NotificationError> {
        let account = company
            .account
            .as_ref()
            .and_then(|account| self.directory.user(account));
        let locale = company
            .locale
            .or_else(|| account.as_ref().and_then(|profile| profile.locale))
            .unwrap_or(self.settings.default_locale);

        let link = self.deep_link(ctx, company.id.as_str())?;
        let subject = self.subject(ctx.ticket, subject_key, locale);
        self.gateway.send_email(EmailMessage {
            recipient: company.email.clone(),
            template_id: UPDATE_TEMPLATE.to_string(),
            locale,
            subject: subject.clone(),
            data: email_data(ctx, text.get(locale), &link),
        })?;

        let pushed = match &account {
            Some(profile) => self.push(
                ctx,
                recipient,
                &profile.id,
                &profile.device_tokens,
                text,
                &subject,
                locale,
            ),
            None => false,
        };
        Ok(Delivery::Email {
            key: recipient.key.clone(),
            email: company.email.clone(),
            pushed,
        })
    }

    /// Guest companies get an offer request and a time-boxed invitation link.
    fn invite_company(
        &self,
        ctx: &DispatchContext<'_>,
        text: &LocalizedText,
        company: &CompanyProfile,
    ) -> Result<Delivery, NotificationError> {
        let expires_at = expires_after(ctx.now, self.settings.invitation_ttl)?;
        let existing = self
            .store
            .offer_requests(&ctx.ticket.id)?
            .into_iter()
            .find(|request| request.company_id == company.id);
        let request = match existing {
            Some(request) => OfferRequest {
                external_email: Some(company.email.clone()),
                ..request
            },
            None => OfferRequest {
                id: OfferRequestId::generate(),
                ticket_id: ctx.ticket.id.clone(),
                company_id: company.id.clone(),
                external_email: Some(company.email.clone()),
                requested_date: ctx.now,
                status: OfferRequestStatus::Requested,
            },
        };
        self.store.upsert_offer_request(request)?;

        let token = self.signer.sign(&LinkClaims {
            ticket_id: ctx.ticket.id.clone(),
            apartment_id: ctx.apartment.id.clone(),
            subject: company.id.to_string(),
            purpose: LinkPurpose::Invitation,
            expires_at,
        })?;
        let link = format!(
            "{}/invitations/{token}",
            self.settings.public_base_url.trim_end_matches('/')
        );

        let locale = company.locale.unwrap_or(self.settings.default_locale);
        self.gateway.send_email(EmailMessage {
            recipient: company.email.clone(),
            template_id: INVITATION_TEMPLATE.to_string(),
            locale,
            subject: self.subject(ctx.ticket, "mail.subject.invitation", locale),
            data: email_data(ctx, text.get(locale), &link),
        })?;

        if ctx.actor_role != Role::Company {
            self.store
                .backfill_company_assigner(&ctx.ticket.id, ctx.actor, ctx.actor_role)?;
        }

        Ok(Delivery::Invitation {
            company: company.id.clone(),
            email: company.email.clone(),
        })
    }

    /// Persists the push record, then delivers to devices if there are any.
    #[allow(clippy::too_many_arguments)]
    fn push(
        &self,
        ctx: &DispatchContext<'_>,
        recipient: &Recipient,
        user: &UserId,
        devices: &[String],
        text: &LocalizedText,
        subject: &str,
        locale: Locale,
    ) -> bool {
        let record = PushNotificationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ctx.ticket.id.clone(),
            recipient: user.clone(),
            role: recipient.role,
            message: text.clone(),
            event: ctx.ticket.status,
            created_at: ctx.now,
        };
        if let Err(error) = self.store.record_push(record) {
            warn!(ticket = %ctx.ticket.id, %user, %error, "push record not stored");
            return false;
        }

        if devices.is_empty() {
            debug!(ticket = %ctx.ticket.id, %user, "no devices registered");
            return false;
        }

        let payload = PushPayload {
            title: subject.to_string(),
            body: text.get(locale).to_string(),
            data: json!({
                "ticket_id": ctx.ticket.id,
                "status": ctx.ticket.status.token(),
            }),
        };
        match self.gateway.send_push(devices, payload) {
            Ok(()) => true,
            Err(error) => {
                warn!(ticket = %ctx.ticket.id, %user, %error, "push delivery failed");
                false
            }
        }
    }

    fn deep_link(&self, ctx: &DispatchContext<'_>, subject: &str) -> Result<String, LinkError> {
        let token = self.signer.sign(&LinkClaims {
            ticket_id: ctx.ticket.id.clone(),
            apartment_id: ctx.apartment.id.clone(),
            subject: subject.to_string(),
            purpose: LinkPurpose::DeepLink,
            expires_at: expires_after(ctx.now, self.settings.link_ttl)?,
        })?;
        Ok(format!(
            "{}/tickets/{}?token={token}",
            self.settings.public_base_url.trim_end_matches('/'),
            ctx.ticket.id
        ))
    }

    fn subject(&self, ticket: &Ticket, key: &str, locale: Locale) -> String {
        let params = [
            ("public_id", ticket.public_id.clone()),
            ("title", ticket.title.clone()),
        ];
        self.translator
            .trans(key, &params, locale)
            .unwrap_or_else(|| ticket.title.clone())
    }
}

/// Exact key first; owner-side roles fall back to the owner's text and a
/// specific company to the generic company text.
pub fn text_for<'t>(texts: &'t TextMap, key: &RecipientKey) -> Option<&'t LocalizedText> {
    if let Some(text) = texts.get(key) {
        return Some(text);
    }
    match key {
        RecipientKey::Role(role) if role.is_owner_side() => {
            texts.get(&RecipientKey::Role(Role::Owner))
        }
        RecipientKey::Company(_) => texts.get(&RecipientKey::Role(Role::Company)),
        RecipientKey::Role(_) => None,
    }
}

fn email_data(ctx: &DispatchContext<'_>, body: &str, link: &str) -> serde_json::Value {
    json!({
        "text": body,
        "link": link,
        "ticket": ctx.ticket.public_id,
        "title": ctx.ticket.title,
        "apartment": ctx.apartment.label,
        "status": ctx.ticket.status.token(),
    })
}
