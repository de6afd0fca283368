//! Per-bucket composition of audit text, responsible roles and recipients.

mod recipes;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::directory::{Apartment, CompanyProfile, Property};
use super::domain::{
    AuditLogEntry, CompanyId, Defect, LocalizedText, Offer, RecipientKey, TextMap, Ticket, UserId,
};
use super::i18n::{bilingual, Translator};
use super::notify::{Recipient, RecipientTarget};
use super::responsibles::{ResponsibleRoleResolver, Stakeholders};
use super::roles::Role;
use super::status::StatusBucket;

pub const UPDATE_SUBJECT: &str = "mail.subject.update";
pub const OFFER_REQUEST_SUBJECT: &str = "mail.subject.offer_request";

/// Appointment facts a schedule or response event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentView {
    pub scheduled_at: DateTime<Utc>,
    pub rescheduled: bool,
}

/// Everything a recipe may read. `ticket` is already mutated.
pub struct ComposeContext<'a> {
    pub ticket: &'a Ticket,
    pub bucket: StatusBucket,
    /// The status assigns one company outright rather than soliciting offers.
    pub direct_order: bool,
    pub actor: &'a UserId,
    pub actor_name: String,
    pub actor_role: Role,
    pub actor_company: Option<&'a CompanyProfile>,
    pub apartment: &'a Apartment,
    pub property: &'a Property,
    pub stakeholders: &'a Stakeholders,
    /// Company the event is about: the acting, offering or assigned company.
    pub company: Option<&'a CompanyProfile>,
    /// Companies addressed by a send-to-company transition.
    pub companies: &'a [CompanyProfile],
    pub offer: Option<&'a Offer>,
    pub appointment: Option<AppointmentView>,
    pub defect: Option<&'a Defect>,
    pub comment: Option<&'a str>,
    pub translator: &'a dyn Translator,
}

impl ComposeContext<'_> {
    pub fn responsibles(&self) -> Vec<Role> {
        ResponsibleRoleResolver.resolve(self.ticket, self.property)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("actor", self.actor_name.clone()),
            ("apartment", self.apartment.label.clone()),
            ("title", self.ticket.title.clone()),
            ("public_id", self.ticket.public_id.clone()),
            ("comment", self.comment.unwrap_or_default().to_string()),
        ];
        if let Some(company) = self.company {
            params.push(("company", company.name.clone()));
        }
        if let Some(offer) = self.offer {
            params.push(("amount", offer.formatted_amount()));
        }
        if let Some(appointment) = self.appointment {
            params.push((
                "date",
                appointment.scheduled_at.format("%d.%m.%Y %H:%M").to_string(),
            ));
        }
        if let Some(defect) = self.defect {
            params.push(("defect", defect.title.clone()));
        }
        params
    }

    /// Renders `key` in both locales with the standard parameters.
    pub fn render(&self, key: &str) -> Option<LocalizedText> {
        self.render_with(key, &[])
    }

    /// `extra` takes precedence over the standard parameters.
    pub fn render_with(&self, key: &str, extra: &[(&str, String)]) -> Option<LocalizedText> {
        let mut params: Vec<(&str, String)> = extra.to_vec();
        params.extend(self.params());
        let rendered = bilingual(self.translator, key, &params);
        if rendered.is_none() {
            debug!(key, "translation missing");
        }
        rendered
    }
}

/// Result of one recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct LogComposition {
    pub texts: TextMap,
    pub responsibles: Vec<Role>,
    pub preferred_company: Option<CompanyId>,
    pub recipients: Vec<Recipient>,
    pub subject_key: &'static str,
    /// Notifications go out but no audit entry is written.
    pub notify_only: bool,
}

pub type ComposeFn = fn(&ComposeContext<'_>) -> LogComposition;

/// Bucket → recipe table.
pub struct AuditLogComposer {
    recipes: HashMap<StatusBucket, ComposeFn>,
}

impl AuditLogComposer {
    pub fn standard() -> Self {
        let mut composer = Self {
            recipes: HashMap::new(),
        };
        composer.register(StatusBucket::Create, recipes::created);
        composer.register(StatusBucket::Accept, recipes::accepted);
        composer.register(StatusBucket::Reject, recipes::rejected);
        composer.register(StatusBucket::SendToCompany, recipes::sent_to_company);
        composer.register(StatusBucket::CompanyAccept, recipes::company_accepted);
        composer.register(StatusBucket::CompanyReject, recipes::company_rejected);
        composer.register(StatusBucket::OfferGiven, recipes::offer_given);
        composer.register(StatusBucket::OfferAccepted, recipes::offer_accepted);
        composer.register(StatusBucket::OfferRejected, recipes::offer_rejected);
        composer.register(StatusBucket::ScheduleDate, recipes::date_scheduled);
        composer.register(
            StatusBucket::AppointmentConfirmed,
            recipes::appointment_confirmed,
        );
        composer.register(
            StatusBucket::AppointmentRejected,
            recipes::appointment_rejected,
        );
        composer.register(StatusBucket::RepairCompleted, recipes::repair_completed);
        composer.register(StatusBucket::Close, recipes::closed);
        composer.register(StatusBucket::DefectRaised, recipes::defect_raised);
        composer
    }

    pub fn register(&mut self, bucket: StatusBucket, recipe: ComposeFn) {
        self.recipes.insert(bucket, recipe);
    }

    pub fn has_recipe(&self, bucket: StatusBucket) -> bool {
        self.recipes.contains_key(&bucket)
    }

    /// `None` when the bucket has no recipe; such transitions log nothing.
    pub fn compose(&self, ctx: &ComposeContext<'_>) -> Option<LogComposition> {
        self.recipes.get(&ctx.bucket).map(|recipe| recipe(ctx))
    }

    pub fn entry(
        ctx: &ComposeContext<'_>,
        composition: &LogComposition,
        created_at: DateTime<Utc>,
    ) -> AuditLogEntry {
        AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ctx.ticket.id.clone(),
            status: ctx.ticket.status,
            actor: ctx.actor.clone(),
            actor_role: ctx.actor_role,
            created_at,
            assigned_company: ctx.ticket.assigned_company.clone(),
            preferred_company: composition
                .preferred_company
                .clone()
                .or_else(|| ctx.ticket.preferred_company.clone()),
            texts: composition.texts.clone(),
            responsibles: composition.responsibles.clone(),
            comment: ctx.comment.map(str::to_string),
        }
    }
}

impl Default for AuditLogComposer {
    fn default() -> Self {
        Self::standard()
    }
}

/// Accumulates a composition while de-duplicating recipients by identity.
pub(crate) struct Draft<'c, 'a> {
    ctx: &'c ComposeContext<'a>,
    texts: TextMap,
    responsibles: Vec<Role>,
    recipients: Vec<Recipient>,
    users: BTreeSet<UserId>,
    companies: BTreeSet<CompanyId>,
    preferred_company: Option<CompanyId>,
    subject_key: &'static str,
    notify_only: bool,
}

impl<'c, 'a> Draft<'c, 'a> {
    pub(crate) fn new(ctx: &'c ComposeContext<'a>, responsibles: Vec<Role>) -> Self {
        Self {
            ctx,
            texts: TextMap::new(),
            responsibles,
            recipients: Vec::new(),
            users: BTreeSet::new(),
            companies: BTreeSet::new(),
            preferred_company: None,
            subject_key: UPDATE_SUBJECT,
            notify_only: false,
        }
    }

    pub(crate) fn responsibles(&self) -> Vec<Role> {
        self.responsibles.clone()
    }

    pub(crate) fn subject(mut self, key: &'static str) -> Self {
        self.subject_key = key;
        self
    }

    pub(crate) fn notify_only(mut self) -> Self {
        self.notify_only = true;
        self
    }

    pub(crate) fn prefer(&mut self, company: Option<CompanyId>) {
        self.preferred_company = company;
    }

    pub(crate) fn text(&mut self, key: RecipientKey, text: Option<LocalizedText>) {
        if let Some(text) = text {
            self.texts.insert(key, text);
        }
    }

    /// Gives every responsible role `key`, the actor's own role `self_key`
    /// when one is supplied, and queues each of them for notification.
    pub(crate) fn broadcast(&mut self, key: &str, self_key: Option<&str>) {
        let text = self.ctx.render(key);
        let own = self_key.and_then(|self_key| self.ctx.render(self_key));
        for role in self.responsibles() {
            let text = match (&own, role == self.ctx.actor_role) {
                (Some(own), true) => Some(own.clone()),
                _ => text.clone(),
            };
            self.text(RecipientKey::Role(role), text);
            self.notify_role(role);
        }
    }

    /// Queues the person behind `role`. The actor is never notified about
    /// their own action, and each human receives at most one message.
    pub(crate) fn notify_role(&mut self, role: Role) {
        if role == Role::Company {
            match self.ctx.company {
                Some(company) => {
                    let id = company.id.clone();
                    self.notify_company(&id, RecipientKey::Role(Role::Company));
                }
                // No single company yet: every solicited bidder hears about it.
                None => {
                    let ticket = self.ctx.ticket;
                    for id in &ticket.participant_companies {
                        self.notify_company(id, RecipientKey::Company(id.clone()));
                    }
                }
            }
            return;
        }

        let Some(user) = self.ctx.stakeholders.user_for(role) else {
            debug!(%role, "role has no assignee");
            return;
        };
        if user == self.ctx.actor {
            debug!(%role, "skipping the acting user");
            return;
        }
        if !self.users.insert(user.clone()) {
            debug!(%role, %user, "user already notified");
            return;
        }
        self.recipients.push(Recipient {
            key: RecipientKey::Role(role),
            role,
            target: RecipientTarget::User(user.clone()),
        });
    }

    /// Confirmation to the acting user under their own role.
    pub(crate) fn confirm_actor(&mut self) {
        if self.ctx.actor_role == Role::Company || !self.users.insert(self.ctx.actor.clone()) {
            return;
        }
        self.recipients.push(Recipient {
            key: RecipientKey::Role(self.ctx.actor_role),
            role: self.ctx.actor_role,
            target: RecipientTarget::User(self.ctx.actor.clone()),
        });
    }

    pub(crate) fn notify_company(&mut self, company: &CompanyId, key: RecipientKey) {
        if self.ctx.actor_company.map(|actor| &actor.id) == Some(company) {
            debug!(%company, "skipping the acting company");
            return;
        }
        if !self.companies.insert(company.clone()) {
            debug!(%company, "company already notified");
            return;
        }
        self.recipients.push(Recipient {
            key,
            role: Role::Company,
            target: RecipientTarget::Company(company.clone()),
        });
    }

    pub(crate) fn finish(self) -> LogComposition {
        LogComposition {
            texts: self.texts,
            responsibles: self.responsibles,
            preferred_company: self.preferred_company,
            recipients: self.recipients,
            subject_key: self.subject_key,
            notify_only: self.notify_only,
        }
    }
}
