use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::appointments::AppointmentWorkflow;
use super::audit::{AppointmentView, AuditLogComposer, ComposeContext};
use super::defects::DefectWorkflow;
use super::directory::{Apartment, CompanyProfile, Property, RoleDirectory};
use super::documents::{describe_all, DocumentStore};
use super::domain::{
    ApartmentId, Appointment, AppointmentStatus, AuditLogEntry, CompanyId, Defect, NewTicket,
    Offer, OfferRequest, OfferRequestId, OfferRequestStatus, RecipientKey, Ticket, TicketId,
    TransitionPayload, UserId,
};
use super::error::{EntityKind, TicketError};
use super::i18n::{Locale, Translator};
use super::notify::{Delivery, DispatchContext, NotificationDispatcher, NotificationGateway};
use super::offers::OfferWorkflow;
use super::permissions::PermissionGate;
use super::policy::{StatusPolicyTable, StatusRule};
use super::repository::DamageStore;
use super::responsibles::Stakeholders;
use super::roles::Role;
use super::settings::WorkflowSettings;
use super::status::{AwaitingParty, DamageStatus, StatusBucket};

pub const DAMAGE_IMAGE_TAG: &str = "damage";
pub const OFFER_ATTACHMENT_TAG: &str = "offer";

static TICKET_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_public_id() -> String {
    let id = TICKET_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("DMG-{id:06}")
}

/// Who is acting, in which language, and at what time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: UserId,
    pub actor_role: Role,
    /// `None` falls back to the machine's configured default locale.
    pub locale: Option<Locale>,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(actor: UserId, actor_role: Role) -> Self {
        Self {
            actor,
            actor_role,
            locale: None,
            now: Utc::now(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Party expected to act next on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentActor {
    pub party: AwaitingParty,
    pub user: Option<UserId>,
    pub company: Option<CompanyId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub ticket: Ticket,
    /// `None` once the ticket reached a terminal status.
    pub current_actor: Option<CurrentActor>,
    /// `None` for notify-only transitions.
    pub log_entry: Option<AuditLogEntry>,
    /// The actor's own text for the event, in the request locale.
    pub status_text: Option<String>,
    pub deliveries: Vec<Delivery>,
}

/// Writes a handler prepares; they are persisted only after the status commits.
#[derive(Debug, Default)]
struct Prepared {
    offers: Vec<Offer>,
    requests: Vec<OfferRequest>,
    appointments: Vec<Appointment>,
    defect: Option<Defect>,
    companies: Vec<CompanyProfile>,
    offer: Option<Offer>,
    appointment: Option<AppointmentView>,
}

struct HandlerInput<'a> {
    ctx: &'a RequestContext,
    status: DamageStatus,
    rule: &'a StatusRule,
    payload: &'a TransitionPayload,
    property: &'a Property,
    actor_company: Option<&'a CompanyProfile>,
    store: &'a dyn DamageStore,
    directory: &'a dyn RoleDirectory,
    documents: &'a dyn DocumentStore,
    settings: &'a WorkflowSettings,
}

impl HandlerInput<'_> {
    fn acting_company(&self) -> Result<&CompanyProfile, TicketError> {
        self.actor_company
            .ok_or_else(|| TicketError::denied(&self.ctx.actor, self.ctx.actor_role))
    }
}

type Handler = fn(&HandlerInput<'_>, &mut Ticket) -> Result<Prepared, TicketError>;

/// Validates and applies status transitions, then records and announces them.
pub struct TicketStateMachine<S, N> {
    store: Arc<S>,
    directory: Arc<dyn RoleDirectory>,
    translator: Arc<dyn Translator>,
    documents: Arc<dyn DocumentStore>,
    policy: StatusPolicyTable,
    gate: PermissionGate,
    composer: AuditLogComposer,
    dispatcher: NotificationDispatcher<S, N>,
    handlers: HashMap<StatusBucket, Handler>,
    settings: WorkflowSettings,
}

impl<S, N> TicketStateMachine<S, N>
where
    S: DamageStore + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<N>,
        directory: Arc<dyn RoleDirectory>,
        translator: Arc<dyn Translator>,
        documents: Arc<dyn DocumentStore>,
        policy: StatusPolicyTable,
        settings: WorkflowSettings,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            gateway,
            directory.clone(),
            translator.clone(),
            settings.clone(),
        );
        Self {
            gate: PermissionGate::new(directory.clone()),
            store,
            directory,
            translator,
            documents,
            policy,
            composer: AuditLogComposer::standard(),
            dispatcher,
            handlers: handlers(),
            settings,
        }
    }

    pub fn with_composer(mut self, composer: AuditLogComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn policy(&self) -> &StatusPolicyTable {
        &self.policy
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher<S, N> {
        &self.dispatcher
    }

    /// Creates a ticket in one of the create statuses and announces it.
    pub fn open_ticket(
        &self,
        ctx: &RequestContext,
        apartment_id: &ApartmentId,
        new_ticket: NewTicket,
    ) -> Result<TransitionOutcome, TicketError> {
        let rule = self
            .policy
            .rule(new_ticket.status)
            .filter(|rule| rule.bucket == StatusBucket::Create)
            .ok_or_else(|| {
                TicketError::validation(format!("{} does not open a ticket", new_ticket.status))
            })?;
        if !rule.allows(ctx.actor_role) {
            return Err(TicketError::denied(&ctx.actor, ctx.actor_role));
        }

        let apartment = self.apartment(apartment_id)?;
        let property = self.gate.authorize(ctx.actor_role, &ctx.actor, &apartment)?;

        let title = new_ticket.title.trim();
        if title.is_empty() {
            return Err(TicketError::validation("a title is required"));
        }

        let ticket = Ticket {
            id: TicketId::generate(),
            public_id: next_public_id(),
            title: title.to_string(),
            description: new_ticket.description.trim().to_string(),
            status: new_ticket.status,
            apartment_id: apartment.id.clone(),
            created_by: ctx.actor.clone(),
            created_by_role: ctx.actor_role,
            damage_owner: ctx.actor.clone(),
            issue_type: new_ticket.issue_type,
            assigned_company: None,
            company_assigned_by: None,
            company_assigned_by_role: None,
            preferred_company: None,
            allocation: false,
            signature: false,
            images: describe_all(
                self.documents.as_ref(),
                &new_ticket.images,
                &self.settings.public_base_url,
                Some(DAMAGE_IMAGE_TAG),
            ),
            participants: BTreeSet::from([ctx.actor.clone()]),
            participant_companies: BTreeSet::new(),
            read_by: BTreeSet::from([ctx.actor.clone()]),
            deleted: false,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        let ticket = self.store.insert_ticket(ticket)?;
        info!(
            ticket = %ticket.id,
            public_id = %ticket.public_id,
            status = %ticket.status,
            role = %ctx.actor_role,
            "ticket opened"
        );

        self.finish(ctx, ticket, &apartment, &property, None, &Prepared::default(), None)
    }

    /// Moves a ticket from `current_token` to `target`.
    ///
    /// Nothing is written unless `current_token` still names the stored
    /// status; the store re-checks this atomically when committing.
    pub fn transition(
        &self,
        ctx: &RequestContext,
        ticket_id: &TicketId,
        current_token: &str,
        target: DamageStatus,
        payload: TransitionPayload,
    ) -> Result<TransitionOutcome, TicketError> {
        let previous = self.load(ticket_id)?;
        ensure_current(&previous, current_token)?;

        let rule = self.policy.rule(target).ok_or_else(|| {
            TicketError::validation(format!("{target} has no policy rule"))
        })?;
        if rule.bucket == StatusBucket::Create {
            return Err(TicketError::validation(
                "create statuses are only valid when opening a ticket",
            ));
        }

        let apartment = self.apartment(&previous.apartment_id)?;
        let property = self.gate.authorize(ctx.actor_role, &ctx.actor, &apartment)?;
        self.gate
            .authorize_rule(rule, ctx.actor_role, &ctx.actor, &previous)?;
        let actor_company = if ctx.actor_role == Role::Company {
            let requests = self.store.offer_requests(&previous.id)?;
            Some(
                self.gate
                    .authorize_company(&ctx.actor, &previous, &requests)?,
            )
        } else {
            None
        };

        if rule.comment_required && payload.trimmed_comment().is_none() {
            return Err(TicketError::validation(format!(
                "a comment is required for {target}"
            )));
        }

        let handler = self.handlers.get(&rule.bucket).ok_or_else(|| {
            TicketError::validation(format!("no handler for {}", rule.bucket.key()))
        })?;

        let mut ticket = previous.clone();
        let input = HandlerInput {
            ctx,
            status: target,
            rule,
            payload: &payload,
            property: &property,
            actor_company: actor_company.as_ref(),
            store: self.store.as_ref(),
            directory: self.directory.as_ref(),
            documents: self.documents.as_ref(),
            settings: &self.settings,
        };
        let prepared = handler(&input, &mut ticket)?;

        ticket.status = target;
        ticket.updated_at = ctx.now;
        ticket.read_by = BTreeSet::from([ctx.actor.clone()]);
        if ctx.actor_role != Role::Company {
            ticket.participants.insert(ctx.actor.clone());
        }

        let ticket = self.store.compare_and_swap(previous.status, ticket)?;
        info!(
            ticket = %ticket.id,
            from = %previous.status,
            to = %ticket.status,
            role = %ctx.actor_role,
            "ticket transitioned"
        );

        self.persist(&prepared)?;
        self.finish(
            ctx,
            ticket,
            &apartment,
            &property,
            actor_company.as_ref(),
            &prepared,
            payload.trimmed_comment(),
        )
    }

    /// Flags the ticket as deleted. Owner-side only; nobody is notified.
    pub fn soft_delete(
        &self,
        ctx: &RequestContext,
        ticket_id: &TicketId,
        current_token: &str,
    ) -> Result<Ticket, TicketError> {
        if !ctx.actor_role.is_owner_side() {
            return Err(TicketError::denied(&ctx.actor, ctx.actor_role));
        }

        let previous = self.load(ticket_id)?;
        ensure_current(&previous, current_token)?;
        let apartment = self.apartment(&previous.apartment_id)?;
        self.gate.authorize(ctx.actor_role, &ctx.actor, &apartment)?;

        let mut ticket = previous.clone();
        ticket.deleted = true;
        ticket.updated_at = ctx.now;
        let ticket = self.store.compare_and_swap(previous.status, ticket)?;
        info!(ticket = %ticket.id, role = %ctx.actor_role, "ticket deleted");
        Ok(ticket)
    }

    pub fn ticket(&self, ticket_id: &TicketId) -> Result<Ticket, TicketError> {
        self.load(ticket_id)
    }

    pub fn mark_read(&self, ticket_id: &TicketId, user: &UserId) -> Result<(), TicketError> {
        self.load(ticket_id)?;
        self.store.mark_read(ticket_id, user)?;
        Ok(())
    }

    /// Audit entries, oldest first.
    pub fn history(&self, ticket_id: &TicketId) -> Result<Vec<AuditLogEntry>, TicketError> {
        self.load(ticket_id)?;
        let mut entries = self.store.log_entries(ticket_id)?;
        entries.sort_by_key(|entry| entry.created_at);
        Ok(entries)
    }

    pub fn offers(&self, ticket_id: &TicketId) -> Result<Vec<Offer>, TicketError> {
        Ok(self.store.offers(ticket_id)?)
    }

    pub fn offer_requests(&self, ticket_id: &TicketId) -> Result<Vec<OfferRequest>, TicketError> {
        Ok(self.store.offer_requests(ticket_id)?)
    }

    pub fn defects(&self, ticket_id: &TicketId) -> Result<Vec<Defect>, TicketError> {
        Ok(self.store.defects(ticket_id)?)
    }

    pub fn next_appointment(&self, ticket_id: &TicketId) -> Result<Option<Appointment>, TicketError> {
        Ok(AppointmentWorkflow::new(self.store.as_ref()).next_appointment(ticket_id)?)
    }

    /// Expires offer requests left unanswered longer than the configured TTL.
    pub fn expire_stale_requests(
        &self,
        ticket_id: &TicketId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OfferRequest>, TicketError> {
        Ok(OfferWorkflow::new(self.store.as_ref()).expire_stale_requests(
            ticket_id,
            now,
            self.settings.offer_request_ttl,
        )?)
    }

    fn load(&self, ticket_id: &TicketId) -> Result<Ticket, TicketError> {
        self.store
            .fetch_ticket(ticket_id)?
            .filter(|ticket| !ticket.deleted)
            .ok_or_else(|| TicketError::not_found(EntityKind::Ticket, ticket_id))
    }

    fn apartment(&self, apartment_id: &ApartmentId) -> Result<Apartment, TicketError> {
        self.directory
            .apartment(apartment_id)
            .ok_or_else(|| TicketError::not_found(EntityKind::Apartment, apartment_id))
    }

    fn persist(&self, prepared: &Prepared) -> Result<(), TicketError> {
        for offer in &prepared.offers {
            self.store.save_offer(offer.clone())?;
        }
        for request in &prepared.requests {
            self.store.upsert_offer_request(request.clone())?;
        }
        for appointment in &prepared.appointments {
            self.store.save_appointment(appointment.clone())?;
        }
        if let Some(defect) = &prepared.defect {
            self.store.insert_defect(defect.clone())?;
        }
        Ok(())
    }

    /// Composes the event, appends the audit entry and notifies recipients.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        ctx: &RequestContext,
        ticket: Ticket,
        apartment: &Apartment,
        property: &Property,
        actor_company: Option<&CompanyProfile>,
        prepared: &Prepared,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, TicketError> {
        let current_actor = self.current_actor(&ticket, property);
        let stakeholders = Stakeholders::from_ticket(&ticket, property);
        let company = self.subject_company(&ticket, actor_company, prepared.offer.as_ref());
        let bucket = self.policy.bucket(ticket.status);

        let composition = bucket.and_then(|bucket| {
            let compose_ctx = ComposeContext {
                ticket: &ticket,
                bucket,
                direct_order: self.policy.is_direct_order(ticket.status),
                actor: &ctx.actor,
                actor_name: self.actor_name(ctx, actor_company),
                actor_role: ctx.actor_role,
                actor_company,
                apartment,
                property,
                stakeholders: &stakeholders,
                company: company.as_ref(),
                companies: &prepared.companies,
                offer: prepared.offer.as_ref(),
                appointment: prepared.appointment,
                defect: prepared.defect.as_ref(),
                comment,
                translator: self.translator.as_ref(),
            };
            self.composer.compose(&compose_ctx).map(|composition| {
                let entry = (!composition.notify_only)
                    .then(|| AuditLogComposer::entry(&compose_ctx, &composition, ctx.now));
                (composition, entry)
            })
        });

        let Some((composition, entry)) = composition else {
            return Ok(TransitionOutcome {
                ticket,
                current_actor,
                log_entry: None,
                status_text: None,
                deliveries: Vec::new(),
            });
        };

        if let Some(entry) = &entry {
            self.store.append_log(entry.clone())?;
        }

        let status_text = composition
            .texts
            .get(&RecipientKey::Role(ctx.actor_role))
            .map(|text| {
                let locale = ctx.locale.unwrap_or(self.settings.default_locale);
                text.get(locale).to_string()
            });

        let deliveries = self.dispatcher.dispatch_all(
            &DispatchContext {
                ticket: &ticket,
                apartment,
                actor: &ctx.actor,
                actor_role: ctx.actor_role,
                now: ctx.now,
            },
            &composition.texts,
            &composition.recipients,
            composition.subject_key,
        );

        Ok(TransitionOutcome {
            ticket,
            current_actor,
            log_entry: entry,
            status_text,
            deliveries,
        })
    }

    /// First matching awaiting list wins; no match means terminal.
    fn current_actor(&self, ticket: &Ticket, property: &Property) -> Option<CurrentActor> {
        let party = self.policy.awaiting_party(ticket.status)?;
        let actor = match party {
            AwaitingParty::OwnerSide => CurrentActor {
                party,
                user: Some(Stakeholders::from_ticket(ticket, property).managing_user().clone()),
                company: None,
            },
            AwaitingParty::Company => {
                let company = ticket
                    .assigned_company
                    .clone()
                    .or_else(|| ticket.preferred_company.clone());
                let user = company
                    .as_ref()
                    .and_then(|id| self.directory.company(id))
                    .and_then(|profile| profile.account);
                CurrentActor {
                    party,
                    user,
                    company,
                }
            }
            AwaitingParty::Creator => CurrentActor {
                party,
                user: Some(ticket.created_by.clone()),
                company: None,
            },
            AwaitingParty::AssigningParty => CurrentActor {
                party,
                user: Some(
                    ticket
                        .company_assigned_by
                        .clone()
                        .unwrap_or_else(|| ticket.damage_owner.clone()),
                ),
                company: None,
            },
        };
        Some(actor)
    }

    fn subject_company(
        &self,
        ticket: &Ticket,
        actor_company: Option<&CompanyProfile>,
        offer: Option<&Offer>,
    ) -> Option<CompanyProfile> {
        if let Some(company) = actor_company {
            return Some(company.clone());
        }
        if let Some(offer) = offer {
            return self.directory.company(&offer.company_id);
        }
        ticket
            .assigned_company
            .as_ref()
            .or(ticket.preferred_company.as_ref())
            .and_then(|id| self.directory.company(id))
    }

    fn actor_name(&self, ctx: &RequestContext, actor_company: Option<&CompanyProfile>) -> String {
        if let Some(company) = actor_company {
            return company.name.clone();
        }
        self.directory
            .user(&ctx.actor)
            .map(|profile| profile.display_name)
            .unwrap_or_else(|| ctx.actor.to_string())
    }
}

fn ensure_current(ticket: &Ticket, current_token: &str) -> Result<(), TicketError> {
    match current_token.parse::<DamageStatus>() {
        Ok(status) if status == ticket.status => Ok(()),
        _ => Err(TicketError::StaleState {
            expected: current_token.to_string(),
            actual: ticket.status,
        }),
    }
}

fn handlers() -> HashMap<StatusBucket, Handler> {
    let mut table: HashMap<StatusBucket, Handler> = HashMap::new();
    table.insert(StatusBucket::Accept, accept_damage);
    table.insert(StatusBucket::Reject, record_only);
    table.insert(StatusBucket::SendToCompany, send_to_company);
    table.insert(StatusBucket::CompanyAccept, company_accept);
    table.insert(StatusBucket::CompanyReject, company_reject);
    table.insert(StatusBucket::OfferGiven, give_offer);
    table.insert(StatusBucket::OfferAccepted, accept_offer);
    table.insert(StatusBucket::OfferRejected, reject_offer);
    table.insert(StatusBucket::ScheduleDate, schedule_date);
    table.insert(StatusBucket::AppointmentConfirmed, confirm_appointment);
    table.insert(StatusBucket::AppointmentRejected, reject_appointment);
    table.insert(StatusBucket::RepairCompleted, record_only);
    table.insert(StatusBucket::Close, close);
    table.insert(StatusBucket::DefectRaised, raise_defect);
    table
}

fn record_only(_input: &HandlerInput<'_>, _ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    Ok(Prepared::default())
}

/// Records issue type and allocation; allocation hands the damage to the owner.
fn accept_damage(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    if let Some(issue_type) = &input.payload.issue_type {
        ticket.issue_type = Some(issue_type.clone());
    }
    if let Some(allocation) = input.payload.allocation {
        ticket.allocation = allocation;
    }
    ticket.damage_owner = if ticket.allocation {
        input.property.owner.clone()
    } else {
        ticket.created_by.clone()
    };
    Ok(Prepared::default())
}

fn send_to_company(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let mut ids: Vec<&CompanyId> = Vec::new();
    for id in &input.payload.companies {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(TicketError::validation("at least one company is required"));
    }
    let direct = input.rule.direct_order;
    if direct && ids.len() != 1 {
        return Err(TicketError::validation(
            "a direct order goes to exactly one company",
        ));
    }

    let companies = ids
        .into_iter()
        .map(|id| {
            input
                .directory
                .company(id)
                .ok_or_else(|| TicketError::not_found(EntityKind::Company, id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    ticket.company_assigned_by = Some(input.ctx.actor.clone());
    ticket.company_assigned_by_role = Some(input.ctx.actor_role);
    ticket
        .participant_companies
        .extend(companies.iter().map(|company| company.id.clone()));

    let mut requests = Vec::new();
    if direct {
        ticket.assigned_company = companies.first().map(|company| company.id.clone());
    } else {
        requests = companies
            .iter()
            .map(|company| OfferRequest {
                id: OfferRequestId::generate(),
                ticket_id: ticket.id.clone(),
                company_id: company.id.clone(),
                external_email: (!company.is_registered()).then(|| company.email.clone()),
                requested_date: input.ctx.now,
                status: OfferRequestStatus::Requested,
            })
            .collect();
    }

    Ok(Prepared {
        requests,
        companies,
        ..Prepared::default()
    })
}

fn company_accept(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let company = input.acting_company()?;
    match &ticket.assigned_company {
        Some(assigned) if assigned != &company.id => Err(TicketError::validation(
            "the ticket is assigned to another company",
        )),
        _ => {
            ticket.assigned_company = Some(company.id.clone());
            Ok(Prepared::default())
        }
    }
}

/// Clears the assignment if the declining company held it.
fn company_reject(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let company = input.acting_company()?;
    if ticket.assigned_company.as_ref() == Some(&company.id) {
        ticket.assigned_company = None;
    }
    let requests = input
        .store
        .offer_requests(&ticket.id)?
        .into_iter()
        .filter(|request| request.company_id == company.id && request.status.is_open())
        .map(|request| OfferRequest {
            status: OfferRequestStatus::Rejected,
            ..request
        })
        .collect();
    Ok(Prepared {
        requests,
        ..Prepared::default()
    })
}

fn give_offer(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let company = input.acting_company()?;
    let submission = input
        .payload
        .offer
        .as_ref()
        .ok_or_else(|| TicketError::validation("offer details are required"))?;
    let attachment = submission.attachment.as_ref().map(|image| {
        input.documents.describe(
            &image.clone().tagged(OFFER_ATTACHMENT_TAG),
            &input.settings.public_base_url,
            false,
        )
    });

    let changes = OfferWorkflow::new(input.store).submit(
        ticket,
        &company.id,
        submission,
        attachment,
        input.ctx.now,
    )?;
    Ok(Prepared {
        offers: changes.offers,
        requests: changes.requests,
        offer: Some(changes.offer),
        ..Prepared::default()
    })
}

fn accept_offer(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let offer_id = input
        .payload
        .offer_id
        .as_ref()
        .ok_or_else(|| TicketError::validation("offer_id is required"))?;
    let changes = OfferWorkflow::new(input.store).accept(ticket, offer_id, input.ctx.now)?;
    Ok(Prepared {
        offers: changes.offers,
        requests: changes.requests,
        offer: Some(changes.offer),
        ..Prepared::default()
    })
}

fn reject_offer(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let offer_id = input
        .payload
        .offer_id
        .as_ref()
        .ok_or_else(|| TicketError::validation("offer_id is required"))?;
    let changes = OfferWorkflow::new(input.store).reject(ticket, offer_id)?;
    Ok(Prepared {
        offers: changes.offers,
        requests: changes.requests,
        offer: Some(changes.offer),
        ..Prepared::default()
    })
}

fn schedule_date(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let company = input.acting_company()?;
    let scheduled_time = input
        .payload
        .appointment_at
        .ok_or_else(|| TicketError::validation("appointment_at is required"))?;
    let (appointment, view) = AppointmentWorkflow::new(input.store).schedule(
        ticket,
        &company.id,
        scheduled_time,
        input.ctx.now,
    )?;
    Ok(Prepared {
        appointments: vec![appointment],
        appointment: Some(view),
        ..Prepared::default()
    })
}

fn confirm_appointment(
    input: &HandlerInput<'_>,
    ticket: &mut Ticket,
) -> Result<Prepared, TicketError> {
    respond_to_appointment(input, ticket, AppointmentStatus::Confirmed)
}

fn reject_appointment(
    input: &HandlerInput<'_>,
    ticket: &mut Ticket,
) -> Result<Prepared, TicketError> {
    respond_to_appointment(input, ticket, AppointmentStatus::Rejected)
}

fn respond_to_appointment(
    input: &HandlerInput<'_>,
    ticket: &Ticket,
    status: AppointmentStatus,
) -> Result<Prepared, TicketError> {
    let (appointment, view) = AppointmentWorkflow::new(input.store).respond(ticket, status)?;
    Ok(Prepared {
        appointments: vec![appointment],
        appointment: Some(view),
        ..Prepared::default()
    })
}

/// The creator's repair confirmation carries the signature flag.
fn close(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    if input.status == DamageStatus::RepairConfirmed {
        if let Some(signature) = input.payload.signature {
            ticket.signature = signature;
        }
    }
    Ok(Prepared::default())
}

fn raise_defect(input: &HandlerInput<'_>, ticket: &mut Ticket) -> Result<Prepared, TicketError> {
    let report = input
        .payload
        .defect
        .as_ref()
        .ok_or_else(|| TicketError::validation("defect details are required"))?;
    let defect = DefectWorkflow::new(input.documents, &input.settings.public_base_url).raise(
        ticket,
        report,
        &input.ctx.actor,
        input.ctx.now,
    )?;
    Ok(Prepared {
        defect: Some(defect),
        ..Prepared::default()
    })
}
