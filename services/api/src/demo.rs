use crate::infra::{
    build_machine, Machine, DEMO_ADMIN, DEMO_APARTMENT, DEMO_FUNKE, DEMO_GUEST, DEMO_HYDRO,
    DEMO_OWNER, DEMO_PLUMBER, DEMO_TENANT,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rental_repairs::config::AppConfig;
use rental_repairs::error::AppError;
use rental_repairs::tickets::{
    ApartmentId, CompanyId, DamageStatus, Delivery, Locale, NewTicket, OfferSubmission,
    OutboundMessage, RecipientKey, RecordingGateway, RequestContext, Role, Ticket, TicketError,
    TransitionOutcome, TransitionPayload, UserId,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Timestamp the walkthrough starts at (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Language for printed texts (en or de). Defaults to APP_DEFAULT_LOCALE.
    #[arg(long, value_parser = crate::infra::parse_locale)]
    pub(crate) locale: Option<Locale>,
    /// Skip the outbound email and push listing at the end.
    #[arg(long)]
    pub(crate) skip_outbox: bool,
}

struct Walkthrough {
    machine: Machine<RecordingGateway>,
    start: DateTime<Utc>,
    locale: Locale,
}

impl Walkthrough {
    fn ctx(&self, user: &str, role: Role, minutes: i64) -> RequestContext {
        RequestContext::new(UserId::new(user), role)
            .with_locale(self.locale)
            .at(self.start + Duration::minutes(minutes))
    }

    fn step(
        &self,
        ticket: &Ticket,
        ctx: RequestContext,
        target: DamageStatus,
        payload: TransitionPayload,
    ) -> Result<TransitionOutcome, TicketError> {
        self.machine
            .transition(&ctx, &ticket.id, ticket.status.token(), target, payload)
    }

    fn appointment(&self, days: i64) -> TransitionPayload {
        TransitionPayload {
            appointment_at: Some(self.start + Duration::days(days)),
            ..TransitionPayload::default()
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        locale,
        skip_outbox,
    } = args;

    let config = AppConfig::load()?;
    let gateway = Arc::new(RecordingGateway::default());
    let walk = Walkthrough {
        machine: build_machine(&config.workflow, gateway.clone())?,
        start: start.unwrap_or_else(Utc::now),
        locale: locale.unwrap_or(config.workflow.default_locale),
    };

    println!("Damage ticket walkthrough (started {})", walk.start.to_rfc3339());

    let reported = walk.machine.open_ticket(
        &walk.ctx(DEMO_TENANT, Role::Tenant, 0),
        &ApartmentId::new(DEMO_APARTMENT),
        NewTicket {
            title: "Water stain on bathroom ceiling".to_string(),
            description: "The stain grows after the upstairs shower runs.".to_string(),
            status: DamageStatus::TenantCreateDamage,
            issue_type: Some("plumbing".to_string()),
            images: Vec::new(),
        },
    )?;
    render_outcome("1. Tenant reports the damage", &reported, walk.locale);

    let accepted = walk.step(
        &reported.ticket,
        walk.ctx(DEMO_OWNER, Role::Owner, 15),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload {
            issue_type: Some("plumbing".to_string()),
            ..TransitionPayload::default()
        },
    )?;
    render_outcome("   Owner accepts", &accepted, walk.locale);

    let solicited = walk.step(
        &accepted.ticket,
        walk.ctx(DEMO_OWNER, Role::Owner, 30),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        TransitionPayload {
            companies: vec![
                CompanyId::new(DEMO_HYDRO),
                CompanyId::new(DEMO_FUNKE),
                CompanyId::new(DEMO_GUEST),
            ],
            ..TransitionPayload::default()
        },
    )?;
    render_outcome(
        "2. Owner requests offers from three companies",
        &solicited,
        walk.locale,
    );

    let offered = walk.step(
        &solicited.ticket,
        walk.ctx(DEMO_PLUMBER, Role::Company, 120),
        DamageStatus::CompanyGiveOffer,
        TransitionPayload {
            offer: Some(OfferSubmission {
                amount_cents: 125_000,
                attachment: None,
            }),
            ..TransitionPayload::default()
        },
    )?;
    render_outcome("   Hydro Haustechnik submits an offer", &offered, walk.locale);

    let offer = walk
        .machine
        .offers(&offered.ticket.id)?
        .into_iter()
        .find(|offer| offer.active)
        .ok_or_else(|| TicketError::Validation("no active offer to accept".to_string()))?;
    let decided = walk.step(
        &offered.ticket,
        walk.ctx(DEMO_OWNER, Role::Owner, 180),
        DamageStatus::OwnerAcceptOffer,
        TransitionPayload {
            offer_id: Some(offer.id),
            ..TransitionPayload::default()
        },
    )?;
    render_outcome("3. Owner accepts the offer", &decided, walk.locale);

    println!("\n4. Administrator acts on an outdated view");
    let sent_before = gateway.sent().len();
    match walk.step(
        &reported.ticket,
        walk.ctx(DEMO_ADMIN, Role::PropertyAdmin, 181),
        DamageStatus::PropertyAdminRejectDamage,
        TransitionPayload::with_comment("Duplicate of an older report"),
    ) {
        Err(TicketError::StaleState { expected, actual }) => println!(
            "- refused: {expected} is stale, ticket is at {actual}; {} new messages",
            gateway.sent().len() - sent_before
        ),
        Err(err) => return Err(err.into()),
        Ok(outcome) => println!(
            "- unexpectedly applied, ticket now at {}",
            outcome.ticket.status
        ),
    }

    let fixed = walk.step(
        &decided.ticket,
        walk.ctx(DEMO_PLUMBER, Role::Company, 240),
        DamageStatus::CompanyScheduleDate,
        walk.appointment(2),
    )?;
    render_outcome("5. Company fixes an appointment", &fixed, walk.locale);
    let moved = walk.step(
        &fixed.ticket,
        walk.ctx(DEMO_PLUMBER, Role::Company, 300),
        DamageStatus::CompanyScheduleDate,
        walk.appointment(3),
    )?;
    render_outcome("   Company reschedules", &moved, walk.locale);

    let history = walk.machine.history(&moved.ticket.id)?;
    println!("\nAudit trail for {} ({} entries)", moved.ticket.public_id, history.len());
    for entry in &history {
        let text = entry
            .texts
            .get(&RecipientKey::Role(entry.actor_role))
            .or_else(|| entry.texts.values().next())
            .map(|text| text.get(walk.locale).to_string())
            .unwrap_or_default();
        println!(
            "- {} {} by {} ({}): {}",
            entry.created_at.format("%d.%m.%Y %H:%M"),
            entry.status,
            entry.actor,
            entry.actor_role,
            text
        );
    }

    if skip_outbox {
        return Ok(());
    }

    println!("\nOutbound messages");
    for message in gateway.sent() {
        match message {
            OutboundMessage::Email(email) => println!(
                "- email [{}] to {}: {}",
                email.template_id, email.recipient, email.subject
            ),
            OutboundMessage::Push {
                device_ids,
                payload,
            } => println!("- push to {}: {}", device_ids.join(", "), payload.body),
        }
    }

    Ok(())
}

fn render_outcome(label: &str, outcome: &TransitionOutcome, locale: Locale) {
    println!("\n{label}");
    println!(
        "- {} is now {}",
        outcome.ticket.public_id, outcome.ticket.status
    );
    if let Some(text) = &outcome.status_text {
        println!("  Actor sees: {text}");
    }
    match &outcome.current_actor {
        Some(next) => println!(
            "  Waiting for {:?}{}{}",
            next.party,
            next.user
                .as_ref()
                .map(|user| format!(" user={user}"))
                .unwrap_or_default(),
            next.company
                .as_ref()
                .map(|company| format!(" company={company}"))
                .unwrap_or_default()
        ),
        None => println!("  Terminal status, nobody to wait for"),
    }

    match &outcome.log_entry {
        Some(entry) => {
            let roles = entry
                .responsibles
                .iter()
                .map(|role| role.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!("  Responsible roles: {roles}");
            for (key, text) in &entry.texts {
                println!("    [{key}] {}", text.get(locale));
            }
        }
        None => println!("  Notify-only event, no history entry"),
    }

    for delivery in &outcome.deliveries {
        match delivery {
            Delivery::Email { key, email, pushed } => println!(
                "  -> {key}: email {email}{}",
                if *pushed { " + push" } else { "" }
            ),
            Delivery::Invitation { company, email } => {
                println!("  -> {company}: invitation to {email}")
            }
            Delivery::Skipped { key } => println!("  -> {key}: no text, skipped"),
        }
    }
}
