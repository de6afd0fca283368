use crate::tickets::domain::RecipientKey;
use crate::tickets::roles::Role;

use super::{ComposeContext, Draft, LogComposition, OFFER_REQUEST_SUBJECT};

pub(super) fn created(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("damage.created", Some("damage.created.self"));
    draft.finish()
}

pub(super) fn accepted(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("damage.accepted", None);
    draft.finish()
}

pub(super) fn rejected(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("damage.rejected", None);
    draft.finish()
}

/// Each addressed company gets its own text; the sender and the other
/// stakeholders get one summary naming all of them.
pub(super) fn sent_to_company(ctx: &ComposeContext<'_>) -> LogComposition {
    let (company_key, summary_key) = if ctx.direct_order {
        ("order.assigned", "order.assigned.summary")
    } else {
        ("offer.requested", "offer.requested.summary")
    };

    let names = ctx
        .companies
        .iter()
        .map(|company| company.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let summary = ctx.render_with(summary_key, &[("companies", names)]);

    let mut draft = Draft::new(ctx, ctx.responsibles()).subject(OFFER_REQUEST_SUBJECT);
    draft.confirm_actor();
    for role in draft.responsibles() {
        if role == Role::Company {
            continue;
        }
        draft.text(RecipientKey::Role(role), summary.clone());
        draft.notify_role(role);
    }

    for company in ctx.companies {
        let key = RecipientKey::Company(company.id.clone());
        let text = ctx.render_with(company_key, &[("company", company.name.clone())]);
        draft.text(key.clone(), text);
        draft.notify_company(&company.id, key);
    }

    if ctx.direct_order {
        draft.prefer(ctx.companies.first().map(|company| company.id.clone()));
    }
    draft.finish()
}

pub(super) fn company_accepted(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("company.accepted", None);
    draft.finish()
}

pub(super) fn company_rejected(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("company.rejected", None);
    draft.finish()
}

pub(super) fn offer_given(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("offer.given", Some("offer.given.self"));
    draft.finish()
}

/// Offer decisions concern only the deciding party and the offering company.
fn offer_decision<'c, 'a>(
    ctx: &'c ComposeContext<'a>,
    company_key: &str,
    summary_key: &str,
) -> Draft<'c, 'a> {
    let mut draft = Draft::new(ctx, vec![ctx.actor_role, Role::Company]);
    draft.text(RecipientKey::Role(ctx.actor_role), ctx.render(summary_key));
    if let Some(company) = ctx.company {
        let key = RecipientKey::Company(company.id.clone());
        draft.text(key.clone(), ctx.render(company_key));
        draft.notify_company(&company.id, key);
    }
    draft
}

pub(super) fn offer_accepted(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = offer_decision(ctx, "offer.accepted", "offer.accepted.summary");
    draft.prefer(ctx.offer.map(|offer| offer.company_id.clone()));
    draft.finish()
}

pub(super) fn offer_rejected(ctx: &ComposeContext<'_>) -> LogComposition {
    offer_decision(ctx, "offer.rejected", "offer.rejected.summary").finish()
}

pub(super) fn date_scheduled(ctx: &ComposeContext<'_>) -> LogComposition {
    let rescheduled = ctx
        .appointment
        .is_some_and(|appointment| appointment.rescheduled);
    let key = if rescheduled {
        "appointmentRescheduled"
    } else {
        "appointmentFixed"
    };

    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast(key, None);
    draft.finish()
}

pub(super) fn appointment_confirmed(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles()).notify_only();
    draft.broadcast("appointment.confirmed", None);
    draft.finish()
}

pub(super) fn appointment_rejected(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles()).notify_only();
    draft.broadcast("appointment.rejected", None);
    draft.finish()
}

pub(super) fn repair_completed(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("repair.completed", None);
    draft.finish()
}

pub(super) fn closed(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("damage.closed", None);
    draft.finish()
}

pub(super) fn defect_raised(ctx: &ComposeContext<'_>) -> LogComposition {
    let mut draft = Draft::new(ctx, ctx.responsibles());
    draft.broadcast("defect.raised", None);
    draft.finish()
}
