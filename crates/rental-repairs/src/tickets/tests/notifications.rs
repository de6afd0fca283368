use super::common::*;
use crate::tickets::domain::{
    CompanyId, LocalizedText, OfferRequestStatus, RecipientKey, TextMap, TransitionPayload,
};
use crate::tickets::i18n::Locale;
use crate::tickets::notify::{
    text_for, Delivery, LinkPurpose, OutboundMessage, RecordingGateway, INVITATION_TEMPLATE,
    UPDATE_TEMPLATE,
};
use crate::tickets::roles::Role;
use crate::tickets::settings::WorkflowSettings;
use crate::tickets::status::DamageStatus;

fn link_token(link: &str) -> &str {
    link.rsplit_once("token=")
        .map(|(_, token)| token)
        .unwrap_or_else(|| link.rsplit('/').next().unwrap_or(link))
}

#[test]
fn creation_notifies_everyone_but_the_reporter() {
    let harness = harness();
    let outcome = harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &crate::tickets::domain::ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("opens");

    assert_eq!(
        outcome.deliveries,
        vec![
            Delivery::Email {
                key: RecipientKey::Role(Role::Owner),
                email: email_of(OWNER),
                pushed: true,
            },
            Delivery::Email {
                key: RecipientKey::Role(Role::PropertyAdmin),
                email: email_of(ADMIN),
                pushed: false,
            },
        ]
    );
    assert!(harness.gateway.emails_to(&email_of(TENANT)).is_empty());

    let records = harness.store.push_records();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|record| record.event == DamageStatus::TenantCreateDamage));

    let pushes: Vec<_> = harness
        .gateway
        .sent()
        .into_iter()
        .filter_map(|message| match message {
            OutboundMessage::Push { device_ids, payload } => Some((device_ids, payload)),
            OutboundMessage::Email(_) => None,
        })
        .collect();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, vec!["olivia-phone".to_string()]);
    assert!(pushes[0].1.body.starts_with("Tina Tenant hat einen neuen Schaden"));
}

#[test]
fn emails_use_the_recipients_locale_and_a_signed_deep_link() {
    let harness = harness();
    let ticket = open_leak(&harness);

    let admin_mail = harness.gateway.emails_to(&email_of(ADMIN));
    assert_eq!(admin_mail.len(), 1);
    let admin_mail = &admin_mail[0];
    assert_eq!(admin_mail.locale, Locale::En);
    assert_eq!(admin_mail.template_id, UPDATE_TEMPLATE);
    assert_eq!(
        admin_mail.subject,
        format!("Update on damage {}: Leaking tap", ticket.public_id)
    );
    assert_eq!(
        admin_mail.data["text"],
        "Tina Tenant reported a new damage for 2.OG links: Leaking tap"
    );

    let owner_mail = &harness.gateway.emails_to(&email_of(OWNER))[0];
    assert_eq!(owner_mail.locale, Locale::De);
    assert!(owner_mail.subject.starts_with("Neuigkeiten zum Schaden"));

    let link = owner_mail.data["link"].as_str().expect("link");
    assert!(link.starts_with(&format!("http://localhost:3000/tickets/{}?token=", ticket.id)));
    let claims = harness
        .machine
        .dispatcher()
        .signer()
        .verify(link_token(link), base_time())
        .expect("token verifies");
    assert_eq!(claims.subject, OWNER);
    assert_eq!(claims.purpose, LinkPurpose::DeepLink);
    assert_eq!(claims.ticket_id, ticket.id);
}

#[test]
fn users_reachable_under_two_roles_get_one_message() {
    let harness = harness_with(directory(Some(OWNER)), RecordingGateway::default());
    open_leak(&harness);

    assert_eq!(harness.gateway.emails_to(&email_of(OWNER)).len(), 1);
    assert_eq!(harness.store.push_records().len(), 1);
}

#[test]
fn guest_companies_receive_an_invitation_instead() {
    let harness = harness();
    let ticket = out_for_offers(&harness);

    let invitations = harness.gateway.emails_to("guest@handwerk.test");
    assert_eq!(invitations.len(), 1);
    let invitation = &invitations[0];
    assert_eq!(invitation.template_id, INVITATION_TEMPLATE);
    assert_eq!(invitation.locale, Locale::En);
    assert_eq!(
        invitation.subject,
        format!("Invitation to quote for damage {}", ticket.public_id)
    );

    let link = invitation.data["link"].as_str().expect("link");
    assert!(link.starts_with("http://localhost:3000/invitations/"));
    let claims = harness
        .machine
        .dispatcher()
        .signer()
        .verify(link_token(link), base_time())
        .expect("invitation verifies");
    assert_eq!(claims.purpose, LinkPurpose::Invitation);
    assert_eq!(claims.subject, GUEST);
    assert_eq!(claims.expires_at, at(20) + chrono::Duration::days(14));

    let requests = harness
        .machine
        .offer_requests(&ticket.id)
        .expect("requests");
    let guest = requests
        .iter()
        .find(|request| request.company_id == CompanyId::new(GUEST))
        .expect("guest request");
    assert_eq!(guest.external_email.as_deref(), Some("guest@handwerk.test"));
    assert_eq!(guest.status, OfferRequestStatus::Requested);
    let plumb = requests
        .iter()
        .find(|request| request.company_id == CompanyId::new(PLUMB))
        .expect("plumb request");
    assert_eq!(plumb.external_email, None);
}

#[test]
fn solicitation_confirms_to_the_sender_and_mails_registered_companies() {
    let harness = harness();
    let ticket = open_leak(&harness);
    let accepted = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 10),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    harness.gateway.clear();

    let outcome = advance(
        &harness,
        &accepted.ticket,
        actor(OWNER, Role::Owner, 20),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB, GUEST]),
    );

    let owner_mail = harness.gateway.emails_to(&email_of(OWNER));
    assert_eq!(owner_mail.len(), 1);
    assert_eq!(
        owner_mail[0].subject,
        format!("Angebotsanfrage für Schaden {}", ticket.public_id)
    );

    let plumb_mail = harness.gateway.emails_to("office@plumb.test");
    assert_eq!(plumb_mail.len(), 1);
    assert_eq!(plumb_mail[0].locale, Locale::En);

    assert!(outcome.deliveries.contains(&Delivery::Invitation {
        company: CompanyId::new(GUEST),
        email: "guest@handwerk.test".to_string(),
    }));
    assert!(outcome.deliveries.contains(&Delivery::Email {
        key: RecipientKey::Company(CompanyId::new(PLUMB)),
        email: "office@plumb.test".to_string(),
        pushed: true,
    }));
    assert_eq!(harness.gateway.emails_to(&email_of(TENANT)).len(), 1);
}

#[test]
fn transport_failures_do_not_undo_the_transition() {
    let harness = harness_with(directory(Some(ADMIN)), RecordingGateway::rejecting_email());
    let outcome = harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &crate::tickets::domain::ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("ticket still opens");

    assert!(outcome.deliveries.is_empty());
    assert!(outcome.log_entry.is_some());
    assert!(harness.gateway.emails().is_empty());

    let accepted = advance(
        &harness,
        &outcome.ticket,
        actor(OWNER, Role::Owner, 5),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    assert_eq!(accepted.ticket.status, DamageStatus::OwnerAcceptDamage);
    assert_eq!(
        harness
            .machine
            .history(&outcome.ticket.id)
            .expect("history")
            .len(),
        2
    );
}

#[test]
fn rejecting_a_solicited_damage_tells_every_bidder() {
    let harness = harness();
    let ticket = out_for_offers(&harness);
    harness.gateway.clear();

    let outcome = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 30),
        DamageStatus::OwnerRejectDamage,
        TransitionPayload::with_comment("The tenant fixed it"),
    );

    let entry = outcome.log_entry.as_ref().expect("logged");
    assert!(entry.responsibles.contains(&Role::Company));
    assert!(outcome.deliveries.iter().any(|delivery| matches!(
        delivery,
        Delivery::Email { key: RecipientKey::Company(id), .. } if id == &CompanyId::new(PLUMB)
    )));
    assert!(outcome.deliveries.contains(&Delivery::Invitation {
        company: CompanyId::new(GUEST),
        email: "guest@handwerk.test".to_string(),
    }));

    let plumb_mail = harness.gateway.emails_to("office@plumb.test");
    assert_eq!(plumb_mail.len(), 1);
    assert_eq!(plumb_mail[0].template_id, UPDATE_TEMPLATE);
}

#[test]
fn a_bidder_is_not_told_about_its_own_rejection() {
    let harness = harness();
    let ticket = open_leak(&harness);
    let accepted = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 5),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    let solicited = advance(
        &harness,
        &accepted.ticket,
        actor(OWNER, Role::Owner, 10),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB, SPARKS]),
    );
    harness.gateway.clear();

    advance(
        &harness,
        &solicited.ticket,
        actor(ELECTRICIAN, Role::Company, 20),
        DamageStatus::CompanyRejectDamage,
        TransitionPayload::with_comment("No capacity this month"),
    );
    assert!(harness.gateway.emails_to("office@sparks.test").is_empty());
}

#[test]
fn link_lifetimes_past_the_calendar_fail_delivery_not_the_transition() {
    let harness = harness_with_settings(WorkflowSettings {
        link_ttl: chrono::Duration::MAX,
        invitation_ttl: chrono::Duration::MAX,
        offer_request_ttl: chrono::Duration::MAX,
        ..WorkflowSettings::default()
    });

    let opened = harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &crate::tickets::domain::ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("ticket still opens");
    assert!(opened.deliveries.is_empty());
    assert!(opened.log_entry.is_some());
    assert_eq!(harness.store.ticket_count(), 1);
    assert!(harness.gateway.emails().is_empty());

    let accepted = advance(
        &harness,
        &opened.ticket,
        actor(OWNER, Role::Owner, 5),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    let solicited = advance(
        &harness,
        &accepted.ticket,
        actor(OWNER, Role::Owner, 10),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[GUEST]),
    );
    assert_eq!(solicited.ticket.status, DamageStatus::OwnerSendToCompanyWithoutOffer);
    assert!(solicited.deliveries.is_empty());

    let expired = harness
        .machine
        .expire_stale_requests(&opened.ticket.id, at(60 * 24 * 3650))
        .expect("expiry runs");
    assert!(expired.is_empty());
}

#[test]
fn the_actor_is_never_notified_about_their_own_action() {
    let harness = harness();
    let ticket = open_leak(&harness);
    harness.gateway.clear();

    advance(
        &harness,
        &ticket,
        actor(ADMIN, Role::PropertyAdmin, 5),
        DamageStatus::PropertyAdminAcceptDamage,
        TransitionPayload::default(),
    );
    assert!(harness.gateway.emails_to(&email_of(ADMIN)).is_empty());
    assert_eq!(harness.gateway.emails_to(&email_of(OWNER)).len(), 1);
    assert_eq!(harness.gateway.emails_to(&email_of(TENANT)).len(), 1);
}

#[test]
fn recipient_texts_fall_back_to_the_owner_and_generic_company() {
    let owner_text = LocalizedText {
        en: "owner".to_string(),
        de: "Eigentümer".to_string(),
    };
    let company_text = LocalizedText {
        en: "company".to_string(),
        de: "Firma".to_string(),
    };
    let mut texts = TextMap::new();
    texts.insert(RecipientKey::Role(Role::Owner), owner_text.clone());
    texts.insert(RecipientKey::Role(Role::Company), company_text.clone());

    assert_eq!(
        text_for(&texts, &RecipientKey::Role(Role::Janitor)),
        Some(&owner_text)
    );
    assert_eq!(
        text_for(&texts, &RecipientKey::Company(CompanyId::new(PLUMB))),
        Some(&company_text)
    );
    assert_eq!(text_for(&texts, &RecipientKey::Role(Role::Tenant)), None);
}
