use super::common::*;
use crate::tickets::domain::{ApartmentId, CompanyId, TicketId, TransitionPayload, UserId};
use crate::tickets::error::{EntityKind, TicketError};
use crate::tickets::notify::RecordingGateway;
use crate::tickets::policy::StatusPolicyTable;
use crate::tickets::roles::Role;
use crate::tickets::status::{AwaitingParty, DamageStatus};

#[test]
fn opening_a_ticket_records_creator_and_images() {
    let harness = harness();
    let outcome = harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("ticket opens");

    let ticket = &outcome.ticket;
    assert!(ticket.public_id.starts_with("DMG-"));
    assert_eq!(ticket.status, DamageStatus::TenantCreateDamage);
    assert_eq!(ticket.created_by, UserId::new(TENANT));
    assert_eq!(ticket.damage_owner, UserId::new(TENANT));
    assert!(ticket.is_read_by(&UserId::new(TENANT)));
    assert!(!ticket.is_read_by(&UserId::new(OWNER)));
    assert_eq!(ticket.images.len(), 1);
    assert_eq!(ticket.images[0].tag.as_deref(), Some("damage"));
    assert_eq!(ticket.images[0].mime_type, "image/jpeg");

    let actor = outcome.current_actor.expect("owner side acts next");
    assert_eq!(actor.party, AwaitingParty::OwnerSide);
    assert_eq!(actor.user, Some(UserId::new(ADMIN)));
    assert_eq!(harness.store.ticket_count(), 1);
}

#[test]
fn owner_manages_when_no_administrator_is_assigned() {
    let harness = harness_with(directory(None), RecordingGateway::default());
    let outcome = harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("ticket opens");
    let actor = outcome.current_actor.expect("owner side acts next");
    assert_eq!(actor.user, Some(UserId::new(OWNER)));
}

#[test]
fn opening_requires_a_create_status_matching_the_role() {
    let harness = harness();
    let apartment = ApartmentId::new(APARTMENT);

    let mut not_create = leak();
    not_create.status = DamageStatus::OwnerAcceptDamage;
    match harness
        .machine
        .open_ticket(&actor(TENANT, Role::Tenant, 0), &apartment, not_create)
    {
        Err(TicketError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut wrong_role = leak();
    wrong_role.status = DamageStatus::OwnerCreateDamage;
    match harness
        .machine
        .open_ticket(&actor(TENANT, Role::Tenant, 0), &apartment, wrong_role)
    {
        Err(TicketError::PermissionDenied { .. }) => {}
        other => panic!("expected permission denied, got {other:?}"),
    }

    let mut blank = leak();
    blank.title = "   ".to_string();
    match harness
        .machine
        .open_ticket(&actor(TENANT, Role::Tenant, 0), &apartment, blank)
    {
        Err(TicketError::Validation(message)) => assert!(message.contains("title")),
        other => panic!("expected validation error, got {other:?}"),
    }

    match harness.machine.open_ticket(
        &actor(TENANT, Role::Tenant, 0),
        &ApartmentId::new("apt-404"),
        leak(),
    ) {
        Err(TicketError::NotFound { kind, .. }) => assert_eq!(kind, EntityKind::Apartment),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(harness.store.ticket_count(), 0);
}

#[test]
fn stale_status_tokens_change_nothing() {
    let harness = harness();
    let ticket = open_leak(&harness);
    let emails_before = harness.gateway.emails().len();

    let result = harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        DamageStatus::OwnerAcceptDamage.token(),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB]),
    );
    match result {
        Err(TicketError::StaleState { expected, actual }) => {
            assert_eq!(expected, "OWNER_ACCEPT_DAMAGE");
            assert_eq!(actual, DamageStatus::TenantCreateDamage);
        }
        other => panic!("expected stale state, got {other:?}"),
    }

    let stored = harness.machine.ticket(&ticket.id).expect("ticket");
    assert_eq!(stored, ticket);
    assert_eq!(harness.machine.history(&ticket.id).expect("history").len(), 1);
    assert_eq!(harness.gateway.emails().len(), emails_before);
    assert!(harness.machine.offer_requests(&ticket.id).expect("requests").is_empty());
}

#[test]
fn second_writer_from_the_same_status_loses() {
    let harness = harness();
    let ticket = open_leak(&harness);

    advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 5),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    let result = harness.machine.transition(
        &actor(ADMIN, Role::PropertyAdmin, 6),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::PropertyAdminRejectDamage,
        TransitionPayload::with_comment("not a damage"),
    );
    match result {
        Err(TicketError::StaleState { actual, .. }) => {
            assert_eq!(actual, DamageStatus::OwnerAcceptDamage)
        }
        other => panic!("expected stale state, got {other:?}"),
    }
}

#[test]
fn create_statuses_are_not_transition_targets() {
    let harness = harness();
    let ticket = open_leak(&harness);
    match harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::OwnerCreateDamage,
        TransitionPayload::default(),
    ) {
        Err(TicketError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn rejecting_requires_a_comment_and_ends_the_workflow() {
    let harness = harness();
    let ticket = open_leak(&harness);

    match harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::OwnerRejectDamage,
        TransitionPayload::with_comment("  "),
    ) {
        Err(TicketError::Validation(message)) => assert!(message.contains("comment")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let outcome = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 6),
        DamageStatus::OwnerRejectDamage,
        TransitionPayload::with_comment(" wear and tear "),
    );
    assert_eq!(outcome.current_actor, None);
    let entry = outcome.log_entry.expect("rejection is logged");
    assert_eq!(entry.comment.as_deref(), Some("wear and tear"));
    assert_eq!(entry.status, DamageStatus::OwnerRejectDamage);
}

#[test]
fn accepting_with_allocation_hands_the_damage_to_the_owner() {
    let harness = harness();
    let ticket = open_leak(&harness);

    let outcome = advance(
        &harness,
        &ticket,
        actor(ADMIN, Role::PropertyAdmin, 5),
        DamageStatus::PropertyAdminAcceptDamage,
        TransitionPayload {
            allocation: Some(true),
            issue_type: Some("plumbing".to_string()),
            ..TransitionPayload::default()
        },
    );

    let ticket = &outcome.ticket;
    assert!(ticket.allocation);
    assert_eq!(ticket.damage_owner, UserId::new(OWNER));
    assert_eq!(ticket.issue_type.as_deref(), Some("plumbing"));
    assert!(ticket.participants.contains(&UserId::new(ADMIN)));
    assert!(ticket.is_read_by(&UserId::new(ADMIN)));
    assert!(!ticket.is_read_by(&UserId::new(TENANT)));

    let next = outcome.current_actor.expect("assigning party acts next");
    assert_eq!(next.party, AwaitingParty::AssigningParty);
    assert_eq!(next.user, Some(UserId::new(OWNER)));
}

#[test]
fn direct_orders_go_to_exactly_one_company() {
    let harness = harness();
    let ticket = open_leak(&harness);

    match harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::OwnerSendToCompanyWithOffer,
        companies(&[PLUMB, SPARKS]),
    ) {
        Err(TicketError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
    match harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::OwnerSendToCompanyWithOffer,
        companies(&["nobody"]),
    ) {
        Err(TicketError::NotFound { kind, .. }) => assert_eq!(kind, EntityKind::Company),
        other => panic!("expected not found, got {other:?}"),
    }

    let outcome = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 6),
        DamageStatus::OwnerSendToCompanyWithOffer,
        companies(&[PLUMB, PLUMB]),
    );
    assert_eq!(outcome.ticket.assigned_company, Some(CompanyId::new(PLUMB)));
    assert_eq!(outcome.ticket.company_assigned_by, Some(UserId::new(OWNER)));
    assert_eq!(outcome.ticket.company_assigned_by_role, Some(Role::Owner));
    assert!(harness
        .machine
        .offer_requests(&ticket.id)
        .expect("requests")
        .is_empty());

    let next = outcome.current_actor.expect("company acts next");
    assert_eq!(next.party, AwaitingParty::Company);
    assert_eq!(next.company, Some(CompanyId::new(PLUMB)));
    assert_eq!(next.user, Some(UserId::new(PLUMBER)));
}

#[test]
fn tenants_may_order_for_their_own_tickets_only() {
    let harness = harness();
    let ticket = open_leak(&harness);

    let outcome = advance(
        &harness,
        &ticket,
        actor(TENANT, Role::Tenant, 5),
        DamageStatus::TenantSendToCompanyWithoutOffer,
        companies(&[SPARKS]),
    );
    assert_eq!(outcome.ticket.company_assigned_by, Some(UserId::new(TENANT)));

    let neighbour_ticket = harness
        .machine
        .open_ticket(
            &actor(NEIGHBOUR, Role::Tenant, 0),
            &ApartmentId::new("apt-2"),
            leak(),
        )
        .expect("neighbour opens")
        .ticket;
    match harness.machine.transition(
        &actor(TENANT, Role::Tenant, 5),
        &neighbour_ticket.id,
        neighbour_ticket.status.token(),
        DamageStatus::TenantSendToCompanyWithoutOffer,
        companies(&[SPARKS]),
    ) {
        Err(TicketError::PermissionDenied { .. }) => {}
        other => panic!("expected permission denied, got {other:?}"),
    }
}

#[test]
fn companies_accept_and_decline_direct_orders() {
    let harness = harness();
    let ticket = open_leak(&harness);
    let ordered = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 5),
        DamageStatus::OwnerSendToCompanyWithOffer,
        companies(&[PLUMB]),
    );

    let accepted = advance(
        &harness,
        &ordered.ticket,
        actor(PLUMBER, Role::Company, 10),
        DamageStatus::CompanyAcceptDamage,
        TransitionPayload::default(),
    );
    assert_eq!(accepted.ticket.assigned_company, Some(CompanyId::new(PLUMB)));
    assert!(!accepted.ticket.participants.contains(&UserId::new(PLUMBER)));

    match harness.machine.transition(
        &actor(PLUMBER, Role::Company, 11),
        &ticket.id,
        accepted.ticket.status.token(),
        DamageStatus::CompanyRejectDamage,
        TransitionPayload::default(),
    ) {
        Err(TicketError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    let declined = advance(
        &harness,
        &accepted.ticket,
        actor(PLUMBER, Role::Company, 12),
        DamageStatus::CompanyRejectDamage,
        TransitionPayload::with_comment("fully booked"),
    );
    assert_eq!(declined.ticket.assigned_company, None);
    let next = declined.current_actor.expect("assigning party acts next");
    assert_eq!(next.party, AwaitingParty::AssigningParty);
    assert_eq!(next.user, Some(UserId::new(OWNER)));
}

#[test]
fn soft_delete_is_owner_side_only_and_hides_the_ticket() {
    let harness = harness();
    let ticket = open_leak(&harness);

    match harness
        .machine
        .soft_delete(&actor(TENANT, Role::Tenant, 5), &ticket.id, ticket.status.token())
    {
        Err(TicketError::PermissionDenied { .. }) => {}
        other => panic!("expected permission denied, got {other:?}"),
    }

    let deleted = harness
        .machine
        .soft_delete(&actor(OWNER, Role::Owner, 5), &ticket.id, ticket.status.token())
        .expect("owner deletes");
    assert!(deleted.deleted);
    match harness.machine.ticket(&ticket.id) {
        Err(TicketError::NotFound { kind, .. }) => assert_eq!(kind, EntityKind::Ticket),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn marking_read_adds_the_reader() {
    let harness = harness();
    let ticket = open_leak(&harness);
    harness
        .machine
        .mark_read(&ticket.id, &UserId::new(OWNER))
        .expect("mark read");
    let stored = harness.machine.ticket(&ticket.id).expect("ticket");
    assert!(stored.is_read_by(&UserId::new(OWNER)));
    assert!(stored.is_read_by(&UserId::new(TENANT)));

    match harness
        .machine
        .mark_read(&TicketId::new("missing"), &UserId::new(OWNER))
    {
        Err(TicketError::NotFound { .. }) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn direct_orders_follow_the_injected_policy() {
    let policy = StatusPolicyTable::standard();
    let mut rule = policy
        .rule(DamageStatus::OwnerSendToCompanyWithoutOffer)
        .cloned()
        .expect("standard rule");
    rule.direct_order = true;
    let harness = harness_with_policy(policy.with_rule(rule));

    let ticket = open_leak(&harness);
    match harness.machine.transition(
        &actor(OWNER, Role::Owner, 5),
        &ticket.id,
        ticket.status.token(),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB, SPARKS]),
    ) {
        Err(TicketError::Validation(message)) => assert!(message.contains("exactly one")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let ordered = advance(
        &harness,
        &ticket,
        actor(OWNER, Role::Owner, 10),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB]),
    );
    assert_eq!(ordered.ticket.assigned_company, Some(CompanyId::new(PLUMB)));
    assert!(harness
        .machine
        .offer_requests(&ticket.id)
        .expect("requests")
        .is_empty());
    let entry = ordered.log_entry.expect("logged");
    assert_eq!(entry.preferred_company, Some(CompanyId::new(PLUMB)));
}
