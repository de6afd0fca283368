use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::tickets::directory::{
    Apartment, CompanyProfile, MemoryRoleDirectory, Property, UserProfile,
};
use crate::tickets::documents::{ImageRef, LinkedDocumentStore};
use crate::tickets::domain::{
    ApartmentId, CompanyId, NewTicket, OfferId, OfferSubmission, PropertyId, Ticket,
    TransitionPayload, UserId,
};
use crate::tickets::i18n::{CatalogTranslator, Locale};
use crate::tickets::machine::{RequestContext, TicketStateMachine, TransitionOutcome};
use crate::tickets::memory::MemoryDamageStore;
use crate::tickets::notify::RecordingGateway;
use crate::tickets::policy::StatusPolicyTable;
use crate::tickets::roles::Role;
use crate::tickets::settings::WorkflowSettings;
use crate::tickets::status::DamageStatus;

pub(super) const OWNER: &str = "olivia";
pub(super) const ADMIN: &str = "adam";
pub(super) const TENANT: &str = "tina";
pub(super) const NEIGHBOUR: &str = "tom";
pub(super) const PLUMBER: &str = "pete";
pub(super) const PLUMBER_EMPLOYEE: &str = "paula";
pub(super) const ELECTRICIAN: &str = "sam";
pub(super) const APARTMENT: &str = "apt-1";

pub(super) const PLUMB: &str = "plumb";
pub(super) const SPARKS: &str = "sparks";
pub(super) const GUEST: &str = "guest";

pub(super) type Machine = TicketStateMachine<MemoryDamageStore, RecordingGateway>;

pub(super) struct Harness {
    pub(super) machine: Arc<Machine>,
    pub(super) store: Arc<MemoryDamageStore>,
    pub(super) gateway: Arc<RecordingGateway>,
}

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn at(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

fn user(id: &str, name: &str, locale: Option<Locale>, devices: &[&str]) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        display_name: name.to_string(),
        email: format!("{id}@repairs.test"),
        locale,
        device_tokens: devices.iter().map(|device| device.to_string()).collect(),
    }
}

pub(super) fn email_of(id: &str) -> String {
    format!("{id}@repairs.test")
}

/// One property with two apartments, three repair companies (one of them a
/// guest without an account) and an optional administrator.
pub(super) fn directory(administrator: Option<&str>) -> MemoryRoleDirectory {
    let apartment = ApartmentId::new(APARTMENT);
    let neighbour_apartment = ApartmentId::new("apt-2");

    MemoryRoleDirectory::default()
        .with_property(Property {
            id: PropertyId::new("prop-1"),
            name: "Lindenhof".to_string(),
            owner: UserId::new(OWNER),
            administrator: administrator.map(UserId::new),
            janitor: None,
        })
        .with_apartment(Apartment {
            id: apartment.clone(),
            property_id: PropertyId::new("prop-1"),
            label: "2.OG links".to_string(),
        })
        .with_apartment(Apartment {
            id: neighbour_apartment.clone(),
            property_id: PropertyId::new("prop-1"),
            label: "2.OG rechts".to_string(),
        })
        .with_user(user(OWNER, "Olivia Owner", Some(Locale::De), &["olivia-phone"]))
        .with_user(user(ADMIN, "Adam Admin", Some(Locale::En), &[]))
        .with_user(user(TENANT, "Tina Tenant", None, &["tina-phone"]))
        .with_user(user(NEIGHBOUR, "Tom Tenant", None, &[]))
        .with_user(user(PLUMBER, "Pete Plumber", Some(Locale::En), &["pete-phone"]))
        .with_user(user(PLUMBER_EMPLOYEE, "Paula Plumber", None, &[]))
        .with_user(user(ELECTRICIAN, "Sam Sparks", Some(Locale::De), &[]))
        .with_company(CompanyProfile {
            id: CompanyId::new(PLUMB),
            name: "Plumb AG".to_string(),
            email: "office@plumb.test".to_string(),
            account: Some(UserId::new(PLUMBER)),
            locale: None,
        })
        .with_company(CompanyProfile {
            id: CompanyId::new(SPARKS),
            name: "Sparks GmbH".to_string(),
            email: "office@sparks.test".to_string(),
            account: Some(UserId::new(ELECTRICIAN)),
            locale: Some(Locale::De),
        })
        .with_company(CompanyProfile {
            id: CompanyId::new(GUEST),
            name: "Guest Handwerk".to_string(),
            email: "guest@handwerk.test".to_string(),
            account: None,
            locale: Some(Locale::En),
        })
        .with_assignment(&UserId::new(TENANT), Role::Tenant, &apartment)
        .with_assignment(&UserId::new(NEIGHBOUR), Role::Tenant, &neighbour_apartment)
        .with_sub_account(&UserId::new(PLUMBER_EMPLOYEE), &UserId::new(PLUMBER))
}

pub(super) fn harness() -> Harness {
    harness_with(directory(Some(ADMIN)), RecordingGateway::default())
}

pub(super) fn harness_with(directory: MemoryRoleDirectory, gateway: RecordingGateway) -> Harness {
    harness_configured(
        directory,
        gateway,
        StatusPolicyTable::standard(),
        WorkflowSettings::default(),
    )
}

pub(super) fn harness_with_settings(settings: WorkflowSettings) -> Harness {
    harness_configured(
        directory(Some(ADMIN)),
        RecordingGateway::default(),
        StatusPolicyTable::standard(),
        settings,
    )
}

pub(super) fn harness_with_policy(policy: StatusPolicyTable) -> Harness {
    harness_configured(
        directory(Some(ADMIN)),
        RecordingGateway::default(),
        policy,
        WorkflowSettings::default(),
    )
}

fn harness_configured(
    directory: MemoryRoleDirectory,
    gateway: RecordingGateway,
    policy: StatusPolicyTable,
    settings: WorkflowSettings,
) -> Harness {
    let store = Arc::new(MemoryDamageStore::default());
    let gateway = Arc::new(gateway);
    let machine = Arc::new(TicketStateMachine::new(
        store.clone(),
        gateway.clone(),
        Arc::new(directory),
        Arc::new(CatalogTranslator::standard()),
        Arc::new(LinkedDocumentStore),
        policy,
        settings,
    ));
    Harness {
        machine,
        store,
        gateway,
    }
}

pub(super) fn actor(user: &str, role: Role, minutes: i64) -> RequestContext {
    RequestContext::new(UserId::new(user), role).at(at(minutes))
}

pub(super) fn leak() -> NewTicket {
    NewTicket {
        title: "Leaking tap".to_string(),
        description: "The kitchen tap drips all night.".to_string(),
        status: DamageStatus::TenantCreateDamage,
        issue_type: None,
        images: vec![ImageRef {
            storage_key: "uploads/leak.jpg".to_string(),
            file_name: "leak.jpg".to_string(),
            tag: None,
        }],
    }
}

pub(super) fn open_leak(harness: &Harness) -> Ticket {
    harness
        .machine
        .open_ticket(
            &actor(TENANT, Role::Tenant, 0),
            &ApartmentId::new(APARTMENT),
            leak(),
        )
        .expect("tenant opens ticket")
        .ticket
}

pub(super) fn advance(
    harness: &Harness,
    ticket: &Ticket,
    ctx: RequestContext,
    target: DamageStatus,
    payload: TransitionPayload,
) -> TransitionOutcome {
    harness
        .machine
        .transition(&ctx, &ticket.id, ticket.status.token(), target, payload)
        .unwrap_or_else(|error| panic!("{target} failed: {error}"))
}

pub(super) fn companies(ids: &[&str]) -> TransitionPayload {
    TransitionPayload {
        companies: ids.iter().map(|id| CompanyId::new(*id)).collect(),
        ..TransitionPayload::default()
    }
}

pub(super) fn offer_of(amount_cents: u64) -> TransitionPayload {
    TransitionPayload {
        offer: Some(OfferSubmission {
            amount_cents,
            attachment: None,
        }),
        ..TransitionPayload::default()
    }
}

pub(super) fn deciding(offer_id: &OfferId, comment: Option<&str>) -> TransitionPayload {
    TransitionPayload {
        offer_id: Some(offer_id.clone()),
        comment: comment.map(str::to_string),
        ..TransitionPayload::default()
    }
}

/// Tenant reports, owner accepts and solicits offers from Plumb AG and the guest company.
pub(super) fn out_for_offers(harness: &Harness) -> Ticket {
    let ticket = open_leak(harness);
    let accepted = advance(
        harness,
        &ticket,
        actor(OWNER, Role::Owner, 10),
        DamageStatus::OwnerAcceptDamage,
        TransitionPayload::default(),
    );
    advance(
        harness,
        &accepted.ticket,
        actor(OWNER, Role::Owner, 20),
        DamageStatus::OwnerSendToCompanyWithoutOffer,
        companies(&[PLUMB, GUEST]),
    )
    .ticket
}

/// Continues from [`out_for_offers`]: Plumb AG quotes and the owner accepts.
pub(super) fn offer_accepted(harness: &Harness) -> (Ticket, OfferId) {
    let ticket = out_for_offers(harness);
    let offered = advance(
        harness,
        &ticket,
        actor(PLUMBER, Role::Company, 30),
        DamageStatus::CompanyGiveOffer,
        offer_of(45_000),
    );
    let offer_id = harness
        .machine
        .offers(&ticket.id)
        .expect("offers load")
        .into_iter()
        .find(|offer| offer.active)
        .expect("active offer")
        .id;
    let accepted = advance(
        harness,
        &offered.ticket,
        actor(OWNER, Role::Owner, 40),
        DamageStatus::OwnerAcceptOffer,
        deciding(&offer_id, None),
    );
    (accepted.ticket, offer_id)
}

pub(super) fn appointment_in(days: i64) -> TransitionPayload {
    TransitionPayload {
        appointment_at: Some(base_time() + Duration::days(days)),
        ..TransitionPayload::default()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error_status(response: Response, expected: StatusCode) -> Value {
    assert_eq!(response.status(), expected);
    let body = read_json_body(response).await;
    assert!(body.get("error").is_some(), "missing error field: {body}");
    body
}
