use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rental_repairs::config::WorkflowConfig;
use rental_repairs::error::AppError;
use rental_repairs::tickets::{
    Apartment, ApartmentId, CompanyId, CompanyProfile, EmailMessage, LinkedDocumentStore, Locale,
    MemoryDamageStore, MemoryRoleDirectory, NotificationError, NotificationGateway, Property,
    PropertyId, PushPayload, Role, TicketStateMachine, UserId, UserProfile,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type Machine<N> = TicketStateMachine<MemoryDamageStore, N>;

pub(crate) const DEMO_OWNER: &str = "anna";
pub(crate) const DEMO_ADMIN: &str = "bernd";
pub(crate) const DEMO_TENANT: &str = "clara";
pub(crate) const DEMO_PLUMBER: &str = "dirk";
pub(crate) const DEMO_ELECTRICIAN: &str = "erik";
pub(crate) const DEMO_APARTMENT: &str = "sonnenhof-3a";
pub(crate) const DEMO_HYDRO: &str = "hydro";
pub(crate) const DEMO_FUNKE: &str = "funke";
pub(crate) const DEMO_GUEST: &str = "meister-guest";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Transport for the standalone service: outbound messages only reach the log.
#[derive(Debug, Default, Clone)]
pub(crate) struct LogOnlyGateway;

impl NotificationGateway for LogOnlyGateway {
    fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        info!(
            recipient = %message.recipient,
            template = %message.template_id,
            locale = message.locale.code(),
            subject = %message.subject,
            "email handed to relay"
        );
        Ok(())
    }

    fn send_push(
        &self,
        device_ids: &[String],
        payload: PushPayload,
    ) -> Result<(), NotificationError> {
        info!(devices = device_ids.len(), title = %payload.title, "push handed to relay");
        Ok(())
    }
}

fn person(id: &str, name: &str, locale: Option<Locale>, devices: &[&str]) -> UserProfile {
    UserProfile {
        id: UserId::new(id),
        display_name: name.to_string(),
        email: format!("{id}@sonnenhof.example"),
        locale,
        device_tokens: devices.iter().map(|device| device.to_string()).collect(),
    }
}

/// Sample property used by `serve` and `demo` until a real directory is wired in.
pub(crate) fn seeded_directory() -> MemoryRoleDirectory {
    let property = PropertyId::new("sonnenhof");
    let apartment = ApartmentId::new(DEMO_APARTMENT);

    MemoryRoleDirectory::default()
        .with_property(Property {
            id: property.clone(),
            name: "Sonnenhof".to_string(),
            owner: UserId::new(DEMO_OWNER),
            administrator: Some(UserId::new(DEMO_ADMIN)),
            janitor: None,
        })
        .with_apartment(Apartment {
            id: apartment.clone(),
            property_id: property,
            label: "3. OG links".to_string(),
        })
        .with_user(person(DEMO_OWNER, "Anna Keller", Some(Locale::De), &["anna-phone"]))
        .with_user(person(DEMO_ADMIN, "Bernd Roth", Some(Locale::De), &[]))
        .with_user(person(DEMO_TENANT, "Clara Novak", Some(Locale::En), &["clara-phone"]))
        .with_user(person(DEMO_PLUMBER, "Dirk Hahn", None, &["dirk-tablet"]))
        .with_user(person(DEMO_ELECTRICIAN, "Erik Funke", Some(Locale::De), &[]))
        .with_company(CompanyProfile {
            id: CompanyId::new(DEMO_HYDRO),
            name: "Hydro Haustechnik".to_string(),
            email: "auftrag@hydro.example".to_string(),
            account: Some(UserId::new(DEMO_PLUMBER)),
            locale: None,
        })
        .with_company(CompanyProfile {
            id: CompanyId::new(DEMO_FUNKE),
            name: "Funke Elektro".to_string(),
            email: "info@funke.example".to_string(),
            account: Some(UserId::new(DEMO_ELECTRICIAN)),
            locale: Some(Locale::De),
        })
        .with_company(CompanyProfile {
            id: CompanyId::new(DEMO_GUEST),
            name: "Meisterbetrieb Gast".to_string(),
            email: "kontakt@meister.example".to_string(),
            account: None,
            locale: Some(Locale::En),
        })
        .with_assignment(&UserId::new(DEMO_TENANT), Role::Tenant, &apartment)
}

/// Wires the state machine with in-memory storage and the configured tables.
pub(crate) fn build_machine<N>(
    workflow: &WorkflowConfig,
    gateway: Arc<N>,
) -> Result<Machine<N>, AppError>
where
    N: NotificationGateway + 'static,
{
    let translator = workflow.translator()?;
    let policy = workflow.status_policy()?;
    Ok(TicketStateMachine::new(
        Arc::new(MemoryDamageStore::default()),
        gateway,
        Arc::new(seeded_directory()),
        Arc::new(translator),
        Arc::new(LinkedDocumentStore),
        policy,
        workflow.settings(),
    ))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

pub(crate) fn parse_locale(raw: &str) -> Result<Locale, String> {
    Locale::parse(raw).ok_or_else(|| format!("unsupported locale '{raw}' (expected en or de)"))
}
