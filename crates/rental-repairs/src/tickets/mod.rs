//! Damage ticket lifecycle for rental units.
//!
//! [`TicketStateMachine`] validates role permissions, advances a ticket
//! through the status vocabulary of [`DamageStatus`], appends an audit trail
//! with per-stakeholder texts and fans out email and push notifications.
//! Policy and translation tables are data and can be replaced at startup.

pub mod appointments;
pub mod audit;
pub mod defects;
pub mod directory;
pub mod documents;
pub mod domain;
pub mod error;
pub mod i18n;
pub mod machine;
pub mod memory;
pub mod notify;
pub mod offers;
pub mod permissions;
pub mod policy;
pub mod repository;
pub mod responsibles;
pub mod roles;
pub mod router;
pub mod settings;
pub mod status;

#[cfg(test)]
mod tests;

pub use appointments::AppointmentWorkflow;
pub use audit::{AppointmentView, AuditLogComposer, ComposeContext, LogComposition};
pub use defects::DefectWorkflow;
pub use directory::{
    Apartment, CompanyProfile, MemoryRoleDirectory, Property, RoleDirectory, UserProfile,
};
pub use documents::{DocumentStore, ImageDescriptor, ImageRef, LinkedDocumentStore};
pub use domain::{
    ApartmentId, Appointment, AppointmentId, AppointmentStatus, AuditLogEntry, CompanyId, Defect,
    DefectReport, LocalizedText, NewTicket, Offer, OfferId, OfferRequest, OfferRequestStatus,
    OfferSubmission, PropertyId, PushNotificationRecord, RecipientKey, TextMap, Ticket, TicketId,
    TransitionPayload, UserId,
};
pub use error::{EntityKind, TicketError};
pub use i18n::{CatalogTranslator, Locale, Translator};
pub use machine::{CurrentActor, RequestContext, TicketStateMachine, TransitionOutcome};
pub use memory::MemoryDamageStore;
pub use notify::{
    Delivery, EmailMessage, LinkClaims, LinkError, LinkPurpose, LinkSigner, NotificationDispatcher,
    NotificationError, NotificationGateway, OutboundMessage, PushPayload, Recipient,
    RecipientTarget, RecordingGateway,
};
pub use offers::{OfferChanges, OfferWorkflow};
pub use permissions::PermissionGate;
pub use policy::{PolicyError, StatusPolicyTable, StatusRule};
pub use repository::{DamageStore, RepositoryError};
pub use responsibles::{ResponsibleRoleResolver, Stakeholders};
pub use roles::{Role, RoleGroup};
pub use router::ticket_router;
pub use settings::WorkflowSettings;
pub use status::{AwaitingParty, DamageStatus, StatusBucket};
