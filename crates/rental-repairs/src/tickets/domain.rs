use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::documents::{ImageDescriptor, ImageRef};
use super::i18n::Locale;
use super::roles::Role;
use super::status::DamageStatus;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(TicketId);
identifier!(UserId);
identifier!(ApartmentId);
identifier!(PropertyId);
identifier!(
    /// Repair company; guest companies without a platform account still get one.
    CompanyId
);
identifier!(OfferId);
identifier!(OfferRequestId);
identifier!(AppointmentId);
identifier!(DefectId);

/// Maintenance or damage request raised against a rental unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub public_id: String,
    pub title: String,
    pub description: String,
    pub status: DamageStatus,
    pub apartment_id: ApartmentId,
    pub created_by: UserId,
    pub created_by_role: Role,
    /// User currently responsible for resolving the damage.
    pub damage_owner: UserId,
    pub issue_type: Option<String>,
    pub assigned_company: Option<CompanyId>,
    pub company_assigned_by: Option<UserId>,
    pub company_assigned_by_role: Option<Role>,
    pub preferred_company: Option<CompanyId>,
    /// Resolution is delegated to the property owner rather than the creator.
    pub allocation: bool,
    pub signature: bool,
    pub images: Vec<ImageDescriptor>,
    pub participants: BTreeSet<UserId>,
    pub participant_companies: BTreeSet<CompanyId>,
    pub read_by: BTreeSet<UserId>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_creator(&self, user: &UserId) -> bool {
        &self.created_by == user
    }

    /// A company is or was engaged once one has been assigned or invited.
    pub fn company_engaged(&self) -> bool {
        self.assigned_company.is_some() || !self.participant_companies.is_empty()
    }

    pub fn is_read_by(&self, user: &UserId) -> bool {
        self.read_by.contains(user)
    }
}

/// Bilingual rendering of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub de: String,
}

impl LocalizedText {
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::En => &self.en,
            Locale::De => &self.de,
        }
    }
}

/// Key of a per-stakeholder text: a plain role, or a role scoped to one
/// company so several bidders each receive their own message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RecipientKey {
    Role(Role),
    Company(CompanyId),
}

impl RecipientKey {
    pub fn role(&self) -> Role {
        match self {
            RecipientKey::Role(role) => *role,
            RecipientKey::Company(_) => Role::Company,
        }
    }
}

impl fmt::Display for RecipientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientKey::Role(role) => f.write_str(role.key()),
            RecipientKey::Company(id) => write!(f, "company:{id}"),
        }
    }
}

impl From<RecipientKey> for String {
    fn from(value: RecipientKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RecipientKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(id) = value.strip_prefix("company:") {
            return Ok(RecipientKey::Company(CompanyId::new(id)));
        }
        Role::from_str(&value)
            .map(RecipientKey::Role)
            .map_err(|err| err.to_string())
    }
}

pub type TextMap = BTreeMap<RecipientKey, LocalizedText>;

/// Immutable history record appended for every logged transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub ticket_id: TicketId,
    pub status: DamageStatus,
    pub actor: UserId,
    pub actor_role: Role,
    pub created_at: DateTime<Utc>,
    pub assigned_company: Option<CompanyId>,
    pub preferred_company: Option<CompanyId>,
    pub texts: TextMap,
    pub responsibles: Vec<Role>,
    pub comment: Option<String>,
}

/// Priced proposal a company submits against a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub ticket_id: TicketId,
    pub company_id: CompanyId,
    pub amount_cents: u64,
    pub attachment: Option<ImageDescriptor>,
    pub accepted_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn formatted_amount(&self) -> String {
        format_amount(self.amount_cents)
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_date.is_some()
    }
}

pub fn format_amount(amount_cents: u64) -> String {
    format!("{}.{:02}", amount_cents / 100, amount_cents % 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferRequestStatus {
    Requested,
    Offered,
    Accepted,
    Rejected,
    Expired,
}

impl OfferRequestStatus {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Requested | Self::Offered)
    }
}

/// Solicitation inviting a company to bid on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub id: OfferRequestId,
    pub ticket_id: TicketId,
    pub company_id: CompanyId,
    /// Set for companies without a platform account.
    pub external_email: Option<String>,
    pub requested_date: DateTime<Utc>,
    pub status: OfferRequestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Proposed,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub ticket_id: TicketId,
    pub company_id: CompanyId,
    pub scheduled_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub id: DefectId,
    pub ticket_id: TicketId,
    pub title: String,
    pub description: String,
    pub images: Vec<ImageDescriptor>,
    pub raised_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Audit record written before any device delivery is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotificationRecord {
    pub id: String,
    pub ticket_id: TicketId,
    pub recipient: UserId,
    pub role: Role,
    pub message: LocalizedText,
    pub event: DamageStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for opening a ticket with a create-bucket status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub status: DamageStatus,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSubmission {
    pub amount_cents: u64,
    #[serde(default)]
    pub attachment: Option<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectReport {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Optional inputs a transition may carry; which fields matter depends on the
/// target status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub allocation: Option<bool>,
    #[serde(default)]
    pub signature: Option<bool>,
    #[serde(default)]
    pub companies: Vec<CompanyId>,
    #[serde(default)]
    pub offer: Option<OfferSubmission>,
    #[serde(default)]
    pub offer_id: Option<OfferId>,
    #[serde(default)]
    pub appointment_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub defect: Option<DefectReport>,
}

impl TransitionPayload {
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
            ..Self::default()
        }
    }

    /// Comment with surrounding whitespace removed; blank counts as absent.
    pub fn trimmed_comment(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
    }
}
