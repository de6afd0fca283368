use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every status a damage ticket can be in. The wire token is the
/// SCREAMING_SNAKE_CASE form of the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageStatus {
    TenantCreateDamage,
    ObjectOwnerCreateDamage,
    OwnerCreateDamage,
    PropertyAdminCreateDamage,
    JanitorCreateDamage,
    OwnerAcceptDamage,
    PropertyAdminAcceptDamage,
    JanitorAcceptDamage,
    OwnerRejectDamage,
    PropertyAdminRejectDamage,
    JanitorRejectDamage,
    OwnerSendToCompanyWithOffer,
    OwnerSendToCompanyWithoutOffer,
    PropertyAdminSendToCompanyWithOffer,
    PropertyAdminSendToCompanyWithoutOffer,
    JanitorSendToCompanyWithOffer,
    JanitorSendToCompanyWithoutOffer,
    TenantSendToCompanyWithOffer,
    TenantSendToCompanyWithoutOffer,
    ObjectOwnerSendToCompanyWithOffer,
    ObjectOwnerSendToCompanyWithoutOffer,
    CompanyAcceptDamage,
    CompanyRejectDamage,
    CompanyGiveOffer,
    OwnerAcceptOffer,
    PropertyAdminAcceptOffer,
    JanitorAcceptOffer,
    TenantAcceptOffer,
    ObjectOwnerAcceptOffer,
    OwnerRejectOffer,
    PropertyAdminRejectOffer,
    JanitorRejectOffer,
    TenantRejectOffer,
    ObjectOwnerRejectOffer,
    CompanyScheduleDate,
    ConfirmAppointment,
    RejectAppointment,
    CompanyRepairCompleted,
    RepairConfirmed,
    OwnerCloseDamage,
    PropertyAdminCloseDamage,
    DefectRaised,
}

impl DamageStatus {
    pub const ALL: [Self; 42] = [
        Self::TenantCreateDamage,
        Self::ObjectOwnerCreateDamage,
        Self::OwnerCreateDamage,
        Self::PropertyAdminCreateDamage,
        Self::JanitorCreateDamage,
        Self::OwnerAcceptDamage,
        Self::PropertyAdminAcceptDamage,
        Self::JanitorAcceptDamage,
        Self::OwnerRejectDamage,
        Self::PropertyAdminRejectDamage,
        Self::JanitorRejectDamage,
        Self::OwnerSendToCompanyWithOffer,
        Self::OwnerSendToCompanyWithoutOffer,
        Self::PropertyAdminSendToCompanyWithOffer,
        Self::PropertyAdminSendToCompanyWithoutOffer,
        Self::JanitorSendToCompanyWithOffer,
        Self::JanitorSendToCompanyWithoutOffer,
        Self::TenantSendToCompanyWithOffer,
        Self::TenantSendToCompanyWithoutOffer,
        Self::ObjectOwnerSendToCompanyWithOffer,
        Self::ObjectOwnerSendToCompanyWithoutOffer,
        Self::CompanyAcceptDamage,
        Self::CompanyRejectDamage,
        Self::CompanyGiveOffer,
        Self::OwnerAcceptOffer,
        Self::PropertyAdminAcceptOffer,
        Self::JanitorAcceptOffer,
        Self::TenantAcceptOffer,
        Self::ObjectOwnerAcceptOffer,
        Self::OwnerRejectOffer,
        Self::PropertyAdminRejectOffer,
        Self::JanitorRejectOffer,
        Self::TenantRejectOffer,
        Self::ObjectOwnerRejectOffer,
        Self::CompanyScheduleDate,
        Self::ConfirmAppointment,
        Self::RejectAppointment,
        Self::CompanyRepairCompleted,
        Self::RepairConfirmed,
        Self::OwnerCloseDamage,
        Self::PropertyAdminCloseDamage,
        Self::DefectRaised,
    ];

    pub const fn token(self) -> &'static str {
        match self {
            Self::TenantCreateDamage => "TENANT_CREATE_DAMAGE",
            Self::ObjectOwnerCreateDamage => "OBJECT_OWNER_CREATE_DAMAGE",
            Self::OwnerCreateDamage => "OWNER_CREATE_DAMAGE",
            Self::PropertyAdminCreateDamage => "PROPERTY_ADMIN_CREATE_DAMAGE",
            Self::JanitorCreateDamage => "JANITOR_CREATE_DAMAGE",
            Self::OwnerAcceptDamage => "OWNER_ACCEPT_DAMAGE",
            Self::PropertyAdminAcceptDamage => "PROPERTY_ADMIN_ACCEPT_DAMAGE",
            Self::JanitorAcceptDamage => "JANITOR_ACCEPT_DAMAGE",
            Self::OwnerRejectDamage => "OWNER_REJECT_DAMAGE",
            Self::PropertyAdminRejectDamage => "PROPERTY_ADMIN_REJECT_DAMAGE",
            Self::JanitorRejectDamage => "JANITOR_REJECT_DAMAGE",
            Self::OwnerSendToCompanyWithOffer => "OWNER_SEND_TO_COMPANY_WITH_OFFER",
            Self::OwnerSendToCompanyWithoutOffer => "OWNER_SEND_TO_COMPANY_WITHOUT_OFFER",
            Self::PropertyAdminSendToCompanyWithOffer => "PROPERTY_ADMIN_SEND_TO_COMPANY_WITH_OFFER",
            Self::PropertyAdminSendToCompanyWithoutOffer => "PROPERTY_ADMIN_SEND_TO_COMPANY_WITHOUT_OFFER",
            Self::JanitorSendToCompanyWithOffer => "JANITOR_SEND_TO_COMPANY_WITH_OFFER",
            Self::JanitorSendToCompanyWithoutOffer => "JANITOR_SEND_TO_COMPANY_WITHOUT_OFFER",
            Self::TenantSendToCompanyWithOffer => "TENANT_SEND_TO_COMPANY_WITH_OFFER",
            Self::TenantSendToCompanyWithoutOffer => "TENANT_SEND_TO_COMPANY_WITHOUT_OFFER",
            Self::ObjectOwnerSendToCompanyWithOffer => "OBJECT_OWNER_SEND_TO_COMPANY_WITH_OFFER",
            Self::ObjectOwnerSendToCompanyWithoutOffer => "OBJECT_OWNER_SEND_TO_COMPANY_WITHOUT_OFFER",
            Self::CompanyAcceptDamage => "COMPANY_ACCEPT_DAMAGE",
            Self::CompanyRejectDamage => "COMPANY_REJECT_DAMAGE",
            Self::CompanyGiveOffer => "COMPANY_GIVE_OFFER",
            Self::OwnerAcceptOffer => "OWNER_ACCEPT_OFFER",
            Self::PropertyAdminAcceptOffer => "PROPERTY_ADMIN_ACCEPT_OFFER",
            Self::JanitorAcceptOffer => "JANITOR_ACCEPT_OFFER",
            Self::TenantAcceptOffer => "TENANT_ACCEPT_OFFER",
            Self::ObjectOwnerAcceptOffer => "OBJECT_OWNER_ACCEPT_OFFER",
            Self::OwnerRejectOffer => "OWNER_REJECT_OFFER",
            Self::PropertyAdminRejectOffer => "PROPERTY_ADMIN_REJECT_OFFER",
            Self::JanitorRejectOffer => "JANITOR_REJECT_OFFER",
            Self::TenantRejectOffer => "TENANT_REJECT_OFFER",
            Self::ObjectOwnerRejectOffer => "OBJECT_OWNER_REJECT_OFFER",
            Self::CompanyScheduleDate => "COMPANY_SCHEDULE_DATE",
            Self::ConfirmAppointment => "CONFIRM_APPOINTMENT",
            Self::RejectAppointment => "REJECT_APPOINTMENT",
            Self::CompanyRepairCompleted => "COMPANY_REPAIR_COMPLETED",
            Self::RepairConfirmed => "REPAIR_CONFIRMED",
            Self::OwnerCloseDamage => "OWNER_CLOSE_DAMAGE",
            Self::PropertyAdminCloseDamage => "PROPERTY_ADMIN_CLOSE_DAMAGE",
            Self::DefectRaised => "DEFECT_RAISED",
        }
    }
}

impl fmt::Display for DamageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status token '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for DamageStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.token().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

/// Named group of statuses that share logging and notification behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Create,
    Accept,
    Reject,
    SendToCompany,
    CompanyAccept,
    CompanyReject,
    OfferGiven,
    OfferAccepted,
    OfferRejected,
    ScheduleDate,
    AppointmentConfirmed,
    AppointmentRejected,
    RepairCompleted,
    Close,
    DefectRaised,
}

impl StatusBucket {
    pub const fn ordered() -> [Self; 15] {
        [
            Self::Create,
            Self::Accept,
            Self::Reject,
            Self::SendToCompany,
            Self::CompanyAccept,
            Self::CompanyReject,
            Self::OfferGiven,
            Self::OfferAccepted,
            Self::OfferRejected,
            Self::ScheduleDate,
            Self::AppointmentConfirmed,
            Self::AppointmentRejected,
            Self::RepairCompleted,
            Self::Close,
            Self::DefectRaised,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::SendToCompany => "send_to_company",
            Self::CompanyAccept => "company_accept",
            Self::CompanyReject => "company_reject",
            Self::OfferGiven => "offer_given",
            Self::OfferAccepted => "offer_accepted",
            Self::OfferRejected => "offer_rejected",
            Self::ScheduleDate => "schedule_date",
            Self::AppointmentConfirmed => "appointment_confirmed",
            Self::AppointmentRejected => "appointment_rejected",
            Self::RepairCompleted => "repair_completed",
            Self::Close => "close",
            Self::DefectRaised => "defect_raised",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let key = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|bucket| bucket.key().eq_ignore_ascii_case(key))
    }
}

/// Party whose action the ticket waits for after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwaitingParty {
    OwnerSide,
    Company,
    Creator,
    AssigningParty,
}

impl AwaitingParty {
    /// Match order used when a status appears in more than one list.
    pub const fn ordered() -> [Self; 4] {
        [
            Self::OwnerSide,
            Self::Company,
            Self::Creator,
            Self::AssigningParty,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::OwnerSide => "owner_side",
            Self::Company => "company",
            Self::Creator => "creator",
            Self::AssigningParty => "assigning_party",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let key = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|party| party.key().eq_ignore_ascii_case(key))
    }
}
