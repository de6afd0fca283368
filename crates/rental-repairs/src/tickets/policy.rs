use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::roles::Role;
use super::status::{AwaitingParty, DamageStatus, StatusBucket};

/// Errors raised while loading policy or translation tables.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid policy CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid policy row: {0}")]
    InvalidRow(String),
    #[error("policy table reads from disk failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata for a single status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRule {
    pub status: DamageStatus,
    pub bucket: StatusBucket,
    pub comment_required: bool,
    /// Roles allowed to move a ticket into this status.
    pub actor_roles: Vec<Role>,
    /// The acting user must also be the ticket's creator.
    pub creator_only: bool,
    /// Send-to-company status that assigns exactly one company instead of
    /// soliciting offers.
    pub direct_order: bool,
}

impl StatusRule {
    pub fn allows(&self, role: Role) -> bool {
        self.actor_roles.contains(&role)
    }
}

/// Status metadata plus the ordered "who acts next" lists.
#[derive(Debug, Clone)]
pub struct StatusPolicyTable {
    rules: BTreeMap<DamageStatus, StatusRule>,
    awaiting: Vec<(AwaitingParty, BTreeSet<DamageStatus>)>,
}

impl StatusPolicyTable {
    pub fn from_rules(
        rules: Vec<StatusRule>,
        awaiting: Vec<(AwaitingParty, Vec<DamageStatus>)>,
    ) -> Self {
        Self {
            rules: rules.into_iter().map(|rule| (rule.status, rule)).collect(),
            awaiting: awaiting
                .into_iter()
                .map(|(party, statuses)| (party, statuses.into_iter().collect()))
                .collect(),
        }
    }

    pub fn standard() -> Self {
        use DamageStatus::*;
        use Role::*;

        let creators = [Tenant, ObjectOwner];
        let everyone_but_company = [Tenant, ObjectOwner, Owner, PropertyAdmin, Janitor];

        let direct_orders = [
            OwnerSendToCompanyWithOffer,
            PropertyAdminSendToCompanyWithOffer,
            JanitorSendToCompanyWithOffer,
            TenantSendToCompanyWithOffer,
            ObjectOwnerSendToCompanyWithOffer,
        ];

        let mut rules = Vec::new();
        let mut push = |status, bucket, comment_required, roles: &[Role], creator_only| {
            rules.push(StatusRule {
                status,
                bucket,
                comment_required,
                actor_roles: roles.to_vec(),
                creator_only,
                direct_order: direct_orders.contains(&status),
            });
        };

        push(TenantCreateDamage, StatusBucket::Create, false, &[Tenant], false);
        push(ObjectOwnerCreateDamage, StatusBucket::Create, false, &[ObjectOwner], false);
        push(OwnerCreateDamage, StatusBucket::Create, false, &[Owner], false);
        push(PropertyAdminCreateDamage, StatusBucket::Create, false, &[PropertyAdmin], false);
        push(JanitorCreateDamage, StatusBucket::Create, false, &[Janitor], false);

        push(OwnerAcceptDamage, StatusBucket::Accept, false, &[Owner], false);
        push(PropertyAdminAcceptDamage, StatusBucket::Accept, false, &[PropertyAdmin], false);
        push(JanitorAcceptDamage, StatusBucket::Accept, false, &[Janitor], false);

        push(OwnerRejectDamage, StatusBucket::Reject, true, &[Owner], false);
        push(PropertyAdminRejectDamage, StatusBucket::Reject, true, &[PropertyAdmin], false);
        push(JanitorRejectDamage, StatusBucket::Reject, true, &[Janitor], false);

        let send = StatusBucket::SendToCompany;
        push(OwnerSendToCompanyWithOffer, send, false, &[Owner], false);
        push(OwnerSendToCompanyWithoutOffer, send, false, &[Owner], false);
        push(PropertyAdminSendToCompanyWithOffer, send, false, &[PropertyAdmin], false);
        push(PropertyAdminSendToCompanyWithoutOffer, send, false, &[PropertyAdmin], false);
        push(JanitorSendToCompanyWithOffer, send, false, &[Janitor], false);
        push(JanitorSendToCompanyWithoutOffer, send, false, &[Janitor], false);
        push(TenantSendToCompanyWithOffer, send, false, &[Tenant], true);
        push(TenantSendToCompanyWithoutOffer, send, false, &[Tenant], true);
        push(ObjectOwnerSendToCompanyWithOffer, send, false, &[ObjectOwner], true);
        push(ObjectOwnerSendToCompanyWithoutOffer, send, false, &[ObjectOwner], true);

        push(CompanyAcceptDamage, StatusBucket::CompanyAccept, false, &[Company], false);
        push(CompanyRejectDamage, StatusBucket::CompanyReject, true, &[Company], false);
        push(CompanyGiveOffer, StatusBucket::OfferGiven, false, &[Company], false);

        let accepted = StatusBucket::OfferAccepted;
        push(OwnerAcceptOffer, accepted, false, &[Owner], false);
        push(PropertyAdminAcceptOffer, accepted, false, &[PropertyAdmin], false);
        push(JanitorAcceptOffer, accepted, false, &[Janitor], false);
        push(TenantAcceptOffer, accepted, false, &[Tenant], true);
        push(ObjectOwnerAcceptOffer, accepted, false, &[ObjectOwner], true);

        let rejected = StatusBucket::OfferRejected;
        push(OwnerRejectOffer, rejected, true, &[Owner], false);
        push(PropertyAdminRejectOffer, rejected, true, &[PropertyAdmin], false);
        push(JanitorRejectOffer, rejected, true, &[Janitor], false);
        push(TenantRejectOffer, rejected, true, &[Tenant], true);
        push(ObjectOwnerRejectOffer, rejected, true, &[ObjectOwner], true);

        push(CompanyScheduleDate, StatusBucket::ScheduleDate, false, &[Company], false);
        push(
            ConfirmAppointment,
            StatusBucket::AppointmentConfirmed,
            false,
            &everyone_but_company,
            true,
        );
        push(
            RejectAppointment,
            StatusBucket::AppointmentRejected,
            true,
            &everyone_but_company,
            true,
        );
        push(
            CompanyRepairCompleted,
            StatusBucket::RepairCompleted,
            false,
            &[Company],
            false,
        );
        push(RepairConfirmed, StatusBucket::Close, false, &everyone_but_company, true);
        push(OwnerCloseDamage, StatusBucket::Close, false, &[Owner], false);
        push(PropertyAdminCloseDamage, StatusBucket::Close, false, &[PropertyAdmin], false);
        push(DefectRaised, StatusBucket::DefectRaised, false, &creators, true);

        let awaiting = vec![
            (
                AwaitingParty::OwnerSide,
                vec![
                    TenantCreateDamage,
                    ObjectOwnerCreateDamage,
                    OwnerCreateDamage,
                    PropertyAdminCreateDamage,
                    JanitorCreateDamage,
                ],
            ),
            (
                AwaitingParty::Company,
                vec![
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
                    OwnerAcceptOffer,
                    PropertyAdminAcceptOffer,
                    JanitorAcceptOffer,
                    TenantAcceptOffer,
                    ObjectOwnerAcceptOffer,
                    ConfirmAppointment,
                    RejectAppointment,
                    DefectRaised,
                ],
            ),
            (
                AwaitingParty::Creator,
                vec![CompanyScheduleDate, CompanyRepairCompleted],
            ),
            (
                AwaitingParty::AssigningParty,
                vec![
                    OwnerAcceptDamage,
                    PropertyAdminAcceptDamage,
                    JanitorAcceptDamage,
                    CompanyRejectDamage,
                    CompanyGiveOffer,
                    OwnerRejectOffer,
                    PropertyAdminRejectOffer,
                    JanitorRejectOffer,
                    TenantRejectOffer,
                    ObjectOwnerRejectOffer,
                ],
            ),
        ];

        Self::from_rules(rules, awaiting)
    }

    /// Loads a table from CSV rows with the columns
    /// `status,bucket,comment_required,actor_roles,creator_only,awaiting,direct_order`.
    /// `actor_roles` is `|`-separated; `awaiting` may be empty for terminal statuses.
    /// `direct_order` is optional and only valid on `send_to_company` rows.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PolicyError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rules = Vec::new();
        let mut awaiting: BTreeMap<usize, Vec<DamageStatus>> = BTreeMap::new();

        for row in csv_reader.deserialize::<PolicyRow>() {
            let row = row?;
            let status = row
                .status
                .parse::<DamageStatus>()
                .map_err(|err| PolicyError::InvalidRow(err.to_string()))?;
            let bucket = StatusBucket::from_key(&row.bucket).ok_or_else(|| {
                PolicyError::InvalidRow(format!("{status}: unknown bucket '{}'", row.bucket))
            })?;
            let actor_roles = row
                .actor_roles
                .split('|')
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| raw.parse::<Role>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| PolicyError::InvalidRow(format!("{status}: {err}")))?;
            if actor_roles.is_empty() {
                return Err(PolicyError::InvalidRow(format!(
                    "{status}: at least one actor role is required"
                )));
            }

            if row.direct_order && bucket != StatusBucket::SendToCompany {
                return Err(PolicyError::InvalidRow(format!(
                    "{status}: only send_to_company statuses can be direct orders"
                )));
            }

            if let Some(raw) = row.awaiting.as_deref().filter(|raw| !raw.trim().is_empty()) {
                let party = AwaitingParty::from_key(raw).ok_or_else(|| {
                    PolicyError::InvalidRow(format!("{status}: unknown awaiting party '{raw}'"))
                })?;
                let position = AwaitingParty::ordered()
                    .iter()
                    .position(|candidate| *candidate == party)
                    .unwrap_or_default();
                awaiting.entry(position).or_default().push(status);
            }

            rules.push(StatusRule {
                status,
                bucket,
                comment_required: row.comment_required,
                actor_roles,
                creator_only: row.creator_only,
                direct_order: row.direct_order,
            });
        }

        let awaiting = awaiting
            .into_iter()
            .map(|(position, statuses)| (AwaitingParty::ordered()[position], statuses))
            .collect();

        Ok(Self::from_rules(rules, awaiting))
    }

    /// Adds or replaces the rule for `rule.status`.
    pub fn with_rule(mut self, rule: StatusRule) -> Self {
        self.rules.insert(rule.status, rule);
        self
    }

    pub fn rule(&self, status: DamageStatus) -> Option<&StatusRule> {
        self.rules.get(&status)
    }

    pub fn bucket(&self, status: DamageStatus) -> Option<StatusBucket> {
        self.rule(status).map(|rule| rule.bucket)
    }

    pub fn is_create(&self, status: DamageStatus) -> bool {
        self.bucket(status) == Some(StatusBucket::Create)
    }

    pub fn is_direct_order(&self, status: DamageStatus) -> bool {
        self.rule(status).is_some_and(|rule| rule.direct_order)
    }

    /// First list containing `status` wins; `None` marks a terminal status.
    pub fn awaiting_party(&self, status: DamageStatus) -> Option<AwaitingParty> {
        self.awaiting
            .iter()
            .find(|(_, statuses)| statuses.contains(&status))
            .map(|(party, _)| *party)
    }

    pub fn statuses_in(&self, bucket: StatusBucket) -> Vec<DamageStatus> {
        self.rules
            .values()
            .filter(|rule| rule.bucket == bucket)
            .map(|rule| rule.status)
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &StatusRule> {
        self.rules.values()
    }
}

impl Default for StatusPolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Deserialize)]
struct PolicyRow {
    status: String,
    bucket: String,
    comment_required: bool,
    actor_roles: String,
    #[serde(default)]
    creator_only: bool,
    #[serde(default)]
    awaiting: Option<String>,
    #[serde(default)]
    direct_order: bool,
}
