use std::fmt;

use super::domain::UserId;
use super::repository::RepositoryError;
use super::roles::Role;
use super::status::DamageStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ticket,
    Apartment,
    Property,
    User,
    Company,
    Offer,
    Appointment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Ticket => "ticket",
            EntityKind::Apartment => "apartment",
            EntityKind::Property => "property",
            EntityKind::User => "user",
            EntityKind::Company => "company",
            EntityKind::Offer => "offer",
            EntityKind::Appointment => "appointment",
        };
        f.write_str(label)
    }
}

/// Failures surfaced to the caller of a ticket operation.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("{role} {actor} is not permitted to perform this action")]
    PermissionDenied { actor: UserId, role: Role },
    #[error("ticket status changed concurrently: expected {expected}, found {actual}")]
    StaleState {
        expected: String,
        actual: DamageStatus,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl TicketError {
    pub(crate) fn denied(actor: &UserId, role: Role) -> Self {
        Self::PermissionDenied {
            actor: actor.clone(),
            role,
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for TicketError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::StaleStatus { expected, actual } => Self::StaleState {
                expected: expected.token().to_string(),
                actual,
            },
            other => Self::Repository(other),
        }
    }
}
