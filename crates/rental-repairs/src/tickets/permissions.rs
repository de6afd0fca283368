use std::sync::Arc;

use super::directory::{Apartment, CompanyProfile, Property, RoleDirectory};
use super::domain::{OfferRequest, Ticket, UserId};
use super::error::{EntityKind, TicketError};
use super::policy::StatusRule;
use super::roles::Role;

/// Authorizes an actor acting under a role against an apartment or ticket.
#[derive(Clone)]
pub struct PermissionGate {
    directory: Arc<dyn RoleDirectory>,
}

impl PermissionGate {
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves the apartment's property and checks the actor holds `role` on it.
    ///
    /// Companies are not tied to an apartment; they only need to act for some
    /// company here and are checked per ticket by [`Self::authorize_company`].
    pub fn authorize(
        &self,
        role: Role,
        actor: &UserId,
        apartment: &Apartment,
    ) -> Result<Property, TicketError> {
        let property = self
            .directory
            .property(&apartment.property_id)
            .ok_or_else(|| TicketError::not_found(EntityKind::Property, &apartment.property_id))?;

        let permitted = match role {
            Role::Owner => &property.owner == actor,
            Role::PropertyAdmin => property.administrator.as_ref() == Some(actor),
            Role::Janitor => property.janitor.as_ref() == Some(actor),
            Role::Tenant | Role::ObjectOwner => {
                self.directory
                    .has_active_assignment(actor, role, &apartment.id)
            }
            Role::Company => self.directory.company_of(actor).is_some(),
        };

        if permitted {
            Ok(property)
        } else {
            Err(TicketError::denied(actor, role))
        }
    }

    /// A company user may act on a ticket only while their company is the
    /// assignee, a participant, or holds an open offer request.
    pub fn authorize_company(
        &self,
        actor: &UserId,
        ticket: &Ticket,
        requests: &[OfferRequest],
    ) -> Result<CompanyProfile, TicketError> {
        let company_id = self
            .directory
            .company_of(actor)
            .ok_or_else(|| TicketError::denied(actor, Role::Company))?;

        let engaged = ticket.assigned_company.as_ref() == Some(&company_id)
            || ticket.participant_companies.contains(&company_id)
            || requests
                .iter()
                .any(|request| request.company_id == company_id && request.status.is_open());
        if !engaged {
            return Err(TicketError::denied(actor, Role::Company));
        }

        self.directory
            .company(&company_id)
            .ok_or_else(|| TicketError::not_found(EntityKind::Company, &company_id))
    }

    /// Checks the status rule's role hints and the creator-only constraint.
    pub fn authorize_rule(
        &self,
        rule: &StatusRule,
        role: Role,
        actor: &UserId,
        ticket: &Ticket,
    ) -> Result<(), TicketError> {
        if !rule.allows(role) {
            return Err(TicketError::denied(actor, role));
        }
        if rule.creator_only && !ticket.is_creator(actor) {
            return Err(TicketError::denied(actor, role));
        }
        Ok(())
    }
}
