use super::directory::Property;
use super::domain::{Ticket, UserId};
use super::roles::Role;

/// Derives the stakeholder roles for a ticket from live property assignments.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponsibleRoleResolver;

impl ResponsibleRoleResolver {
    /// Ordered: creator role (tenant/object owner only), owner, administrator
    /// and janitor when assigned, company once one is engaged.
    pub fn resolve(&self, ticket: &Ticket, property: &Property) -> Vec<Role> {
        let mut roles = Vec::with_capacity(5);
        if ticket.created_by_role.is_creator_role() {
            roles.push(ticket.created_by_role);
        }
        roles.push(Role::Owner);
        if property.administrator.is_some() {
            roles.push(Role::PropertyAdmin);
        }
        if property.janitor.is_some() {
            roles.push(Role::Janitor);
        }
        if ticket.company_engaged() {
            roles.push(Role::Company);
        }
        roles
    }
}

/// The humans behind each non-company role of one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stakeholders {
    pub creator: UserId,
    pub creator_role: Role,
    pub owner: UserId,
    pub administrator: Option<UserId>,
    pub janitor: Option<UserId>,
}

impl Stakeholders {
    pub fn from_ticket(ticket: &Ticket, property: &Property) -> Self {
        Self {
            creator: ticket.created_by.clone(),
            creator_role: ticket.created_by_role,
            owner: property.owner.clone(),
            administrator: property.administrator.clone(),
            janitor: property.janitor.clone(),
        }
    }

    /// User addressed for `role`. An absent administrator is redirected to the
    /// owner; an absent janitor has nobody.
    pub fn user_for(&self, role: Role) -> Option<&UserId> {
        match role {
            Role::Tenant | Role::ObjectOwner => {
                (self.creator_role == role).then_some(&self.creator)
            }
            Role::Owner => Some(&self.owner),
            Role::PropertyAdmin => self.administrator.as_ref().or(Some(&self.owner)),
            Role::Janitor => self.janitor.as_ref(),
            Role::Company => None,
        }
    }

    /// Administrator if assigned, otherwise the owner.
    pub fn managing_user(&self) -> &UserId {
        self.administrator.as_ref().unwrap_or(&self.owner)
    }
}
