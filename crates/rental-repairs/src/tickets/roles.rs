use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stakeholder role a user acts under when touching a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tenant,
    ObjectOwner,
    Owner,
    PropertyAdmin,
    Janitor,
    Company,
}

/// Coarse grouping used when a recipe addresses "the other side" of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGroup {
    Creator,
    OwnerSide,
    Company,
}

impl Role {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Tenant,
            Self::ObjectOwner,
            Self::Owner,
            Self::PropertyAdmin,
            Self::Janitor,
            Self::Company,
        ]
    }

    /// Owner-side roles in the order their notifications are resolved.
    pub const fn owner_side() -> [Self; 3] {
        [Self::Owner, Self::PropertyAdmin, Self::Janitor]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::ObjectOwner => "object_owner",
            Self::Owner => "owner",
            Self::PropertyAdmin => "property_admin",
            Self::Janitor => "janitor",
            Self::Company => "company",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tenant => "Tenant",
            Self::ObjectOwner => "Object Owner",
            Self::Owner => "Owner",
            Self::PropertyAdmin => "Property Administrator",
            Self::Janitor => "Janitor",
            Self::Company => "Repair Company",
        }
    }

    pub const fn workflow_group(self) -> RoleGroup {
        match self {
            Self::Tenant | Self::ObjectOwner => RoleGroup::Creator,
            Self::Owner | Self::PropertyAdmin | Self::Janitor => RoleGroup::OwnerSide,
            Self::Company => RoleGroup::Company,
        }
    }

    /// Only tenants and object owners count as the "creator" stakeholder.
    pub const fn is_creator_role(self) -> bool {
        matches!(self.workflow_group(), RoleGroup::Creator)
    }

    pub const fn is_owner_side(self) -> bool {
        matches!(self.workflow_group(), RoleGroup::OwnerSide)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role key '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts snake_case, camelCase and kebab-case keys.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "tenant" => Ok(Self::Tenant),
            "objectowner" => Ok(Self::ObjectOwner),
            "owner" => Ok(Self::Owner),
            "propertyadmin" | "propertyadministrator" | "administrator" => Ok(Self::PropertyAdmin),
            "janitor" => Ok(Self::Janitor),
            "company" => Ok(Self::Company),
            _ => Err(UnknownRole(raw.to_string())),
        }
    }
}
