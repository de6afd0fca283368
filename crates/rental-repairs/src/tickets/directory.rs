use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::domain::{ApartmentId, CompanyId, PropertyId, UserId};
use super::i18n::Locale;
use super::roles::Role;

/// Property-level role assignments. Administrator and janitor are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub owner: UserId,
    pub administrator: Option<UserId>,
    pub janitor: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub property_id: PropertyId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub locale: Option<Locale>,
    pub device_tokens: Vec<String>,
}

/// Repair company. `account` is `None` for guest companies that were only
/// ever contacted by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: CompanyId,
    pub name: String,
    pub email: String,
    pub account: Option<UserId>,
    pub locale: Option<Locale>,
}

impl CompanyProfile {
    pub fn is_registered(&self) -> bool {
        self.account.is_some()
    }
}

/// Read-only view of users, companies and their role assignments.
pub trait RoleDirectory: Send + Sync {
    fn apartment(&self, id: &ApartmentId) -> Option<Apartment>;
    fn property(&self, id: &PropertyId) -> Option<Property>;
    fn user(&self, id: &UserId) -> Option<UserProfile>;
    fn company(&self, id: &CompanyId) -> Option<CompanyProfile>;
    /// Tenants and object owners hold per-apartment assignment records.
    fn has_active_assignment(&self, user: &UserId, role: Role, apartment: &ApartmentId) -> bool;
    fn active_roles(&self, user: &UserId) -> Vec<Role>;
    /// Parent account of a nested (employee) account, if any.
    fn parent_account(&self, user: &UserId) -> Option<UserId>;
    fn company_for_account(&self, account: &UserId) -> Option<CompanyId>;

    /// Company the user acts for, looking through nested accounts.
    fn company_of(&self, user: &UserId) -> Option<CompanyId> {
        self.company_for_account(user).or_else(|| {
            self.parent_account(user)
                .and_then(|parent| self.company_for_account(&parent))
        })
    }
}

/// Directory held entirely in memory, assembled with the `with_*` builders.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoleDirectory {
    apartments: HashMap<ApartmentId, Apartment>,
    properties: HashMap<PropertyId, Property>,
    users: HashMap<UserId, UserProfile>,
    companies: HashMap<CompanyId, CompanyProfile>,
    assignments: HashSet<(UserId, Role, ApartmentId)>,
    parents: HashMap<UserId, UserId>,
}

impl MemoryRoleDirectory {
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.id.clone(), property);
        self
    }

    pub fn with_apartment(mut self, apartment: Apartment) -> Self {
        self.apartments.insert(apartment.id.clone(), apartment);
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn with_company(mut self, company: CompanyProfile) -> Self {
        self.companies.insert(company.id.clone(), company);
        self
    }

    pub fn with_assignment(mut self, user: &UserId, role: Role, apartment: &ApartmentId) -> Self {
        self.assignments
            .insert((user.clone(), role, apartment.clone()));
        self
    }

    pub fn with_sub_account(mut self, child: &UserId, parent: &UserId) -> Self {
        self.parents.insert(child.clone(), parent.clone());
        self
    }
}

impl RoleDirectory for MemoryRoleDirectory {
    fn apartment(&self, id: &ApartmentId) -> Option<Apartment> {
        self.apartments.get(id).cloned()
    }

    fn property(&self, id: &PropertyId) -> Option<Property> {
        self.properties.get(id).cloned()
    }

    fn user(&self, id: &UserId) -> Option<UserProfile> {
        self.users.get(id).cloned()
    }

    fn company(&self, id: &CompanyId) -> Option<CompanyProfile> {
        self.companies.get(id).cloned()
    }

    fn has_active_assignment(&self, user: &UserId, role: Role, apartment: &ApartmentId) -> bool {
        self.assignments
            .contains(&(user.clone(), role, apartment.clone()))
    }

    fn active_roles(&self, user: &UserId) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .assignments
            .iter()
            .filter(|(assigned, _, _)| assigned == user)
            .map(|(_, role, _)| *role)
            .collect();

        for property in self.properties.values() {
            if &property.owner == user {
                roles.push(Role::Owner);
            }
            if property.administrator.as_ref() == Some(user) {
                roles.push(Role::PropertyAdmin);
            }
            if property.janitor.as_ref() == Some(user) {
                roles.push(Role::Janitor);
            }
        }

        if self.company_of(user).is_some() {
            roles.push(Role::Company);
        }

        roles.sort();
        roles.dedup();
        roles
    }

    fn parent_account(&self, user: &UserId) -> Option<UserId> {
        self.parents.get(user).cloned()
    }

    fn company_for_account(&self, account: &UserId) -> Option<CompanyId> {
        self.companies
            .values()
            .find(|company| company.account.as_ref() == Some(account))
            .map(|company| company.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> MemoryRoleDirectory {
        let owner = UserId::new("owner");
        let worker = UserId::new("worker");
        let boss = UserId::new("boss");
        let apartment = ApartmentId::new("apt-1");

        MemoryRoleDirectory::default()
            .with_property(Property {
                id: PropertyId::new("prop-1"),
                name: "Lindenhof".to_string(),
                owner: owner.clone(),
                administrator: None,
                janitor: None,
            })
            .with_apartment(Apartment {
                id: apartment.clone(),
                property_id: PropertyId::new("prop-1"),
                label: "2.OG links".to_string(),
            })
            .with_company(CompanyProfile {
                id: CompanyId::new("plumb"),
                name: "Plumb AG".to_string(),
                email: "office@plumb.test".to_string(),
                account: Some(boss.clone()),
                locale: None,
            })
            .with_sub_account(&worker, &boss)
            .with_assignment(&UserId::new("tina"), Role::Tenant, &apartment)
    }

    #[test]
    fn resolves_company_through_parent_account() {
        let directory = directory();
        assert_eq!(
            directory.company_of(&UserId::new("worker")),
            Some(CompanyId::new("plumb"))
        );
        assert_eq!(directory.company_of(&UserId::new("tina")), None);
    }

    #[test]
    fn lists_active_roles_from_assignments_and_properties() {
        let directory = directory();
        assert_eq!(
            directory.active_roles(&UserId::new("tina")),
            vec![Role::Tenant]
        );
        assert_eq!(
            directory.active_roles(&UserId::new("owner")),
            vec![Role::Owner]
        );
        assert_eq!(
            directory.active_roles(&UserId::new("worker")),
            vec![Role::Company]
        );
    }
}
