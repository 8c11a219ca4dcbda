//! Built-in roles and the fixed permission table they carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::subject::{Object, Subject};
use crate::models::policy::PolicyRule;

/// Action name used for resource-instance ownership records
pub const OWNER_ACTION: &str = "owner";

/// Resource types that role permissions are granted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    User,
    Organization,
    Project,
    Invite,
    Member,
    Billing,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::User,
        ResourceType::Organization,
        ResourceType::Project,
        ResourceType::Invite,
        ResourceType::Member,
        ResourceType::Billing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::User => "User",
            ResourceType::Organization => "Organization",
            ResourceType::Project => "Project",
            ResourceType::Invite => "Invite",
            ResourceType::Member => "Member",
            ResourceType::Billing => "Billing",
        }
    }
}

/// Actions that can be performed on a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Get,
    Create,
    Update,
    Delete,
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [Action::Get, Action::Create, Action::Update, Action::Delete, Action::Manage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

/// Organization roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
    Billing,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Member, Role::Billing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Billing => "billing",
        }
    }

    pub fn subject(&self) -> Subject {
        Subject::role(self.as_str())
    }

    /// Permissions statically granted to this role
    pub fn permissions(&self) -> &'static [(ResourceType, &'static [Action])] {
        use Action::*;
        match self {
            Role::Admin => &[
                (ResourceType::User, &[Get, Create, Update, Delete]),
                (ResourceType::Organization, &[Get, Create, Update, Delete, Manage]),
                (ResourceType::Project, &[Get, Create, Update, Delete, Manage]),
                (ResourceType::Invite, &[Get, Create, Update, Delete]),
                (ResourceType::Member, &[Get, Create, Update, Delete]),
                (ResourceType::Billing, &[Get, Update]),
            ],
            Role::Member => &[
                (ResourceType::User, &[Get]),
                (ResourceType::Organization, &[Get]),
                (ResourceType::Project, &[Get, Create]),
                (ResourceType::Member, &[Get]),
            ],
            Role::Billing => &[(ResourceType::Billing, &[Get, Update])],
        }
    }
}

macro_rules! str_conversions {
    ($ty:ty, $what:literal) => {
        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| format!("unknown {}: {}", $what, s))
            }
        }
    };
}

str_conversions!(ResourceType, "resource type");
str_conversions!(Action, "action");
str_conversions!(Role, "role");

/// Every permission policy of the built-in catalog, in load order
pub fn builtin_policies() -> Vec<PolicyRule> {
    Role::ALL
        .iter()
        .flat_map(|role| {
            role.permissions().iter().flat_map(move |(resource, actions)| {
                actions.iter().map(move |action| {
                    PolicyRule::new(&role.subject(), &Object::of_type(resource.as_str()), action.as_str())
                })
            })
        })
        .collect()
}
