use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authz::{Object, Role, Subject};
use crate::events::{Loggable, Severity};

// =============================================================================
// STORED RULES
// =============================================================================

/// Rule kind column of `policy_rules`
pub const PTYPE_POLICY: &str = "p";
pub const PTYPE_GROUPING: &str = "g";

/// `subject` may perform `action` on `object`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl PolicyRule {
    pub fn new(subject: &Subject, object: &Object, action: &str) -> Self {
        Self {
            subject: subject.key(),
            object: object.key(),
            action: action.to_string(),
        }
    }
}

/// `subject` inherits every permission of `role`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingRule {
    pub subject: String,
    pub role: String,
}

impl GroupingRule {
    pub fn new(subject: &Subject, role: &Subject) -> Self {
        Self {
            subject: subject.key(),
            role: role.key(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbPolicyRow {
    pub id: i64,
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a store mutation. No-ops are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Added,
    AlreadyExisted,
    Removed,
    NotFound,
}

impl Mutation {
    pub fn added(inserted: bool) -> Self {
        if inserted { Mutation::Added } else { Mutation::AlreadyExisted }
    }

    pub fn removed(deleted: bool) -> Self {
        if deleted { Mutation::Removed } else { Mutation::NotFound }
    }

    /// Whether the stored state actually changed
    pub fn changed(&self) -> bool {
        matches!(self, Mutation::Added | Mutation::Removed)
    }
}

// =============================================================================
// AUDITED MUTATIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub org_id: String,
    pub role: String,
}

impl RoleAssignment {
    pub fn new(user_id: &str, org_id: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            role: role.as_str().to_string(),
        }
    }
}

impl Loggable for RoleAssignment {
    fn entity_type() -> &'static str { "role" }
    fn subject_key(&self) -> String { Subject::user_in_org(&self.user_id, &self.org_id).key() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub user_id: String,
    pub resource_type: String,
    pub resource_id: String,
}

impl OwnershipRecord {
    pub fn new(user_id: &str, resource_type: &str, resource_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        }
    }
}

impl Loggable for OwnershipRecord {
    fn entity_type() -> &'static str { "ownership" }
    fn subject_key(&self) -> String { Subject::user(&self.user_id).key() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLoad {
    pub policies: usize,
}

impl Loggable for CatalogLoad {
    fn entity_type() -> &'static str { "catalog" }
    fn subject_key(&self) -> String { "catalog".to_string() }
    fn severity(&self) -> Severity { Severity::Noise }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_changed_only_for_real_writes() {
        assert!(Mutation::added(true).changed());
        assert!(!Mutation::added(false).changed());
        assert!(Mutation::removed(true).changed());
        assert!(!Mutation::removed(false).changed());
    }

    #[test]
    fn ownership_rule_keys() {
        let rule = PolicyRule::new(&Subject::user("u1"), &Object::instance("Project", "p1"), "owner");
        assert_eq!(rule.subject, "user:u1");
        assert_eq!(rule.object, "Project:p1");
        assert_eq!(rule.action, "owner");
    }
}
