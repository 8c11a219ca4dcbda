use async_trait::async_trait;

use crate::errors::AuthzResult;
use crate::models::policy::{GroupingRule, Mutation, PolicyRule};

/// Durable storage of permission policies and grouping relations.
///
/// Every mutating call is persisted before it returns, and is visible to the
/// next read on any handle sharing the same backend.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation>;

    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation>;

    async fn add_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation>;

    async fn remove_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation>;

    /// True if any of `subjects` holds a policy for (`object`, `action`)
    async fn has_policy_any(&self, subjects: &[String], object: &str, action: &str) -> AuthzResult<bool>;

    /// Direct grouping targets of `subject`, in the order they were added
    async fn roles_for(&self, subject: &str) -> AuthzResult<Vec<String>>;

    async fn policies(&self) -> AuthzResult<Vec<PolicyRule>>;

    async fn grouping_policies(&self) -> AuthzResult<Vec<GroupingRule>>;

    /// Atomically drop every policy whose subject is a role and insert `rules`.
    /// Grouping relations and non-role policies are left untouched.
    /// Returns how many of `rules` were newly stored.
    async fn load_role_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize>;
}
