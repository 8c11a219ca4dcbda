use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::store::PolicyStore;
use super::subject::ROLE_PREFIX;
use crate::errors::{AuthzError, AuthzResult};
use crate::models::policy::{GroupingRule, Mutation, PolicyRule};

#[derive(Debug, Default)]
struct Rules {
    policies: BTreeSet<PolicyRule>,
    /// Insertion ordered; `roles_for` reports in this order
    groupings: Vec<GroupingRule>,
}

/// Process-local policy store. One writer at a time, readers share a snapshot.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    rules: RwLock<Rules>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AuthzResult<RwLockReadGuard<'_, Rules>> {
        self.rules
            .read()
            .map_err(|_| AuthzError::internal("policy store lock poisoned"))
    }

    fn write(&self) -> AuthzResult<RwLockWriteGuard<'_, Rules>> {
        self.rules
            .write()
            .map_err(|_| AuthzError::internal("policy store lock poisoned"))
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation> {
        Ok(Mutation::added(self.write()?.policies.insert(rule.clone())))
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation> {
        Ok(Mutation::removed(self.write()?.policies.remove(rule)))
    }

    async fn add_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation> {
        let mut rules = self.write()?;
        if rules.groupings.contains(rule) {
            return Ok(Mutation::AlreadyExisted);
        }
        rules.groupings.push(rule.clone());
        Ok(Mutation::Added)
    }

    async fn remove_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation> {
        let mut rules = self.write()?;
        let before = rules.groupings.len();
        rules.groupings.retain(|g| g != rule);
        Ok(Mutation::removed(rules.groupings.len() != before))
    }

    async fn has_policy_any(&self, subjects: &[String], object: &str, action: &str) -> AuthzResult<bool> {
        let rules = self.read()?;
        Ok(subjects.iter().any(|subject| {
            rules.policies.contains(&PolicyRule {
                subject: subject.clone(),
                object: object.to_string(),
                action: action.to_string(),
            })
        }))
    }

    async fn roles_for(&self, subject: &str) -> AuthzResult<Vec<String>> {
        let rules = self.read()?;
        Ok(rules
            .groupings
            .iter()
            .filter(|g| g.subject == subject)
            .map(|g| g.role.clone())
            .collect())
    }

    async fn policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        Ok(self.read()?.policies.iter().cloned().collect())
    }

    async fn grouping_policies(&self) -> AuthzResult<Vec<GroupingRule>> {
        Ok(self.read()?.groupings.clone())
    }

    async fn load_role_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize> {
        let mut state = self.write()?;
        state.policies.retain(|p| !p.subject.starts_with(ROLE_PREFIX));
        let mut loaded = 0;
        for rule in rules {
            if state.policies.insert(rule.clone()) {
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{Object, Subject};

    fn rule(subject: &str, object: &str, action: &str) -> PolicyRule {
        PolicyRule { subject: subject.into(), object: object.into(), action: action.into() }
    }

    #[tokio::test]
    async fn add_policy_is_idempotent() {
        let store = MemoryPolicyStore::new();
        let r = rule("role:admin", "Project", "get");

        assert_eq!(store.add_policy(&r).await.unwrap(), Mutation::Added);
        assert_eq!(store.add_policy(&r).await.unwrap(), Mutation::AlreadyExisted);
        assert_eq!(store.policies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_missing_relation_is_not_an_error() {
        let store = MemoryPolicyStore::new();
        let g = GroupingRule::new(&Subject::user_in_org("u1", "o1"), &Subject::role("admin"));

        assert_eq!(store.remove_grouping_policy(&g).await.unwrap(), Mutation::NotFound);
        assert_eq!(store.remove_policy(&rule("a", "b", "c")).await.unwrap(), Mutation::NotFound);
    }

    #[tokio::test]
    async fn roles_for_keeps_insertion_order() {
        let store = MemoryPolicyStore::new();
        let subject = Subject::user_in_org("u1", "o1");
        for role in ["member", "billing", "admin"] {
            store
                .add_grouping_policy(&GroupingRule::new(&subject, &Subject::role(role)))
                .await
                .unwrap();
        }

        let roles = store.roles_for(&subject.key()).await.unwrap();
        assert_eq!(roles, vec!["role:member", "role:billing", "role:admin"]);
    }

    #[tokio::test]
    async fn has_policy_any_needs_an_exact_triple() {
        let store = MemoryPolicyStore::new();
        store.add_policy(&rule("role:member", "Project", "get")).await.unwrap();
        store.add_policy(&rule("role:admin", "Project", "delete")).await.unwrap();

        let subjects = vec!["user:u1:org:o1".to_string(), "role:member".to_string()];
        assert!(store.has_policy_any(&subjects, "Project", "get").await.unwrap());
        // admin holds delete, but admin is not among the subjects
        assert!(!store.has_policy_any(&subjects, "Project", "delete").await.unwrap());
        assert!(!store.has_policy_any(&subjects, "Task", "get").await.unwrap());
        assert!(!store.has_policy_any(&[], "Project", "get").await.unwrap());
    }

    #[tokio::test]
    async fn load_role_policies_keeps_direct_policies() {
        let store = MemoryPolicyStore::new();
        let owned = PolicyRule::new(&Subject::user("u1"), &Object::instance("Project", "p1"), "owner");
        store.add_policy(&owned).await.unwrap();
        store.add_policy(&rule("role:stale", "Project", "delete")).await.unwrap();

        let loaded = store
            .load_role_policies(&[rule("role:member", "Project", "get")])
            .await
            .unwrap();

        assert_eq!(loaded, 1);
        let policies = store.policies().await.unwrap();
        assert!(policies.contains(&owned));
        assert!(!policies.iter().any(|p| p.subject == "role:stale"));
    }
}
