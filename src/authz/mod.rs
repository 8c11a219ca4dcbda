//! Authorization module - policy store, enforcement engine and administration API
//!
//! This module implements organization-scoped RBAC with support for:
//! - A fixed catalog of built-in roles (admin, member, billing)
//! - Per-organization role assignment through grouping relations
//! - Per-instance ownership records, independent of roles
//! - Fail-closed enforcement backed by SQLite or an in-memory store

pub mod catalog;
mod enforcer;
pub mod memory;
mod ownership;
pub mod sqlite;
mod store;
mod subject;

pub use catalog::{builtin_policies, Action, ResourceType, Role, OWNER_ACTION};
pub use enforcer::Enforcer;
pub use memory::MemoryPolicyStore;
pub use ownership::OwnershipRegistry;
pub use sqlite::SqlitePolicyStore;
pub use store::PolicyStore;
pub use subject::{role_display_name, Object, Subject, ROLE_PREFIX};

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::{AuthzError, AuthzResult};
use crate::events::{log_mutation, EventBus};
use crate::models::policy::{CatalogLoad, GroupingRule, Mutation, OwnershipRecord, PolicyRule, RoleAssignment};

/// Authorization service handed to every caller that checks or mutates access.
///
/// Cheap to clone; all clones share one store and one audit bus.
#[derive(Clone)]
pub struct Rbac {
    inner: Arc<RbacInner>,
}

struct RbacInner {
    store: Arc<dyn PolicyStore>,
    enforcer: Enforcer,
    ownership: OwnershipRegistry,
    events: Option<EventBus>,
}

impl Rbac {
    /// Load the built-in catalog into `store` and return a ready service.
    ///
    /// Any failure here is fatal: the service must not answer checks against a
    /// partially loaded catalog.
    pub async fn bootstrap(store: Arc<dyn PolicyStore>, events: Option<EventBus>) -> AuthzResult<Self> {
        let rules = builtin_policies();
        let loaded = store
            .load_role_policies(&rules)
            .await
            .map_err(|err| AuthzError::bootstrap(format!("failed to load role catalog: {err}")))?;

        tracing::info!(policies = loaded, "role catalog loaded");
        if let Some(bus) = &events {
            log_mutation(bus, "loaded", &CatalogLoad { policies: loaded });
        }

        Ok(Self::new(store, events))
    }

    /// Serve from a store that an earlier `bootstrap` already loaded.
    ///
    /// Nothing is written. Fails with a bootstrap error if any catalog rule is missing.
    pub async fn attach(store: Arc<dyn PolicyStore>, events: Option<EventBus>) -> AuthzResult<Self> {
        let stored: HashSet<PolicyRule> = store.policies().await?.into_iter().collect();
        let missing = builtin_policies().iter().filter(|rule| !stored.contains(*rule)).count();
        if missing > 0 {
            return Err(AuthzError::bootstrap(format!(
                "role catalog not loaded ({missing} rules missing); run bootstrap first"
            )));
        }

        Ok(Self::new(store, events))
    }

    fn new(store: Arc<dyn PolicyStore>, events: Option<EventBus>) -> Self {
        Self {
            inner: Arc::new(RbacInner {
                enforcer: Enforcer::new(store.clone()),
                ownership: OwnershipRegistry::new(store.clone()),
                store,
                events,
            }),
        }
    }

    /// Every stored `p` rule, role catalog and ownership records alike.
    pub async fn policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        self.inner.store.policies().await
    }

    /// Every stored subject-to-role relation.
    pub async fn grouping_policies(&self) -> AuthzResult<Vec<GroupingRule>> {
        self.inner.store.grouping_policies().await
    }

    /// Whether `user_id` may perform `action` on every `resource` in `org_id`.
    ///
    /// Values outside the known resource types and actions never match.
    pub async fn check_permission(
        &self,
        user_id: &str,
        org_id: &str,
        resource: impl AsRef<str>,
        action: impl AsRef<str>,
    ) -> bool {
        let subject = Subject::user_in_org(user_id, org_id);
        self.inner
            .enforcer
            .enforce(&subject, &Object::of_type(resource.as_ref()), action.as_ref())
            .await
    }

    pub async fn assign_role(&self, user_id: &str, org_id: &str, role: Role) -> AuthzResult<Mutation> {
        let rule = GroupingRule::new(&Subject::user_in_org(user_id, org_id), &role.subject());
        let outcome = self.inner.store.add_grouping_policy(&rule).await?;

        if outcome.changed() {
            tracing::info!(user_id, org_id, role = %role, "role assigned");
            self.publish("assigned", &RoleAssignment::new(user_id, org_id, role));
        } else {
            tracing::info!(user_id, org_id, role = %role, "role assignment already exists");
        }
        Ok(outcome)
    }

    pub async fn remove_role(&self, user_id: &str, org_id: &str, role: Role) -> AuthzResult<Mutation> {
        let rule = GroupingRule::new(&Subject::user_in_org(user_id, org_id), &role.subject());
        let outcome = self.inner.store.remove_grouping_policy(&rule).await?;

        if outcome.changed() {
            tracing::info!(user_id, org_id, role = %role, "role removed");
            self.publish("removed", &RoleAssignment::new(user_id, org_id, role));
        } else {
            tracing::info!(user_id, org_id, role = %role, "role assignment did not exist");
        }
        Ok(outcome)
    }

    /// Role names held by `user_id` in `org_id`, without the `role:` prefix.
    pub async fn get_user_roles(&self, user_id: &str, org_id: &str) -> AuthzResult<Vec<String>> {
        let roles = self
            .inner
            .store
            .roles_for(&Subject::user_in_org(user_id, org_id).key())
            .await?;
        Ok(roles.iter().map(|r| role_display_name(r)).collect())
    }

    pub async fn check_ownership(&self, user_id: &str, resource_type: &str, resource_id: &str) -> bool {
        self.inner.ownership.check(user_id, resource_type, resource_id).await
    }

    pub async fn assign_ownership(&self, user_id: &str, resource_type: &str, resource_id: &str) -> AuthzResult<Mutation> {
        let outcome = self.inner.ownership.assign(user_id, resource_type, resource_id).await?;
        if outcome.changed() {
            self.publish("assigned", &OwnershipRecord::new(user_id, resource_type, resource_id));
        }
        Ok(outcome)
    }

    pub async fn remove_ownership(&self, user_id: &str, resource_type: &str, resource_id: &str) -> AuthzResult<Mutation> {
        let outcome = self.inner.ownership.remove(user_id, resource_type, resource_id).await?;
        if outcome.changed() {
            self.publish("removed", &OwnershipRecord::new(user_id, resource_type, resource_id));
        }
        Ok(outcome)
    }

    fn publish<T: crate::events::Loggable>(&self, action: &str, entity: &T) {
        if let Some(bus) = &self.inner.events {
            log_mutation(bus, action, entity);
        }
    }
}
