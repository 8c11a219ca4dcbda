use std::sync::Arc;

use super::catalog::OWNER_ACTION;
use super::enforcer::Enforcer;
use super::store::PolicyStore;
use super::subject::{Object, Subject};
use crate::errors::AuthzResult;
use crate::models::policy::{Mutation, PolicyRule};

/// Per-instance owner records, kept apart from role permissions.
///
/// Ownership lives in the same policy table as role permissions but is keyed by
/// `user:{id}` and `{type}:{id}`, so it never grants or is granted by a role.
#[derive(Clone)]
pub struct OwnershipRegistry {
    store: Arc<dyn PolicyStore>,
    enforcer: Enforcer,
}

impl OwnershipRegistry {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        let enforcer = Enforcer::new(store.clone());
        Self { store, enforcer }
    }

    fn record(user_id: &str, resource_type: &str, resource_id: &str) -> (Subject, Object) {
        (Subject::user(user_id), Object::instance(resource_type, resource_id))
    }

    pub async fn check(&self, user_id: &str, resource_type: &str, resource_id: &str) -> bool {
        let (subject, object) = Self::record(user_id, resource_type, resource_id);
        self.enforcer.enforce(&subject, &object, OWNER_ACTION).await
    }

    pub async fn assign(&self, user_id: &str, resource_type: &str, resource_id: &str) -> AuthzResult<Mutation> {
        let (subject, object) = Self::record(user_id, resource_type, resource_id);
        let outcome = self
            .store
            .add_policy(&PolicyRule::new(&subject, &object, OWNER_ACTION))
            .await?;

        if !outcome.changed() {
            tracing::info!(user_id, resource = %object, "ownership already exists");
        }
        Ok(outcome)
    }

    pub async fn remove(&self, user_id: &str, resource_type: &str, resource_id: &str) -> AuthzResult<Mutation> {
        let (subject, object) = Self::record(user_id, resource_type, resource_id);
        let outcome = self
            .store
            .remove_policy(&PolicyRule::new(&subject, &object, OWNER_ACTION))
            .await?;

        if !outcome.changed() {
            tracing::info!(user_id, resource = %object, "ownership did not exist");
        }
        Ok(outcome)
    }
}
