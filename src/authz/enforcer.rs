use std::sync::Arc;

use super::store::PolicyStore;
use super::subject::{Object, Subject};
use crate::errors::AuthzResult;

/// Enforcement engine for (subject, object, action) checks.
///
/// Evaluation order:
/// 1. effective subjects = the subject itself + its direct grouping targets
///    (one hop, role subjects are not expanded further)
/// 2. any effective subject holding a matching policy -> allow
/// 3. deny
///
/// Storage errors deny. Nothing is cached; every check reads current state.
#[derive(Clone)]
pub struct Enforcer {
    store: Arc<dyn PolicyStore>,
}

impl Enforcer {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Fail-closed check used on the authorization path.
    pub async fn enforce(&self, subject: &Subject, object: &Object, action: &str) -> bool {
        match self.evaluate(subject, object, action).await {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::error!(
                    subject = %subject,
                    object = %object,
                    action = %action,
                    error = %err,
                    "permission check failed; denying"
                );
                false
            }
        }
    }

    /// Same decision as [`Enforcer::enforce`] but surfaces storage errors.
    pub async fn evaluate(&self, subject: &Subject, object: &Object, action: &str) -> AuthzResult<bool> {
        let subjects = self.effective_subjects(subject).await?;
        let allowed = self.store.has_policy_any(&subjects, &object.key(), action).await?;

        if allowed {
            tracing::debug!(subject = %subject, object = %object, action = %action, "permission granted");
        } else {
            tracing::debug!(subject = %subject, object = %object, action = %action, "permission denied");
        }
        Ok(allowed)
    }

    async fn effective_subjects(&self, subject: &Subject) -> AuthzResult<Vec<String>> {
        let key = subject.key();
        let mut subjects = self.store.roles_for(&key).await?;
        subjects.insert(0, key);
        Ok(subjects)
    }
}
