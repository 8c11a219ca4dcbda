use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::errors::AuthzResult;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub subject: String,
    pub severity: Severity,
    pub payload: Value,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, severity: Severity, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            subject: subject.into(),
            severity,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Publish a policy mutation for any entity implementing `Loggable`.
///
/// Event names are `<entity_type>.<action>`, e.g. `role.assigned`.
/// Publishing never fails the mutation that triggered it.
pub fn log_mutation<T: Loggable>(event_bus: &EventBus, action: &str, entity: &T) {
    let event = DomainEvent::new(
        format!("{}.{}", T::entity_type(), action),
        entity.subject_key(),
        entity.severity_for_action(action),
        serde_json::to_value(entity).unwrap_or_default(),
    );

    if event_bus.send(event).is_err() {
        tracing::debug!("no audit listener subscribed; event dropped");
    }
}

/// Persist every event received on the bus into `policy_audit`, chaining
/// each row to the previous one with SHA-256. Returns once all senders are gone.
pub async fn start_audit_listener(mut rx: broadcast::Receiver<DomainEvent>, pool: SqlitePool) {
    tracing::info!("policy audit listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "audit listener lagged; events lost");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if let Err(e) = append_audit_record(&pool, &event).await {
            tracing::error!(event = %event.name, "failed to save audit record: {}", e);
        }
    }
    tracing::info!("policy audit listener stopped");
}

async fn append_audit_record(pool: &SqlitePool, event: &DomainEvent) -> AuthzResult<()> {
    let payload = serde_json::to_string(event).unwrap_or_default();

    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM policy_audit ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;

    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        r#"
        INSERT INTO policy_audit (id, event_name, subject, occurred_at, severity, payload, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.name)
    .bind(&event.subject)
    .bind(event.occurred_at)
    .bind(event.severity.as_str())
    .bind(&payload)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(ph) = prev_hash {
        hasher.update(ph.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditVerification {
    pub records: usize,
    /// `seq` of the first row whose hash or back-link does not match
    pub first_broken: Option<i64>,
}

impl AuditVerification {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Recompute the hash chain over the whole audit table.
pub async fn verify_audit_chain(pool: &SqlitePool) -> AuthzResult<AuditVerification> {
    let rows = sqlx::query("SELECT seq, payload, prev_hash, hash FROM policy_audit ORDER BY seq")
        .fetch_all(pool)
        .await?;

    let mut expected_prev: Option<String> = None;
    for row in &rows {
        let seq: i64 = row.try_get("seq")?;
        let payload: String = row.try_get("payload")?;
        let prev_hash: Option<String> = row.try_get("prev_hash")?;
        let hash: String = row.try_get("hash")?;

        if prev_hash != expected_prev || chain_hash(prev_hash.as_deref(), &payload) != hash {
            return Ok(AuditVerification { records: rows.len(), first_broken: Some(seq) });
        }
        expected_prev = Some(hash);
    }

    Ok(AuditVerification { records: rows.len(), first_broken: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::policy::RoleAssignment;

    #[test]
    fn chain_hash_depends_on_previous_link() {
        let first = chain_hash(None, "payload");
        let second = chain_hash(Some(&first), "payload");
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn log_mutation_names_events_by_entity_and_action() {
        let (bus, mut rx) = init_event_bus();
        let assignment = RoleAssignment {
            user_id: "u1".into(),
            org_id: "o1".into(),
            role: "admin".into(),
        };

        log_mutation(&bus, "removed", &assignment);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "role.removed");
        assert_eq!(event.subject, "user:u1:org:o1");
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.payload["role"], "admin");
    }

    #[tokio::test]
    async fn log_mutation_without_listener_is_silent() {
        let (bus, rx) = init_event_bus();
        drop(rx);
        let assignment = RoleAssignment {
            user_id: "u1".into(),
            org_id: "o1".into(),
            role: "member".into(),
        };
        log_mutation(&bus, "assigned", &assignment);
    }
}
