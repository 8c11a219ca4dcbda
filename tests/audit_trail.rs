use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::tempdir;

use org_rbac::events::{init_event_bus, start_audit_listener, verify_audit_chain};
use org_rbac::{Rbac, Role, SqlitePolicyStore};

#[tokio::test]
async fn mutations_are_chained_into_the_audit_table() -> Result<()> {
    let dir = tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("policy.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let (bus, rx) = init_event_bus();
    let listener = tokio::spawn(start_audit_listener(rx, pool.clone()));

    let rbac = Rbac::bootstrap(Arc::new(SqlitePolicyStore::new(pool.clone())), Some(bus)).await?;
    rbac.assign_role("u1", "o1", Role::Admin).await?;
    rbac.assign_role("u1", "o1", Role::Admin).await?; // no-op, not audited
    rbac.assign_ownership("u1", "Project", "p1").await?;
    rbac.remove_role("u1", "o1", Role::Admin).await?;

    // dropping the last sender lets the listener drain and stop
    drop(rbac);
    listener.await?;

    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT event_name, subject, severity FROM policy_audit ORDER BY seq")
            .fetch_all(&pool)
            .await?;

    let names: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
    assert_eq!(names, vec!["catalog.loaded", "role.assigned", "ownership.assigned", "role.removed"]);
    assert_eq!(rows[1].1, "user:u1:org:o1");
    assert_eq!(rows[2].1, "user:u1");
    assert_eq!(rows[3].2, "critical");

    let report = verify_audit_chain(&pool).await?;
    assert_eq!(report.records, 4);
    assert!(report.is_intact());

    // tampering with a payload breaks the chain at that row
    sqlx::query("UPDATE policy_audit SET payload = '{}' WHERE event_name = 'ownership.assigned'")
        .execute(&pool)
        .await?;
    let tampered_seq: i64 =
        sqlx::query_scalar("SELECT seq FROM policy_audit WHERE event_name = 'ownership.assigned'")
            .fetch_one(&pool)
            .await?;

    let report = verify_audit_chain(&pool).await?;
    assert_eq!(report.first_broken, Some(tampered_seq));
    Ok(())
}

#[tokio::test]
async fn empty_audit_table_is_intact() -> Result<()> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?
        .run(&pool)
        .await?;

    let report = verify_audit_chain(&pool).await?;
    assert_eq!(report.records, 0);
    assert!(report.is_intact());
    Ok(())
}
