use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::store::PolicyStore;
use crate::db::row_parsers::db_policy_row_from_row;
use crate::errors::AuthzResult;
use crate::models::policy::{DbPolicyRow, GroupingRule, Mutation, PolicyRule, PTYPE_GROUPING, PTYPE_POLICY};

/// Policy store backed by the `policy_rules` table.
///
/// Each call is a single statement or a single transaction; SQLite serializes
/// writers, and WAL mode lets readers proceed against the last committed state.
#[derive(Debug, Clone)]
pub struct SqlitePolicyStore {
    pool: SqlitePool,
}

impl SqlitePolicyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Raw rows of both kinds, oldest first
    pub async fn rows(&self) -> AuthzResult<Vec<DbPolicyRow>> {
        let rows = sqlx::query("SELECT id, ptype, v0, v1, v2, created_at FROM policy_rules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(db_policy_row_from_row).collect()
    }

    async fn insert(&self, ptype: &str, v0: &str, v1: &str, v2: &str) -> AuthzResult<Mutation> {
        let result = sqlx::query(
            "INSERT INTO policy_rules (ptype, v0, v1, v2, created_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (ptype, v0, v1, v2) DO NOTHING",
        )
        .bind(ptype)
        .bind(v0)
        .bind(v1)
        .bind(v2)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Mutation::added(result.rows_affected() > 0))
    }

    async fn delete(&self, ptype: &str, v0: &str, v1: &str, v2: &str) -> AuthzResult<Mutation> {
        let result = sqlx::query("DELETE FROM policy_rules WHERE ptype = ? AND v0 = ? AND v1 = ? AND v2 = ?")
            .bind(ptype)
            .bind(v0)
            .bind(v1)
            .bind(v2)
            .execute(&self.pool)
            .await?;

        Ok(Mutation::removed(result.rows_affected() > 0))
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn add_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation> {
        self.insert(PTYPE_POLICY, &rule.subject, &rule.object, &rule.action).await
    }

    async fn remove_policy(&self, rule: &PolicyRule) -> AuthzResult<Mutation> {
        self.delete(PTYPE_POLICY, &rule.subject, &rule.object, &rule.action).await
    }

    async fn add_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation> {
        self.insert(PTYPE_GROUPING, &rule.subject, &rule.role, "").await
    }

    async fn remove_grouping_policy(&self, rule: &GroupingRule) -> AuthzResult<Mutation> {
        self.delete(PTYPE_GROUPING, &rule.subject, &rule.role, "").await
    }

    async fn has_policy_any(&self, subjects: &[String], object: &str, action: &str) -> AuthzResult<bool> {
        if subjects.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; subjects.len()].join(", ");
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM policy_rules WHERE ptype = ? AND v1 = ? AND v2 = ? AND v0 IN ({}))",
            placeholders
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(PTYPE_POLICY)
            .bind(object)
            .bind(action);
        for subject in subjects {
            query = query.bind(subject);
        }

        Ok(query.fetch_one(&self.pool).await? > 0)
    }

    async fn roles_for(&self, subject: &str) -> AuthzResult<Vec<String>> {
        let roles: Vec<String> = sqlx::query_scalar("SELECT v1 FROM policy_rules WHERE ptype = ? AND v0 = ? ORDER BY id")
            .bind(PTYPE_GROUPING)
            .bind(subject)
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn policies(&self) -> AuthzResult<Vec<PolicyRule>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT v0, v1, v2 FROM policy_rules WHERE ptype = ? ORDER BY id",
        )
        .bind(PTYPE_POLICY)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(subject, object, action)| PolicyRule { subject, object, action })
            .collect())
    }

    async fn grouping_policies(&self) -> AuthzResult<Vec<GroupingRule>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT v0, v1 FROM policy_rules WHERE ptype = ? ORDER BY id",
        )
        .bind(PTYPE_GROUPING)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(subject, role)| GroupingRule { subject, role })
            .collect())
    }

    async fn load_role_policies(&self, rules: &[PolicyRule]) -> AuthzResult<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM policy_rules WHERE ptype = ? AND substr(v0, 1, 5) = 'role:'")
            .bind(PTYPE_POLICY)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let mut loaded = 0;
        for rule in rules {
            let result = sqlx::query(
                "INSERT INTO policy_rules (ptype, v0, v1, v2, created_at) VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (ptype, v0, v1, v2) DO NOTHING",
            )
            .bind(PTYPE_POLICY)
            .bind(&rule.subject)
            .bind(&rule.object)
            .bind(&rule.action)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                loaded += 1;
            } else {
                tracing::info!(subject = %rule.subject, object = %rule.object, action = %rule.action, "policy already exists");
            }
        }

        tx.commit().await?;
        Ok(loaded)
    }
}
