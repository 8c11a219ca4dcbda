use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::errors::{AuthzError, AuthzResult};
use crate::models::policy::DbPolicyRow;

pub fn parse_datetime(s: &str) -> AuthzResult<DateTime<Utc>> {
    let s = s.trim();

    // RFC3339, as written by sqlx for chrono values
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // sqlx's own chrono encoding and SQLite's CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS[.f][+00:00]"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(AuthzError::internal(format!("invalid datetime: {}", s)))
}

pub fn db_policy_row_from_row(row: &SqliteRow) -> AuthzResult<DbPolicyRow> {
    let id: i64 = row.try_get("id").map_err(|e| AuthzError::internal(format!("missing id: {}", e)))?;
    let ptype: String = row.try_get("ptype").map_err(|e| AuthzError::internal(format!("missing ptype: {}", e)))?;
    let v0: String = row.try_get("v0").map_err(|e| AuthzError::internal(format!("missing v0: {}", e)))?;
    let v1: String = row.try_get("v1").map_err(|e| AuthzError::internal(format!("missing v1: {}", e)))?;
    let v2: String = row.try_get("v2").map_err(|e| AuthzError::internal(format!("missing v2: {}", e)))?;
    let created_at_s: String = row
        .try_get("created_at")
        .map_err(|e| AuthzError::internal(format!("missing created_at: {}", e)))?;

    Ok(DbPolicyRow {
        id,
        ptype,
        v0,
        v1,
        v2,
        created_at: parse_datetime(&created_at_s)?,
    })
}
