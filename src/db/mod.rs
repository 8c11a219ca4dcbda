use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::errors::{AuthzError, AuthzResult};

pub mod row_parsers;

pub async fn init(settings: &Settings) -> AuthzResult<SqlitePool> {
	let options = SqliteConnectOptions::from_str(&settings.database_url)
		.map_err(|e| AuthzError::configuration(format!("invalid DATABASE_URL: {e}")))?
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(Duration::from_secs(5));

	let pool = SqlitePoolOptions::new()
		.max_connections(settings.max_connections)
		.min_connections(1)
		.acquire_timeout(settings.acquire_timeout)
		.connect_with(options)
		.await?;

	migrate(&pool).await?;

	Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> AuthzResult<()> {
	sqlx::migrate!().run(pool).await?;
	Ok(())
}
