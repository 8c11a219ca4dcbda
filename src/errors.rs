pub type AuthzResult<T> = Result<T, AuthzError>;

#[derive(thiserror::Error, Debug)]
pub enum AuthzError {
    #[error("storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable tag, used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthzError::Storage(_) => "storage",
            AuthzError::Migration(_) => "migration",
            AuthzError::Bootstrap(_) => "bootstrap",
            AuthzError::Configuration(_) => "configuration",
            AuthzError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AuthzError::bootstrap("x").kind(), "bootstrap");
        assert_eq!(AuthzError::configuration("x").kind(), "configuration");
        assert_eq!(AuthzError::internal("x").kind(), "internal");
        assert_eq!(AuthzError::from(sqlx::Error::PoolClosed).kind(), "storage");
    }

    #[test]
    fn display_includes_cause() {
        let err = AuthzError::bootstrap("catalog insert failed");
        assert_eq!(err.to_string(), "bootstrap failed: catalog insert failed");
    }
}
