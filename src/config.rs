use std::time::Duration;

use crate::errors::AuthzError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Persist policy mutation events to the audit table
    pub audit_enabled: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, AuthzError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthzError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AuthzError::configuration("DATABASE_URL not set"))?;

        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .map(|val| val.trim().parse::<u32>())
            .unwrap_or(Ok(10))
            .map_err(|_| AuthzError::configuration("DB_MAX_CONNECTIONS must be a valid integer"))?;
        if max_connections == 0 {
            return Err(AuthzError::configuration("DB_MAX_CONNECTIONS must be at least 1"));
        }

        let acquire_timeout_secs = lookup("DB_ACQUIRE_TIMEOUT_SECS")
            .map(|val| val.trim().parse::<u64>())
            .unwrap_or(Ok(10))
            .map_err(|_| AuthzError::configuration("DB_ACQUIRE_TIMEOUT_SECS must be a valid integer"))?;

        let audit_enabled = match lookup("AUTHZ_AUDIT")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "" | "on" | "true" | "1" => true,
            "off" | "false" | "0" => false,
            other => {
                return Err(AuthzError::configuration(format!(
                    "AUTHZ_AUDIT must be on or off, got {other}"
                )))
            }
        };

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            audit_enabled,
        })
    }

    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
            audit_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<Settings, AuthzError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    fn assert_configuration_error(result: Result<Settings, AuthzError>, needle: &str) {
        match result {
            Err(AuthzError::Configuration(msg)) => assert!(msg.contains(needle), "unexpected message: {msg}"),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let settings = parse(&[("DATABASE_URL", "sqlite://policy.db")]).unwrap();
        assert_eq!(settings.database_url, "sqlite://policy.db");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(10));
        assert!(settings.audit_enabled);
    }

    #[test]
    fn missing_or_blank_database_url_is_rejected() {
        assert_configuration_error(parse(&[]), "DATABASE_URL");
        assert_configuration_error(parse(&[("DATABASE_URL", "  ")]), "DATABASE_URL");
    }

    #[test]
    fn explicit_values_are_parsed() {
        let settings = parse(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_MAX_CONNECTIONS", "3"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "30"),
            ("AUTHZ_AUDIT", "OFF"),
        ])
        .unwrap();
        assert_eq!(settings.max_connections, 3);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(30));
        assert!(!settings.audit_enabled);
    }

    #[test]
    fn zero_or_invalid_pool_size_is_rejected() {
        assert_configuration_error(
            parse(&[("DATABASE_URL", "sqlite::memory:"), ("DB_MAX_CONNECTIONS", "0")]),
            "at least 1",
        );
        assert_configuration_error(
            parse(&[("DATABASE_URL", "sqlite::memory:"), ("DB_MAX_CONNECTIONS", "many")]),
            "DB_MAX_CONNECTIONS",
        );
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        assert_configuration_error(
            parse(&[("DATABASE_URL", "sqlite::memory:"), ("DB_ACQUIRE_TIMEOUT_SECS", "10s")]),
            "DB_ACQUIRE_TIMEOUT_SECS",
        );
    }

    #[test]
    fn audit_toggle_accepts_only_known_words() {
        for (value, expected) in [("", true), ("on", true), ("true", true), ("1", true), ("off", false), ("false", false), ("0", false)] {
            let settings = parse(&[("DATABASE_URL", "sqlite::memory:"), ("AUTHZ_AUDIT", value)]).unwrap();
            assert_eq!(settings.audit_enabled, expected, "AUTHZ_AUDIT={value}");
        }
        assert_configuration_error(
            parse(&[("DATABASE_URL", "sqlite::memory:"), ("AUTHZ_AUDIT", "maybe")]),
            "AUTHZ_AUDIT",
        );
    }
}
