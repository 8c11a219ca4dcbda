use serde::{Deserialize, Serialize};

/// Severity levels for audit records.
/// Controls retention and filtering of the audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Access-changing events: long-term retention, never auto-delete
    Critical,
    /// Default
    #[default]
    Important,
    /// Bookkeeping such as catalog reloads
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities whose mutations are recorded in the policy audit trail.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. "role" in "role.assigned"
    fn entity_type() -> &'static str;

    /// Storage key of the subject whose access changed
    fn subject_key(&self) -> String;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Removals always revoke access, so they are kept as long as grants.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "removed" => Severity::Critical,
            "assigned" | "loaded" => self.severity(),
            _ => Severity::Important,
        }
    }
}
