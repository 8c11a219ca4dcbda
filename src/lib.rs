pub mod authz;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod models;

// Re-export commonly used items for callers and tests
pub use authz::{Action, MemoryPolicyStore, PolicyStore, Rbac, ResourceType, Role, SqlitePolicyStore};
pub use config::Settings;
pub use errors::{AuthzError, AuthzResult};
pub use models::policy::Mutation;
