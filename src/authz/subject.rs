use std::fmt;

pub const ROLE_PREFIX: &str = "role:";

/// Actor evaluated in a permission check.
///
/// Rendered to its string key only when it crosses into a policy store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A user acting inside one organization (role-based checks)
    UserInOrg { user: String, org: String },
    /// A user independent of any organization (ownership checks)
    User { user: String },
    /// A built-in role that permission policies hang off
    Role { name: String },
}

impl Subject {
    pub fn user_in_org(user: impl Into<String>, org: impl Into<String>) -> Self {
        Subject::UserInOrg { user: user.into(), org: org.into() }
    }

    pub fn user(user: impl Into<String>) -> Self {
        Subject::User { user: user.into() }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Subject::Role { name: name.into() }
    }

    /// Storage key for this subject
    pub fn key(&self) -> String {
        match self {
            Subject::UserInOrg { user, org } => format!("user:{}:org:{}", escape(user), escape(org)),
            Subject::User { user } => format!("user:{}", escape(user)),
            Subject::Role { name } => format!("{}{}", ROLE_PREFIX, escape(name)),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Strip the `role:` prefix from a stored grouping target for display.
/// Keys without the prefix are returned as stored.
pub fn role_display_name(key: &str) -> String {
    match key.strip_prefix(ROLE_PREFIX) {
        Some(name) if !name.is_empty() => unescape(name),
        _ => key.to_string(),
    }
}

/// Target of a permission check: a whole resource type or one instance of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Object {
    Type(String),
    Instance { resource_type: String, id: String },
}

impl Object {
    pub fn of_type(resource_type: impl Into<String>) -> Self {
        Object::Type(resource_type.into())
    }

    pub fn instance(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Object::Instance { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn key(&self) -> String {
        match self {
            Object::Type(resource_type) => resource_type.clone(),
            Object::Instance { resource_type, id } => format!("{}:{}", resource_type, escape(id)),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// `%` first so already-escaped sequences stay unambiguous.
fn escape(component: &str) -> String {
    if !component.contains([':', '%']) {
        return component.to_string();
    }
    component.replace('%', "%25").replace(':', "%3A")
}

fn unescape(component: &str) -> String {
    if !component.contains('%') {
        return component.to_string();
    }
    component.replace("%3A", ":").replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ids_use_the_conventional_encoding() {
        assert_eq!(Subject::user_in_org("u1", "o1").key(), "user:u1:org:o1");
        assert_eq!(Subject::user("u1").key(), "user:u1");
        assert_eq!(Subject::role("admin").key(), "role:admin");
        assert_eq!(Object::of_type("Project").key(), "Project");
        assert_eq!(Object::instance("Project", "p1").key(), "Project:p1");
    }

    #[test]
    fn colons_in_ids_cannot_collide() {
        let a = Subject::user_in_org("a", "b:org:c");
        let b = Subject::user_in_org("a:org:b", "c");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), "user:a:org:b%3Aorg%3Ac");
    }

    #[test]
    fn percent_is_escaped_before_colon() {
        let literal = Subject::user("x%3Ay");
        let colon = Subject::user("x:y");
        assert_ne!(literal.key(), colon.key());
        assert_eq!(literal.key(), "user:x%253Ay");
    }

    #[test]
    fn role_display_name_strips_prefix() {
        assert_eq!(role_display_name("role:billing"), "billing");
        assert_eq!(role_display_name("role:a%3Ab"), "a:b");
        assert_eq!(role_display_name("role:"), "role:");
        assert_eq!(role_display_name("legacy"), "legacy");
    }
}
