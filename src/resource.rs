//! Resource kinds managed by the console and their descriptors
//!
//! A [`ResourceDescriptor`] is everything the generic controllers need to know
//! about one resource kind: where it lives on the backend, which field
//! identifies an entity to a human operator, and how long its data stays fresh.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::StaleTime;

/// A resource as it travels over the wire: a JSON object.
pub type Record = Map<String, Value>;

/// Every resource kind the console manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Users,
    Notifications,
    Subscribers,
    TeamMembers,
    Services,
    Partners,
    Contacts,
    Tags,
    Sliders,
    Portfolios,
    Settings,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Users,
        ResourceKind::Notifications,
        ResourceKind::Subscribers,
        ResourceKind::TeamMembers,
        ResourceKind::Services,
        ResourceKind::Partners,
        ResourceKind::Contacts,
        ResourceKind::Tags,
        ResourceKind::Sliders,
        ResourceKind::Portfolios,
        ResourceKind::Settings,
    ];

    /// Name used in cache keys and log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Notifications => "notifications",
            ResourceKind::Subscribers => "subscribers",
            ResourceKind::TeamMembers => "team-members",
            ResourceKind::Services => "services",
            ResourceKind::Partners => "partners",
            ResourceKind::Contacts => "contacts",
            ResourceKind::Tags => "tags",
            ResourceKind::Sliders => "sliders",
            ResourceKind::Portfolios => "portfolios",
            ResourceKind::Settings => "settings",
        }
    }

    /// Default descriptor for this kind.
    pub fn descriptor(&self) -> ResourceDescriptor {
        let (path, identity_field, columns, required_fields): (
            &'static str,
            &'static str,
            &'static [&'static str],
            &'static [&'static str],
        ) = match self {
            ResourceKind::Users => (
                "/users",
                "email",
                &["id", "email", "firstName", "lastName", "role"],
                &["email", "firstName", "lastName"],
            ),
            ResourceKind::Notifications => (
                "/notifications",
                "title",
                &["id", "title", "createdAt"],
                &["title", "body"],
            ),
            ResourceKind::Subscribers => (
                "/subscribers",
                "email",
                &["id", "email", "createdAt"],
                &["email"],
            ),
            ResourceKind::TeamMembers => (
                "/team-members",
                "name",
                &["id", "name", "position"],
                &["name", "position"],
            ),
            ResourceKind::Services => (
                "/services",
                "title",
                &["id", "title", "description"],
                &["title"],
            ),
            ResourceKind::Partners => (
                "/partners",
                "name",
                &["id", "name", "website"],
                &["name"],
            ),
            ResourceKind::Contacts => (
                "/contacts",
                "email",
                &["id", "name", "email", "subject"],
                &["name", "email", "message"],
            ),
            ResourceKind::Tags => ("/tags", "name", &["id", "name"], &["name"]),
            ResourceKind::Sliders => (
                "/sliders",
                "title",
                &["id", "title", "position"],
                &["title"],
            ),
            ResourceKind::Portfolios => (
                "/portfolios",
                "title",
                &["id", "title", "client"],
                &["title"],
            ),
            ResourceKind::Settings => ("/settings", "key", &["id", "key", "value"], &["key"]),
        };

        let stale_time = match self {
            ResourceKind::Settings => StaleTime::SETTINGS,
            ResourceKind::Notifications | ResourceKind::Contacts | ResourceKind::Subscribers => {
                StaleTime::INBOX
            }
            _ => StaleTime::DEFAULT,
        };

        ResourceDescriptor {
            kind: *self,
            path,
            identity_field,
            columns,
            required_fields,
            stale_time,
            reset_page_on_sort: false,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Static description of one resource kind, shared by every controller
/// instantiated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    /// Collection path relative to the API base URL
    pub path: &'static str,
    /// Field the operator must retype to confirm a destructive action
    pub identity_field: &'static str,
    /// Fields shown in table output, in order
    pub columns: &'static [&'static str],
    /// Fields a create payload must carry
    pub required_fields: &'static [&'static str],
    /// Age after which a Ready cache entry is treated as stale
    pub stale_time: Duration,
    /// Whether changing sort jumps back to the first page
    pub reset_page_on_sort: bool,
}

impl ResourceDescriptor {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_reset_page_on_sort(mut self, reset: bool) -> Self {
        self.reset_page_on_sort = reset;
        self
    }

    /// Path of a single entity.
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, id)
    }

    /// The text an operator must type to confirm deleting `record`.
    ///
    /// Falls back to the id when the identity field is absent.
    pub fn identity_text(&self, record: &Record) -> Option<String> {
        record
            .get(self.identity_field)
            .and_then(value_to_text)
            .or_else(|| record_id(record))
    }
}

/// Extract the `id` of a record, accepting numeric or string ids.
pub fn record_id(record: &Record) -> Option<String> {
    record.get("id").and_then(value_to_text)
}

/// Render a scalar JSON value as display text.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_type_names_are_unique() {
        let mut names: Vec<_> = ResourceKind::ALL.iter().map(|k| k.type_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn test_descriptor_paths() {
        assert_eq!(ResourceKind::TeamMembers.descriptor().path, "/team-members");
        assert_eq!(ResourceKind::Users.descriptor().item_path("7"), "/users/7");
    }

    #[test]
    fn test_identity_text_uses_identity_field() {
        let users = ResourceKind::Users.descriptor();
        let r = record(json!({"id": 7, "email": "a@b.com"}));
        assert_eq!(users.identity_text(&r), Some("a@b.com".to_string()));
    }

    #[test]
    fn test_identity_text_falls_back_to_id() {
        let tags = ResourceKind::Tags.descriptor();
        let r = record(json!({"id": 12}));
        assert_eq!(tags.identity_text(&r), Some("12".to_string()));
    }

    #[test]
    fn test_record_id_accepts_strings_and_numbers() {
        assert_eq!(record_id(&record(json!({"id": "abc"}))), Some("abc".to_string()));
        assert_eq!(record_id(&record(json!({"id": 3}))), Some("3".to_string()));
        assert_eq!(record_id(&record(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_settings_stay_fresh_longer() {
        let settings = ResourceKind::Settings.descriptor();
        let tags = ResourceKind::Tags.descriptor();
        assert!(settings.stale_time > tags.stale_time);
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ResourceKind::TeamMembers).unwrap();
        assert_eq!(json, "\"team-members\"");
    }
}
