//! Resource identity and stored records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Field map of a stored resource.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// The kinds of editable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A color theme.
    Theme,
    /// A color palette.
    Palette,
    /// A security group.
    Group,
    /// A user account.
    User,
    /// The authentication configuration (a singleton).
    AuthConfig,
}

impl ResourceKind {
    /// Every kind, in display order.
    pub const ALL: [Self; 5] = [
        Self::Theme,
        Self::Palette,
        Self::Group,
        Self::User,
        Self::AuthConfig,
    ];

    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Palette => "palette",
            Self::Group => "group",
            Self::User => "user",
            Self::AuthConfig => "auth_config",
        }
    }

    /// Returns the noun used in conflict messages.
    #[must_use]
    pub const fn noun(&self) -> &'static str {
        match self {
            Self::AuthConfig => "configuration",
            other => other.as_str(),
        }
    }

    /// Returns `true` for kinds with exactly one record.
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        matches!(self, Self::AuthConfig)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// Identifies one stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// The resource kind.
    pub kind: ResourceKind,
    /// Row id within the kind.
    pub id: i64,
}

impl ResourceKey {
    /// Id of the singleton authentication configuration.
    pub const SINGLETON_ID: i64 = 0;

    /// Creates a key.
    #[must_use]
    pub const fn new(kind: ResourceKind, id: i64) -> Self {
        Self { kind, id }
    }

    /// The key of the authentication configuration.
    #[must_use]
    pub const fn auth_config() -> Self {
        Self::new(ResourceKind::AuthConfig, Self::SINGLETON_ID)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// A stored resource with its encoded save token.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// The resource key.
    pub key: ResourceKey,
    /// Resource fields.
    pub fields: Fields,
    /// Encoded save token, if the resource was ever opened for editing.
    pub save_token: Option<String>,
}

impl ResourceRecord {
    /// Returns the fields as a JSON object that includes the id.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), self.key.id.into());
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("widget".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_only_auth_config_is_singleton() {
        let singletons: Vec<_> = ResourceKind::ALL
            .into_iter()
            .filter(ResourceKind::is_singleton)
            .collect();
        assert_eq!(singletons, vec![ResourceKind::AuthConfig]);
        assert_eq!(ResourceKey::auth_config().id, 0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ResourceKey::new(ResourceKind::Theme, 3).to_string(), "theme#3");
    }

    #[test]
    fn test_record_json_includes_id() {
        let mut fields = Fields::new();
        fields.insert("name".into(), "Dark".into());
        let record = ResourceRecord {
            key: ResourceKey::new(ResourceKind::Theme, 9),
            fields,
            save_token: Some("{}".into()),
        };
        let json = record.to_json();
        assert_eq!(json["id"], 9);
        assert_eq!(json["name"], "Dark");
        assert!(json.get("save_token").is_none());
    }
}
