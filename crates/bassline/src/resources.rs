//! Field schemas for the five editable resources.
//!
//! A save carries a JSON object of changed fields. Each [`ResourceSchema`]
//! lists the fields its resource accepts and how to check them; anything
//! else in the change set is rejected.

use std::sync::OnceLock;

use bassline_core::{BasslineResult, FieldErrors, SiteConfig};
use bassline_session::{Fields, ResourceKind};
use regex::Regex;
use serde_json::{json, Value};

/// Capability required by the theme and palette editors.
pub const EDIT_THEMES: &str = "edit_themes";

/// Capability required by the group, user and auth config editors.
pub const EDIT_SECURITY: &str = "edit_security";

/// Shell capabilities a group may grant.
pub const CAPABILITIES: &[&str] = &[EDIT_THEMES, EDIT_SECURITY];

/// Returns `true` if a group may grant `capability`: a shell capability, or
/// `app.capability` for a capability a mounted app defines.
#[must_use]
pub fn is_grantable(site: &SiteConfig, capability: &str) -> bool {
    match capability.split_once('.') {
        None => CAPABILITIES.contains(&capability),
        Some((app, name)) => site
            .app(app)
            .is_some_and(|app| app.capabilities.iter().any(|c| c == name)),
    }
}

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 128;

fn display_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9 ]+$").expect("valid regex"))
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid regex"))
}

/// How one field is checked.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule {
    /// A string matching a pattern, optionally length-capped.
    Name {
        /// The pattern.
        pattern: fn() -> &'static Regex,
        /// Human-readable form of the pattern.
        allowed: &'static str,
        /// Maximum length in characters.
        max_len: Option<usize>,
    },
    /// Any string.
    Text,
    /// A boolean.
    Bool,
    /// A row id, or null.
    Id,
    /// A list of row ids.
    IdList,
    /// A list of capabilities a group may grant.
    Capabilities,
    /// Present in the record but never changed by a save.
    ReadOnly,
}

impl FieldRule {
    fn check(&self, site: &SiteConfig, value: &Value, current: Option<&Value>) -> Result<(), String> {
        match self {
            Self::Name {
                pattern,
                allowed,
                max_len,
            } => {
                let s = value.as_str().ok_or("must be a string")?;
                if let Some(max) = max_len {
                    if s.chars().count() > *max {
                        return Err(format!("must be at most {max} characters"));
                    }
                }
                if pattern().is_match(s) {
                    Ok(())
                } else {
                    Err(format!("may only contain {allowed}"))
                }
            }
            Self::Text => value.as_str().map(drop).ok_or_else(|| "must be a string".into()),
            Self::Bool => value.as_bool().map(drop).ok_or_else(|| "must be a boolean".into()),
            Self::Id => {
                if value.is_null() || value.as_i64().is_some() {
                    Ok(())
                } else {
                    Err("must be an id".into())
                }
            }
            Self::IdList => match value.as_array() {
                Some(items) if items.iter().all(|v| v.as_i64().is_some()) => Ok(()),
                _ => Err("must be a list of ids".into()),
            },
            Self::Capabilities => {
                let items = value.as_array().ok_or("must be a list")?;
                for item in items {
                    match item.as_str() {
                        Some(s) if is_grantable(site, s) => {}
                        _ => return Err(format!("unknown entry {item}")),
                    }
                }
                Ok(())
            }
            Self::ReadOnly => {
                if current == Some(value) {
                    Ok(())
                } else {
                    Err("cannot be changed".into())
                }
            }
        }
    }
}

/// One accepted field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// JSON key.
    pub name: &'static str,
    /// How values are checked.
    pub rule: FieldRule,
    /// Shown in the `select` listing.
    pub summary: bool,
}

const fn field(name: &'static str, rule: FieldRule, summary: bool) -> FieldSpec {
    FieldSpec {
        name,
        rule,
        summary,
    }
}

/// Describes one resource kind for the generic editor.
pub struct ResourceSchema {
    /// The kind being edited.
    pub kind: ResourceKind,
    /// Capability the caller must hold.
    pub capability: &'static str,
    /// Accepted fields.
    pub fields: &'static [FieldSpec],
    initial: fn() -> Fields,
    cross_check: Option<fn(&Fields, &mut FieldErrors)>,
}

impl std::fmt::Debug for ResourceSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSchema")
            .field("kind", &self.kind)
            .field("capability", &self.capability)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl ResourceSchema {
    /// Fields of a freshly created resource.
    #[must_use]
    pub fn initial_fields(&self) -> Fields {
        (self.initial)()
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Projects `fields` onto the summary fields.
    #[must_use]
    pub fn summarize(&self, fields: &Fields) -> Fields {
        self.fields
            .iter()
            .filter(|f| f.summary)
            .filter_map(|f| fields.get(f.name).map(|v| (f.name.to_string(), v.clone())))
            .collect()
    }

    /// Applies `changes` to `current`.
    ///
    /// Every failing field is reported; nothing is applied unless all pass.
    /// `site` lists the mounted apps whose capabilities groups may grant.
    pub fn apply(&self, site: &SiteConfig, current: &Fields, changes: &Fields) -> BasslineResult<Fields> {
        let mut errors = FieldErrors::new();
        let mut next = current.clone();

        for (name, value) in changes {
            let Some(spec) = self.field(name) else {
                errors.add(name.as_str(), "unknown field");
                continue;
            };
            match spec.rule.check(site, value, current.get(name)) {
                Ok(()) => {
                    next.insert(name.clone(), value.clone());
                }
                Err(message) => errors.add(name.as_str(), message),
            }
        }

        if errors.is_empty() {
            if let Some(check) = self.cross_check {
                check(&next, &mut errors);
            }
        }
        errors.into_result(format!("invalid {} changes", self.kind.noun()))?;
        Ok(next)
    }
}

const DISPLAY_NAME: FieldRule = FieldRule::Name {
    pattern: display_name_pattern,
    allowed: "letters, digits and spaces",
    max_len: None,
};

fn object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Color themes.
pub static THEME: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Theme,
    capability: EDIT_THEMES,
    fields: &[
        field("name", DISPLAY_NAME, true),
        field("isDark", FieldRule::Bool, true),
        field("palette", FieldRule::Id, false),
    ],
    initial: || object(json!({ "name": "New Theme", "isDark": false, "palette": null })),
    cross_check: None,
};

/// Color palettes.
pub static PALETTE: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Palette,
    capability: EDIT_THEMES,
    fields: &[field("name", DISPLAY_NAME, true)],
    initial: || object(json!({ "name": "New Palette" })),
    cross_check: None,
};

/// Security groups.
pub static GROUP: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Group,
    capability: EDIT_SECURITY,
    fields: &[
        field(
            "groupname",
            FieldRule::Name {
                pattern: identifier_pattern,
                allowed: "letters, digits and underscores",
                max_len: None,
            },
            true,
        ),
        field("capabilities", FieldRule::Capabilities, false),
    ],
    initial: || object(json!({ "groupname": "new_group", "capabilities": [] })),
    cross_check: None,
};

/// User accounts.
pub static USER: ResourceSchema = ResourceSchema {
    kind: ResourceKind::User,
    capability: EDIT_SECURITY,
    fields: &[
        field(
            "username",
            FieldRule::Name {
                pattern: identifier_pattern,
                allowed: "letters, digits and underscores",
                max_len: Some(MAX_USERNAME_LEN),
            },
            true,
        ),
        field("isSuperuser", FieldRule::ReadOnly, true),
        field("groups", FieldRule::IdList, false),
        field("primaryGroup", FieldRule::Id, false),
    ],
    initial: || {
        object(json!({
            "username": "new_user",
            "isSuperuser": false,
            "groups": [],
            "primaryGroup": null
        }))
    },
    cross_check: Some(check_primary_group),
};

fn check_primary_group(fields: &Fields, errors: &mut FieldErrors) {
    let Some(primary) = fields.get("primaryGroup").and_then(Value::as_i64) else {
        return;
    };
    let member = fields
        .get("groups")
        .and_then(Value::as_array)
        .is_some_and(|groups| groups.iter().any(|g| g.as_i64() == Some(primary)));
    if !member {
        errors.add("primaryGroup", "must be one of the user's groups");
    }
}

/// The authentication configuration singleton.
pub static AUTH_CONFIG: ResourceSchema = ResourceSchema {
    kind: ResourceKind::AuthConfig,
    capability: EDIT_SECURITY,
    fields: &[
        field("noauthEnabled", FieldRule::Bool, false),
        field("googleEnabled", FieldRule::Bool, false),
        field("googleClientId", FieldRule::Text, false),
    ],
    initial: Fields::new,
    cross_check: None,
};
