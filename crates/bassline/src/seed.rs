//! Demo data for `--seed-demo`.
//!
//! Besides signing in through `/login/`, each demo user is reachable with a
//! fixed `login` cookie equal to their username.

use bassline_session::{Fields, MemoryStore, ResourceKey, ResourceKind, StoreDirectory};
use serde_json::{json, Value};

use crate::resources::{EDIT_SECURITY, EDIT_THEMES};

struct DemoUser {
    id: i64,
    username: &'static str,
    superuser: bool,
    groups: &'static [i64],
}

const ADMIN_GROUP: i64 = 1;
const DESIGN_GROUP: i64 = 2;

const USERS: &[DemoUser] = &[
    DemoUser {
        id: 1,
        username: "admin",
        superuser: true,
        groups: &[ADMIN_GROUP],
    },
    DemoUser {
        id: 2,
        username: "designer",
        superuser: false,
        groups: &[DESIGN_GROUP],
    },
    DemoUser {
        id: 3,
        username: "auditor",
        superuser: false,
        groups: &[],
    },
];

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Seeds users, groups, a palette, two themes and the auth config.
pub fn seed_demo(store: &MemoryStore, directory: &StoreDirectory) {
    store.insert(
        ResourceKey::new(ResourceKind::Group, ADMIN_GROUP),
        fields(json!({ "groupname": "admins", "capabilities": [EDIT_THEMES, EDIT_SECURITY] })),
    );
    store.insert(
        ResourceKey::new(ResourceKind::Group, DESIGN_GROUP),
        fields(json!({ "groupname": "designers", "capabilities": [EDIT_THEMES] })),
    );

    for user in USERS {
        store.insert(
            ResourceKey::new(ResourceKind::User, user.id),
            fields(json!({
                "username": user.username,
                "isSuperuser": user.superuser,
                "groups": user.groups,
                "primaryGroup": user.groups.first(),
            })),
        );
        directory.add_login(user.username, user.id);
    }

    store.insert(
        ResourceKey::new(ResourceKind::Palette, 1),
        fields(json!({ "name": "Default" })),
    );
    store.insert(
        ResourceKey::new(ResourceKind::Theme, 1),
        fields(json!({ "name": "Light", "isDark": false, "palette": 1 })),
    );
    store.insert(
        ResourceKey::new(ResourceKind::Theme, 2),
        fields(json!({ "name": "Dark", "isDark": true, "palette": 1 })),
    );
    store.insert(
        ResourceKey::auth_config(),
        fields(json!({ "noauthEnabled": true, "googleEnabled": false, "googleClientId": "" })),
    );

    tracing::info!(users = USERS.len(), "seeded demo data");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::resources::{AUTH_CONFIG, GROUP, THEME, USER};
    use bassline_core::SiteConfig;
    use bassline_session::UserDirectory;

    #[tokio::test]
    async fn test_seed_is_consistent() {
        let store = Arc::new(MemoryStore::new());
        let directory = StoreDirectory::new(store.clone());
        seed_demo(&store, &directory);

        let designer = directory.resolve_login("designer").await.unwrap();
        assert!(designer.can(EDIT_THEMES));
        assert!(!designer.can(EDIT_SECURITY));
        assert!(directory.resolve_login("admin").await.unwrap().is_superuser);
        assert!(directory.resolve_login("auditor").await.unwrap().capabilities.is_empty());

        // seeded rows pass their own validation
        let site = SiteConfig::default();
        let admin = store.peek(ResourceKey::new(ResourceKind::User, 1)).unwrap();
        assert!(USER.apply(&site, &admin, &admin).is_ok());
        let admins = store.peek(ResourceKey::new(ResourceKind::Group, 1)).unwrap();
        assert!(GROUP.apply(&site, &admins, &admins).is_ok());
        let light = store.peek(ResourceKey::new(ResourceKind::Theme, 1)).unwrap();
        assert!(THEME.apply(&site, &light, &light).is_ok());
        let auth = store.peek(ResourceKey::auth_config()).unwrap();
        assert!(AUTH_CONFIG.apply(&site, &auth, &auth).is_ok());
    }
}
