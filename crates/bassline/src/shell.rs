//! The shell application's route table, and the index served for mounted
//! apps that bring no handler of their own.

use std::sync::Arc;

use async_trait::async_trait;
use bassline_core::{
    BasslineResult, Handler, HandlerTable, NotFoundHandler, Outcome, Reply, RequestContext,
    TableHandler,
};
use bassline_session::EditSession;
use serde_json::{json, Map, Value};

use crate::editor::EditorHandler;
use crate::login::{LoginAttempt, LoginPage, Logout};
use crate::resources::{ResourceSchema, AUTH_CONFIG, GROUP, PALETTE, THEME, USER};

/// Admin editors by mount segment, in display order.
pub static EDITORS: [(&str, &ResourceSchema); 5] = [
    ("theme", &THEME),
    ("color_palette", &PALETTE),
    ("groups", &GROUP),
    ("users", &USER),
    ("auth_config", &AUTH_CONFIG),
];

/// `/` and `/site/`: the site name and the mounted apps.
#[derive(Debug, Default, Clone, Copy)]
pub struct Landing;

#[async_trait]
impl Handler for Landing {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        let user = ctx.user().map(|u| u.username.as_str());
        let apps: Vec<_> = ctx
            .config()
            .apps
            .iter()
            .map(|app| json!({ "key": app.key, "title": app.title, "path": format!("/{}/", app.key) }))
            .collect();
        Ok(Reply::json(&json!({
            "siteName": ctx.config().site_name,
            "user": user,
            "apps": apps,
        }))?
        .into())
    }
}

/// `/<app>/` for a mounted app without its own handler: the app's title and
/// which of its capabilities the caller holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppIndex;

#[async_trait]
impl Handler for AppIndex {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        let app = match ctx.config().app(ctx.app_key()) {
            Some(app) if ctx.path().is_root() => app,
            _ => return NotFoundHandler.handle(ctx).await,
        };
        let capabilities: Map<String, Value> = app
            .capabilities
            .iter()
            .map(|cap| {
                let held = ctx.user().is_some_and(|user| user.can_in(&app.key, cap));
                (cap.clone(), Value::Bool(held))
            })
            .collect();
        Ok(Reply::json(&json!({
            "app": app.key,
            "title": app.title,
            "capabilities": capabilities,
        }))?
        .into())
    }
}

/// `/site/admin/`: the editors the caller may open.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminIndex;

#[async_trait]
impl Handler for AdminIndex {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        let user = ctx.require_user()?;
        let editors: Vec<_> = EDITORS
            .iter()
            .filter(|(_, schema)| user.can(schema.capability))
            .map(|(segment, schema)| {
                json!({
                    "resource": schema.kind.as_str(),
                    "path": format!("/site/admin/{segment}/"),
                })
            })
            .collect();
        Ok(Reply::json(&json!({ "editors": editors }))?.into())
    }
}

/// Builds the shell route table over `session`.
#[must_use]
pub fn routes(session: &EditSession) -> HandlerTable {
    let admin = EDITORS.iter().fold(
        HandlerTable::new().index(Arc::new(AdminIndex)),
        |table, &(segment, schema)| {
            table.route(
                segment,
                Arc::new(EditorHandler::new(schema, session.clone())),
            )
        },
    );

    let login = HandlerTable::new()
        .index(Arc::new(LoginPage::new(session)))
        .route("attempt", Arc::new(LoginAttempt::new(session)));

    HandlerTable::new()
        .index(Arc::new(Landing))
        .nest("site", HandlerTable::new().index(Arc::new(Landing)).nest("admin", admin))
        .nest("login", login)
        .route("logout", Arc::new(Logout::new(session)))
}

/// The root handler of the shell application.
#[must_use]
pub fn root_handler(session: &EditSession) -> Arc<dyn Handler> {
    Arc::new(TableHandler::new(routes(session)))
}
