//! The generic resource editor.
//!
//! One [`EditorHandler`] serves every admin editor. The segment after the
//! editor's mount point names the action (`select` by default, `edit` for
//! the singleton auth config); an `action` query parameter overrides it.
//!
//! | Action   | Method | Input                                | Reply                        |
//! |----------|--------|--------------------------------------|------------------------------|
//! | `select` | any    |                                      | `{"items": [...]}`           |
//! | `create` | POST   |                                      | `303` to `edit?id=N`         |
//! | `edit`   | any    | `?id=N`                              | `{"resource", "saveKey"}`    |
//! | `save`   | POST   | `{"id", "saveKey", "changes"}` JSON  | `{"newSaveKey"}`             |
//!
//! `edit` and `save` run inside an [`EditSession`]; a held reservation comes
//! back as a `409` naming the holder.

use async_trait::async_trait;
use bassline_core::{
    BasslineError, BasslineResult, Handler, Outcome, PathComponents, Reply, RequestContext, UserId,
};
use bassline_session::{EditSession, Fields, ResourceKey};
use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::resources::ResourceSchema;

#[derive(Debug, Default, Deserialize)]
struct EditorQuery {
    action: Option<String>,
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SaveRequest {
    #[serde(default)]
    id: Option<i64>,
    save_key: String,
    #[serde(default)]
    changes: Fields,
}

/// Serves one resource kind's editor.
#[derive(Clone)]
pub struct EditorHandler {
    schema: &'static ResourceSchema,
    session: EditSession,
}

impl EditorHandler {
    /// Creates an editor for `schema` backed by `session`.
    #[must_use]
    pub fn new(schema: &'static ResourceSchema, session: EditSession) -> Self {
        Self { schema, session }
    }

    /// The schema this editor serves.
    #[must_use]
    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    fn is_singleton(&self) -> bool {
        self.schema.kind.is_singleton()
    }

    fn default_action(&self) -> &'static str {
        if self.is_singleton() {
            "edit"
        } else {
            "select"
        }
    }

    fn key(&self, id: Option<i64>) -> BasslineResult<ResourceKey> {
        if self.is_singleton() {
            return Ok(ResourceKey::new(self.schema.kind, ResourceKey::SINGLETON_ID));
        }
        id.map(|id| ResourceKey::new(self.schema.kind, id))
            .ok_or_else(|| BasslineError::validation("missing id"))
    }

    async fn select(&self) -> BasslineResult<Reply> {
        let records = self.session.store().list(self.schema.kind).await?;
        let items: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                let mut item = self.schema.summarize(&record.fields);
                item.insert("id".to_string(), record.key.id.into());
                serde_json::Value::Object(item)
            })
            .collect();
        debug!(resource = self.schema.kind.as_str(), count = items.len(), "listed resources");
        Reply::json(&json!({ "items": items }))
    }

    async fn create(&self, ctx: &RequestContext) -> BasslineResult<Reply> {
        let key = self
            .session
            .store()
            .create(self.schema.kind, self.schema.initial_fields())
            .await?;
        info!(request_id = %ctx.request_id(), resource = %key, "created resource");

        let location = format!("{}?id={}", mount_path(ctx).join("edit"), key.id);
        Reply::redirect(StatusCode::SEE_OTHER, &location)
    }

    async fn edit(&self, user: UserId, id: Option<i64>) -> BasslineResult<Reply> {
        let key = self.key(id)?;
        let (save_key, record) = self.session.open(key, user).await?.into_result()?;
        Reply::json(&json!({
            "resource": record.to_json(),
            "saveKey": save_key,
        }))
    }

    async fn save(&self, ctx: &RequestContext, user: UserId) -> BasslineResult<Reply> {
        let request: SaveRequest = ctx.request().json_body()?;
        let key = self.key(request.id)?;
        let schema = self.schema;
        let changes = &request.changes;
        let site = ctx.config();

        let (new_key, _) = self
            .session
            .save(key, user, &request.save_key, |current| schema.apply(site, current, changes))
            .await?
            .into_result()?;
        info!(
            request_id = %ctx.request_id(),
            resource = %key,
            fields = changes.len(),
            "saved resource"
        );
        Reply::json(&json!({ "newSaveKey": new_key }))
    }
}

impl std::fmt::Debug for EditorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHandler")
            .field("kind", &self.schema.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Handler for EditorHandler {
    async fn handle(&self, ctx: &RequestContext) -> BasslineResult<Outcome> {
        let user = ctx.require_capability(self.schema.capability)?;

        let path = ctx.path();
        if path.count() > 1 {
            return Err(BasslineError::not_found(format!(
                "no route for '{}'",
                ctx.request_path()
            )));
        }

        let query: EditorQuery = ctx.request().query_params()?;
        let action = query
            .action
            .filter(|a| !a.is_empty())
            .map(|a| a.to_lowercase())
            .or_else(|| path.first().map(str::to_string))
            .unwrap_or_else(|| self.default_action().to_string());

        let reply = match action.as_str() {
            "select" if !self.is_singleton() => self.select().await?,
            "create" if !self.is_singleton() => {
                require_post(ctx, &action)?;
                self.create(ctx).await?
            }
            "edit" => self.edit(user.id, query.id).await?,
            "save" => {
                require_post(ctx, &action)?;
                self.save(ctx, user.id).await?
            }
            other => {
                return Err(BasslineError::not_found(format!(
                    "unknown {} action '{other}'",
                    self.schema.kind
                )))
            }
        };
        Ok(reply.into())
    }

    fn name(&self) -> &'static str {
        "editor"
    }
}

pub(crate) fn require_post(ctx: &RequestContext, action: &str) -> BasslineResult<()> {
    if ctx.method() == Method::POST {
        Ok(())
    } else {
        Err(BasslineError::validation(format!("'{action}' requires POST")))
    }
}

/// The request path up to the editor's mount point.
fn mount_path(ctx: &RequestContext) -> PathComponents {
    (0..ctx.path().count()).fold(ctx.request_path().clone(), |path, _| path.parent())
}
