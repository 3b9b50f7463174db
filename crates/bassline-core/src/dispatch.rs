//! The trampoline dispatcher.
//!
//! Handlers return [`Outcome::Delegate`] instead of calling the next handler,
//! and [`Dispatcher::dispatch`] follows delegations in a loop. Stack depth
//! therefore stays constant however deep the route tree is.

use std::sync::Arc;

use tracing::{debug, error};

use crate::{BasslineError, BasslineResult, Delegation, Handler, Outcome, Reply, RequestContext};

/// Drives a request through a chain of handlers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bassline_core::{Dispatcher, FnHandler, HandlerTable, Outcome, Reply, RequestContext, TableHandler};
///
/// # tokio_test::block_on(async {
/// let leaf = Arc::new(FnHandler::new(|_ctx| async { Ok(Outcome::from(Reply::empty())) }));
/// let root = TableHandler::new(HandlerTable::new().route("hello", leaf));
/// let dispatcher = Dispatcher::new(Arc::new(root));
///
/// let reply = dispatcher.dispatch(RequestContext::mock("/hello")).await.unwrap();
/// assert_eq!(reply.status_code(), http::StatusCode::OK);
/// # });
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    root: Arc<dyn Handler>,
}

impl Dispatcher {
    /// Creates a dispatcher starting at `root`.
    #[must_use]
    pub fn new(root: Arc<dyn Handler>) -> Self {
        Self { root }
    }

    /// Returns the number of delegations allowed for `ctx`.
    #[must_use]
    pub fn delegation_limit(ctx: &RequestContext) -> usize {
        ctx.request_path().count() + ctx.config().max_extra_delegations
    }

    /// Dispatches a request, starting from the root handler with `ctx`.
    ///
    /// A delegation without a path override keeps the current remaining path.
    ///
    /// # Errors
    ///
    /// Returns whatever error a handler returns, or
    /// [`BasslineError::RoutingLoop`] when the chain delegates more than
    /// [`delegation_limit`](Self::delegation_limit) times.
    pub async fn dispatch(&self, ctx: RequestContext) -> BasslineResult<Reply> {
        let limit = Self::delegation_limit(&ctx);
        let mut handler = Arc::clone(&self.root);
        let mut ctx = ctx;
        let mut delegations = 0usize;

        loop {
            debug!(
                request_id = %ctx.request_id(),
                handler = handler.name(),
                path = %ctx.path(),
                "dispatch step"
            );

            match handler.handle(&ctx).await? {
                Outcome::Reply(reply) => {
                    metrics::histogram!("bassline_dispatch_steps").record((delegations + 1) as f64);
                    return Ok(reply);
                }
                Outcome::Delegate(Delegation {
                    handler: next,
                    path_override,
                }) => {
                    delegations += 1;
                    if delegations > limit {
                        error!(
                            request_id = %ctx.request_id(),
                            http.path = %ctx.request_path(),
                            handler = next.name(),
                            limit,
                            "routing loop detected"
                        );
                        return Err(BasslineError::routing_loop(
                            ctx.request_path().path(),
                            limit,
                        ));
                    }

                    if let Some(path) = path_override {
                        ctx = ctx.with_path(path);
                    }
                    handler = next;
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ConsumeSegmentHandler, RecordingHandler, SelfDelegatingHandler};
    use crate::{FnHandler, HandlerTable, SiteConfig, TableHandler};
    use bassline_router::PathComponents;
    use http::StatusCode;

    fn three_level(leaf: Arc<dyn Handler>) -> Dispatcher {
        let table = HandlerTable::new().nest(
            "a",
            HandlerTable::new().nest("b", HandlerTable::new().route("c", leaf)),
        );
        Dispatcher::new(Arc::new(TableHandler::new(table)))
    }

    #[tokio::test]
    async fn test_three_level_table_reaches_leaf() {
        let leaf = Arc::new(RecordingHandler::new());
        let dispatcher = three_level(leaf.clone());

        let reply = dispatcher.dispatch(RequestContext::mock("/a/b/c")).await.unwrap();
        assert_eq!(reply.status_code(), StatusCode::OK);
        assert_eq!(leaf.seen_paths(), vec!["/".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let dispatcher = three_level(Arc::new(RecordingHandler::new()));
        let err = dispatcher
            .dispatch(RequestContext::mock("/a/x/c"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_three_level_table_on_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let leaf = Arc::new(RecordingHandler::new());
                    let dispatcher = three_level(leaf.clone());
                    dispatcher
                        .dispatch(RequestContext::mock("/a/b/c/"))
                        .await
                        .unwrap();
                    leaf.calls()
                })
            })
            .unwrap();

        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_long_delegation_chain_on_small_stack() {
        // One delegation per segment; a recursive dispatcher would need a
        // frame per step.
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                runtime.block_on(async {
                    let path = "/x".repeat(300);
                    Dispatcher::new(Arc::new(ConsumeSegmentHandler))
                        .dispatch(RequestContext::mock(&path))
                        .await
                        .map(|reply| reply.status_code())
                })
            })
            .unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_self_delegation_trips_routing_loop() {
        let dispatcher = Dispatcher::new(Arc::new(SelfDelegatingHandler));
        let ctx = RequestContext::mock("/a/b");
        let limit = Dispatcher::delegation_limit(&ctx);
        assert_eq!(limit, 2 + SiteConfig::DEFAULT_MAX_EXTRA_DELEGATIONS);

        let err = dispatcher.dispatch(ctx).await.unwrap_err();
        match err {
            BasslineError::RoutingLoop { path, limit: l } => {
                assert_eq!(path, "/a/b");
                assert_eq!(l, limit);
            }
            other => panic!("expected RoutingLoop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delegation_without_override_keeps_path() {
        let leaf = Arc::new(RecordingHandler::new());
        let forward_to = leaf.clone();
        let forward: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_ctx: RequestContext| {
            let next: Arc<dyn Handler> = forward_to.clone();
            async move { Ok(Outcome::from(Delegation::to(next))) }
        }));
        let table = HandlerTable::new().route("site", forward);
        let dispatcher = Dispatcher::new(Arc::new(TableHandler::new(table)));

        dispatcher
            .dispatch(RequestContext::mock("/site/admin"))
            .await
            .unwrap();
        assert_eq!(leaf.seen_paths(), vec!["/admin".to_string()]);
    }

    #[tokio::test]
    async fn test_path_override_replaces_remaining_path() {
        let leaf = Arc::new(RecordingHandler::new());
        let forward_to = leaf.clone();
        let rewrite: Arc<dyn Handler> = Arc::new(FnHandler::new(move |_ctx: RequestContext| {
            let next: Arc<dyn Handler> = forward_to.clone();
            async move {
                Ok(Outcome::from(Delegation::with_path(
                    next,
                    PathComponents::parse("/login"),
                )))
            }
        }));

        Dispatcher::new(rewrite)
            .dispatch(RequestContext::mock("/anything/else"))
            .await
            .unwrap();
        assert_eq!(leaf.seen_paths(), vec!["/login".to_string()]);
    }
}
