//! App mounts.
//!
//! The first path segment selects a mounted app; the shell takes every
//! other path. A mounted app sees the path below its segment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bassline_router::PathComponents;

use crate::{Handler, SHELL_APP};

/// The app chosen for a request.
pub struct Selection<'a> {
    /// Key of the selected app.
    pub app_key: &'a str,
    /// Root handler of the app.
    pub handler: Arc<dyn Handler>,
    /// Path the app starts dispatching from.
    pub path: PathComponents,
}

/// Root handlers by app key.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use bassline_core::{AppMounts, NotFoundHandler, PathComponents, SHELL_APP};
///
/// let mounts = AppMounts::new(Arc::new(NotFoundHandler)).mount("blog", Arc::new(NotFoundHandler));
///
/// let blog = mounts.select(&PathComponents::parse("/blog/posts/"));
/// assert_eq!(blog.app_key, "blog");
/// assert_eq!(blog.path.path(), "/posts");
///
/// let shell = mounts.select(&PathComponents::parse("/site/admin"));
/// assert_eq!(shell.app_key, SHELL_APP);
/// assert_eq!(shell.path.path(), "/site/admin");
/// ```
#[derive(Clone)]
pub struct AppMounts {
    shell: Arc<dyn Handler>,
    apps: HashMap<String, Arc<dyn Handler>>,
}

impl AppMounts {
    /// Creates mounts where `shell` serves every path.
    #[must_use]
    pub fn new(shell: Arc<dyn Handler>) -> Self {
        Self {
            shell,
            apps: HashMap::new(),
        }
    }

    /// Mounts `handler` under `/<key>/`.
    #[must_use]
    pub fn mount(mut self, key: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.apps.insert(key.into(), handler);
        self
    }

    /// Returns `true` if an app is mounted under `key`.
    #[must_use]
    pub fn is_mounted(&self, key: &str) -> bool {
        self.apps.contains_key(key)
    }

    /// Chooses the app for `path`.
    #[must_use]
    pub fn select(&self, path: &PathComponents) -> Selection<'_> {
        if let Some((key, handler)) = path
            .first()
            .and_then(|first| self.apps.get_key_value(first))
        {
            return Selection {
                app_key: key,
                handler: Arc::clone(handler),
                path: path.child().unwrap_or_else(PathComponents::root),
            };
        }
        Selection {
            app_key: SHELL_APP,
            handler: Arc::clone(&self.shell),
            path: path.clone(),
        }
    }
}

impl fmt::Debug for AppMounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut apps: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        apps.sort_unstable();
        f.debug_struct("AppMounts")
            .field("shell", &self.shell.name())
            .field("apps", &apps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotFoundHandler;

    fn mounts() -> AppMounts {
        AppMounts::new(Arc::new(NotFoundHandler)).mount("blog", Arc::new(NotFoundHandler))
    }

    #[test]
    fn test_app_root_keeps_directory_flag() {
        let mounts = mounts();
        let selection = mounts.select(&PathComponents::parse("/blog/"));
        assert_eq!(selection.app_key, "blog");
        assert!(selection.path.is_root());
        assert!(selection.path.is_dir());
    }

    #[test]
    fn test_segment_match_is_exact() {
        let mounts = mounts();
        assert_eq!(mounts.select(&PathComponents::parse("/blogs/x")).app_key, SHELL_APP);
        assert_eq!(mounts.select(&PathComponents::root()).app_key, SHELL_APP);
        // segments are lower-cased before lookup
        assert_eq!(mounts.select(&PathComponents::parse("/BLOG/x")).app_key, "blog");
        assert!(mounts.is_mounted("blog"));
        assert!(!mounts.is_mounted(SHELL_APP));
    }
}
