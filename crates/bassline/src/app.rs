//! Wiring from [`BasslineConfig`] to a running server.

use std::collections::HashMap;
use std::sync::Arc;

use bassline_config::{BasslineConfig, LogFormat};
use bassline_core::{AppInfo, AppMounts, Clock, Handler, Reservations, SiteConfig, SystemClock};
use bassline_server::{Server, ServerConfig, Transport};
use bassline_session::{EditSession, MemoryStore, StoreDirectory};
use bassline_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

use crate::shell::{self, AppIndex};

/// The assembled application: store, directory, edit sessions and the
/// handlers of mounted apps.
#[derive(Clone)]
pub struct App {
    config: Arc<BasslineConfig>,
    store: Arc<MemoryStore>,
    directory: Arc<StoreDirectory>,
    session: EditSession,
    apps: HashMap<String, Arc<dyn Handler>>,
}

impl App {
    /// Assembles the application with the system clock.
    #[must_use]
    pub fn new(config: BasslineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Assembles the application with `clock` driving the grace window.
    #[must_use]
    pub fn with_clock(config: BasslineConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::with_lock_timeout(
            config.session.lock_timeout(),
            config.session.retry_after_secs,
        ));
        let directory = Arc::new(StoreDirectory::new(store.clone()));
        let reservations = Reservations::new(clock, config.session.grace_seconds);
        let session = EditSession::new(store.clone(), directory.clone(), reservations);

        Self {
            config: Arc::new(config),
            store,
            directory,
            session,
            apps: HashMap::new(),
        }
    }

    /// Serves the configured app `key` with `handler` instead of the
    /// default [`AppIndex`].
    #[must_use]
    pub fn mount(mut self, key: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let key = key.into();
        if !self.config.site.apps.contains_key(&key) {
            tracing::warn!(app = %key, "mounting an app missing from site.apps");
        }
        self.apps.insert(key, handler);
        self
    }

    /// The configuration the application was built from.
    #[must_use]
    pub fn config(&self) -> &BasslineConfig {
        &self.config
    }

    /// The resource store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// The user directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<StoreDirectory> {
        &self.directory
    }

    /// The edit-session runner shared by every editor.
    #[must_use]
    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Site settings handed to every request context.
    #[must_use]
    pub fn site_config(&self) -> SiteConfig {
        SiteConfig {
            site_name: self.config.site.site_name.clone(),
            max_extra_delegations: self.config.routing.max_extra_delegations,
            apps: self
                .config
                .site
                .apps
                .iter()
                .map(|(key, app)| AppInfo {
                    key: key.clone(),
                    title: app.title.clone(),
                    capabilities: app.capabilities.clone(),
                })
                .collect(),
        }
    }

    /// The root of the shell's handler tree.
    #[must_use]
    pub fn root_handler(&self) -> Arc<dyn Handler> {
        shell::root_handler(&self.session)
    }

    /// The shell plus every configured app, keyed by first path segment.
    #[must_use]
    pub fn mounts(&self) -> AppMounts {
        self.config.site.apps.keys().fold(AppMounts::new(self.root_handler()), |mounts, key| {
            let handler = self
                .apps
                .get(key)
                .cloned()
                .unwrap_or_else(|| Arc::new(AppIndex));
            mounts.mount(key.clone(), handler)
        })
    }

    /// Server settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let server = &self.config.server;
        ServerConfig::builder()
            .http_addr(server.http_addr.clone())
            .shutdown_timeout(server.shutdown_timeout())
            .request_timeout(server.request_timeout())
            .max_connections(server.max_connections as usize)
            .max_body_bytes(server.max_body_bytes)
            .build()
    }

    /// The HTTP transport over the mounted apps.
    #[must_use]
    pub fn transport(&self) -> Transport {
        Transport::mounted(self.mounts(), self.directory.clone(), self.site_config())
            .with_limits(&self.server_config())
    }

    /// The HTTP server, not yet bound.
    #[must_use]
    pub fn server(&self) -> Server {
        Server::new(self.server_config(), self.transport())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("site", &self.config.site.site_name)
            .field("apps", &self.config.site.apps.keys().collect::<Vec<_>>())
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Maps the telemetry section onto the telemetry crate's settings.
#[must_use]
pub fn telemetry_config(config: &BasslineConfig) -> TelemetryConfig {
    let telemetry = &config.telemetry;
    TelemetryConfig {
        service_name: telemetry.service_name.clone(),
        logging: LogConfig {
            enabled: telemetry.logging.enabled,
            level: telemetry.logging.level.clone(),
            json_format: telemetry.logging.format == LogFormat::Json,
            ansi: telemetry.logging.ansi_enabled,
            ..LogConfig::default()
        },
        metrics: MetricsConfig {
            enabled: telemetry.metrics.enabled,
            addr: telemetry.metrics.addr.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_site_and_server_settings() {
        let mut config = BasslineConfig::default();
        config.site.site_name = "Studio".to_string();
        config.routing.max_extra_delegations = 3;
        config.server.http_addr = "127.0.0.1:0".to_string();
        config.server.request_timeout_ms = 1500;

        let app = App::new(config);
        assert_eq!(app.site_config().site_name, "Studio");
        assert_eq!(app.site_config().max_extra_delegations, 3);

        let server = app.server_config();
        assert_eq!(server.http_addr(), "127.0.0.1:0");
        assert_eq!(server.request_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_configured_apps_are_mounted() {
        let mut config = BasslineConfig::default();
        config.site.apps.insert(
            "blog".to_string(),
            bassline_config::AppSection {
                title: "Blog".to_string(),
                capabilities: vec!["publish".to_string()],
            },
        );
        let app = App::new(config);

        let site = app.site_config();
        assert_eq!(site.app("blog").map(|a| a.capabilities.clone()), Some(vec!["publish".to_string()]));
        let mounts = app.mounts();
        assert!(mounts.is_mounted("blog"));
        assert!(!mounts.is_mounted("wiki"));
    }

    #[test]
    fn test_telemetry_mapping() {
        let config = BasslineConfig::development();
        let telemetry = telemetry_config(&config);
        assert!(!telemetry.logging.json_format);
        assert_eq!(telemetry.logging.level, "debug");
        assert!(!telemetry.metrics.enabled);

        let telemetry = telemetry_config(&BasslineConfig::production());
        assert!(telemetry.logging.json_format);
        assert!(telemetry.metrics.enabled);
    }
}
