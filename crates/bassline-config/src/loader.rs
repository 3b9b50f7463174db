//! Layered configuration loading.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{BasslineConfig, ConfigError, LogFormat};

/// Environment prefix used by [`ConfigLoader::with_env_prefix`] in the binary.
pub const DEFAULT_ENV_PREFIX: &str = "BASSLINE";

/// Loads [`BasslineConfig`] in layers.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Variables from a `.env` file
/// 4. Process environment variables
///
/// Both variable layers use the `PREFIX__SECTION__KEY` format, e.g.
/// `BASSLINE__SESSION__GRACE_SECONDS=30`.
///
/// # Example
///
/// ```no_run
/// use bassline_config::ConfigLoader;
///
/// # fn main() -> Result<(), bassline_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("bassline.toml")?
///     .with_dotenv()?
///     .with_env_prefix("BASSLINE")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: BasslineConfig,
    env_prefix: Option<String>,
    dotenv_vars: Vec<(String, String)>,
    env_source: Option<Vec<(String, String)>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BasslineConfig::default(),
            env_prefix: None,
            dotenv_vars: Vec::new(),
            env_source: None,
        }
    }

    /// Resets to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = BasslineConfig::default();
        self
    }

    /// Starts from [`BasslineConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = BasslineConfig::development();
        self
    }

    /// Starts from [`BasslineConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = BasslineConfig::production();
        self
    }

    /// Loads a TOML (`.toml`) or JSON (`.json`) file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Loads a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the given format.
    ///
    /// ```
    /// use bassline_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[site]\nsite_name = \"Studio\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.site.site_name, "Studio");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Sets the prefix for variable overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads `.env` from the working directory, if present.
    ///
    /// The variables are applied below the process environment and do not
    /// modify it.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        self.with_dotenv_file(".env")
    }

    /// Reads variables from a dotenv-format file, if present.
    pub fn with_dotenv_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(self),
            Err(e) => return Err(ConfigError::dotenv_error(path, e)),
        };

        for item in iter {
            let pair = item.map_err(|e| ConfigError::dotenv_error(path, e))?;
            self.dotenv_vars.push(pair);
        }
        Ok(self)
    }

    /// Uses `vars` in place of the process environment.
    #[must_use]
    pub fn with_env_source<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_source = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Applies variable overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the final
    /// configuration is invalid.
    pub fn load(mut self) -> Result<BasslineConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> BasslineConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<BasslineConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let process_vars = match self.env_source.take() {
            Some(vars) => vars,
            None => env::vars().collect(),
        };

        // process environment wins over .env
        let mut vars = BTreeMap::new();
        for (key, value) in std::mem::take(&mut self.dotenv_vars).into_iter().chain(process_vars) {
            if key.starts_with(prefix) {
                vars.insert(key, value);
            }
        }

        for (key, value) in &vars {
            self.apply_env_var(key, value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            // e.g. BASSLINE_HOME, not ours
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "MAX_CONNECTIONS"] => config.server.max_connections = parse_int(key, value)?,
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_int(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => config.server.max_body_bytes = parse_int(key, value)?,

            ["SITE", "SITE_NAME"] => config.site.site_name = value.to_string(),

            ["ROUTING", "MAX_EXTRA_DELEGATIONS"] => {
                config.routing.max_extra_delegations = parse_int(key, value)?;
            }

            ["SESSION", "GRACE_SECONDS"] => config.session.grace_seconds = parse_int(key, value)?,
            ["SESSION", "LOCK_TIMEOUT_MS"] => {
                config.session.lock_timeout_ms = parse_int(key, value)?;
            }
            ["SESSION", "RETRY_AFTER_SECS"] => {
                config.session.retry_after_secs = parse_int(key, value)?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                config.telemetry.logging.ansi_enabled = parse_bool_var(key, value)?;
            }

            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }

        Ok(())
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
