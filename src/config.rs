//! Qlik MCP server configuration: TOML deserialization, env overrides and validation.

use crate::cli::validate::validate_tenant_url;
use crate::error::QlikError;
use serde::Deserialize;
use std::path::PathBuf;

/// Strip an env var reference to its variable name.
///
/// Accepts `${VAR_NAME}` syntax only. Returns `None` if the value is not a
/// valid env-var reference.
pub fn parse_env_ref(value: &str) -> Option<&str> {
    value.strip_prefix("${").and_then(|s| s.strip_suffix('}'))
}

/// Resolve a config string that may be a `${VAR}` reference.
///
/// Literal values pass through unchanged. References to unset variables
/// resolve to `None` so the setting behaves as if it were absent.
fn resolve_env_ref(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    match parse_env_ref(value) {
        Some(var_name) => lookup(var_name).filter(|v| !v.is_empty()),
        None => Some(value.to_string()),
    }
}

/// Top-level configuration, parsed from `qlik-mcp.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlikConfig {
    #[serde(default)]
    pub qlik: CliSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Settings for the qlik-cli executable and the operations built on it.
#[derive(Debug, Clone, Deserialize)]
pub struct CliSettings {
    /// Path to the qlik-cli executable.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    /// Tenant URL passed as `--server` on every tenant-scoped command.
    /// May be a `${VAR}` reference.
    pub tenant_url: Option<String>,
    /// Per-invocation timeout in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Directory used by `app_unbuild` when the caller does not name one.
    pub default_unbuild_dir: Option<PathBuf>,
    /// Attach the unbuilt files' contents to unbuild results.
    #[serde(default = "default_include_file_contents")]
    pub include_file_contents: bool,
}

/// Settings for the MCP server process itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Default tracing filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Adds `--verbose` to qlik-cli invocations.
    #[serde(default)]
    pub debug: bool,
}

fn default_cli_path() -> String {
    "qlik".to_string()
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_include_file_contents() -> bool {
    true
}

fn default_server_name() -> String {
    "qlik-mcp-server".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliSettings {
    fn default() -> Self {
        CliSettings {
            cli_path: default_cli_path(),
            tenant_url: None,
            command_timeout_secs: default_command_timeout_secs(),
            default_unbuild_dir: None,
            include_file_contents: default_include_file_contents(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            name: default_server_name(),
            log_level: default_log_level(),
            debug: false,
        }
    }
}

/// Parse a boolean environment value (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl QlikConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        toml::from_str(toml_str).map_err(|e| QlikError::Config(e.to_string()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Also resolves `${VAR}` references left in `tenant_url`.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::Result<()> {
        if let Some(path) = lookup("QLIK_CLI_PATH") {
            self.qlik.cli_path = path;
        }
        if let Some(url) = lookup("QLIK_TENANT_URL") {
            self.qlik.tenant_url = Some(url);
        }
        if let Some(timeout) = lookup("QLIK_COMMAND_TIMEOUT") {
            self.qlik.command_timeout_secs = timeout.trim().parse().map_err(|_| {
                QlikError::Config(format!(
                    "QLIK_COMMAND_TIMEOUT must be a whole number of seconds, got '{}'",
                    timeout
                ))
            })?;
        }
        // The file setting outranks the environment for the unbuild directory
        if self.qlik.default_unbuild_dir.is_none() {
            if let Some(dir) = lookup("QLIK_DEFAULT_UNBUILD_DIRECTORY") {
                if !dir.trim().is_empty() {
                    self.qlik.default_unbuild_dir = Some(PathBuf::from(dir));
                }
            }
        }
        if let Some(flag) = lookup("QLIK_INCLUDE_FILE_CONTENTS") {
            self.qlik.include_file_contents = parse_bool(&flag).ok_or_else(|| {
                QlikError::Config(format!(
                    "QLIK_INCLUDE_FILE_CONTENTS must be true or false, got '{}'",
                    flag
                ))
            })?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.server.log_level = level.to_lowercase();
        }
        if let Some(flag) = lookup("DEBUG") {
            self.server.debug = parse_bool(&flag).unwrap_or(false);
        }

        self.qlik.tenant_url = self
            .qlik
            .tenant_url
            .as_deref()
            .and_then(|url| resolve_env_ref(url, &lookup));

        Ok(())
    }

    /// Validate the config, failing fast before any qlik-cli call is made.
    pub fn validate(&self) -> crate::Result<()> {
        if self.qlik.cli_path.trim().is_empty() {
            return Err(QlikError::Config("qlik.cli_path must not be empty".to_string()));
        }

        if self.qlik.command_timeout_secs == 0 {
            return Err(QlikError::Config(
                "qlik.command_timeout_secs must be > 0".to_string(),
            ));
        }

        if let Some(url) = &self.qlik.tenant_url {
            if parse_env_ref(url).is_some() {
                return Err(QlikError::Config(format!(
                    "qlik.tenant_url references an unresolved variable: {}",
                    url
                )));
            }
            validate_tenant_url(url)
                .map_err(|e| QlikError::Config(format!("qlik.tenant_url: {}", e)))?;
        }

        Ok(())
    }
}
