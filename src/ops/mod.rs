//! Qlik operations: validation, command building, execution and parsing
//! composed per capability group.
//!
//! `QlikClient` owns the process runner and settings. Each capability group
//! is a trait implemented on it in its own module, so callers import only
//! the groups they use and tests exercise each group in isolation.

pub mod build;
pub mod context;
pub mod discovery;
pub mod lifecycle;
pub mod spaces;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::command::CommandBuilder;
use crate::cli::runner::{CommandResult, ProcessRunner};
use crate::cli::validate::available_disk_space;
use crate::config::QlikConfig;
use crate::model::{round2, ConnectionStatus};

pub use build::AppBuilder;
pub use context::ContextManager;
pub use discovery::AppDiscovery;
pub use lifecycle::AppLifecycle;
pub use spaces::SpaceCatalog;

/// Reports free bytes for a path, or `None` when unknown.
pub type DiskSpaceCheck = Arc<dyn Fn(&Path) -> Option<u64> + Send + Sync>;

/// Environment variable lookup.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Entry point for every Qlik operation.
#[derive(Clone)]
pub struct QlikClient {
    runner: Arc<dyn ProcessRunner>,
    commands: CommandBuilder,
    timeout: Duration,
    default_unbuild_dir: Option<PathBuf>,
    include_file_contents: bool,
    disk_space: DiskSpaceCheck,
    env_lookup: EnvLookup,
}

impl std::fmt::Debug for QlikClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QlikClient")
            .field("commands", &self.commands)
            .field("timeout", &self.timeout)
            .field("default_unbuild_dir", &self.default_unbuild_dir)
            .field("include_file_contents", &self.include_file_contents)
            .finish_non_exhaustive()
    }
}

impl QlikClient {
    pub fn new(config: &QlikConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        QlikClient {
            runner,
            commands: CommandBuilder::from_config(config),
            timeout: Duration::from_secs(config.qlik.command_timeout_secs),
            default_unbuild_dir: config.qlik.default_unbuild_dir.clone(),
            include_file_contents: config.qlik.include_file_contents,
            disk_space: Arc::new(available_disk_space),
            env_lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the free-space check used before exports.
    pub fn with_disk_space_check(
        mut self,
        check: impl Fn(&Path) -> Option<u64> + Send + Sync + 'static,
    ) -> Self {
        self.disk_space = Arc::new(check);
        self
    }

    /// Replace the environment lookup consulted at call time.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env_lookup = Arc::new(lookup);
        self
    }

    pub(crate) async fn run(&self, argv: Vec<String>) -> crate::Result<CommandResult> {
        self.runner.run(&argv, self.timeout, false).await
    }

    /// Run with secret arguments masked in logs, errors and the result.
    pub(crate) async fn run_secret(&self, argv: Vec<String>) -> crate::Result<CommandResult> {
        self.runner.run(&argv, self.timeout, true).await
    }

    /// `qlik version`.
    pub async fn cli_version(&self) -> crate::Result<CommandResult> {
        self.run(self.commands.version()).await
    }

    /// Check that qlik-cli answers with the configured global flags.
    /// Never fails; an unreachable CLI reports `connected = false`.
    pub async fn validate_connection(&self) -> ConnectionStatus {
        match self.run(self.commands.connection_check()).await {
            Ok(_) => ConnectionStatus {
                connected: true,
                message: "qlik-cli is reachable".to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "qlik-cli connection check failed");
                ConnectionStatus {
                    connected: false,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Seconds since `start`, rounded to two decimals.
pub(crate) fn elapsed_secs(start: Instant) -> f64 {
    round2(start.elapsed().as_secs_f64())
}


#[cfg(test)]
mod tests {
    use super::fixtures::client;
    use crate::error::QlikError;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_cli_version_runs_version_subcommand() {
        let runner = ScriptedRunner::new();
        runner.on(&["version"], "qlik-cli version 2.25.0\n");
        let result = client(&runner).cli_version().await.unwrap();
        assert!(result.stdout.contains("2.25.0"));
        assert_eq!(runner.calls(), vec![vec!["qlik".to_string(), "version".to_string()]]);
    }

    #[tokio::test]
    async fn test_validate_connection_reports_failure_without_error() {
        let runner = ScriptedRunner::new();
        runner.fail(
            &["--help"],
            QlikError::ExternalTool("qlik-cli executable not found: qlik".into()),
        );
        let status = client(&runner).validate_connection().await;
        assert!(!status.connected);
        assert!(status.message.contains("not found"));

        let runner = ScriptedRunner::new();
        runner.on(&["--help"], "Usage: qlik [command]");
        assert!(client(&runner).validate_connection().await.connected);
    }
}
