//! `app build` and `app unbuild`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::QlikClient;
use crate::cli::validate::{is_writable, require_non_empty};
use crate::error::QlikError;
use crate::file_tree::read_file_tree;
use crate::model::{AppBuildResult, AppUnbuildResult};
use crate::params::{AppBuildParams, AppUnbuildParams};

/// Environment variable naming the fallback unbuild directory.
pub const UNBUILD_DIR_ENV: &str = "QLIK_DEFAULT_UNBUILD_DIRECTORY";

#[async_trait]
pub trait AppBuilder {
    async fn app_build(&self, params: &AppBuildParams) -> crate::Result<AppBuildResult>;

    /// Unbuild into the resolved directory and, when enabled, read the
    /// produced files back. A read failure is reported in
    /// `file_contents_error`, not as an error.
    async fn app_unbuild(&self, params: &AppUnbuildParams) -> crate::Result<AppUnbuildResult>;
}

impl QlikClient {
    /// Explicit directory, then configured default, then environment.
    pub fn resolve_unbuild_dir(&self, explicit: Option<&str>) -> Option<PathBuf> {
        let non_blank = |s: &str| !s.trim().is_empty();
        explicit
            .filter(|dir| non_blank(dir))
            .map(PathBuf::from)
            .or_else(|| self.default_unbuild_dir.clone())
            .or_else(|| {
                (self.env_lookup)(UNBUILD_DIR_ENV)
                    .filter(|dir| non_blank(dir))
                    .map(PathBuf::from)
            })
    }
}

async fn ensure_writable_dir(dir: &Path) -> crate::Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        QlikError::Io(format!(
            "failed to create or access directory '{}': {}",
            dir.display(),
            e
        ))
    })?;
    if !is_writable(dir) {
        return Err(QlikError::Validation(format!(
            "directory is not writable: {}",
            dir.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl AppBuilder for QlikClient {
    async fn app_build(&self, params: &AppBuildParams) -> crate::Result<AppBuildResult> {
        let app = require_non_empty("app", &params.app)?;
        tracing::info!(app = %app, "building qlik app");

        let argv = self.commands.app_build(params)?;
        let command_result = self.run(argv).await?;
        Ok(AppBuildResult {
            app: app.to_string(),
            command_result,
        })
    }

    async fn app_unbuild(&self, params: &AppUnbuildParams) -> crate::Result<AppUnbuildResult> {
        let app = require_non_empty("app", &params.app)?;
        let target_dir = self.resolve_unbuild_dir(params.dir.as_deref());
        tracing::info!(app = %app, dir = ?target_dir, "unbuilding qlik app");

        if let Some(dir) = &target_dir {
            ensure_writable_dir(dir).await?;
        }

        let dir_arg = target_dir.as_ref().map(|d| d.to_string_lossy().into_owned());
        let argv = self
            .commands
            .app_unbuild(app, dir_arg.as_deref(), params.no_data);
        let command_result = self.run(argv).await?;

        let mut result = AppUnbuildResult {
            app: app.to_string(),
            unbuild_directory: dir_arg,
            command_result,
            file_contents: None,
            file_contents_error: None,
        };

        if let (true, Some(dir)) = (self.include_file_contents, target_dir) {
            match tokio::task::spawn_blocking(move || read_file_tree(&dir)).await {
                Ok(Ok(tree)) => result.file_contents = Some(tree),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "unbuild succeeded but files could not be read");
                    result.file_contents_error = Some(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "file tree reader task failed");
                    result.file_contents_error = Some(format!("file tree reader task failed: {}", e));
                }
            }
        }

        Ok(result)
    }
}
