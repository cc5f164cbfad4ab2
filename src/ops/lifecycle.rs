//! Export, import, copy and publish.
//!
//! Each operation validates its inputs and checks the tenant (source app,
//! target space, name collisions) before invoking qlik-cli. After a
//! successful invocation the new app's ID is recovered from the output and
//! verified on a best-effort basis.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;

use super::discovery::AppDiscovery;
use super::spaces::SpaceCatalog;
use super::{elapsed_secs, QlikClient};
use crate::cli::output::{extract_app_id, COPY_ID_PATTERNS, IMPORT_ID_PATTERNS, PUBLISH_ID_PATTERNS};
use crate::cli::validate::{is_writable_directory_or_creatable, require_non_empty, ExportFormat};
use crate::error::QlikError;
use crate::model::{
    round2, AppCopyResult, AppExportResult, AppImportResult, AppPublishResult, AppSummary,
    Verification,
};
use crate::params::{
    AppCopyParams, AppExportParams, AppImportParams, AppListParams, AppPublishParams,
};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// Exports refuse to start with less free space than this.
pub const MIN_EXPORT_FREE_BYTES: u64 = 100 * MB;

/// Imports above this size only log a warning.
pub const LARGE_IMPORT_BYTES: u64 = 2 * GB;

/// Page size of the name lookups behind collision checks and verification.
pub const NAME_LOOKUP_LIMIT: i64 = 1000;

const IMPORT_EXTENSIONS: [&str; 2] = ["qvf", "json"];

#[async_trait]
pub trait AppLifecycle {
    async fn app_export(&self, params: &AppExportParams) -> crate::Result<AppExportResult>;
    async fn app_import(&self, params: &AppImportParams) -> crate::Result<AppImportResult>;
    async fn app_copy(&self, params: &AppCopyParams) -> crate::Result<AppCopyResult>;
    async fn app_publish(&self, params: &AppPublishParams) -> crate::Result<AppPublishResult>;
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The directory itself when it exists, else its closest existing parent.
fn nearest_existing_ancestor(dir: &Path) -> PathBuf {
    dir.ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Delete a partially written export. Failures are logged only.
fn remove_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "removed partial export file"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove partial export file"
        ),
    }
}

impl QlikClient {
    /// Apps whose name equals `name` (case-insensitive), listed directly
    /// rather than through ranked search so no match is cut off by a limit.
    async fn apps_named(&self, name: &str, space: Option<&str>) -> crate::Result<Vec<AppSummary>> {
        let listing = self
            .app_list(&AppListParams {
                space_id: space.map(String::from),
                limit: NAME_LOOKUP_LIMIT,
                ..AppListParams::default()
            })
            .await?;
        Ok(listing
            .apps
            .into_iter()
            .filter(|app| app.name.eq_ignore_ascii_case(name))
            .filter(|app| space.is_none_or(|space| app.space_id == space))
            .collect())
    }

    /// An app named `name` (case-insensitive) in `space`, or anywhere when
    /// no space is given. A failed lookup is logged and treated as no match.
    async fn find_name_collision(&self, name: &str, space: Option<&str>) -> Option<AppSummary> {
        match self.apps_named(name, space).await {
            Ok(found) => found.into_iter().next(),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "could not check for existing apps");
                None
            }
        }
    }

    /// Recover the new app's ID from `stdout`, falling back to a lookup by
    /// name in `space`, then fetch its details.
    async fn verify_new_app(
        &self,
        stdout: &str,
        patterns: &[Regex],
        name: &str,
        space: Option<&str>,
    ) -> Verification {
        let mut app_id = extract_app_id(stdout, patterns);

        if app_id.is_none() {
            match self.apps_named(name, space).await {
                Ok(found) => {
                    let exact = found.iter().position(|app| app.name == name).unwrap_or(0);
                    app_id = found.into_iter().nth(exact).map(|app| app.id);
                }
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "could not verify new app by name");
                    return Verification {
                        app_id: None,
                        app: None,
                        error: Some(format!("could not verify app by name '{}': {}", name, e)),
                    };
                }
            }
        }

        let Some(id) = app_id else {
            return Verification {
                app_id: None,
                app: None,
                error: Some(format!("could not determine the ID of app '{}'", name)),
            };
        };

        match self.app_get(&id).await {
            Ok(app) => Verification {
                app_id: Some(id),
                app: Some(app),
                error: None,
            },
            Err(e) => {
                tracing::warn!(app = %id, error = %e, "could not verify new app");
                Verification {
                    error: Some(format!("could not verify app '{}': {}", id, e)),
                    app_id: Some(id),
                    app: None,
                }
            }
        }
    }
}

#[async_trait]
impl AppLifecycle for QlikClient {
    async fn app_export(&self, params: &AppExportParams) -> crate::Result<AppExportResult> {
        let app_identifier = require_non_empty("app identifier", &params.app_identifier)?;
        let output_path = require_non_empty("output path", &params.output_path)?;
        let format: ExportFormat = params.format.parse()?;

        if params.no_data && params.include_data {
            tracing::warn!("both no_data and include_data set; exporting without data");
        }
        let no_data = params.no_data || !params.include_data;

        let output_file = PathBuf::from(output_path);
        let output_dir = match output_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !is_writable_directory_or_creatable(&output_dir) {
            return Err(QlikError::Validation(format!(
                "output directory is not writable or cannot be created: {}",
                output_dir.display()
            )));
        }

        // Unknown free space never blocks an export
        let free_space_dir = nearest_existing_ancestor(&output_dir);
        if let Some(available) = (self.disk_space)(&free_space_dir) {
            if available < MIN_EXPORT_FREE_BYTES {
                return Err(QlikError::Validation(format!(
                    "insufficient disk space in {}: {:.1}MB available, {}MB required",
                    free_space_dir.display(),
                    available as f64 / MB as f64,
                    MIN_EXPORT_FREE_BYTES / MB
                )));
            }
        }

        self.app_get(app_identifier).await?;

        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            QlikError::Io(format!(
                "cannot create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        tracing::info!(
            app = %app_identifier,
            output = %output_path,
            format = %format,
            "exporting qlik app"
        );
        let argv = self
            .commands
            .app_export(app_identifier, output_path, format, no_data);
        let start = Instant::now();

        let command_result = match self.run(argv).await {
            Ok(result) => result,
            Err(e) => {
                remove_partial_output(&output_file);
                return Err(e);
            }
        };
        let duration = elapsed_secs(start);

        let file_size_bytes = match std::fs::metadata(&output_file) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(QlikError::ExternalTool(format!(
                    "export completed but output file not found: {}",
                    output_path
                )));
            }
        };

        tracing::info!(
            app = %app_identifier,
            bytes = file_size_bytes,
            duration_secs = duration,
            "exported qlik app"
        );
        Ok(AppExportResult {
            app_identifier: app_identifier.to_string(),
            output_path: output_path.to_string(),
            format: format.to_string(),
            file_size_bytes,
            file_size_mb: round2(file_size_bytes as f64 / MB as f64),
            include_data: !no_data,
            export_duration_seconds: duration,
            command_result,
        })
    }

    async fn app_import(&self, params: &AppImportParams) -> crate::Result<AppImportResult> {
        let file_path = require_non_empty("file path", &params.file_path)?;
        let import_file = Path::new(file_path);
        if !import_file.exists() {
            return Err(QlikError::Validation(format!(
                "import file not found: {}",
                file_path
            )));
        }
        if !import_file.is_file() {
            return Err(QlikError::Validation(format!(
                "import path is not a file: {}",
                file_path
            )));
        }

        if params.validate_before_import {
            let size = std::fs::metadata(import_file)
                .map_err(|e| QlikError::Io(format!("cannot read {}: {}", file_path, e)))?
                .len();
            if size == 0 {
                return Err(QlikError::Validation(format!(
                    "import file is empty: {}",
                    file_path
                )));
            }
            let extension = import_file
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !IMPORT_EXTENSIONS.contains(&extension.as_str()) {
                tracing::warn!(file = %file_path, extension = %extension, "unexpected import file extension");
            }
            if size > LARGE_IMPORT_BYTES {
                tracing::warn!(
                    file = %file_path,
                    size_gb = %format!("{:.1}", size as f64 / GB as f64),
                    "large import file; this may take a long time"
                );
            }
        }

        let app_name = match non_blank(&params.app_name) {
            Some(name) => name.to_string(),
            None => import_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        require_non_empty("app name", &app_name)?;
        let space_id = non_blank(&params.space_id);

        if let Some(space) = space_id {
            self.find_space(space).await?;
        }

        if !params.replace_existing {
            if let Some(existing) = self.find_name_collision(&app_name, space_id).await {
                return Err(QlikError::Collision(format!(
                    "app with name '{}' already exists (ID: {}). Use replace_existing=true to overwrite.",
                    app_name, existing.id
                )));
            }
        }

        tracing::info!(file = %file_path, name = %app_name, "importing qlik app");
        let mut effective = params.clone();
        effective.space_id = space_id.map(String::from);
        let argv = self.commands.app_import(&effective, &app_name);
        let start = Instant::now();
        let command_result = self.run(argv).await?;
        let duration = elapsed_secs(start);

        let verification = self
            .verify_new_app(&command_result.stdout, &IMPORT_ID_PATTERNS, &app_name, space_id)
            .await;

        tracing::info!(
            name = %app_name,
            app = ?verification.app_id,
            duration_secs = duration,
            "imported qlik app"
        );
        Ok(AppImportResult {
            file_path: file_path.to_string(),
            app_name,
            new_app_id: verification.app_id,
            space_id: effective.space_id,
            replaced_existing: params.replace_existing,
            import_duration_seconds: duration,
            verification: verification.app,
            verification_error: verification.error,
            command_result,
        })
    }

    async fn app_copy(&self, params: &AppCopyParams) -> crate::Result<AppCopyResult> {
        let source_app_id = require_non_empty("source app ID", &params.source_app_id)?;
        let target_name = require_non_empty("target app name", &params.target_name)?;

        let source = self.app_get(source_app_id).await?;
        tracing::info!(
            app = %source_app_id,
            name = %source.name,
            space = %source.space.name,
            "copy source found"
        );

        let target_space_id = non_blank(&params.target_space_id)
            .map(String::from)
            .or_else(|| Some(source.space.id.clone()).filter(|id| !id.is_empty()));

        if let Some(space) = &target_space_id {
            self.find_space(space).await?;
        }

        if let Some(existing) = self
            .find_name_collision(target_name, target_space_id.as_deref())
            .await
        {
            return Err(QlikError::Collision(format!(
                "app with name '{}' already exists in target space (ID: {})",
                target_name, existing.id
            )));
        }

        let mut effective = params.clone();
        effective.source_app_id = source_app_id.to_string();
        effective.target_name = target_name.to_string();
        let argv = self
            .commands
            .app_copy(&effective, target_space_id.as_deref());
        let start = Instant::now();
        let command_result = self.run(argv).await?;
        let duration = elapsed_secs(start);

        let verification = self
            .verify_new_app(
                &command_result.stdout,
                &COPY_ID_PATTERNS,
                target_name,
                target_space_id.as_deref(),
            )
            .await;

        tracing::info!(
            source = %source_app_id,
            target = %target_name,
            app = ?verification.app_id,
            duration_secs = duration,
            "copied qlik app"
        );
        Ok(AppCopyResult {
            source_app_id: source_app_id.to_string(),
            source_app_name: source.name,
            target_name: target_name.to_string(),
            new_app_id: verification.app_id,
            target_space_id,
            include_data: params.include_data,
            copy_permissions: params.copy_permissions,
            copy_duration_seconds: duration,
            verification: verification.app,
            verification_error: verification.error,
            command_result,
        })
    }

    async fn app_publish(&self, params: &AppPublishParams) -> crate::Result<AppPublishResult> {
        let app_id = require_non_empty("app ID", &params.app_id)?;
        let target_space_id = require_non_empty("target space ID", &params.target_space_id)?;

        let source = self.app_get(app_id).await?;
        let publish_name = non_blank(&params.publish_name)
            .map(String::from)
            .unwrap_or_else(|| source.name.clone());

        let target_space = self.find_space(target_space_id).await?;
        if !target_space.is_managed() {
            tracing::warn!(
                space = %target_space.name,
                space_type = %target_space.space_type,
                "publish target is not a managed space"
            );
        }

        if !params.replace_existing {
            if let Some(existing) = self
                .find_name_collision(&publish_name, Some(target_space_id))
                .await
            {
                return Err(QlikError::Collision(format!(
                    "app with name '{}' already exists in target space (ID: {}). Use replace_existing=true to overwrite.",
                    publish_name, existing.id
                )));
            }
        }

        tracing::info!(app = %app_id, space = %target_space_id, "publishing qlik app");
        let mut effective = params.clone();
        effective.app_id = app_id.to_string();
        effective.target_space_id = target_space_id.to_string();
        let argv = self
            .commands
            .app_publish(&effective, &publish_name, &source.name);
        let start = Instant::now();
        let command_result = self.run(argv).await?;
        let duration = elapsed_secs(start);

        let verification = self
            .verify_new_app(
                &command_result.stdout,
                &PUBLISH_ID_PATTERNS,
                &publish_name,
                Some(target_space_id),
            )
            .await;

        tracing::info!(
            app = %app_id,
            published = ?verification.app_id,
            duration_secs = duration,
            "published qlik app"
        );
        Ok(AppPublishResult {
            source_app_id: app_id.to_string(),
            source_app_name: source.name,
            published_app_id: verification.app_id,
            publish_name,
            target_space_id: target_space_id.to_string(),
            target_space_name: target_space.name,
            replaced_existing: params.replace_existing,
            publish_duration_seconds: duration,
            verification: verification.app,
            verification_error: verification.error,
            command_result,
        })
    }
}
