//! Argument-vector builders, one per qlik-cli operation.
//!
//! Builders are deterministic: the same parameter record always produces the
//! same vector. File-valued parameters are checked for existence here so a
//! missing file aborts before anything is spawned.

use crate::cli::validate::{is_readable_file, require_non_negative, ExportFormat};
use crate::config::QlikConfig;
use crate::error::QlikError;
use crate::params::{
    AppBuildParams, AppCopyParams, AppImportParams, AppListParams, AppPublishParams, PathList,
};

/// Default page size of `qlik app ls`; the flag is omitted for this value.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Builds qlik-cli argument vectors with the global flags applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    cli_path: String,
    server: Option<String>,
    verbose: bool,
}

fn push_pair(argv: &mut Vec<String>, flag: &str, value: impl Into<String>) {
    argv.push(flag.to_string());
    argv.push(value.into());
}

fn push_flag(argv: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        argv.push(flag.to_string());
    }
}

fn require_file(label: &str, path: &str) -> crate::Result<()> {
    if is_readable_file(path) {
        Ok(())
    } else {
        Err(QlikError::Validation(format!("{} file not found: {}", label, path)))
    }
}

impl CommandBuilder {
    pub fn new(cli_path: impl Into<String>, server: Option<String>, verbose: bool) -> Self {
        CommandBuilder {
            cli_path: cli_path.into(),
            server,
            verbose,
        }
    }

    pub fn from_config(config: &QlikConfig) -> Self {
        CommandBuilder::new(
            config.qlik.cli_path.clone(),
            config.qlik.tenant_url.clone(),
            config.server.debug,
        )
    }

    /// Executable plus `--server` and `--verbose` when configured.
    pub fn base(&self) -> Vec<String> {
        let mut argv = vec![self.cli_path.clone()];
        if let Some(server) = &self.server {
            push_pair(&mut argv, "--server", server.as_str());
        }
        push_flag(&mut argv, "--verbose", self.verbose);
        argv
    }

    fn with(&self, parts: &[&str]) -> Vec<String> {
        let mut argv = self.base();
        argv.extend(parts.iter().map(|p| p.to_string()));
        argv
    }

    /// Bare executable, for commands that must not carry tenant flags.
    fn bare(&self, parts: &[&str]) -> Vec<String> {
        let mut argv = vec![self.cli_path.clone()];
        argv.extend(parts.iter().map(|p| p.to_string()));
        argv
    }

    pub fn version(&self) -> Vec<String> {
        self.bare(&["version"])
    }

    pub fn connection_check(&self) -> Vec<String> {
        self.with(&["--help"])
    }

    pub fn app_list(&self, params: &AppListParams) -> crate::Result<Vec<String>> {
        let limit = require_non_negative("limit", params.limit)?;
        let offset = require_non_negative("offset", params.offset)?;

        let mut argv = self.with(&["app", "ls", "--json"]);
        if let Some(space) = &params.space_id {
            push_pair(&mut argv, "--space", space.as_str());
        }
        if let Some(collection) = &params.collection_id {
            push_pair(&mut argv, "--collection", collection.as_str());
        }
        if let Some(owner) = &params.owner {
            push_pair(&mut argv, "--owner", owner.as_str());
        }
        if params.limit != DEFAULT_LIST_LIMIT {
            push_pair(&mut argv, "--limit", limit.to_string());
        }
        if offset > 0 {
            push_pair(&mut argv, "--offset", offset.to_string());
        }
        Ok(argv)
    }

    pub fn app_get(&self, app_identifier: &str) -> Vec<String> {
        self.with(&["app", "get", app_identifier, "--json"])
    }

    pub fn space_list(&self, type_filter: Option<&str>) -> Vec<String> {
        let mut argv = self.with(&["space", "ls", "--json"]);
        if let Some(kind) = type_filter {
            push_pair(&mut argv, "--type", kind);
        }
        argv
    }

    /// `app build`. Every file-valued parameter must exist.
    pub fn app_build(&self, params: &AppBuildParams) -> crate::Result<Vec<String>> {
        let mut argv = self.with(&["app", "build"]);
        push_pair(&mut argv, "--app", params.app.as_str());

        let single_files = [
            ("--connections", "Connections", &params.connections),
            ("--script", "Script", &params.script),
            ("--app-properties", "App properties", &params.app_properties),
        ];
        for (flag, label, path) in single_files {
            if let Some(path) = path {
                require_file(label, path)?;
                push_pair(&mut argv, flag, path.as_str());
            }
        }

        let listed_files: [(&str, &str, &Option<PathList>); 5] = [
            ("--dimensions", "Dimensions", &params.dimensions),
            ("--measures", "Measures", &params.measures),
            ("--objects", "Objects", &params.objects),
            ("--variables", "Variables", &params.variables),
            ("--bookmarks", "Bookmarks", &params.bookmarks),
        ];
        for (flag, label, list) in listed_files {
            let Some(list) = list else { continue };
            for path in list.paths() {
                require_file(label, path)?;
                push_pair(&mut argv, flag, path);
            }
        }

        if let Some(limit) = params.limit {
            let limit = require_non_negative("limit", limit)?;
            push_pair(&mut argv, "--limit", limit.to_string());
        }

        push_flag(&mut argv, "--no-data", params.no_data);
        push_flag(&mut argv, "--no-reload", params.no_reload);
        push_flag(&mut argv, "--no-save", params.no_save);
        push_flag(&mut argv, "--silent", params.silent);
        Ok(argv)
    }

    pub fn app_unbuild(&self, app: &str, dir: Option<&str>, no_data: bool) -> Vec<String> {
        let mut argv = self.with(&["app", "unbuild"]);
        push_pair(&mut argv, "--app", app);
        if let Some(dir) = dir {
            push_pair(&mut argv, "--dir", dir);
        }
        push_flag(&mut argv, "--no-data", no_data);
        argv
    }

    /// `app export`. `--format` is only passed for non-default formats.
    pub fn app_export(
        &self,
        app_identifier: &str,
        output_path: &str,
        format: ExportFormat,
        no_data: bool,
    ) -> Vec<String> {
        let mut argv = self.with(&["app", "export"]);
        push_pair(&mut argv, "--app", app_identifier);
        push_pair(&mut argv, "--output", output_path);
        if format != ExportFormat::Qvf {
            push_pair(&mut argv, "--format", format.as_str());
        }
        push_flag(&mut argv, "--no-data", no_data);
        argv
    }

    pub fn app_import(&self, params: &AppImportParams, app_name: &str) -> Vec<String> {
        let mut argv = self.with(&["app", "import"]);
        push_pair(&mut argv, "--file", params.file_path.as_str());
        push_pair(&mut argv, "--name", app_name);
        if let Some(space) = &params.space_id {
            push_pair(&mut argv, "--space", space.as_str());
        }
        push_flag(&mut argv, "--replace", params.replace_existing);
        argv
    }

    pub fn app_copy(&self, params: &AppCopyParams, target_space_id: Option<&str>) -> Vec<String> {
        let mut argv = self.with(&["app", "copy"]);
        push_pair(&mut argv, "--app", params.source_app_id.as_str());
        push_pair(&mut argv, "--name", params.target_name.as_str());
        if let Some(space) = target_space_id {
            push_pair(&mut argv, "--space", space);
        }
        push_flag(&mut argv, "--no-data", !params.include_data);
        push_flag(&mut argv, "--copy-permissions", params.copy_permissions);
        argv
    }

    /// `app publish`. `--name` is passed only when it differs from the
    /// source app's name.
    pub fn app_publish(
        &self,
        params: &AppPublishParams,
        publish_name: &str,
        source_name: &str,
    ) -> Vec<String> {
        let mut argv = self.with(&["app", "publish"]);
        push_pair(&mut argv, "--app", params.app_id.as_str());
        push_pair(&mut argv, "--space", params.target_space_id.as_str());
        if publish_name != source_name {
            push_pair(&mut argv, "--name", publish_name);
        }
        push_flag(&mut argv, "--replace", params.replace_existing);
        argv
    }

    pub fn context_create(&self, name: &str, tenant_url: &str, api_key: &str) -> Vec<String> {
        let mut argv = self.bare(&["context", "create"]);
        push_pair(&mut argv, "--name", name);
        push_pair(&mut argv, "--server", tenant_url);
        push_pair(&mut argv, "--api-key", api_key);
        argv
    }

    pub fn context_list(&self) -> Vec<String> {
        self.bare(&["context", "ls"])
    }

    pub fn context_use(&self, name: &str) -> Vec<String> {
        self.bare(&["context", "use", name])
    }

    pub fn context_remove(&self, name: &str) -> Vec<String> {
        self.bare(&["context", "rm", name])
    }

    /// Lightweight authenticated call used to check an API key.
    pub fn user_me(&self, tenant_url: &str, api_key: &str) -> Vec<String> {
        let mut argv = vec![self.cli_path.clone()];
        push_pair(&mut argv, "--server", tenant_url);
        push_pair(&mut argv, "--api-key", api_key);
        argv.extend(["user".to_string(), "me".to_string()]);
        argv
    }
}
