//! Typed parameter records for every operation.
//!
//! These deserialize straight from MCP tool arguments; defaults mirror the
//! qlik-cli defaults so omitted fields produce the shortest argument vector.

use serde::{Deserialize, Serialize};

/// One path or an ordered list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl PathList {
    /// Paths in input order.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            PathList::One(path) => vec![path.as_str()],
            PathList::Many(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for PathList {
    fn from(path: &str) -> Self {
        PathList::One(path.to_string())
    }
}

impl From<Vec<&str>> for PathList {
    fn from(paths: Vec<&str>) -> Self {
        PathList::Many(paths.into_iter().map(String::from).collect())
    }
}

fn default_list_limit() -> i64 {
    50
}

fn default_search_limit() -> i64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_export_format() -> String {
    "qvf".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppListParams {
    pub space_id: Option<String>,
    pub collection_id: Option<String>,
    pub owner: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for AppListParams {
    fn default() -> Self {
        AppListParams {
            space_id: None,
            collection_id: None,
            owner: None,
            limit: default_list_limit(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppGetParams {
    pub app_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSearchParams {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    pub space_id: Option<String>,
    pub owner: Option<String>,
}

impl AppSearchParams {
    pub fn new(query: impl Into<String>, limit: i64) -> Self {
        AppSearchParams {
            query: query.into(),
            limit,
            space_id: None,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceListParams {
    pub type_filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBuildParams {
    pub app: String,
    pub connections: Option<String>,
    pub script: Option<String>,
    pub dimensions: Option<PathList>,
    pub measures: Option<PathList>,
    pub objects: Option<PathList>,
    pub variables: Option<PathList>,
    pub bookmarks: Option<PathList>,
    pub app_properties: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub no_data: bool,
    #[serde(default)]
    pub no_reload: bool,
    #[serde(default)]
    pub no_save: bool,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUnbuildParams {
    pub app: String,
    pub dir: Option<String>,
    #[serde(default)]
    pub no_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppExportParams {
    pub app_identifier: String,
    pub output_path: String,
    #[serde(default = "default_export_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub include_data: bool,
    #[serde(default)]
    pub no_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppImportParams {
    pub file_path: String,
    pub app_name: Option<String>,
    pub space_id: Option<String>,
    #[serde(default)]
    pub replace_existing: bool,
    #[serde(default = "default_true")]
    pub validate_before_import: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCopyParams {
    pub source_app_id: String,
    pub target_name: String,
    pub target_space_id: Option<String>,
    #[serde(default = "default_true")]
    pub include_data: bool,
    #[serde(default)]
    pub copy_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPublishParams {
    pub app_id: String,
    pub target_space_id: String,
    pub publish_name: Option<String>,
    #[serde(default)]
    pub replace_existing: bool,
}

/// API key is never echoed back; `Debug` masks it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ContextCreateParams {
    pub name: String,
    pub tenant_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ContextCreateParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCreateParams")
            .field("name", &self.name)
            .field("tenant_url", &self.tenant_url)
            .field("api_key", &crate::cli::runner::MASK)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNameParams {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_list_accepts_string_or_array() {
        let one: PathList = serde_json::from_value(json!("dims.json")).unwrap();
        assert_eq!(one.paths(), vec!["dims.json"]);

        let many: PathList = serde_json::from_value(json!(["b.json", "a.json"])).unwrap();
        assert_eq!(many.paths(), vec!["b.json", "a.json"]);
    }

    #[test]
    fn test_export_defaults() {
        let params: AppExportParams =
            serde_json::from_value(json!({"app_identifier": "abc", "output_path": "/tmp/a.qvf"}))
                .unwrap();
        assert_eq!(params.format, "qvf");
        assert!(params.include_data);
        assert!(!params.no_data);
    }

    #[test]
    fn test_list_defaults() {
        let params: AppListParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params, AppListParams::default());
        assert_eq!(params.limit, 50);
    }

    #[test]
    fn test_context_create_debug_masks_key() {
        let params = ContextCreateParams {
            name: "prod".into(),
            tenant_url: "https://acme.qlikcloud.com".into(),
            api_key: "eyJhbGciOiJFUzM4NCJ9".into(),
        };
        let debug = format!("{params:?}");
        assert!(!debug.contains("eyJhbGciOiJFUzM4NCJ9"));
    }
}
