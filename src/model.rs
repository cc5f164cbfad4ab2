//! Structured records built from qlik-cli output.
//!
//! Every record has a fixed shape: keys missing from the JSON emitted by
//! qlik-cli fall back to a defined default instead of leaking through as
//! open-ended maps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::runner::CommandResult;
use crate::file_tree::UnbuildFileTree;
use crate::params::AppListParams;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOwner {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSpaceRef {
    name: Option<String>,
    #[serde(rename = "type")]
    space_type: Option<String>,
}

/// Tags arrive as plain strings or as objects carrying a `name`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTag {
    Plain(String),
    Named { name: String },
    Other(Value),
}

impl RawTag {
    fn into_name(self) -> Option<String> {
        match self {
            RawTag::Plain(name) | RawTag::Named { name } => Some(name),
            RawTag::Other(_) => None,
        }
    }
}

/// App record as emitted by `app ls` and `app get`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawApp {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    owner: Option<RawOwner>,
    space_id: Option<String>,
    space: Option<RawSpaceRef>,
    created_date: Option<String>,
    modified_date: Option<String>,
    published: Option<bool>,
    tags: Option<Vec<RawTag>>,
    usage: Option<String>,
    file_size: Option<u64>,
    last_reload_time: Option<String>,
    has_data: Option<bool>,
    is_direct_query_mode: Option<bool>,
    custom_properties: Option<Vec<Value>>,
    attributes: Option<Vec<Value>>,
    origin_app_id: Option<String>,
    target_app_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSpace {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    space_type: Option<String>,
    owner: Option<RawOwner>,
    created_date: Option<String>,
    modified_date: Option<String>,
}

/// Decode a raw record; a shape serde rejects yields the all-default record.
fn decode<'a, T: Deserialize<'a> + Default>(value: &'a Value, record: &str) -> T {
    T::deserialize(value).unwrap_or_else(|e| {
        tracing::warn!(record = %record, error = %e, "unexpected qlik-cli record shape");
        T::default()
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl RawApp {
    fn tags(&mut self) -> Vec<String> {
        self.tags
            .take()
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawTag::into_name)
            .collect()
    }

    fn usage(&mut self) -> String {
        non_empty(self.usage.take()).unwrap_or_else(|| "analytics".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
}

impl Owner {
    fn from_raw(raw: Option<RawOwner>) -> Self {
        let raw = raw.unwrap_or_default();
        Owner {
            id: raw.id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
        }
    }
}

/// List/search projection of an app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: Owner,
    pub space_id: String,
    pub space_name: String,
    pub created_date: String,
    pub modified_date: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub usage: String,
}

impl AppSummary {
    pub fn from_json(value: &Value) -> Self {
        let mut raw: RawApp = decode(value, "app");
        let tags = raw.tags();
        let usage = raw.usage();
        AppSummary {
            id: raw.id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            owner: Owner::from_raw(raw.owner),
            space_id: raw.space_id.unwrap_or_default(),
            space_name: raw.space.and_then(|space| space.name).unwrap_or_default(),
            created_date: raw.created_date.unwrap_or_default(),
            modified_date: raw.modified_date.unwrap_or_default(),
            published: raw.published.unwrap_or(false),
            tags,
            usage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDetail {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub space_type: String,
}

/// Full record returned by `app get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: OwnerDetail,
    pub space: SpaceRef,
    pub created_date: String,
    pub modified_date: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub usage: String,
    pub file_size: u64,
    pub last_reload_time: String,
    pub has_data: bool,
    pub is_direct_query_mode: bool,
    pub custom_properties: Vec<Value>,
    pub attributes: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_app_id: Option<String>,
}

impl AppDetail {
    pub fn from_json(value: &Value) -> Self {
        let mut raw: RawApp = decode(value, "app");
        let tags = raw.tags();
        let usage = raw.usage();
        let owner = raw.owner.unwrap_or_default();
        let space = raw.space.unwrap_or_default();
        AppDetail {
            id: raw.id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            owner: OwnerDetail {
                id: owner.id.unwrap_or_default(),
                name: owner.name.unwrap_or_default(),
                email: owner.email.unwrap_or_default(),
            },
            space: SpaceRef {
                id: raw.space_id.unwrap_or_default(),
                name: space.name.unwrap_or_default(),
                space_type: space.space_type.unwrap_or_default(),
            },
            created_date: raw.created_date.unwrap_or_default(),
            modified_date: raw.modified_date.unwrap_or_default(),
            published: raw.published.unwrap_or(false),
            tags,
            usage,
            file_size: raw.file_size.unwrap_or(0),
            last_reload_time: raw.last_reload_time.unwrap_or_default(),
            has_data: raw.has_data.unwrap_or(false),
            is_direct_query_mode: raw.is_direct_query_mode.unwrap_or(false),
            custom_properties: raw.custom_properties.unwrap_or_default(),
            attributes: raw.attributes.unwrap_or_default(),
            origin_app_id: non_empty(raw.origin_app_id),
            target_app_id: non_empty(raw.target_app_id),
        }
    }
}

/// Space types understood by `qlik space ls --type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    Personal,
    Shared,
    Managed,
}

impl SpaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceType::Personal => "personal",
            SpaceType::Shared => "shared",
            SpaceType::Managed => "managed",
        }
    }

    pub fn parse(value: &str) -> crate::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(SpaceType::Personal),
            "shared" => Ok(SpaceType::Shared),
            "managed" => Ok(SpaceType::Managed),
            _ => Err(crate::QlikError::Validation(format!(
                "invalid space type filter: {}. Valid types: personal, shared, managed",
                value
            ))),
        }
    }
}

/// Sentinel for a space whose app count could not be determined.
pub const APP_COUNT_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub description: String,
    /// As reported by qlik-cli; normally personal, shared or managed.
    #[serde(rename = "type")]
    pub space_type: String,
    pub owner: Owner,
    pub created_date: String,
    pub modified_date: String,
    /// Apps in the space, or [`APP_COUNT_UNKNOWN`].
    pub app_count: i64,
}

impl Space {
    /// Build a space record; the app count starts out unknown.
    pub fn from_json(value: &Value) -> Self {
        let raw: RawSpace = decode(value, "space");
        Space {
            id: raw.id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            space_type: raw.space_type.unwrap_or_default(),
            owner: Owner::from_raw(raw.owner),
            created_date: raw.created_date.unwrap_or_default(),
            modified_date: raw.modified_date.unwrap_or_default(),
            app_count: APP_COUNT_UNKNOWN,
        }
    }

    pub fn is_managed(&self) -> bool {
        self.space_type.eq_ignore_ascii_case(SpaceType::Managed.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub name: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextListing {
    pub contexts: Vec<ContextEntry>,
    pub current_context: Option<String>,
}

impl ContextListing {
    pub fn contains(&self, name: &str) -> bool {
        self.contexts.iter().any(|ctx| ctx.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.contexts.iter().map(|ctx| ctx.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentContext {
    pub current_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_details: Option<ContextEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppListResult {
    pub apps: Vec<AppSummary>,
    pub total_count: usize,
    pub filters_applied: AppListParams,
}

/// Which fields of an app matched a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Name,
    Description,
    Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub app: AppSummary,
    pub relevance_score: u32,
    pub match_reasons: Vec<MatchReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSearchResult {
    pub query: String,
    pub apps: Vec<SearchHit>,
    pub total_matches: usize,
    pub search_performed_on: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceListResult {
    pub spaces: Vec<Space>,
    pub total_count: usize,
    pub type_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBuildResult {
    pub app: String,
    pub command_result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUnbuildResult {
    pub app: String,
    pub unbuild_directory: Option<String>,
    pub command_result: CommandResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_contents: Option<UnbuildFileTree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_contents_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppExportResult {
    pub app_identifier: String,
    pub output_path: String,
    pub format: String,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    pub include_data: bool,
    pub export_duration_seconds: f64,
    pub command_result: CommandResult,
}

/// Best-effort lookup of the app a lifecycle command just created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verification {
    pub app_id: Option<String>,
    pub app: Option<AppDetail>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppImportResult {
    pub file_path: String,
    pub app_name: String,
    pub new_app_id: Option<String>,
    pub space_id: Option<String>,
    pub replaced_existing: bool,
    pub import_duration_seconds: f64,
    pub verification: Option<AppDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
    pub command_result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppCopyResult {
    pub source_app_id: String,
    pub source_app_name: String,
    pub target_name: String,
    pub new_app_id: Option<String>,
    pub target_space_id: Option<String>,
    pub include_data: bool,
    pub copy_permissions: bool,
    pub copy_duration_seconds: f64,
    pub verification: Option<AppDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
    pub command_result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPublishResult {
    pub source_app_id: String,
    pub source_app_name: String,
    pub published_app_id: Option<String>,
    pub publish_name: String,
    pub target_space_id: String,
    pub target_space_name: String,
    pub replaced_existing: bool,
    pub publish_duration_seconds: f64,
    pub verification: Option<AppDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
    pub command_result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub message: String,
}

/// Round to two decimals for duration and size fields.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_defaults_for_missing_keys() {
        let app = AppSummary::from_json(&json!({"id": "a1"}));
        assert_eq!(app.id, "a1");
        assert_eq!(app.name, "");
        assert_eq!(app.owner, Owner::default());
        assert!(app.tags.is_empty());
        assert_eq!(app.usage, "analytics");
        assert!(!app.published);
    }

    #[test]
    fn test_summary_reads_nested_fields() {
        let app = AppSummary::from_json(&json!({
            "id": "a1",
            "name": "Sales Report",
            "owner": {"id": "u1", "name": "Dana"},
            "spaceId": "s1",
            "space": {"name": "Finance"},
            "tags": ["sales", {"name": "kpi"}],
            "published": true,
            "usage": "DIRECT_QUERY"
        }));
        assert_eq!(app.owner.name, "Dana");
        assert_eq!(app.space_id, "s1");
        assert_eq!(app.space_name, "Finance");
        assert_eq!(app.tags, vec!["sales", "kpi"]);
        assert!(app.published);
        assert_eq!(app.usage, "DIRECT_QUERY");
    }

    #[test]
    fn test_summary_tolerates_nulls_and_unnamed_tags() {
        let app = AppSummary::from_json(&json!({
            "id": "a1",
            "name": null,
            "owner": null,
            "space": {"name": null},
            "tags": ["sales", 7, {"label": "ignored"}, {"id": "t2", "name": "kpi"}],
            "usage": ""
        }));
        assert_eq!(app.id, "a1");
        assert_eq!(app.name, "");
        assert_eq!(app.owner, Owner::default());
        assert_eq!(app.space_name, "");
        assert_eq!(app.tags, vec!["sales", "kpi"]);
        assert_eq!(app.usage, "analytics");
    }

    #[test]
    fn test_detail_lineage_only_when_present() {
        let plain = AppDetail::from_json(&json!({"id": "a1", "originAppId": ""}));
        assert!(plain.origin_app_id.is_none());
        let rendered = serde_json::to_value(&plain).unwrap();
        assert!(rendered.get("origin_app_id").is_none());

        let copy = AppDetail::from_json(&json!({
            "id": "a2",
            "originAppId": "a1",
            "fileSize": 2048,
            "space": {"name": "Prod", "type": "managed"},
            "owner": {"email": "dana@example.com"}
        }));
        assert_eq!(copy.origin_app_id.as_deref(), Some("a1"));
        assert_eq!(copy.file_size, 2048);
        assert_eq!(copy.space.space_type, "managed");
        assert_eq!(copy.owner.email, "dana@example.com");
    }

    #[test]
    fn test_space_starts_with_unknown_count() {
        let space = Space::from_json(&json!({"id": "s1", "type": "Managed"}));
        assert_eq!(space.app_count, APP_COUNT_UNKNOWN);
        assert!(space.is_managed());
    }

    #[test]
    fn test_space_type_parse() {
        assert_eq!(SpaceType::parse("MANAGED").unwrap(), SpaceType::Managed);
        assert!(SpaceType::parse("team").is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(0.005), 0.01);
    }
}
