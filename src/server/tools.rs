//! Tool catalogue exposed over MCP.

use std::sync::Arc;

use rmcp::model::Tool;
use serde_json::{json, Value};

pub const APP_LIST: &str = "qlik_app_list";
pub const APP_GET: &str = "qlik_app_get";
pub const APP_SEARCH: &str = "qlik_app_search";
pub const SPACE_LIST: &str = "qlik_space_list";
pub const APP_BUILD: &str = "qlik_app_build";
pub const APP_UNBUILD: &str = "qlik_app_unbuild";
pub const APP_EXPORT: &str = "qlik_app_export";
pub const APP_IMPORT: &str = "qlik_app_import";
pub const APP_COPY: &str = "qlik_app_copy";
pub const APP_PUBLISH: &str = "qlik_app_publish";
pub const CONTEXT_CREATE: &str = "qlik_context_create";
pub const CONTEXT_LIST: &str = "qlik_context_list";
pub const CONTEXT_CURRENT: &str = "qlik_context_current";
pub const CONTEXT_USE: &str = "qlik_context_use";
pub const CONTEXT_REMOVE: &str = "qlik_context_remove";
pub const CLI_VERSION: &str = "qlik_cli_version";
pub const VALIDATE_CONNECTION: &str = "qlik_validate_connection";

fn tool(name: &'static str, description: &'static str, schema: Value) -> Tool {
    Tool {
        name: name.into(),
        title: None,
        description: Some(description.into()),
        input_schema: Arc::new(schema.as_object().cloned().unwrap_or_default()),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn no_arguments() -> Value {
    object(json!({}), &[])
}

fn path_list(what: &str) -> Value {
    json!({
        "description": format!("Path or list of paths to {} JSON files", what),
        "oneOf": [
            {"type": "string"},
            {"type": "array", "items": {"type": "string"}}
        ]
    })
}

/// Every tool this server answers, in a stable order.
pub fn catalogue() -> Vec<Tool> {
    vec![
        tool(
            APP_LIST,
            "List Qlik Cloud apps, optionally filtered by space, collection or owner.",
            object(
                json!({
                    "space_id": {"type": "string"},
                    "collection_id": {"type": "string"},
                    "owner": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 0, "default": 50},
                    "offset": {"type": "integer", "minimum": 0, "default": 0}
                }),
                &[],
            ),
        ),
        tool(
            APP_GET,
            "Get full details of one app by ID or name.",
            object(
                json!({"app_identifier": {"type": "string"}}),
                &["app_identifier"],
            ),
        ),
        tool(
            APP_SEARCH,
            "Search apps by name, description and tags, ranked by relevance.",
            object(
                json!({
                    "query": {"type": "string"},
                    "limit": {"type": "integer", "minimum": 0, "default": 20},
                    "space_id": {"type": "string"},
                    "owner": {"type": "string", "description": "Substring of the owner's name"}
                }),
                &["query"],
            ),
        ),
        tool(
            SPACE_LIST,
            "List spaces with the number of apps in each (-1 when unknown).",
            object(
                json!({
                    "type_filter": {"type": "string", "enum": ["personal", "shared", "managed"]}
                }),
                &[],
            ),
        ),
        tool(
            APP_BUILD,
            "Build an app from script, connection, object and property files.",
            object(
                json!({
                    "app": {"type": "string"},
                    "connections": {"type": "string", "description": "Path to a connections yml file"},
                    "script": {"type": "string", "description": "Path to a .qvs load script"},
                    "dimensions": path_list("dimension"),
                    "measures": path_list("measure"),
                    "objects": path_list("object"),
                    "variables": path_list("variable"),
                    "bookmarks": path_list("bookmark"),
                    "app_properties": {"type": "string", "description": "Path to an app properties JSON file"},
                    "limit": {"type": "integer", "minimum": 0, "description": "Rows to load"},
                    "no_data": {"type": "boolean", "default": false},
                    "no_reload": {"type": "boolean", "default": false},
                    "no_save": {"type": "boolean", "default": false},
                    "silent": {"type": "boolean", "default": false}
                }),
                &["app"],
            ),
        ),
        tool(
            APP_UNBUILD,
            "Unbuild an app into script, object and property files, returning their contents.",
            object(
                json!({
                    "app": {"type": "string"},
                    "dir": {"type": "string", "description": "Target directory"},
                    "no_data": {"type": "boolean", "default": false}
                }),
                &["app"],
            ),
        ),
        tool(
            APP_EXPORT,
            "Export an app to a local qvf, json or xlsx file.",
            object(
                json!({
                    "app_identifier": {"type": "string"},
                    "output_path": {"type": "string"},
                    "format": {"type": "string", "enum": ["qvf", "json", "xlsx"], "default": "qvf"},
                    "include_data": {"type": "boolean", "default": true},
                    "no_data": {"type": "boolean", "default": false}
                }),
                &["app_identifier", "output_path"],
            ),
        ),
        tool(
            APP_IMPORT,
            "Import an app from a local file.",
            object(
                json!({
                    "file_path": {"type": "string"},
                    "app_name": {"type": "string", "description": "Defaults to the file name"},
                    "space_id": {"type": "string"},
                    "replace_existing": {"type": "boolean", "default": false},
                    "validate_before_import": {"type": "boolean", "default": true}
                }),
                &["file_path"],
            ),
        ),
        tool(
            APP_COPY,
            "Copy an app within the tenant.",
            object(
                json!({
                    "source_app_id": {"type": "string"},
                    "target_name": {"type": "string"},
                    "target_space_id": {"type": "string", "description": "Defaults to the source app's space"},
                    "include_data": {"type": "boolean", "default": true},
                    "copy_permissions": {"type": "boolean", "default": false}
                }),
                &["source_app_id", "target_name"],
            ),
        ),
        tool(
            APP_PUBLISH,
            "Publish an app to a managed space.",
            object(
                json!({
                    "app_id": {"type": "string"},
                    "target_space_id": {"type": "string"},
                    "publish_name": {"type": "string", "description": "Defaults to the source app's name"},
                    "replace_existing": {"type": "boolean", "default": false}
                }),
                &["app_id", "target_space_id"],
            ),
        ),
        tool(
            CONTEXT_CREATE,
            "Create a qlik-cli context for a tenant after checking the API key.",
            object(
                json!({
                    "name": {"type": "string"},
                    "tenant_url": {"type": "string", "description": "https://<tenant>.qlikcloud.com"},
                    "api_key": {"type": "string"}
                }),
                &["name", "tenant_url", "api_key"],
            ),
        ),
        tool(CONTEXT_LIST, "List qlik-cli contexts.", no_arguments()),
        tool(
            CONTEXT_CURRENT,
            "Show the active qlik-cli context.",
            no_arguments(),
        ),
        tool(
            CONTEXT_USE,
            "Switch the active qlik-cli context.",
            object(json!({"name": {"type": "string"}}), &["name"]),
        ),
        tool(
            CONTEXT_REMOVE,
            "Remove a qlik-cli context other than the active one.",
            object(json!({"name": {"type": "string"}}), &["name"]),
        ),
        tool(CLI_VERSION, "Report the qlik-cli version.", no_arguments()),
        tool(
            VALIDATE_CONNECTION,
            "Check that qlik-cli is reachable with the configured tenant.",
            no_arguments(),
        ),
    ]
}
