//! MCP tool surface over [`QlikClient`].
//!
//! Tool arguments deserialize into the typed parameter records in
//! [`crate::params`]. Operation results serialize to JSON content; a
//! [`QlikError`] becomes a tool result with `is_error = true` rather than a
//! protocol error. Unknown tools and malformed arguments are protocol errors.

pub mod tools;

use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, JsonObject, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::QlikError;
use crate::ops::{AppBuilder, AppDiscovery, AppLifecycle, ContextManager, QlikClient, SpaceCatalog};
use crate::params::{
    AppBuildParams, AppCopyParams, AppExportParams, AppGetParams, AppImportParams,
    AppListParams, AppPublishParams, AppSearchParams, AppUnbuildParams, ContextCreateParams,
    ContextNameParams, SpaceListParams,
};

/// MCP server exposing Qlik Cloud app lifecycle operations.
///
/// Cheap to clone; `StreamableHttpService` builds one per session and every
/// clone shares the same client.
#[derive(Clone, Debug)]
pub struct QlikMcpServer {
    client: Arc<QlikClient>,
    name: String,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Option<JsonObject>) -> Result<T, McpError> {
    let value = serde_json::Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| {
        McpError::invalid_params(format!("invalid arguments for {}: {}", tool, e), None)
    })
}

fn success<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("failed to serialize result: {}", e), None))?;
    Ok(CallToolResult {
        content: vec![Content::json(json)?],
        is_error: Some(false),
        structured_content: None,
        meta: None,
    })
}

fn failure(tool: &str, err: QlikError) -> CallToolResult {
    tracing::warn!(tool = %tool, kind = err.kind(), error = %err, "tool call failed");
    CallToolResult {
        content: vec![Content::text(err.to_string())],
        is_error: Some(true),
        structured_content: None,
        meta: None,
    }
}

fn respond<T: Serialize>(tool: &str, outcome: crate::Result<T>) -> Result<CallToolResult, McpError> {
    match outcome {
        Ok(value) => success(&value),
        Err(err) => Ok(failure(tool, err)),
    }
}

impl QlikMcpServer {
    pub fn new(client: QlikClient, name: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            name: name.into(),
        }
    }

    /// Route one tool call to its operation.
    pub async fn dispatch(
        &self,
        tool: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let qlik = self.client.as_ref();
        tracing::debug!(tool = %tool, "dispatching tool call");

        match tool {
            tools::APP_LIST => {
                let params: AppListParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_list(&params).await)
            }
            tools::APP_GET => {
                let params: AppGetParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_get(&params.app_identifier).await)
            }
            tools::APP_SEARCH => {
                let params: AppSearchParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_search(&params).await)
            }
            tools::SPACE_LIST => {
                let params: SpaceListParams = parse_args(tool, arguments)?;
                respond(tool, qlik.space_list(&params).await)
            }
            tools::APP_BUILD => {
                let params: AppBuildParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_build(&params).await)
            }
            tools::APP_UNBUILD => {
                let params: AppUnbuildParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_unbuild(&params).await)
            }
            tools::APP_EXPORT => {
                let params: AppExportParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_export(&params).await)
            }
            tools::APP_IMPORT => {
                let params: AppImportParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_import(&params).await)
            }
            tools::APP_COPY => {
                let params: AppCopyParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_copy(&params).await)
            }
            tools::APP_PUBLISH => {
                let params: AppPublishParams = parse_args(tool, arguments)?;
                respond(tool, qlik.app_publish(&params).await)
            }
            tools::CONTEXT_CREATE => {
                let params: ContextCreateParams = parse_args(tool, arguments)?;
                respond(tool, qlik.context_create(&params).await)
            }
            tools::CONTEXT_LIST => respond(tool, qlik.context_list().await),
            tools::CONTEXT_CURRENT => respond(tool, qlik.context_current().await),
            tools::CONTEXT_USE => {
                let params: ContextNameParams = parse_args(tool, arguments)?;
                respond(tool, qlik.context_use(&params.name).await)
            }
            tools::CONTEXT_REMOVE => {
                let params: ContextNameParams = parse_args(tool, arguments)?;
                respond(tool, qlik.context_remove(&params.name).await)
            }
            tools::CLI_VERSION => respond(tool, qlik.cli_version().await),
            tools::VALIDATE_CONNECTION => success(&qlik.validate_connection().await),
            other => Err(McpError::invalid_params(
                format!("unknown tool: {}", other),
                None,
            )),
        }
    }
}

impl ServerHandler for QlikMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Qlik Cloud app lifecycle through qlik-cli: discover, build, unbuild, export, \
                 import, copy and publish apps, and manage tenant contexts."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: tools::catalogue(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(&request.name, request.arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::client;
    use crate::testing::ScriptedRunner;
    use serde_json::{json, Value};

    fn server(runner: &Arc<ScriptedRunner>) -> QlikMcpServer {
        QlikMcpServer::new(client(runner), "qlik-mcp-server")
    }

    fn args(value: Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    fn body(result: &CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    #[test]
    fn test_get_info_uses_configured_name() {
        let runner = ScriptedRunner::new();
        let info = QlikMcpServer::new(client(&runner), "tenant-a").get_info();
        assert_eq!(info.server_info.name, "tenant-a");
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.is_some());
    }

    #[tokio::test]
    async fn test_app_get_serializes_result() {
        let runner = ScriptedRunner::new();
        runner.on(
            &["app", "get", "a1"],
            r#"{"id": "a1", "name": "Sales", "spaceId": "s1"}"#,
        );
        let result = server(&runner)
            .dispatch(tools::APP_GET, args(json!({"app_identifier": "a1"})))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        let payload: Value = serde_json::from_str(&body(&result)).unwrap();
        assert_eq!(payload["id"], "a1");
        assert_eq!(payload["name"], "Sales");
    }

    #[tokio::test]
    async fn test_domain_error_is_tool_error() {
        let runner = ScriptedRunner::new();
        let result = server(&runner)
            .dispatch(tools::APP_GET, args(json!({"app_identifier": "  "})))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(body(&result).starts_with("validation failed"));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let runner = ScriptedRunner::new();
        let err = server(&runner)
            .dispatch("qlik_app_delete", None)
            .await
            .unwrap_err();
        assert!(err.message.contains("qlik_app_delete"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_protocol_error() {
        let runner = ScriptedRunner::new();
        let err = server(&runner)
            .dispatch(tools::APP_EXPORT, args(json!({"app_identifier": "a1"})))
            .await
            .unwrap_err();
        assert!(err.message.contains("output_path"));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_argumentless_tools_accept_no_arguments() {
        let runner = ScriptedRunner::new();
        runner
            .on(&["version"], "qlik-cli 2.25.0")
            .on(&["context", "ls"], "NAME SERVER\nprod * https://prod.qlikcloud.com\n");
        let server = server(&runner);

        let version = server.dispatch(tools::CLI_VERSION, None).await.unwrap();
        assert!(body(&version).contains("2.25.0"));

        let current = server.dispatch(tools::CONTEXT_CURRENT, None).await.unwrap();
        let payload: Value = serde_json::from_str(&body(&current)).unwrap();
        assert_eq!(payload["current_context"], "prod");
    }

    #[tokio::test]
    async fn test_validate_connection_never_errors() {
        let runner = ScriptedRunner::new();
        let result = server(&runner)
            .dispatch(tools::VALIDATE_CONNECTION, None)
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        let payload: Value = serde_json::from_str(&body(&result)).unwrap();
        assert_eq!(payload["connected"], false);
    }

    #[tokio::test]
    async fn test_context_create_result_hides_key() {
        let runner = ScriptedRunner::new();
        runner
            .on(&["user", "me"], r#"{"name": "Dana"}"#)
            .on(&["context", "create"], "Context 'staging' created");
        let result = server(&runner)
            .dispatch(
                tools::CONTEXT_CREATE,
                args(json!({
                    "name": "staging",
                    "tenant_url": "https://staging.eu.qlikcloud.com",
                    "api_key": "abcdefghijklmnop"
                })),
            )
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        assert!(!body(&result).contains("abcdefghijklmnop"));
    }
}
