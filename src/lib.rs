//! Qlik MCP: Qlik Cloud app lifecycle as MCP tools, driven through qlik-cli.
//! Discovery, build and unbuild, export, import, copy, publish and tenant
//! contexts, each validated before qlik-cli is spawned.

pub mod cli;
pub mod config;
pub mod error;
pub mod file_tree;
pub mod model;
pub mod ops;
pub mod params;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{CommandBuilder, CommandResult, ExportFormat, ProcessRunner, TokioProcessRunner};
pub use config::{parse_env_ref, CliSettings, QlikConfig, ServerSettings};
pub use error::{QlikError, Result};
pub use file_tree::{read_file_tree, FileRecord, UnbuildFileTree};
pub use ops::{AppBuilder, AppDiscovery, AppLifecycle, ContextManager, QlikClient, SpaceCatalog};
pub use server::QlikMcpServer;
