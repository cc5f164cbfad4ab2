//! Authentication contexts.
//!
//! Contexts live in qlik-cli's own storage. Every call re-reads them with
//! `context ls`; nothing is cached between calls.

use async_trait::async_trait;

use super::QlikClient;
use crate::cli::output::parse_context_listing;
use crate::cli::runner::CommandResult;
use crate::cli::validate::{require_non_empty, validate_tenant_url};
use crate::error::QlikError;
use crate::model::{ContextListing, CurrentContext};
use crate::params::ContextCreateParams;

/// Shortest API key accepted before the live credential check.
pub const MIN_API_KEY_LEN: usize = 10;

#[async_trait]
pub trait ContextManager {
    /// Check the key against the tenant with an authenticated call.
    async fn validate_api_key(&self, api_key: &str, tenant_url: &str) -> bool;

    async fn context_create(&self, params: &ContextCreateParams) -> crate::Result<CommandResult>;
    async fn context_list(&self) -> crate::Result<ContextListing>;
    async fn context_current(&self) -> crate::Result<CurrentContext>;
    async fn context_use(&self, name: &str) -> crate::Result<CommandResult>;

    /// Remove a context. The current context cannot be removed.
    async fn context_remove(&self, name: &str) -> crate::Result<CommandResult>;
}

fn not_found(name: &str, listing: &ContextListing) -> QlikError {
    QlikError::NotFound(format!(
        "context '{}' not found. Available contexts: {}",
        name,
        listing.names().join(", ")
    ))
}

#[async_trait]
impl ContextManager for QlikClient {
    async fn validate_api_key(&self, api_key: &str, tenant_url: &str) -> bool {
        tracing::info!(tenant = %tenant_url, "validating API key");
        match self
            .run_secret(self.commands.user_me(tenant_url, api_key))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(tenant = %tenant_url, error = %e, "API key validation failed");
                false
            }
        }
    }

    async fn context_create(&self, params: &ContextCreateParams) -> crate::Result<CommandResult> {
        let name = require_non_empty("context name", &params.name)?;
        let tenant_url = params.tenant_url.trim();
        validate_tenant_url(tenant_url)?;
        let api_key = params.api_key.trim();
        if api_key.len() < MIN_API_KEY_LEN {
            return Err(QlikError::Validation(
                "API key appears to be invalid (too short)".to_string(),
            ));
        }

        if !self.validate_api_key(api_key, tenant_url).await {
            return Err(QlikError::Validation(
                "API key validation failed: unable to authenticate with the provided credentials"
                    .to_string(),
            ));
        }

        let result = self
            .run_secret(self.commands.context_create(name, tenant_url, api_key))
            .await?;
        tracing::info!(context = %name, "created qlik context");
        Ok(result)
    }

    async fn context_list(&self) -> crate::Result<ContextListing> {
        let result = self.run(self.commands.context_list()).await?;
        let listing = parse_context_listing(&result.stdout);
        tracing::debug!(
            count = listing.contexts.len(),
            current = ?listing.current_context,
            "listed qlik contexts"
        );
        Ok(listing)
    }

    async fn context_current(&self) -> crate::Result<CurrentContext> {
        let listing = self.context_list().await?;
        let Some(current) = listing.current_context.clone() else {
            return Ok(CurrentContext {
                current_context: None,
                context_details: None,
                message: Some("No active context found".to_string()),
            });
        };
        let details = listing
            .contexts
            .into_iter()
            .rev()
            .find(|ctx| ctx.name == current);
        Ok(CurrentContext {
            current_context: Some(current),
            context_details: details,
            message: None,
        })
    }

    async fn context_use(&self, name: &str) -> crate::Result<CommandResult> {
        let name = require_non_empty("context name", name)?;
        let listing = self.context_list().await?;
        if !listing.contains(name) {
            return Err(not_found(name, &listing));
        }

        let result = self.run(self.commands.context_use(name)).await?;
        tracing::info!(context = %name, "switched qlik context");
        Ok(result)
    }

    async fn context_remove(&self, name: &str) -> crate::Result<CommandResult> {
        let name = require_non_empty("context name", name)?;
        let listing = self.context_list().await?;
        if listing.current_context.as_deref() == Some(name) {
            return Err(QlikError::Validation(format!(
                "cannot remove currently active context '{}'. Switch to another context first.",
                name
            )));
        }
        if !listing.contains(name) {
            return Err(not_found(name, &listing));
        }

        let result = self.run(self.commands.context_remove(name)).await?;
        tracing::info!(context = %name, "removed qlik context");
        Ok(result)
    }
}
