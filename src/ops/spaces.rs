//! Space listing with per-space app counts.

use async_trait::async_trait;

use super::discovery::AppDiscovery;
use super::QlikClient;
use crate::cli::output::parse_json_output;
use crate::error::QlikError;
use crate::model::{Space, SpaceListResult, SpaceType, APP_COUNT_UNKNOWN};
use crate::params::{AppListParams, SpaceListParams};

/// Upper bound of the per-space app count lookup.
pub const APP_COUNT_LIMIT: i64 = 1000;

#[async_trait]
pub trait SpaceCatalog {
    /// List spaces, counting the apps in each. A failed count is recorded
    /// as [`APP_COUNT_UNKNOWN`] and never fails the listing.
    async fn space_list(&self, params: &SpaceListParams) -> crate::Result<SpaceListResult>;

    /// Look up one space by ID without counting apps.
    async fn find_space(&self, space_id: &str) -> crate::Result<Space>;
}

impl QlikClient {
    async fn fetch_spaces(&self, type_filter: Option<SpaceType>) -> crate::Result<Vec<Space>> {
        let argv = self
            .commands
            .space_list(type_filter.as_ref().map(SpaceType::as_str));
        let result = self.run(argv).await?;
        Ok(parse_json_output(&result.stdout)
            .iter()
            .map(Space::from_json)
            .collect())
    }
}

#[async_trait]
impl SpaceCatalog for QlikClient {
    async fn space_list(&self, params: &SpaceListParams) -> crate::Result<SpaceListResult> {
        let type_filter = params
            .type_filter
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(SpaceType::parse)
            .transpose()?;

        let mut spaces = self.fetch_spaces(type_filter).await?;
        for space in &mut spaces {
            let count_query = AppListParams {
                space_id: Some(space.id.clone()),
                limit: APP_COUNT_LIMIT,
                ..AppListParams::default()
            };
            space.app_count = match self.app_list(&count_query).await {
                Ok(listing) => listing.total_count as i64,
                Err(e) => {
                    tracing::warn!(space = %space.id, error = %e, "could not count apps in space");
                    APP_COUNT_UNKNOWN
                }
            };
        }

        tracing::info!(count = spaces.len(), "listed qlik spaces");
        Ok(SpaceListResult {
            total_count: spaces.len(),
            spaces,
            type_filter: type_filter.map(|t| t.as_str().to_string()),
        })
    }

    async fn find_space(&self, space_id: &str) -> crate::Result<Space> {
        self.fetch_spaces(None)
            .await?
            .into_iter()
            .find(|space| space.id == space_id)
            .ok_or_else(|| {
                QlikError::NotFound(format!("space '{}' not found or not accessible", space_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::client;
    use crate::testing::ScriptedRunner;

    const SPACES: &str = r#"[
        {"id": "s1", "name": "Finance", "type": "shared"},
        {"id": "s2", "name": "Prod", "type": "managed"}
    ]"#;

    #[tokio::test]
    async fn test_failed_app_count_yields_sentinel() {
        let runner = ScriptedRunner::new();
        runner
            .on(&["space", "ls"], SPACES)
            .on(&["--space", "s1"], r#"[{"id": "a1"}, {"id": "a2"}]"#)
            .fail(
                &["--space", "s2"],
                QlikError::ExternalTool("qlik app ls failed with code 1: forbidden".into()),
            );

        let result = client(&runner)
            .space_list(&SpaceListParams::default())
            .await
            .unwrap();

        assert_eq!(result.total_count, 2);
        assert_eq!(result.spaces[0].app_count, 2);
        assert_eq!(result.spaces[1].app_count, APP_COUNT_UNKNOWN);
        assert_eq!(runner.count_matching(&["--limit", "1000"]), 2);
    }

    #[tokio::test]
    async fn test_type_filter_is_normalized_and_passed() {
        let runner = ScriptedRunner::new();
        runner.on(&["space", "ls"], "[]");
        let result = client(&runner)
            .space_list(&SpaceListParams {
                type_filter: Some("Managed".into()),
            })
            .await
            .unwrap();
        assert_eq!(result.type_filter.as_deref(), Some("managed"));
        assert_eq!(runner.count_matching(&["--type", "managed"]), 1);
    }

    #[tokio::test]
    async fn test_invalid_type_filter_spawns_nothing() {
        let runner = ScriptedRunner::new();
        let err = client(&runner)
            .space_list(&SpaceListParams {
                type_filter: Some("team".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QlikError::Validation(_)));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_find_space_does_not_count_apps() {
        let runner = ScriptedRunner::new();
        runner.on(&["space", "ls"], SPACES);
        let qlik = client(&runner);

        let space = qlik.find_space("s2").await.unwrap();
        assert!(space.is_managed());
        let err = qlik.find_space("s9").await.unwrap_err();
        assert!(matches!(err, QlikError::NotFound(_)));
        assert_eq!(runner.count_matching(&["app", "ls"]), 0);
    }
}
