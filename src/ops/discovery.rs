//! App listing, lookup and client-side search.

use async_trait::async_trait;

use super::QlikClient;
use crate::cli::output::parse_json_output;
use crate::cli::validate::{require_non_empty, require_non_negative};
use crate::error::QlikError;
use crate::model::{AppDetail, AppListResult, AppSearchResult, AppSummary, MatchReason, SearchHit};
use crate::params::{AppListParams, AppSearchParams};

/// Smallest candidate set fetched for a search.
pub const MIN_SEARCH_CANDIDATES: i64 = 100;

const NAME_SCORE: u32 = 10;
const DESCRIPTION_SCORE: u32 = 5;
const TAG_SCORE: u32 = 3;

#[async_trait]
pub trait AppDiscovery {
    async fn app_list(&self, params: &AppListParams) -> crate::Result<AppListResult>;

    /// Full details for one app. An empty answer is `NotFound`.
    async fn app_get(&self, app_identifier: &str) -> crate::Result<AppDetail>;

    /// Case-insensitive substring search over name, description and tags.
    async fn app_search(&self, params: &AppSearchParams) -> crate::Result<AppSearchResult>;
}

/// Score one app against a lowercased query; `None` when nothing matches.
fn score(app: &AppSummary, query: &str) -> Option<(u32, Vec<MatchReason>)> {
    let mut total = 0;
    let mut reasons = Vec::new();
    if app.name.to_lowercase().contains(query) {
        total += NAME_SCORE;
        reasons.push(MatchReason::Name);
    }
    if app.description.to_lowercase().contains(query) {
        total += DESCRIPTION_SCORE;
        reasons.push(MatchReason::Description);
    }
    if app.tags.iter().any(|tag| tag.to_lowercase().contains(query)) {
        total += TAG_SCORE;
        reasons.push(MatchReason::Tags);
    }
    (total > 0).then_some((total, reasons))
}

/// Rank `candidates` for `params`, highest score first, ties in input order.
pub fn rank(candidates: Vec<AppSummary>, params: &AppSearchParams) -> Vec<SearchHit> {
    let query = params.query.trim().to_lowercase();
    let owner = params.owner.as_deref().map(str::to_lowercase);

    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter_map(|app| {
            let (relevance_score, match_reasons) = score(&app, &query)?;
            Some(SearchHit {
                app,
                relevance_score,
                match_reasons,
            })
        })
        .filter(|hit| match &params.space_id {
            Some(space) => &hit.app.space_id == space,
            None => true,
        })
        .filter(|hit| match &owner {
            Some(owner) => hit.app.owner.name.to_lowercase().contains(owner),
            None => true,
        })
        .collect();

    // sort_by is stable, so equal scores keep list order
    hits.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    hits.truncate(params.limit.max(0) as usize);
    hits
}

#[async_trait]
impl AppDiscovery for QlikClient {
    async fn app_list(&self, params: &AppListParams) -> crate::Result<AppListResult> {
        let argv = self.commands.app_list(params)?;
        let result = self.run(argv).await?;
        let apps: Vec<AppSummary> = parse_json_output(&result.stdout)
            .iter()
            .map(AppSummary::from_json)
            .collect();

        tracing::info!(count = apps.len(), "listed qlik apps");
        Ok(AppListResult {
            total_count: apps.len(),
            apps,
            filters_applied: params.clone(),
        })
    }

    async fn app_get(&self, app_identifier: &str) -> crate::Result<AppDetail> {
        let app_identifier = require_non_empty("app identifier", app_identifier)?;
        let result = self.run(self.commands.app_get(app_identifier)).await?;
        let records = parse_json_output(&result.stdout);
        let first = records.first().ok_or_else(|| {
            QlikError::NotFound(format!("no app found with identifier: {}", app_identifier))
        })?;

        tracing::debug!(app = %app_identifier, "retrieved app details");
        Ok(AppDetail::from_json(first))
    }

    async fn app_search(&self, params: &AppSearchParams) -> crate::Result<AppSearchResult> {
        let query = require_non_empty("search query", &params.query)?;
        let limit = require_non_negative("limit", params.limit)? as i64;

        let candidates = self
            .app_list(&AppListParams {
                limit: limit.saturating_mul(5).max(MIN_SEARCH_CANDIDATES),
                ..AppListParams::default()
            })
            .await?;
        let search_performed_on = candidates.apps.len();
        let hits = rank(candidates.apps, params);

        tracing::info!(
            query = %query,
            matches = hits.len(),
            candidates = search_performed_on,
            "searched qlik apps"
        );
        Ok(AppSearchResult {
            query: query.to_string(),
            total_matches: hits.len(),
            apps: hits,
            search_performed_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::client;
    use crate::testing::ScriptedRunner;

    const APPS: &str = r#"[
        {"id": "a1", "name": "Inventory", "description": "stock levels", "tags": ["sales"], "spaceId": "s1"},
        {"id": "a2", "name": "Sales Report", "description": "quarterly", "tags": [], "spaceId": "s2",
         "owner": {"id": "u1", "name": "Dana Reyes"}},
        {"id": "a3", "name": "HR", "description": "headcount", "tags": ["people"]}
    ]"#;

    #[tokio::test]
    async fn test_search_ranks_name_above_tag() {
        let runner = ScriptedRunner::new();
        runner.on(&["app", "ls"], APPS);

        let result = client(&runner)
            .app_search(&AppSearchParams::new("sales", 20))
            .await
            .unwrap();

        let ranked: Vec<(&str, u32)> = result
            .apps
            .iter()
            .map(|hit| (hit.app.name.as_str(), hit.relevance_score))
            .collect();
        assert_eq!(ranked, vec![("Sales Report", 10), ("Inventory", 3)]);
        assert_eq!(result.apps[0].match_reasons, vec![MatchReason::Name]);
        assert_eq!(result.apps[1].match_reasons, vec![MatchReason::Tags]);
        assert_eq!(result.search_performed_on, 3);
        assert_eq!(result.total_matches, 2);
    }

    #[tokio::test]
    async fn test_search_fetches_broadened_candidate_set() {
        let runner = ScriptedRunner::new();
        runner.on(&["app", "ls"], "[]");
        let qlik = client(&runner);

        qlik.app_search(&AppSearchParams::new("x", 20)).await.unwrap();
        qlik.app_search(&AppSearchParams::new("x", 40)).await.unwrap();

        let calls = runner.calls();
        assert!(calls[0].ends_with(&["--limit".to_string(), "100".to_string()]));
        assert!(calls[1].ends_with(&["--limit".to_string(), "200".to_string()]));
    }

    #[tokio::test]
    async fn test_search_empty_query_spawns_nothing() {
        let runner = ScriptedRunner::new();
        let err = client(&runner)
            .app_search(&AppSearchParams::new("   ", 20))
            .await
            .unwrap_err();
        assert!(matches!(err, QlikError::Validation(_)));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_rank_ties_keep_order_and_truncate() {
        let apps: Vec<AppSummary> = ["alpha one", "beta", "alpha two", "alpha three"]
            .iter()
            .map(|name| AppSummary {
                name: name.to_string(),
                ..AppSummary::default()
            })
            .collect();
        let hits = rank(apps, &AppSearchParams::new("ALPHA", 2));
        let names: Vec<&str> = hits.iter().map(|h| h.app.name.as_str()).collect();
        assert_eq!(names, vec!["alpha one", "alpha two"]);
    }

    #[test]
    fn test_rank_applies_space_and_owner_filters() {
        let apps = vec![
            AppSummary {
                name: "Sales EU".into(),
                space_id: "s1".into(),
                ..AppSummary::default()
            },
            AppSummary {
                name: "Sales US".into(),
                space_id: "s2".into(),
                owner: crate::model::Owner {
                    id: "u1".into(),
                    name: "Dana Reyes".into(),
                },
                ..AppSummary::default()
            },
        ];
        let mut params = AppSearchParams::new("sales", 10);
        params.owner = Some("dana".into());
        let hits = rank(apps.clone(), &params);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].app.name, "Sales US");

        let mut params = AppSearchParams::new("sales", 10);
        params.space_id = Some("s1".into());
        let hits = rank(apps, &params);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].app.name, "Sales EU");
    }

    #[tokio::test]
    async fn test_app_get_empty_output_is_not_found() {
        let runner = ScriptedRunner::new();
        runner.on(&["app", "get"], "");
        let err = client(&runner).app_get("missing").await.unwrap_err();
        assert_eq!(
            err,
            QlikError::NotFound("no app found with identifier: missing".into())
        );
    }

    #[tokio::test]
    async fn test_app_get_builds_detail() {
        let runner = ScriptedRunner::new();
        runner.on(
            &["app", "get", "a1"],
            r#"{"id": "a1", "name": "Sales", "space": {"name": "Finance", "type": "shared"}, "spaceId": "s1"}"#,
        );
        let app = client(&runner).app_get("a1").await.unwrap();
        assert_eq!(app.name, "Sales");
        assert_eq!(app.space.id, "s1");
        assert_eq!(
            runner.calls()[0],
            vec!["qlik", "app", "get", "a1", "--json"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_app_list_propagates_tool_failure() {
        let runner = ScriptedRunner::new();
        runner.fail(
            &["app", "ls"],
            QlikError::ExternalTool("qlik app ls --json failed with code 1: 401 Unauthorized".into()),
        );
        let err = client(&runner)
            .app_list(&AppListParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QlikError::ExternalTool(ref m) if m.contains("401")));
    }
}
