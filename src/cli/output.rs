//! Parsers for qlik-cli stdout.
//!
//! qlik-cli emits JSON for `--json` subcommands, a whitespace table for
//! `context ls`, and free text for lifecycle commands. None of these parsers
//! fail: unusable input yields an empty or `None` result.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{ContextEntry, ContextListing};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("valid regex"))
        .collect()
}

/// ID-bearing phrases printed by `qlik app import`.
pub static IMPORT_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"App ID:\s*([a-f0-9-]+)",
        r"Created app:\s*([a-f0-9-]+)",
        r"app\s+([a-f0-9-]+)\s+created",
        r#""id":\s*"([a-f0-9-]+)""#,
    ])
});

/// ID-bearing phrases printed by `qlik app copy`.
pub static COPY_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"App ID:\s*([a-f0-9-]+)",
        r"Copied to:\s*([a-f0-9-]+)",
        r"app\s+([a-f0-9-]+)\s+created",
        r#""id":\s*"([a-f0-9-]+)""#,
    ])
});

/// ID-bearing phrases printed by `qlik app publish`.
pub static PUBLISH_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"Published app ID:\s*([a-f0-9-]+)",
        r"Published to:\s*([a-f0-9-]+)",
        r"app\s+([a-f0-9-]+)\s+published",
        r#""id":\s*"([a-f0-9-]+)""#,
    ])
});

/// Parse qlik-cli JSON output into records.
///
/// The whole text is tried first: an array yields its elements, any other
/// value yields one record. Otherwise every non-empty line is parsed on its
/// own and lines that are not JSON are skipped.
pub fn parse_json_output(text: &str) -> Vec<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(items) => items,
            other => vec![other],
        };
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(
            skipped,
            parsed = records.len(),
            "skipped qlik-cli output lines that were not JSON"
        );
    }
    records
}

/// Whether a `context ls` column is a current-context marker. Only whole
/// tokens count, so names and hosts containing "current" are not markers.
fn is_current_marker(token: &str) -> bool {
    token == "*"
        || token.eq_ignore_ascii_case("current")
        || token.eq_ignore_ascii_case("(current)")
}

/// Parse the table printed by `qlik context ls`.
///
/// The first column is the context name; a line starting with `NAME` is the
/// header. When several lines are marked current, the last one names
/// `current_context` and is the only entry flagged `is_current`.
pub fn parse_context_listing(text: &str) -> ContextListing {
    let mut listing = ContextListing::default();
    let mut current_index = None;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("NAME") {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        // Some qlik-cli versions print the marker as its own leading column
        let (name, mut marked) = if first == "*" {
            match tokens.next() {
                Some(name) => (name, true),
                None => continue,
            }
        } else {
            match first.strip_suffix('*') {
                Some(name) if !name.is_empty() => (name, true),
                _ => (first, false),
            }
        };
        marked |= tokens.any(is_current_marker);
        if marked {
            current_index = Some(listing.contexts.len());
        }
        listing.contexts.push(ContextEntry {
            name: name.to_string(),
            is_current: false,
        });
    }
    if let Some(index) = current_index {
        let entry = &mut listing.contexts[index];
        entry.is_current = true;
        listing.current_context = Some(entry.name.clone());
    }
    listing
}

/// First capture of the first pattern that matches `text`.
pub fn extract_app_id(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_delimited_records() {
        let records = parse_json_output("{\"a\":1}\n{\"b\":2}");
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_whole_array_and_object() {
        assert_eq!(
            parse_json_output(r#"[{"id":"x"},{"id":"y"}]"#),
            vec![json!({"id": "x"}), json!({"id": "y"})]
        );
        assert_eq!(
            parse_json_output("  {\"id\": \"x\"}\n"),
            vec![json!({"id": "x"})]
        );
    }

    #[test]
    fn test_empty_output_is_empty() {
        assert!(parse_json_output("").is_empty());
        assert!(parse_json_output("  \n\t").is_empty());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let records = parse_json_output("{\"a\":1}\nnot json at all\n{\"b\":2}\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], json!({"b": 2}));
    }

    #[test]
    fn test_context_listing_header_and_marker() {
        let listing = parse_context_listing(
            "NAME     SERVER                        CURRENT\n\
             dev      https://dev.qlikcloud.com\n\
             prod     https://prod.qlikcloud.com    *\n",
        );
        assert_eq!(listing.names(), vec!["dev", "prod"]);
        assert!(!listing.contexts[0].is_current);
        assert!(listing.contexts[1].is_current);
        assert_eq!(listing.current_context.as_deref(), Some("prod"));
    }

    #[test]
    fn test_context_listing_leading_star_column() {
        let listing = parse_context_listing("  dev\n* prod\n");
        assert_eq!(listing.names(), vec!["dev", "prod"]);
        assert_eq!(listing.current_context.as_deref(), Some("prod"));
    }

    #[test]
    fn test_context_listing_last_marked_wins() {
        let listing = parse_context_listing("a *\nb (current)\nc\n");
        assert!(!listing.contexts[0].is_current);
        assert!(listing.contexts[1].is_current);
        assert!(!listing.contexts[2].is_current);
        assert_eq!(listing.current_context.as_deref(), Some("b"));
    }

    #[test]
    fn test_context_listing_ignores_current_inside_names_and_hosts() {
        let listing = parse_context_listing(
            "NAME SERVER\n\
             prod * https://prod.qlikcloud.com\n\
             recurrent https://recurrent.qlikcloud.com\n\
             qa https://concurrent.eu.qlikcloud.com\n",
        );
        assert_eq!(listing.names(), vec!["prod", "recurrent", "qa"]);
        assert_eq!(listing.current_context.as_deref(), Some("prod"));
        let flagged: Vec<&str> = listing
            .contexts
            .iter()
            .filter(|ctx| ctx.is_current)
            .map(|ctx| ctx.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["prod"]);
    }

    #[test]
    fn test_context_listing_trailing_star_on_name() {
        let listing = parse_context_listing("dev\nprod*  https://prod.qlikcloud.com\n");
        assert_eq!(listing.names(), vec!["dev", "prod"]);
        assert_eq!(listing.current_context.as_deref(), Some("prod"));
    }

    #[test]
    fn test_context_listing_empty() {
        let listing = parse_context_listing("");
        assert!(listing.contexts.is_empty());
        assert!(listing.current_context.is_none());
    }

    #[test]
    fn test_extract_import_id() {
        assert_eq!(
            extract_app_id("Created app: 3f2a-99bc\n", &IMPORT_ID_PATTERNS).as_deref(),
            Some("3f2a-99bc")
        );
        assert_eq!(
            extract_app_id(r#"{"id": "abc-123", "name": "Sales"}"#, &IMPORT_ID_PATTERNS).as_deref(),
            Some("abc-123")
        );
        assert!(extract_app_id("done", &IMPORT_ID_PATTERNS).is_none());
    }

    #[test]
    fn test_extract_copy_and_publish_ids() {
        assert_eq!(
            extract_app_id("copied to: beef-01", &COPY_ID_PATTERNS).as_deref(),
            Some("beef-01")
        );
        assert_eq!(
            extract_app_id("App cafe-02 published", &PUBLISH_ID_PATTERNS).as_deref(),
            Some("cafe-02")
        );
    }
}
