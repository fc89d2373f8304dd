use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{ALLOWED_STATUS_CODES, RedirectGraph, RedirectKind, RedirectMap, read_document};

const REQUIRED_RULE_FIELDS: [&str; 4] = ["source", "destination", "type", "status_code"];

/// Chains with more nodes than this are reported.
pub const MAX_CHAIN_NODES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ExternalSchema,
    SchemaBasics,
    RedirectObjects,
    DuplicateSources,
    SelfRedirects,
    CircularRedirects,
    ChainLength,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExternalSchema => "external_schema",
            Self::SchemaBasics => "schema_basics",
            Self::RedirectObjects => "redirect_objects",
            Self::DuplicateSources => "duplicate_sources",
            Self::SelfRedirects => "self_redirects",
            Self::CircularRedirects => "circular_redirects",
            Self::ChainLength => "chain_length",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub check: Check,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub rule_count: usize,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub cycles: Vec<Vec<String>>,
    pub long_chains: Vec<Vec<String>>,
}

impl ValidationReport {
    pub fn error_messages(&self) -> Vec<&str> {
        self.errors.iter().map(|item| item.message.as_str()).collect()
    }

    pub fn warning_messages(&self) -> Vec<&str> {
        self.warnings
            .iter()
            .map(|item| item.message.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub schema_path: Option<PathBuf>,
}

/// Runs every structural and graph check over a parsed (not yet typed)
/// redirect map document.
#[derive(Debug)]
pub struct RedirectValidator<'a> {
    document: &'a Value,
    rules: &'a [Value],
    errors: Vec<Finding>,
    warnings: Vec<Finding>,
    cycles: Vec<Vec<String>>,
    long_chains: Vec<Vec<String>>,
}

impl<'a> RedirectValidator<'a> {
    pub fn new(document: &'a Value) -> Self {
        let rules = document
            .get("redirects")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Self {
            document,
            rules,
            errors: Vec::new(),
            warnings: Vec::new(),
            cycles: Vec::new(),
            long_chains: Vec::new(),
        }
    }

    /// Every check runs even when an earlier one fails, so a single pass
    /// reports all problems.
    pub fn validate_all(mut self) -> ValidationReport {
        let mut valid = true;
        valid &= self.check_schema_basics();
        valid &= self.check_redirect_objects();
        valid &= self.check_duplicate_sources();
        valid &= self.check_self_redirects();
        valid &= self.check_circular_redirects();
        valid &= self.check_chain_length();
        self.finish(valid)
    }

    /// Adds findings produced outside the validator (external schema) before
    /// the built-in checks run.
    pub fn absorb(&mut self, errors: Vec<Finding>, warnings: Vec<Finding>) {
        self.errors.extend(errors);
        self.warnings.extend(warnings);
    }

    fn finish(self, valid: bool) -> ValidationReport {
        let valid = valid && self.errors.is_empty();
        info!(
            rules = self.rules.len(),
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            valid,
            "redirect map validation finished"
        );
        ValidationReport {
            valid,
            rule_count: self.rules.len(),
            errors: self.errors,
            warnings: self.warnings,
            cycles: self.cycles,
            long_chains: self.long_chains,
        }
    }

    pub fn check_schema_basics(&mut self) -> bool {
        debug!("checking schema basics");
        let document = self.document;
        let Some(object) = document.as_object() else {
            self.error(Check::SchemaBasics, "Redirect map must be a JSON object");
            return false;
        };

        let mut ok = true;
        match object.get("version") {
            None => {
                self.error(Check::SchemaBasics, "Missing required field: 'version'");
                ok = false;
            }
            Some(version) if !version.is_string() => {
                self.error(Check::SchemaBasics, "Field 'version' must be a string");
                ok = false;
            }
            Some(_) => {}
        }

        match object.get("redirects") {
            None => {
                self.error(Check::SchemaBasics, "Missing required field: 'redirects'");
                return false;
            }
            Some(redirects) => match redirects.as_array() {
                None => {
                    self.error(Check::SchemaBasics, "Field 'redirects' must be an array");
                    return false;
                }
                Some(array) if array.is_empty() => {
                    self.warning(Check::SchemaBasics, "No redirects defined");
                }
                Some(_) => {}
            },
        }
        ok
    }

    pub fn check_redirect_objects(&mut self) -> bool {
        let rules = self.rules;
        debug!(rules = rules.len(), "checking redirect rules");
        let mut ok = true;
        for (index, rule) in rules.iter().enumerate() {
            let number = index + 1;
            let Some(object) = rule.as_object() else {
                self.error(
                    Check::RedirectObjects,
                    format!("Redirect #{number}: Must be an object"),
                );
                ok = false;
                continue;
            };

            for field in REQUIRED_RULE_FIELDS {
                if !object.contains_key(field) {
                    self.error(
                        Check::RedirectObjects,
                        format!("Redirect #{number}: Missing required field '{field}'"),
                    );
                    ok = false;
                }
            }

            for (field, label) in [("source", "Source"), ("destination", "Destination")] {
                let Some(value) = object.get(field) else {
                    continue;
                };
                match value.as_str() {
                    Some(path) if path.starts_with('/') => {}
                    Some(path) => {
                        self.error(
                            Check::RedirectObjects,
                            format!(
                                "Redirect #{number}: {label} path must start with '/' - got: {path}"
                            ),
                        );
                        ok = false;
                    }
                    None => {
                        self.error(
                            Check::RedirectObjects,
                            format!(
                                "Redirect #{number}: {label} path must be a string - got: {value}"
                            ),
                        );
                        ok = false;
                    }
                }
            }

            let kind = match object.get("type") {
                None => None,
                Some(value) => {
                    let parsed = value.as_str().and_then(RedirectKind::parse);
                    if parsed.is_none() {
                        self.error(
                            Check::RedirectObjects,
                            format!(
                                "Redirect #{number}: Type must be 'permanent' or 'temporary' - got: {}",
                                display_value(value)
                            ),
                        );
                        ok = false;
                    }
                    parsed
                }
            };

            let status = object.get("status_code");
            if let Some(value) = status
                && status_code(value).is_none_or(|code| !ALLOWED_STATUS_CODES.contains(&code))
            {
                self.error(
                    Check::RedirectObjects,
                    format!(
                        "Redirect #{number}: Status code must be 301, 302, 307, or 308 - got: {}",
                        display_value(value)
                    ),
                );
                ok = false;
            }

            if let (Some(kind), Some(value)) = (kind, status)
                && !status_code(value).is_some_and(|code| kind.accepts_status(code))
            {
                let [first, second] = kind.expected_status_codes();
                self.warning(
                    Check::RedirectObjects,
                    format!(
                        "Redirect #{number}: Type is '{}' but status code is {} (expected {first} or {second})",
                        kind.as_str(),
                        display_value(value)
                    ),
                );
            }
        }
        ok
    }

    pub fn check_duplicate_sources(&mut self) -> bool {
        debug!("checking for duplicate sources");
        let rules = self.rules;
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut duplicates = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            let Some(source) = rule.get("source").and_then(Value::as_str) else {
                continue;
            };
            match first_seen.get(source) {
                Some(first) => duplicates.push(format!(
                    "Source '{source}' appears in redirects #{} and #{}",
                    first + 1,
                    index + 1
                )),
                None => {
                    first_seen.insert(source, index);
                }
            }
        }
        let ok = duplicates.is_empty();
        for message in duplicates {
            self.error(Check::DuplicateSources, message);
        }
        ok
    }

    pub fn check_self_redirects(&mut self) -> bool {
        debug!("checking for self-redirects");
        let rules = self.rules;
        let mut found = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            let source = rule.get("source").and_then(Value::as_str);
            let destination = rule.get("destination").and_then(Value::as_str);
            if let (Some(source), Some(destination)) = (source, destination)
                && source == destination
            {
                found.push(format!(
                    "Redirect #{}: Source and destination are identical: {source}",
                    index + 1
                ));
            }
        }
        let ok = found.is_empty();
        for message in found {
            self.error(Check::SelfRedirects, message);
        }
        ok
    }

    pub fn check_circular_redirects(&mut self) -> bool {
        debug!("checking for circular redirects");
        let graph = self.graph();
        let mut messages: Vec<String> = Vec::new();
        for source in graph.sources() {
            let Some(cycle) = find_cycle_from(&graph, source) else {
                continue;
            };
            let message = format!("Circular redirect: {}", cycle.join(" -> "));
            if messages.contains(&message) {
                continue;
            }
            messages.push(message);
            self.cycles.push(cycle);
        }
        let ok = messages.is_empty();
        for message in messages {
            self.error(Check::CircularRedirects, message);
        }
        ok
    }

    /// Long chains are warnings only and never fail validation.
    pub fn check_chain_length(&mut self) -> bool {
        debug!("checking redirect chain lengths");
        let graph = self.graph();
        let mut long_chains = Vec::new();
        for source in graph.sources() {
            let chain = follow_chain(&graph, source);
            if chain.len() > MAX_CHAIN_NODES {
                long_chains.push(chain);
            }
        }
        if !long_chains.is_empty() {
            warn!(
                count = long_chains.len(),
                "redirect chains longer than {MAX_CHAIN_NODES} nodes"
            );
        }
        for chain in long_chains {
            self.warning(
                Check::ChainLength,
                format!(
                    "Long chain ({} hops): {}",
                    chain.len() - 1,
                    chain.join(" -> ")
                ),
            );
            self.long_chains.push(chain);
        }
        true
    }

    fn graph(&self) -> RedirectGraph {
        RedirectGraph::from_edges(self.rules.iter().filter_map(|rule| {
            let source = rule.get("source").and_then(Value::as_str)?;
            let destination = rule.get("destination").and_then(Value::as_str)?;
            Some((source, destination))
        }))
    }

    fn error(&mut self, check: Check, message: impl Into<String>) {
        self.errors.push(Finding {
            check,
            message: message.into(),
        });
    }

    fn warning(&mut self, check: Check, message: impl Into<String>) {
        self.warnings.push(Finding {
            check,
            message: message.into(),
        });
    }
}

/// Depth-first walk from `start`. The visited set and path are local to this
/// walk; the returned cycle starts and ends at the repeated node.
pub fn find_cycle_from<'g>(graph: &'g RedirectGraph, start: &'g str) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    walk_for_cycle(graph, start, &mut visited, &mut path)
}

fn walk_for_cycle<'g>(
    graph: &'g RedirectGraph,
    node: &'g str,
    visited: &mut HashSet<&'g str>,
    path: &mut Vec<&'g str>,
) -> Option<Vec<String>> {
    if visited.contains(node) {
        let start = path.iter().position(|item| *item == node)?;
        let mut cycle: Vec<String> = path[start..].iter().map(|item| item.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    let next = graph.next(node)?;

    visited.insert(node);
    path.push(node);
    if let Some(cycle) = walk_for_cycle(graph, next, visited, path) {
        return Some(cycle);
    }
    path.pop();
    visited.remove(node);
    None
}

/// Follows edges from `start` until a dead end or a node already in this
/// chain. The start node is included.
pub fn follow_chain<'g>(graph: &'g RedirectGraph, start: &'g str) -> Vec<String> {
    let mut chain = vec![start.to_string()];
    let mut visited = HashSet::from([start]);
    let mut current = start;
    while let Some(next) = graph.next(current) {
        if !visited.insert(next) {
            break;
        }
        chain.push(next.to_string());
        current = next;
    }
    chain
}

pub fn validate_document(document: &Value, options: &ValidateOptions) -> Result<ValidationReport> {
    let mut validator = RedirectValidator::new(document);
    if let Some(schema_path) = options.schema_path.as_deref() {
        let (errors, warnings) = check_external_schema(document, schema_path)?;
        validator.absorb(errors, warnings);
    }
    Ok(validator.validate_all())
}

/// Validate against an external JSON Schema file. A missing or unusable
/// schema is a warning; each violation is an error.
pub fn check_external_schema(
    document: &Value,
    schema_path: &Path,
) -> Result<(Vec<Finding>, Vec<Finding>)> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let shown = schema_path.to_string_lossy().replace('\\', "/");

    if !schema_path.exists() {
        warn!(schema = %shown, "schema file not found");
        warnings.push(Finding {
            check: Check::ExternalSchema,
            message: format!("Schema file not found: {shown}"),
        });
        return Ok((errors, warnings));
    }

    let content = match fs::read_to_string(schema_path) {
        Ok(content) => content,
        Err(error) => {
            warn!(schema = %shown, "schema file unreadable: {error}");
            warnings.push(Finding {
                check: Check::ExternalSchema,
                message: format!("Could not validate schema: {error}"),
            });
            return Ok((errors, warnings));
        }
    };
    let schema: Value = match serde_json::from_str(&content) {
        Ok(schema) => schema,
        Err(error) => {
            warnings.push(Finding {
                check: Check::ExternalSchema,
                message: format!("Could not validate schema: {error}"),
            });
            return Ok((errors, warnings));
        }
    };
    let validator = match jsonschema::options().build(&schema) {
        Ok(validator) => validator,
        Err(error) => {
            warnings.push(Finding {
                check: Check::ExternalSchema,
                message: format!("Could not validate schema: {error}"),
            });
            return Ok((errors, warnings));
        }
    };

    for error in validator.iter_errors(document) {
        errors.push(Finding {
            check: Check::ExternalSchema,
            message: format!("JSON Schema validation failed: {error}"),
        });
    }
    debug!(
        schema = %shown,
        violations = errors.len(),
        "external schema check finished"
    );
    Ok((errors, warnings))
}

/// Load a redirect map and refuse to hand it out unless it validates.
pub fn load_validated_map(path: &Path) -> Result<(RedirectMap, ValidationReport)> {
    let document = read_document(path)?;
    let report = RedirectValidator::new(&document).validate_all();
    if !report.valid {
        let listed = report
            .errors
            .iter()
            .map(|item| format!("  - {}", item.message))
            .collect::<Vec<_>>()
            .join("\n");
        bail!(
            "redirect map {} failed validation with {} error(s):\n{listed}",
            path.display(),
            report.errors.len()
        );
    }
    for warning in &report.warnings {
        warn!(check = warning.check.as_str(), "{}", warning.message);
    }
    let map = RedirectMap::from_value(&document)?;
    Ok((map, report))
}

fn status_code(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|code| u16::try_from(code).ok())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use serde_json::{Value, json};
    use tempfile::tempdir;

    use super::{
        Check, RedirectValidator, ValidateOptions, find_cycle_from, follow_chain,
        load_validated_map, validate_document,
    };
    use crate::model::RedirectGraph;

    fn rule(source: &str, destination: &str) -> Value {
        json!({
            "source": source,
            "destination": destination,
            "type": "permanent",
            "status_code": 301
        })
    }

    fn document(rules: Vec<Value>) -> Value {
        json!({ "version": "1.0", "redirects": rules })
    }

    fn validate(document: &Value) -> super::ValidationReport {
        RedirectValidator::new(document).validate_all()
    }

    fn errors_for(report: &super::ValidationReport, check: Check) -> Vec<String> {
        report
            .errors
            .iter()
            .filter(|item| item.check == check)
            .map(|item| item.message.clone())
            .collect()
    }

    #[test]
    fn clean_map_is_valid() {
        let report = validate(&document(vec![rule("/a", "/b"), rule("/c", "/d")]));
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.rule_count, 2);
    }

    #[test]
    fn missing_top_level_fields_are_errors() {
        let report = validate(&json!({}));
        assert!(!report.valid);
        assert_eq!(
            report.error_messages(),
            vec![
                "Missing required field: 'version'",
                "Missing required field: 'redirects'"
            ]
        );
    }

    #[test]
    fn non_string_version_and_non_array_redirects() {
        let report = validate(&json!({"version": 2, "redirects": {"source": "/a"}}));
        assert_eq!(
            report.error_messages(),
            vec![
                "Field 'version' must be a string",
                "Field 'redirects' must be an array"
            ]
        );
    }

    #[test]
    fn empty_rule_list_is_only_a_warning() {
        let report = validate(&document(Vec::new()));
        assert!(report.valid);
        assert_eq!(report.warning_messages(), vec!["No redirects defined"]);
    }

    #[test]
    fn per_rule_field_errors() {
        let report = validate(&document(vec![
            json!({"source": "a", "destination": "/b", "type": "forever", "status_code": 404}),
            json!({"destination": "/b"}),
            json!("not an object"),
        ]));
        let errors = errors_for(&report, Check::RedirectObjects);
        assert!(
            errors.contains(&"Redirect #1: Source path must start with '/' - got: a".to_string())
        );
        assert!(errors.contains(
            &"Redirect #1: Type must be 'permanent' or 'temporary' - got: forever".to_string()
        ));
        assert!(errors.contains(
            &"Redirect #1: Status code must be 301, 302, 307, or 308 - got: 404".to_string()
        ));
        assert!(errors.contains(&"Redirect #2: Missing required field 'source'".to_string()));
        assert!(errors.contains(&"Redirect #2: Missing required field 'type'".to_string()));
        assert!(errors.contains(&"Redirect #2: Missing required field 'status_code'".to_string()));
        assert!(errors.contains(&"Redirect #3: Must be an object".to_string()));
        assert!(!report.valid);
    }

    #[test]
    fn mismatched_type_and_status_is_a_warning() {
        let report = validate(&document(vec![
            json!({"source": "/a", "destination": "/b", "type": "permanent", "status_code": 302}),
            json!({"source": "/c", "destination": "/d", "type": "temporary", "status_code": 308}),
        ]));
        assert!(report.valid);
        assert_eq!(
            report.warning_messages(),
            vec![
                "Redirect #1: Type is 'permanent' but status code is 302 (expected 301 or 308)",
                "Redirect #2: Type is 'temporary' but status code is 308 (expected 302 or 307)",
            ]
        );
    }

    #[test]
    fn duplicate_source_names_both_indices() {
        let report = validate(&document(vec![
            rule("/x", "/one"),
            rule("/y", "/z"),
            rule("/x", "/two"),
        ]));
        assert_eq!(
            errors_for(&report, Check::DuplicateSources),
            vec!["Source '/x' appears in redirects #1 and #3"]
        );
        assert!(!report.valid);
    }

    #[test]
    fn self_redirect_is_an_error_even_when_fields_are_valid() {
        let report = validate(&document(vec![rule("/x", "/x")]));
        assert_eq!(
            errors_for(&report, Check::SelfRedirects),
            vec!["Redirect #1: Source and destination are identical: /x"]
        );
        assert!(!report.valid);
    }

    #[test]
    fn three_node_cycle_is_reported() {
        let report = validate(&document(vec![
            rule("/a", "/b"),
            rule("/b", "/c"),
            rule("/c", "/a"),
        ]));
        assert!(!report.valid);
        assert!(!report.cycles.is_empty());
        for cycle in &report.cycles {
            assert_eq!(cycle.first(), cycle.last());
            let nodes: BTreeSet<&str> = cycle.iter().map(String::as_str).collect();
            assert_eq!(nodes, BTreeSet::from(["/a", "/b", "/c"]));
        }
        assert!(
            errors_for(&report, Check::CircularRedirects)
                .contains(&"Circular redirect: /a -> /b -> /c -> /a".to_string())
        );
    }

    #[test]
    fn cycle_reports_are_deduplicated_by_message() {
        // /tail enters the same cycle that /a starts, producing an identical report.
        let report = validate(&document(vec![
            rule("/a", "/b"),
            rule("/b", "/a"),
            rule("/tail", "/a"),
        ]));
        let messages = errors_for(&report, Check::CircularRedirects);
        assert_eq!(
            messages,
            vec![
                "Circular redirect: /a -> /b -> /a",
                "Circular redirect: /b -> /a -> /b",
            ]
        );
    }

    #[test]
    fn cycles_sharing_nodes_are_each_found() {
        let graph = RedirectGraph::from_edges([
            ("/a", "/b"),
            ("/b", "/a"),
            ("/c", "/d"),
            ("/d", "/c"),
            ("/e", "/a"),
            ("/f", "/c"),
        ]);
        assert_eq!(
            find_cycle_from(&graph, "/e"),
            Some(vec!["/a".to_string(), "/b".to_string(), "/a".to_string()])
        );
        assert_eq!(
            find_cycle_from(&graph, "/f"),
            Some(vec!["/c".to_string(), "/d".to_string(), "/c".to_string()])
        );
        assert_eq!(find_cycle_from(&graph, "/missing"), None);
    }

    #[test]
    fn long_chain_warns_but_stays_valid() {
        let report = validate(&document(vec![
            rule("/a", "/b"),
            rule("/b", "/c"),
            rule("/c", "/d"),
            rule("/d", "/e"),
        ]));
        assert!(report.valid);
        assert_eq!(report.long_chains.len(), 2);
        assert_eq!(
            report.long_chains[0],
            vec!["/a", "/b", "/c", "/d", "/e"]
        );
        assert!(
            report
                .warning_messages()
                .contains(&"Long chain (4 hops): /a -> /b -> /c -> /d -> /e")
        );
    }

    #[test]
    fn five_node_chain_produces_exactly_one_five_node_warning() {
        let report = validate(&document(vec![
            rule("/a", "/b"),
            rule("/b", "/c"),
            rule("/c", "/d"),
            rule("/d", "/e"),
        ]));
        let five_node = report
            .long_chains
            .iter()
            .filter(|chain| chain.len() == 5)
            .count();
        assert_eq!(five_node, 1);
    }

    #[test]
    fn short_chain_has_no_warning() {
        let report = validate(&document(vec![rule("/a", "/b"), rule("/b", "/c")]));
        assert!(report.warnings.is_empty());
        assert!(report.long_chains.is_empty());
    }

    #[test]
    fn chain_walk_stops_at_cycle() {
        let graph = RedirectGraph::from_edges([("/a", "/b"), ("/b", "/c"), ("/c", "/b")]);
        assert_eq!(follow_chain(&graph, "/a"), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn duplicate_source_uses_last_destination_in_graph_checks() {
        // The first /x -> /y would close a cycle, but the later /x -> /z wins
        // in the derived graph, so only the duplicate is reported.
        let report = validate(&document(vec![
            rule("/x", "/y"),
            rule("/y", "/x"),
            rule("/x", "/z"),
        ]));
        assert_eq!(errors_for(&report, Check::DuplicateSources).len(), 1);
        assert!(errors_for(&report, Check::CircularRedirects).is_empty());
    }

    #[test]
    fn failing_early_checks_do_not_stop_later_ones() {
        let report = validate(&json!({
            "redirects": [
                {"source": "/a", "destination": "/a", "type": "permanent", "status_code": 301},
                {"source": "/a", "destination": "/b", "type": "permanent", "status_code": 301},
                {"source": "/b", "destination": "/a", "type": "permanent", "status_code": 301}
            ]
        }));
        assert!(!errors_for(&report, Check::SchemaBasics).is_empty());
        assert!(!errors_for(&report, Check::DuplicateSources).is_empty());
        assert!(!errors_for(&report, Check::SelfRedirects).is_empty());
        assert!(!errors_for(&report, Check::CircularRedirects).is_empty());
    }

    #[test]
    fn external_schema_violations_are_errors() {
        let temp = tempdir().expect("tempdir");
        let schema_path = temp.path().join("redirect-map.schema.json");
        fs::write(
            &schema_path,
            r#"{"type":"object","required":["version","redirects","owner"]}"#,
        )
        .expect("write schema");

        let report = validate_document(
            &document(vec![rule("/a", "/b")]),
            &ValidateOptions {
                schema_path: Some(schema_path),
            },
        )
        .expect("validate");
        assert!(!report.valid);
        let schema_errors = errors_for(&report, Check::ExternalSchema);
        assert_eq!(schema_errors.len(), 1);
        assert!(schema_errors[0].contains("owner"));
    }

    #[test]
    fn missing_external_schema_is_a_warning() {
        let temp = tempdir().expect("tempdir");
        let report = validate_document(
            &document(vec![rule("/a", "/b")]),
            &ValidateOptions {
                schema_path: Some(temp.path().join("absent.json")),
            },
        )
        .expect("validate");
        assert!(report.valid);
        assert!(report.warning_messages()[0].starts_with("Schema file not found"));
    }

    #[test]
    fn load_validated_map_rejects_invalid_map() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("redirect-map.json");
        fs::write(
            &path,
            serde_json::to_string(&document(vec![rule("/a", "/b"), rule("/a", "/c")]))
                .expect("serialize"),
        )
        .expect("write map");
        let err = load_validated_map(&path).expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains("failed validation with 1 error(s)"));
        assert!(message.contains("Source '/a' appears in redirects #1 and #2"));
    }

    #[test]
    fn self_redirect_also_closes_a_one_node_cycle() {
        let report = validate(&document(vec![rule("/a", "/a")]));
        assert_eq!(report.errors.len(), 2);
        assert_eq!(
            errors_for(&report, Check::CircularRedirects),
            vec!["Circular redirect: /a -> /a"]
        );
    }

    #[test]
    fn unreadable_external_schema_is_a_warning() {
        let temp = tempdir().expect("tempdir");
        let schema_dir = temp.path().join("schema.json");
        fs::create_dir_all(&schema_dir).expect("create dir");

        let report = validate_document(
            &document(vec![rule("/a", "/b")]),
            &ValidateOptions {
                schema_path: Some(schema_dir),
            },
        )
        .expect("validate");
        assert!(report.valid);
        assert!(report.errors.is_empty());
        let warnings = report
            .warnings
            .iter()
            .filter(|item| item.check == Check::ExternalSchema)
            .count();
        assert_eq!(warnings, 1);
        assert!(report.warning_messages()[0].starts_with("Could not validate schema"));
    }

    #[test]
    fn load_validated_map_returns_typed_rules() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("redirect-map.json");
        fs::write(
            &path,
            serde_json::to_string(&document(vec![rule("/a", "/b")])).expect("serialize"),
        )
        .expect("write map");
        let (map, report) = load_validated_map(&path).expect("load");
        assert!(report.valid);
        assert_eq!(map.redirects[0].destination, "/b");
    }
}
