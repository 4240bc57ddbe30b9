//! Driver agent: generates domain name candidates.
//!
//! Prefers the provider's tool-calling path (a single forced tool whose
//! argument is `{domains: [...]}`); falls back to prompting for a JSON
//! object and, as a last resort, scraping domain-shaped strings out of the
//! reply. Candidates are validated, lowercased, and deduplicated.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use llm_client::{GenerateRequest, ModelResponse, Provider, ToolChoice, ToolDefinition, Usage};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use super::job::QuizResponses;
use super::prompts::{format_driver_prompt, DRIVER_SYSTEM_PROMPT};

pub const DRIVER_TOOL_NAME: &str = "generate_domain_candidates";

const GENERATION_TEMPERATURE: f32 = 0.8;
const GENERATION_MAX_TOKENS: u32 = 4096;

/// Arguments of the generation tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CandidateArgs {
    /// Domain candidates, each a full name with TLD
    pub domains: Vec<String>,
}

/// The tool offered to (and forced upon) the model.
pub fn driver_tool() -> ToolDefinition {
    ToolDefinition::for_args::<CandidateArgs>(
        DRIVER_TOOL_NAME,
        "Generate domain name candidates for a business. Call this tool with \
         your list of suggested domains.",
    )
}

/// Bounded summary of prior batches fed back into generation.
#[derive(Debug, Clone, Default)]
pub struct PreviousResults {
    /// Last 50 checked domains
    pub checked: Vec<String>,
    /// Last 20 available domains
    pub available: Vec<String>,
    pub checked_total: i64,
    pub available_total: i64,
    pub target_count: i64,
    /// Top 3 TLDs among checked-but-registered domains, with counts
    pub taken_tlds: Vec<(String, usize)>,
}

impl PreviousResults {
    /// TLD distribution of everything tried so far.
    pub fn tried_summary(&self) -> String {
        if self.checked.is_empty() {
            return "Nothing checked yet".to_string();
        }

        let mut counts: Vec<(String, usize)> = Vec::new();
        for domain in &self.checked {
            let tld = domain.rsplit('.').next().unwrap_or("").to_string();
            match counts.iter_mut().find(|(t, _)| *t == tld) {
                Some((_, n)) => *n += 1,
                None => counts.push((tld, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        counts
            .iter()
            .take(5)
            .map(|(tld, n)| format!(".{tld}: {n}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn available_summary(&self) -> String {
        if self.available.is_empty() {
            return "None found yet".to_string();
        }
        self.available
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The TLDs that keep coming back registered.
    pub fn taken_patterns(&self) -> String {
        if self.taken_tlds.is_empty() {
            return "No clear patterns yet".to_string();
        }
        self.taken_tlds
            .iter()
            .map(|(tld, n)| format!(".{tld} mostly taken ({n} registered)"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// What a generation run produced.
#[derive(Debug)]
pub struct GeneratedCandidates {
    pub domains: Vec<String>,
    pub usage: Usage,
}

/// The generation agent.
pub struct DriverAgent {
    provider: Arc<Provider>,
}

impl DriverAgent {
    pub fn new(provider: Arc<Provider>) -> Self {
        Self { provider }
    }

    /// Generate up to `count` validated candidates.
    ///
    /// Provider failures on the tool path fall back to the JSON prompt; a
    /// failure there propagates so the pipeline can degrade to a zero-work
    /// batch.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_candidates(
        &self,
        quiz: &QuizResponses,
        batch_num: i64,
        max_batches: i64,
        count: usize,
        previous_results: Option<&PreviousResults>,
        followup_responses: Option<&serde_json::Value>,
    ) -> Result<GeneratedCandidates> {
        let prompt = format_driver_prompt(
            quiz,
            batch_num,
            max_batches,
            count,
            previous_results,
            followup_responses,
        );

        let request = GenerateRequest::new(&prompt)
            .system(DRIVER_SYSTEM_PROMPT)
            .max_tokens(GENERATION_MAX_TOKENS)
            .temperature(GENERATION_TEMPERATURE);

        let response = if self.provider.supports_tools() {
            match self
                .provider
                .generate_with_tools(
                    &request,
                    &[driver_tool()],
                    &ToolChoice::Tool(DRIVER_TOOL_NAME.into()),
                )
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "tool-path generation failed, retrying as JSON prompt");
                    self.provider.generate(&request).await?
                }
            }
        } else {
            self.provider.generate(&request).await?
        };

        let mut domains = extract_candidates(&response);

        // Never re-suggest something already checked
        if let Some(previous) = previous_results {
            let checked: HashSet<&str> = previous.checked.iter().map(|d| d.as_str()).collect();
            domains.retain(|d| !checked.contains(d.as_str()));
        }
        domains.truncate(count);

        debug!(
            batch_num,
            candidates = domains.len(),
            provider = self.provider.name(),
            "generated candidates"
        );

        Ok(GeneratedCandidates {
            domains,
            usage: response.usage,
        })
    }
}

/// Pull candidates out of a model reply, trying the tool call first, then
/// the first balanced JSON object, then a domain-shaped regex sweep.
fn extract_candidates(response: &ModelResponse) -> Vec<String> {
    if let Some(args) = response.tool_arguments(DRIVER_TOOL_NAME) {
        let from_tool = parse_domains_value(args);
        if !from_tool.is_empty() {
            return from_tool;
        }
    }

    parse_candidates_from_content(&response.content)
}

/// Parse `{"domains": [...]}` arguments.
fn parse_domains_value(value: &serde_json::Value) -> Vec<String> {
    let Some(domains) = value.get("domains").and_then(|d| d.as_array()) else {
        return Vec::new();
    };

    dedup_valid(domains.iter().filter_map(|d| d.as_str()))
}

/// Parse candidates out of free text.
pub fn parse_candidates_from_content(content: &str) -> Vec<String> {
    if let Some(object) = extract_first_json_object(content) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&object) {
            let parsed = parse_domains_value(&value);
            if !parsed.is_empty() {
                return parsed;
            }
        }
    }

    // Last resort: anything in the text shaped like a domain
    let pattern = Regex::new(r"\b([a-zA-Z0-9][-a-zA-Z0-9]*\.[a-zA-Z]{2,})\b")
        .expect("domain regex is valid");
    dedup_valid(pattern.find_iter(content).map(|m| m.as_str()))
}

/// Lowercase, validate and deduplicate, preserving order.
fn dedup_valid<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for candidate in raw {
        let lower = candidate.to_lowercase();
        if is_valid_domain(&lower) && seen.insert(lower.clone()) {
            out.push(lower);
        }
    }

    out
}

/// Find the first balanced `{...}` in text, respecting string literals.
pub(crate) fn extract_first_json_object(content: &str) -> Option<String> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(content[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// Syntactic domain validation: length >= 4, one dot minimum, alphabetic
/// TLD of 2+ characters, and an RFC-shaped leading label up to 63 chars.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.len() < 4 || !domain.contains('.') {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();

    let tld = parts[parts.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    let name = parts[0];
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let label = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("label regex is valid");
    label.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_client::ToolCall;

    #[test]
    fn test_domain_validation() {
        assert!(is_valid_domain("a.io"));
        assert!(is_valid_domain("sunrise-bakery.com"));
        assert!(is_valid_domain("get2it.dev"));

        assert!(!is_valid_domain("a.i")); // too short overall
        assert!(!is_valid_domain("nodot"));
        assert!(!is_valid_domain("bad.c0m")); // digit in TLD
        assert!(!is_valid_domain("-lead.com")); // hyphen at label start
        assert!(!is_valid_domain("trail-.com")); // hyphen at label end
        assert!(!is_valid_domain("has space.com"));
        assert!(!is_valid_domain(&format!("{}.com", "x".repeat(64))));
    }

    #[test]
    fn test_extract_first_json_object() {
        let content = r#"Sure! Here are the names: {"domains": ["a.com", "b.io"]} hope that helps"#;
        let object = extract_first_json_object(content).unwrap();
        assert_eq!(object, r#"{"domains": ["a.com", "b.io"]}"#);
    }

    #[test]
    fn test_extract_json_object_with_braces_in_strings() {
        let content = r#"{"domains": ["a.com"], "notes": "weird {text} here"}"#;
        let object = extract_first_json_object(content).unwrap();
        assert_eq!(object, content);
    }

    #[test]
    fn test_parse_content_json_path() {
        let content = r#"{"domains": ["Sunrise.COM", "sunrise.com", "bad domain", "sunrise.co"]}"#;
        let parsed = parse_candidates_from_content(content);
        // case-folded, deduped, invalid dropped
        assert_eq!(parsed, vec!["sunrise.com", "sunrise.co"]);
    }

    #[test]
    fn test_parse_content_regex_fallback() {
        let content = "I'd suggest sunrise.com or maybe getsunrise.io for the project.";
        let parsed = parse_candidates_from_content(content);
        assert_eq!(parsed, vec!["sunrise.com", "getsunrise.io"]);
    }

    #[test]
    fn test_tool_call_preferred_over_content() {
        let response = ModelResponse {
            content: r#"{"domains": ["fromcontent.com"]}"#.into(),
            model: "m".into(),
            provider: "mock",
            usage: Usage::default(),
            tool_calls: vec![ToolCall {
                name: DRIVER_TOOL_NAME.into(),
                arguments: serde_json::json!({"domains": ["fromtool.com"]}),
            }],
        };

        assert_eq!(extract_candidates(&response), vec!["fromtool.com"]);
    }

    #[test]
    fn test_previous_results_summaries() {
        let previous = PreviousResults {
            checked: vec!["a.com".into(), "b.com".into(), "c.io".into()],
            available: vec![],
            checked_total: 3,
            available_total: 0,
            target_count: 25,
            taken_tlds: vec![("com".into(), 2), ("io".into(), 1)],
        };

        assert_eq!(previous.tried_summary(), ".com: 2, .io: 1");
        assert_eq!(previous.available_summary(), "None found yet");
        assert!(previous.taken_patterns().contains(".com mostly taken (2 registered)"));
    }

    #[test]
    fn test_driver_tool_schema() {
        let tool = driver_tool();
        assert_eq!(tool.name, DRIVER_TOOL_NAME);
        assert_eq!(tool.parameters["properties"]["domains"]["type"], "array");
    }
}
