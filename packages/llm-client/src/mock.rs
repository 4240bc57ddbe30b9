//! Mock provider for tests and the dev CLI.
//!
//! Never touches the network. By default it inspects the prompt and fabricates
//! a plausible JSON reply (domain candidates, evaluations, or follow-up
//! questions); tests that need exact control can script replies instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::json;

use crate::error::{ProviderError, Result};
use crate::types::{GenerateRequest, ModelResponse, ToolCall, Usage};

pub const DEFAULT_MODEL: &str = "mock-model-v1";

const COMMON_TLDS: &[&str] = &["com", "co", "io", "dev", "app", "me", "net", "org"];
const PREFIXES: &[&str] = &["get", "try", "use", "my", "the", "go", "hey", "hello"];
const SUFFIXES: &[&str] = &["hq", "app", "labs", "studio", "works", "hub"];

/// A scripted reply step.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Reply with plain text content
    Content(String),
    /// Reply with a single tool call
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// Fail the call
    Fail(String),
    /// Fall through to the prompt-derived default reply
    Default,
}

/// Deterministic offline provider.
pub struct MockProvider {
    script: Mutex<VecDeque<ScriptStep>>,
    supports_tools: bool,
    output_tokens: u64,
    eval_score: Option<f64>,
    calls: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            supports_tools: false,
            output_tokens: 100,
            eval_score: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Script the replies to return, in order. Once the script is exhausted
    /// the provider falls back to prompt-derived replies.
    pub fn with_script(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Advertise tool support (scripted `ToolCall` steps need this for the
    /// caller to take the tool path).
    pub fn with_tools(mut self) -> Self {
        self.supports_tools = true;
        self
    }

    /// Score every domain in default evaluation replies at a fixed value.
    pub fn with_eval_score(mut self, score: f64) -> Self {
        self.eval_score = Some(score);
        self
    }

    pub fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    pub fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    /// Number of generate calls made so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(step) = self.script.lock().expect("mock script lock").pop_front() {
            return self.reply_from_step(step, request);
        }

        Ok(self.response(default_reply(&request.prompt, self.eval_score), Vec::new(), request))
    }

    fn reply_from_step(&self, step: ScriptStep, request: &GenerateRequest) -> Result<ModelResponse> {
        match step {
            ScriptStep::Content(content) => Ok(self.response(content, Vec::new(), request)),
            ScriptStep::ToolCall { name, arguments } => Ok(self.response(
                String::new(),
                vec![ToolCall { name, arguments }],
                request,
            )),
            ScriptStep::Fail(message) => Err(ProviderError::Api {
                status: 500,
                message,
            }),
            ScriptStep::Default => Ok(self.response(
                default_reply(&request.prompt, self.eval_score),
                Vec::new(),
                request,
            )),
        }
    }

    fn response(
        &self,
        content: String,
        tool_calls: Vec<ToolCall>,
        request: &GenerateRequest,
    ) -> ModelResponse {
        ModelResponse {
            content,
            model: request
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            provider: "mock",
            usage: Usage {
                input_tokens: request.prompt.split_whitespace().count() as u64 * 2,
                output_tokens: self.output_tokens,
            },
            tool_calls,
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Fabricate a reply by guessing what the prompt asks for.
fn default_reply(prompt: &str, eval_score: Option<f64>) -> String {
    let lower = prompt.to_lowercase();

    if lower.contains("evaluat") && lower.contains("domain") {
        let domains = extract_domains(&lower);
        let evaluations: Vec<_> = if domains.is_empty() {
            vec![mock_evaluation("example.com", eval_score)]
        } else {
            domains
                .iter()
                .take(10)
                .map(|d| mock_evaluation(d, eval_score))
                .collect()
        };
        return json!({"evaluations": evaluations}).to_string();
    }

    if lower.contains("quiz") || lower.contains("question") {
        return json!({
            "questions": [
                {
                    "id": "followup_direction",
                    "type": "single_select",
                    "prompt": "Your first choice was taken. What would you like to try?",
                    "options": [
                        {"value": "variation", "label": "Try a variation of the name"},
                        {"value": "different_tld", "label": "Try different domain endings"},
                        {"value": "new_name", "label": "Explore completely new names"}
                    ]
                },
                {
                    "id": "followup_length",
                    "type": "single_select",
                    "prompt": "Short names are mostly taken. What's your preference?",
                    "options": [
                        {"value": "keep_short", "label": "Keep trying for short names"},
                        {"value": "longer_ok", "label": "Longer names are fine"}
                    ]
                },
                {
                    "id": "followup_keywords",
                    "type": "text",
                    "prompt": "Any new keywords or themes to explore?",
                    "required": false
                }
            ]
        })
        .to_string();
    }

    if lower.contains("domain") && (lower.contains("generate") || lower.contains("candidate")) {
        let name = extract_quoted(&lower).unwrap_or_else(|| "example".to_string());
        return json!({"domains": mock_domains(&name, 50)}).to_string();
    }

    json!({"message": "mock response", "prompt_length": prompt.len()}).to_string()
}

/// Deterministic domain suggestions derived from a business name.
pub fn mock_domains(business_name: &str, count: usize) -> Vec<String> {
    let base: String = business_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let base = if base.is_empty() { "example".to_string() } else { base };
    let short = &base[..base.len().min(8)];

    let mut domains = Vec::new();
    for tld in COMMON_TLDS {
        domains.push(format!("{base}.{tld}"));
        if short != base {
            domains.push(format!("{short}.{tld}"));
        }
    }
    for (i, prefix) in PREFIXES.iter().enumerate() {
        domains.push(format!("{prefix}{base}.{}", COMMON_TLDS[i % COMMON_TLDS.len()]));
    }
    for (i, suffix) in SUFFIXES.iter().enumerate() {
        domains.push(format!("{base}{suffix}.{}", COMMON_TLDS[i % COMMON_TLDS.len()]));
    }
    if base.len() > 4 {
        let abbrev = format!("{}{}", &base[..3], &base[base.len() - 2..]);
        domains.push(format!("{abbrev}.io"));
        domains.push(format!("{abbrev}.co"));
    }

    domains.dedup();
    domains.truncate(count);
    domains
}

fn mock_evaluation(domain: &str, fixed_score: Option<f64>) -> serde_json::Value {
    let name = domain.split('.').next().unwrap_or(domain);
    let tld = domain.rsplit('.').next().unwrap_or("");

    let length_score: f64 = (1.0 - (name.len() as f64 - 6.0) * 0.1).clamp(0.3, 1.0);
    let tld_score = match tld {
        "com" => 0.95,
        "co" => 0.85,
        "io" => 0.80,
        "dev" => 0.75,
        "app" => 0.70,
        _ => 0.6,
    };
    let score = fixed_score
        .unwrap_or(((length_score + tld_score) / 2.0 * 100.0).round() / 100.0);

    json!({
        "domain": domain,
        "score": score,
        "worth_checking": score > 0.5,
        "pronounceable": name.len() < 12 && !name.chars().any(|c| c.is_ascii_digit()),
        "memorable": name.len() < 10,
        "brand_fit": score > 0.6,
        "email_friendly": !name.contains('-') && !name.chars().any(|c| c.is_ascii_digit()),
        "flags": [],
        "notes": "mock evaluation"
    })
}

fn extract_quoted(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn extract_domains(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-');
        if token.len() >= 4 && token.contains('.') {
            let tld = token.rsplit('.').next().unwrap_or("");
            if tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()) {
                found.push(token.to_string());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_generation_reply() {
        let mock = MockProvider::new();
        let request =
            GenerateRequest::new("Generate 50 domain candidates for \"sunrise bakery\"");

        let response = mock.generate(&request).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response.content).unwrap();
        let domains = parsed["domains"].as_array().unwrap();

        assert!(!domains.is_empty());
        assert!(domains[0].as_str().unwrap().contains('.'));
        assert!(response.usage.output_tokens > 0);
    }

    #[tokio::test]
    async fn test_default_evaluation_reply_covers_prompt_domains() {
        let mock = MockProvider::new();
        let request =
            GenerateRequest::new("Evaluate these domain names:\n- sunrise.com\n- sunrise.io");

        let response = mock.generate(&request).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&response.content).unwrap();
        let evals = parsed["evaluations"].as_array().unwrap();

        assert_eq!(evals.len(), 2);
        assert_eq!(evals[0]["domain"], "sunrise.com");
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockProvider::with_script([
            ScriptStep::Content("first".into()),
            ScriptStep::Fail("boom".into()),
        ]);
        let request = GenerateRequest::new("anything");

        assert_eq!(mock.generate(&request).await.unwrap().content, "first");
        assert!(mock.generate(&request).await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn test_mock_domains_deterministic() {
        let a = mock_domains("Sunrise Bakery", 50);
        let b = mock_domains("Sunrise Bakery", 50);
        assert_eq!(a, b);
        assert!(a.contains(&"sunrisebakery.com".to_string()));
    }
}
