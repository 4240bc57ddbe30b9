//! Swarm agent: parallel domain evaluation.
//!
//! Candidates are split into chunks and evaluated concurrently with a fast
//! model. Three fallback tiers keep the pipeline total: tool call → JSON
//! content parse → content-free heuristic. A chunk that fails entirely, and
//! any domain the model skipped, gets the heuristic verdict.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use llm_client::{GenerateRequest, Provider, ToolChoice, ToolDefinition, Usage};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompts::{format_swarm_prompt, SWARM_SYSTEM_PROMPT};

pub const SWARM_TOOL_NAME: &str = "evaluate_domains";

const EVALUATION_TEMPERATURE: f32 = 0.3;
const EVALUATION_MAX_TOKENS: u32 = 2048;

/// One evaluation record, as produced by the model or the heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DomainEvaluation {
    pub domain: String,

    /// Overall quality in [0, 1]
    pub score: f64,

    /// Whether the domain merits an availability check
    pub worth_checking: bool,

    #[serde(default = "default_true")]
    pub pronounceable: bool,

    #[serde(default = "default_true")]
    pub memorable: bool,

    #[serde(default = "default_true")]
    pub brand_fit: bool,

    #[serde(default = "default_true")]
    pub email_friendly: bool,

    #[serde(default)]
    pub flags: Vec<String>,

    #[serde(default)]
    pub notes: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EvaluationArgs {
    pub evaluations: Vec<DomainEvaluation>,
}

/// The tool offered to the model; its schema mirrors the record.
pub fn swarm_tool() -> ToolDefinition {
    ToolDefinition::for_args::<EvaluationArgs>(
        SWARM_TOOL_NAME,
        "Evaluate domain candidates for quality, memorability, and brand fit. \
         Call this tool with your evaluations.",
    )
}

/// Heuristic evaluation used when the model is unavailable or silent about
/// a domain. Pure function of the domain string.
pub fn heuristic_evaluate(domain: &str) -> DomainEvaluation {
    let name = domain.rsplit_once('.').map(|(n, _)| n).unwrap_or(domain);
    let tld = domain.rsplit('.').next().unwrap_or("");

    // Short names score best; past 8 characters the score decays linearly
    // down to 0.3 at 18
    let length_score = if name.len() <= 8 {
        1.0
    } else {
        (1.0 - (name.len() as f64 - 8.0) * 0.1).max(0.3)
    };

    let tld_score = match tld {
        "com" => 1.0,
        "co" => 0.9,
        "io" => 0.85,
        "dev" | "app" => 0.8,
        "me" => 0.75,
        "net" | "org" => 0.7,
        _ => 0.5,
    };

    let consonant_run = Regex::new(r"[bcdfghjklmnpqrstvwxyz]{4,}").expect("regex is valid");
    let pronounceable = !consonant_run.is_match(&name.to_lowercase());
    let has_digits = name.chars().any(|c| c.is_ascii_digit());
    let has_hyphens = name.contains('-');

    let mut score = (length_score + tld_score) / 2.0;
    if !pronounceable {
        score *= 0.7;
    }
    if has_digits {
        score *= 0.8;
    }
    if has_hyphens {
        score *= 0.85;
    }
    let score = (score * 100.0).round() / 100.0;

    let mut flags = Vec::new();
    if has_digits {
        flags.push("contains numbers".to_string());
    }
    if has_hyphens {
        flags.push("contains hyphens".to_string());
    }
    if !pronounceable {
        flags.push("hard to pronounce".to_string());
    }

    DomainEvaluation {
        domain: domain.to_string(),
        score,
        worth_checking: score > 0.4,
        pronounceable,
        memorable: name.len() <= 12,
        brand_fit: score > 0.5,
        email_friendly: !has_digits && !has_hyphens,
        flags,
        notes: format!("Quick eval: length={}, tld=.{tld}", name.len()),
    }
}

/// What an evaluation run produced.
#[derive(Debug)]
pub struct EvaluatedBatch {
    pub evaluations: Vec<DomainEvaluation>,
    pub usage: Usage,
}

/// The evaluation agent.
pub struct SwarmAgent {
    provider: Arc<Provider>,
    chunk_size: usize,
    max_concurrent: usize,
}

impl SwarmAgent {
    pub fn new(provider: Arc<Provider>, chunk_size: usize, max_concurrent: usize) -> Self {
        Self {
            provider,
            chunk_size: chunk_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Evaluate all domains, chunked and bounded-concurrent. Chunks may
    /// complete in any order; every input domain gets exactly one record.
    pub async fn evaluate(
        &self,
        domains: &[String],
        vibe: &str,
        business_name: &str,
    ) -> EvaluatedBatch {
        if domains.is_empty() {
            return EvaluatedBatch {
                evaluations: Vec::new(),
                usage: Usage::default(),
            };
        }

        let chunks: Vec<Vec<String>> = domains
            .chunks(self.chunk_size)
            .map(|c| c.to_vec())
            .collect();

        let results: Vec<(Vec<DomainEvaluation>, Usage)> = stream::iter(chunks)
            .map(|chunk| async move { self.evaluate_chunk(chunk, vibe, business_name).await })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut evaluations = Vec::with_capacity(domains.len());
        let mut usage = Usage::default();
        for (chunk_evals, chunk_usage) in results {
            evaluations.extend(chunk_evals);
            usage.input_tokens += chunk_usage.input_tokens;
            usage.output_tokens += chunk_usage.output_tokens;
        }

        EvaluatedBatch { evaluations, usage }
    }

    /// Evaluate one chunk, falling back to heuristics on any failure.
    async fn evaluate_chunk(
        &self,
        chunk: Vec<String>,
        vibe: &str,
        business_name: &str,
    ) -> (Vec<DomainEvaluation>, Usage) {
        let prompt = format_swarm_prompt(&chunk, vibe, business_name);
        let request = GenerateRequest::new(&prompt)
            .system(SWARM_SYSTEM_PROMPT)
            .max_tokens(EVALUATION_MAX_TOKENS)
            .temperature(EVALUATION_TEMPERATURE);

        let result = if self.provider.supports_tools() {
            self.provider
                .generate_with_tools(
                    &request,
                    &[swarm_tool()],
                    &ToolChoice::Tool(SWARM_TOOL_NAME.into()),
                )
                .await
        } else {
            self.provider.generate(&request).await
        };

        match result {
            Ok(response) => {
                let parsed = response
                    .tool_arguments(SWARM_TOOL_NAME)
                    .map(parse_evaluations_value)
                    .filter(|evals| !evals.is_empty())
                    .unwrap_or_else(|| parse_evaluations_content(&response.content));

                debug!(
                    chunk_size = chunk.len(),
                    parsed = parsed.len(),
                    "evaluated chunk"
                );

                (fill_missing(parsed, &chunk), response.usage)
            }
            Err(e) => {
                warn!(error = %e, chunk_size = chunk.len(), "evaluation failed, using heuristics");
                let evals = chunk.iter().map(|d| heuristic_evaluate(d)).collect();
                (evals, Usage::default())
            }
        }
    }
}

/// Parse `{"evaluations": [...]}` tool arguments, dropping records the
/// schema rejects and duplicate domains.
fn parse_evaluations_value(value: &serde_json::Value) -> Vec<DomainEvaluation> {
    let Some(list) = value.get("evaluations").and_then(|e| e.as_array()) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    list.iter()
        .filter_map(|item| serde_json::from_value::<DomainEvaluation>(item.clone()).ok())
        .filter(|eval| seen.insert(eval.domain.to_lowercase()))
        .map(|mut eval| {
            eval.score = eval.score.clamp(0.0, 1.0);
            eval
        })
        .collect()
}

/// Parse evaluation records out of free text via the first balanced JSON
/// object in the reply.
fn parse_evaluations_content(content: &str) -> Vec<DomainEvaluation> {
    let Some(object) = super::driver::extract_first_json_object(content) else {
        return Vec::new();
    };
    match serde_json::from_str::<serde_json::Value>(&object) {
        Ok(value) => parse_evaluations_value(&value),
        Err(_) => Vec::new(),
    }
}

/// Every requested domain gets a record; the heuristic covers the gaps.
fn fill_missing(mut evaluations: Vec<DomainEvaluation>, requested: &[String]) -> Vec<DomainEvaluation> {
    let present: std::collections::HashSet<String> = evaluations
        .iter()
        .map(|e| e.domain.to_lowercase())
        .collect();

    for domain in requested {
        if !present.contains(&domain.to_lowercase()) {
            evaluations.push(heuristic_evaluate(domain));
        }
    }

    evaluations
}
