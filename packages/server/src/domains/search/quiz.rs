//! Questionnaire types and the follow-up quiz generator.
//!
//! When a search exhausts its batch budget without hitting the target, a
//! short follow-up quiz is generated from the observed availability
//! patterns. If the model's reply doesn't parse, three static questions
//! (direction, length, keywords) stand in so the client is never stuck.

use std::collections::HashMap;
use std::sync::Arc;

use llm_client::{GenerateRequest, Provider, Usage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::job::QuizResponses;
use super::prompts::{format_followup_prompt, FOLLOWUP_SYSTEM_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    SingleSelect,
    MultiSelect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOption {
    pub value: String,
    pub label: String,
}

impl QuizOption {
    fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub prompt: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuizOption>,
}

/// A generated follow-up quiz plus the search context that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupQuiz {
    pub questions: Vec<QuizQuestion>,
    pub context: serde_json::Value,
}

/// Reject malformed intake before any job state exists.
pub fn validate_quiz(quiz: &QuizResponses) -> Result<(), String> {
    if quiz.business_name.trim().is_empty() {
        return Err("business_name is required".to_string());
    }
    if quiz.tld_preferences.is_empty() {
        return Err("tld_preferences must not be empty".to_string());
    }
    if quiz.vibe.trim().is_empty() {
        return Err("vibe is required".to_string());
    }
    Ok(())
}

/// Generates follow-up quizzes from search history.
pub struct FollowupQuizGenerator {
    provider: Arc<Provider>,
}

impl FollowupQuizGenerator {
    pub fn new(provider: Arc<Provider>) -> Self {
        Self { provider }
    }

    /// Generate a quiz. Infallible: any provider or parse failure falls
    /// back to the static questions.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate(
        &self,
        original_quiz: &QuizResponses,
        batches_completed: i64,
        total_checked: i64,
        good_found: i64,
        target: i64,
        checked_domains: &[String],
        available_domains: &[String],
    ) -> (FollowupQuiz, Usage) {
        let prompt = format_followup_prompt(
            original_quiz,
            batches_completed,
            total_checked,
            good_found,
            target,
            &analyze_availability(checked_domains, available_domains),
            &summarize_taken(checked_domains, available_domains),
            &summarize_available(available_domains),
        );

        let request = GenerateRequest::new(&prompt)
            .system(FOLLOWUP_SYSTEM_PROMPT)
            .max_tokens(2048)
            .temperature(0.7);

        let (questions, usage) = match self.provider.generate(&request).await {
            Ok(response) => (parse_questions(&response.content), response.usage),
            Err(e) => {
                warn!(error = %e, "follow-up generation failed, using default questions");
                (Vec::new(), Usage::default())
            }
        };

        let questions = if questions.is_empty() {
            default_followup_questions()
        } else {
            questions
        };

        let availability_rate = if checked_domains.is_empty() {
            0.0
        } else {
            available_domains.len() as f64 / checked_domains.len() as f64
        };

        let quiz = FollowupQuiz {
            questions,
            context: serde_json::json!({
                "batches_completed": batches_completed,
                "total_checked": total_checked,
                "good_found": good_found,
                "target": target,
                "availability_rate": availability_rate,
            }),
        };

        (quiz, usage)
    }
}

/// Per-TLD availability rates, most-checked first.
fn analyze_availability(checked: &[String], available: &[String]) -> String {
    if checked.is_empty() {
        return "No domains checked yet".to_string();
    }

    let available_set: std::collections::HashSet<String> =
        available.iter().map(|d| d.to_lowercase()).collect();

    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for domain in checked {
        let tld = domain.rsplit('.').next().unwrap_or("").to_lowercase();
        let entry = stats.entry(tld).or_insert((0, 0));
        entry.0 += 1;
        if available_set.contains(&domain.to_lowercase()) {
            entry.1 += 1;
        }
    }

    let mut rows: Vec<(String, (usize, usize))> = stats.into_iter().collect();
    rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));

    rows.iter()
        .take(5)
        .map(|(tld, (checked, available))| {
            let rate = *available as f64 / (*checked).max(1) as f64 * 100.0;
            format!(".{tld}: {available}/{checked} available ({rate:.0}%)")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_taken(checked: &[String], available: &[String]) -> String {
    let available_set: std::collections::HashSet<String> =
        available.iter().map(|d| d.to_lowercase()).collect();
    let taken: Vec<&String> = checked
        .iter()
        .filter(|d| !available_set.contains(&d.to_lowercase()))
        .collect();

    if taken.is_empty() {
        return "None - all checked domains were available!".to_string();
    }

    let (short, long): (Vec<&&String>, Vec<&&String>) = taken
        .iter()
        .partition(|d| d.split('.').next().unwrap_or("").len() <= 8);

    let mut parts = Vec::new();
    if !short.is_empty() {
        let examples: Vec<&str> = short.iter().take(5).map(|d| d.as_str()).collect();
        parts.push(format!("Short names taken: {}", examples.join(", ")));
    }
    if !long.is_empty() {
        let examples: Vec<&str> = long.iter().take(5).map(|d| d.as_str()).collect();
        parts.push(format!("Longer names taken: {}", examples.join(", ")));
    }

    parts.join("\n")
}

fn summarize_available(available: &[String]) -> String {
    if available.is_empty() {
        return "None found yet".to_string();
    }

    let mut by_tld: HashMap<String, Vec<&str>> = HashMap::new();
    for domain in available {
        let tld = domain.rsplit('.').next().unwrap_or("").to_lowercase();
        by_tld.entry(tld).or_default().push(domain);
    }

    let mut groups: Vec<(String, Vec<&str>)> = by_tld.into_iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    groups
        .iter()
        .take(4)
        .map(|(tld, domains)| {
            let examples: Vec<&str> = domains.iter().take(3).copied().collect();
            format!(".{tld}: {}", examples.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse up to three questions from a model reply.
fn parse_questions(content: &str) -> Vec<QuizQuestion> {
    let Some(object) = super::driver::extract_first_json_object(content) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&object) else {
        return Vec::new();
    };
    let Some(list) = value.get("questions").and_then(|q| q.as_array()) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|item| serde_json::from_value::<QuizQuestion>(item.clone()).ok())
        .take(3)
        .collect()
}

/// The static fallback: direction, length, keywords.
pub fn default_followup_questions() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            id: "followup_direction".to_string(),
            question_type: QuestionType::SingleSelect,
            prompt: "Your preferred name wasn't available. What would you like to try?"
                .to_string(),
            required: true,
            placeholder: String::new(),
            options: vec![
                QuizOption::new("variation", "Try variations of the same name"),
                QuizOption::new("different_tld", "Try different domain endings (.co, .io, etc.)"),
                QuizOption::new("new_name", "Explore completely different names"),
            ],
        },
        QuizQuestion {
            id: "followup_length".to_string(),
            question_type: QuestionType::SingleSelect,
            prompt: "Short names are mostly taken. What's your preference?".to_string(),
            required: true,
            placeholder: String::new(),
            options: vec![
                QuizOption::new("keep_short", "Keep trying for short names"),
                QuizOption::new("longer_ok", "Longer, more descriptive names are fine"),
                QuizOption::new("compound", "Try compound words or phrases"),
            ],
        },
        QuizQuestion {
            id: "followup_keywords".to_string(),
            question_type: QuestionType::Text,
            prompt: "Any new keywords or themes to explore?".to_string(),
            required: false,
            placeholder: "e.g., local, artisan, modern".to_string(),
            options: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_client::{MockProvider, ScriptStep};

    fn quiz() -> QuizResponses {
        QuizResponses {
            business_name: "Sunrise Bakery".into(),
            tld_preferences: vec!["com".into()],
            vibe: "creative".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_quiz() {
        assert!(validate_quiz(&quiz()).is_ok());

        let mut missing_name = quiz();
        missing_name.business_name = "  ".into();
        assert!(validate_quiz(&missing_name).is_err());

        let mut no_tlds = quiz();
        no_tlds.tld_preferences.clear();
        assert!(validate_quiz(&no_tlds).is_err());
    }

    #[test]
    fn test_availability_analysis() {
        let checked = vec![
            "a.com".to_string(),
            "b.com".to_string(),
            "c.io".to_string(),
        ];
        let available = vec!["b.com".to_string()];

        let analysis = analyze_availability(&checked, &available);
        assert!(analysis.contains(".com: 1/2 available (50%)"));
        assert!(analysis.contains(".io: 0/1 available (0%)"));
    }

    #[test]
    fn test_taken_summary_groups_by_length() {
        let checked = vec!["short.com".to_string(), "averylongdomainname.com".to_string()];
        let summary = summarize_taken(&checked, &[]);

        assert!(summary.contains("Short names taken: short.com"));
        assert!(summary.contains("Longer names taken: averylongdomainname.com"));
    }

    #[test]
    fn test_parse_questions_caps_at_three() {
        let content = serde_json::json!({
            "questions": [
                {"id": "q1", "type": "text", "prompt": "one"},
                {"id": "q2", "type": "text", "prompt": "two"},
                {"id": "q3", "type": "text", "prompt": "three"},
                {"id": "q4", "type": "text", "prompt": "four"}
            ]
        })
        .to_string();

        let questions = parse_questions(&content);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].id, "q1");
    }

    #[tokio::test]
    async fn test_generator_falls_back_to_defaults() {
        let provider = Arc::new(Provider::Mock(MockProvider::with_script([
            ScriptStep::Fail("outage".into()),
        ])));
        let generator = FollowupQuizGenerator::new(provider);

        let (followup, usage) = generator
            .generate(&quiz(), 6, 120, 4, 25, &[], &[])
            .await;

        assert_eq!(followup.questions.len(), 3);
        assert_eq!(followup.questions[0].id, "followup_direction");
        assert_eq!(followup.questions[2].id, "followup_keywords");
        assert_eq!(usage.total(), 0);
        assert_eq!(followup.context["batches_completed"], 6);
    }

    #[tokio::test]
    async fn test_generator_uses_model_questions_when_parseable() {
        let reply = serde_json::json!({
            "questions": [{
                "id": "followup_budget",
                "type": "single_select",
                "prompt": "How much would you spend per year?",
                "options": [{"value": "low", "label": "Under $30"}]
            }]
        })
        .to_string();
        let provider = Arc::new(Provider::Mock(MockProvider::with_script([
            ScriptStep::Content(reply),
        ])));
        let generator = FollowupQuizGenerator::new(provider);

        let (followup, _) = generator
            .generate(&quiz(), 6, 120, 4, 25, &[], &[])
            .await;

        assert_eq!(followup.questions.len(), 1);
        assert_eq!(followup.questions[0].id, "followup_budget");
    }
}
