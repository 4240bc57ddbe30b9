//! Prompt templates for the search agents.
//!
//! All prompt engineering lives here: candidate generation, evaluation, and
//! follow-up quiz creation. The generation prompt learns from prior batches
//! and carries batch-specific guidance so later batches escape exhausted
//! patterns.

use std::fmt::Write;

use crate::domains::search::driver::PreviousResults;
use crate::domains::search::job::QuizResponses;

pub const DRIVER_SYSTEM_PROMPT: &str = "\
You are a domain name expert helping find the perfect domain for a client's business or project.

Your role is to generate creative, memorable, and available domain name candidates.

Key principles:
1. **Availability awareness**: Many obvious names are taken. Get creative with prefixes, suffixes, word combinations, and alternative TLDs.
2. **Brand fit**: Names should match the client's stated vibe (professional, creative, minimal, bold, personal).
3. **Practical**: Names should be easy to spell, pronounce, and remember. Avoid hyphens and numbers.
4. **Diverse**: Suggest a mix of direct names, creative variations, and unexpected options.
5. **TLD strategy**: .com is king but .co, .io, .dev, .app, .me are strong alternatives.

When given previous results, learn from them:
- Avoid repeating domains already checked
- If a pattern is taken (e.g., [name].com), try variations ([name]hq.com, get[name].com)
- If short names are taken, try slightly longer descriptive names
- Note which TLDs had availability and lean into those

Output format: JSON with a \"domains\" array containing domain name strings.
Example: {\"domains\": [\"example.com\", \"getexample.io\", \"examplehq.co\"]}";

pub const SWARM_SYSTEM_PROMPT: &str = "\
You are a domain name evaluator. Your job is to quickly assess domain names for quality.

Score each domain on these criteria:
1. **Pronounceability** (0-1): Can it be easily said aloud? No awkward letter combinations?
2. **Memorability** (0-1): Will people remember it after hearing once?
3. **Brand fit** (0-1): Does it sound professional and trustworthy?
4. **Email-ability** (0-1): Would this make a good email address? Easy to spell over phone?

Also flag potential issues:
- Unfortunate spellings or meanings in other languages
- Possible trademark conflicts with major brands
- Awkward pronunciation or letter combinations
- Too similar to existing popular sites

Output format: JSON with evaluations array.";

pub const FOLLOWUP_SYSTEM_PROMPT: &str = "\
You are helping refine a domain search that hasn't found enough good options.

Based on the search results, generate 3 targeted follow-up questions that will help narrow down what the client really wants.

Your questions should:
1. Address specific patterns from the failed search
2. Help clarify trade-offs (e.g., short name vs. .com TLD)
3. Explore new directions based on what's available
4. Be quick to answer (multiple choice preferred)";

/// Batch-phase guidance: early batches chase the obvious names, later ones
/// get progressively more creative.
fn batch_guidelines(batch_num: i64) -> &'static str {
    match batch_num {
        1 => "\
- Start with the most obvious and desirable names
- Include the exact business name with top TLDs (.com, .co, .io)
- Add common prefix/suffix variations (get, try, my, hq, app, studio)
- Mix short catchy names with descriptive alternatives",
        2 => "\
- Build on batch 1 learnings - avoid patterns that were all taken
- Try more creative combinations and wordplay
- Explore TLDs that showed availability in batch 1
- Consider industry-specific terms and metaphors",
        3 => "\
- Get more creative - simple names are likely exhausted
- Try compound words, phrases, and action-oriented names
- Look for synonyms and related concepts
- Explore niche TLDs if mainstream ones are saturated",
        4 => "\
- Think outside the box - obvious paths are exhausted
- Consider abbreviated names, acronyms, made-up words
- Try unexpected but relevant word combinations
- Focus on TLDs with proven availability",
        5 => "\
- Last creative push before potential follow-up
- Combine learnings from all previous batches
- Try any remaining untested patterns
- Include some \"long shot\" premium-sounding options",
        _ => "\
- Final batch - make it count
- Focus on quality over quantity
- Include your best remaining ideas
- Consider names that might need client input to validate",
    }
}

/// Build the generation prompt.
pub fn format_driver_prompt(
    quiz: &QuizResponses,
    batch_num: i64,
    max_batches: i64,
    count: usize,
    previous_results: Option<&PreviousResults>,
    followup_responses: Option<&serde_json::Value>,
) -> String {
    let tld_str = if quiz.tld_preferences.iter().any(|t| t == "any") {
        "Open to any TLD (but prefers .com if available)".to_string()
    } else {
        quiz.tld_preferences
            .iter()
            .map(|t| format!(".{t}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut prompt = format!(
        "Generate {count} domain name candidates for this client.\n\n\
         ## Client Information\n\n\
         **Business/Project Name**: {}\n",
        quiz.business_name
    );

    if let Some(idea) = &quiz.domain_idea {
        let _ = writeln!(prompt, "**Domain Idea (client's preference)**: {idea}");
    }
    let _ = writeln!(prompt, "**Preferred TLDs**: {tld_str}");
    let _ = writeln!(prompt, "**Brand Vibe**: {}", quiz.vibe);
    if let Some(keywords) = &quiz.keywords {
        let _ = writeln!(prompt, "**Keywords/Themes**: {keywords}");
    }

    if let Some(responses) = followup_responses {
        let _ = write!(prompt, "\n## Client Refinement\n\n\
            The client answered follow-up questions after earlier batches ran dry. \
            Weigh these heavily:\n");
        if let Some(map) = responses.as_object() {
            for (key, value) in map {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let _ = writeln!(prompt, "- {key}: {rendered}");
            }
        } else {
            let _ = writeln!(prompt, "- {responses}");
        }
    }

    let _ = write!(
        prompt,
        "\n## Current Batch\n\nThis is batch {batch_num} of {max_batches}.\n"
    );

    match previous_results {
        Some(previous) if batch_num > 1 => {
            let _ = write!(
                prompt,
                "\n## Previous Results\n\n\
                 **Domains already checked**: {}\n\
                 **Available so far**: {}\n\
                 **Target**: {} good domains\n\n\
                 ### What's been tried:\n{}\n\n\
                 ### What worked (available):\n{}\n\n\
                 ### Patterns to avoid (all taken):\n{}\n",
                previous.checked_total,
                previous.available_total,
                previous.target_count,
                previous.tried_summary(),
                previous.available_summary(),
                previous.taken_patterns(),
            );
        }
        _ => {
            let _ = write!(
                prompt,
                "\nThis is the first batch. Start with the most obvious/desirable options first,\n\
                 then include creative alternatives. Mix direct names with variations.\n"
            );
        }
    }

    let _ = write!(
        prompt,
        "\n## Instructions\n\n\
         Generate exactly {count} unique domain suggestions as a JSON object.\n\n\
         Guidelines for this batch:\n{}\n\n\
         Output only valid JSON in this format:\n\
         {{\"domains\": [\"domain1.tld\", \"domain2.tld\", ...]}}\n",
        batch_guidelines(batch_num)
    );

    prompt
}

/// Build the evaluation prompt for one chunk of domains.
pub fn format_swarm_prompt(domains: &[String], vibe: &str, business_name: &str) -> String {
    let domains_list = domains
        .iter()
        .map(|d| format!("- {d}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Evaluate these domain names for the client:\n\n\
         **Client Vibe**: {vibe}\n\
         **Business Type**: {business_name}\n\n\
         **Domains to evaluate**:\n{domains_list}\n\n\
         For each domain, provide:\n\
         - score: Overall quality score 0-1 (average of criteria)\n\
         - worth_checking: boolean - should we check availability?\n\
         - pronounceable: boolean\n\
         - memorable: boolean\n\
         - brand_fit: boolean\n\
         - email_friendly: boolean\n\
         - flags: array of any concerns\n\
         - notes: brief explanation\n\n\
         Output as JSON:\n\
         {{\"evaluations\": [\n\
         \x20 {{\"domain\": \"example.com\", \"score\": 0.85, \"worth_checking\": true, \
         \"pronounceable\": true, \"memorable\": true, \"brand_fit\": true, \
         \"email_friendly\": true, \"flags\": [], \"notes\": \"Short, classic .com\"}},\n\
         \x20 ...\n\
         ]}}"
    )
}

/// Build the follow-up quiz generation prompt.
#[allow(clippy::too_many_arguments)]
pub fn format_followup_prompt(
    original_quiz: &QuizResponses,
    batches_completed: i64,
    total_checked: i64,
    good_found: i64,
    target: i64,
    availability_patterns: &str,
    taken_summary: &str,
    available_summary: &str,
) -> String {
    let quiz_json =
        serde_json::to_string_pretty(original_quiz).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Generate a follow-up quiz based on this search:\n\n\
         ## Original Preferences\n{quiz_json}\n\n\
         ## Search Results\n\
         - Batches completed: {batches_completed}\n\
         - Domains checked: {total_checked}\n\
         - Good options found: {good_found} (target was {target})\n\n\
         ## Availability Patterns\n{availability_patterns}\n\n\
         ## What Was Taken\n{taken_summary}\n\n\
         ## What Was Available\n{available_summary}\n\n\
         Generate 3 follow-up questions as JSON:\n\
         {{\"questions\": [\n\
         \x20 {{\n\
         \x20   \"id\": \"followup_1\",\n\
         \x20   \"type\": \"single_select\",\n\
         \x20   \"prompt\": \"Question text\",\n\
         \x20   \"options\": [{{\"value\": \"opt1\", \"label\": \"Option 1\"}}, ...]\n\
         \x20 }},\n\
         \x20 ...\n\
         ]}}\n\n\
         Focus on the specific trade-offs and patterns from this search."
    )
}
