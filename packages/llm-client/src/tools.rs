//! Tool definitions and per-provider wire conversion.
//!
//! A tool is declared once as a JSON schema (generated from a Rust type via
//! `schemars`) and translated into each provider's vocabulary: Anthropic uses
//! `input_schema`, the OpenAI-compatible APIs (DeepSeek, Kimi) and Cloudflare
//! wrap the schema in a `function` object.

use schemars::{schema_for, JsonSchema};
use serde_json::{json, Value};

/// Definition of a tool the model can invoke.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    /// What the tool does, for the model
    pub description: String,

    /// JSON schema of the tool's arguments
    pub parameters: Value,
}

impl ToolDefinition {
    /// Build a definition whose argument schema is generated from `A`.
    pub fn for_args<A: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let schema = schema_for!(A);
        let mut parameters = serde_json::to_value(schema).unwrap_or_default();
        if let Some(map) = parameters.as_object_mut() {
            // The meta fields confuse some providers' schema validators
            map.remove("$schema");
            map.remove("title");
        }
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Build a definition from a hand-written schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Anthropic tool format.
    pub fn to_anthropic(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters,
        })
    }

    /// OpenAI function format (also used by DeepSeek, Kimi and Cloudflare).
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// How the model should select among the offered tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// Model decides whether to call a tool
    Auto,
    /// Model must call some tool
    Any,
    /// Model must call the named tool
    Tool(String),
}

impl ToolChoice {
    /// Anthropic `tool_choice` value.
    pub fn to_anthropic(&self) -> Value {
        match self {
            ToolChoice::Auto => json!({"type": "auto"}),
            ToolChoice::Any => json!({"type": "any"}),
            ToolChoice::Tool(name) => json!({"type": "tool", "name": name}),
        }
    }

    /// OpenAI-compatible `tool_choice` value.
    pub fn to_openai(&self) -> Value {
        match self {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::Any => json!("required"),
            ToolChoice::Tool(name) => {
                json!({"type": "function", "function": {"name": name}})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct CandidateArgs {
        #[allow(dead_code)]
        domains: Vec<String>,
    }

    #[test]
    fn test_schema_generation_from_type() {
        let tool = ToolDefinition::for_args::<CandidateArgs>(
            "generate_domain_candidates",
            "Generate domain name candidates",
        );

        assert_eq!(tool.name, "generate_domain_candidates");
        assert_eq!(tool.parameters["type"], "object");
        assert_eq!(tool.parameters["properties"]["domains"]["type"], "array");
        assert!(tool.parameters.get("$schema").is_none());
    }

    #[test]
    fn test_anthropic_wire_format() {
        let tool = ToolDefinition::new("t", "desc", json!({"type": "object"}));
        let wire = tool.to_anthropic();

        assert_eq!(wire["name"], "t");
        assert_eq!(wire["input_schema"]["type"], "object");
    }

    #[test]
    fn test_openai_wire_format() {
        let tool = ToolDefinition::new("t", "desc", json!({"type": "object"}));
        let wire = tool.to_openai();

        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "t");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_tool_choice_formats() {
        assert_eq!(ToolChoice::Auto.to_anthropic()["type"], "auto");
        assert_eq!(ToolChoice::Any.to_openai(), json!("required"));

        let forced = ToolChoice::Tool("evaluate_domains".into());
        assert_eq!(forced.to_anthropic()["name"], "evaluate_domains");
        assert_eq!(forced.to_openai()["function"]["name"], "evaluate_domains");
    }
}
