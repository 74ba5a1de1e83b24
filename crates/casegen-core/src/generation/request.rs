//! Outbound request types.

use crate::chat::ChatMessage;
use crate::error::{CasegenError, Result};
use serde::{Deserialize, Serialize};

/// Output format requested from the producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Scenario / precondition / steps / expected result layout.
    #[default]
    Default,
    /// Given / When / Then.
    Gherkin,
    /// Follows a caller-supplied example.
    Custom,
}

/// Format selection plus the optional example test case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    pub kind: FormatKind,
    #[serde(default)]
    pub example: Option<String>,
}

impl FormatOptions {
    pub fn new(kind: FormatKind) -> Self {
        Self {
            kind,
            example: None,
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Custom formats need a non-blank example to imitate.
    pub fn validate(&self) -> Result<()> {
        let has_example = self.example.as_deref().is_some_and(|e| !e.trim().is_empty());
        if self.kind == FormatKind::Custom && !has_example {
            return Err(CasegenError::validation(
                "For custom format, a test case example is required",
            ));
        }
        Ok(())
    }
}

/// What the producer should generate test cases for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationPrompt {
    /// Requirement text.
    pub requirements: String,
    /// Functional context of the project.
    pub context: String,
}

impl GenerationPrompt {
    pub fn new(requirements: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            requirements: requirements.into(),
            context: context.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.requirements.trim().is_empty() {
            return Err(CasegenError::validation("No requirements provided"));
        }
        if self.context.trim().is_empty() {
            return Err(CasegenError::validation("No functional context provided"));
        }
        Ok(())
    }
}

/// Body of a streaming generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBody {
    pub requirements: String,
    pub format_type: FormatKind,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_case: Option<String>,
    pub project_id: String,
}

/// Body of a conversational edit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationBody {
    pub message: String,
    pub project_id: String,
    /// Current document content.
    pub test_cases: String,
    pub requirement_id: String,
    pub requirement_title: String,
    pub requirements: String,
    pub chat_history: Vec<ChatMessage>,
    /// Ask the agent to answer with the full rewritten document.
    pub direct_mode: bool,
    pub active_history_id: Option<String>,
}

/// A request that opens a frame stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    Generate(GenerationBody),
    Converse(ConversationBody),
}

impl OutboundRequest {
    /// Path of the endpoint serving this request, relative to the base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            OutboundRequest::Generate(_) => "generate_test_cases_stream",
            OutboundRequest::Converse(_) => "chat_with_assistant",
        }
    }

    /// JSON body of the request.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            OutboundRequest::Generate(body) => serde_json::to_value(body)?,
            OutboundRequest::Converse(body) => serde_json::to_value(body)?,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_format_requires_example() {
        let options = FormatOptions::new(FormatKind::Custom);
        assert!(options.validate().unwrap_err().is_validation());

        let blank = FormatOptions::new(FormatKind::Custom).with_example("   ");
        assert!(blank.validate().is_err());

        let ok = FormatOptions::new(FormatKind::Custom).with_example("Scenario (1): ...");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_gherkin_without_example_is_allowed() {
        assert!(FormatOptions::new(FormatKind::Gherkin).validate().is_ok());
    }

    #[test]
    fn test_prompt_requires_requirements_and_context() {
        assert!(GenerationPrompt::new("", "ctx").validate().is_err());
        assert!(GenerationPrompt::new("login", " ").validate().is_err());
        assert!(GenerationPrompt::new("login", "web shop").validate().is_ok());
    }

    #[test]
    fn test_generation_body_wire_format() {
        let request = OutboundRequest::Generate(GenerationBody {
            requirements: "User can log in".into(),
            format_type: FormatKind::Gherkin,
            context: "Web shop".into(),
            example_case: None,
            project_id: "p1".into(),
        });

        let json = request.to_json().unwrap();

        assert_eq!(request.endpoint(), "generate_test_cases_stream");
        assert_eq!(json["format_type"], "gherkin");
        assert_eq!(json["requirements"], "User can log in");
        assert!(json.get("example_case").is_none());
    }
}
