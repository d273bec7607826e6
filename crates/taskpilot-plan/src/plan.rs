use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// A file the plan wants written before its commands run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    pub path: String,
    pub content: String,
}

impl FileSpec {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Structured output of one generation round
///
/// Wire format:
/// ```text
/// {"plan": ["step", ...], "commands": ["cmd", ...], "files": [{"path": "...", "content": "..."}]}
/// ```
/// Absent keys default to empty sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Human-readable step descriptions
    #[serde(rename = "plan", default)]
    pub steps: Vec<String>,
    /// Shell lines to run in order
    #[serde(default)]
    pub commands: Vec<String>,
    /// Files to materialize before any command runs
    #[serde(default)]
    pub files: Vec<FileSpec>,
}

#[derive(Error, Debug)]
pub enum MalformedPlanError {
    #[error("Plan is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Plan must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Plan does not match the expected structure: {0}")]
    InvalidStructure(#[source] serde_json::Error),

    #[error("File entry {index} has an empty path")]
    EmptyFilePath { index: usize },
}

impl Plan {
    /// Message of the single step shown when no usable plan could be produced
    pub const GENERATION_FAILED_STEP: &'static str = "Error: Could not generate a plan";

    /// Placeholder plan substituted when generation or parsing fails
    pub fn generation_failed() -> Self {
        Self {
            steps: vec![Self::GENERATION_FAILED_STEP.to_string()],
            commands: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Parse a plan from raw model output
    ///
    /// The payload may sit inside a ```` ```json ```` fence, any other fence,
    /// or be the bare response text, tried in that order.
    pub fn parse(raw_output: &str) -> Result<Self, MalformedPlanError> {
        debug!(output_len = raw_output.len(), "Parsing plan");

        let payload = extract_payload(raw_output);
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(MalformedPlanError::InvalidJson)?;

        if !value.is_object() {
            return Err(MalformedPlanError::NotAnObject(json_kind(&value)));
        }

        let plan: Plan =
            serde_json::from_value(value).map_err(MalformedPlanError::InvalidStructure)?;

        if let Some(index) = plan.files.iter().position(|f| f.path.trim().is_empty()) {
            return Err(MalformedPlanError::EmptyFilePath { index });
        }

        debug!(
            steps = plan.steps.len(),
            commands = plan.commands.len(),
            files = plan.files.len(),
            "Parsed plan"
        );
        Ok(plan)
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Get a short description of the plan for logging
    pub fn short_description(&self) -> String {
        format!(
            "{} {}, {} {}, {} {}",
            self.steps.len(),
            plural(self.steps.len(), "step", "steps"),
            self.commands.len(),
            plural(self.commands.len(), "command", "commands"),
            self.files.len(),
            plural(self.files.len(), "file", "files"),
        )
    }
}

/// Select the JSON candidate from raw model output
fn extract_payload(raw_output: &str) -> &str {
    let text = raw_output.trim();

    if let Some(start) = text.find(JSON_FENCE) {
        debug!("Found JSON-labeled fence");
        return fence_interior(&text[start + JSON_FENCE.len()..]).trim();
    }

    if let Some(start) = text.find(FENCE) {
        debug!("Found unlabeled fence");
        let body = skip_info_string(&text[start + FENCE.len()..]);
        return fence_interior(body).trim();
    }

    text
}

/// Everything up to the closing fence, or the rest of the text if unterminated
fn fence_interior(body: &str) -> &str {
    match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    }
}

/// Drop a language tag such as `JSON` or `javascript` from the opening fence line
fn skip_info_string(body: &str) -> &str {
    let Some(newline) = body.find('\n') else {
        return body;
    };
    let info = body[..newline].trim();
    if info.is_empty() || info.starts_with('{') || info.starts_with('[') {
        body
    } else {
        &body[newline + 1..]
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"plan": ["Create the file", "List it"], "commands": ["ls -la"], "files": [{"path": "src/hello.txt", "content": "hi\nthere"}]}"#;

    fn expected() -> Plan {
        Plan {
            steps: vec!["Create the file".into(), "List it".into()],
            commands: vec!["ls -la".into()],
            files: vec![FileSpec::new("src/hello.txt", "hi\nthere")],
        }
    }

    #[test]
    fn test_parse_fence_variants_agree() {
        let labeled = format!("Here is your plan:\n```json\n{}\n```\nGood luck!", PAYLOAD);
        let unlabeled = format!("```\n{}\n```", PAYLOAD);
        let bare = format!("  \n{}\n ", PAYLOAD);

        assert_eq!(Plan::parse(&labeled).unwrap(), expected());
        assert_eq!(Plan::parse(&unlabeled).unwrap(), expected());
        assert_eq!(Plan::parse(&bare).unwrap(), expected());
    }

    #[test]
    fn test_parse_fence_with_other_language_tag() {
        let output = format!("```JSON\n{}\n```", PAYLOAD);
        assert_eq!(Plan::parse(&output).unwrap(), expected());
    }

    #[test]
    fn test_parse_unterminated_fence() {
        let output = format!("```json\n{}", PAYLOAD);
        assert_eq!(Plan::parse(&output).unwrap(), expected());
    }

    #[test]
    fn test_parse_json_fence_preferred_over_earlier_fence() {
        let output = format!("```sh\nrm -rf /\n```\n\n```json\n{}\n```", PAYLOAD);
        assert_eq!(Plan::parse(&output).unwrap(), expected());
    }

    #[test]
    fn test_parse_missing_keys_default_to_empty() {
        let plan = Plan::parse(r#"{"plan": ["only steps"]}"#).unwrap();
        assert_eq!(plan.steps, vec!["only steps".to_string()]);
        assert!(plan.commands.is_empty());
        assert!(plan.files.is_empty());

        let plan = Plan::parse("{}").unwrap();
        assert_eq!(plan, Plan::default());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let result = Plan::parse("Sorry, I can't help");
        assert!(matches!(result, Err(MalformedPlanError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        let result = Plan::parse(r#"[["step"], [], []]"#);
        assert!(matches!(result, Err(MalformedPlanError::NotAnObject("an array"))));
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let result = Plan::parse(r#"{"steps": ["wrong key"]}"#);
        assert!(matches!(result, Err(MalformedPlanError::InvalidStructure(_))));
    }

    #[test]
    fn test_parse_rejects_wrong_value_types() {
        for payload in [
            r#"{"plan": "one step"}"#,
            r#"{"commands": [1, 2]}"#,
            r#"{"files": ["hello.txt"]}"#,
            r#"{"files": [{"path": "hello.txt"}]}"#,
            r#"{"files": null}"#,
        ] {
            let result = Plan::parse(payload);
            assert!(
                matches!(result, Err(MalformedPlanError::InvalidStructure(_))),
                "expected structure error for {}",
                payload
            );
        }
    }

    #[test]
    fn test_parse_rejects_empty_file_path() {
        let result = Plan::parse(r#"{"files": [{"path": "a.txt", "content": ""}, {"path": " ", "content": "x"}]}"#);
        assert!(matches!(
            result,
            Err(MalformedPlanError::EmptyFilePath { index: 1 })
        ));
    }

    #[test]
    fn test_generation_failed_plan() {
        let plan = Plan::generation_failed();
        assert_eq!(plan.steps, vec!["Error: Could not generate a plan".to_string()]);
        assert!(!plan.has_commands());
        assert!(!plan.has_files());
    }

    #[test]
    fn test_short_description() {
        assert_eq!(expected().short_description(), "2 steps, 1 command, 1 file");
    }
}
