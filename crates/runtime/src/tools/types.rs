//! Tool-call payloads and their outcomes.

use super::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    fn from_entry(entry: &Value) -> Option<Self> {
        let entry = entry.as_object()?;
        let name = entry.get("name")?.as_str()?;
        let arguments = match entry.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments.clone(),
            Some(_) => return None,
        };
        Some(Self::new(name, arguments))
    }
}

/// Interpret a model reply as a batch of tool calls.
///
/// Only an object with a non-empty `tool_calls` list of `{name, arguments}`
/// entries qualifies. Anything else, malformed JSON included, is `None` and
/// the reply is plain text.
pub fn parse_tool_calls(reply: &str) -> Option<Vec<ToolCall>> {
    let value: Value = serde_json::from_str(reply.trim()).ok()?;
    let entries = value.as_object()?.get("tool_calls")?.as_array()?;
    if entries.is_empty() {
        return None;
    }
    entries.iter().map(ToolCall::from_entry).collect()
}

/// What happened to one call in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub name: String,
    pub result: Result<Value, ToolError>,
}

impl ToolOutcome {
    /// `[name] success: <result>` or `[name] error: <message>`.
    pub fn status_line(&self) -> String {
        match &self.result {
            Ok(Value::String(text)) => format!("[{}] success: {text}", self.name),
            Ok(value) => format!("[{}] success: {value}", self.name),
            Err(e) => format!("[{}] error: {e}", self.name),
        }
    }
}

/// Status message summarizing a whole batch, one line per call.
pub fn format_outcomes(outcomes: &[ToolOutcome]) -> String {
    outcomes
        .iter()
        .map(ToolOutcome::status_line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_tool_call_payload() {
        let calls = parse_tool_calls(
            r#"  {"tool_calls":[{"name":"dice","arguments":{"sides":20}},{"name":"clock"}]} "#,
        )
        .unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "dice");
        assert_eq!(calls[0].arguments["sides"], 20);
        assert!(calls[1].arguments.is_empty());
    }

    #[test]
    fn other_shapes_are_plain_text() {
        for reply in [
            "The answer is 4.",
            r#"{"tool_calls":[]}"#,
            r#"{"tool_calls":"dice"}"#,
            r#"{"tool_calls":[{"arguments":{}}]}"#,
            r#"{"tool_calls":[{"name":"dice","arguments":[1]}]}"#,
            r#"{"tool_calls":[{"name":"dice"}"#,
            r#"[{"name":"dice"}]"#,
            r#"{"calls":[{"name":"dice"}]}"#,
        ] {
            assert!(parse_tool_calls(reply).is_none(), "{reply}");
        }
    }

    #[test]
    fn status_lines() {
        let outcomes = [
            ToolOutcome {
                name: "dice".into(),
                result: Ok(json!({ "result": 4, "sides": 6 })),
            },
            ToolOutcome {
                name: "echo".into(),
                result: Ok(json!("hi")),
            },
            ToolOutcome {
                name: "weather".into(),
                result: Err(ToolError::NotFound("weather".into())),
            },
        ];
        assert_eq!(
            format_outcomes(&outcomes),
            "[dice] success: {\"result\":4,\"sides\":6}\n\
             [echo] success: hi\n\
             [weather] error: tool not found: weather"
        );
    }
}
