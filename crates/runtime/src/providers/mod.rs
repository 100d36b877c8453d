//! Model-completion provider adapters.
//!
//! Providers are plain chat endpoints. Tool use is negotiated in-band: the
//! manifest is rendered into the system prompt and the model is told to reply
//! with a JSON `tool_calls` object when it wants tools run.

mod anthropic;
mod ollama;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder};
pub use ollama::{OllamaBackend, OllamaBackendBuilder};

use crate::model::{ModelRequest, ToolSpec};

/// Instructions describing the available tools, or `None` when there are none.
pub fn tool_preamble(tools: &[ToolSpec]) -> Option<String> {
    if tools.is_empty() {
        return None;
    }

    let mut text = String::from(
        "You can call the following tools. To call tools, reply with only a JSON object \
         of the form {\"tool_calls\":[{\"name\":\"<tool>\",\"arguments\":{...}}]} and \
         nothing else. Tool results come back in the next message. Otherwise reply \
         in plain text.\n\nTools:",
    );
    for tool in tools {
        text.push_str(&format!(
            "\n- {}: {}\n  input schema: {}",
            tool.name, tool.description, tool.schema
        ));
    }
    Some(text)
}

/// System messages followed by the tool preamble, if any.
pub(crate) fn system_prompt(request: &ModelRequest<'_>) -> Option<String> {
    match (request.system_text(), tool_preamble(request.tools)) {
        (Some(system), Some(preamble)) => Some(format!("{system}\n\n{preamble}")),
        (system, preamble) => system.or(preamble),
    }
}
