//! Session management: the bounded tool-call loop.

use crate::Result;
use crate::model::{Backend, Message, ModelRequest, Role, ToolSpec};
use crate::tools::{ToolHost, ToolOutcome, format_outcomes, parse_tool_calls};
use tracing::{Instrument, Span, debug, info, warn};

/// Maximum tool-call rounds in a single user turn.
pub const MAX_TOOL_ROUNDS: usize = 10;

/// A conversation session.
///
/// Each [`chat`](Session::chat) call turns one user message into one final
/// answer, running the tools the model asks for along the way.
pub struct Session<B, H> {
    backend: B,
    host: H,
    messages: Vec<Message>,
    max_rounds: usize,
    rounds: usize,
    span: Span,
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Self {
            backend,
            host,
            messages: Vec::new(),
            max_rounds: MAX_TOOL_ROUNDS,
            rounds: 0,
            span: tracing::info_span!("session"),
        }
    }

    /// Set the system prompt. It survives [`clear`](Session::clear).
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = Message::system(system);
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = system,
            _ => self.messages.insert(0, system),
        }
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Use `span` as the logging context for session events.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Tool rounds used by the most recent turn.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// The cached tool manifest.
    pub fn tools(&self) -> &[ToolSpec] {
        self.host.specs()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Drop the conversation, keeping the leading system message.
    pub fn clear(&mut self) {
        let keep = usize::from(self.messages.first().is_some_and(|m| m.role == Role::System));
        self.messages.truncate(keep);
        self.rounds = 0;
    }

    /// Send a user message and get the assistant's final answer.
    ///
    /// A backend failure aborts the turn. Tool failures are reported to the
    /// model and never abort it.
    pub async fn chat(&mut self, user_input: &str) -> Result<String> {
        let span = self.span.clone();
        self.turn(user_input).instrument(span).await
    }

    async fn turn(&mut self, user_input: &str) -> Result<String> {
        self.messages.push(Message::user(user_input));
        self.rounds = 0;

        let mut reply = self.generate(true).await?;

        while let Some(calls) = parse_tool_calls(&reply) {
            if self.rounds >= self.max_rounds {
                warn!(
                    rounds = self.rounds,
                    "tool round limit reached, returning the last reply"
                );
                break;
            }
            self.rounds += 1;
            info!(round = self.rounds, calls = calls.len(), "running tool calls");

            self.messages.push(Message::assistant(reply));

            let mut outcomes = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self.host.execute(call).await;
                match &result {
                    Ok(_) => debug!(tool = %call.name, "tool call succeeded"),
                    Err(e) => warn!(tool = %call.name, error = %e, "tool call failed"),
                }
                outcomes.push(ToolOutcome {
                    name: call.name.clone(),
                    result,
                });
            }
            self.messages.push(Message::tool_result(format_outcomes(&outcomes)));

            reply = self.generate(false).await?;
        }

        self.messages.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    async fn generate(&self, offer_tools: bool) -> Result<String> {
        let tools: &[ToolSpec] = if offer_tools { self.host.specs() } else { &[] };
        let request = ModelRequest {
            messages: &self.messages,
            tools,
        };
        let response = self.backend.generate(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "model replied"
        );
        Ok(response.text)
    }
}
