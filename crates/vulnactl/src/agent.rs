//! The conversation loop.
//!
//! One `chat` invocation drives: transcript -> model -> (tool dispatch)* ->
//! model -> final text. The transcript starts fresh each call; nothing is
//! carried across turns except what the caller keeps. Tool calls run
//! sequentially in the order the model issued them, since later calls may
//! depend on context the model built from earlier results.

use serde_json::Value;
use tracing::debug;

use crate::registry::ToolDispatch;
use vulna_common::llm::{
    ChatMessage, LlmApi, LlmError, ToolDescriptor, FINISH_STOP, FINISH_TOOL_CALLS,
};

/// Terminal message when the round cap is hit.
pub const MAX_ITERATIONS_MESSAGE: &str = "Max iterations reached without completing the query.";

/// One dispatched call: what was asked, with what input, and what came back.
/// Accumulated for the duration of one `chat` invocation.
#[derive(Debug, Clone)]
pub struct ToolResultRecord {
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_result: String,
}

/// Final text plus the tool-result trail, returned even on exhaustion so the
/// caller keeps diagnostic value.
#[derive(Debug)]
pub struct ChatOutcome {
    pub reply: String,
    pub tool_results: Vec<ToolResultRecord>,
}

/// The CVE analyst agent: a model endpoint, a tool dispatcher and the fixed
/// descriptor list presented on every round.
pub struct Agent<L: LlmApi, D: ToolDispatch> {
    llm: L,
    dispatcher: D,
    tools: Vec<ToolDescriptor>,
    system_prompt: String,
    max_iterations: usize,
}

impl<L: LlmApi, D: ToolDispatch> Agent<L, D> {
    pub fn new(
        llm: L,
        dispatcher: D,
        tools: Vec<ToolDescriptor>,
        system_prompt: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations,
        }
    }

    /// Recover the dispatcher, e.g. to shut the session down.
    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// Answer one user query. LLM protocol failures are the only errors that
    /// escape; everything tool-related is folded into the transcript.
    pub async fn chat(&mut self, user_query: &str) -> Result<ChatOutcome, LlmError> {
        let mut messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(user_query),
        ];
        let mut tool_results: Vec<ToolResultRecord> = Vec::new();

        for iteration in 0..self.max_iterations {
            debug!("Chat iteration {}/{}", iteration + 1, self.max_iterations);

            let turn = self.llm.chat(&messages, &self.tools).await?;
            debug!("Finish reason: {}", turn.finish_reason);

            if turn.finish_reason == FINISH_STOP {
                return Ok(ChatOutcome {
                    reply: turn.message.content.unwrap_or_default(),
                    tool_results,
                });
            }

            let calls = match (&turn.finish_reason, &turn.message.tool_calls) {
                (reason, Some(calls)) if reason.as_str() == FINISH_TOOL_CALLS && !calls.is_empty() => {
                    calls.clone()
                }
                _ => {
                    // Truncation, content filters and anything else we cannot
                    // act on: report the raw reason and stop the turn.
                    return Ok(ChatOutcome {
                        reply: format!("Unexpected finish reason: {}", turn.finish_reason),
                        tool_results,
                    });
                }
            };

            // The model's own tool-call record must be visible on the next
            // round, so the raw assistant message goes into the transcript.
            messages.push(turn.message.clone());

            for call in &calls {
                let (tool_input, tool_result) =
                    match serde_json::from_str::<Value>(&call.function.arguments) {
                        Ok(args) => {
                            debug!("Calling tool: {} {}", call.function.name, args);
                            let output = self.dispatcher.invoke(&call.function.name, &args).await;
                            (args, output)
                        }
                        Err(e) => {
                            // A single malformed call must not abort the loop;
                            // the model sees the parse error and may retry.
                            (
                                Value::Null,
                                format!("Error: invalid tool arguments: {}", e),
                            )
                        }
                    };

                messages.push(ChatMessage::tool(call.id.clone(), tool_result.clone()));
                tool_results.push(ToolResultRecord {
                    tool_name: call.function.name.clone(),
                    tool_input,
                    tool_result,
                });
            }
        }

        Ok(ChatOutcome {
            reply: MAX_ITERATIONS_MESSAGE.to_string(),
            tool_results,
        })
    }
}
