use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::models::message::{Message, MessageContent, ToolRequest, ToolResponse};
use crate::models::role::Role;
use crate::prompt_template::system_prompt;
use crate::providers::base::{CompletionChunk, Provider, Usage};
use crate::retriever::Retriever;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_STEPS: usize = 5;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentConfig {
    /// Upper bound on model calls within one reply
    pub max_steps: usize,
    /// Number of documentation snippets retrieved per reply
    pub top_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
}

/// What a reply produces, in the order it happens
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    TextDelta(String),
    ToolCall(ToolRequest),
    ToolResult(ToolResponse),
    StepFinish {
        reason: FinishReason,
        usage: Usage,
        is_continued: bool,
    },
    Finish {
        reason: FinishReason,
        usage: Usage,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Idle,
    ContextBuilding,
    ModelCall { step: usize },
    ToolExecuting { step: usize },
    Streaming,
    Done,
    Failed,
}

fn advance(state: &mut ReplyState, next: ReplyState) {
    debug!(from = ?*state, to = ?next, "reply state");
    *state = next;
}

/// The most recent thing the user typed, used as the retrieval query
fn latest_user_text(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User && m.has_text())
        .map(Message::text)
        .unwrap_or_default()
}

/// Agent answers questions about the catalog with a model, retrieved documentation and tools
pub struct Agent {
    provider: Box<dyn Provider>,
    tools: ToolRegistry,
    retriever: Retriever,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        provider: Box<dyn Provider>,
        tools: ToolRegistry,
        retriever: Retriever,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            retriever,
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn config(&self) -> AgentConfig {
        self.config
    }

    fn execute(&self, request: &ToolRequest) -> ToolResponse {
        let tool_result = match &request.tool_call {
            Ok(call) => self.tools.dispatch(call),
            Err(e) => Err(e.clone()),
        };
        if let Err(e) = &tool_result {
            debug!(id = %request.id, error = %e, "tool call failed");
        }
        ToolResponse {
            id: request.id.clone(),
            tool_result,
        }
    }

    /// Create a stream of events for one reply to the conversation.
    ///
    /// Context is retrieved before the stream is returned. The model is then called
    /// repeatedly, executing any tools it asks for, until it answers without tools or
    /// the step limit is reached. Dropping the stream abandons the reply.
    pub async fn reply(
        &self,
        messages: &[Message],
        extra_instructions: Option<&str>,
    ) -> Result<BoxStream<'_, Result<AgentEvent>>> {
        let mut state = ReplyState::Idle;
        advance(&mut state, ReplyState::ContextBuilding);

        let query = latest_user_text(messages);
        let context = self.retriever.retrieve(&query, self.config.top_k).await;
        let tools = self.tools.declarations().to_vec();
        let system = system_prompt(&tools, &context, extra_instructions)?;

        let mut messages = messages.to_vec();
        let max_steps = self.config.max_steps.max(1);

        let events: BoxStream<'_, Result<AgentEvent>> = Box::pin(try_stream! {
            let mut total = Usage::default();
            let mut step = 0;

            loop {
                step += 1;
                advance(&mut state, ReplyState::ModelCall { step });

                let mut completion = self.provider.stream(&system, &messages, &tools).await?;
                let mut text = String::new();
                let mut requests = Vec::new();
                let mut usage = Usage::default();

                while let Some(chunk) = completion.try_next().await? {
                    match chunk {
                        CompletionChunk::Text(delta) => {
                            text.push_str(&delta);
                            yield AgentEvent::TextDelta(delta);
                        }
                        CompletionChunk::ToolRequest(request) => requests.push(request),
                        CompletionChunk::Usage(reported) => usage = usage.combine(&reported),
                    }
                }
                total = total.combine(&usage);

                if requests.is_empty() {
                    advance(&mut state, ReplyState::Streaming);
                    yield AgentEvent::StepFinish {
                        reason: FinishReason::Stop,
                        usage,
                        is_continued: false,
                    };
                    advance(&mut state, ReplyState::Done);
                    yield AgentEvent::Finish {
                        reason: FinishReason::Stop,
                        usage: total,
                    };
                    break;
                }

                advance(&mut state, ReplyState::ToolExecuting { step });
                let mut assistant = Message::assistant();
                if !text.is_empty() {
                    assistant = assistant.with_text(text);
                }
                let mut results = Message::user();

                for request in requests {
                    yield AgentEvent::ToolCall(request.clone());
                    let response = self.execute(&request);
                    yield AgentEvent::ToolResult(response.clone());

                    assistant = assistant.with_content(MessageContent::ToolRequest(request));
                    results = results.with_content(MessageContent::ToolResponse(response));
                }
                messages.push(assistant);
                messages.push(results);

                let at_limit = step >= max_steps;
                yield AgentEvent::StepFinish {
                    reason: FinishReason::ToolCalls,
                    usage,
                    is_continued: !at_limit,
                };

                if at_limit {
                    warn!(max_steps, "step limit reached with tool calls outstanding");
                    advance(&mut state, ReplyState::Done);
                    yield AgentEvent::Finish {
                        reason: FinishReason::ToolCalls,
                        usage: total,
                    };
                    break;
                }
            }
        });

        Ok(Box::pin(events.inspect_err(|e| {
            error!(state = ?ReplyState::Failed, error = %e, "reply failed");
        })))
    }

    /// Run a reply to completion and return all of the assistant's text
    pub async fn ask(&self, messages: &[Message]) -> Result<String> {
        let mut events = self.reply(messages, None).await?;
        let mut answer = String::new();
        let mut step = String::new();
        while let Some(event) = events.try_next().await? {
            match event {
                AgentEvent::TextDelta(delta) => step.push_str(&delta),
                AgentEvent::StepFinish { .. } | AgentEvent::Finish { .. } => {
                    append_step(&mut answer, &mut step)
                }
                _ => {}
            }
        }
        append_step(&mut answer, &mut step);
        Ok(answer)
    }
}

/// Text of separate steps is kept on separate lines
fn append_step(answer: &mut String, step: &mut String) {
    if step.is_empty() {
        return;
    }
    if !answer.is_empty() {
        answer.push('\n');
    }
    answer.push_str(step);
    step.clear();
}
