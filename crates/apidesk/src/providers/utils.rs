use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::base::{CompletionChunk, Usage};
use crate::errors::ToolError;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Placeholder name sent for tool requests the model produced with an invalid shape,
/// so the matching error response still has a call to attach to.
pub const INVALID_TOOL_NAME: &str = "invalid_tool_call";

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        let mut output = Vec::new();
        let mut text = String::new();

        for content in &message.content {
            match content {
                MessageContent::Text(content) => text.push_str(&content.text),
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        Err(_) => (INVALID_TOOL_NAME.to_string(), "{}".to_string()),
                    };

                    if let Some(object) = converted.as_object_mut() {
                        let tool_calls = object.entry("tool_calls").or_insert(json!([]));
                        if let Some(calls) = tool_calls.as_array_mut() {
                            calls.push(json!({
                                "id": request.id,
                                "type": "function",
                                "function": {
                                    "name": name,
                                    "arguments": arguments,
                                }
                            }));
                        }
                    }
                }
                MessageContent::ToolResponse(response) => {
                    let content = match &response.tool_result {
                        Ok(value) => value.to_string(),
                        // A tool result error is shown as output so the model can interpret the error message
                        Err(e) => format!("The tool call returned the following error:\n{}", e),
                    };
                    output.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if !text.is_empty() {
            converted["content"] = json!(text);
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a tool request from the raw id, name and argument string the model produced
pub fn tool_request_from_parts(id: String, name: &str, arguments: &str) -> ToolRequest {
    if !is_valid_function_name(name) {
        let error = ToolError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            name
        ));
        return ToolRequest {
            id,
            tool_call: Err(error),
        };
    }

    // Tools without parameters are frequently called with an empty argument string
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };

    let tool_call = match serde_json::from_str::<Value>(arguments) {
        Ok(params) => Ok(ToolCall::new(name, params)),
        Err(e) => Err(ToolError::InvalidArguments(format!(
            "Could not interpret tool use parameters for id {}: {}",
            id, e
        ))),
    };
    ToolRequest { id, tool_call }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates tool call fragments from a streamed chat completion.
///
/// OpenAI sends the id and name once, then the arguments string in pieces, all keyed
/// by the position of the call in the message.
#[derive(Debug, Default)]
pub struct StreamingToolCalls {
    calls: BTreeMap<u64, PartialToolCall>,
}

impl StreamingToolCalls {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn accumulate(&mut self, delta: &Value) {
        let index = delta.get("index").and_then(Value::as_u64).unwrap_or(0);
        let call = self.calls.entry(index).or_default();

        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            call.id.push_str(id);
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                call.name.push_str(name);
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                call.arguments.push_str(arguments);
            }
        }
    }

    /// Finish all accumulated calls, in the order the model issued them
    pub fn finish(self) -> Vec<ToolRequest> {
        self.calls
            .into_values()
            .map(|call| tool_request_from_parts(call.id, &call.name, &call.arguments))
            .collect()
    }
}

/// Interpret one `data:` payload of a streamed chat completion
pub fn parse_stream_event(
    event: &Value,
    tool_calls: &mut StreamingToolCalls,
) -> Result<Vec<CompletionChunk>> {
    if let Some(error) = event.get("error") {
        return Err(anyhow!("OpenAI API error: {}", error));
    }

    let mut chunks = Vec::new();

    if let Some(delta) = event
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
    {
        if let Some(text) = delta.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                chunks.push(CompletionChunk::Text(text.to_string()));
            }
        }
        if let Some(deltas) = delta.get("tool_calls").and_then(Value::as_array) {
            for tool_delta in deltas {
                tool_calls.accumulate(tool_delta);
            }
        }
    }

    if let Some(usage) = event.get("usage").filter(|u| u.is_object()) {
        chunks.push(CompletionChunk::Usage(usage_from_value(usage)));
    }

    Ok(chunks)
}

pub fn usage_from_value(usage: &Value) -> Usage {
    let get = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);

    let input_tokens = get("prompt_tokens");
    let output_tokens = get("completion_tokens");
    let total_tokens = get("total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}
