use anyhow::{anyhow, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{CompletionChunk, CompletionStream, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    messages_to_openai_spec, parse_stream_event, tools_to_openai_spec, StreamingToolCalls,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
            "stream_options": {"include_usage": true}
        });

        if let Some(object) = payload.as_object_mut() {
            if !tools.is_empty() {
                object.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
            if let Some(tokens) = self.config.max_tokens {
                object.insert("max_tokens".to_string(), json!(tokens));
            }
        }

        Ok(payload)
    }
}

/// Handle one line of the event stream. Returns `None` once the terminal marker arrived.
fn handle_line(
    line: &[u8],
    tool_calls: &mut StreamingToolCalls,
) -> Result<Option<Vec<CompletionChunk>>> {
    let line = std::str::from_utf8(line)?.trim();
    let Some(data) = line.strip_prefix("data:") else {
        // comments, event names and blank separators
        return Ok(Some(Vec::new()));
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(None);
    }

    let event: Value = serde_json::from_str(data)
        .map_err(|e| anyhow!("Malformed completion event: {}", e))?;
    parse_stream_event(&event, tool_calls).map(Some)
}

/// Turn the raw event stream of a chat completion into completion chunks.
///
/// Lines are split on raw bytes so a multi-byte character spanning two network reads
/// is only decoded once it is complete.
fn completion_chunks<S, B, E>(bytes: S) -> impl Stream<Item = Result<CompletionChunk>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    try_stream! {
        let mut bytes = std::pin::pin!(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut tool_calls = StreamingToolCalls::default();
        let mut done = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::<anyhow::Error>::into)?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match handle_line(&line, &mut tool_calls)? {
                    Some(chunks) => {
                        for chunk in chunks {
                            yield chunk;
                        }
                    }
                    None => {
                        done = true;
                        break 'read;
                    }
                }
            }
        }

        if !done && !buffer.is_empty() {
            if let Some(chunks) = handle_line(&buffer, &mut tool_calls)? {
                for chunk in chunks {
                    yield chunk;
                }
            }
        }

        for request in tool_calls.finish() {
            yield CompletionChunk::ToolRequest(request);
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<CompletionStream> {
        let payload = self.build_payload(system, messages, tools)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Request failed: {}\n{}", status, body));
        }

        Ok(Box::pin(completion_chunks(response.bytes_stream())))
    }
}
