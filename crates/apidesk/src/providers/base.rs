use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Sum two usage reports, a count stays unknown only if both sides are unknown
    pub fn combine(&self, other: &Usage) -> Usage {
        fn add(a: Option<i32>, b: Option<i32>) -> Option<i32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }
        }

        Usage::new(
            add(self.input_tokens, other.input_tokens),
            add(self.output_tokens, other.output_tokens),
            add(self.total_tokens, other.total_tokens),
        )
    }
}

/// One increment of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    /// A fragment of assistant text, forwarded as soon as it arrives
    Text(String),
    /// A complete tool request, emitted once all of its argument fragments arrived
    ToolRequest(ToolRequest),
    Usage(Usage),
}

pub type CompletionStream = BoxStream<'static, Result<CompletionChunk>>;

/// Base trait for language model providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating the next assistant message, yielding it incrementally
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<CompletionStream>;

    /// Generate the next message in one piece
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let mut stream = self.stream(system, messages, tools).await?;
        let mut text = String::new();
        let mut requests = Vec::new();
        let mut usage = Usage::default();

        while let Some(chunk) = stream.try_next().await? {
            match chunk {
                CompletionChunk::Text(delta) => text.push_str(&delta),
                CompletionChunk::ToolRequest(request) => requests.push(request),
                CompletionChunk::Usage(reported) => usage = usage.combine(&reported),
            }
        }

        let mut message = Message::assistant();
        if !text.is_empty() {
            message = message.with_text(text);
        }
        for request in requests {
            message = message.with_content(MessageContent::ToolRequest(request));
        }
        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::models::tool::ToolCall;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_combine() {
        let first = Usage::new(Some(10), Some(5), None);
        let second = Usage::new(Some(3), None, None);
        assert_eq!(first.combine(&second), Usage::new(Some(13), Some(5), None));
        assert_eq!(Usage::default().combine(&Usage::default()), Usage::default());
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["output_tokens"], json!(20));
        assert_eq!(json_value["total_tokens"], json!(30));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_collects_stream() -> Result<()> {
        let scripted = Message::assistant()
            .with_text("Checking the catalog now")
            .with_tool_request("1", Ok(ToolCall::new("listEndpoints", json!({}))));
        let provider = MockProvider::new(vec![scripted]);

        let (message, usage) = provider.complete("system", &[], &[]).await?;
        assert_eq!(message.text(), "Checking the catalog now");
        assert_eq!(message.tool_requests().len(), 1);
        assert!(usage.total_tokens.is_some());
        Ok(())
    }
}
