use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;
use crate::providers::base::{CompletionChunk, CompletionStream, Provider, Usage};

/// A scripted reply, either a message to stream back or a failure
#[derive(Debug, Clone)]
pub enum MockReply {
    Message(Message),
    Error(String),
}

/// What the provider was asked on one call
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Mutex<VecDeque<MockReply>>,
    fallback: Option<Message>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_replies(responses.into_iter().map(MockReply::Message).collect())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            responses: Mutex::new(replies.into()),
            fallback: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that answers every call with the same message
    pub fn repeating(message: Message) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(message),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the recorded calls, usable after the provider was moved into an agent
    pub fn calls(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.calls)
    }

    fn next_reply(&self) -> MockReply {
        let mut responses = self.responses.lock().unwrap();
        match responses.pop_front() {
            Some(reply) => reply,
            None => MockReply::Message(
                self.fallback
                    .clone()
                    .unwrap_or_else(Message::assistant),
            ),
        }
    }
}

fn chunks_for(message: Message) -> Vec<Result<CompletionChunk>> {
    let mut chunks = Vec::new();
    let text = message.text();
    for piece in text.split_inclusive(' ') {
        chunks.push(Ok(CompletionChunk::Text(piece.to_string())));
    }
    for content in message.content {
        if let MessageContent::ToolRequest(request) = content {
            chunks.push(Ok(CompletionChunk::ToolRequest(request)));
        }
    }
    chunks.push(Ok(CompletionChunk::Usage(Usage::new(
        Some(10),
        Some(5),
        Some(15),
    ))));
    chunks
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<CompletionStream> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        match self.next_reply() {
            MockReply::Message(message) => Ok(Box::pin(stream::iter(chunks_for(message)))),
            MockReply::Error(error) => Err(anyhow!(error)),
        }
    }
}
