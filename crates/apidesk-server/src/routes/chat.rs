use crate::state::AppState;
use apidesk::{
    agent::{AgentEvent, FinishReason},
    models::{
        message::{Message, ToolRequest, ToolResponse},
        tool::ToolInvocation,
    },
    providers::{base::Usage, utils::INVALID_TOOL_NAME},
};
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

/// Shown to the client when a reply dies; details stay in the server log
const REPLY_FAILED: &str = "Something went wrong while answering. Please try again.";

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    #[serde(rename = "toolInvocations")]
    tool_invocations: Vec<ToolInvocation>,
}

// Custom SSE response type that implements the Vercel AI SDK protocol
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("x-vercel-ai-data-stream", "v1")
            .body(body)
            .unwrap()
    }
}

/// Convert incoming messages into the transcript, plus any instructions carried
/// by system messages
fn convert_messages(incoming: Vec<IncomingMessage>) -> (Vec<Message>, Option<String>) {
    let mut messages = Vec::new();
    let mut instructions = Vec::new();

    for msg in incoming {
        match msg.role.as_str() {
            "user" => {
                if !msg.content.is_empty() {
                    messages.push(Message::user().with_text(msg.content));
                }
            }
            "assistant" => {
                // Each finished invocation is a complete request/response cycle that
                // happened before the assistant's text
                for invocation in &msg.tool_invocations {
                    match invocation.to_messages() {
                        Some(pair) => messages.extend(pair),
                        None => tracing::debug!(
                            id = %invocation.tool_call_id,
                            state = ?invocation.state,
                            "dropping unfinished tool invocation"
                        ),
                    }
                }

                if !msg.content.is_empty() {
                    messages.push(Message::assistant().with_text(msg.content));
                }
            }
            "system" => {
                if !msg.content.trim().is_empty() {
                    instructions.push(msg.content);
                }
            }
            "tool" => {
                // tool exchanges arrive as toolInvocations on assistant messages
                tracing::warn!("Ignoring message with role tool");
            }
            _ => {
                tracing::warn!("Unknown role: {}", msg.role);
            }
        }
    }

    let instructions = (!instructions.is_empty()).then(|| instructions.join("\n\n"));
    (messages, instructions)
}

// Protocol-specific message formatting
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn format_text(text: &str) -> String {
        let encoded_text = serde_json::to_string(text).unwrap_or_else(|_| String::new());
        format!("0:{}\n", encoded_text)
    }

    fn format_tool_call(request: &ToolRequest) -> String {
        // if the llm generates an invalid tool call we still report it, its response
        // carries the error
        let (name, args) = match &request.tool_call {
            Ok(call) => (call.name.as_str(), call.arguments.clone()),
            Err(_) => (INVALID_TOOL_NAME, json!({})),
        };
        let tool_call = json!({
            "toolCallId": request.id,
            "toolName": name,
            "args": args
        });
        format!("9:{}\n", tool_call)
    }

    fn format_tool_response(response: &ToolResponse) -> String {
        let result = match &response.tool_result {
            Ok(value) => value.clone(),
            Err(err) => json!({ "error": err.to_string() }),
        };
        let response = json!({
            "toolCallId": response.id,
            "result": result,
        });
        format!("a:{}\n", response)
    }

    fn usage(usage: &Usage) -> Value {
        json!({
            "promptTokens": usage.input_tokens.unwrap_or(0),
            "completionTokens": usage.output_tokens.unwrap_or(0)
        })
    }

    fn format_step_finish(reason: FinishReason, usage: &Usage, is_continued: bool) -> String {
        let step = json!({
            "finishReason": reason,
            "usage": Self::usage(usage),
            "isContinued": is_continued
        });
        format!("e:{}\n", step)
    }

    fn format_finish(reason: FinishReason, usage: &Usage) -> String {
        let finish = json!({
            "finishReason": reason,
            "usage": Self::usage(usage)
        });
        format!("d:{}\n", finish)
    }

    fn format_error(message: &str) -> String {
        let encoded = serde_json::to_string(message).unwrap_or_else(|_| String::new());
        format!("3:{}\n", encoded)
    }

    fn format_event(event: &AgentEvent) -> String {
        match event {
            AgentEvent::TextDelta(text) => Self::format_text(text),
            AgentEvent::ToolCall(request) => Self::format_tool_call(request),
            AgentEvent::ToolResult(response) => Self::format_tool_response(response),
            AgentEvent::StepFinish {
                reason,
                usage,
                is_continued,
            } => Self::format_step_finish(*reason, usage, *is_continued),
            AgentEvent::Finish { reason, usage } => Self::format_finish(*reason, usage),
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    // Check protocol header (optional in our case)
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "data").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let (messages, instructions) = convert_messages(request.messages);
    let agent = state.agent.clone();

    // Spawn task to handle streaming
    tokio::spawn(async move {
        let mut stream = match agent.reply(&messages, instructions.as_deref()).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to start reply stream: {}", e);
                let _ = tx.send(ProtocolFormatter::format_error(REPLY_FAILED)).await;
                return;
            }
        };

        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(Ok(event))) => {
                    if let Err(e) = tx.send(ProtocolFormatter::format_event(&event)).await {
                        tracing::error!("Error sending event through channel: {}", e);
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("Error processing reply: {}", e);
                    let _ = tx.send(ProtocolFormatter::format_error(REPLY_FAILED)).await;
                    break;
                }
                Ok(None) => {
                    break;
                }
                Err(_) => {
                    // Heartbeat, used to detect disconnected clients and abandon the reply
                    if tx.is_closed() {
                        tracing::info!("client disconnected, abandoning reply");
                        break;
                    }
                    continue;
                }
            }
        }
    });

    Ok(SseResponse::new(stream))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

// simple ask for a response, non streaming
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, StatusCode> {
    let messages = vec![Message::user().with_text(request.prompt)];

    match state.agent.ask(&messages).await {
        Ok(response) => Ok(Json(AskResponse {
            response: response.trim().to_string(),
        })),
        Err(e) => {
            tracing::error!("Failed to answer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .route("/api/ask", post(ask_handler))
        .with_state(state)
}
