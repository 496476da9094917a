use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON Schema object defining the expected parameters for the tool
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A tool call request that the registry can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and arguments
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationState {
    #[serde(alias = "call", alias = "partial-call")]
    Pending,
    Result,
    Error,
}

/// A tool invocation as the chat interface reports it back with earlier assistant turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    pub state: InvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolInvocation {
    /// Replay a finished invocation as the request/response pair the model originally saw.
    ///
    /// Only invocations in the `result` state are replayed, anything else would leave a
    /// dangling tool call in the transcript.
    pub fn to_messages(&self) -> Option<[Message; 2]> {
        match (self.state, &self.result) {
            (InvocationState::Result, Some(result)) => Some([
                Message::assistant().with_tool_request(
                    self.tool_call_id.clone(),
                    Ok(ToolCall::new(self.tool_name.clone(), self.args.clone())),
                ),
                Message::user().with_tool_response(self.tool_call_id.clone(), Ok(result.clone())),
            ]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use serde_json::json;

    #[test]
    fn test_invocation_state_aliases() -> anyhow::Result<()> {
        let pending: InvocationState = serde_json::from_value(json!("partial-call"))?;
        assert_eq!(pending, InvocationState::Pending);
        let pending: InvocationState = serde_json::from_value(json!("call"))?;
        assert_eq!(pending, InvocationState::Pending);
        let result: InvocationState = serde_json::from_value(json!("result"))?;
        assert_eq!(result, InvocationState::Result);
        Ok(())
    }

    #[test]
    fn test_result_invocation_replays_as_pair() -> anyhow::Result<()> {
        let invocation: ToolInvocation = serde_json::from_value(json!({
            "toolCallId": "call_1",
            "toolName": "listEndpoints",
            "args": {},
            "state": "result",
            "result": ["Search People"]
        }))?;

        let [request, response] = invocation.to_messages().expect("replayable");
        let tool_request = request.content[0].as_tool_request().expect("tool request");
        assert_eq!(tool_request.id, "call_1");
        assert_eq!(
            tool_request.tool_call,
            Ok(ToolCall::new("listEndpoints", json!({})))
        );
        assert!(matches!(
            &response.content[0],
            MessageContent::ToolResponse(r) if r.tool_result == Ok(json!(["Search People"]))
        ));
        Ok(())
    }

    #[test]
    fn test_pending_invocation_is_not_replayed() {
        let invocation = ToolInvocation {
            tool_call_id: "call_2".to_string(),
            tool_name: "getEndpointDetail".to_string(),
            args: json!({"apiName": "Search People"}),
            state: InvocationState::Pending,
            result: None,
        };
        assert!(invocation.to_messages().is_none());
    }
}
