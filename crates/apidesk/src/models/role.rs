use serde::{Deserialize, Serialize};

/// The author of a message on the model side of the conversation.
///
/// Tool results are carried by user messages, mirroring how the model consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
