//! These models represent the objects passed around by the assistant
//!
//! There are several related formats we need to interact with:
//! - useChat messages with tool invocations, sent from the chat interface to the server
//! - data stream protocol parts, sent from the server back to the chat interface
//! - openai chat completion messages/tools, sent from the agent to the LLM
//!
//! These overlap to varying degrees. We always immediately convert those data models
//! into the internal structs using to/from helpers, so the internal models are not an
//! exact match to any of these formats.
pub mod message;
pub mod role;
pub mod tool;
