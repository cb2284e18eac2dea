//! Agentline Client
//!
//! Client-side runtime for the agent chat stream: a connection-resilience
//! manager that keeps one WebSocket alive across transient failures, and a
//! streaming reducer that folds typed frames into a renderable transcript
//! and action log. Presentation layers consume [`SessionSnapshot`]s and
//! call [`AgentClient::send_user_text`]; nothing here renders.

pub mod actions;
pub mod client;
pub mod connection;
pub mod error;
pub mod session;
pub mod transcript;

pub use actions::{ActionLog, ActionRecord, ActionStatus};
pub use client::{AgentClient, ClientOptions};
pub use connection::{Connection, ConnectionState, ReconnectPolicy};
pub use error::ClientError;
pub use session::{ChatSession, SessionSnapshot};
pub use transcript::{reduce, Role, ToolCall, TranscriptEntry, TranscriptState};
