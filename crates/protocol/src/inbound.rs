//! Server → Client frames

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete typed frame received from the agent stream.
///
/// Kind-specific fields are optional on the wire; consumers validate the
/// fields they need and ignore frames that arrive incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentFrame {
    // Run lifecycle
    Start,
    Complete,
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    // Assistant text, streamed token by token
    TextDelta {
        #[serde(skip_serializing_if = "Option::is_none")]
        delta: Option<String>,
    },
    TextDone,

    // Tool calls and their (possibly later) outputs
    ToolCalled {
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_args: Option<String>,
    },
    ToolOutput {
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<ToolOutput>,
    },

    // Proposed actions
    ActionCreated {
        #[serde(skip_serializing_if = "Option::is_none")]
        action_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_args: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    ActionRemoved {
        #[serde(skip_serializing_if = "Option::is_none")]
        action_id: Option<String>,
    },
    ActionClear,
}

/// Tool output payload — a plain string or an arbitrary JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
}

impl ToolOutput {
    /// Render the payload as display text. Structured values are
    /// pretty-printed JSON.
    pub fn to_text(&self) -> String {
        match self {
            ToolOutput::Text(s) => s.clone(),
            ToolOutput::Structured(v) => {
                serde_json::to_string_pretty(v).unwrap_or_default()
            }
        }
    }
}
