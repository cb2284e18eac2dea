//! Pure transcript reduction
//!
//! All transcript assembly lives here as a pure, synchronous function:
//! `reduce(state, frame, now) -> state`. No IO, no async, no locking —
//! fully unit-testable.

use serde::Serialize;

use agentline_protocol::{new_id, AgentFrame};

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One tool invocation attached to a Tool entry. `output` stays unset
/// until a matching `tool_output` frame arrives and, once set, is never
/// overwritten. `expanded` is presentation state owned by the record
/// itself rather than any shared registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: String,
    pub output: Option<String>,
    pub expanded: bool,
}

/// One entry in the conversation transcript. Insertion order is display
/// order; entries are never reordered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    pub is_streaming: bool,
    pub tool_call: Option<ToolCall>,
}

impl TranscriptEntry {
    pub fn user(text: &str, now: &str) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: text.to_string(),
            timestamp: now.to_string(),
            is_streaming: false,
            tool_call: None,
        }
    }

    fn assistant(content: String, is_streaming: bool, now: &str) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content,
            timestamp: now.to_string(),
            is_streaming,
            tool_call: None,
        }
    }

    fn tool(name: String, args: String, now: &str) -> Self {
        let call_id = new_id();
        Self {
            id: call_id.clone(),
            role: Role::Tool,
            content: format!("Called {name}"),
            timestamp: now.to_string(),
            is_streaming: false,
            tool_call: Some(ToolCall {
                id: call_id,
                name,
                args,
                output: None,
                expanded: false,
            }),
        }
    }
}

/// Renderable transcript plus the session-wide processing flag
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptState {
    pub entries: Vec<TranscriptEntry>,
    pub processing: bool,
}

/// Pure, synchronous transcript transition.
///
/// Action frames are no-ops here; they belong to the action tracker.
pub fn reduce(mut state: TranscriptState, frame: &AgentFrame, now: &str) -> TranscriptState {
    match frame {
        // -- Run lifecycle ----------------------------------------------------
        AgentFrame::Start => {
            state.processing = true;
        }

        AgentFrame::Complete => {
            state.processing = false;
        }

        AgentFrame::Error { message } => {
            state.processing = false;
            let text = message
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or("Unknown error occurred");
            state
                .entries
                .push(TranscriptEntry::assistant(format!("Error: {text}"), false, now));
        }

        // -- Tool calls -------------------------------------------------------
        AgentFrame::ToolCalled {
            tool_name,
            tool_args,
        } => {
            if let Some(name) = non_empty(tool_name) {
                let args = tool_args.clone().unwrap_or_default();
                state
                    .entries
                    .push(TranscriptEntry::tool(name.to_string(), args, now));
            }
        }

        AgentFrame::ToolOutput { output } => {
            let Some(output) = output else {
                return state;
            };
            let text = output.to_text();
            if text.is_empty() {
                return state;
            }
            // First pending call in transcript order receives the output:
            // calls resolve roughly FIFO and output frames carry no call id.
            // With no pending call the frame is protocol drift and ignored.
            if let Some(call) = state
                .entries
                .iter_mut()
                .filter_map(|entry| entry.tool_call.as_mut())
                .find(|call| call.output.is_none())
            {
                call.output = Some(text);
            }
        }

        // -- Streamed assistant text ------------------------------------------
        AgentFrame::TextDelta { delta } => {
            let Some(delta) = non_empty(delta) else {
                return state;
            };
            match state.entries.last_mut() {
                Some(last) if last.role == Role::Assistant && last.is_streaming => {
                    last.content.push_str(delta);
                }
                _ => {
                    // At most one entry streams at a time; close a stale one
                    // before opening the next.
                    for entry in &mut state.entries {
                        entry.is_streaming = false;
                    }
                    state
                        .entries
                        .push(TranscriptEntry::assistant(delta.to_string(), true, now));
                }
            }
        }

        AgentFrame::TextDone => {
            if let Some(last) = state.entries.last_mut() {
                last.is_streaming = false;
            }
        }

        // -- Handled by the action tracker ------------------------------------
        AgentFrame::ActionCreated { .. }
        | AgentFrame::ActionRemoved { .. }
        | AgentFrame::ActionClear => {}
    }

    state
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
