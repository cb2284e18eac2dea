//! Chat session state
//!
//! Owns the transcript and action log for one conversation and applies
//! inbound frames to them. Revision increments on every mutation so
//! consumers can diff snapshots cheaply.

use serde::Serialize;

use agentline_protocol::AgentFrame;

use crate::actions::{ActionLog, ActionRecord};
use crate::transcript::{self, TranscriptEntry, TranscriptState};

/// Mutable session state behind the frame handler
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: TranscriptState,
    actions: ActionLog,
    revision: u64,
}

/// Immutable, renderable view of a session at one revision
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub entries: Vec<TranscriptEntry>,
    pub actions: Vec<ActionRecord>,
    pub processing: bool,
    pub revision: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded frame, dispatching between the transcript reducer
    /// and the action tracker.
    pub fn apply(&mut self, frame: &AgentFrame) {
        match frame {
            AgentFrame::ActionCreated { .. }
            | AgentFrame::ActionRemoved { .. }
            | AgentFrame::ActionClear => self.actions.apply(frame),
            other => {
                let state = std::mem::take(&mut self.transcript);
                self.transcript = transcript::reduce(state, other, &clock_now());
            }
        }
        self.revision += 1;
    }

    /// Append a locally-echoed user entry (called after a successful send).
    pub fn push_user_entry(&mut self, text: &str) {
        self.transcript
            .entries
            .push(TranscriptEntry::user(text, &clock_now()));
        self.revision += 1;
    }

    /// Flip the expansion flag on the tool entry with `entry_id`. Returns
    /// false (and leaves the revision alone) when no tool entry matches.
    pub fn toggle_expanded(&mut self, entry_id: &str) -> bool {
        let call = self
            .transcript
            .entries
            .iter_mut()
            .filter(|entry| entry.id == entry_id)
            .find_map(|entry| entry.tool_call.as_mut());
        match call {
            Some(call) => {
                call.expanded = !call.expanded;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn transcript(&self) -> &TranscriptState {
        &self.transcript
    }

    pub fn actions(&self) -> &ActionLog {
        &self.actions
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            entries: self.transcript.entries.clone(),
            actions: self.actions.records().to_vec(),
            processing: self.transcript.processing,
            revision: self.revision,
        }
    }
}

/// Get current time as ISO 8601 string
fn clock_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}Z", duration.as_secs())
}
