//! Action lifecycle tracking
//!
//! Append-only log of proposed actions. Status is monotonic
//! (active → removed, never back); `action_clear` is the only full-log
//! truncation.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use agentline_protocol::AgentFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Active,
    Removed,
}

/// One proposed action surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub id: String,
    pub name: String,
    pub args: Value,
    pub created_at: String,
    pub status: ActionStatus,
}

/// Ordered action log keyed by action id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionLog {
    records: Vec<ActionRecord>,
}

impl ActionLog {
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply one action frame. Non-action frames are no-ops.
    pub fn apply(&mut self, frame: &AgentFrame) {
        match frame {
            AgentFrame::ActionCreated {
                action_id,
                action_type,
                action_args,
                timestamp,
            } => {
                // Incomplete frames are protocol drift, not failures.
                let (Some(id), Some(name), Some(created_at)) = (
                    non_empty(action_id),
                    non_empty(action_type),
                    non_empty(timestamp),
                ) else {
                    debug!(
                        component = "actions",
                        event = "action.incomplete",
                        "action_created missing required fields"
                    );
                    return;
                };
                let args = action_args
                    .clone()
                    .filter(|v| !v.is_null())
                    .unwrap_or_else(|| Value::Object(Default::default()));
                self.records.push(ActionRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    args,
                    created_at: created_at.to_string(),
                    status: ActionStatus::Active,
                });
            }

            AgentFrame::ActionRemoved { action_id } => {
                let Some(id) = non_empty(action_id) else {
                    return;
                };
                match self.records.iter_mut().find(|r| r.id == id) {
                    Some(record) => record.status = ActionStatus::Removed,
                    None => debug!(
                        component = "actions",
                        event = "action.unknown_id",
                        action_id = id,
                    ),
                }
            }

            AgentFrame::ActionClear => {
                self.records.clear();
            }

            _ => {}
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
