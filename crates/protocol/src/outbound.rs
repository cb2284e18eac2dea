//! Client → Server messages

use serde::{Deserialize, Serialize};

/// The only outbound message shape: plain user text wrapped in the
/// `{"message": <string>}` envelope the agent endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserText {
    pub message: String,
}
