use serde::Serialize;

use crate::db_types::{Order, User};

/// The outcome of applying a gateway confirmation (synchronous verify call or webhook event).
///
/// `AlreadyProcessed` is not an error: at-least-once webhook delivery means the same confirmation can arrive any
/// number of times, and every delivery after the first must be absorbed silently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum GatewayConfirmation {
    /// The confirmation was applied. For product intents the (possibly newly created) order is returned; for
    /// membership intents the updated user record.
    Applied {
        #[serde(skip_serializing_if = "Option::is_none")]
        order: Option<Order>,
        #[serde(skip_serializing_if = "Option::is_none")]
        membership: Option<User>,
    },
    /// A confirmation for this intent was applied earlier. No side effects were repeated.
    AlreadyProcessed,
}

impl GatewayConfirmation {
    pub fn was_applied(&self) -> bool {
        matches!(self, GatewayConfirmation::Applied { .. })
    }
}
