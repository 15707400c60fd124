//! Provider operation audit log entries

use chrono::{DateTime, Utc};
use secagw_cloud::ActionRef;
use serde::{Deserialize, Serialize};

/// Phase of an audited operation
///
/// Only `Accepted` is written: actions are never polled to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationPhase {
    Accepted,
}

impl OperationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationPhase::Accepted => "accepted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        (value == "accepted").then_some(OperationPhase::Accepted)
    }
}

/// Append-only audit record of one provider mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: String,
    pub seca_ref: String,
    /// Provider action identifier
    pub action_id: Option<String>,
    pub command: Option<String>,
    pub phase: OperationPhase,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    /// Record for an action the provider accepted
    pub fn accepted(seca_ref: &str, action: &ActionRef) -> Self {
        let now = Utc::now();
        Self {
            id: new_operation_id(now),
            seca_ref: seca_ref.to_string(),
            action_id: Some(action.id.clone()),
            command: Some(action.command.clone()),
            phase: OperationPhase::Accepted,
            error: None,
            created_at: now,
        }
    }
}

/// `op-<unix millis>-<random suffix>`
fn new_operation_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("op-{}-{}", now.timestamp_millis(), &suffix[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_ids_are_unique() {
        let action = ActionRef::new("17", "create_server");
        let a = OperationRecord::accepted("tenants/t1/workspaces/ws1/instances/a", &action);
        let b = OperationRecord::accepted("tenants/t1/workspaces/ws1/instances/a", &action);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("op-"));
        assert_eq!(a.phase, OperationPhase::Accepted);
        assert_eq!(a.action_id.as_deref(), Some("17"));
    }
}
