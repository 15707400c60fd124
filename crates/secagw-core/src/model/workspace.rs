//! Workspaces and their provider credentials

use chrono::{DateTime, Utc};
use secagw_cloud::Labels;
use serde::{Deserialize, Serialize};

/// Workspace activation state
///
/// Unknown stored values are kept verbatim so the gate can refuse them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkspaceState {
    Creating,
    Active,
    Other(String),
}

impl WorkspaceState {
    pub fn as_str(&self) -> &str {
        match self {
            WorkspaceState::Creating => "creating",
            WorkspaceState::Active => "active",
            WorkspaceState::Other(s) => s,
        }
    }
}

impl From<String> for WorkspaceState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "creating" => WorkspaceState::Creating,
            "active" => WorkspaceState::Active,
            _ => WorkspaceState::Other(value),
        }
    }
}

impl From<WorkspaceState> for String {
    fn from(state: WorkspaceState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    pub state: WorkspaceState,
}

impl Default for WorkspaceStatus {
    fn default() -> Self {
        Self {
            state: WorkspaceState::Creating,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Workspace record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub tenant: String,
    pub name: String,

    /// Default region for resources created in the workspace
    pub region: String,

    #[serde(default)]
    pub labels: Labels,

    #[serde(default)]
    pub spec: WorkspaceSpec,

    #[serde(default)]
    pub status: WorkspaceStatus,

    /// 0 for a record not yet stored
    pub resource_version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn new(tenant: &str, name: &str, region: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant: tenant.to_string(),
            name: name.to_string(),
            region: region.to_string(),
            labels: Labels::new(),
            spec: WorkspaceSpec::default(),
            status: WorkspaceStatus::default(),
            resource_version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.status.state
    }

    pub fn is_active(&self) -> bool {
        self.status.state == WorkspaceState::Active
    }
}

/// Provider credential bound to a workspace
///
/// `token` holds the vault ciphertext, never plaintext (legacy rows aside).
#[derive(Clone, PartialEq)]
pub struct WorkspaceCredential {
    pub tenant: String,
    pub workspace: String,
    pub provider: String,
    pub project: Option<String>,
    pub endpoint: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl WorkspaceCredential {
    pub fn new(tenant: &str, workspace: &str, provider: &str, token: String) -> Self {
        let now = Utc::now();
        Self {
            tenant: tenant.to_string(),
            workspace: workspace.to_string(),
            provider: provider.to_string(),
            project: None,
            endpoint: None,
            token,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

impl std::fmt::Debug for WorkspaceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceCredential")
            .field("tenant", &self.tenant)
            .field("workspace", &self.workspace)
            .field("provider", &self.provider)
            .field("project", &self.project)
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}
