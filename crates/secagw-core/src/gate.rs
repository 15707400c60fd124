//! Workspace activation gate
//!
//! Every workspace-scoped operation passes through [`ActivationGate::admit`]
//! before it may call the provider. Binding a credential activates a
//! workspace asynchronously from the caller's point of view, so the gate
//! re-reads the workspace row instead of trusting a cached flag:
//!
//! ```text
//! creating ──(credential bound)──▶ active
//!    ▲                               │
//!    └──────(credential unbound)─────┘
//! ```
//!
//! A `creating` workspace is polled for a short bounded window. Dropping the
//! returned future cancels the poll.

use crate::error::{GatewayError, Result};
use crate::model::{Workspace, WorkspaceState};
use crate::store::Store;
use crate::vault::CredentialVault;
use secagw_cloud::ProviderCredential;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,

    /// Provider whose credential is loaded
    pub provider: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(2),
            provider: "hetzner".to_string(),
        }
    }
}

/// Context for provider calls made on behalf of one request
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub workspace: Workspace,
    pub credential: ProviderCredential,
}

impl ProviderCall {
    pub fn cred(&self) -> Option<&ProviderCredential> {
        Some(&self.credential)
    }
}

pub struct ActivationGate {
    store: Arc<dyn Store>,
    vault: CredentialVault,
    config: GateConfig,
}

impl ActivationGate {
    pub fn new(store: Arc<dyn Store>, vault: CredentialVault, config: GateConfig) -> Self {
        Self {
            store,
            vault,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Wait for the workspace to be active, then resolve its credential
    pub async fn admit(&self, tenant: &str, workspace: &str) -> Result<ProviderCall> {
        let workspace = self.wait_active(tenant, workspace).await?;
        let credential = self.resolve_credential(&workspace).await?;
        Ok(ProviderCall {
            workspace,
            credential,
        })
    }

    async fn wait_active(&self, tenant: &str, name: &str) -> Result<Workspace> {
        let deadline = Instant::now() + self.config.timeout;

        loop {
            let workspace = self
                .store
                .get_workspace(tenant, name)
                .await?
                .ok_or_else(|| GatewayError::not_found(format!("workspace {}/{}", tenant, name)))?;

            if workspace.is_active() {
                return Ok(workspace);
            }

            if let WorkspaceState::Other(state) = workspace.state() {
                return Err(GatewayError::conflict(format!(
                    "workspace {}/{} is in state '{}'",
                    tenant, name, state
                )));
            }

            // creating
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("Workspace {}/{} still creating, giving up", tenant, name);
                return Err(GatewayError::conflict(format!(
                    "workspace {}/{} is not active",
                    tenant, name
                )));
            }
            tracing::debug!("Workspace {}/{} creating, polling", tenant, name);
            let wait = self.config.poll_interval.min(deadline - now);
            tokio::time::sleep(wait).await;
        }
    }

    async fn resolve_credential(&self, workspace: &Workspace) -> Result<ProviderCredential> {
        let no_credentials = || {
            GatewayError::conflict(format!(
                "workspace {}/{} has no credentials",
                workspace.tenant, workspace.name
            ))
        };

        let stored = self
            .store
            .get_credential(&workspace.tenant, &workspace.name, &self.config.provider)
            .await?
            .ok_or_else(no_credentials)?;

        let token = self.vault.decrypt(&stored.token)?;
        if token.is_empty() {
            return Err(no_credentials());
        }

        let mut credential = ProviderCredential::new(token);
        credential.endpoint = stored.endpoint;
        credential.project = stored.project;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkspaceCredential;
    use crate::store::{CredentialRepository, SqlStore, WorkspaceRepository};

    async fn setup(state: WorkspaceState) -> (Arc<SqlStore>, ActivationGate) {
        let store = Arc::new(SqlStore::in_memory().await.unwrap());
        let mut ws = Workspace::new("t1", "ws1", "fsn1");
        ws.status.state = state;
        store.save_workspace(&ws).await.unwrap();

        let vault = CredentialVault::from_bytes(&[9u8; 32]).unwrap();
        let token = vault.encrypt("hcloud-secret").unwrap();
        let mut cred = WorkspaceCredential::new("t1", "ws1", "hetzner", token);
        cred.endpoint = Some("http://127.0.0.1:1/v1".to_string());
        store.upsert_credential(&cred).await.unwrap();

        let config = GateConfig {
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let gate = ActivationGate::new(store.clone(), vault, config);
        (store, gate)
    }

    #[tokio::test]
    async fn test_active_workspace_resolves_credential() {
        let (_store, gate) = setup(WorkspaceState::Active).await;
        let call = gate.admit("t1", "ws1").await.unwrap();
        assert_eq!(call.credential.token, "hcloud-secret");
        assert_eq!(
            call.credential.endpoint.as_deref(),
            Some("http://127.0.0.1:1/v1")
        );
    }

    #[tokio::test]
    async fn test_missing_workspace_is_not_found() {
        let (_store, gate) = setup(WorkspaceState::Active).await;
        let err = gate.admit("t1", "nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_state_is_conflict() {
        let (_store, gate) = setup(WorkspaceState::Other("suspended".into())).await;
        let err = gate.admit("t1", "ws1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(m) if m.contains("suspended")));
    }

    #[tokio::test]
    async fn test_legacy_plaintext_token() {
        let (store, gate) = setup(WorkspaceState::Active).await;
        let cred = WorkspaceCredential::new("t1", "ws1", "hetzner", "legacy-token".to_string());
        store.upsert_credential(&cred).await.unwrap();

        let call = gate.admit("t1", "ws1").await.unwrap();
        assert_eq!(call.credential.token, "legacy-token");
    }
}
