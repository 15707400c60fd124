//! Workspace and credential handlers

use super::GatewayService;
use crate::error::{GatewayError, Result};
use crate::model::{Workspace, WorkspaceCredential, WorkspaceSpec, WorkspaceState};
use secagw_cloud::{Labels, ProviderCredential, ProviderErrorKind};
use serde::Deserialize;

/// Optimistic retries for a state transition racing another writer
const TRANSITION_ATTEMPTS: u32 = 3;

/// Body of a workspace PUT
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceRequest {
    pub region: String,

    #[serde(default)]
    pub labels: Option<Labels>,

    #[serde(default)]
    pub spec: Option<WorkspaceSpec>,
}

/// Body of a credential bind
#[derive(Clone, Default, Deserialize)]
pub struct CredentialRequest {
    pub token: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub project: Option<String>,
}

impl std::fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("project", &self.project)
            .finish()
    }
}

impl GatewayService {
    /// Create or update a workspace
    ///
    /// A new workspace starts in `creating`; an update keeps its state.
    pub async fn put_workspace(
        &self,
        tenant: &str,
        name: &str,
        request: WorkspaceRequest,
    ) -> Result<Workspace> {
        validate_segment("tenant", tenant)?;
        validate_segment("workspace", name)?;
        if request.region.is_empty() {
            return Err(GatewayError::invalid("region must not be empty"));
        }

        let mut workspace = match self.store.get_workspace(tenant, name).await? {
            Some(existing) => existing,
            None => Workspace::new(tenant, name, &request.region),
        };
        workspace.region = request.region;
        if let Some(labels) = request.labels {
            workspace.labels = labels;
        }
        if let Some(spec) = request.spec {
            workspace.spec = spec;
        }

        let created = workspace.resource_version == 0;
        let saved = self.store.save_workspace(&workspace).await?;
        if created {
            tracing::info!("Created workspace {}/{}", tenant, name);
        } else {
            tracing::debug!("Updated workspace {}/{} (v{})", tenant, name, saved.resource_version);
        }
        Ok(saved)
    }

    pub async fn get_workspace(&self, tenant: &str, name: &str) -> Result<Workspace> {
        self.store
            .get_workspace(tenant, name)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("workspace {}/{}", tenant, name)))
    }

    pub async fn list_workspaces(&self, tenant: &str) -> Result<Vec<Workspace>> {
        self.store.list_workspaces(tenant).await
    }

    /// Soft-delete a workspace together with its credential
    pub async fn delete_workspace(&self, tenant: &str, name: &str) -> Result<()> {
        if !self.store.soft_delete_workspace(tenant, name).await? {
            return Err(GatewayError::not_found(format!(
                "workspace {}/{}",
                tenant, name
            )));
        }
        let provider = &self.gate.config().provider;
        self.store
            .soft_delete_credential(tenant, name, provider)
            .await?;
        tracing::info!("Deleted workspace {}/{}", tenant, name);
        Ok(())
    }

    /// Validate, encrypt and store a provider credential, then activate
    pub async fn bind_credential(
        &self,
        tenant: &str,
        name: &str,
        request: CredentialRequest,
    ) -> Result<Workspace> {
        self.get_workspace(tenant, name).await?;
        if request.token.is_empty() {
            return Err(GatewayError::invalid("token must not be empty"));
        }

        let mut credential = ProviderCredential::new(request.token.clone());
        credential.endpoint = request.endpoint.clone();
        credential.project = request.project.clone();

        let status = self.provider.check_auth(Some(&credential)).await?;
        if !status.authenticated {
            return Err(GatewayError::Provider {
                kind: ProviderErrorKind::Unauthorized,
                code: "unauthorized".to_string(),
                message: status
                    .error
                    .unwrap_or_else(|| "credential rejected by provider".to_string()),
            });
        }

        let provider = &self.gate.config().provider;
        let mut stored = WorkspaceCredential::new(
            tenant,
            name,
            provider,
            self.vault.encrypt(&request.token)?,
        );
        stored.endpoint = request.endpoint;
        stored.project = request.project;
        self.store.upsert_credential(&stored).await?;
        tracing::info!("Bound {} credential to workspace {}/{}", provider, tenant, name);

        self.transition(tenant, name, WorkspaceState::Active).await
    }

    /// Remove the credential and regress the workspace to `creating`
    pub async fn unbind_credential(&self, tenant: &str, name: &str) -> Result<Workspace> {
        let provider = &self.gate.config().provider;
        if !self
            .store
            .soft_delete_credential(tenant, name, provider)
            .await?
        {
            return Err(GatewayError::not_found(format!(
                "credential for workspace {}/{}",
                tenant, name
            )));
        }
        tracing::info!("Unbound {} credential from workspace {}/{}", provider, tenant, name);

        self.transition(tenant, name, WorkspaceState::Creating).await
    }

    async fn transition(&self, tenant: &str, name: &str, state: WorkspaceState) -> Result<Workspace> {
        let mut attempt = 1;
        loop {
            let mut workspace = self.get_workspace(tenant, name).await?;
            if workspace.status.state == state {
                return Ok(workspace);
            }

            let from = workspace.status.state.clone();
            workspace.status.state = state.clone();
            match self.store.save_workspace(&workspace).await {
                Ok(saved) => {
                    tracing::info!("Workspace {}/{}: {} -> {}", tenant, name, from, state);
                    return Ok(saved);
                }
                Err(GatewayError::Conflict(reason)) if attempt < TRANSITION_ATTEMPTS => {
                    tracing::debug!(
                        "Workspace {}/{} changed concurrently ({}), retrying",
                        tenant,
                        name,
                        reason
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(GatewayError::invalid(format!(
            "{} '{}' must be a non-empty path segment",
            what, value
        )));
    }
    if value.chars().any(char::is_uppercase) {
        return Err(GatewayError::invalid(format!(
            "{} '{}' must be lower case",
            what, value
        )));
    }
    Ok(())
}
