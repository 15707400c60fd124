//! Persistence contracts
//!
//! The core touches the relational store only through these traits.
//! [`SqlStore`] implements all of them over SQLite.

mod sql;

pub use sql::SqlStore;

use crate::error::Result;
use crate::model::{OperationRecord, ResourceBinding, ResourceKind, Workspace, WorkspaceCredential};
use async_trait::async_trait;
use secagw_cloud::ActionRef;

/// Resource binding persistence
///
/// Last writer wins; there is no optimistic check on bindings.
#[async_trait]
pub trait BindingRepository: Send + Sync {
    /// Insert or replace by `seca_ref`
    ///
    /// Returns the stored row: `created_at` of an existing row is kept and
    /// `resource_version` is incremented by one.
    async fn upsert_binding(&self, binding: &ResourceBinding) -> Result<ResourceBinding>;

    async fn get_binding(&self, seca_ref: &str) -> Result<Option<ResourceBinding>>;

    async fn list_bindings(
        &self,
        tenant: &str,
        workspace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceBinding>>;

    /// No-op when absent
    async fn delete_binding(&self, seca_ref: &str) -> Result<()>;
}

/// Workspace persistence with optimistic versioning
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Non-deleted workspace by (tenant, name)
    async fn get_workspace(&self, tenant: &str, name: &str) -> Result<Option<Workspace>>;

    async fn list_workspaces(&self, tenant: &str) -> Result<Vec<Workspace>>;

    /// Insert when `resource_version == 0`, otherwise update guarded by the
    /// version; a lost race is a `Conflict`.
    async fn save_workspace(&self, workspace: &Workspace) -> Result<Workspace>;

    /// Returns `false` when there was nothing to delete
    async fn soft_delete_workspace(&self, tenant: &str, name: &str) -> Result<bool>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Create or overwrite the live credential for (tenant, workspace, provider)
    async fn upsert_credential(&self, credential: &WorkspaceCredential)
    -> Result<WorkspaceCredential>;

    async fn get_credential(
        &self,
        tenant: &str,
        workspace: &str,
        provider: &str,
    ) -> Result<Option<WorkspaceCredential>>;

    async fn soft_delete_credential(
        &self,
        tenant: &str,
        workspace: &str,
        provider: &str,
    ) -> Result<bool>;
}

/// Append-only operation audit log
#[async_trait]
pub trait OperationLog: Send + Sync {
    async fn record_operation(&self, record: &OperationRecord) -> Result<()>;

    async fn list_operations(&self, seca_ref: &str) -> Result<Vec<OperationRecord>>;
}

/// Append one `accepted` record per provider action
pub async fn record_actions<L>(log: &L, seca_ref: &str, actions: &[ActionRef]) -> Result<()>
where
    L: OperationLog + ?Sized,
{
    for action in actions {
        log.record_operation(&OperationRecord::accepted(seca_ref, action))
            .await?;
    }
    Ok(())
}

/// Everything the gateway needs from its relational store
#[async_trait]
pub trait Store: BindingRepository + WorkspaceRepository + CredentialRepository + OperationLog {
    /// Liveness check
    async fn ping(&self) -> Result<()>;
}
