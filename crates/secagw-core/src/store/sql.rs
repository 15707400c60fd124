//! SQLite store
//!
//! The schema is created idempotently on connect. Workspaces and credentials
//! are soft-deleted; their uniqueness holds among live rows only (partial
//! unique indexes).

use super::{BindingRepository, CredentialRepository, OperationLog, Store, WorkspaceRepository};
use crate::error::{GatewayError, Result};
use crate::model::{
    BindingStatus, OperationPhase, OperationRecord, ResourceBinding, ResourceKind, Workspace,
    WorkspaceCredential,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS resource_bindings (
        seca_ref TEXT PRIMARY KEY NOT NULL,
        tenant TEXT NOT NULL,
        workspace TEXT NOT NULL,
        kind TEXT NOT NULL,
        provider_ref TEXT,
        payload TEXT,
        status TEXT NOT NULL,
        resource_version INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_resource_bindings_scope
        ON resource_bindings (tenant, workspace, kind)",
    "CREATE TABLE IF NOT EXISTS workspaces (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant TEXT NOT NULL,
        name TEXT NOT NULL,
        region TEXT NOT NULL,
        labels TEXT NOT NULL,
        spec TEXT NOT NULL,
        status TEXT NOT NULL,
        resource_version INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_workspaces_live
        ON workspaces (tenant, name) WHERE deleted_at IS NULL",
    "CREATE TABLE IF NOT EXISTS workspace_credentials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tenant TEXT NOT NULL,
        workspace TEXT NOT NULL,
        provider TEXT NOT NULL,
        project TEXT,
        endpoint TEXT,
        token TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_workspace_credentials_live
        ON workspace_credentials (tenant, workspace, provider) WHERE deleted_at IS NULL",
    "CREATE TABLE IF NOT EXISTS operations (
        id TEXT PRIMARY KEY NOT NULL,
        seca_ref TEXT NOT NULL,
        action_id TEXT,
        command TEXT,
        phase TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_operations_seca_ref ON operations (seca_ref)",
];

const BINDING_COLUMNS: &str = "seca_ref, tenant, workspace, kind, provider_ref, payload, status, \
     resource_version, created_at, updated_at";

const WORKSPACE_COLUMNS: &str = "tenant, name, region, labels, spec, status, resource_version, \
     created_at, updated_at, deleted_at";

const CREDENTIAL_COLUMNS: &str = "tenant, workspace, provider, project, endpoint, token, \
     created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct BindingRow {
    seca_ref: String,
    tenant: String,
    workspace: String,
    kind: String,
    provider_ref: Option<String>,
    payload: Option<String>,
    status: String,
    resource_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BindingRow> for ResourceBinding {
    type Error = GatewayError;

    fn try_from(row: BindingRow) -> Result<Self> {
        let kind = ResourceKind::parse(&row.kind).ok_or_else(|| {
            GatewayError::Internal(format!("binding {} has unknown kind '{}'", row.seca_ref, row.kind))
        })?;
        let status = BindingStatus::parse(&row.status).ok_or_else(|| {
            GatewayError::Internal(format!(
                "binding {} has unknown status '{}'",
                row.seca_ref, row.status
            ))
        })?;
        Ok(ResourceBinding {
            tenant: row.tenant,
            workspace: row.workspace,
            kind,
            seca_ref: row.seca_ref,
            provider_ref: row.provider_ref,
            payload: row.payload,
            status,
            resource_version: row.resource_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    tenant: String,
    name: String,
    region: String,
    labels: String,
    spec: String,
    status: String,
    resource_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

fn decode_column<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| GatewayError::Internal(format!("corrupt workspace {} column: {}", column, e)))
}

fn encode_column<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| GatewayError::Internal(e.to_string()))
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = GatewayError;

    fn try_from(row: WorkspaceRow) -> Result<Self> {
        Ok(Workspace {
            labels: decode_column("labels", &row.labels)?,
            spec: decode_column("spec", &row.spec)?,
            status: decode_column("status", &row.status)?,
            tenant: row.tenant,
            name: row.name,
            region: row.region,
            resource_version: row.resource_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    tenant: String,
    workspace: String,
    provider: String,
    project: Option<String>,
    endpoint: Option<String>,
    token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for WorkspaceCredential {
    fn from(row: CredentialRow) -> Self {
        WorkspaceCredential {
            tenant: row.tenant,
            workspace: row.workspace,
            provider: row.provider,
            project: row.project,
            endpoint: row.endpoint,
            token: row.token,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: String,
    seca_ref: String,
    action_id: Option<String>,
    command: Option<String>,
    phase: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OperationRow> for OperationRecord {
    type Error = GatewayError;

    fn try_from(row: OperationRow) -> Result<Self> {
        let phase = OperationPhase::parse(&row.phase).ok_or_else(|| {
            GatewayError::Internal(format!("operation {} has unknown phase '{}'", row.id, row.phase))
        })?;
        Ok(OperationRecord {
            id: row.id,
            seca_ref: row.seca_ref,
            action_id: row.action_id,
            command: row.command,
            phase,
            error: row.error,
            created_at: row.created_at,
        })
    }
}

/// SQLite-backed implementation of every repository trait
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Connect and create the schema
    ///
    /// `url` is a sqlx SQLite URL (`sqlite://gateway.db`, `sqlite::memory:`).
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every in-memory connection is its own database; keep exactly one
        let pool = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!("Connected to store {}", url);
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BindingRepository for SqlStore {
    async fn upsert_binding(&self, binding: &ResourceBinding) -> Result<ResourceBinding> {
        let sql = format!(
            "INSERT INTO resource_bindings ({BINDING_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT(seca_ref) DO UPDATE SET
                tenant = excluded.tenant,
                workspace = excluded.workspace,
                kind = excluded.kind,
                provider_ref = excluded.provider_ref,
                payload = excluded.payload,
                status = excluded.status,
                resource_version = resource_bindings.resource_version + 1,
                updated_at = excluded.updated_at
             RETURNING {BINDING_COLUMNS}"
        );
        let now = Utc::now();
        let row: BindingRow = sqlx::query_as(&sql)
            .bind(&binding.seca_ref)
            .bind(&binding.tenant)
            .bind(&binding.workspace)
            .bind(binding.kind.as_str())
            .bind(&binding.provider_ref)
            .bind(&binding.payload)
            .bind(binding.status.as_str())
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(
            "Upserted binding {} (v{})",
            row.seca_ref,
            row.resource_version
        );
        row.try_into()
    }

    async fn get_binding(&self, seca_ref: &str) -> Result<Option<ResourceBinding>> {
        let sql = format!("SELECT {BINDING_COLUMNS} FROM resource_bindings WHERE seca_ref = ?");
        let row: Option<BindingRow> = sqlx::query_as(&sql)
            .bind(seca_ref)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ResourceBinding::try_from).transpose()
    }

    async fn list_bindings(
        &self,
        tenant: &str,
        workspace: &str,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceBinding>> {
        let sql = format!(
            "SELECT {BINDING_COLUMNS} FROM resource_bindings
             WHERE tenant = ? AND workspace = ? AND kind = ?"
        );
        let rows: Vec<BindingRow> = sqlx::query_as(&sql)
            .bind(tenant)
            .bind(workspace)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ResourceBinding::try_from).collect()
    }

    async fn delete_binding(&self, seca_ref: &str) -> Result<()> {
        sqlx::query("DELETE FROM resource_bindings WHERE seca_ref = ?")
            .bind(seca_ref)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRepository for SqlStore {
    async fn get_workspace(&self, tenant: &str, name: &str) -> Result<Option<Workspace>> {
        let sql = format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces
             WHERE tenant = ? AND name = ? AND deleted_at IS NULL"
        );
        let row: Option<WorkspaceRow> = sqlx::query_as(&sql)
            .bind(tenant)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Workspace::try_from).transpose()
    }

    async fn list_workspaces(&self, tenant: &str) -> Result<Vec<Workspace>> {
        let sql = format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces
             WHERE tenant = ? AND deleted_at IS NULL ORDER BY name"
        );
        let rows: Vec<WorkspaceRow> = sqlx::query_as(&sql)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Workspace::try_from).collect()
    }

    async fn save_workspace(&self, workspace: &Workspace) -> Result<Workspace> {
        let labels = encode_column(&workspace.labels)?;
        let spec = encode_column(&workspace.spec)?;
        let status = encode_column(&workspace.status)?;
        let now = Utc::now();

        if workspace.resource_version == 0 {
            let sql = format!(
                "INSERT INTO workspaces ({WORKSPACE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, NULL)
                 RETURNING {WORKSPACE_COLUMNS}"
            );
            let row: WorkspaceRow = sqlx::query_as(&sql)
                .bind(&workspace.tenant)
                .bind(&workspace.name)
                .bind(&workspace.region)
                .bind(&labels)
                .bind(&spec)
                .bind(&status)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
            return row.try_into();
        }

        let sql = format!(
            "UPDATE workspaces SET
                region = ?, labels = ?, spec = ?, status = ?,
                resource_version = resource_version + 1,
                updated_at = ?
             WHERE tenant = ? AND name = ? AND deleted_at IS NULL AND resource_version = ?
             RETURNING {WORKSPACE_COLUMNS}"
        );
        let row: Option<WorkspaceRow> = sqlx::query_as(&sql)
            .bind(&workspace.region)
            .bind(&labels)
            .bind(&spec)
            .bind(&status)
            .bind(now)
            .bind(&workspace.tenant)
            .bind(&workspace.name)
            .bind(workspace.resource_version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(GatewayError::conflict(format!(
                "workspace {}/{} was modified concurrently (expected version {})",
                workspace.tenant, workspace.name, workspace.resource_version
            ))),
        }
    }

    async fn soft_delete_workspace(&self, tenant: &str, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workspaces
             SET deleted_at = ?, resource_version = resource_version + 1
             WHERE tenant = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(tenant)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialRepository for SqlStore {
    async fn upsert_credential(
        &self,
        credential: &WorkspaceCredential,
    ) -> Result<WorkspaceCredential> {
        let sql = format!(
            "INSERT INTO workspace_credentials ({CREDENTIAL_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
             ON CONFLICT(tenant, workspace, provider) WHERE deleted_at IS NULL DO UPDATE SET
                project = excluded.project,
                endpoint = excluded.endpoint,
                token = excluded.token,
                updated_at = excluded.updated_at
             RETURNING {CREDENTIAL_COLUMNS}"
        );
        let now = Utc::now();
        let row: CredentialRow = sqlx::query_as(&sql)
            .bind(&credential.tenant)
            .bind(&credential.workspace)
            .bind(&credential.provider)
            .bind(&credential.project)
            .bind(&credential.endpoint)
            .bind(&credential.token)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get_credential(
        &self,
        tenant: &str,
        workspace: &str,
        provider: &str,
    ) -> Result<Option<WorkspaceCredential>> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM workspace_credentials
             WHERE tenant = ? AND workspace = ? AND provider = ? AND deleted_at IS NULL"
        );
        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(tenant)
            .bind(workspace)
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn soft_delete_credential(
        &self,
        tenant: &str,
        workspace: &str,
        provider: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workspace_credentials SET deleted_at = ?
             WHERE tenant = ? AND workspace = ? AND provider = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(tenant)
        .bind(workspace)
        .bind(provider)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OperationLog for SqlStore {
    async fn record_operation(&self, record: &OperationRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO operations (id, seca_ref, action_id, command, phase, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.seca_ref)
        .bind(&record.action_id)
        .bind(&record.command)
        .bind(record.phase.as_str())
        .bind(&record.error)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_operations(&self, seca_ref: &str) -> Result<Vec<OperationRecord>> {
        let rows: Vec<OperationRow> = sqlx::query_as(
            "SELECT id, seca_ref, action_id, command, phase, error, created_at
             FROM operations WHERE seca_ref = ? ORDER BY created_at, id",
        )
        .bind(seca_ref)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(OperationRecord::try_from).collect()
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
