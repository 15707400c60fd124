//! Resource handlers
//!
//! [`GatewayService`] is what the HTTP layer calls with path parameters
//! already extracted. Workspace-scoped operations pass through the
//! [`ActivationGate`] first; provider mutations that hand back an action are
//! appended to the operation log.

mod compute;
mod network;
mod routing;
mod workspace;

pub use workspace::{CredentialRequest, WorkspaceRequest};

use crate::error::{GatewayError, Result};
use crate::gate::{ActivationGate, GateConfig, ProviderCall};
use crate::model::{
    BindingStatus, ResourceBinding, ResourceKind, ResourcePayload, ResourceRef, ResourceView,
    Workspace,
};
use crate::reconciler::{GatewayConfig, Reconciler};
use crate::store::{Store, record_actions};
use crate::vault::CredentialVault;
use secagw_cloud::{ActionRef, ComputeProvider, Image, Labels, Region, Sku};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub struct GatewayService {
    store: Arc<dyn Store>,
    provider: Arc<dyn ComputeProvider>,
    vault: CredentialVault,
    gate: ActivationGate,
    reconciler: Reconciler,
}

impl GatewayService {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn ComputeProvider>,
        vault: CredentialVault,
        gate_config: GateConfig,
        gateway_config: GatewayConfig,
    ) -> Self {
        let gate = ActivationGate::new(store.clone(), vault.clone(), gate_config);
        let reconciler = Reconciler::new(store.clone(), provider.clone(), gateway_config);
        Self {
            store,
            provider,
            vault,
            gate,
            reconciler,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Liveness of the backing store
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    // ============ Catalog ============

    pub async fn list_regions(&self) -> Result<Vec<Region>> {
        Ok(self.provider.list_regions(None).await?)
    }

    pub async fn list_skus(&self) -> Result<Vec<Sku>> {
        Ok(self.provider.list_skus(None).await?)
    }

    pub async fn list_images(&self) -> Result<Vec<Image>> {
        Ok(self.provider.list_images(None).await?)
    }

    // ============ Shared helpers ============

    async fn admit(&self, tenant: &str, workspace: &str) -> Result<ProviderCall> {
        self.gate.admit(tenant, workspace).await
    }

    async fn load(&self, reference: &ResourceRef) -> Result<ResourceBinding> {
        reference.validate()?;
        self.store
            .get_binding(&reference.seca_ref())
            .await?
            .ok_or_else(|| GatewayError::not_found(reference))
    }

    async fn find(&self, reference: &ResourceRef) -> Result<Option<ResourceBinding>> {
        self.store.get_binding(&reference.seca_ref()).await
    }

    async fn list(&self, call: &ProviderCall, kind: ResourceKind) -> Result<Vec<ResourceBinding>> {
        let ws = &call.workspace;
        self.store.list_bindings(&ws.tenant, &ws.name, kind).await
    }

    /// Store `binding` after logging `actions` against it
    async fn persist(
        &self,
        binding: &ResourceBinding,
        actions: &[ActionRef],
    ) -> Result<ResourceBinding> {
        record_actions(&*self.store, &binding.seca_ref, actions).await?;
        self.store.upsert_binding(binding).await
    }

    async fn remove(&self, seca_ref: &str, actions: &[ActionRef]) -> Result<()> {
        record_actions(&*self.store, seca_ref, actions).await?;
        self.store.delete_binding(seca_ref).await
    }

    /// Payload-only resource: no provider call, the binding is the resource
    async fn put_record<S>(
        &self,
        call: &ProviderCall,
        reference: &ResourceRef,
        region: Option<String>,
        labels: Option<Labels>,
        spec: S,
    ) -> Result<ResourceView<S>>
    where
        S: Serialize + DeserializeOwned,
    {
        reference.validate()?;
        let payload = ResourcePayload {
            name: reference.name.clone(),
            region: resolve_region(region, &call.workspace),
            labels,
            spec,
        };
        let binding = ResourceBinding::new(
            &reference.tenant,
            &reference.workspace,
            reference.kind,
            reference.seca_ref(),
        )
        .with_payload(&payload)?;

        let stored = self.persist(&binding, &[]).await?;
        tracing::info!("Stored {} in {}/{}", reference, reference.tenant, reference.workspace);
        Ok(payload_view(&stored, payload))
    }
}

/// Region of a request, else the workspace default
fn resolve_region(region: Option<String>, workspace: &Workspace) -> String {
    region
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| workspace.region.clone())
}

/// Binding status after a provider create-or-update
fn applied_status(created: bool, actions: &[ActionRef]) -> BindingStatus {
    match (created, actions.is_empty()) {
        (_, true) => BindingStatus::Active,
        (true, false) => BindingStatus::Creating,
        (false, false) => BindingStatus::Updating,
    }
}

fn payload_view<S>(binding: &ResourceBinding, payload: ResourcePayload<S>) -> ResourceView<S> {
    ResourceView::new(
        binding,
        &payload.name,
        &payload.region,
        payload.labels,
        payload.spec,
    )
}

fn decode_view<S: DeserializeOwned>(binding: &ResourceBinding) -> Result<ResourceView<S>> {
    let payload: ResourcePayload<S> = binding.decode_payload()?;
    Ok(payload_view(binding, payload))
}

fn decode_views<S: DeserializeOwned>(bindings: &[ResourceBinding]) -> Result<Vec<ResourceView<S>>> {
    bindings.iter().map(decode_view::<S>).collect()
}

/// Name from a typed relative reference, or `InvalidRequest`
fn referenced_name<'a>(reference: &'a str, collection: &str, field: &str) -> Result<&'a str> {
    crate::model::name_in_collection(reference, collection).ok_or_else(|| {
        GatewayError::invalid(format!(
            "{} '{}' is not a {} reference",
            field, reference, collection
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_status() {
        let action = ActionRef::new("1", "create_server");
        assert_eq!(applied_status(true, &[]), BindingStatus::Active);
        assert_eq!(
            applied_status(true, std::slice::from_ref(&action)),
            BindingStatus::Creating
        );
        assert_eq!(applied_status(false, &[action]), BindingStatus::Updating);
    }

    #[test]
    fn test_resolve_region() {
        let ws = Workspace::new("t1", "ws1", "fsn1");
        assert_eq!(resolve_region(None, &ws), "fsn1");
        assert_eq!(resolve_region(Some(String::new()), &ws), "fsn1");
        assert_eq!(resolve_region(Some("nbg1".into()), &ws), "nbg1");
    }

    #[test]
    fn test_referenced_name() {
        assert_eq!(referenced_name("skus/cx22", "skus", "skuRef").unwrap(), "cx22");
        assert_eq!(referenced_name("cx22", "skus", "skuRef").unwrap(), "cx22");
        let err = referenced_name("images/ubuntu", "skus", "skuRef").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
}
