//! Instance and block-storage handlers

use super::{
    GatewayService, applied_status, decode_view, decode_views, payload_view, referenced_name,
    resolve_region,
};
use crate::error::{GatewayError, Result};
use crate::gate::ProviderCall;
use crate::model::{
    BlockStoragePayload, BlockStorageSpec, InstancePayload, InstanceSpec, ResourceBinding,
    ResourceKind, ResourceRef, ResourceRequest, ResourceView,
};
use secagw_cloud::{ActionRef, Architecture, InstanceRequest, VolumeRequest};

/// Instance power operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerAction::Start => write!(f, "start"),
            PowerAction::Stop => write!(f, "stop"),
            PowerAction::Restart => write!(f, "restart"),
        }
    }
}

fn instance_request(name: &str, payload: &InstancePayload) -> Result<InstanceRequest> {
    let spec = &payload.spec;
    let sku = referenced_name(&spec.sku_ref, "skus", "skuRef")?;
    let image = referenced_name(&spec.image_ref, "images", "imageRef")?;
    let architecture = match spec.architecture.as_deref() {
        None => Architecture::default(),
        Some(value) => Architecture::parse(value).ok_or_else(|| {
            GatewayError::invalid(format!("unsupported architecture '{}'", value))
        })?,
    };
    let networks = spec
        .network_refs
        .iter()
        .map(|r| referenced_name(r, "networks", "networkRefs").map(str::to_string))
        .collect::<Result<Vec<_>>>()?;

    Ok(InstanceRequest {
        name: name.to_string(),
        sku: sku.to_string(),
        image: image.to_string(),
        architecture,
        region: Some(payload.region.clone()),
        user_data: spec.user_data.clone(),
        networks,
        labels: payload.labels.clone().unwrap_or_default(),
    })
}

impl GatewayService {
    // ============ Instances ============

    pub async fn put_instance(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<InstanceSpec>,
    ) -> Result<ResourceView<InstanceSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Instance, name);
        reference.validate()?;
        let call = self.admit(tenant, workspace).await?;

        let payload = InstancePayload {
            name: name.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
        };
        let desired = instance_request(name, &payload)?;
        self.require_networks(&call, &desired.networks).await?;

        let applied = self
            .provider
            .create_or_update_instance(call.cred(), &desired)
            .await?;
        tracing::info!(
            "Instance {} {} ({}, {} action(s))",
            name,
            if applied.created { "created" } else { "updated" },
            applied.resource.id,
            applied.actions.len()
        );

        let mut binding =
            ResourceBinding::new(tenant, workspace, reference.kind, reference.seca_ref())
                .with_payload(&payload)?;
        binding.provider_ref = Some(applied.resource.id.clone());
        binding.status = applied_status(applied.created, &applied.actions);
        let stored = self.persist(&binding, &applied.actions).await?;

        Ok(payload_view(&stored, payload).with_power_state(applied.resource.power_state))
    }

    /// Stored instance plus its live power state
    pub async fn get_instance(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<InstanceSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Instance, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;
        let view = decode_view(&binding)?;

        match self.provider.get_instance(call.cred(), name).await? {
            Some(instance) => Ok(view.with_power_state(instance.power_state)),
            None => {
                tracing::warn!("Instance {} is bound but missing at the provider", name);
                Ok(view)
            }
        }
    }

    pub async fn list_instances(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<InstanceSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        let bindings = self.list(&call, ResourceKind::Instance).await?;
        decode_views(&bindings)
    }

    pub async fn delete_instance(&self, tenant: &str, workspace: &str, name: &str) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Instance, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        let actions: Vec<ActionRef> = self
            .provider
            .delete_instance(call.cred(), name)
            .await?
            .into_iter()
            .collect();
        self.remove(&binding.seca_ref, &actions).await?;
        tracing::info!("Deleted instance {} in {}/{}", name, tenant, workspace);
        Ok(())
    }

    pub async fn start_instance(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<InstanceSpec>> {
        self.power(tenant, workspace, name, PowerAction::Start).await
    }

    pub async fn stop_instance(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<InstanceSpec>> {
        self.power(tenant, workspace, name, PowerAction::Stop).await
    }

    pub async fn restart_instance(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<InstanceSpec>> {
        self.power(tenant, workspace, name, PowerAction::Restart).await
    }

    async fn power(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        action: PowerAction,
    ) -> Result<ResourceView<InstanceSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Instance, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        let started = match action {
            PowerAction::Start => self.provider.start_instance(call.cred(), name).await?,
            PowerAction::Stop => self.provider.stop_instance(call.cred(), name).await?,
            PowerAction::Restart => self.provider.restart_instance(call.cred(), name).await?,
        };
        match &started {
            Some(a) => tracing::info!("Instance {} {} accepted (action {})", name, action, a.id),
            None => tracing::info!("Instance {} {} accepted without a new action", name, action),
        }
        let actions: Vec<ActionRef> = started.into_iter().collect();
        crate::store::record_actions(&*self.store, &binding.seca_ref, &actions).await?;

        decode_view(&binding)
    }

    /// Every referenced network must be bound in the workspace
    async fn require_networks(&self, call: &ProviderCall, networks: &[String]) -> Result<()> {
        let ws = &call.workspace;
        for network in networks {
            let reference = ResourceRef::new(&ws.tenant, &ws.name, ResourceKind::Network, network);
            if self.find(&reference).await?.is_none() {
                return Err(GatewayError::invalid(format!(
                    "network '{}' does not exist in workspace {}/{}",
                    network, ws.tenant, ws.name
                )));
            }
        }
        Ok(())
    }

    // ============ Block storage ============

    /// Create or resize a volume and converge its attachment to `spec.attachedTo`
    pub async fn put_block_storage(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<BlockStorageSpec>,
    ) -> Result<ResourceView<BlockStorageSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::BlockStorage, name);
        reference.validate()?;
        if request.spec.size_gb == 0 {
            return Err(GatewayError::invalid("sizeGB must be greater than zero"));
        }
        let call = self.admit(tenant, workspace).await?;

        let target = match request.spec.attached_to.as_deref() {
            Some(r) => {
                let instance = referenced_name(r, "instances", "attachedTo")?.to_string();
                let instance_ref =
                    ResourceRef::new(tenant, workspace, ResourceKind::Instance, &instance);
                if self.find(&instance_ref).await?.is_none() {
                    return Err(GatewayError::invalid(format!(
                        "attachedTo references unknown instance '{}'",
                        instance
                    )));
                }
                Some(instance)
            }
            None => None,
        };

        let payload = BlockStoragePayload {
            name: name.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
        };
        let desired = VolumeRequest {
            name: name.to_string(),
            size_gb: payload.spec.size_gb,
            region: Some(payload.region.clone()),
            attach_to: target.clone(),
            labels: payload.labels.clone().unwrap_or_default(),
        };

        let applied = self
            .provider
            .create_or_update_volume(call.cred(), &desired)
            .await?;
        let volume = &applied.resource;
        let mut actions = applied.actions.clone();

        if volume.attached_to != target {
            if let Some(current) = &volume.attached_to {
                tracing::info!("Detaching volume {} from {}", name, current);
                actions.extend(self.provider.detach_volume(call.cred(), name).await?);
            }
            if let Some(instance) = &target {
                tracing::info!("Attaching volume {} to {}", name, instance);
                actions.push(
                    self.provider
                        .attach_volume(call.cred(), name, instance)
                        .await?,
                );
            }
        }

        let mut binding =
            ResourceBinding::new(tenant, workspace, reference.kind, reference.seca_ref())
                .with_payload(&payload)?;
        binding.provider_ref = Some(volume.id.clone());
        binding.status = applied_status(applied.created, &actions);
        let stored = self.persist(&binding, &actions).await?;

        Ok(payload_view(&stored, payload))
    }

    pub async fn get_block_storage(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<BlockStorageSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::BlockStorage, name);
        self.admit(tenant, workspace).await?;
        decode_view(&self.load(&reference).await?)
    }

    pub async fn list_block_storages(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<BlockStorageSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        let bindings = self.list(&call, ResourceKind::BlockStorage).await?;
        decode_views(&bindings)
    }

    /// Detach if needed, then delete the volume
    pub async fn delete_block_storage(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::BlockStorage, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        let mut actions = Vec::new();
        let attached = self
            .provider
            .get_volume(call.cred(), name)
            .await?
            .is_some_and(|v| v.attached_to.is_some());
        if attached {
            actions.extend(self.provider.detach_volume(call.cred(), name).await?);
        }
        actions.extend(self.provider.delete_volume(call.cred(), name).await?);

        self.remove(&binding.seca_ref, &actions).await?;
        tracing::info!("Deleted block storage {} in {}/{}", name, tenant, workspace);
        Ok(())
    }
}
