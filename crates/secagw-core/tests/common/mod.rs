//! Test helpers: an in-memory provider and a ready-to-use service

#![allow(dead_code)]

use async_trait::async_trait;
use secagw_cloud::{
    ActionRef, Applied, AuthStatus, CloudError, ComputeProvider, Image, Instance,
    InstanceRequest, Network, NetworkRequest, PowerState, ProviderCredential, ProviderErrorKind,
    Region, Result, SecurityGroup, SecurityGroupRequest, Sku, Volume, VolumeRequest,
    network_diff,
};
use secagw_core::model::WorkspaceState;
use secagw_core::{
    CredentialRequest, CredentialVault, GateConfig, GatewayConfig, GatewayService, SqlStore,
    WorkspaceRequest,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN: &str = "hcloud-test-token";

/// Provider double that keeps resources in memory and logs every mutation
#[derive(Default)]
pub struct FakeProvider {
    next_id: AtomicU64,
    pub instances: Mutex<BTreeMap<String, Instance>>,
    pub volumes: Mutex<BTreeMap<String, Volume>>,
    pub networks: Mutex<BTreeMap<String, Network>>,
    pub firewalls: Mutex<BTreeMap<String, SecurityGroup>>,
    /// Mutations in call order, e.g. `create_instance:web-1`
    pub calls: Mutex<Vec<String>>,
    /// Last instance request per name
    pub instance_requests: Mutex<BTreeMap<String, InstanceRequest>>,
    /// Make the next `create_or_update_instance` fail
    pub fail_instance_create: Mutex<bool>,
    /// Instance names whose `create_or_update_instance` always fails
    pub fail_instance_names: Mutex<Vec<String>>,
    /// Tokens rejected by `check_auth`
    pub rejected_tokens: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn action(&self, command: &str) -> ActionRef {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        ActionRef::new(id.to_string(), command)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn instance(&self, name: &str) -> Option<Instance> {
        self.instances.lock().unwrap().get(name).cloned()
    }

    fn require_cred(cred: Option<&ProviderCredential>) -> Result<&ProviderCredential> {
        cred.ok_or_else(|| CloudError::NotConfigured("no credential".to_string()))
    }
}

fn not_found(what: &str, name: &str) -> CloudError {
    CloudError::provider(
        ProviderErrorKind::NotFound,
        "not_found",
        format!("{} {} not found", what, name),
    )
}

#[async_trait]
impl ComputeProvider for FakeProvider {
    fn name(&self) -> &str {
        "hetzner"
    }

    async fn check_auth(&self, cred: Option<&ProviderCredential>) -> Result<AuthStatus> {
        let cred = Self::require_cred(cred)?;
        if self.rejected_tokens.lock().unwrap().contains(&cred.token) {
            return Ok(AuthStatus::failed("invalid token"));
        }
        Ok(AuthStatus::ok("fake project"))
    }

    async fn list_regions(&self, _cred: Option<&ProviderCredential>) -> Result<Vec<Region>> {
        Ok(vec![Region {
            name: "fsn1".to_string(),
            network_zone: "eu-central".to_string(),
        }])
    }

    async fn list_skus(&self, _cred: Option<&ProviderCredential>) -> Result<Vec<Sku>> {
        Ok(Vec::new())
    }

    async fn list_images(&self, _cred: Option<&ProviderCredential>) -> Result<Vec<Image>> {
        Ok(Vec::new())
    }

    async fn list_instances(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Instance>> {
        Self::require_cred(cred)?;
        Ok(self.instances.lock().unwrap().values().cloned().collect())
    }

    async fn get_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Instance>> {
        Self::require_cred(cred)?;
        Ok(self.instance(name))
    }

    async fn create_or_update_instance(
        &self,
        cred: Option<&ProviderCredential>,
        request: &InstanceRequest,
    ) -> Result<Applied<Instance>> {
        Self::require_cred(cred)?;
        {
            let mut fail = self.fail_instance_create.lock().unwrap();
            let named = self.fail_instance_names.lock().unwrap().contains(&request.name);
            if named || std::mem::take(&mut *fail) {
                return Err(CloudError::provider(
                    ProviderErrorKind::Unavailable,
                    "resource_unavailable",
                    "no capacity",
                ));
            }
        }
        self.instance_requests
            .lock()
            .unwrap()
            .insert(request.name.clone(), request.clone());

        if let Some(existing) = self.instance(&request.name) {
            self.record(format!("update_instance:{}", request.name));
            return Ok(Applied::updated(existing, Vec::new()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let instance = Instance {
            id: id.to_string(),
            name: request.name.clone(),
            sku: request.sku.clone(),
            region: request.region.clone().unwrap_or_else(|| "fsn1".to_string()),
            power_state: PowerState::Initializing,
            networks: request.networks.clone(),
            public_ipv4: None,
            labels: request.labels.clone(),
        };
        self.instances
            .lock()
            .unwrap()
            .insert(request.name.clone(), instance.clone());
        self.record(format!("create_instance:{}", request.name));
        Ok(Applied::created(instance, vec![self.action("create_server")]))
    }

    async fn delete_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        self.record(format!("delete_instance:{}", name));
        match self.instances.lock().unwrap().remove(name) {
            Some(_) => Ok(Some(self.action("delete_server"))),
            None => Ok(None),
        }
    }

    async fn start_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        self.set_power(cred, name, PowerState::Running, "poweron")
    }

    async fn stop_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        self.set_power(cred, name, PowerState::Off, "poweroff")
    }

    async fn restart_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        self.set_power(cred, name, PowerState::Running, "reboot")
    }

    async fn list_volumes(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Volume>> {
        Self::require_cred(cred)?;
        Ok(self.volumes.lock().unwrap().values().cloned().collect())
    }

    async fn get_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Volume>> {
        Self::require_cred(cred)?;
        Ok(self.volumes.lock().unwrap().get(name).cloned())
    }

    async fn create_or_update_volume(
        &self,
        cred: Option<&ProviderCredential>,
        request: &VolumeRequest,
    ) -> Result<Applied<Volume>> {
        Self::require_cred(cred)?;
        let mut volumes = self.volumes.lock().unwrap();
        if let Some(existing) = volumes.get_mut(&request.name) {
            existing.size_gb = existing.size_gb.max(request.size_gb);
            self.record(format!("update_volume:{}", request.name));
            return Ok(Applied::updated(existing.clone(), Vec::new()));
        }

        let volume = Volume {
            id: (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string(),
            name: request.name.clone(),
            size_gb: request.size_gb,
            region: request.region.clone().unwrap_or_else(|| "fsn1".to_string()),
            attached_to: request.attach_to.clone(),
            labels: request.labels.clone(),
        };
        volumes.insert(request.name.clone(), volume.clone());
        self.record(format!("create_volume:{}", request.name));
        Ok(Applied::created(volume, vec![self.action("create_volume")]))
    }

    async fn delete_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        self.record(format!("delete_volume:{}", name));
        Ok(self.volumes.lock().unwrap().remove(name).map(|_| self.action("delete_volume")))
    }

    async fn attach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
        instance: &str,
    ) -> Result<ActionRef> {
        Self::require_cred(cred)?;
        let mut volumes = self.volumes.lock().unwrap();
        let entry = volumes.get_mut(volume).ok_or_else(|| not_found("volume", volume))?;
        entry.attached_to = Some(instance.to_string());
        self.record(format!("attach_volume:{}:{}", volume, instance));
        Ok(self.action("attach_volume"))
    }

    async fn detach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        let mut volumes = self.volumes.lock().unwrap();
        let entry = volumes.get_mut(volume).ok_or_else(|| not_found("volume", volume))?;
        if entry.attached_to.take().is_none() {
            return Ok(None);
        }
        self.record(format!("detach_volume:{}", volume));
        Ok(Some(self.action("detach_volume")))
    }

    async fn list_networks(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Network>> {
        Self::require_cred(cred)?;
        Ok(self.networks.lock().unwrap().values().cloned().collect())
    }

    async fn get_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Network>> {
        Self::require_cred(cred)?;
        Ok(self.networks.lock().unwrap().get(name).cloned())
    }

    async fn create_or_update_network(
        &self,
        cred: Option<&ProviderCredential>,
        request: &NetworkRequest,
    ) -> Result<Applied<Network>> {
        Self::require_cred(cred)?;
        let mut networks = self.networks.lock().unwrap();
        if let Some(existing) = networks.get(&request.name) {
            return Ok(Applied::updated(existing.clone(), Vec::new()));
        }
        let network = Network {
            id: (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string(),
            name: request.name.clone(),
            ip_range: request.ip_range.clone(),
            labels: request.labels.clone(),
        };
        networks.insert(request.name.clone(), network.clone());
        self.record(format!("create_network:{}", request.name));
        Ok(Applied::created(network, Vec::new()))
    }

    async fn delete_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        self.record(format!("delete_network:{}", name));
        self.networks.lock().unwrap().remove(name);
        Ok(None)
    }

    async fn attach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef> {
        Self::require_cred(cred)?;
        let mut instances = self.instances.lock().unwrap();
        let entry = instances
            .get_mut(instance)
            .ok_or_else(|| not_found("instance", instance))?;
        entry.networks.push(network.to_string());
        self.record(format!("attach_network:{}:{}", instance, network));
        Ok(self.action("attach_to_network"))
    }

    async fn detach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef> {
        Self::require_cred(cred)?;
        let mut instances = self.instances.lock().unwrap();
        let entry = instances
            .get_mut(instance)
            .ok_or_else(|| not_found("instance", instance))?;
        entry.networks.retain(|n| n != network);
        self.record(format!("detach_network:{}:{}", instance, network));
        Ok(self.action("detach_from_network"))
    }

    async fn sync_instance_networks(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        desired: &[String],
    ) -> Result<Vec<ActionRef>> {
        let current = self
            .instance(instance)
            .ok_or_else(|| not_found("instance", instance))?
            .networks;
        let (attach, detach) = network_diff(&current, desired);

        let mut actions = Vec::new();
        for network in &attach {
            actions.push(self.attach_instance_network(cred, instance, network).await?);
        }
        for network in &detach {
            actions.push(self.detach_instance_network(cred, instance, network).await?);
        }
        Ok(actions)
    }

    async fn list_security_groups(
        &self,
        cred: Option<&ProviderCredential>,
    ) -> Result<Vec<SecurityGroup>> {
        Self::require_cred(cred)?;
        Ok(self.firewalls.lock().unwrap().values().cloned().collect())
    }

    async fn get_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<SecurityGroup>> {
        Self::require_cred(cred)?;
        Ok(self.firewalls.lock().unwrap().get(name).cloned())
    }

    async fn create_or_update_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        request: &SecurityGroupRequest,
    ) -> Result<Applied<SecurityGroup>> {
        Self::require_cred(cred)?;
        let mut firewalls = self.firewalls.lock().unwrap();
        let created = !firewalls.contains_key(&request.name);
        let id = match firewalls.get(&request.name) {
            Some(existing) => existing.id.clone(),
            None => (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string(),
        };
        let group = SecurityGroup {
            id,
            name: request.name.clone(),
            rules: request.rules.clone(),
            labels: request.labels.clone(),
        };
        firewalls.insert(request.name.clone(), group.clone());
        self.record(format!("apply_firewall:{}", request.name));
        let actions = vec![self.action("set_firewall_rules")];
        Ok(if created {
            Applied::created(group, actions)
        } else {
            Applied::updated(group, actions)
        })
    }

    async fn delete_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        self.record(format!("delete_firewall:{}", name));
        self.firewalls.lock().unwrap().remove(name);
        Ok(None)
    }
}

impl FakeProvider {
    fn set_power(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
        state: PowerState,
        command: &str,
    ) -> Result<Option<ActionRef>> {
        Self::require_cred(cred)?;
        let mut instances = self.instances.lock().unwrap();
        let entry = instances
            .get_mut(name)
            .ok_or_else(|| not_found("instance", name))?;
        entry.power_state = state;
        self.record(format!("{}:{}", command, name));
        Ok(Some(self.action(command)))
    }
}

pub struct Harness {
    pub service: GatewayService,
    pub store: Arc<SqlStore>,
    pub provider: Arc<FakeProvider>,
}

pub fn vault() -> CredentialVault {
    CredentialVault::from_bytes(&[7u8; 32]).unwrap()
}

pub fn fast_gate() -> GateConfig {
    GateConfig {
        poll_interval: Duration::from_millis(20),
        timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

pub async fn harness_with(gateway: GatewayConfig) -> Harness {
    let store = Arc::new(SqlStore::in_memory().await.unwrap());
    let provider = FakeProvider::new();
    let service = GatewayService::new(
        store.clone(),
        provider.clone(),
        vault(),
        fast_gate(),
        gateway,
    );
    Harness {
        service,
        store,
        provider,
    }
}

/// Service with workspace `t1/ws1` (region fsn1) active and a credential bound
pub async fn active_harness() -> Harness {
    let h = harness_with(GatewayConfig::default()).await;
    h.service
        .put_workspace(
            "t1",
            "ws1",
            WorkspaceRequest {
                region: "fsn1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ws = h
        .service
        .bind_credential(
            "t1",
            "ws1",
            CredentialRequest {
                token: TOKEN.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ws.status.state, WorkspaceState::Active);
    h
}
