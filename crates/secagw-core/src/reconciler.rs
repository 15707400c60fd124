//! Route-usage reconciler
//!
//! An internet gateway is declared on its own, but only route tables reveal
//! which networks need it. On every route-table write the reconciler:
//!
//! 1. collects the gateways referenced before and after the write
//! 2. rescans every route table in the workspace for each such gateway
//! 3. deletes the gateway's NAT instance when nothing references it, or
//!    creates/updates it and syncs its networks to exactly the referencing set
//!
//! Usage is always re-derived from the stored tables (plus the pending
//! write), so overlapping or out-of-order writes converge on the next pass.

use crate::cloud_init;
use crate::error::Result;
use crate::gate::ProviderCall;
use crate::model::{
    BindingStatus, InternetGatewayPayload, ResourceBinding, ResourceKind, ResourceRef, Route,
    RouteTablePayload, name_in_collection,
};
use crate::store::{Store, record_actions};
use secagw_cloud::{Architecture, ComputeProvider, InstanceRequest, Labels};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const IGW_INSTANCE_PREFIX: &str = "seca-igw-";

/// Provider limit on instance names
pub const MAX_INSTANCE_NAME_LEN: usize = 63;

const GATEWAY_COLLECTION: &str = "internet-gateways";

/// NAT-VM settings for internet gateways
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// When off, gateways stay pure binding records
    pub nat_enabled: bool,
    pub nat_sku: String,
    pub nat_image: String,
    pub nat_architecture: Architecture,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            nat_enabled: true,
            nat_sku: "cx22".to_string(),
            nat_image: "ubuntu-24.04".to_string(),
            nat_architecture: Architecture::X86,
        }
    }
}

/// Gateway name of a route target of the form `internet-gateways/<name>`
///
/// Lower-cased, matching the gateway's secaRef.
pub fn gateway_target(resource: &str) -> Option<String> {
    if !resource.contains('/') {
        return None;
    }
    name_in_collection(resource, GATEWAY_COLLECTION).map(str::to_lowercase)
}

/// Distinct gateway names referenced by `routes`, sorted
pub fn extract_gateway_names(routes: &[Route]) -> Vec<String> {
    routes
        .iter()
        .filter_map(|r| gateway_target(&r.target_ref.resource))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Gateways that gained or lost a reference in a write
pub fn affected_gateways(previous: &[Route], current: &[Route]) -> Vec<String> {
    let mut names: BTreeSet<String> = extract_gateway_names(previous).into_iter().collect();
    names.extend(extract_gateway_names(current));
    names.into_iter().collect()
}

/// Full current usage of one gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayUsage {
    pub networks: Vec<String>,
    pub route_tables: Vec<String>,
}

/// Gateway names compare case-insensitively
pub fn gateway_usage(tables: &[RouteTablePayload], gateway: &str) -> GatewayUsage {
    let gateway = gateway.to_lowercase();
    let mut networks = BTreeSet::new();
    let mut route_tables = BTreeSet::new();

    for table in tables {
        let routes_here = table
            .spec
            .routes
            .iter()
            .any(|r| gateway_target(&r.target_ref.resource).as_deref() == Some(gateway.as_str()));
        if routes_here {
            networks.insert(table.network.clone());
            route_tables.insert(table.name.clone());
        }
    }

    GatewayUsage {
        networks: networks.into_iter().collect(),
        route_tables: route_tables.into_iter().collect(),
    }
}

fn name_component(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Deterministic name of a gateway's backing instance
///
/// `seca-igw-<workspace>-<gateway>`, each component lower-cased and reduced
/// to ASCII alphanumerics, truncated to [`MAX_INSTANCE_NAME_LEN`].
pub fn backing_instance_name(workspace: &str, gateway: &str) -> String {
    let mut name = format!(
        "{}{}-{}",
        IGW_INSTANCE_PREFIX,
        name_component(workspace),
        name_component(gateway)
    );
    name.truncate(MAX_INSTANCE_NAME_LEN);
    name
}

/// A route-table write not yet persisted
#[derive(Debug, Clone, Copy)]
pub enum PendingTable<'a> {
    Put {
        seca_ref: &'a str,
        table: &'a RouteTablePayload,
    },
    Delete {
        seca_ref: &'a str,
    },
}

impl PendingTable<'_> {
    fn seca_ref(&self) -> &str {
        match self {
            PendingTable::Put { seca_ref, .. } | PendingTable::Delete { seca_ref } => seca_ref,
        }
    }

    fn routes(&self) -> &[Route] {
        match self {
            PendingTable::Put { table, .. } => &table.spec.routes,
            PendingTable::Delete { .. } => &[],
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    provider: Arc<dyn ComputeProvider>,
    config: GatewayConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn ComputeProvider>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Reconcile every gateway a route-table write touches
    ///
    /// `previous` is the stored table before the write. The pending write is
    /// overlaid on the stored tables; the caller persists it only after this
    /// returns `Ok`. Gateway bindings are written only once every affected
    /// gateway has converged.
    pub async fn on_route_table_write(
        &self,
        call: &ProviderCall,
        previous: Option<&RouteTablePayload>,
        pending: PendingTable<'_>,
    ) -> Result<()> {
        let previous_routes = previous.map(|t| t.spec.routes.as_slice()).unwrap_or(&[]);
        let affected = affected_gateways(previous_routes, pending.routes());
        if affected.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            "Route table {} affects gateways {:?}",
            pending.seca_ref(),
            affected
        );
        let tables = self.route_tables(call, Some(pending)).await?;
        let ws = &call.workspace;
        let mut converged = Vec::with_capacity(affected.len());
        for gateway in &affected {
            let seca_ref =
                ResourceRef::new(&ws.tenant, &ws.name, ResourceKind::InternetGateway, gateway)
                    .seca_ref();
            let Some(binding) = self.store.get_binding(&seca_ref).await? else {
                tracing::warn!("Route target {} has no gateway binding, skipping", seca_ref);
                continue;
            };
            converged.push(self.converge(call, gateway, binding, &tables).await?);
        }

        for binding in &converged {
            self.store.upsert_binding(binding).await?;
        }
        Ok(())
    }

    /// Converge a gateway binding against the stored route tables, then store it
    ///
    /// `binding` is the gateway as it should be stored; nothing is written
    /// when a provider call fails.
    pub async fn reconcile(
        &self,
        call: &ProviderCall,
        binding: ResourceBinding,
    ) -> Result<ResourceBinding> {
        let payload: InternetGatewayPayload = binding.decode_payload()?;
        let tables = self.route_tables(call, None).await?;
        let converged = self.converge(call, &payload.name, binding, &tables).await?;
        self.store.upsert_binding(&converged).await
    }

    /// Stored route tables of the workspace with `pending` overlaid
    async fn route_tables(
        &self,
        call: &ProviderCall,
        pending: Option<PendingTable<'_>>,
    ) -> Result<Vec<RouteTablePayload>> {
        let ws = &call.workspace;
        let bindings = self
            .store
            .list_bindings(&ws.tenant, &ws.name, ResourceKind::RouteTable)
            .await?;

        let mut tables = Vec::with_capacity(bindings.len() + 1);
        for binding in bindings {
            if pending.is_some_and(|p| p.seca_ref() == binding.seca_ref) {
                continue;
            }
            tables.push(binding.decode_payload()?);
        }
        if let Some(PendingTable::Put { table, .. }) = pending {
            tables.push(table.clone());
        }
        Ok(tables)
    }

    /// Provider side of one gateway; returns the binding to store
    async fn converge(
        &self,
        call: &ProviderCall,
        gateway: &str,
        mut binding: ResourceBinding,
        tables: &[RouteTablePayload],
    ) -> Result<ResourceBinding> {
        let ws = &call.workspace;
        let seca_ref = binding.seca_ref.clone();
        let mut payload: InternetGatewayPayload = binding.decode_payload()?;

        let usage = gateway_usage(tables, gateway);
        payload.networks = (!usage.networks.is_empty()).then(|| usage.networks.clone());
        payload.route_tables = (!usage.route_tables.is_empty()).then(|| usage.route_tables.clone());

        if self.config.nat_enabled {
            let instance = backing_instance_name(&ws.name, gateway);

            if usage.route_tables.is_empty() {
                tracing::info!(
                    "Gateway {} is unreferenced, removing backing instance {}",
                    gateway,
                    instance
                );
                if let Some(action) = self.provider.delete_instance(call.cred(), &instance).await? {
                    record_actions(&*self.store, &seca_ref, &[action]).await?;
                }
                binding.provider_ref = None;
            } else {
                let region = if payload.region.is_empty() {
                    ws.region.clone()
                } else {
                    payload.region.clone()
                };
                tracing::info!(
                    "Converging backing instance {} for gateway {} (networks {:?})",
                    instance,
                    gateway,
                    usage.networks
                );

                let request = InstanceRequest {
                    name: instance.clone(),
                    sku: self.config.nat_sku.clone(),
                    image: self.config.nat_image.clone(),
                    architecture: self.config.nat_architecture,
                    region: Some(region),
                    user_data: Some(cloud_init::nat_user_data()),
                    networks: Vec::new(),
                    labels: instance_labels(&ws.name, gateway),
                };
                let applied = self
                    .provider
                    .create_or_update_instance(call.cred(), &request)
                    .await?;
                record_actions(&*self.store, &seca_ref, &applied.actions).await?;

                let actions = self
                    .provider
                    .sync_instance_networks(call.cred(), &instance, &usage.networks)
                    .await?;
                record_actions(&*self.store, &seca_ref, &actions).await?;

                binding.provider_ref = Some(format!("instances/{}", instance));
            }
        } else {
            tracing::debug!(
                "NAT instances disabled, gateway {} stays a binding record",
                gateway
            );
        }

        binding.set_payload(&payload)?;
        binding.status = BindingStatus::Active;
        Ok(binding)
    }
}

fn instance_labels(workspace: &str, gateway: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert("seca.role".to_string(), "internet-gateway".to_string());
    labels.insert("seca.workspace".to_string(), name_component(workspace));
    labels.insert("seca.gateway".to_string(), name_component(gateway));
    labels
}
