//! Route-table and internet-gateway handlers
//!
//! Route-table writes drive the reconciler; the route-table binding and its
//! per-network reference binding are written only once reconciliation has
//! succeeded, so a failed provider call leaves the store as it was.

use super::{GatewayService, resolve_region};
use crate::error::{GatewayError, Result};
use crate::gate::ProviderCall;
use crate::model::{
    InternetGatewayPayload, InternetGatewaySpec, ResourceBinding, ResourceKind,
    ResourceRef, ResourceRequest, ResourceView, Route, RouteTablePayload, RouteTableSpec,
};
use crate::reconciler::{PendingTable, backing_instance_name, gateway_target, gateway_usage};

fn route_table_view(binding: &ResourceBinding) -> Result<ResourceView<RouteTableSpec>> {
    let payload: RouteTablePayload = binding.decode_payload()?;
    Ok(
        ResourceView::new(binding, &payload.name, &payload.region, payload.labels, payload.spec)
            .in_network(&payload.network),
    )
}

fn gateway_view(binding: &ResourceBinding) -> Result<ResourceView<InternetGatewaySpec>> {
    let payload: InternetGatewayPayload = binding.decode_payload()?;
    Ok(ResourceView::new(
        binding,
        &payload.name,
        &payload.region,
        payload.labels,
        payload.spec,
    ))
}

fn validate_route(route: &Route) -> Result<()> {
    if route.destination_cidr_block.is_empty() {
        return Err(GatewayError::invalid("route destinationCidrBlock must not be empty"));
    }
    if route.target_ref.resource.is_empty() {
        return Err(GatewayError::invalid("route targetRef.resource must not be empty"));
    }
    Ok(())
}

impl GatewayService {
    // ============ Route tables ============

    /// Create or replace a route table, reconciling every gateway it touches
    pub async fn put_route_table(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
        request: ResourceRequest<RouteTableSpec>,
    ) -> Result<ResourceView<RouteTableSpec>> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::RouteTable, name);
        reference.validate()?;
        for route in &request.spec.routes {
            validate_route(route)?;
        }

        let call = self.admit(tenant, workspace).await?;
        self.load(&ResourceRef::new(tenant, workspace, ResourceKind::Network, network))
            .await?;
        self.require_gateways(&call, &request.spec.routes).await?;

        let seca_ref = reference.seca_ref();
        let previous: Option<RouteTablePayload> = match self.find(&reference).await? {
            Some(binding) => Some(binding.decode_payload()?),
            None => None,
        };
        let payload = RouteTablePayload {
            name: name.to_string(),
            network: network.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
        };

        self.reconciler
            .on_route_table_write(
                &call,
                previous.as_ref(),
                PendingTable::Put {
                    seca_ref: &seca_ref,
                    table: &payload,
                },
            )
            .await?;

        let binding = ResourceBinding::new(tenant, workspace, reference.kind, seca_ref.clone())
            .with_payload(&payload)?;
        let stored = self.persist(&binding, &[]).await?;

        let table_ref = ResourceRef::in_network(
            tenant,
            workspace,
            network,
            ResourceKind::NetworkRouteTableRef,
            name,
        );
        let mut link = ResourceBinding::new(tenant, workspace, table_ref.kind, table_ref.seca_ref());
        link.provider_ref = Some(seca_ref);
        self.persist(&link, &[]).await?;

        tracing::info!(
            "Route table {} in network {} stored ({} route(s))",
            name,
            network,
            payload.spec.routes.len()
        );
        route_table_view(&stored)
    }

    pub async fn get_route_table(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
    ) -> Result<ResourceView<RouteTableSpec>> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::RouteTable, name);
        self.admit(tenant, workspace).await?;
        route_table_view(&self.load(&reference).await?)
    }

    /// Route tables of one network
    pub async fn list_route_tables(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
    ) -> Result<Vec<ResourceView<RouteTableSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        let mut views = Vec::new();
        for binding in self.list(&call, ResourceKind::RouteTable).await? {
            let view = route_table_view(&binding)?;
            if view.metadata.network.as_deref() == Some(network) {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// Delete a route table, releasing the gateways it referenced
    pub async fn delete_route_table(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
    ) -> Result<()> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::RouteTable, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;
        let previous: RouteTablePayload = binding.decode_payload()?;

        self.reconciler
            .on_route_table_write(
                &call,
                Some(&previous),
                PendingTable::Delete {
                    seca_ref: &binding.seca_ref,
                },
            )
            .await?;

        self.remove(&binding.seca_ref, &[]).await?;
        let table_ref = ResourceRef::in_network(
            tenant,
            workspace,
            network,
            ResourceKind::NetworkRouteTableRef,
            name,
        );
        self.remove(&table_ref.seca_ref(), &[]).await?;

        tracing::info!("Deleted route table {} in network {}", name, network);
        Ok(())
    }

    /// Gateway targets must name gateways bound in the workspace
    async fn require_gateways(&self, call: &ProviderCall, routes: &[Route]) -> Result<()> {
        let ws = &call.workspace;
        for route in routes {
            let Some(gateway) = gateway_target(&route.target_ref.resource) else {
                continue;
            };
            let reference =
                ResourceRef::new(&ws.tenant, &ws.name, ResourceKind::InternetGateway, &gateway);
            if self.find(&reference).await?.is_none() {
                return Err(GatewayError::invalid(format!(
                    "route target '{}' names an unknown internet gateway",
                    route.target_ref.resource
                )));
            }
        }
        Ok(())
    }

    // ============ Internet gateways ============

    /// Create or update a gateway, then re-reconcile it
    ///
    /// Usage fields and the backing instance reference survive an update;
    /// reconciliation recomputes both. The binding is stored only once
    /// reconciliation succeeds.
    pub async fn put_internet_gateway(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<InternetGatewaySpec>,
    ) -> Result<ResourceView<InternetGatewaySpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::InternetGateway, name);
        reference.validate()?;
        let call = self.admit(tenant, workspace).await?;

        let existing = self.find(&reference).await?;
        let (networks, route_tables, provider_ref) = match &existing {
            Some(binding) => {
                let old: InternetGatewayPayload = binding.decode_payload()?;
                (old.networks, old.route_tables, binding.provider_ref.clone())
            }
            None => (None, None, None),
        };

        let payload = InternetGatewayPayload {
            name: name.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
            networks,
            route_tables,
        };
        let mut binding =
            ResourceBinding::new(tenant, workspace, reference.kind, reference.seca_ref())
                .with_payload(&payload)?;
        binding.provider_ref = provider_ref;

        let stored = self.reconciler.reconcile(&call, binding).await?;
        gateway_view(&stored)
    }

    pub async fn get_internet_gateway(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<InternetGatewaySpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::InternetGateway, name);
        self.admit(tenant, workspace).await?;
        gateway_view(&self.load(&reference).await?)
    }

    pub async fn list_internet_gateways(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<InternetGatewaySpec>>> {
        let call = self.admit(tenant, workspace).await?;
        self.list(&call, ResourceKind::InternetGateway)
            .await?
            .iter()
            .map(gateway_view)
            .collect()
    }

    /// Refused while any route table still targets the gateway
    pub async fn delete_internet_gateway(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::InternetGateway, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        let tables = self
            .list(&call, ResourceKind::RouteTable)
            .await?
            .iter()
            .map(|b| b.decode_payload())
            .collect::<Result<Vec<RouteTablePayload>>>()?;
        let usage = gateway_usage(&tables, name);
        if !usage.route_tables.is_empty() {
            return Err(GatewayError::conflict(format!(
                "internet gateway {} is still referenced by route table(s) {}",
                name,
                usage.route_tables.join(", ")
            )));
        }

        let mut actions = Vec::new();
        if self.reconciler.config().nat_enabled {
            let instance = backing_instance_name(workspace, name);
            actions.extend(self.provider.delete_instance(call.cred(), &instance).await?);
        }
        self.remove(&binding.seca_ref, &actions).await?;
        tracing::info!("Deleted internet gateway {} in {}/{}", name, tenant, workspace);
        Ok(())
    }
}
