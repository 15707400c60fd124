//! Network, security-group, subnet, NIC and public-IP handlers

use super::{
    GatewayService, applied_status, decode_view, decode_views, payload_view, resolve_region,
};
use crate::error::{GatewayError, Result};
use crate::model::{
    NetworkPayload, NetworkSpec, NicSpec, PublicIpSpec, ResourceBinding, ResourceKind,
    ResourceRef, ResourceRequest, ResourceView, RouteTablePayload, SecurityGroupPayload,
    SecurityGroupRuleSpec, SecurityGroupSpec, SubnetSpec,
};
use secagw_cloud::{Direction, NetworkRequest, SecurityGroupRequest, SecurityRule};

/// Remote ranges of a rule that names none
const ANY_ADDRESS: [&str; 2] = ["0.0.0.0/0", "::/0"];

fn security_rule(rule: &SecurityGroupRuleSpec) -> Result<SecurityRule> {
    let direction = match rule.direction.to_ascii_lowercase().as_str() {
        "ingress" => Direction::Ingress,
        "egress" => Direction::Egress,
        other => {
            return Err(GatewayError::invalid(format!(
                "rule direction '{}' must be ingress or egress",
                other
            )));
        }
    };

    let port = match rule.ports {
        Some(range) if range.from > range.to => {
            return Err(GatewayError::invalid(format!(
                "port range {}-{} is reversed",
                range.from, range.to
            )));
        }
        Some(range) if range.from == range.to => Some(range.from.to_string()),
        Some(range) => Some(format!("{}-{}", range.from, range.to)),
        None => None,
    };

    let cidr_blocks = if rule.cidr_blocks.is_empty() {
        ANY_ADDRESS.iter().map(|s| s.to_string()).collect()
    } else {
        rule.cidr_blocks.clone()
    };

    Ok(SecurityRule {
        direction,
        protocol: rule.protocol.clone().unwrap_or_else(|| "tcp".to_string()),
        port,
        cidr_blocks,
    })
}

impl GatewayService {
    // ============ Networks ============

    pub async fn put_network(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<NetworkSpec>,
    ) -> Result<ResourceView<NetworkSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Network, name);
        reference.validate()?;
        if request.spec.cidr_block.is_empty() {
            return Err(GatewayError::invalid("cidrBlock must not be empty"));
        }
        let call = self.admit(tenant, workspace).await?;

        let payload = NetworkPayload {
            name: name.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
        };
        let desired = NetworkRequest {
            name: name.to_string(),
            ip_range: payload.spec.cidr_block.clone(),
            network_zone: None,
            labels: payload.labels.clone().unwrap_or_default(),
        };
        let applied = self
            .provider
            .create_or_update_network(call.cred(), &desired)
            .await?;

        let mut binding =
            ResourceBinding::new(tenant, workspace, reference.kind, reference.seca_ref())
                .with_payload(&payload)?;
        binding.provider_ref = Some(applied.resource.id.clone());
        binding.status = applied_status(applied.created, &applied.actions);
        let stored = self.persist(&binding, &applied.actions).await?;
        tracing::info!("Network {} converged ({})", name, applied.resource.id);

        Ok(payload_view(&stored, payload))
    }

    pub async fn get_network(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<NetworkSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Network, name);
        self.admit(tenant, workspace).await?;
        decode_view(&self.load(&reference).await?)
    }

    pub async fn list_networks(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<NetworkSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        decode_views(&self.list(&call, ResourceKind::Network).await?)
    }

    /// Refused while route tables still live in the network
    pub async fn delete_network(&self, tenant: &str, workspace: &str, name: &str) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Network, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        for table in self.list(&call, ResourceKind::RouteTable).await? {
            let table: RouteTablePayload = table.decode_payload()?;
            if table.network == name {
                return Err(GatewayError::conflict(format!(
                    "network {} still has route table {}",
                    name, table.name
                )));
            }
        }

        let actions: Vec<_> = self
            .provider
            .delete_network(call.cred(), name)
            .await?
            .into_iter()
            .collect();
        self.remove(&binding.seca_ref, &actions).await?;
        tracing::info!("Deleted network {} in {}/{}", name, tenant, workspace);
        Ok(())
    }

    // ============ Security groups ============

    /// Apply rules to the provider firewall and keep them in the payload
    pub async fn put_security_group(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<SecurityGroupSpec>,
    ) -> Result<ResourceView<SecurityGroupSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::SecurityGroup, name);
        reference.validate()?;
        let rules = request
            .spec
            .rules
            .iter()
            .map(security_rule)
            .collect::<Result<Vec<_>>>()?;
        let call = self.admit(tenant, workspace).await?;

        let payload = SecurityGroupPayload {
            name: name.to_string(),
            region: resolve_region(request.region, &call.workspace),
            labels: request.labels,
            spec: request.spec,
        };
        let desired = SecurityGroupRequest {
            name: name.to_string(),
            rules,
            labels: payload.labels.clone().unwrap_or_default(),
        };
        let applied = self
            .provider
            .create_or_update_security_group(call.cred(), &desired)
            .await?;

        let mut binding =
            ResourceBinding::new(tenant, workspace, reference.kind, reference.seca_ref())
                .with_payload(&payload)?;
        binding.provider_ref = Some(applied.resource.id.clone());
        binding.status = applied_status(applied.created, &applied.actions);
        let stored = self.persist(&binding, &applied.actions).await?;

        Ok(payload_view(&stored, payload))
    }

    pub async fn get_security_group(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<SecurityGroupSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::SecurityGroup, name);
        self.admit(tenant, workspace).await?;
        decode_view(&self.load(&reference).await?)
    }

    pub async fn list_security_groups(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<SecurityGroupSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        decode_views(&self.list(&call, ResourceKind::SecurityGroup).await?)
    }

    pub async fn delete_security_group(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::SecurityGroup, name);
        let call = self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;

        let actions: Vec<_> = self
            .provider
            .delete_security_group(call.cred(), name)
            .await?
            .into_iter()
            .collect();
        self.remove(&binding.seca_ref, &actions).await?;
        Ok(())
    }

    // ============ Subnets ============

    pub async fn put_subnet(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
        request: ResourceRequest<SubnetSpec>,
    ) -> Result<ResourceView<SubnetSpec>> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::Subnet, name);
        reference.validate()?;
        if request.spec.cidr_block.is_empty() {
            return Err(GatewayError::invalid("cidrBlock must not be empty"));
        }
        let call = self.admit(tenant, workspace).await?;
        self.load(&ResourceRef::new(tenant, workspace, ResourceKind::Network, network))
            .await?;

        let view = self
            .put_record(&call, &reference, request.region, request.labels, request.spec)
            .await?;
        Ok(view.in_network(network))
    }

    pub async fn get_subnet(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
    ) -> Result<ResourceView<SubnetSpec>> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::Subnet, name);
        self.admit(tenant, workspace).await?;
        let view: ResourceView<SubnetSpec> = decode_view(&self.load(&reference).await?)?;
        Ok(view.in_network(network))
    }

    /// Subnets of one network
    pub async fn list_subnets(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
    ) -> Result<Vec<ResourceView<SubnetSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        let prefix = format!(
            "{}/",
            ResourceRef::new(tenant, workspace, ResourceKind::Network, network).seca_ref()
        );
        let bindings: Vec<_> = self
            .list(&call, ResourceKind::Subnet)
            .await?
            .into_iter()
            .filter(|b| b.seca_ref.starts_with(&prefix))
            .collect();
        Ok(decode_views::<SubnetSpec>(&bindings)?
            .into_iter()
            .map(|v| v.in_network(network))
            .collect())
    }

    pub async fn delete_subnet(
        &self,
        tenant: &str,
        workspace: &str,
        network: &str,
        name: &str,
    ) -> Result<()> {
        let reference =
            ResourceRef::in_network(tenant, workspace, network, ResourceKind::Subnet, name);
        self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;
        self.remove(&binding.seca_ref, &[]).await
    }

    // ============ NICs ============

    pub async fn put_nic(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<NicSpec>,
    ) -> Result<ResourceView<NicSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Nic, name);
        if request.spec.subnet_ref.is_empty() {
            return Err(GatewayError::invalid("subnetRef must not be empty"));
        }
        let call = self.admit(tenant, workspace).await?;
        self.put_record(&call, &reference, request.region, request.labels, request.spec)
            .await
    }

    pub async fn get_nic(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<NicSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Nic, name);
        self.admit(tenant, workspace).await?;
        decode_view(&self.load(&reference).await?)
    }

    pub async fn list_nics(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<NicSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        decode_views(&self.list(&call, ResourceKind::Nic).await?)
    }

    pub async fn delete_nic(&self, tenant: &str, workspace: &str, name: &str) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::Nic, name);
        self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;
        self.remove(&binding.seca_ref, &[]).await
    }

    // ============ Public IPs ============

    pub async fn put_public_ip(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
        request: ResourceRequest<PublicIpSpec>,
    ) -> Result<ResourceView<PublicIpSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::PublicIp, name);
        if let Some(version) = request.spec.version.as_deref() {
            if version != "ipv4" && version != "ipv6" {
                return Err(GatewayError::invalid(format!(
                    "version '{}' must be ipv4 or ipv6",
                    version
                )));
            }
        }
        let call = self.admit(tenant, workspace).await?;
        self.put_record(&call, &reference, request.region, request.labels, request.spec)
            .await
    }

    pub async fn get_public_ip(
        &self,
        tenant: &str,
        workspace: &str,
        name: &str,
    ) -> Result<ResourceView<PublicIpSpec>> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::PublicIp, name);
        self.admit(tenant, workspace).await?;
        decode_view(&self.load(&reference).await?)
    }

    pub async fn list_public_ips(
        &self,
        tenant: &str,
        workspace: &str,
    ) -> Result<Vec<ResourceView<PublicIpSpec>>> {
        let call = self.admit(tenant, workspace).await?;
        decode_views(&self.list(&call, ResourceKind::PublicIp).await?)
    }

    pub async fn delete_public_ip(&self, tenant: &str, workspace: &str, name: &str) -> Result<()> {
        let reference = ResourceRef::new(tenant, workspace, ResourceKind::PublicIp, name);
        self.admit(tenant, workspace).await?;
        let binding = self.load(&reference).await?;
        self.remove(&binding.seca_ref, &[]).await
    }
}
