//! Hetzner Cloud wire types

use secagw_cloud::{
    ActionRef, Architecture, Direction, Image, Instance, Labels, Network, PowerState, Region,
    SecurityGroup, SecurityRule, Sku, Volume,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============ Responses ============

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAction {
    pub id: u64,
    pub command: String,
    #[allow(dead_code)]
    pub status: String,
}

impl From<ApiAction> for ActionRef {
    fn from(action: ApiAction) -> Self {
        ActionRef::new(action.id.to_string(), action.command)
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionResponse {
    pub action: ApiAction,
}

#[derive(Debug, Deserialize)]
pub struct ActionsResponse {
    #[serde(default)]
    pub actions: Vec<ApiAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLocation {
    pub name: String,
    pub network_zone: String,
}

impl From<ApiLocation> for Region {
    fn from(location: ApiLocation) -> Self {
        Region {
            name: location.name,
            network_zone: location.network_zone,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerType {
    pub id: u64,
    pub name: String,
    pub cores: u32,
    pub memory: f64,
    pub architecture: String,
    #[serde(default)]
    pub deprecated: Option<bool>,
}

impl ApiServerType {
    pub fn to_sku(&self) -> Sku {
        Sku {
            name: self.name.clone(),
            cores: self.cores,
            memory_gb: self.memory,
            architecture: Architecture::parse(&self.architecture).unwrap_or_default(),
            deprecated: self.deprecated.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiDatacenterServerTypes {
    #[serde(default)]
    pub available: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDatacenter {
    pub name: String,
    pub location: ApiLocation,
    #[serde(default)]
    pub server_types: ApiDatacenterServerTypes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiImage {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub architecture: String,
}

impl ApiImage {
    pub fn to_image(&self) -> Option<Image> {
        Some(Image {
            id: self.id.to_string(),
            name: self.name.clone()?,
            architecture: Architecture::parse(&self.architecture)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiIpv4 {
    pub ip: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiPublicNet {
    #[serde(default)]
    pub ipv4: Option<ApiIpv4>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPrivateNet {
    pub network: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerDatacenter {
    pub location: ApiLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerTypeRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiServer {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub server_type: ApiServerTypeRef,
    pub datacenter: ApiServerDatacenter,
    #[serde(default)]
    pub public_net: ApiPublicNet,
    #[serde(default)]
    pub private_net: Vec<ApiPrivateNet>,
    #[serde(default)]
    pub labels: Labels,
}

impl ApiServer {
    pub fn power_state(&self) -> PowerState {
        match self.status.as_str() {
            "initializing" => PowerState::Initializing,
            "starting" => PowerState::Starting,
            "running" => PowerState::Running,
            "stopping" => PowerState::Stopping,
            "off" => PowerState::Off,
            "deleting" => PowerState::Deleting,
            _ => PowerState::Unknown,
        }
    }

    /// Convert, resolving private network ids to names
    pub fn to_instance(&self, network_names: &HashMap<u64, String>) -> Instance {
        Instance {
            id: self.id.to_string(),
            name: self.name.clone(),
            sku: self.server_type.name.clone(),
            region: self.datacenter.location.name.clone(),
            power_state: self.power_state(),
            networks: self
                .private_net
                .iter()
                .filter_map(|n| network_names.get(&n.network).cloned())
                .collect(),
            public_ipv4: self.public_net.ipv4.as_ref().map(|v| v.ip.clone()),
            labels: self.labels.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerResponse {
    pub server: ApiServer,
}

#[derive(Debug, Deserialize)]
pub struct CreateServerResponse {
    pub server: ApiServer,
    #[serde(default)]
    pub action: Option<ApiAction>,
    #[serde(default)]
    pub next_actions: Vec<ApiAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVolume {
    pub id: u64,
    pub name: String,
    pub size: u32,
    pub location: ApiLocation,
    #[serde(default)]
    pub server: Option<u64>,
    #[serde(default)]
    pub labels: Labels,
}

impl ApiVolume {
    pub fn to_volume(&self, attached_to: Option<String>) -> Volume {
        Volume {
            id: self.id.to_string(),
            name: self.name.clone(),
            size_gb: self.size,
            region: self.location.name.clone(),
            attached_to,
            labels: self.labels.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VolumeResponse {
    pub volume: ApiVolume,
}

#[derive(Debug, Deserialize)]
pub struct CreateVolumeResponse {
    pub volume: ApiVolume,
    #[serde(default)]
    pub action: Option<ApiAction>,
    #[serde(default)]
    pub next_actions: Vec<ApiAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiNetwork {
    pub id: u64,
    pub name: String,
    pub ip_range: String,
    #[serde(default)]
    pub labels: Labels,
}

impl From<ApiNetwork> for Network {
    fn from(network: ApiNetwork) -> Self {
        Network {
            id: network.id.to_string(),
            name: network.name,
            ip_range: network.ip_range,
            labels: network.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkResponse {
    pub network: ApiNetwork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFirewallRule {
    pub direction: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_ips: Vec<String>,
}

impl From<&SecurityRule> for ApiFirewallRule {
    fn from(rule: &SecurityRule) -> Self {
        let (direction, source_ips, destination_ips) = match rule.direction {
            Direction::Ingress => ("in", rule.cidr_blocks.clone(), Vec::new()),
            Direction::Egress => ("out", Vec::new(), rule.cidr_blocks.clone()),
        };
        ApiFirewallRule {
            direction: direction.to_string(),
            protocol: rule.protocol.clone(),
            port: rule.port.clone(),
            source_ips,
            destination_ips,
        }
    }
}

impl From<ApiFirewallRule> for SecurityRule {
    fn from(rule: ApiFirewallRule) -> Self {
        let (direction, cidr_blocks) = if rule.direction == "out" {
            (Direction::Egress, rule.destination_ips)
        } else {
            (Direction::Ingress, rule.source_ips)
        };
        SecurityRule {
            direction,
            protocol: rule.protocol,
            port: rule.port,
            cidr_blocks,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFirewall {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<ApiFirewallRule>,
    #[serde(default)]
    pub labels: Labels,
}

impl From<ApiFirewall> for SecurityGroup {
    fn from(firewall: ApiFirewall) -> Self {
        SecurityGroup {
            id: firewall.id.to_string(),
            name: firewall.name,
            rules: firewall.rules.into_iter().map(SecurityRule::from).collect(),
            labels: firewall.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirewallResponse {
    pub firewall: ApiFirewall,
}

#[derive(Debug, Deserialize)]
pub struct CreateFirewallResponse {
    pub firewall: ApiFirewall,
    #[serde(default)]
    pub actions: Vec<ApiAction>,
}

// ============ Requests ============

#[derive(Debug, Clone, Serialize)]
pub struct PublicNetRequest {
    pub enable_ipv4: bool,
    pub enable_ipv6: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<u64>,
    pub labels: Labels,
    pub start_after_create: bool,
    pub public_net: PublicNetRequest,
}

#[derive(Debug, Serialize)]
pub struct LabelsUpdate<'a> {
    pub labels: &'a Labels,
}

#[derive(Debug, Serialize)]
pub struct NetworkAttachRequest {
    pub network: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<u64>,
    pub automount: bool,
    pub format: String,
    pub labels: Labels,
}

#[derive(Debug, Serialize)]
pub struct ResizeVolumeRequest {
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct AttachVolumeRequest {
    pub server: u64,
    pub automount: bool,
}

#[derive(Debug, Serialize)]
pub struct SubnetRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub network_zone: String,
    pub ip_range: String,
}

#[derive(Debug, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub ip_range: String,
    pub subnets: Vec<SubnetRequest>,
    pub labels: Labels,
}

#[derive(Debug, Serialize)]
pub struct CreateFirewallRequest {
    pub name: String,
    pub rules: Vec<ApiFirewallRule>,
    pub labels: Labels,
}

#[derive(Debug, Serialize)]
pub struct SetRulesRequest {
    pub rules: Vec<ApiFirewallRule>,
}
