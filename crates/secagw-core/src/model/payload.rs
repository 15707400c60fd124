//! Declarative specs and stored binding payloads
//!
//! Each resource kind has an explicit spec type. Payloads are the JSON stored
//! in a binding; their shapes are fixed (camelCase keys, optional keys
//! omitted when absent). Unknown fields in requests are ignored.

use secagw_cloud::Labels;
use serde::{Deserialize, Serialize};

/// Relative reference to another resource (`internet-gateways/igw-1`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub resource: String,
}

impl Reference {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

// ============ Specs ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    /// `skus/<name>` or a bare SKU name
    pub sku_ref: String,

    /// `images/<name>` or a bare image name
    pub image_ref: String,

    /// "x86" or "arm"; defaults to x86
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    /// `networks/<name>` references attached at creation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_refs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStorageSpec {
    #[serde(rename = "sizeGB")]
    pub size_gb: u32,

    /// `instances/<name>`; `None` keeps the volume detached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    pub cidr_block: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub cidr_block: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicSpec {
    /// `networks/<net>/subnets/<name>` or `subnets/<name>`
    pub subnet_ref: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpSpec {
    /// "ipv4" or "ipv6"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRuleSpec {
    /// "ingress" or "egress"
    pub direction: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortRange>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    #[serde(default)]
    pub rules: Vec<SecurityGroupRuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub destination_cidr_block: String,
    pub target_ref: Reference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableSpec {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternetGatewaySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_only: Option<bool>,
}

// ============ Requests ============

/// Body of a resource PUT
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceRequest<S> {
    #[serde(default)]
    pub labels: Option<Labels>,

    /// Falls back to the workspace region
    #[serde(default)]
    pub region: Option<String>,

    pub spec: S,
}

impl<S> ResourceRequest<S> {
    pub fn new(spec: S) -> Self {
        Self {
            labels: None,
            region: None,
            spec,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(labels);
        self
    }
}

// ============ Payloads ============

/// Payload shape shared by most kinds: `{name, region, labels?, spec}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePayload<S> {
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    pub spec: S,
}

pub type InstancePayload = ResourcePayload<InstanceSpec>;
pub type BlockStoragePayload = ResourcePayload<BlockStorageSpec>;
pub type NetworkPayload = ResourcePayload<NetworkSpec>;
pub type SubnetPayload = ResourcePayload<SubnetSpec>;
pub type NicPayload = ResourcePayload<NicSpec>;
pub type PublicIpPayload = ResourcePayload<PublicIpSpec>;
pub type SecurityGroupPayload = ResourcePayload<SecurityGroupSpec>;

/// `{name, network, region, labels?, spec:{routes:[...]}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTablePayload {
    pub name: String,
    pub network: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    pub spec: RouteTableSpec,
}

/// `{name, region, labels?, spec:{egressOnly?}, networks?, routeTables?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternetGatewayPayload {
    pub name: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    pub spec: InternetGatewaySpec,

    /// Networks routing to the gateway, as of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,

    /// Route tables referencing the gateway, as of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_tables: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_payload_shape() {
        let payload = RouteTablePayload {
            name: "rt-a".to_string(),
            network: "net-a".to_string(),
            region: "fsn1".to_string(),
            labels: None,
            spec: RouteTableSpec {
                routes: vec![Route {
                    destination_cidr_block: "0.0.0.0/0".to_string(),
                    target_ref: Reference::new("internet-gateways/igw-1"),
                }],
            },
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"name":"rt-a","network":"net-a","region":"fsn1","spec":{"routes":[{"destinationCidrBlock":"0.0.0.0/0","targetRef":{"resource":"internet-gateways/igw-1"}}]}}"#
        );
    }

    #[test]
    fn test_internet_gateway_payload_shape() {
        let mut payload = InternetGatewayPayload {
            name: "igw-1".to_string(),
            region: "fsn1".to_string(),
            labels: None,
            spec: InternetGatewaySpec::default(),
            networks: None,
            route_tables: None,
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"name":"igw-1","region":"fsn1","spec":{}}"#
        );

        payload.spec.egress_only = Some(true);
        payload.networks = Some(vec!["net-a".to_string()]);
        payload.route_tables = Some(vec!["rt-a".to_string()]);
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"name":"igw-1","region":"fsn1","spec":{"egressOnly":true},"networks":["net-a"],"routeTables":["rt-a"]}"#
        );
    }

    #[test]
    fn test_security_group_payload_shape() {
        let payload = SecurityGroupPayload {
            name: "sg-1".to_string(),
            region: "fsn1".to_string(),
            labels: Some([("env".to_string(), "dev".to_string())].into()),
            spec: SecurityGroupSpec {
                rules: vec![SecurityGroupRuleSpec {
                    direction: "ingress".to_string(),
                    protocol: None,
                    ports: None,
                    cidr_blocks: Vec::new(),
                }],
            },
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"name":"sg-1","region":"fsn1","labels":{"env":"dev"},"spec":{"rules":[{"direction":"ingress"}]}}"#
        );
    }

    #[test]
    fn test_request_ignores_unknown_fields() {
        let req: ResourceRequest<BlockStorageSpec> = serde_json::from_str(
            r#"{"labels":{"a":"b"},"spec":{"sizeGB":20,"attachedTo":"instances/web-1","tier":"fast"},"extra":1}"#,
        )
        .unwrap();
        assert_eq!(req.spec.size_gb, 20);
        assert_eq!(req.spec.attached_to.as_deref(), Some("instances/web-1"));
        assert_eq!(req.region, None);
    }
}
