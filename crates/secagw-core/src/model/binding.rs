//! Resource bindings
//!
//! A binding links one declarative resource to its provider-side
//! materialization: the provider-native identity (when there is one) and the
//! serialized declarative payload (for kinds the provider has no field for).

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Kind of a bound resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Instance,
    BlockStorage,
    Network,
    Subnet,
    Nic,
    PublicIp,
    SecurityGroup,
    RouteTable,
    InternetGateway,
    NetworkRouteTableRef,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Instance,
        ResourceKind::BlockStorage,
        ResourceKind::Network,
        ResourceKind::Subnet,
        ResourceKind::Nic,
        ResourceKind::PublicIp,
        ResourceKind::SecurityGroup,
        ResourceKind::RouteTable,
        ResourceKind::InternetGateway,
        ResourceKind::NetworkRouteTableRef,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::BlockStorage => "block-storage",
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::Nic => "nic",
            ResourceKind::PublicIp => "public-ip",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::RouteTable => "route-table",
            ResourceKind::InternetGateway => "internet-gateway",
            ResourceKind::NetworkRouteTableRef => "network-route-table-ref",
        }
    }

    /// Path segment used in declarative references
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instances",
            ResourceKind::BlockStorage => "block-storages",
            ResourceKind::Network => "networks",
            ResourceKind::Subnet => "subnets",
            ResourceKind::Nic => "nics",
            ResourceKind::PublicIp => "public-ips",
            ResourceKind::SecurityGroup => "security-groups",
            ResourceKind::RouteTable => "route-tables",
            ResourceKind::InternetGateway => "internet-gateways",
            ResourceKind::NetworkRouteTableRef => "route-table-refs",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    /// Provider accepted an asynchronous create
    Creating,
    /// Provider accepted an asynchronous update
    Updating,
    Active,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::Creating => "creating",
            BindingStatus::Updating => "updating",
            BindingStatus::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "creating" => Some(BindingStatus::Creating),
            "updating" => Some(BindingStatus::Updating),
            "active" => Some(BindingStatus::Active),
            _ => None,
        }
    }
}

impl std::fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted link between a declarative reference and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBinding {
    pub tenant: String,
    pub workspace: String,
    pub kind: ResourceKind,
    pub seca_ref: String,

    /// Provider-native identity, e.g. a server id or `instances/<name>`
    pub provider_ref: Option<String>,

    /// Serialized declarative payload
    pub payload: Option<String>,

    pub status: BindingStatus,

    /// 1 on insert, +1 on every upsert
    pub resource_version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceBinding {
    pub fn new(tenant: &str, workspace: &str, kind: ResourceKind, seca_ref: String) -> Self {
        let now = Utc::now();
        Self {
            tenant: tenant.to_string(),
            workspace: workspace.to_string(),
            kind,
            seca_ref,
            provider_ref: None,
            payload: None,
            status: BindingStatus::Active,
            resource_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.set_payload(payload)?;
        Ok(self)
    }

    pub fn set_payload<T: Serialize>(&mut self, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)
            .map_err(|e| GatewayError::Internal(format!("encode {} payload: {}", self.kind, e)))?;
        self.payload = Some(json);
        Ok(())
    }

    /// Decode the stored payload
    ///
    /// A missing or malformed payload is an `InvalidRequest`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.payload.as_deref().ok_or_else(|| {
            GatewayError::invalid(format!("binding {} has no payload", self.seca_ref))
        })?;
        serde_json::from_str(raw).map_err(|e| {
            GatewayError::invalid(format!("malformed payload for {}: {}", self.seca_ref, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::parse("vpc"), None);
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&ResourceKind::NetworkRouteTableRef).unwrap();
        assert_eq!(json, "\"network-route-table-ref\"");
    }

    #[test]
    fn test_malformed_payload_is_invalid_request() {
        let mut binding =
            ResourceBinding::new("t1", "ws1", ResourceKind::RouteTable, "ref".to_string());
        binding.payload = Some("{not json".to_string());
        let err = binding.decode_payload::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));

        binding.payload = None;
        assert!(binding.decode_payload::<serde_json::Value>().is_err());
    }
}
