//! Resource envelopes returned to the HTTP layer

use super::binding::{BindingStatus, ResourceBinding, ResourceKind};
use chrono::{DateTime, Utc};
use secagw_cloud::Labels;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub name: String,
    pub tenant: String,
    pub workspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub kind: ResourceKind,
    #[serde(rename = "ref")]
    pub seca_ref: String,
    pub region: String,
    pub resource_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub state: BindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<String>,
    /// Live power state, instances only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_state: Option<String>,
}

/// `{metadata, labels?, spec, status}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView<S> {
    pub metadata: ResourceMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    pub spec: S,
    pub status: ResourceStatus,
}

impl<S> ResourceView<S> {
    pub fn new(
        binding: &ResourceBinding,
        name: &str,
        region: &str,
        labels: Option<Labels>,
        spec: S,
    ) -> Self {
        Self {
            metadata: ResourceMetadata {
                name: name.to_string(),
                tenant: binding.tenant.clone(),
                workspace: binding.workspace.clone(),
                network: None,
                kind: binding.kind,
                seca_ref: binding.seca_ref.clone(),
                region: region.to_string(),
                resource_version: binding.resource_version,
                created_at: binding.created_at,
                updated_at: binding.updated_at,
            },
            labels,
            spec,
            status: ResourceStatus {
                state: binding.status,
                provider_ref: binding.provider_ref.clone(),
                power_state: None,
            },
        }
    }

    pub fn in_network(mut self, network: &str) -> Self {
        self.metadata.network = Some(network.to_string());
        self
    }

    pub fn with_power_state(mut self, power_state: impl std::fmt::Display) -> Self {
        self.status.power_state = Some(power_state.to_string());
        self
    }
}
