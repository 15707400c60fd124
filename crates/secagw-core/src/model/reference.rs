//! Declarative references
//!
//! A declarative reference (secaRef) is a lower-cased, path-shaped key that is
//! unique across the whole binding store:
//!
//! ```text
//! tenants/<tenant>/workspaces/<workspace>/instances/<name>
//! tenants/<tenant>/workspaces/<workspace>/networks/<network>/route-tables/<name>
//! ```

use super::binding::ResourceKind;
use crate::error::{GatewayError, Result};

/// Reference to one declarative resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub tenant: String,
    pub workspace: String,
    pub kind: ResourceKind,
    /// Owning network for network-scoped kinds
    pub network: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn new(tenant: &str, workspace: &str, kind: ResourceKind, name: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            workspace: workspace.to_string(),
            kind,
            network: None,
            name: name.to_string(),
        }
    }

    /// Reference to a resource nested under a network
    pub fn in_network(
        tenant: &str,
        workspace: &str,
        network: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Self {
        Self {
            network: Some(network.to_string()),
            ..Self::new(tenant, workspace, kind, name)
        }
    }

    /// Reject empty or path-breaking segments
    ///
    /// Tenant and workspace must already be lower case: the store key folds
    /// case, so `WS1` and `ws1` would otherwise share one key space.
    pub fn validate(&self) -> Result<()> {
        let mut segments = vec![
            ("tenant", self.tenant.as_str()),
            ("workspace", self.workspace.as_str()),
            ("name", self.name.as_str()),
        ];
        if let Some(network) = &self.network {
            segments.push(("network", network.as_str()));
        }

        for (what, value) in segments {
            if value.is_empty() {
                return Err(GatewayError::invalid(format!("{} must not be empty", what)));
            }
            if value.contains('/') || value.chars().any(char::is_whitespace) {
                return Err(GatewayError::invalid(format!(
                    "{} '{}' contains '/' or whitespace",
                    what, value
                )));
            }
        }
        for (what, value) in [("tenant", &self.tenant), ("workspace", &self.workspace)] {
            if value.chars().any(char::is_uppercase) {
                return Err(GatewayError::invalid(format!(
                    "{} '{}' must be lower case",
                    what, value
                )));
            }
        }
        Ok(())
    }

    /// The store key
    pub fn seca_ref(&self) -> String {
        let mut path = format!("tenants/{}/workspaces/{}", self.tenant, self.workspace);
        if let Some(network) = &self.network {
            path.push_str(&format!("/networks/{}", network));
        }
        path.push_str(&format!("/{}/{}", self.kind.collection(), self.name));
        path.to_lowercase()
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Name from a relative reference such as `internet-gateways/igw-1`
///
/// Accepts a bare name, a `<collection>/<name>` pair, or any longer path
/// whose second-to-last segment is `collection`.
pub fn name_in_collection<'a>(reference: &'a str, collection: &str) -> Option<&'a str> {
    let reference = reference.trim_matches('/');
    match reference.rsplit_once('/') {
        None if !reference.is_empty() => Some(reference),
        None => None,
        Some((head, name)) => {
            let parent = head.rsplit('/').next().unwrap_or(head);
            (parent == collection && !name.is_empty()).then_some(name)
        }
    }
}
