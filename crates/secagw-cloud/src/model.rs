//! Provider-side resource model
//!
//! These types describe resources the way the provider sees them. The
//! declarative (vendor-neutral) model lives in the core crate; adapters map
//! their wire types onto these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider labels
pub type Labels = BTreeMap<String, String>;

/// CPU architecture of a SKU or image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    X86,
    Arm,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::Arm => "arm",
        }
    }

    /// Parse loosely; accepts the common aliases
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "x86" | "x86_64" | "amd64" => Some(Architecture::X86),
            "arm" | "arm64" | "aarch64" => Some(Architecture::Arm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Initializing,
    Starting,
    Running,
    Stopping,
    Off,
    Deleting,
    Unknown,
}

impl PowerState {
    /// Running, or on its way there
    pub fn is_up_or_coming_up(&self) -> bool {
        matches!(
            self,
            PowerState::Running | PowerState::Starting | PowerState::Initializing
        )
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Initializing => write!(f, "initializing"),
            PowerState::Starting => write!(f, "starting"),
            PowerState::Running => write!(f, "running"),
            PowerState::Stopping => write!(f, "stopping"),
            PowerState::Off => write!(f, "off"),
            PowerState::Deleting => write!(f, "deleting"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A placement region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,

    /// Network zone the region belongs to; private networks span a zone
    pub network_zone: String,
}

/// A compute SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    pub cores: u32,
    pub memory_gb: f64,
    pub architecture: Architecture,
    pub deprecated: bool,
}

/// An OS image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub architecture: Architecture,
}

/// A compute instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub region: String,
    pub power_state: PowerState,

    /// Names of the private networks the instance is attached to
    pub networks: Vec<String>,

    pub public_ipv4: Option<String>,
    pub labels: Labels,
}

/// Desired state for an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub name: String,
    pub sku: String,
    pub image: String,
    pub architecture: Architecture,

    /// `None` lets the provider choose
    pub region: Option<String>,

    pub user_data: Option<String>,

    /// Private networks to attach at creation time
    pub networks: Vec<String>,

    pub labels: Labels,
}

/// A block storage volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub size_gb: u32,
    pub region: String,

    /// Name of the instance the volume is attached to
    pub attached_to: Option<String>,

    pub labels: Labels,
}

/// Desired state for a block storage volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub name: String,
    pub size_gb: u32,
    pub region: Option<String>,

    /// Instance name to attach to at creation time
    pub attach_to: Option<String>,

    pub labels: Labels,
}

/// A private network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub ip_range: String,
    pub labels: Labels,
}

/// Desired state for a private network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub name: String,
    pub ip_range: String,

    /// Zone for the network's subnet; adapters pick a default when absent
    pub network_zone: Option<String>,

    pub labels: Labels,
}

/// Traffic direction of a firewall rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

/// A single security group rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub direction: Direction,

    /// "tcp", "udp", "icmp", ...
    pub protocol: String,

    /// Single port or "from-to" range
    pub port: Option<String>,

    /// Remote CIDR blocks
    pub cidr_blocks: Vec<String>,
}

/// A security group (provider firewall)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub rules: Vec<SecurityRule>,
    pub labels: Labels,
}

/// Desired state for a security group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRequest {
    pub name: String,
    pub rules: Vec<SecurityRule>,
    pub labels: Labels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_aliases() {
        assert_eq!(Architecture::parse("amd64"), Some(Architecture::X86));
        assert_eq!(Architecture::parse("AARCH64"), Some(Architecture::Arm));
        assert_eq!(Architecture::parse("riscv"), None);
    }

    #[test]
    fn test_power_state_up_or_coming_up() {
        assert!(PowerState::Starting.is_up_or_coming_up());
        assert!(PowerState::Running.is_up_or_coming_up());
        assert!(!PowerState::Off.is_up_or_coming_up());
    }
}
