//! Daemon configuration (KDL)
//!
//! ```kdl
//! listen "0.0.0.0:8080"
//! database "sqlite:///var/lib/secagw/secagw.db"
//! master-key "base64-encoded 32 bytes"
//!
//! provider "hetzner" {
//!     endpoint "https://api.hetzner.cloud/v1"
//!     conformance #true
//!     catalog-ttl-secs 300
//!     locked-retry-attempts 5
//!     locked-retry-backoff-ms 2000
//! }
//!
//! gateway {
//!     nat-vm #true
//!     nat-sku "cx22"
//!     nat-image "ubuntu-24.04"
//!     nat-architecture "x86"
//! }
//!
//! activation {
//!     poll-interval-ms 500
//!     timeout-ms 2000
//! }
//! ```
//!
//! Every key is optional; CLI flags and environment variables override the
//! file.

use kdl::{KdlDocument, KdlNode};
use secagw_cloud::Architecture;
use secagw_cloud_hetzner::HetznerConfig;
use secagw_core::{GateConfig, GatewayConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "secagwd.kdl";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_DATABASE: &str = "sqlite://secagw.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub listen: String,
    pub database: String,

    /// Base64 AES-256 key for the credential vault
    pub master_key: Option<String>,

    /// Provider name; only "hetzner" is wired
    pub provider: String,
    pub hetzner: HetznerConfig,
    pub gateway: GatewayConfig,
    pub activation: GateConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            master_key: None,
            provider: secagw_cloud_hetzner::PROVIDER_NAME.to_string(),
            hetzner: HetznerConfig::default(),
            gateway: GatewayConfig::default(),
            activation: GateConfig::default(),
        }
    }
}

/// `./secagwd.kdl`, then `<config dir>/secagw/secagwd.kdl`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("secagw").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Load `path`, or the discovered file, or defaults when there is none
pub fn load(path: Option<&Path>) -> Result<DaemonConfig> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };
    let Some(path) = path else {
        tracing::debug!("No config file found, using defaults");
        return Ok(DaemonConfig::default());
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!("Loading config from {}", path.display());
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<DaemonConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = DaemonConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "listen" => config.listen = required_string(node)?,
            "database" => config.database = required_string(node)?,
            "master-key" | "master_key" => config.master_key = Some(required_string(node)?),
            "provider" => parse_provider(node, &mut config)?,
            "gateway" => parse_gateway(node, &mut config.gateway)?,
            "activation" => parse_activation(node, &mut config.activation)?,
            other => tracing::warn!("Unknown config node '{}' ignored", other),
        }
    }

    Ok(config)
}

fn parse_provider(node: &KdlNode, config: &mut DaemonConfig) -> Result<()> {
    let name = required_string(node)?;
    if name != secagw_cloud_hetzner::PROVIDER_NAME {
        return Err(ConfigError::Invalid(format!(
            "unsupported provider '{}' (only '{}' is available)",
            name,
            secagw_cloud_hetzner::PROVIDER_NAME
        )));
    }
    config.provider = name;

    let hetzner = &mut config.hetzner;
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "endpoint" => hetzner.endpoint = required_string(child)?,
            "token" => hetzner.default_token = Some(required_string(child)?),
            "conformance" => hetzner.conformance_mode = required_bool(child)?,
            "catalog-ttl-secs" => {
                hetzner.catalog_ttl = Duration::from_secs(required_u64(child)?);
            }
            "locked-retry-attempts" => {
                hetzner.locked_retry_attempts = u32::try_from(required_u64(child)?)
                    .map_err(|_| invalid_value(child, "out of range"))?;
            }
            "locked-retry-backoff-ms" => {
                hetzner.locked_retry_backoff = Duration::from_millis(required_u64(child)?);
            }
            "network-zone" => hetzner.default_network_zone = required_string(child)?,
            other => tracing::warn!("Unknown provider key '{}' ignored", other),
        }
    }
    Ok(())
}

fn parse_gateway(node: &KdlNode, gateway: &mut GatewayConfig) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "nat-vm" => gateway.nat_enabled = required_bool(child)?,
            "nat-sku" => gateway.nat_sku = required_string(child)?,
            "nat-image" => gateway.nat_image = required_string(child)?,
            "nat-architecture" => {
                let value = required_string(child)?;
                gateway.nat_architecture = Architecture::parse(&value)
                    .ok_or_else(|| invalid_value(child, "expected x86 or arm"))?;
            }
            other => tracing::warn!("Unknown gateway key '{}' ignored", other),
        }
    }
    Ok(())
}

fn parse_activation(node: &KdlNode, activation: &mut GateConfig) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "poll-interval-ms" => {
                activation.poll_interval = Duration::from_millis(required_u64(child)?);
            }
            "timeout-ms" => activation.timeout = Duration::from_millis(required_u64(child)?),
            other => tracing::warn!("Unknown activation key '{}' ignored", other),
        }
    }
    if activation.poll_interval.is_zero() {
        return Err(ConfigError::Invalid(
            "activation poll-interval-ms must be positive".to_string(),
        ));
    }
    Ok(())
}

fn invalid_value(node: &KdlNode, reason: &str) -> ConfigError {
    ConfigError::Invalid(format!("{}: {}", node.name().value(), reason))
}

fn required_string(node: &KdlNode) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| invalid_value(node, "expected a string argument"))
}

fn required_u64(node: &KdlNode) -> Result<u64> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| invalid_value(node, "expected a non-negative integer"))
}

fn required_bool(node: &KdlNode) -> Result<bool> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_bool())
        .ok_or_else(|| invalid_value(node, "expected #true or #false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.provider, "hetzner");
        assert!(config.gateway.nat_enabled);
        assert_eq!(config.gateway.nat_sku, "cx22");
        assert_eq!(config.activation.poll_interval, Duration::from_millis(500));
        assert_eq!(config.activation.timeout, Duration::from_secs(2));
        assert!(config.master_key.is_none());
    }

    #[test]
    fn test_full_config() {
        let kdl = r#"
listen "0.0.0.0:9000"
database "sqlite::memory:"
master-key "AAAA"

provider "hetzner" {
    endpoint "http://127.0.0.1:4000/v1"
    conformance #true
    catalog-ttl-secs 60
    locked-retry-attempts 3
    locked-retry-backoff-ms 250
}

gateway {
    nat-vm #false
    nat-sku "cax11"
    nat-architecture "arm"
}

activation {
    poll-interval-ms 100
    timeout-ms 1000
}
"#;
        let config = parse_config(kdl).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.database, "sqlite::memory:");
        assert_eq!(config.master_key.as_deref(), Some("AAAA"));
        assert_eq!(config.hetzner.endpoint, "http://127.0.0.1:4000/v1");
        assert!(config.hetzner.conformance_mode);
        assert_eq!(config.hetzner.catalog_ttl, Duration::from_secs(60));
        assert_eq!(config.hetzner.locked_retry_attempts, 3);
        assert_eq!(config.hetzner.locked_retry_backoff, Duration::from_millis(250));
        assert!(!config.gateway.nat_enabled);
        assert_eq!(config.gateway.nat_sku, "cax11");
        assert_eq!(config.gateway.nat_image, "ubuntu-24.04");
        assert_eq!(config.gateway.nat_architecture, Architecture::Arm);
        assert_eq!(config.activation.poll_interval, Duration::from_millis(100));
        assert_eq!(config.activation.timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_unsupported_provider() {
        let err = parse_config(r#"provider "aws""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(m) if m.contains("aws")));
    }

    #[test]
    fn test_type_errors() {
        assert!(parse_config("listen 8080").is_err());
        assert!(parse_config("activation {\n    timeout-ms \"soon\"\n}").is_err());
        assert!(parse_config("gateway {\n    nat-architecture \"riscv\"\n}").is_err());
        assert!(parse_config("activation {\n    poll-interval-ms 0\n}").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"listen "127.0.0.1:7070""#).unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.listen, "127.0.0.1:7070");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.kdl"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
