//! Hetzner Cloud provider for the SECA gateway
//!
//! This crate implements the `ComputeProvider` trait against the Hetzner
//! Cloud REST API.
//!
//! # Features
//!
//! - Server management (create, delete, power on/off/reboot)
//! - Volume management with attach/detach
//! - Private networks and server network membership sync
//! - Firewalls as security groups
//! - Conformance-mode placement fallbacks (see [`fallback`])
//!
//! # Example
//!
//! ```ignore
//! use secagw_cloud::{ComputeProvider, ProviderCredential};
//! use secagw_cloud_hetzner::{HetznerConfig, HetznerProvider};
//!
//! let provider = HetznerProvider::new(HetznerConfig::default());
//! let cred = ProviderCredential::new(token);
//!
//! let auth = provider.check_auth(Some(&cred)).await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//!
//! let servers = provider.list_instances(Some(&cred)).await?;
//! ```

pub mod api;
pub mod catalog;
pub mod client;
pub mod error;
pub mod fallback;
pub mod provider;

pub use client::{HETZNER_API_BASE, HetznerClient};
pub use error::{HETZNER_ERROR_CODES, api_error};
pub use provider::{HetznerConfig, HetznerProvider, PROVIDER_NAME};
