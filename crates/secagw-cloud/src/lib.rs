//! SECA Gateway provider contract
//!
//! This crate defines the provider abstraction the gateway core talks to.
//! The gateway exposes a vendor-neutral resource API and executes every
//! operation against exactly one concrete provider through this contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                     secagwd                     │
//! │                 (HTTP routing)                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  secagw-core                    │
//! │  activation gate · vault · bindings · reconciler│
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  secagw-cloud                   │
//! │  trait ComputeProvider { ... }                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │    hetzner    │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod action;
pub mod credential;
pub mod error;
pub mod model;
pub mod provider;

// Re-exports
pub use action::{ActionRef, Applied};
pub use credential::ProviderCredential;
pub use error::{CloudError, ErrorCodeTable, ProviderErrorKind, Result, classify};
pub use model::{
    Architecture, Direction, Image, Instance, InstanceRequest, Labels, Network, NetworkRequest,
    PowerState, Region, SecurityGroup, SecurityGroupRequest, SecurityRule, Sku, Volume,
    VolumeRequest,
};
pub use provider::{AuthStatus, ComputeProvider, network_diff};
