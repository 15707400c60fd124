//! SECA gateway reconciliation core
//!
//! Translates the vendor-neutral declarative resource model into calls on a
//! single [`secagw_cloud::ComputeProvider`]:
//!
//! - [`store`]: resource bindings, workspaces, credentials and the operation log
//! - [`vault`]: AES-256-GCM encryption of provider tokens at rest
//! - [`gate`]: workspace activation gate and per-request provider credential
//! - [`reconciler`]: keeps internet-gateway NAT instances in line with route tables
//! - [`service`]: the resource handlers the HTTP layer calls

pub mod cloud_init;
pub mod error;
pub mod gate;
pub mod model;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod vault;

pub use error::{GatewayError, PROBLEM_TYPE_BASE, Problem, Result};
pub use gate::{ActivationGate, GateConfig, ProviderCall};
pub use reconciler::{GatewayConfig, PendingTable, Reconciler};
pub use service::{CredentialRequest, GatewayService, WorkspaceRequest};
pub use store::{SqlStore, Store};
pub use vault::{CredentialVault, VaultError};
