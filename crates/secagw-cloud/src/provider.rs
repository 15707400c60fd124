//! Cloud provider trait definition

use crate::action::{ActionRef, Applied};
use crate::credential::ProviderCredential;
use crate::error::Result;
use crate::model::{
    Image, Instance, InstanceRequest, Network, NetworkRequest, Region, SecurityGroup,
    SecurityGroupRequest, Sku, Volume, VolumeRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Compute provider abstraction
///
/// Exactly one adapter is wired at a time. Every operation receives the
/// credential explicitly; `None` means "use the adapter's default client",
/// which only makes sense for catalog calls that need no workspace.
///
/// Lookups are by provider-side *name*: the gateway names provider
/// resources after their declarative names, which is what makes
/// get-before-create idempotent.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Returns the provider name (e.g., "hetzner")
    fn name(&self) -> &str;

    /// Validate a credential against the provider
    async fn check_auth(&self, cred: Option<&ProviderCredential>) -> Result<AuthStatus>;

    // -- catalog --

    async fn list_regions(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Region>>;

    async fn list_skus(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Sku>>;

    async fn list_images(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Image>>;

    // -- instances --

    async fn list_instances(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Instance>>;

    async fn get_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Instance>>;

    async fn create_or_update_instance(
        &self,
        cred: Option<&ProviderCredential>,
        request: &InstanceRequest,
    ) -> Result<Applied<Instance>>;

    /// Delete an instance; `Ok(None)` when it did not exist
    async fn delete_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    /// Power on; `Ok(None)` when the start was accepted without a new action
    async fn start_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    async fn stop_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    async fn restart_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    // -- block storage --

    async fn list_volumes(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Volume>>;

    async fn get_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Volume>>;

    async fn create_or_update_volume(
        &self,
        cred: Option<&ProviderCredential>,
        request: &VolumeRequest,
    ) -> Result<Applied<Volume>>;

    async fn delete_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    async fn attach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
        instance: &str,
    ) -> Result<ActionRef>;

    async fn detach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
    ) -> Result<Option<ActionRef>>;

    // -- networks --

    async fn list_networks(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Network>>;

    async fn get_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Network>>;

    async fn create_or_update_network(
        &self,
        cred: Option<&ProviderCredential>,
        request: &NetworkRequest,
    ) -> Result<Applied<Network>>;

    async fn delete_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;

    async fn attach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef>;

    async fn detach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef>;

    /// Converge an instance's private network memberships to exactly `desired`
    ///
    /// Attaches missing networks and detaches extra ones; returns the actions
    /// started, empty when the instance already matches.
    async fn sync_instance_networks(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        desired: &[String],
    ) -> Result<Vec<ActionRef>>;

    // -- security groups --

    async fn list_security_groups(
        &self,
        cred: Option<&ProviderCredential>,
    ) -> Result<Vec<SecurityGroup>>;

    async fn get_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<SecurityGroup>>;

    async fn create_or_update_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        request: &SecurityGroupRequest,
    ) -> Result<Applied<SecurityGroup>>;

    async fn delete_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/project information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Split a desired network set against the current one
///
/// Returns `(to_attach, to_detach)`, each in the order of its source list.
pub fn network_diff(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let to_attach = desired
        .iter()
        .filter(|n| !current.contains(n))
        .cloned()
        .collect();
    let to_detach = current
        .iter()
        .filter(|n| !desired.contains(n))
        .cloned()
        .collect();
    (to_attach, to_detach)
}
