//! Hetzner Cloud provider implementation

use crate::api::{
    ActionResponse, ActionsResponse, ApiDatacenter, ApiFirewall, ApiFirewallRule, ApiImage,
    ApiLocation, ApiNetwork, ApiServer, ApiServerType, ApiVolume, AttachVolumeRequest,
    CreateFirewallRequest, CreateFirewallResponse, CreateNetworkRequest, CreateServerRequest,
    CreateServerResponse, CreateVolumeRequest, CreateVolumeResponse, FirewallResponse,
    LabelsUpdate, NetworkAttachRequest, NetworkResponse, PublicNetRequest, ResizeVolumeRequest,
    ServerResponse, SetRulesRequest, SubnetRequest, VolumeResponse,
};
use crate::catalog::CatalogCache;
use crate::client::{HETZNER_API_BASE, HetznerClient};
use crate::fallback;
use async_trait::async_trait;
use secagw_cloud::{
    ActionRef, Applied, Architecture, AuthStatus, CloudError, ComputeProvider, Image, Instance,
    InstanceRequest, Network, NetworkRequest, ProviderCredential, ProviderErrorKind, Region,
    Result, SecurityGroup, SecurityGroupRequest, Sku, Volume, VolumeRequest, network_diff,
};
use std::collections::HashMap;
use std::time::Duration;

/// Provider name reported through [`ComputeProvider::name`]
pub const PROVIDER_NAME: &str = "hetzner";

const ZONE_DEFAULT_NETWORK_PREFIX: &str = "seca-zone-default-";

/// Hetzner adapter configuration
#[derive(Debug, Clone)]
pub struct HetznerConfig {
    /// API endpoint used when a credential carries no override
    pub endpoint: String,

    /// Token for the default client (catalog calls without a workspace)
    pub default_token: Option<String>,

    /// Enables the placement-altering heuristics in [`crate::fallback`]
    pub conformance_mode: bool,

    pub catalog_ttl: Duration,

    /// Power-on attempts while the provider reports the server as locked
    pub locked_retry_attempts: u32,

    pub locked_retry_backoff: Duration,

    /// Network zone used for networks created without one
    pub default_network_zone: String,

    /// Range for zone-default private networks
    pub zone_default_ip_range: String,
}

impl Default for HetznerConfig {
    fn default() -> Self {
        Self {
            endpoint: HETZNER_API_BASE.to_string(),
            default_token: None,
            conformance_mode: false,
            catalog_ttl: Duration::from_secs(300),
            locked_retry_attempts: 5,
            locked_retry_backoff: Duration::from_secs(2),
            default_network_zone: "eu-central".to_string(),
            zone_default_ip_range: "10.254.0.0/16".to_string(),
        }
    }
}

/// Hetzner Cloud provider
pub struct HetznerProvider {
    http: reqwest::Client,
    config: HetznerConfig,
    default_client: Option<HetznerClient>,
    server_types: CatalogCache<ApiServerType>,
    datacenters: CatalogCache<ApiDatacenter>,
}

impl HetznerProvider {
    pub fn new(config: HetznerConfig) -> Self {
        let http = reqwest::Client::new();
        let default_client = config
            .default_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|token| HetznerClient::new(http.clone(), &config.endpoint, token));

        if config.conformance_mode {
            tracing::warn!(
                "Hetzner conformance mode enabled: placement fallbacks may change region or SKU"
            );
        }

        Self {
            server_types: CatalogCache::new(config.catalog_ttl),
            datacenters: CatalogCache::new(config.catalog_ttl),
            http,
            config,
            default_client,
        }
    }

    pub fn config(&self) -> &HetznerConfig {
        &self.config
    }

    /// Build the client for one call
    fn client(&self, cred: Option<&ProviderCredential>) -> Result<HetznerClient> {
        match cred {
            Some(cred) => {
                let endpoint = cred.endpoint.as_deref().unwrap_or(&self.config.endpoint);
                Ok(HetznerClient::new(self.http.clone(), endpoint, &cred.token))
            }
            None => self.default_client.clone().ok_or_else(|| {
                CloudError::NotConfigured(
                    "no credential supplied and no default Hetzner token configured".to_string(),
                )
            }),
        }
    }

    // ============ Catalog ============

    async fn server_types(&self, client: &HetznerClient) -> Result<Vec<ApiServerType>> {
        if let Some(cached) = self.server_types.fresh() {
            return Ok(cached);
        }
        let types: Vec<ApiServerType> = client.list_all("/server_types", "server_types", &[]).await?;
        self.server_types.store(types.clone());
        Ok(types)
    }

    async fn datacenters(&self, client: &HetznerClient) -> Result<Vec<ApiDatacenter>> {
        if let Some(cached) = self.datacenters.fresh() {
            return Ok(cached);
        }
        let dcs: Vec<ApiDatacenter> = client.list_all("/datacenters", "datacenters", &[]).await?;
        self.datacenters.store(dcs.clone());
        Ok(dcs)
    }

    /// Names of the server types currently orderable in a location
    async fn available_sku_names(&self, client: &HetznerClient, region: &str) -> Result<Vec<String>> {
        let types = self.server_types(client).await?;
        let dcs = self.datacenters(client).await?;

        let mut names: Vec<String> = dcs
            .iter()
            .filter(|dc| dc.location.name == region)
            .flat_map(|dc| dc.server_types.available.iter())
            .filter_map(|id| types.iter().find(|t| t.id == *id).map(|t| t.name.clone()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// PLACEMENT-ALTERING: swap the SKU for the cheapest available one
    async fn placeable_sku(
        &self,
        client: &HetznerClient,
        requested: &str,
        region: &str,
        architecture: Architecture,
    ) -> Result<String> {
        let available = self.available_sku_names(client, region).await?;
        if available.iter().any(|s| s == requested) {
            return Ok(requested.to_string());
        }

        let skus: Vec<Sku> = self
            .server_types(client)
            .await?
            .iter()
            .map(ApiServerType::to_sku)
            .collect();
        let architecture = skus
            .iter()
            .find(|s| s.name == requested)
            .map(|s| s.architecture)
            .unwrap_or(architecture);

        match fallback::cheapest_available_sku(&skus, &available, architecture) {
            Some(substitute) => {
                tracing::warn!(
                    requested,
                    substitute = %substitute.name,
                    region,
                    "SKU unavailable in region, substituting cheapest available SKU"
                );
                Ok(substitute.name.clone())
            }
            None => Ok(requested.to_string()),
        }
    }

    async fn resolve_image(
        &self,
        client: &HetznerClient,
        name: &str,
        architecture: Architecture,
    ) -> Result<String> {
        if !self.config.conformance_mode {
            return Ok(name.to_string());
        }

        let images = self.system_images(client, Some(architecture)).await?;
        match fallback::select_image(&images, name, architecture) {
            Some(image) if image.name == name => Ok(image.name.clone()),
            Some(image) => {
                tracing::warn!(
                    requested = name,
                    substitute = %image.name,
                    %architecture,
                    "image not found for architecture, using fallback system image"
                );
                Ok(image.id.clone())
            }
            None => Ok(name.to_string()),
        }
    }

    async fn system_images(
        &self,
        client: &HetznerClient,
        architecture: Option<Architecture>,
    ) -> Result<Vec<Image>> {
        let mut query = vec![("type", "system".to_string())];
        if let Some(arch) = architecture {
            query.push(("architecture", arch.as_str().to_string()));
        }
        let images: Vec<ApiImage> = client.list_all("/images", "images", &query).await?;
        Ok(images.iter().filter_map(ApiImage::to_image).collect())
    }

    // ============ Lookups ============

    async fn find_server(&self, client: &HetznerClient, name: &str) -> Result<Option<ApiServer>> {
        let servers: Vec<ApiServer> = client
            .list_all("/servers", "servers", &[("name", name.to_string())])
            .await?;
        Ok(servers.into_iter().find(|s| s.name == name))
    }

    async fn require_server(&self, client: &HetznerClient, name: &str) -> Result<ApiServer> {
        self.find_server(client, name).await?.ok_or_else(|| not_found("server", name))
    }

    async fn find_network(&self, client: &HetznerClient, name: &str) -> Result<Option<ApiNetwork>> {
        let networks: Vec<ApiNetwork> = client
            .list_all("/networks", "networks", &[("name", name.to_string())])
            .await?;
        Ok(networks.into_iter().find(|n| n.name == name))
    }

    async fn require_network(&self, client: &HetznerClient, name: &str) -> Result<ApiNetwork> {
        self.find_network(client, name).await?.ok_or_else(|| not_found("network", name))
    }

    async fn network_names(&self, client: &HetznerClient) -> Result<HashMap<u64, String>> {
        let networks: Vec<ApiNetwork> = client.list_all("/networks", "networks", &[]).await?;
        Ok(networks.into_iter().map(|n| (n.id, n.name)).collect())
    }

    async fn find_volume(&self, client: &HetznerClient, name: &str) -> Result<Option<ApiVolume>> {
        let volumes: Vec<ApiVolume> = client
            .list_all("/volumes", "volumes", &[("name", name.to_string())])
            .await?;
        Ok(volumes.into_iter().find(|v| v.name == name))
    }

    async fn find_firewall(&self, client: &HetznerClient, name: &str) -> Result<Option<ApiFirewall>> {
        let firewalls: Vec<ApiFirewall> = client
            .list_all("/firewalls", "firewalls", &[("name", name.to_string())])
            .await?;
        Ok(firewalls.into_iter().find(|f| f.name == name))
    }

    async fn server_name_by_id(&self, client: &HetznerClient, id: u64) -> Result<Option<String>> {
        match client
            .get::<ServerResponse>(&format!("/servers/{}", id), &[])
            .await
        {
            Ok(resp) => Ok(Some(resp.server.name)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn to_volume(&self, client: &HetznerClient, volume: &ApiVolume) -> Result<Volume> {
        let attached_to = match volume.server {
            Some(id) => self.server_name_by_id(client, id).await?,
            None => None,
        };
        Ok(volume.to_volume(attached_to))
    }

    // ============ Instance helpers ============

    async fn create_server(
        &self,
        client: &HetznerClient,
        request: &InstanceRequest,
    ) -> Result<Applied<Instance>> {
        let image = self
            .resolve_image(client, &request.image, request.architecture)
            .await?;

        let mut sku = request.sku.clone();
        if self.config.conformance_mode {
            if let Some(region) = request.region.as_deref() {
                sku = self
                    .placeable_sku(client, &sku, region, request.architecture)
                    .await?;
            }
        }

        let mut network_ids = Vec::with_capacity(request.networks.len());
        for name in &request.networks {
            network_ids.push(self.require_network(client, name).await?.id);
        }

        let mut body = CreateServerRequest {
            name: request.name.clone(),
            server_type: sku,
            image,
            location: request.region.clone(),
            user_data: request.user_data.clone(),
            networks: network_ids,
            labels: request.labels.clone(),
            start_after_create: true,
            public_net: PublicNetRequest {
                enable_ipv4: true,
                enable_ipv6: true,
            },
        };

        tracing::info!(
            "Creating server {} ({} in {})",
            body.name,
            body.server_type,
            body.location.as_deref().unwrap_or("any location")
        );

        let created: CreateServerResponse = match client.post("/servers", &body).await {
            Ok(resp) => resp,
            Err(e)
                if self.config.conformance_mode
                    && body.location.is_some()
                    && fallback::is_placement_error(&e) =>
            {
                // PLACEMENT-ALTERING: let the provider pick the location
                tracing::warn!(
                    server = %body.name,
                    location = ?body.location,
                    error = %e,
                    "placement failed, retrying without a location constraint"
                );
                body.location = None;
                client.post("/servers", &body).await?
            }
            Err(e) => return Err(e),
        };

        let names = self.network_names(client).await?;
        let mut actions: Vec<ActionRef> = created.action.into_iter().map(Into::into).collect();
        actions.extend(created.next_actions.into_iter().map(ActionRef::from));
        Ok(Applied::created(created.server.to_instance(&names), actions))
    }

    /// Attach the zone-default private network, creating it on first use
    async fn attach_zone_default_network(
        &self,
        client: &HetznerClient,
        server: &ApiServer,
    ) -> Result<ActionRef> {
        let zone = &server.datacenter.location.network_zone;
        let name = format!("{}{}", ZONE_DEFAULT_NETWORK_PREFIX, zone);

        let network = match self.find_network(client, &name).await? {
            Some(network) => network,
            None => {
                tracing::info!("Creating zone-default network {}", name);
                self.post_network(client, &name, &self.config.zone_default_ip_range, zone, Default::default())
                    .await?
            }
        };

        tracing::warn!(
            server = %server.name,
            network = %name,
            "server has no network interfaces, attaching zone-default network"
        );
        let resp: ActionResponse = client
            .post(
                &format!("/servers/{}/actions/attach_to_network", server.id),
                &NetworkAttachRequest { network: network.id },
            )
            .await?;
        Ok(resp.action.into())
    }

    async fn power_action(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
        command: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let server = self.require_server(&client, name).await?;
        let resp: ActionResponse = client
            .post_empty(&format!("/servers/{}/actions/{}", server.id, command))
            .await?;
        tracing::info!("Server {}: {} accepted (action {})", name, command, resp.action.id);
        Ok(Some(resp.action.into()))
    }

    async fn post_network(
        &self,
        client: &HetznerClient,
        name: &str,
        ip_range: &str,
        zone: &str,
        labels: secagw_cloud::Labels,
    ) -> Result<ApiNetwork> {
        let body = CreateNetworkRequest {
            name: name.to_string(),
            ip_range: ip_range.to_string(),
            subnets: vec![SubnetRequest {
                kind: "cloud".to_string(),
                network_zone: zone.to_string(),
                ip_range: ip_range.to_string(),
            }],
            labels,
        };
        let resp: NetworkResponse = client.post("/networks", &body).await?;
        Ok(resp.network)
    }

    async fn post_volume(
        &self,
        client: &HetznerClient,
        body: &CreateVolumeRequest,
    ) -> Result<CreateVolumeResponse> {
        tracing::info!(
            "Creating volume {} ({} GB in {})",
            body.name,
            body.size,
            body.location.as_deref().unwrap_or("server location")
        );
        client.post("/volumes", body).await
    }
}

fn not_found(kind: &str, name: &str) -> CloudError {
    CloudError::provider(
        ProviderErrorKind::NotFound,
        "not_found",
        format!("{} '{}' not found", kind, name),
    )
}

/// Treat a provider "not found" as absence
fn absent_ok<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ComputeProvider for HetznerProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn check_auth(&self, cred: Option<&ProviderCredential>) -> Result<AuthStatus> {
        let client = self.client(cred)?;
        let probe: Result<serde_json::Value> =
            client.get("/locations", &[("per_page", "1".to_string())]).await;

        match probe {
            Ok(_) => {
                let info = cred
                    .and_then(|c| c.project.clone())
                    .unwrap_or_else(|| "Hetzner Cloud project".to_string());
                Ok(AuthStatus::ok(info))
            }
            Err(e) if e.kind() == Some(ProviderErrorKind::Unauthorized) => {
                Ok(AuthStatus::failed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn list_regions(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Region>> {
        let client = self.client(cred)?;
        let locations: Vec<ApiLocation> = client.list_all("/locations", "locations", &[]).await?;
        Ok(locations.into_iter().map(Region::from).collect())
    }

    async fn list_skus(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Sku>> {
        let client = self.client(cred)?;
        let types = self.server_types(&client).await?;
        Ok(types.iter().map(ApiServerType::to_sku).collect())
    }

    async fn list_images(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Image>> {
        let client = self.client(cred)?;
        self.system_images(&client, None).await
    }

    async fn list_instances(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Instance>> {
        let client = self.client(cred)?;
        let servers: Vec<ApiServer> = client.list_all("/servers", "servers", &[]).await?;
        let names = self.network_names(&client).await?;
        Ok(servers.iter().map(|s| s.to_instance(&names)).collect())
    }

    async fn get_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Instance>> {
        let client = self.client(cred)?;
        match self.find_server(&client, name).await? {
            Some(server) => {
                let names = self.network_names(&client).await?;
                Ok(Some(server.to_instance(&names)))
            }
            None => Ok(None),
        }
    }

    async fn create_or_update_instance(
        &self,
        cred: Option<&ProviderCredential>,
        request: &InstanceRequest,
    ) -> Result<Applied<Instance>> {
        let client = self.client(cred)?;

        let Some(mut server) = self.find_server(&client, &request.name).await? else {
            return self.create_server(&client, request).await;
        };

        if server.labels != request.labels {
            let resp: ServerResponse = client
                .put(
                    &format!("/servers/{}", server.id),
                    &LabelsUpdate {
                        labels: &request.labels,
                    },
                )
                .await?;
            server = resp.server;
        }
        if server.server_type.name != request.sku {
            tracing::debug!(
                "Server {} runs {}, requested {}; SKU changes are not applied in place",
                server.name,
                server.server_type.name,
                request.sku
            );
        }

        let names = self.network_names(&client).await?;
        Ok(Applied::updated(server.to_instance(&names), Vec::new()))
    }

    async fn delete_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let Some(server) = self.find_server(&client, name).await? else {
            tracing::debug!("Server {} not found, nothing to delete", name);
            return Ok(None);
        };

        tracing::info!("Deleting server {}", name);
        let resp = absent_ok(
            client
                .delete::<ActionResponse>(&format!("/servers/{}", server.id))
                .await,
        )?;
        Ok(resp.map(|r| r.action.into()))
    }

    async fn start_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let server = self.require_server(&client, name).await?;
        let path = format!("/servers/{}/actions/poweron", server.id);

        let mut locked_attempts = 0u32;
        let mut attached_default_network = false;

        loop {
            let err = match client.post_empty::<ActionResponse>(&path).await {
                Ok(resp) => {
                    tracing::info!("Server {}: poweron accepted (action {})", name, resp.action.id);
                    return Ok(Some(resp.action.into()));
                }
                Err(e) => e,
            };

            if !self.config.conformance_mode {
                return Err(err);
            }

            if fallback::is_missing_network(&err) && !attached_default_network {
                self.attach_zone_default_network(&client, &server).await?;
                attached_default_network = true;
                continue;
            }

            if !fallback::is_locked(&err) {
                return Err(err);
            }

            locked_attempts += 1;
            if locked_attempts >= self.config.locked_retry_attempts {
                // The server may have been started by whatever held the lock
                if let Some(current) = self.find_server(&client, name).await? {
                    if current.power_state().is_up_or_coming_up() {
                        tracing::info!(
                            "Server {} is already {}, treating poweron as accepted",
                            name,
                            current.power_state()
                        );
                        return Ok(None);
                    }
                }
                return Err(err);
            }

            tracing::warn!(
                server = name,
                attempt = locked_attempts,
                "server locked, retrying poweron"
            );
            tokio::time::sleep(self.config.locked_retry_backoff).await;
        }
    }

    async fn stop_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        self.power_action(cred, name, "poweroff").await
    }

    async fn restart_instance(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        self.power_action(cred, name, "reboot").await
    }

    async fn list_volumes(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Volume>> {
        let client = self.client(cred)?;
        let volumes: Vec<ApiVolume> = client.list_all("/volumes", "volumes", &[]).await?;
        let servers: Vec<ApiServer> = client.list_all("/servers", "servers", &[]).await?;
        let server_names: HashMap<u64, String> =
            servers.into_iter().map(|s| (s.id, s.name)).collect();
        Ok(volumes
            .iter()
            .map(|v| v.to_volume(v.server.and_then(|id| server_names.get(&id).cloned())))
            .collect())
    }

    async fn get_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Volume>> {
        let client = self.client(cred)?;
        match self.find_volume(&client, name).await? {
            Some(volume) => Ok(Some(self.to_volume(&client, &volume).await?)),
            None => Ok(None),
        }
    }

    async fn create_or_update_volume(
        &self,
        cred: Option<&ProviderCredential>,
        request: &VolumeRequest,
    ) -> Result<Applied<Volume>> {
        let client = self.client(cred)?;

        if let Some(mut volume) = self.find_volume(&client, &request.name).await? {
            let mut actions = Vec::new();
            if request.size_gb > volume.size {
                let resp: ActionResponse = client
                    .post(
                        &format!("/volumes/{}/actions/resize", volume.id),
                        &ResizeVolumeRequest {
                            size: request.size_gb,
                        },
                    )
                    .await?;
                actions.push(resp.action.into());
                volume.size = request.size_gb;
            }
            if volume.labels != request.labels {
                let resp: VolumeResponse = client
                    .put(
                        &format!("/volumes/{}", volume.id),
                        &LabelsUpdate {
                            labels: &request.labels,
                        },
                    )
                    .await?;
                volume = resp.volume;
            }
            let volume = self.to_volume(&client, &volume).await?;
            return Ok(Applied::updated(volume, actions));
        }

        let mut body = CreateVolumeRequest {
            name: request.name.clone(),
            size: request.size_gb,
            location: None,
            server: None,
            automount: false,
            format: "ext4".to_string(),
            labels: request.labels.clone(),
        };

        let created = if let Some(instance) = request.attach_to.as_deref() {
            // attached volumes are placed next to their server
            body.server = Some(self.require_server(&client, instance).await?.id);
            self.post_volume(&client, &body).await?
        } else {
            let regions = self.list_regions(cred).await?;
            let mut candidates: Vec<String> = request.region.iter().cloned().collect();
            if self.config.conformance_mode || candidates.is_empty() {
                for region in regions {
                    if !candidates.contains(&region.name) {
                        candidates.push(region.name);
                    }
                }
            }

            let mut last_err = None;
            let mut created = None;
            for region in candidates {
                body.location = Some(region.clone());
                match self.post_volume(&client, &body).await {
                    Ok(resp) => {
                        if request.region.as_deref().is_some_and(|r| r != region) {
                            tracing::warn!(
                                volume = %body.name,
                                requested = ?request.region,
                                placed = %region,
                                "volume placed outside the requested region"
                            );
                        }
                        created = Some(resp);
                        break;
                    }
                    // PLACEMENT-ALTERING: walk the remaining regions
                    Err(e) if self.config.conformance_mode && fallback::is_placement_error(&e) => {
                        tracing::warn!(region = %region, error = %e, "volume placement failed");
                        last_err = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            match created {
                Some(resp) => resp,
                None => {
                    return Err(last_err.unwrap_or_else(|| {
                        CloudError::provider(
                            ProviderErrorKind::Unavailable,
                            "no_location",
                            "no location available for volume",
                        )
                    }));
                }
            }
        };

        let mut actions: Vec<ActionRef> = created.action.into_iter().map(Into::into).collect();
        actions.extend(created.next_actions.into_iter().map(ActionRef::from));
        let volume = self.to_volume(&client, &created.volume).await?;
        Ok(Applied::created(volume, actions))
    }

    async fn delete_volume(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let Some(volume) = self.find_volume(&client, name).await? else {
            return Ok(None);
        };

        let mut detach = None;
        if volume.server.is_some() {
            let resp: ActionResponse = client
                .post_empty(&format!("/volumes/{}/actions/detach", volume.id))
                .await?;
            detach = Some(resp.action.into());
        }

        tracing::info!("Deleting volume {}", name);
        absent_ok(client.delete::<()>(&format!("/volumes/{}", volume.id)).await)?;
        Ok(detach)
    }

    async fn attach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
        instance: &str,
    ) -> Result<ActionRef> {
        let client = self.client(cred)?;
        let api_volume = self
            .find_volume(&client, volume)
            .await?
            .ok_or_else(|| not_found("volume", volume))?;
        let server = self.require_server(&client, instance).await?;

        let resp: ActionResponse = client
            .post(
                &format!("/volumes/{}/actions/attach", api_volume.id),
                &AttachVolumeRequest {
                    server: server.id,
                    automount: false,
                },
            )
            .await?;
        Ok(resp.action.into())
    }

    async fn detach_volume(
        &self,
        cred: Option<&ProviderCredential>,
        volume: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let api_volume = self
            .find_volume(&client, volume)
            .await?
            .ok_or_else(|| not_found("volume", volume))?;
        if api_volume.server.is_none() {
            return Ok(None);
        }
        let resp: ActionResponse = client
            .post_empty(&format!("/volumes/{}/actions/detach", api_volume.id))
            .await?;
        Ok(Some(resp.action.into()))
    }

    async fn list_networks(&self, cred: Option<&ProviderCredential>) -> Result<Vec<Network>> {
        let client = self.client(cred)?;
        let networks: Vec<ApiNetwork> = client.list_all("/networks", "networks", &[]).await?;
        Ok(networks.into_iter().map(Network::from).collect())
    }

    async fn get_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<Network>> {
        let client = self.client(cred)?;
        Ok(self.find_network(&client, name).await?.map(Network::from))
    }

    async fn create_or_update_network(
        &self,
        cred: Option<&ProviderCredential>,
        request: &NetworkRequest,
    ) -> Result<Applied<Network>> {
        let client = self.client(cred)?;

        if let Some(network) = self.find_network(&client, &request.name).await? {
            if network.ip_range != request.ip_range {
                tracing::debug!(
                    "Network {} keeps range {} (requested {}); ranges are immutable",
                    network.name,
                    network.ip_range,
                    request.ip_range
                );
            }
            if network.labels == request.labels {
                return Ok(Applied::updated(network.into(), Vec::new()));
            }
            let resp: NetworkResponse = client
                .put(
                    &format!("/networks/{}", network.id),
                    &LabelsUpdate {
                        labels: &request.labels,
                    },
                )
                .await?;
            return Ok(Applied::updated(resp.network.into(), Vec::new()));
        }

        let zone = request
            .network_zone
            .as_deref()
            .unwrap_or(&self.config.default_network_zone);
        tracing::info!("Creating network {} ({})", request.name, request.ip_range);
        let network = self
            .post_network(&client, &request.name, &request.ip_range, zone, request.labels.clone())
            .await?;
        Ok(Applied::created(network.into(), Vec::new()))
    }

    async fn delete_network(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let Some(network) = self.find_network(&client, name).await? else {
            return Ok(None);
        };
        tracing::info!("Deleting network {}", name);
        absent_ok(client.delete::<()>(&format!("/networks/{}", network.id)).await)?;
        Ok(None)
    }

    async fn attach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef> {
        let client = self.client(cred)?;
        let server = self.require_server(&client, instance).await?;
        let network = self.require_network(&client, network).await?;
        let resp: ActionResponse = client
            .post(
                &format!("/servers/{}/actions/attach_to_network", server.id),
                &NetworkAttachRequest { network: network.id },
            )
            .await?;
        Ok(resp.action.into())
    }

    async fn detach_instance_network(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        network: &str,
    ) -> Result<ActionRef> {
        let client = self.client(cred)?;
        let server = self.require_server(&client, instance).await?;
        let network = self.require_network(&client, network).await?;
        let resp: ActionResponse = client
            .post(
                &format!("/servers/{}/actions/detach_from_network", server.id),
                &NetworkAttachRequest { network: network.id },
            )
            .await?;
        Ok(resp.action.into())
    }

    async fn sync_instance_networks(
        &self,
        cred: Option<&ProviderCredential>,
        instance: &str,
        desired: &[String],
    ) -> Result<Vec<ActionRef>> {
        let client = self.client(cred)?;
        let server = self.require_server(&client, instance).await?;
        let names = self.network_names(&client).await?;
        let current = server.to_instance(&names).networks;

        let (to_attach, to_detach) = network_diff(&current, desired);
        if to_attach.is_empty() && to_detach.is_empty() {
            tracing::debug!("Server {} networks already in sync", instance);
            return Ok(Vec::new());
        }

        let ids: HashMap<&str, u64> = names.iter().map(|(id, n)| (n.as_str(), *id)).collect();
        let mut actions = Vec::new();

        for network in &to_attach {
            let id = ids
                .get(network.as_str())
                .copied()
                .ok_or_else(|| not_found("network", network))?;
            tracing::info!("Attaching server {} to network {}", instance, network);
            let resp: ActionResponse = client
                .post(
                    &format!("/servers/{}/actions/attach_to_network", server.id),
                    &NetworkAttachRequest { network: id },
                )
                .await?;
            actions.push(resp.action.into());
        }

        for network in &to_detach {
            // present in `current`, so the id is known
            if let Some(id) = ids.get(network.as_str()).copied() {
                tracing::info!("Detaching server {} from network {}", instance, network);
                let resp: ActionResponse = client
                    .post(
                        &format!("/servers/{}/actions/detach_from_network", server.id),
                        &NetworkAttachRequest { network: id },
                    )
                    .await?;
                actions.push(resp.action.into());
            }
        }

        Ok(actions)
    }

    async fn list_security_groups(
        &self,
        cred: Option<&ProviderCredential>,
    ) -> Result<Vec<SecurityGroup>> {
        let client = self.client(cred)?;
        let firewalls: Vec<ApiFirewall> = client.list_all("/firewalls", "firewalls", &[]).await?;
        Ok(firewalls.into_iter().map(SecurityGroup::from).collect())
    }

    async fn get_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<SecurityGroup>> {
        let client = self.client(cred)?;
        Ok(self.find_firewall(&client, name).await?.map(SecurityGroup::from))
    }

    async fn create_or_update_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        request: &SecurityGroupRequest,
    ) -> Result<Applied<SecurityGroup>> {
        let client = self.client(cred)?;
        let rules: Vec<ApiFirewallRule> = request.rules.iter().map(ApiFirewallRule::from).collect();

        if let Some(mut firewall) = self.find_firewall(&client, &request.name).await? {
            let resp: ActionsResponse = client
                .post(
                    &format!("/firewalls/{}/actions/set_rules", firewall.id),
                    &SetRulesRequest { rules },
                )
                .await?;
            if firewall.labels != request.labels {
                let updated: FirewallResponse = client
                    .put(
                        &format!("/firewalls/{}", firewall.id),
                        &LabelsUpdate {
                            labels: &request.labels,
                        },
                    )
                    .await?;
                firewall = updated.firewall;
            }
            let mut group = SecurityGroup::from(firewall);
            group.rules = request.rules.clone();
            let actions = resp.actions.into_iter().map(ActionRef::from).collect();
            return Ok(Applied::updated(group, actions));
        }

        tracing::info!("Creating firewall {}", request.name);
        let resp: CreateFirewallResponse = client
            .post(
                "/firewalls",
                &CreateFirewallRequest {
                    name: request.name.clone(),
                    rules,
                    labels: request.labels.clone(),
                },
            )
            .await?;
        let actions = resp.actions.into_iter().map(ActionRef::from).collect();
        Ok(Applied::created(resp.firewall.into(), actions))
    }

    async fn delete_security_group(
        &self,
        cred: Option<&ProviderCredential>,
        name: &str,
    ) -> Result<Option<ActionRef>> {
        let client = self.client(cred)?;
        let Some(firewall) = self.find_firewall(&client, name).await? else {
            return Ok(None);
        };
        tracing::info!("Deleting firewall {}", name);
        absent_ok(client.delete::<()>(&format!("/firewalls/{}", firewall.id)).await)?;
        Ok(None)
    }
}
