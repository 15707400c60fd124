//! HTTP routing
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/healthz` | Store liveness |
//! | GET | `/v1/regions`, `/v1/skus`, `/v1/images` | Provider catalog |
//! | GET | `/v1/tenants/{tenant}/workspaces` | List workspaces |
//! | GET, PUT, DELETE | `/v1/tenants/{tenant}/workspaces/{workspace}` | Workspace |
//! | PUT, DELETE | `.../workspaces/{workspace}/credentials` | Bind / unbind provider token |
//! | GET | `.../workspaces/{workspace}/<kind>` | List resources |
//! | GET, PUT, DELETE | `.../workspaces/{workspace}/<kind>/{name}` | Resource |
//! | POST | `.../instances/{name}/start\|stop\|restart` | Power actions |
//! | GET, PUT, DELETE | `.../networks/{name}/subnets/{subnet}` | Subnet |
//! | GET, PUT, DELETE | `.../networks/{name}/route-tables/{table}` | Route table |
//!
//! `<kind>` is one of `instances`, `block-storages`, `networks`,
//! `security-groups`, `nics`, `public-ips`, `internet-gateways`.

use crate::problem::{ApiError, AtPath, json_body};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use secagw_core::model::{
    BlockStorageSpec, InstanceSpec, InternetGatewaySpec, NetworkSpec, NicSpec, PublicIpSpec,
    ResourceRequest, ResourceView, RouteTableSpec, SecurityGroupSpec, SubnetSpec, Workspace,
};
use secagw_core::{CredentialRequest, GatewayService, WorkspaceRequest};
use std::sync::Arc;

const WORKSPACE_PATH: &str = "/v1/tenants/{tenant}/workspaces/{workspace}";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GatewayService>,
}

type ApiResult<T> = Result<T, ApiError>;

fn scoped(suffix: &str) -> String {
    format!("{}/{}", WORKSPACE_PATH, suffix)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/regions", get(list_regions))
        .route("/v1/skus", get(list_skus))
        .route("/v1/images", get(list_images))
        .route("/v1/tenants/{tenant}/workspaces", get(list_workspaces))
        .route(
            WORKSPACE_PATH,
            get(get_workspace).put(put_workspace).delete(delete_workspace),
        )
        .route(
            &scoped("credentials"),
            put(bind_credential).delete(unbind_credential),
        )
        // compute
        .route(&scoped("instances"), get(instances::list))
        .route(
            &scoped("instances/{name}"),
            get(instances::get).put(instances::put).delete(instances::delete),
        )
        .route(&scoped("instances/{name}/start"), post(start_instance))
        .route(&scoped("instances/{name}/stop"), post(stop_instance))
        .route(&scoped("instances/{name}/restart"), post(restart_instance))
        .route(&scoped("block-storages"), get(block_storages::list))
        .route(
            &scoped("block-storages/{name}"),
            get(block_storages::get)
                .put(block_storages::put)
                .delete(block_storages::delete),
        )
        // network
        .route(&scoped("networks"), get(networks::list))
        .route(
            &scoped("networks/{name}"),
            get(networks::get).put(networks::put).delete(networks::delete),
        )
        .route(&scoped("networks/{name}/subnets"), get(list_subnets))
        .route(
            &scoped("networks/{name}/subnets/{subnet}"),
            get(get_subnet).put(put_subnet).delete(delete_subnet),
        )
        .route(&scoped("networks/{name}/route-tables"), get(list_route_tables))
        .route(
            &scoped("networks/{name}/route-tables/{table}"),
            get(get_route_table)
                .put(put_route_table)
                .delete(delete_route_table),
        )
        .route(&scoped("security-groups"), get(security_groups::list))
        .route(
            &scoped("security-groups/{name}"),
            get(security_groups::get)
                .put(security_groups::put)
                .delete(security_groups::delete),
        )
        .route(&scoped("nics"), get(nics::list))
        .route(
            &scoped("nics/{name}"),
            get(nics::get).put(nics::put).delete(nics::delete),
        )
        .route(&scoped("public-ips"), get(public_ips::list))
        .route(
            &scoped("public-ips/{name}"),
            get(public_ips::get).put(public_ips::put).delete(public_ips::delete),
        )
        .route(&scoped("internet-gateways"), get(internet_gateways::list))
        .route(
            &scoped("internet-gateways/{name}"),
            get(internet_gateways::get)
                .put(internet_gateways::put)
                .delete(internet_gateways::delete),
        )
        .with_state(state)
}

// ============ Health & catalog ============

async fn healthz(State(state): State<AppState>, uri: Uri) -> ApiResult<impl IntoResponse> {
    state.service.ping().await.at(&uri)?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "provider": state.service.provider_name(),
    })))
}

async fn list_regions(State(state): State<AppState>, uri: Uri) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.list_regions().await.at(&uri)?))
}

async fn list_skus(State(state): State<AppState>, uri: Uri) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.list_skus().await.at(&uri)?))
}

async fn list_images(State(state): State<AppState>, uri: Uri) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.list_images().await.at(&uri)?))
}

// ============ Workspaces ============

async fn list_workspaces(
    State(state): State<AppState>,
    uri: Uri,
    Path(tenant): Path<String>,
) -> ApiResult<Json<Vec<Workspace>>> {
    Ok(Json(state.service.list_workspaces(&tenant).await.at(&uri)?))
}

async fn get_workspace(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace)): Path<(String, String)>,
) -> ApiResult<Json<Workspace>> {
    Ok(Json(
        state
            .service
            .get_workspace(&tenant, &workspace)
            .await
            .at(&uri)?,
    ))
}

async fn put_workspace(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace)): Path<(String, String)>,
    body: Result<Json<WorkspaceRequest>, JsonRejection>,
) -> ApiResult<Json<Workspace>> {
    let request = json_body(body, &uri)?;
    Ok(Json(
        state
            .service
            .put_workspace(&tenant, &workspace, request)
            .await
            .at(&uri)?,
    ))
}

async fn delete_workspace(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_workspace(&tenant, &workspace)
        .await
        .at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bind_credential(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace)): Path<(String, String)>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> ApiResult<Json<Workspace>> {
    let request = json_body(body, &uri)?;
    Ok(Json(
        state
            .service
            .bind_credential(&tenant, &workspace, request)
            .await
            .at(&uri)?,
    ))
}

async fn unbind_credential(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace)): Path<(String, String)>,
) -> ApiResult<Json<Workspace>> {
    Ok(Json(
        state
            .service
            .unbind_credential(&tenant, &workspace)
            .await
            .at(&uri)?,
    ))
}

// ============ Workspace-scoped resources ============

/// GET/PUT/DELETE handlers for a kind addressed by `(tenant, workspace, name)`
macro_rules! workspace_resource {
    ($module:ident: $spec:ty {
        put: $put:ident,
        get: $get:ident,
        list: $list:ident,
        delete: $delete:ident $(,)?
    }) => {
        mod $module {
            use super::*;

            pub(super) async fn put(
                State(state): State<AppState>,
                uri: Uri,
                Path((tenant, workspace, name)): Path<(String, String, String)>,
                body: Result<Json<ResourceRequest<$spec>>, JsonRejection>,
            ) -> ApiResult<Json<ResourceView<$spec>>> {
                let request = json_body(body, &uri)?;
                let view = state
                    .service
                    .$put(&tenant, &workspace, &name, request)
                    .await
                    .at(&uri)?;
                Ok(Json(view))
            }

            pub(super) async fn get(
                State(state): State<AppState>,
                uri: Uri,
                Path((tenant, workspace, name)): Path<(String, String, String)>,
            ) -> ApiResult<Json<ResourceView<$spec>>> {
                let view = state
                    .service
                    .$get(&tenant, &workspace, &name)
                    .await
                    .at(&uri)?;
                Ok(Json(view))
            }

            pub(super) async fn list(
                State(state): State<AppState>,
                uri: Uri,
                Path((tenant, workspace)): Path<(String, String)>,
            ) -> ApiResult<Json<Vec<ResourceView<$spec>>>> {
                let views = state.service.$list(&tenant, &workspace).await.at(&uri)?;
                Ok(Json(views))
            }

            pub(super) async fn delete(
                State(state): State<AppState>,
                uri: Uri,
                Path((tenant, workspace, name)): Path<(String, String, String)>,
            ) -> ApiResult<StatusCode> {
                state
                    .service
                    .$delete(&tenant, &workspace, &name)
                    .await
                    .at(&uri)?;
                Ok(StatusCode::NO_CONTENT)
            }
        }
    };
}

workspace_resource!(instances: InstanceSpec {
    put: put_instance,
    get: get_instance,
    list: list_instances,
    delete: delete_instance,
});

workspace_resource!(block_storages: BlockStorageSpec {
    put: put_block_storage,
    get: get_block_storage,
    list: list_block_storages,
    delete: delete_block_storage,
});

workspace_resource!(networks: NetworkSpec {
    put: put_network,
    get: get_network,
    list: list_networks,
    delete: delete_network,
});

workspace_resource!(security_groups: SecurityGroupSpec {
    put: put_security_group,
    get: get_security_group,
    list: list_security_groups,
    delete: delete_security_group,
});

workspace_resource!(nics: NicSpec {
    put: put_nic,
    get: get_nic,
    list: list_nics,
    delete: delete_nic,
});

workspace_resource!(public_ips: PublicIpSpec {
    put: put_public_ip,
    get: get_public_ip,
    list: list_public_ips,
    delete: delete_public_ip,
});

workspace_resource!(internet_gateways: InternetGatewaySpec {
    put: put_internet_gateway,
    get: get_internet_gateway,
    list: list_internet_gateways,
    delete: delete_internet_gateway,
});

// ============ Power actions ============

type InstancePath = Path<(String, String, String)>;

async fn start_instance(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, name)): InstancePath,
) -> ApiResult<impl IntoResponse> {
    let view = state
        .service
        .start_instance(&tenant, &workspace, &name)
        .await
        .at(&uri)?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

async fn stop_instance(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, name)): InstancePath,
) -> ApiResult<impl IntoResponse> {
    let view = state
        .service
        .stop_instance(&tenant, &workspace, &name)
        .await
        .at(&uri)?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

async fn restart_instance(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, name)): InstancePath,
) -> ApiResult<impl IntoResponse> {
    let view = state
        .service
        .restart_instance(&tenant, &workspace, &name)
        .await
        .at(&uri)?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

// ============ Network-scoped resources ============

type NetworkPath = Path<(String, String, String)>;
type NetworkChildPath = Path<(String, String, String, String)>;

async fn list_subnets(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network)): NetworkPath,
) -> ApiResult<Json<Vec<ResourceView<SubnetSpec>>>> {
    Ok(Json(
        state
            .service
            .list_subnets(&tenant, &workspace, &network)
            .await
            .at(&uri)?,
    ))
}

async fn get_subnet(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
) -> ApiResult<Json<ResourceView<SubnetSpec>>> {
    Ok(Json(
        state
            .service
            .get_subnet(&tenant, &workspace, &network, &name)
            .await
            .at(&uri)?,
    ))
}

async fn put_subnet(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
    body: Result<Json<ResourceRequest<SubnetSpec>>, JsonRejection>,
) -> ApiResult<Json<ResourceView<SubnetSpec>>> {
    let request = json_body(body, &uri)?;
    Ok(Json(
        state
            .service
            .put_subnet(&tenant, &workspace, &network, &name, request)
            .await
            .at(&uri)?,
    ))
}

async fn delete_subnet(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_subnet(&tenant, &workspace, &network, &name)
        .await
        .at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_route_tables(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network)): NetworkPath,
) -> ApiResult<Json<Vec<ResourceView<RouteTableSpec>>>> {
    Ok(Json(
        state
            .service
            .list_route_tables(&tenant, &workspace, &network)
            .await
            .at(&uri)?,
    ))
}

async fn get_route_table(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
) -> ApiResult<Json<ResourceView<RouteTableSpec>>> {
    Ok(Json(
        state
            .service
            .get_route_table(&tenant, &workspace, &network, &name)
            .await
            .at(&uri)?,
    ))
}

async fn put_route_table(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
    body: Result<Json<ResourceRequest<RouteTableSpec>>, JsonRejection>,
) -> ApiResult<Json<ResourceView<RouteTableSpec>>> {
    let request = json_body(body, &uri)?;
    Ok(Json(
        state
            .service
            .put_route_table(&tenant, &workspace, &network, &name, request)
            .await
            .at(&uri)?,
    ))
}

async fn delete_route_table(
    State(state): State<AppState>,
    uri: Uri,
    Path((tenant, workspace, network, name)): NetworkChildPath,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_route_table(&tenant, &workspace, &network, &name)
        .await
        .at(&uri)?;
    Ok(StatusCode::NO_CONTENT)
}
