//! Local mock of the Hetzner Cloud API

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type Reply = (StatusCode, Json<Value>);

#[derive(Default)]
pub struct MockApi {
    next_id: AtomicU64,
    pub servers: Mutex<Vec<Value>>,
    pub networks: Mutex<Vec<Value>>,
    /// Errors returned, in order, by `POST /servers`
    pub create_server_errors: Mutex<VecDeque<&'static str>>,
    /// Errors returned, in order, by `poweron`
    pub poweron_errors: Mutex<VecDeque<&'static str>>,
    pub poweron_always_locked: Mutex<bool>,
    /// Locations where `POST /volumes` reports no capacity
    pub full_locations: Mutex<HashSet<String>>,
    /// Bodies of `POST /servers`
    pub server_requests: Mutex<Vec<Value>>,
    /// Locations tried by `POST /volumes`
    pub volume_locations: Mutex<Vec<Option<String>>>,
    /// Server action commands in arrival order
    pub commands: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        })
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn add_server(&self, name: &str, status: &str) -> u64 {
        let id = self.id();
        self.servers.lock().unwrap().push(server_json(id, name, status, "cx22", "fsn1"));
        id
    }

    pub fn command_count(&self, command: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

fn location(name: &str) -> Value {
    json!({"name": name, "network_zone": "eu-central"})
}

fn server_json(id: u64, name: &str, status: &str, server_type: &str, loc: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": status,
        "server_type": {"name": server_type},
        "datacenter": {"location": location(loc)},
        "public_net": {"ipv4": {"ip": "203.0.113.10"}},
        "private_net": [],
        "labels": {}
    })
}

fn action(id: u64, command: &str) -> Value {
    json!({"id": id, "command": command, "status": "running"})
}

fn error(code: &str) -> Reply {
    let status = match code {
        "locked" => StatusCode::LOCKED,
        "resource_unavailable" => StatusCode::PRECONDITION_FAILED,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let message = match code {
        "server_has_no_network" => "server has no network interfaces",
        "locked" => "server is locked by another action",
        _ => "request failed",
    };
    (status, Json(json!({"error": {"code": code, "message": message}})))
}

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn name_matches(item: &Value, query: &HashMap<String, String>) -> bool {
    query.get("name").is_none_or(|n| item["name"] == n.as_str())
}

async fn list_locations() -> Reply {
    ok(json!({"locations": [location("fsn1"), location("nbg1"), location("hel1")]}))
}

async fn list_server_types() -> Reply {
    ok(json!({"server_types": [
        {"id": 1, "name": "cx22", "cores": 2, "memory": 4.0, "architecture": "x86"},
        {"id": 2, "name": "cx32", "cores": 4, "memory": 8.0, "architecture": "x86"},
        {"id": 3, "name": "cax11", "cores": 2, "memory": 4.0, "architecture": "arm"},
        {"id": 4, "name": "cx52", "cores": 16, "memory": 32.0, "architecture": "x86"}
    ]}))
}

async fn list_datacenters() -> Reply {
    // cx22 is sold out in fsn1
    ok(json!({"datacenters": [
        {"name": "fsn1-dc14", "location": location("fsn1"), "server_types": {"available": [2, 3, 4]}},
        {"name": "nbg1-dc3", "location": location("nbg1"), "server_types": {"available": [1, 2]}}
    ]}))
}

async fn list_images() -> Reply {
    ok(json!({"images": [
        {"id": 100, "name": "ubuntu-24.04", "architecture": "x86"},
        {"id": 101, "name": "ubuntu-24.04", "architecture": "arm"}
    ]}))
}

async fn list_servers(
    State(api): State<Arc<MockApi>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let servers = api.servers.lock().unwrap();
    let items: Vec<Value> = servers
        .iter()
        .filter(|s| name_matches(s, &query))
        .cloned()
        .collect();
    ok(json!({"servers": items}))
}

async fn create_server(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Reply {
    api.server_requests.lock().unwrap().push(body.clone());
    if let Some(code) = api.create_server_errors.lock().unwrap().pop_front() {
        return error(code);
    }

    let id = api.id();
    let loc = body["location"].as_str().unwrap_or("nbg1");
    let server = server_json(
        id,
        body["name"].as_str().unwrap_or_default(),
        "initializing",
        body["server_type"].as_str().unwrap_or_default(),
        loc,
    );
    api.servers.lock().unwrap().push(server.clone());
    (
        StatusCode::CREATED,
        Json(json!({
            "server": server,
            "action": action(api.id(), "create_server"),
            "next_actions": [action(api.id(), "start_server")]
        })),
    )
}

async fn server_action(
    State(api): State<Arc<MockApi>>,
    Path((id, command)): Path<(u64, String)>,
    body: Bytes,
) -> Reply {
    api.commands.lock().unwrap().push(command.clone());

    if command == "poweron" {
        if *api.poweron_always_locked.lock().unwrap() {
            return error("locked");
        }
        if let Some(code) = api.poweron_errors.lock().unwrap().pop_front() {
            return error(code);
        }
    }

    if command == "attach_to_network" {
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let mut servers = api.servers.lock().unwrap();
        if let Some(server) = servers.iter_mut().find(|s| s["id"] == id) {
            if let Some(nets) = server["private_net"].as_array_mut() {
                nets.push(json!({"network": body["network"]}));
            }
        }
    }

    (
        StatusCode::CREATED,
        Json(json!({"action": action(api.id(), &command)})),
    )
}

async fn list_networks(
    State(api): State<Arc<MockApi>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let networks = api.networks.lock().unwrap();
    let items: Vec<Value> = networks
        .iter()
        .filter(|n| name_matches(n, &query))
        .cloned()
        .collect();
    ok(json!({"networks": items}))
}

async fn create_network(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Reply {
    let network = json!({
        "id": api.id(),
        "name": body["name"],
        "ip_range": body["ip_range"],
        "labels": body["labels"]
    });
    api.networks.lock().unwrap().push(network.clone());
    (StatusCode::CREATED, Json(json!({"network": network})))
}

async fn list_volumes() -> Reply {
    ok(json!({"volumes": []}))
}

async fn create_volume(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Reply {
    let loc = body["location"].as_str().map(str::to_string);
    api.volume_locations.lock().unwrap().push(loc.clone());

    let loc = loc.unwrap_or_else(|| "fsn1".to_string());
    if api.full_locations.lock().unwrap().contains(&loc) {
        return error("resource_unavailable");
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "volume": {
                "id": api.id(),
                "name": body["name"],
                "size": body["size"],
                "location": location(&loc),
                "server": null,
                "labels": body["labels"]
            },
            "action": action(api.id(), "create_volume"),
            "next_actions": []
        })),
    )
}

/// Serve the mock on an ephemeral port and return its base URL
pub async fn spawn(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/locations", get(list_locations))
        .route("/server_types", get(list_server_types))
        .route("/datacenters", get(list_datacenters))
        .route("/images", get(list_images))
        .route("/servers", get(list_servers).post(create_server))
        .route("/servers/{id}/actions/{command}", post(server_action))
        .route("/networks", get(list_networks).post(create_network))
        .route("/volumes", get(list_volumes).post(create_volume))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
