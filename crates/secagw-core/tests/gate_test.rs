//! Workspace activation through the handlers

mod common;

use common::{TOKEN, harness_with, vault};
use secagw_core::model::{WorkspaceCredential, WorkspaceState};
use secagw_core::store::{CredentialRepository, WorkspaceRepository};
use secagw_core::{CredentialRequest, GatewayConfig, GatewayError, WorkspaceRequest};
use std::time::Duration;

async fn creating_workspace_with_credential() -> common::Harness {
    let h = harness_with(GatewayConfig::default()).await;
    h.service
        .put_workspace(
            "t1",
            "ws1",
            WorkspaceRequest {
                region: "fsn1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // credential row present, workspace not yet flipped
    let token = vault().encrypt(TOKEN).unwrap();
    let credential = WorkspaceCredential::new("t1", "ws1", "hetzner", token);
    h.store.upsert_credential(&credential).await.unwrap();
    h
}

#[tokio::test]
async fn test_workspace_activated_mid_window_proceeds() {
    let h = creating_workspace_with_credential().await;

    let store = h.store.clone();
    let flip = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut ws = store.get_workspace("t1", "ws1").await.unwrap().unwrap();
        ws.status.state = WorkspaceState::Active;
        store.save_workspace(&ws).await.unwrap();
    });

    let networks = h.service.list_networks("t1", "ws1").await.unwrap();
    assert!(networks.is_empty());
    flip.await.unwrap();
}

#[tokio::test]
async fn test_workspace_never_activated_is_conflict() {
    let h = creating_workspace_with_credential().await;

    let err = h.service.list_networks("t1", "ws1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(m) if m.contains("not active")));
}

#[tokio::test]
async fn test_missing_workspace_is_not_found() {
    let h = harness_with(GatewayConfig::default()).await;
    let err = h.service.list_instances("t1", "ghost").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert_eq!(err.status(), 404);
}

#[tokio::test]
async fn test_bind_and_unbind_credential_drive_state() {
    let h = harness_with(GatewayConfig::default()).await;
    let ws = h
        .service
        .put_workspace(
            "t1",
            "ws1",
            WorkspaceRequest {
                region: "fsn1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ws.status.state, WorkspaceState::Creating);

    let ws = h
        .service
        .bind_credential(
            "t1",
            "ws1",
            CredentialRequest {
                token: TOKEN.to_string(),
                endpoint: Some("http://127.0.0.1:9/v1".to_string()),
                project: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(ws.status.state, WorkspaceState::Active);

    // token is stored encrypted
    let stored = h
        .store
        .get_credential("t1", "ws1", "hetzner")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.token.starts_with("enc:v1:"));
    assert_eq!(vault().decrypt(&stored.token).unwrap(), TOKEN);
    assert_eq!(stored.endpoint.as_deref(), Some("http://127.0.0.1:9/v1"));

    assert!(h.service.list_networks("t1", "ws1").await.is_ok());

    let ws = h.service.unbind_credential("t1", "ws1").await.unwrap();
    assert_eq!(ws.status.state, WorkspaceState::Creating);
    assert!(
        h.store
            .get_credential("t1", "ws1", "hetzner")
            .await
            .unwrap()
            .is_none()
    );

    let err = h.service.list_networks("t1", "ws1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
}

#[tokio::test]
async fn test_rejected_token_keeps_workspace_creating() {
    let h = harness_with(GatewayConfig::default()).await;
    h.service
        .put_workspace(
            "t1",
            "ws1",
            WorkspaceRequest {
                region: "fsn1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.provider
        .rejected_tokens
        .lock()
        .unwrap()
        .push("bad-token".to_string());

    let err = h
        .service
        .bind_credential(
            "t1",
            "ws1",
            CredentialRequest {
                token: "bad-token".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.problem_type(),
        "http://secapi.cloud/errors/provider-unauthorized"
    );

    let ws = h.service.get_workspace("t1", "ws1").await.unwrap();
    assert_eq!(ws.status.state, WorkspaceState::Creating);
}

#[tokio::test]
async fn test_empty_token_is_invalid() {
    let h = harness_with(GatewayConfig::default()).await;
    h.service
        .put_workspace(
            "t1",
            "ws1",
            WorkspaceRequest {
                region: "fsn1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .service
        .bind_credential("t1", "ws1", CredentialRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_deleted_workspace_is_not_found() {
    let h = common::active_harness().await;
    h.service.delete_workspace("t1", "ws1").await.unwrap();

    let err = h.service.list_networks("t1", "ws1").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(matches!(
        h.service.delete_workspace("t1", "ws1").await,
        Err(GatewayError::NotFound(_))
    ));
}
