//! Quest claims and the local claimed-task overlay.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::*;
use gorillas::claimed::ClaimedTaskSet;
use gorillas::storage::keys;
use gorillas::{FileStorage, Gorillas, MemoryStorage, QueryKey, Storage, WalletConnector};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_claim(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/quests/claim/flip3heads"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "points": 30})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_claimed_task_survives_reload_same_day() {
    let server = MockServer::start().await;
    mount_claim(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/quests/{ADDRESS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "flip3heads", "completed": true},
            {"id": "win5", "completed": false}
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage_path = dir.path().join("storage.json");
    let wallet = FakeWallet::new(SignBehavior::Sign);

    {
        let storage = Arc::new(FileStorage::open(&storage_path).unwrap());
        let gorillas = Gorillas::new(
            config(&server.uri()),
            storage as Arc<dyn Storage>,
            wallet.clone() as Arc<dyn WalletConnector>,
        )
        .unwrap();
        gorillas.wallet().connect().await.unwrap();
        gorillas.tokens().set("tok").unwrap();

        gorillas.my_quests().await.unwrap();
        gorillas.claim_task("flip3heads").await.unwrap();
        assert!(gorillas.cache().is_stale(&QueryKey::quests(ADDRESS)));
        assert!(gorillas.locally_claimed(ADDRESS).unwrap().contains("flip3heads"));
    }

    // Same storage file, new process.
    let storage = Arc::new(FileStorage::open(&storage_path).unwrap());
    let gorillas = Gorillas::new(
        config(&server.uri()),
        storage as Arc<dyn Storage>,
        wallet as Arc<dyn WalletConnector>,
    )
    .unwrap();
    gorillas.wallet().connect().await.unwrap();

    let claimed = gorillas.locally_claimed(ADDRESS).unwrap();
    assert!(claimed.contains("flip3heads"));

    let quests = gorillas.my_quests().await.unwrap().unwrap();
    let flip3 = quests.iter().find(|q| q.id == "flip3heads").unwrap();
    assert!(flip3.is_claimed(&claimed));
    assert!(!flip3.is_claimable(&claimed));
}

#[tokio::test]
async fn test_claimed_set_from_yesterday_is_discarded() {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let yesterday = Utc::now() - Duration::days(1);
    let stale = ClaimedTaskSet {
        ids: ["flip3heads".to_string()].into_iter().collect(),
        timestamp: yesterday.timestamp_millis(),
    };
    let key = keys::claimed_tasks(ADDRESS);
    storage
        .set(&key, &serde_json::to_string(&stale).unwrap())
        .unwrap();

    let h = harness_with(config(&server.uri()), storage.clone(), SignBehavior::Sign);
    assert!(h.gorillas.locally_claimed(ADDRESS).unwrap().is_empty());
    assert_eq!(storage.get(&key), None);
}

#[tokio::test]
async fn test_claim_task_refetches_quests_and_stats() {
    let server = MockServer::start().await;
    mount_claim(&server).await;
    for (route, body) in [
        (format!("/quests/{ADDRESS}"), json!([{"id": "flip3heads", "completed": true}])),
        ("/stats/me".to_string(), json!({"points": 10})),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(2)
            .mount(&server)
            .await;
    }

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.my_quests().await.unwrap();
    h.gorillas.user_stats().await.unwrap();

    h.gorillas.claim_task("flip3heads").await.unwrap();
    assert!(h.gorillas.cache().is_stale(&QueryKey::quests(ADDRESS)));
    assert!(h.gorillas.cache().is_stale(&QueryKey::UserStats));

    h.gorillas.my_quests().await.unwrap();
    h.gorillas.user_stats().await.unwrap();
}

#[tokio::test]
async fn test_claim_accepted_with_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quests/claim/flip3heads"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/quests/{ADDRESS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.my_quests().await.unwrap();

    let response = h.gorillas.claim_task("flip3heads").await.unwrap();
    assert_eq!(response.points, None);
    assert!(h.gorillas.cache().is_stale(&QueryKey::quests(ADDRESS)));
    assert!(h.gorillas.locally_claimed(ADDRESS).unwrap().contains("flip3heads"));
}

#[tokio::test]
async fn test_claim_keyed_by_connected_address() {
    let server = MockServer::start().await;
    mount_claim(&server).await;

    let h = logged_in(&server.uri(), "tok").await;
    h.gorillas.claim_task("flip3heads").await.unwrap();

    let upper = ADDRESS.to_uppercase().replacen("0X", "0x", 1);
    assert!(h.gorillas.locally_claimed(&upper).unwrap().contains("flip3heads"));
    assert!(h.gorillas.locally_claimed(OTHER_ADDRESS).unwrap().is_empty());
}
