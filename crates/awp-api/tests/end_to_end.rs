// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end HTTP scenarios (spec.md §8) driven against an in-process
//! `axum::Router`, signing requests the same way `awp-auth`'s own resolver
//! tests do.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;

use awp_api::{AppState, IdentityProvider, Limits, OAuthConfig, StaticIdentityProvider};
use awp_auth::{AuthResolver, AuthorizedPubkey, AuthorizedPubkeyStore, HttpJwksSource, MemoryAuthorizedPubkeyStore, MemoryPendingAuthStore, MemoryTokenStore};
use awp_cas::MemoryStore;
use awp_ledger::{MemoryOwnershipLedger, MemoryRefCounter};
use awp_node::{encode, Node};
use awp_store::{MemoryCommitStore, MemoryDepotStore};
use awp_usage::MemoryUsageMeter;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

struct Client {
    signing_key: SigningKey,
    pubkey_hex: String,
}

impl Client {
    fn new(pubkeys: &MemoryAuthorizedPubkeyStore, user_id: &str, now: u64) -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let verifying_key = VerifyingKey::from(&signing_key);
        let pubkey_hex = hex::encode(verifying_key.to_encoded_point(true).as_bytes());
        pubkeys
            .store(AuthorizedPubkey {
                pubkey: pubkey_hex.clone(),
                user_id: user_id.to_owned(),
                created_at: now,
            })
            .expect("register pubkey");
        Self { signing_key, pubkey_hex }
    }

    fn request(&self, method: &str, path: &str, body: Vec<u8>, now: u64) -> Request<Body> {
        let digest = hex::encode(Sha256::digest(&body));
        let signing_string = format!("{now}.{method}.{path}.{digest}");
        let signature: Signature = self.signing_key.sign(signing_string.as_bytes());
        let signature_hex = hex::encode(signature.to_bytes());
        Request::builder()
            .method(method)
            .uri(path)
            .header("x-awp-pubkey", &self.pubkey_hex)
            .header("x-awp-timestamp", now.to_string())
            .header("x-awp-signature", signature_hex)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("build request")
    }
}

struct NeverCalledJwks;

#[async_trait::async_trait]
impl awp_auth::JwksSource for NeverCalledJwks {
    async fn fetch(&self) -> Result<jsonwebtoken::jwk::JwkSet, awp_auth::AuthError> {
        Err(awp_auth::AuthError::Jwks("not needed in these tests".to_owned()))
    }
}

fn build_state() -> (axum::Router, Arc<MemoryAuthorizedPubkeyStore>) {
    let blobs = Arc::new(MemoryStore::new());
    let ownership = Arc::new(MemoryOwnershipLedger::new());
    let refs = Arc::new(MemoryRefCounter::new());
    let usage = Arc::new(MemoryUsageMeter::new());
    let commits = Arc::new(MemoryCommitStore::new());
    let depots = Arc::new(MemoryDepotStore::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let pending_auth = Arc::new(MemoryPendingAuthStore::new());
    let pubkeys = Arc::new(MemoryAuthorizedPubkeyStore::new());

    let resolver = Arc::new(AuthResolver::new(
        pubkeys.clone(),
        tokens.clone(),
        Arc::new(NeverCalledJwks),
        300,
        "https://issuer.example/",
    ));
    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider::new(
        OAuthConfig {
            issuer: "https://issuer.example/".to_owned(),
            client_id: "test-client".to_owned(),
            authorize_url: "https://issuer.example/authorize".to_owned(),
        },
        HashMap::new(),
    ));

    let state = AppState {
        blobs,
        ownership,
        refs,
        usage,
        commits,
        depots,
        tokens,
        pending_auth,
        pubkeys: pubkeys.clone(),
        resolver,
        identity,
        limits: Limits::default(),
    };
    (awp_api::router(state), pubkeys)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// S1: putting the same chunk bytes twice does not double-count usage.
#[tokio::test]
async fn put_chunk_is_idempotent_for_usage_accounting() {
    let (router, pubkeys) = build_state();
    let client = Client::new(&pubkeys, "alice", 1_000);
    let realm = "usr_alice";

    let chunk = encode(&Node::Chunk { payload: b"hello world".to_vec() });
    let key = awp_cas::blob_key(&chunk);
    let path = format!("/api/realm/{realm}/chunks/{key}");

    let first = router
        .clone()
        .oneshot(client.request("PUT", &path, chunk.clone(), 1_000))
        .await
        .expect("first put");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .clone()
        .oneshot(client.request("PUT", &path, chunk.clone(), 1_001))
        .await
        .expect("second put");
    assert_eq!(second.status(), StatusCode::OK);

    let usage_path = format!("/api/realm/{realm}/usage");
    let usage_resp = router
        .oneshot(client.request("GET", &usage_path, Vec::new(), 1_002))
        .await
        .expect("usage");
    assert_eq!(usage_resp.status(), StatusCode::OK);
    let usage = body_json(usage_resp).await;
    assert_eq!(usage["node_count"], 1);
    assert_eq!(usage["physical_bytes"], chunk.len());
}

/// S3: a file node referencing a chunk that was never uploaded reports the
/// missing child instead of erroring.
#[tokio::test]
async fn put_file_with_missing_child_reports_missing_nodes() {
    let (router, pubkeys) = build_state();
    let client = Client::new(&pubkeys, "bob", 2_000);
    let realm = "usr_bob";

    let missing_chunk = encode(&Node::Chunk { payload: b"never uploaded".to_vec() });
    let missing_key = awp_cas::blob_key(&missing_chunk);
    let file = encode(&Node::File {
        children: vec![missing_key],
        mime: "application/octet-stream".to_owned(),
        declared_size: missing_chunk.len() as u64,
    });
    let file_key = awp_cas::blob_key(&file);
    let path = format!("/api/realm/{realm}/chunks/{file_key}");

    let resp = router
        .oneshot(client.request("PUT", &path, file, 2_000))
        .await
        .expect("put file");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let missing = body["missing"].as_array().expect("missing array");
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0], missing_key.to_string());
}

/// S2/S5: commit a root, create a depot pointing at it, then roll the depot
/// back to its initial (empty-collection) version.
#[tokio::test]
async fn depot_update_then_rollback_restores_prior_root() {
    let (router, pubkeys) = build_state();
    let client = Client::new(&pubkeys, "carol", 3_000);
    let realm = "usr_carol";

    let chunk = encode(&Node::Chunk { payload: b"depot contents".to_vec() });
    let key = awp_cas::blob_key(&chunk);
    let put_path = format!("/api/realm/{realm}/chunks/{key}");
    let put_resp = router
        .clone()
        .oneshot(client.request("PUT", &put_path, chunk, 3_000))
        .await
        .expect("put chunk");
    assert_eq!(put_resp.status(), StatusCode::OK);

    let create_body = serde_json::to_vec(&serde_json::json!({ "name": "main" })).unwrap();
    let create_resp = router
        .clone()
        .oneshot(client.request(
            "POST",
            &format!("/api/realm/{realm}/depots"),
            create_body,
            3_001,
        ))
        .await
        .expect("create depot");
    assert_eq!(create_resp.status(), StatusCode::OK);
    let created = body_json(create_resp).await;
    let initial_version = created["version"].as_u64().expect("version");

    let update_body = serde_json::to_vec(&serde_json::json!({
        "root": key.to_string(),
        "expected_version": initial_version,
        "message": "first write",
    }))
    .unwrap();
    let update_resp = router
        .clone()
        .oneshot(client.request(
            "PUT",
            &format!("/api/realm/{realm}/depots/main"),
            update_body,
            3_002,
        ))
        .await
        .expect("update depot");
    assert_eq!(update_resp.status(), StatusCode::OK);
    let updated = body_json(update_resp).await;
    assert_eq!(updated["root"], key.to_string());

    let rollback_body = serde_json::to_vec(&serde_json::json!({ "version": initial_version })).unwrap();
    let rollback_resp = router
        .oneshot(client.request(
            "POST",
            &format!("/api/realm/{realm}/depots/main/rollback"),
            rollback_body,
            3_003,
        ))
        .await
        .expect("rollback depot");
    assert_eq!(rollback_resp.status(), StatusCode::OK);
    let rolled_back = body_json(rollback_resp).await;
    assert_eq!(rolled_back["root"], created["root"]);
}

/// A request outside the signature freshness window is rejected.
#[tokio::test]
async fn stale_signature_is_rejected() {
    let (router, pubkeys) = build_state();
    let client = Client::new(&pubkeys, "dave", 10_000);
    let resp = router
        .oneshot(client.request("GET", "/api/realm/usr_dave/usage", Vec::new(), 1))
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

/// A request naming a realm other than the credential's own is forbidden.
#[tokio::test]
async fn cross_realm_access_is_forbidden() {
    let (router, pubkeys) = build_state();
    let client = Client::new(&pubkeys, "erin", 5_000);
    let resp = router
        .oneshot(client.request("GET", "/api/realm/usr_someone_else/usage", Vec::new(), 5_000))
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
