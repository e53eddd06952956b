//! HTTP router tests, driven with `tower::ServiceExt::oneshot` against a
//! simulated drop service.

use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use vanish_core::{
    DropService, Environment,
    model::{ExpiryPolicy, NewDrop, NewFile, PlainContent, SessionId},
    storage::{DropStore, MemoryDropStore, MemoryObjectStore, PointerSigner},
};
use vanish_harness::{
    FaultyStore, SIM_BASE_URL, SimEnv, SimService, StoreCall, sim_service, test_config,
};
use vanish_server::http::{SEALED_HEADER, router};
use tower::ServiceExt;

fn app(sim: &SimService) -> Router {
    router(sim.service.clone(), Duration::from_secs(5))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

fn text_request(text: &str) -> Value {
    serde_json::to_value(NewDrop::standard(PlainContent::Text(text.into()), ExpiryPolicy::UntilFirstScan))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let sim = sim_service(1);
    let (status, body) = call(&app(&sim), Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_then_fetch_with_token() {
    let sim = sim_service(2);
    let app = app(&sim);

    let (status, created) = call(&app, Method::POST, "/drops", Some(text_request("hello"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let fetch = format!("/drops/{id}/fetch");
    let (status, issued) = call(&app, Method::POST, &fetch, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["outcome"], "token_issued");
    let token = issued["token"].clone();

    let (status, delivered) = call(&app, Method::POST, &fetch, Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["outcome"], "delivered");
    assert_eq!(delivered["content"]["kind"], "text");
    assert_eq!(delivered["content"]["value"], "hello");

    // Replaying the token is refused.
    let (status, err) = call(&app, Method::POST, &fetch, Some(json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "access_denied");

    // The next viewer finds the drop consumed, and then gone.
    let (_, issued) = call(&app, Method::POST, &fetch, Some(json!({}))).await;
    let (status, err) =
        call(&app, Method::POST, &fetch, Some(json!({ "token": issued["token"] }))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(err["error"], "expired");

    let (status, err) = call(&app, Method::GET, &format!("/drops/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}

#[tokio::test]
async fn access_reports_already_valid() {
    let sim = sim_service(3);
    let app = app(&sim);
    let (_, created) = call(&app, Method::POST, "/drops", Some(text_request("x"))).await;
    let access = format!("/drops/{}/access", created["id"].as_str().unwrap());

    let (status, minted) = call(&app, Method::POST, &access, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(minted["grant"], "minted");

    let (_, again) = call(&app, Method::POST, &access, Some(json!({ "token": minted["token"] }))).await;
    assert_eq!(again["grant"], "already_valid");
}

#[tokio::test]
async fn password_flow_over_http() {
    let sim = sim_service(4);
    let app = app(&sim);
    let request = NewDrop::standard(PlainContent::Text("secret".into()), ExpiryPolicy::Session)
        .with_password("hunter2");
    let (_, created) = call(&app, Method::POST, "/drops", Some(serde_json::to_value(request).unwrap())).await;
    let id = created["id"].as_str().unwrap().to_string();
    let session = SessionId::from_u128(77).to_string();

    let fetch = format!("/drops/{id}/fetch");
    let (_, issued) = call(&app, Method::POST, &fetch, Some(json!({ "session": session }))).await;
    let (status, err) = call(
        &app,
        Method::POST,
        &fetch,
        Some(json!({ "token": issued["token"], "session": session })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "password_required");

    let password = format!("/drops/{id}/password");
    let (status, err) =
        call(&app, Method::POST, &password, Some(json!({ "password": "wrong", "session": session }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "invalid_password");
    let (_, verdict) =
        call(&app, Method::POST, &password, Some(json!({ "password": "hunter2", "session": session }))).await;
    assert_eq!(verdict["verified"], true);

    let (_, issued) = call(&app, Method::POST, &fetch, Some(json!({ "session": session }))).await;
    let (status, delivered) = call(
        &app,
        Method::POST,
        &fetch,
        Some(json!({ "token": issued["token"], "session": session })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["content"]["value"], "secret");
}

#[tokio::test]
async fn download_and_open_object() {
    let sim = sim_service(5);
    let app = app(&sim);
    let file = NewFile { name: "hello.txt".into(), mime_type: "text/plain".into(), bytes: b"file body".to_vec() };
    let request = NewDrop::standard(PlainContent::File(file), ExpiryPolicy::Session).with_max_downloads(1);
    let (_, created) = call(&app, Method::POST, "/drops", Some(serde_json::to_value(request).unwrap())).await;
    let id = created["id"].as_str().unwrap().to_string();

    let download = format!("/drops/{id}/download");
    let (status, files) = call(&app, Method::POST, &download, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let url = files["files"][0]["url"].as_str().unwrap();
    let path_and_query = &url[url.find("/objects/").unwrap()..];

    let response = app
        .clone()
        .oneshot(Request::builder().uri(path_and_query).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert!(response.headers().get(SEALED_HEADER).is_none());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"file body");

    // The only download is spent.
    let (status, err) = call(&app, Method::POST, &download, Some(json!({}))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(err["error"], "expired");
}

#[tokio::test]
async fn tampered_object_url_is_forbidden() {
    let sim = sim_service(6);
    let app = app(&sim);
    let expires = sim.env.wall_clock_millis() + 60_000;
    let uri = format!("/objects/drops/{}/0?expires={expires}&sig={}", "0".repeat(32), "00".repeat(32));

    let (status, err) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "access_denied");
}

#[tokio::test]
async fn malformed_requests_are_invalid() {
    let sim = sim_service(7);
    let app = app(&sim);

    let (status, err) = call(&app, Method::GET, "/drops/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_request");

    let (status, err) = call(&app, Method::POST, "/drops", Some(json!({ "nonsense": true }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_request");
}

#[tokio::test]
async fn delete_is_idempotent() {
    let sim = sim_service(8);
    let app = app(&sim);
    let (_, created) = call(&app, Method::POST, "/drops", Some(text_request("bye"))).await;
    let uri = format!("/drops/{}", created["id"].as_str().unwrap());

    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, err) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}

type SlowService = DropService<SimEnv, FaultyStore<MemoryDropStore>, MemoryObjectStore>;

const STALL: Duration = Duration::from_millis(300);
const TIMEOUT: Duration = Duration::from_millis(50);

fn slow_service(stalled: &[StoreCall]) -> (SlowService, FaultyStore<MemoryDropStore>, MemoryObjectStore) {
    let store = FaultyStore::new(MemoryDropStore::new()).stall(STALL, stalled);
    let objects = MemoryObjectStore::new(PointerSigner::new(SIM_BASE_URL, [3; 32]));
    let service = DropService::new(SimEnv::with_seed(9), store.clone(), objects.clone(), test_config());
    (service, store, objects)
}

#[tokio::test]
async fn slow_delivery_is_seen_through_past_the_timeout() {
    let (service, store, _) = slow_service(&[StoreCall::IncrementCounter]);
    let id = service.create_drop(NewDrop::standard(PlainContent::Text("only once".into()), ExpiryPolicy::UntilFirstScan)).unwrap();
    let app = router(service, TIMEOUT);

    let fetch = format!("/drops/{id}/fetch");
    let (_, issued) = call(&app, Method::POST, &fetch, Some(json!({}))).await;
    let (status, delivered) =
        call(&app, Method::POST, &fetch, Some(json!({ "token": issued["token"] }))).await;

    // The scan is counted, so the viewer must have the content.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["content"]["value"], "only once");
    assert_eq!(store.inner().load_drop(id).unwrap().unwrap().scan_count, 1);
}

#[tokio::test]
async fn timed_out_create_writes_nothing() {
    let (service, store, objects) = slow_service(&[StoreCall::LoadDrop]);
    let app = router(service, TIMEOUT);
    let file = NewFile { name: "late.txt".into(), mime_type: "text/plain".into(), bytes: b"late".to_vec() };
    let request = NewDrop::standard(PlainContent::File(file), ExpiryPolicy::Session);

    let (status, err) = call(&app, Method::POST, "/drops", Some(serde_json::to_value(request).unwrap())).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(err["error"], "storage");

    // Let the abandoned call run to completion.
    tokio::time::sleep(STALL * 2).await;
    assert_eq!(store.inner().drop_count(), 0);
    assert!(objects.is_empty());
}

#[tokio::test]
async fn timed_out_fetch_mints_nothing() {
    let (service, store, _) = slow_service(&[StoreCall::LoadDrop]);
    let id = service.create_drop(NewDrop::standard(PlainContent::Text("kept".into()), ExpiryPolicy::UntilFirstScan)).unwrap();
    let app = router(service, TIMEOUT);

    let fetch = format!("/drops/{id}/fetch");
    let (status, _) = call(&app, Method::POST, &fetch, Some(json!({}))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    tokio::time::sleep(STALL * 2).await;
    assert_eq!(store.inner().token_count(), 0);
    assert_eq!(store.inner().load_drop(id).unwrap().unwrap().scan_count, 0);
}
