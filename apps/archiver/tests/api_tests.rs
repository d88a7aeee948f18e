use archiver::{AppState, StoreKind, create_app};
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use cdc_archive::{ArchiveConfig, ArchiveTransform, MemoryStore, StorageOp};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

const BUCKET: &str = "archive-api-test";

fn setup(auth_secret: Option<&str>) -> (axum::Router, MemoryStore) {
    let store = MemoryStore::new(BUCKET).unwrap();
    let transform = ArchiveTransform::new(ArchiveConfig::new(BUCKET), Arc::new(store.clone()));
    let state = AppState::new(transform, auth_secret.map(str::to_string));
    (create_app(state), store)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn user_event(operation: &str) -> Value {
    json!({
        "source": "users",
        "detail-type": "dynamo.item.changed",
        "detail": { "data": {
            "operation": operation,
            "newImage": { "pk": "USER#1", "sk": "PROFILE", "name": "Al!ce" }
        }}
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_event_is_archived() {
    let (app, store) = setup(None);

    let response = app
        .oneshot(post_json("/events", &user_event("MODIFY")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        store.get_json("users/user/USER#1###PROFILE.json").await,
        Some(json!({ "pk": "USER#1", "sk": "PROFILE", "name": "Al!ce", "schema": "user" }))
    );
}

#[tokio::test]
async fn test_storage_failure_still_accepted() {
    let (app, store) = setup(None);
    store.inject_failure("users/").await;

    let response = app
        .oneshot(post_json("/events", &user_event("INSERT")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(store.is_empty().await);
    assert_eq!(store.operations().await.len(), 1);
}

#[tokio::test]
async fn test_event_without_image_is_accepted() {
    let (app, store) = setup(None);

    let response = app
        .oneshot(post_json("/events", &json!({ "source": "users" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(store.operations().await.is_empty());
}

#[tokio::test]
async fn test_malformed_event_rejected() {
    let (app, store) = setup(None);

    let response = app
        .oneshot(post_json("/events", &json!({ "detail": {} })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(store.operations().await.is_empty());
}

#[tokio::test]
async fn test_batch_archives_every_event() {
    let (app, store) = setup(None);

    let batch = json!([
        user_event("INSERT"),
        {
            "source": "blog",
            "detail": { "data": { "operation": "INSERT", "newImage": { "pk": "POST#1", "sk": "META" } } }
        },
        {
            "source": "blog",
            "detail": { "data": { "operation": "REMOVE", "oldImage": { "pk": "Comment#9", "sk": "C1" } } }
        }
    ]);

    let response = app.oneshot(post_json("/events/batch", &batch)).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await, json!({ "accepted": 3 }));
    assert_eq!(
        store.keys().await,
        vec!["blog/post/POST#1###META.json", "users/user/USER#1###PROFILE.json"]
    );

    let deletes: Vec<StorageOp> = store
        .operations()
        .await
        .into_iter()
        .filter(|op| matches!(op, StorageOp::Delete { .. }))
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].key(), "blog/comment/Comment#9###C1.json");
}

#[tokio::test]
async fn test_auth_required_when_secret_set() {
    let (app, store) = setup(Some("s3cret"));

    let response = app
        .clone()
        .oneshot(post_json("/events", &user_event("MODIFY")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(store.operations().await.is_empty());

    let mut request = post_json("/events", &user_event("MODIFY"));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_health_and_version_skip_auth() {
    let (app, _store) = setup(Some("s3cret"));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["bucket"], BUCKET);

    let response = app
        .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_store_kind_parsing() {
    assert_eq!("S3".parse::<StoreKind>().unwrap(), StoreKind::S3);
    assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
    assert!("gcs".parse::<StoreKind>().is_err());
}
