//! Remote document store tests.
//!
//! Runs a small axum document store on an ephemeral port and points
//! `RestRepository` at it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
};
use business_approvals_api::models::{EntityType, NewChangeRequest};
use business_approvals_api::services::{ApprovalWorkflow, Repositories, ReviewOutcome};
use business_approvals_api::storage::{
    EntityRepository, InMemoryChangeRequestStore, RestRepository, StorageError,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct MockStore {
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockStore {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

async fn create_record(
    State(store): State<MockStore>,
    Path(collection): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    store.record(format!("POST /{}", collection));
    body["id"] = json!("generated-1");
    (StatusCode::CREATED, Json(body))
}

async fn update_record(
    State(store): State<MockStore>,
    Path((collection, id)): Path<(String, String)>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    store.record(format!("PUT /{}/{}", collection, id));
    if id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    body["id"] = json!(id);
    Ok(Json(body))
}

async fn delete_record(
    State(store): State<MockStore>,
    Path((collection, id)): Path<(String, String)>,
) -> StatusCode {
    store.record(format!("DELETE /{}/{}", collection, id));
    match id.as_str() {
        "missing" => StatusCode::NOT_FOUND,
        "locked" => StatusCode::CONFLICT,
        _ => StatusCode::NO_CONTENT,
    }
}

/// Start the mock store and return its base URL.
async fn spawn_store(store: MockStore) -> String {
    let app = Router::new()
        .route("/api/{collection}", post(create_record))
        .route(
            "/api/{collection}/{id}",
            put(update_record).delete(delete_record),
        )
        .with_state(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/", addr)
}

fn repository(base_url: &str, entity_type: EntityType) -> RestRepository {
    let client = RestRepository::client_with_timeout(Duration::from_secs(5)).unwrap();
    RestRepository::new(client, base_url, entity_type)
}

#[tokio::test]
async fn test_add_posts_to_collection() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let repo = repository(&base_url, EntityType::Product);

    let created = repo.add(json!({"name": "Widget"})).await.unwrap();

    assert_eq!(created, json!({"name": "Widget", "id": "generated-1"}));
    assert_eq!(store.calls(), vec!["POST /products"]);
}

#[tokio::test]
async fn test_update_puts_to_record() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let repo = repository(&base_url, EntityType::Sale);

    let updated = repo.update("s1", json!({"total": 42})).await.unwrap();

    assert_eq!(updated["id"], "s1");
    assert_eq!(updated["total"], 42);
    assert_eq!(store.calls(), vec!["PUT /sales/s1"]);
}

#[tokio::test]
async fn test_record_id_cannot_escape_its_collection() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let repo = repository(&base_url, EntityType::Sale);

    let updated = repo
        .update("a/../../products/p1", json!({"total": 1}))
        .await
        .unwrap();
    repo.delete("s1?force=true#x").await.unwrap();

    assert_eq!(updated["id"], "a/../../products/p1");
    assert_eq!(
        store.calls(),
        vec!["PUT /sales/a/../../products/p1", "DELETE /sales/s1?force=true#x"]
    );
}

#[tokio::test]
async fn test_dot_segment_ids_are_refused() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let repo = repository(&base_url, EntityType::Purchase);

    assert!(matches!(
        repo.update("..", json!({"qty": 1})).await,
        Err(StorageError::Other(_))
    ));
    assert!(matches!(repo.delete(".").await, Err(StorageError::Other(_))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_missing_record_maps_to_not_found() {
    let base_url = spawn_store(MockStore::default()).await;
    let repo = repository(&base_url, EntityType::Purchase);

    assert_eq!(
        repo.update("missing", json!({"qty": 1})).await,
        Err(StorageError::not_found("purchase", "missing"))
    );
    assert_eq!(
        repo.delete("missing").await,
        Err(StorageError::not_found("purchase", "missing"))
    );
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let repo = repository(&base_url, EntityType::Purchase);

    repo.delete("po-1").await.unwrap();

    assert_eq!(store.calls(), vec!["DELETE /purchases/po-1"]);
}

#[tokio::test]
async fn test_other_failures_map_to_remote_error() {
    let base_url = spawn_store(MockStore::default()).await;
    let repo = repository(&base_url, EntityType::Purchase);

    let result = repo.delete("locked").await;

    assert!(matches!(result, Err(StorageError::Remote { status: 409, .. })));
}

#[tokio::test]
async fn test_unreachable_store_is_connection_error() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let repo = repository(&format!("http://{}", addr), EntityType::Product);

    let result = repo.add(json!({"name": "Widget"})).await;

    assert!(matches!(result, Err(StorageError::ConnectionError(_))));
}

#[tokio::test]
async fn test_approved_change_reaches_document_store() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let client = RestRepository::client_with_timeout(Duration::from_secs(5)).unwrap();
    let repositories = Repositories::from_fn(|entity_type: EntityType| -> Arc<dyn EntityRepository> {
        Arc::new(RestRepository::new(client.clone(), &base_url, entity_type))
    });
    let workflow = ApprovalWorkflow::new(Arc::new(InMemoryChangeRequestStore::new()), repositories);

    let request = workflow
        .submit(NewChangeRequest::update(
            EntityType::Sale,
            "s7",
            json!({"total": 99}),
            "staff@example.com",
        ))
        .await
        .unwrap();
    assert!(store.calls().is_empty());

    let outcome = workflow
        .approve(request.id, "admin@example.com", None)
        .await
        .unwrap();

    let ReviewOutcome::Approved(approved) = outcome else {
        panic!("expected the request to be approved");
    };
    assert!(approved.application.unwrap().is_applied());
    assert_eq!(store.calls(), vec!["PUT /sales/s7"]);
}

#[tokio::test]
async fn test_failed_remote_apply_keeps_approval() {
    let store = MockStore::default();
    let base_url = spawn_store(store.clone()).await;
    let client = RestRepository::client_with_timeout(Duration::from_secs(5)).unwrap();
    let repositories = Repositories::from_fn(|entity_type: EntityType| -> Arc<dyn EntityRepository> {
        Arc::new(RestRepository::new(client.clone(), &base_url, entity_type))
    });
    let workflow = ApprovalWorkflow::new(Arc::new(InMemoryChangeRequestStore::new()), repositories);

    let request = workflow
        .submit(NewChangeRequest::delete(
            EntityType::Purchase,
            "locked",
            "staff@example.com",
        ))
        .await
        .unwrap();

    workflow
        .approve(request.id, "admin@example.com", None)
        .await
        .unwrap();

    let unapplied = workflow.list_unapplied().await.unwrap();
    assert_eq!(unapplied.len(), 1);
    assert_eq!(unapplied[0].id, request.id);
    assert_eq!(
        unapplied[0]
            .application
            .as_ref()
            .map(|application| application.failed_attempts()),
        Some(1)
    );
    assert_eq!(store.calls(), vec!["DELETE /purchases/locked"]);
}
