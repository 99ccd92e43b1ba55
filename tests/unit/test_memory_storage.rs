//! Unit tests for the in-memory storage backends

use business_approvals_api::models::{
    Application, ChangeRequest, ChangeStatus, EntityType, NewChangeRequest, Review,
};
use business_approvals_api::storage::{
    ChangeRequestStore, EntityRepository, InMemoryChangeRequestStore, InMemoryRepository,
    ReviewTransition, StorageError,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn pending_request() -> ChangeRequest {
    ChangeRequest::from_submission(NewChangeRequest::create(
        EntityType::Product,
        json!({"name": "Widget"}),
        "staff@example.com",
    ))
}

#[tokio::test]
async fn test_repository_add_assigns_id() {
    let repo = InMemoryRepository::new(EntityType::Product);

    let created = repo.add(json!({"name": "Widget", "price": 10})).await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    assert!(Uuid::parse_str(&id).is_ok());
    assert_eq!(repo.get(&id).await.unwrap()["price"], 10);
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_repository_add_keeps_supplied_id_and_rejects_duplicates() {
    let repo = InMemoryRepository::new(EntityType::Sale);

    let created = repo.add(json!({"id": "s1", "total": 5})).await.unwrap();
    assert_eq!(created["id"], "s1");

    let duplicate = repo.add(json!({"id": "s1", "total": 6})).await;
    assert!(matches!(duplicate, Err(StorageError::Other(_))));
    assert_eq!(repo.get("s1").await.unwrap()["total"], 5);
}

#[tokio::test]
async fn test_repository_update_merges_fields_and_keeps_id() {
    let repo = InMemoryRepository::new(EntityType::Product);
    repo.add(json!({"id": "p1", "name": "Widget", "price": 10}))
        .await
        .unwrap();

    let updated = repo
        .update("p1", json!({"id": "other", "price": 12}))
        .await
        .unwrap();

    assert_eq!(updated, json!({"id": "p1", "name": "Widget", "price": 12}));
}

#[tokio::test]
async fn test_repository_update_and_delete_unknown_id() {
    let repo = InMemoryRepository::new(EntityType::Purchase);

    let update = repo.update("missing", json!({"qty": 1})).await;
    assert_eq!(
        update,
        Err(StorageError::not_found("purchase", "missing"))
    );
    assert!(matches!(
        repo.delete("missing").await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_repository_delete_removes_record() {
    let repo = InMemoryRepository::new(EntityType::Purchase);
    repo.add(json!({"id": "p1"})).await.unwrap();

    repo.delete("p1").await.unwrap();

    assert!(repo.get("p1").await.is_none());
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_repository_rejects_non_object_data() {
    let repo = InMemoryRepository::new(EntityType::Product);
    assert!(matches!(
        repo.add(json!("Widget")).await,
        Err(StorageError::Serialization(_))
    ));
}

#[tokio::test]
async fn test_store_lists_in_insertion_order() {
    let store = InMemoryChangeRequestStore::new();
    let first = store.insert(pending_request()).await.unwrap();
    let second = store.insert(pending_request()).await.unwrap();

    let ids: Vec<Uuid> = store.list().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(store.get(second.id).await.unwrap(), Some(second));
    assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_store_rejects_duplicate_id() {
    let store = InMemoryChangeRequestStore::new();
    let request = store.insert(pending_request()).await.unwrap();
    assert!(store.insert(request).await.is_err());
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_review_transitions_only_pending() {
    let store = InMemoryChangeRequestStore::new();
    let request = store.insert(pending_request()).await.unwrap();

    let approval = Review::approve("admin@example.com", Some("looks good".into()));
    let ReviewTransition::Reviewed(approved) = store.review(request.id, &approval).await.unwrap()
    else {
        panic!("expected the pending request to be reviewed");
    };
    assert_eq!(approved.status, ChangeStatus::Approved);
    assert_eq!(approved.review_notes.as_deref(), Some("looks good"));

    let rejection = Review::reject("other@example.com", None);
    let ReviewTransition::AlreadyReviewed(unchanged) =
        store.review(request.id, &rejection).await.unwrap()
    else {
        panic!("expected a second review to be refused");
    };
    assert_eq!(unchanged, approved);

    assert_eq!(
        store.review(Uuid::new_v4(), &rejection).await.unwrap(),
        ReviewTransition::NotFound
    );
}

#[tokio::test]
async fn test_store_records_application() {
    let store = InMemoryChangeRequestStore::new();
    let request = store.insert(pending_request()).await.unwrap();
    let application = Application::Applied {
        applied_at: Utc::now(),
        result: Some(json!({"id": "p1"})),
    };

    let updated = store
        .record_application(request.id, &application)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.application, Some(application.clone()));

    assert!(store
        .record_application(Uuid::new_v4(), &application)
        .await
        .unwrap()
        .is_none());
}
