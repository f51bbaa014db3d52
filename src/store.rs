use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::models::{Collection, Entity};

/// A schemaless record as the store sees it.
pub type Record = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "_id";
pub const CREATED_FIELD: &str = "_createdDate";
pub const UPDATED_FIELD: &str = "_updatedDate";

/// Result of a create-if-absent call.
#[derive(Debug, Clone)]
pub struct Created {
    pub record: Record,
    /// `false` when a record with the same key already existed and was returned instead.
    pub inserted: bool,
}

#[derive(Debug, Clone)]
pub enum CasOutcome {
    Applied(Record),
    /// The guarded field did not hold the expected value; carries the current record.
    Mismatch(Record),
}

/// Builds a patch from the record it will be merged into.
pub type PatchFn<'a> = &'a (dyn Fn(&Record) -> Record + Send + Sync);

/// Keyed-record CRUD over named collections.
///
/// Besides plain CRUD, backends provide two atomic primitives: `create_unique`
/// (insert unless a record with the same `key_field` value exists) and
/// `compare_and_set` (apply a patch only while one field holds an expected value).
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>>;

    async fn create(&self, collection: Collection, record: Record) -> Result<Record>;

    /// Merges `patch` into the record named by its `_id`.
    async fn update(&self, collection: Collection, patch: Record) -> Result<Record>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    async fn create_unique(&self, collection: Collection, key_field: &str, record: Record) -> Result<Created>;

    /// Merges `patch` (which names the record by `_id` and carries a new
    /// `key_field` value) while keeping `key_field` unique in the collection.
    /// Another record holding the key is a `Conflict`.
    async fn update_unique(&self, collection: Collection, key_field: &str, patch: Record) -> Result<Record>;

    /// Applies the patch built from the current record while `field` holds
    /// `expected`. `expected == None` matches an absent or null field. The
    /// patch is computed from the exact record being replaced.
    async fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        expected: Option<&Value>,
        patch: PatchFn<'_>,
    ) -> Result<CasOutcome>;
}

pub fn record_id(record: &Record) -> Result<&str> {
    match record.get(ID_FIELD).and_then(|v| v.as_str()) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(AppError::BadRequest("Record is missing _id".to_string())),
    }
}

pub(crate) fn field_matches(record: &Record, field: &str, expected: Option<&Value>) -> bool {
    match (record.get(field), expected) {
        (None, None) | (Some(Value::Null), None) => true,
        (Some(current), Some(expected)) => current == expected,
        _ => false,
    }
}

/// Normalised key used by `create_unique`; string keys compare case-insensitively.
pub(crate) fn unique_key(record: &Record, key_field: &str) -> Result<String> {
    match record.get(key_field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_lowercase()),
        Some(Value::Null) | None => Err(AppError::BadRequest(format!("Record is missing {}", key_field))),
        Some(other) => Ok(other.to_string()),
    }
}

pub(crate) fn stamp_created(record: &mut Record) {
    if !record.contains_key(CREATED_FIELD) {
        record.insert(CREATED_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));
    }
}

pub(crate) fn merge_patch(target: &mut Record, patch: Record) {
    for (key, value) in patch {
        if key == ID_FIELD || key == CREATED_FIELD {
            continue;
        }
        target.insert(key, value);
    }
    target.insert(UPDATED_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal("Entity did not serialize to an object".to_string())),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

pub async fn fetch_all<T: Entity>(store: &dyn EntityStore) -> Result<Vec<T>> {
    store
        .get_all(T::COLLECTION)
        .await?
        .into_iter()
        .map(from_record)
        .collect()
}

pub async fn fetch<T: Entity>(store: &dyn EntityStore, id: &str) -> Result<Option<T>> {
    store.get(T::COLLECTION, id).await?.map(from_record).transpose()
}

pub async fn insert<T: Entity>(store: &dyn EntityStore, entity: &T) -> Result<T> {
    tracing::debug!("Inserting {} {}", T::COLLECTION, entity.id());
    let created = store.create(T::COLLECTION, to_record(entity)?).await?;
    from_record(created)
}

pub async fn patch<T: Entity>(store: &dyn EntityStore, id: &str, mut fields: Record) -> Result<T> {
    fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    let updated = store.update(T::COLLECTION, fields).await?;
    from_record(updated)
}

pub async fn remove<T: Entity>(store: &dyn EntityStore, id: &str) -> Result<()> {
    store.delete(T::COLLECTION, id).await
}


/// In-process store. Each collection lives behind one dashmap entry, so holding
/// the entry guard serialises check-then-act sequences on that collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, BTreeMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self
            .collections
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|records| records.get(id).cloned()))
    }

    async fn create(&self, collection: Collection, mut record: Record) -> Result<Record> {
        let id = record_id(&record)?.to_string();
        let mut records = self.collections.entry(collection).or_default();
        if records.contains_key(&id) {
            return Err(AppError::Conflict(format!("{} {} already exists", collection, id)));
        }
        stamp_created(&mut record);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, collection: Collection, patch: Record) -> Result<Record> {
        let id = record_id(&patch)?.to_string();
        let mut records = self.collections.entry(collection).or_default();
        let current = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
        merge_patch(current, patch);
        Ok(current.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut records = self.collections.entry(collection).or_default();
        match records.remove(id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("{} {} not found", collection, id))),
        }
    }

    async fn create_unique(&self, collection: Collection, key_field: &str, mut record: Record) -> Result<Created> {
        let id = record_id(&record)?.to_string();
        let key = unique_key(&record, key_field)?;
        let mut records = self.collections.entry(collection).or_default();

        let existing = records
            .values()
            .find(|r| unique_key(r, key_field).map(|k| k == key).unwrap_or(false));
        if let Some(existing) = existing {
            return Ok(Created { record: existing.clone(), inserted: false });
        }
        if records.contains_key(&id) {
            return Err(AppError::Conflict(format!("{} {} already exists", collection, id)));
        }

        stamp_created(&mut record);
        records.insert(id, record.clone());
        Ok(Created { record, inserted: true })
    }

    async fn update_unique(&self, collection: Collection, key_field: &str, patch: Record) -> Result<Record> {
        let id = record_id(&patch)?.to_string();
        let key = unique_key(&patch, key_field)?;
        let mut records = self.collections.entry(collection).or_default();

        let taken = records
            .iter()
            .any(|(other, r)| *other != id && unique_key(r, key_field).map(|k| k == key).unwrap_or(false));
        if taken {
            return Err(AppError::Conflict(format!("{} {} is already taken", key_field, key)));
        }
        let current = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
        merge_patch(current, patch);
        Ok(current.clone())
    }

    async fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        expected: Option<&Value>,
        patch: PatchFn<'_>,
    ) -> Result<CasOutcome> {
        let mut records = self.collections.entry(collection).or_default();
        let current = records
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))?;
        if !field_matches(current, field, expected) {
            return Ok(CasOutcome::Mismatch(current.clone()));
        }
        let fields = patch(current);
        merge_patch(current, fields);
        Ok(CasOutcome::Applied(current.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn create_then_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .create(Collection::Courses, record(json!({"_id": "c1", "courseName": "Rust", "price": 10})))
            .await
            .unwrap();

        let updated = store
            .update(Collection::Courses, record(json!({"_id": "c1", "price": 12})))
            .await
            .unwrap();

        assert_eq!(updated["courseName"], "Rust");
        assert_eq!(updated["price"], 12);
        assert!(updated.contains_key(CREATED_FIELD));
        assert!(updated.contains_key(UPDATED_FIELD));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.create(Collection::Services, record(json!({"_id": "s1"}))).await.unwrap();
        let err = store.create(Collection::Services, record(json!({"_id": "s1"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_and_delete_unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        let err = store.update(Collection::Bookings, record(json!({"_id": "nope"}))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = store.delete(Collection::Bookings, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_unique_returns_existing_record_for_same_key() {
        let store = MemoryStore::new();
        let first = store
            .create_unique(Collection::UserProfiles, "email", record(json!({"_id": "p1", "email": "a@b.c"})))
            .await
            .unwrap();
        let second = store
            .create_unique(Collection::UserProfiles, "email", record(json!({"_id": "p2", "email": "A@b.c"})))
            .await
            .unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(second.record["_id"], "p1");
        assert_eq!(store.get_all(Collection::UserProfiles).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_create_unique_inserts_once() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_unique(
                        Collection::UserProfiles,
                        "email",
                        record(json!({"_id": format!("p{}", i), "email": "same@example.com"})),
                    )
                    .await
                    .unwrap()
                    .inserted
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.get_all(Collection::UserProfiles).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn compare_and_set_only_applies_on_expected_value() {
        let store = MemoryStore::new();
        store.create(Collection::Bookings, record(json!({"_id": "b1"}))).await.unwrap();

        let first = store
            .compare_and_set(Collection::Bookings, "b1", "adminOwnerId", None, &|_| record(json!({"adminOwnerId": "a1"})))
            .await
            .unwrap();
        assert!(matches!(first, CasOutcome::Applied(_)));

        let second = store
            .compare_and_set(Collection::Bookings, "b1", "adminOwnerId", None, &|_| record(json!({"adminOwnerId": "a2"})))
            .await
            .unwrap();
        match second {
            CasOutcome::Mismatch(current) => assert_eq!(current["adminOwnerId"], "a1"),
            CasOutcome::Applied(_) => panic!("second owner must not win"),
        }
    }

    #[tokio::test]
    async fn compare_and_set_builds_patch_from_the_replaced_record() {
        let store = MemoryStore::new();
        store.create(Collection::Bookings, record(json!({"_id": "b1", "taskHistory": "one"}))).await.unwrap();

        let append = |current: &Record| {
            let history = current["taskHistory"].as_str().unwrap_or_default();
            record(json!({"taskHistory": format!("{}\ntwo", history)}))
        };
        let outcome = store
            .compare_and_set(Collection::Bookings, "b1", "adminOwnerId", None, &append)
            .await
            .unwrap();
        match outcome {
            CasOutcome::Applied(current) => assert_eq!(current["taskHistory"], "one\ntwo"),
            CasOutcome::Mismatch(_) => panic!("unowned booking must accept the patch"),
        }
    }

    #[tokio::test]
    async fn update_unique_moves_the_key_and_rejects_taken_values() {
        let store = MemoryStore::new();
        store
            .create_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p1", "slug": "first"})))
            .await
            .unwrap();
        store
            .create_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p2", "slug": "second"})))
            .await
            .unwrap();

        let err = store
            .update_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p2", "slug": "first"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let renamed = store
            .update_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p2", "slug": "third"})))
            .await
            .unwrap();
        assert_eq!(renamed["slug"], "third");

        // the old value is free again, the new one is held
        let reused = store
            .create_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p3", "slug": "second"})))
            .await
            .unwrap();
        assert!(reused.inserted);
        let clash = store
            .create_unique(Collection::BlogPosts, "slug", record(json!({"_id": "p4", "slug": "third"})))
            .await
            .unwrap();
        assert!(!clash.inserted);
        assert_eq!(clash.record["_id"], "p2");
    }
}
