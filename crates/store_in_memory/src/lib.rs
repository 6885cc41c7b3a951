use async_trait::async_trait;
use model::{IdempotencyRecord, RecordStatus};
use store::StoreErrorReason::{LostClaim, MissingRecord};
use store::StoreOperation::Complete;
use store::{PersistenceStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Map-backed store for tests and local runs.
/// The single mutex stands in for the conditional-write atomicity a real
/// store provides per key.
pub struct InMemoryPersistenceStore {
    records: Arc<Mutex<HashMap<String, IdempotencyRecord>>>,
}

impl Default for InMemoryPersistenceStore {
    fn default() -> Self {
        InMemoryPersistenceStore {
            records: Arc::new(Mutex::new(Default::default())),
        }
    }
}

#[async_trait]
impl PersistenceStore for InMemoryPersistenceStore {
    async fn try_insert_in_progress(
        &self,
        record: &IdempotencyRecord,
        now_millis: u64,
    ) -> Result<bool, StoreError> {
        let mut guard = self.records.lock().unwrap();

        let live: bool = guard
            .get(&record.idempotency_key)
            .and_then(|existing| existing.live_status(now_millis))
            .is_some();
        if live {
            return Ok(false);
        }

        guard.insert(record.idempotency_key.clone(), record.clone());

        Ok(true)
    }

    async fn get_record(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let guard = self.records.lock().unwrap();

        Ok(guard.get(key).cloned())
    }

    async fn complete(
        &self,
        key: &str,
        response_data: serde_json::Value,
        expiry_timestamp: u64,
    ) -> Result<(), StoreError> {
        let mut guard = self.records.lock().unwrap();

        let record: &IdempotencyRecord = guard
            .get(key)
            .ok_or_else(|| StoreError::new(key.to_string(), Complete, MissingRecord))?;
        if record.status != RecordStatus::InProgress {
            return Err(StoreError::new(key.to_string(), Complete, LostClaim));
        }

        let completed: IdempotencyRecord =
            record.clone().complete(response_data, expiry_timestamp);
        guard.insert(key.to_string(), completed);

        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn claim_succeeds_on_absent_key() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);

        let claimed: bool = store
            .try_insert_in_progress(&record, 0)
            .await
            .expect("Insert should succeed");

        assert!(claimed);
    }

    #[tokio::test]
    async fn claim_refused_while_record_live() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);

        store.try_insert_in_progress(&record, 0).await.unwrap();
        let claimed: bool = store.try_insert_in_progress(&record, 500).await.unwrap();

        assert!(!claimed);
    }

    #[tokio::test]
    async fn stale_claim_is_overwritten() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let abandoned: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);
        store.try_insert_in_progress(&abandoned, 0).await.unwrap();

        let retry: IdempotencyRecord = IdempotencyRecord::in_progress("key", 3_000, 12_000);
        let claimed: bool = store.try_insert_in_progress(&retry, 2_000).await.unwrap();

        assert!(claimed);
        let stored: IdempotencyRecord = store.get_record("key").await.unwrap().unwrap();
        assert_eq!(3_000, stored.in_progress_expiry_timestamp);
    }

    #[tokio::test]
    async fn expired_result_is_overwritten() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);
        store.try_insert_in_progress(&record, 0).await.unwrap();
        store.complete("key", json!("result"), 10_000).await.unwrap();

        let retry: IdempotencyRecord = IdempotencyRecord::in_progress("key", 11_000, 20_000);
        let claimed: bool = store.try_insert_in_progress(&retry, 10_000).await.unwrap();

        assert!(claimed);
    }

    #[tokio::test]
    async fn complete_stores_the_result() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);
        store.try_insert_in_progress(&record, 0).await.unwrap();

        store
            .complete("key", json!({"location": "127.0.0.1"}), 15_000)
            .await
            .expect("Complete should succeed");

        let stored: IdempotencyRecord = store.get_record("key").await.unwrap().unwrap();
        assert_eq!(RecordStatus::Completed, stored.status);
        assert_eq!(Some(json!({"location": "127.0.0.1"})), stored.response_data);
        assert_eq!(15_000, stored.expiry_timestamp);
    }

    #[tokio::test]
    async fn complete_fails_without_a_claim() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();

        let result = store.complete("key", json!("result"), 10_000).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn released_key_is_reclaimable() {
        let store: InMemoryPersistenceStore = InMemoryPersistenceStore::default();
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);
        store.try_insert_in_progress(&record, 0).await.unwrap();

        store.release("key").await.expect("Release should succeed");

        assert_eq!(None, store.get_record("key").await.unwrap());
        assert!(store.try_insert_in_progress(&record, 500).await.unwrap());
    }
}
