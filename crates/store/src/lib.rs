use async_trait::async_trait;
use model::{Error, IdempotencyRecord};
use std::fmt::{Display, Formatter};

/// Persist idempotency records on behalf of the coordinator.
///
/// Correctness rests entirely on `try_insert_in_progress` being a single
/// conditional write at the store: a read-then-write pair reintroduces the
/// race the coordinator exists to close.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Attempt to claim `record.idempotency_key` by inserting the record.
    ///
    /// Returns false when a live record already exists for the key. A record
    /// whose relevant expiry has elapsed at `now_millis` counts as absent and
    /// is overwritten.
    async fn try_insert_in_progress(
        &self,
        record: &IdempotencyRecord,
        now_millis: u64,
    ) -> Result<bool, StoreError>;

    async fn get_record(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Transition an owned claim to completed, storing the serialized result.
    /// Fails with `LostClaim` when the key no longer holds an in-progress record.
    async fn complete(
        &self,
        key: &str,
        response_data: serde_json::Value,
        expiry_timestamp: u64,
    ) -> Result<(), StoreError>;

    /// Delete the record so a later retry can claim the key again.
    /// Releasing an already-absent key is not an error.
    async fn release(&self, key: &str) -> Result<(), StoreError>;
}

/// Errors arising from the persistence store.
#[derive(Debug)]
pub struct StoreError {
    pub key: String,

    pub operation: StoreOperation,
    pub reason: StoreErrorReason,
}

#[derive(Debug)]
pub enum StoreErrorReason {
    // An expected record was missing
    MissingRecord,
    // The key no longer holds the claim this caller made
    LostClaim,
    // The record could not be serialized or deserialized
    BadRecord(String),
    // An error from the underlying store; duplicate execution cannot be
    // ruled out, so the invocation must fail
    BackendFailure(Error),
}

#[derive(Debug, Clone)]
pub enum StoreOperation {
    TryInsertInProgress,
    GetRecord,
    Complete,
    Release,
}

impl StoreError {
    pub fn new(key: String, operation: StoreOperation, reason: StoreErrorReason) -> Self {
        StoreError {
            key,
            operation,
            reason,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).as_str())
    }
}

impl std::error::Error for StoreError {}
