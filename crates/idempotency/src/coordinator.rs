use crate::{IdempotencyConfig, IdempotencyError};
use lambda_runtime::tracing;
use model::{now_millis, Error, IdempotencyRecord, RecordStatus};
use store::StoreErrorReason::BadRecord;
use store::StoreOperation::GetRecord;
use store::{PersistenceStore, StoreError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The resolution of one guarded execution.
#[derive(Debug)]
pub enum Outcome {
    /// The business result, freshly produced or served from the store
    Success(serde_json::Value),
    /// A live claim exists for the key; nothing executed and nothing was written
    Conflict,
    /// Business logic failed and the claim was released
    Failure(Error),
}

/// Guards a business call so that, per derived key, it executes at most once.
///
/// All coordination happens through conditional writes against the store;
/// no in-memory lock is held across invocations and none would help, since
/// duplicate submissions may arrive on different machines.
pub struct IdempotencyCoordinator {
    store: Arc<dyn PersistenceStore>,
    config: IdempotencyConfig,
    // Epoch millis, zero until a deadline is registered
    invocation_deadline: AtomicU64,
}

impl IdempotencyCoordinator {
    pub fn new(store: Arc<dyn PersistenceStore>, config: IdempotencyConfig) -> Self {
        IdempotencyCoordinator {
            store,
            config,
            invocation_deadline: AtomicU64::new(0),
        }
    }

    /// Cap the in-progress expiry to the enclosing invocation's deadline, so
    /// a claim held by an invocation the runtime killed mid-flight does not
    /// outlive the invocation by the full in-progress TTL.
    pub fn register_invocation_deadline(&self, deadline_millis: u64) {
        self.invocation_deadline
            .store(deadline_millis, Ordering::Relaxed);
    }

    /// Run `business_logic` under the key's claim.
    ///
    /// Exactly one caller wins the conditional insert per claim epoch and
    /// invokes the logic; every other caller observes the stored result or
    /// `Conflict`. Store failures propagate as errors, failing the
    /// invocation closed instead of silently executing a duplicate.
    pub async fn execute<BusinessLogic, Fut>(
        &self,
        key: &str,
        business_logic: BusinessLogic,
    ) -> Result<Outcome, IdempotencyError>
    where
        BusinessLogic: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, Error>>,
    {
        let now: u64 = now_millis();
        let claim: IdempotencyRecord = IdempotencyRecord::in_progress(
            key,
            self.in_progress_expiry(now),
            now + self.result_ttl_millis(),
        );

        let claimed: bool = self.store.try_insert_in_progress(&claim, now).await?;
        if !claimed {
            return self.observe_existing(key, now).await;
        }

        tracing::debug!(key, "Claimed idempotency record");

        match business_logic().await {
            Ok(response_data) => {
                let expiry: u64 = now_millis() + self.result_ttl_millis();
                self.store.complete(key, response_data.clone(), expiry).await?;

                tracing::debug!(key, "Stored completed record");

                Ok(Outcome::Success(response_data))
            }
            Err(err) => {
                // Free the key now, a retry should not wait out the claim
                if let Err(release_err) = self.store.release(key).await {
                    tracing::warn!(key, "Failed to release claim: {release_err}");
                }

                Ok(Outcome::Failure(err))
            }
        }
    }

    /// The conditional insert was refused, so a record existed an instant
    /// ago. Read it once to tell a served result from a live claim.
    async fn observe_existing(&self, key: &str, now: u64) -> Result<Outcome, IdempotencyError> {
        let record: Option<IdempotencyRecord> = self.store.get_record(key).await?;

        match record.as_ref().and_then(|r| r.live_status(now)) {
            Some(RecordStatus::Completed) => {
                let response_data: serde_json::Value = record
                    .and_then(|r| r.response_data)
                    .ok_or_else(|| completed_without_payload(key))?;

                tracing::debug!(key, "Serving stored result");

                Ok(Outcome::Success(response_data))
            }
            // Either the claim is still live, or it was resolved and expired
            // between our two store calls; the concurrent claimant owns this
            // epoch either way
            Some(RecordStatus::InProgress) | None => Ok(Outcome::Conflict),
        }
    }

    fn in_progress_expiry(&self, now: u64) -> u64 {
        let expiry: u64 = now + self.config.in_progress_ttl.as_millis() as u64;

        match self.invocation_deadline.load(Ordering::Relaxed) {
            0 => expiry,
            deadline => expiry.min(deadline),
        }
    }

    fn result_ttl_millis(&self) -> u64 {
        self.config.result_ttl.as_millis() as u64
    }
}

fn completed_without_payload(key: &str) -> StoreError {
    StoreError::new(
        key.to_string(),
        GetRecord,
        BadRecord("completed record has no response data".to_string()),
    )
}
