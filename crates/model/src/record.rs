use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single guarded request as held by the persistence store.
/// This matches the `IdempotencyRecord` used by the lambda-powertools libraries.
///
/// https://docs.powertools.aws.dev/lambda/typescript/latest/utilities/idempotency/
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub status: RecordStatus,
    /// Epoch millis after which a completed result is treated as absent
    pub expiry_timestamp: u64,
    /// Epoch millis after which an unfinished claim is stale and reclaimable
    pub in_progress_expiry_timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    InProgress,
    Completed,
}

impl IdempotencyRecord {
    /// A freshly claimed record, the only shape a caller may insert.
    pub fn in_progress(
        idempotency_key: &str,
        in_progress_expiry_timestamp: u64,
        expiry_timestamp: u64,
    ) -> Self {
        IdempotencyRecord {
            idempotency_key: idempotency_key.to_string(),
            status: RecordStatus::InProgress,
            expiry_timestamp,
            in_progress_expiry_timestamp,
            response_data: None,
        }
    }

    /// Transition the claim to a completed record holding the result.
    /// The result is written exactly once and never overwritten afterwards.
    pub fn complete(self, response_data: serde_json::Value, expiry_timestamp: u64) -> Self {
        IdempotencyRecord {
            status: RecordStatus::Completed,
            expiry_timestamp,
            response_data: Some(response_data),
            ..self
        }
    }

    /// The status of this record once expiry is accounted for.
    /// `None` means the record is logically absent and its key re-claimable,
    /// regardless of whether the store has physically deleted it.
    pub fn live_status(&self, now_millis: u64) -> Option<RecordStatus> {
        if now_millis >= self.expiry_timestamp {
            return None;
        }

        match self.status {
            RecordStatus::InProgress if now_millis >= self.in_progress_expiry_timestamp => None,
            status => Some(status),
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System clock before unix epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_progress_record_is_live_before_expiry() {
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);

        assert_eq!(Some(RecordStatus::InProgress), record.live_status(500));
        assert_eq!(None, record.response_data);
    }

    #[test]
    fn stale_claim_is_absent() {
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000);

        assert_eq!(None, record.live_status(1_000));
    }

    #[test]
    fn completing_a_claim_stores_the_result() {
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000)
            .complete(json!({"message": "hello world"}), 20_000);

        assert_eq!(Some(RecordStatus::Completed), record.live_status(15_000));
        assert_eq!(
            Some(json!({"message": "hello world"})),
            record.response_data
        );
    }

    #[test]
    fn expired_result_is_absent() {
        let record: IdempotencyRecord = IdempotencyRecord::in_progress("key", 1_000, 10_000)
            .complete(json!("result"), 20_000);

        assert_eq!(None, record.live_status(20_000));
    }

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        assert_eq!(
            "\"IN_PROGRESS\"",
            serde_json::to_string(&RecordStatus::InProgress).unwrap()
        );
        assert_eq!(
            "\"COMPLETED\"",
            serde_json::to_string(&RecordStatus::Completed).unwrap()
        );
    }
}
