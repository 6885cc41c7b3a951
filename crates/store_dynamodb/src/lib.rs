use async_trait::async_trait;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use model::{IdempotencyRecord, RecordStatus};
use store::StoreErrorReason::{BackendFailure, BadRecord, LostClaim};
use store::StoreOperation::{Complete, GetRecord, Release, TryInsertInProgress};
use store::{PersistenceStore, StoreError, StoreOperation};
use std::collections::HashMap;

// Attribute names, matching the serde field names on `IdempotencyRecord`
const IDEMPOTENCY_KEY: &str = "idempotency_key";
const STATUS: &str = "status";
const EXPIRY_TIMESTAMP: &str = "expiry_timestamp";
const IN_PROGRESS_EXPIRY_TIMESTAMP: &str = "in_progress_expiry_timestamp";
const RESPONSE_DATA: &str = "response_data";

// A claim lands only where no record exists, the stored result has expired,
// or an earlier claim went stale without completing. Evaluated atomically by
// DynamoDB, so concurrent claimants for one key serialize here.
const CLAIM_CONDITION: &str = "attribute_not_exists(#key) \
    OR #expiry <= :now \
    OR (#status = :in_progress AND #in_progress_expiry <= :now)";

const COMPLETE_CONDITION: &str = "attribute_exists(#key) AND #status = :in_progress";

const COMPLETE_UPDATE: &str =
    "SET #status = :completed, #response_data = :response_data, #expiry = :expiry";

pub struct DynamoDbPersistenceStore {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
    consistent_read: bool,
}

impl DynamoDbPersistenceStore {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client, table_name: String) -> Self {
        DynamoDbPersistenceStore {
            table_name,
            dynamodb_client,
            // Claim decisions read their own writes
            consistent_read: true,
        }
    }

    fn key_attribute(key: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([(
            IDEMPOTENCY_KEY.to_string(),
            AttributeValue::S(key.to_string()),
        )])
    }

    fn status_value(status: RecordStatus, key: &str, operation: StoreOperation) -> Result<AttributeValue, StoreError> {
        serde_dynamo::to_attribute_value(status)
            .map_err(|err| StoreError::new(key.to_string(), operation, BadRecord(err.to_string())))
    }
}

#[async_trait]
impl PersistenceStore for DynamoDbPersistenceStore {
    async fn try_insert_in_progress(
        &self,
        record: &IdempotencyRecord,
        now_millis: u64,
    ) -> Result<bool, StoreError> {
        let key: &str = &record.idempotency_key;

        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(record).map_err(|err| {
                StoreError::new(
                    key.to_string(),
                    TryInsertInProgress,
                    BadRecord(err.to_string()),
                )
            })?;

        let result = self
            .dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(CLAIM_CONDITION)
            .expression_attribute_names("#key", IDEMPOTENCY_KEY)
            .expression_attribute_names("#status", STATUS)
            .expression_attribute_names("#expiry", EXPIRY_TIMESTAMP)
            .expression_attribute_names("#in_progress_expiry", IN_PROGRESS_EXPIRY_TIMESTAMP)
            .expression_attribute_values(":now", AttributeValue::N(now_millis.to_string()))
            .expression_attribute_values(
                ":in_progress",
                Self::status_value(RecordStatus::InProgress, key, TryInsertInProgress)?,
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            // A live record for the key; the caller decides hit vs conflict
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(PutItemError::is_conditional_check_failed_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(StoreError::new(
                key.to_string(),
                TryInsertInProgress,
                BackendFailure(err.into()),
            )),
        }
    }

    async fn get_record(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let output = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(self.consistent_read)
            .set_key(Some(Self::key_attribute(key)))
            .send()
            .await
            .map_err(|err| {
                StoreError::new(key.to_string(), GetRecord, BackendFailure(err.into()))
            })?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let record: IdempotencyRecord = serde_dynamo::from_item(item).map_err(|err| {
            StoreError::new(key.to_string(), GetRecord, BadRecord(err.to_string()))
        })?;

        Ok(Some(record))
    }

    async fn complete(
        &self,
        key: &str,
        response_data: serde_json::Value,
        expiry_timestamp: u64,
    ) -> Result<(), StoreError> {
        let response_attribute: AttributeValue = serde_dynamo::to_attribute_value(response_data)
            .map_err(|err| {
                StoreError::new(key.to_string(), Complete, BadRecord(err.to_string()))
            })?;

        let result = self
            .dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attribute(key)))
            .update_expression(COMPLETE_UPDATE)
            .condition_expression(COMPLETE_CONDITION)
            .expression_attribute_names("#key", IDEMPOTENCY_KEY)
            .expression_attribute_names("#status", STATUS)
            .expression_attribute_names("#response_data", RESPONSE_DATA)
            .expression_attribute_names("#expiry", EXPIRY_TIMESTAMP)
            .expression_attribute_values(
                ":completed",
                Self::status_value(RecordStatus::Completed, key, Complete)?,
            )
            .expression_attribute_values(
                ":in_progress",
                Self::status_value(RecordStatus::InProgress, key, Complete)?,
            )
            .expression_attribute_values(":response_data", response_attribute)
            .expression_attribute_values(":expiry", AttributeValue::N(expiry_timestamp.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(UpdateItemError::is_conditional_check_failed_exception) =>
            {
                Err(StoreError::new(key.to_string(), Complete, LostClaim))
            }
            Err(err) => Err(StoreError::new(
                key.to_string(),
                Complete,
                BackendFailure(err.into()),
            )),
        }
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attribute(key)))
            .send()
            .await
            .map_err(|err| {
                StoreError::new(key.to_string(), Release, BackendFailure(err.into()))
            })?;

        Ok(())
    }
}
