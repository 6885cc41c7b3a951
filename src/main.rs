use crate::handler::handle_request;
use crate::page_service::PageFetcher;
use aws_config::BehaviorVersion;
use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use idempotency::{IdempotencyConfig, IdempotencyCoordinator, KeyExtractor};
use lambda_runtime::{service_fn, tracing, Error, LambdaEvent};
use model::env::IDEMPOTENCY_TABLE;
use std::sync::Arc;
use store_dynamodb::DynamoDbPersistenceStore;

mod handler;
mod page_service;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Pull the table from the environment by default
    let table_name: String = std::env::var(IDEMPOTENCY_TABLE)
        .expect(format!("Missing {} environment variable", IDEMPOTENCY_TABLE).as_str());

    let dynamodb_client: aws_sdk_dynamodb::Client = aws_sdk_dynamodb::Client::new(
        &aws_config::load_defaults(BehaviorVersion::latest()).await,
    );

    let config: IdempotencyConfig = IdempotencyConfig::from_env();
    let extractor: KeyExtractor = KeyExtractor::new(&config)?;
    let coordinator: IdempotencyCoordinator = IdempotencyCoordinator::new(
        Arc::new(DynamoDbPersistenceStore::new(dynamodb_client, table_name)),
        config,
    );
    let fetcher: PageFetcher = PageFetcher::new();

    let coordinator_ref: &IdempotencyCoordinator = &coordinator;
    let extractor_ref: &KeyExtractor = &extractor;
    let fetcher_ref: &PageFetcher = &fetcher;

    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<ApiGatewayProxyRequest>| async move {
            handle_request(coordinator_ref, extractor_ref, fetcher_ref, event).await
        },
    ))
    .await
}
