use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use model::env::{
    IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS, IDEMPOTENCY_KEY_PATH, IDEMPOTENCY_KEY_SCOPE,
    IDEMPOTENCY_RESULT_TTL_SECONDS, IDEMPOTENCY_TABLE,
};
use std::env;

/// Create an API Gateway proxy request carrying a set body
pub fn apigw_request_with_body(body: &str) -> ApiGatewayProxyRequest {
    ApiGatewayProxyRequest {
        body: Some(body.to_string()),
        ..Default::default()
    }
}

/// The request body the sample function expects
pub fn hello_body(address: &str, delay: i64) -> String {
    format!(r#"{{"address": "{address}", "delay": {delay}}}"#)
}

/// Test configuration values
pub const TEST_TABLE: &str = "idempotency";
pub const TEST_KEY_SCOPE: &str = "helloidem";

/// Setup default environment variables used in testing
pub fn setup_default_env() {
    unsafe {
        env::set_var(IDEMPOTENCY_TABLE, TEST_TABLE);
        env::set_var(IDEMPOTENCY_KEY_PATH, "json(body).address");
        env::set_var(IDEMPOTENCY_KEY_SCOPE, TEST_KEY_SCOPE);
        env::set_var(IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS, "30");
        env::set_var(IDEMPOTENCY_RESULT_TTL_SECONDS, "3600");
    }
}
