/// Default environment variable containing the idempotency table name
pub const IDEMPOTENCY_TABLE: &'static str = "IDEMPOTENCY_TABLE";
/// Default environment variable containing the key path expression
pub const IDEMPOTENCY_KEY_PATH: &'static str = "IDEMPOTENCY_KEY_PATH";
/// Default environment variable containing the key scope prefix
pub const IDEMPOTENCY_KEY_SCOPE: &'static str = "IDEMPOTENCY_KEY_SCOPE";
/// Default environment variable containing the in-progress TTL in seconds
pub const IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS: &'static str = "IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS";
/// Default environment variable containing the completed-result TTL in seconds
pub const IDEMPOTENCY_RESULT_TTL_SECONDS: &'static str = "IDEMPOTENCY_RESULT_TTL_SECONDS";
/// Function name set by the Lambda runtime, used as the default key scope
pub const AWS_LAMBDA_FUNCTION_NAME: &'static str = "AWS_LAMBDA_FUNCTION_NAME";
