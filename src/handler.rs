use crate::page_service::{BusinessLogic, FetchError, PageRequest};
use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use http::{HeaderMap, HeaderValue};
use idempotency::{IdempotencyCoordinator, KeyExtractor, Outcome};
use lambda_runtime::tracing::{Instrument, Span};
use lambda_runtime::{tracing, LambdaEvent};
use model::Error;
use serde_json::Value;

const CONFLICT_BODY: &str = r#"{ "message": "IdempotencyAlreadyInProgress" }"#;
const IO_ERROR_BODY: &str = r#"{ "message": "IO error occurred" }"#;

/// Run one API Gateway invocation through the coordinator.
///
/// Only business outcomes become transport responses here; a request whose
/// key cannot be derived, or a store that cannot uphold the claim protocol,
/// fails the invocation instead.
pub async fn handle_request(
    coordinator: &IdempotencyCoordinator,
    extractor: &KeyExtractor,
    business: &dyn BusinessLogic,
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (request, context) = event.into_parts();

    // A claim must not outlive the invocation holding it
    coordinator.register_invocation_deadline(context.deadline);

    let request_value: Value = serde_json::to_value(&request)?;
    let key: String = extractor.derive_key(&request_value)?;

    let page_request: PageRequest =
        serde_json::from_str(request.body.as_deref().unwrap_or_default())?;

    let request_span: Span = tracing::span!(tracing::Level::INFO, "Idempotent request", key);
    let outcome: Outcome = coordinator
        .execute(&key, || business.invoke(page_request))
        .instrument(request_span)
        .await?;

    Ok(match outcome {
        Outcome::Success(response_data) => json_response(200, response_data.to_string()),
        Outcome::Conflict => json_response(409, CONFLICT_BODY.to_string()),
        Outcome::Failure(err) if err.is::<FetchError>() => {
            tracing::error!(key, "Upstream fetch failed: {err}");

            json_response(500, IO_ERROR_BODY.to_string())
        }
        // Anything else is not transport-facing
        Outcome::Failure(err) => return Err(err),
    })
}

fn json_response(status_code: i64, body: String) -> ApiGatewayProxyResponse {
    ApiGatewayProxyResponse {
        status_code,
        headers: default_headers(),
        multi_value_headers: HeaderMap::new(),
        body: Some(Body::Text(body)),
        is_base64_encoded: false,
    }
}

fn default_headers() -> HeaderMap {
    let mut headers: HeaderMap = HeaderMap::new();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("*"));

    headers
}
