use async_trait::async_trait;
use lambda_runtime::tracing;
use model::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// The request body carried inside the API Gateway event.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRequest {
    pub address: String,
    #[serde(default)]
    pub delay: i64,
}

/// Failure of the upstream fetch, the only business failure the handler
/// translates into a transport response.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch `{address}`: {reason}")]
pub struct FetchError {
    pub address: String,
    pub reason: String,
}

/// The operation guarded by the coordinator.
#[async_trait]
pub trait BusinessLogic: Send + Sync {
    async fn invoke(&self, request: PageRequest) -> Result<Value, Error>;
}

/// Fetches the requested page, then waits out the configured delay.
pub struct PageFetcher {
    http_client: reqwest::Client,
}

impl PageFetcher {
    pub fn new() -> Self {
        PageFetcher {
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BusinessLogic for PageFetcher {
    async fn invoke(&self, request: PageRequest) -> Result<Value, Error> {
        let contents: String = self
            .http_client
            .get(&request.address)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| fetch_error(&request.address, &err))?
            .text()
            .await
            .map_err(|err| fetch_error(&request.address, &err))?;

        tracing::info!("Fetched [{}] bytes from {}", contents.len(), request.address);

        tokio::time::sleep(Duration::from_secs(request.delay.max(0) as u64)).await;

        Ok(json!({
            "message": "hello world",
            "location": contents.trim_end(),
        }))
    }
}

fn fetch_error(address: &str, err: &reqwest::Error) -> FetchError {
    FetchError {
        address: address.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_defaults_to_zero() {
        let request: PageRequest =
            serde_json::from_str(r#"{"address": "https://example.com"}"#).unwrap();

        assert_eq!(0, request.delay);
    }

    #[test]
    fn missing_address_is_rejected() {
        let result: Result<PageRequest, _> = serde_json::from_str(r#"{"delay": 8}"#);

        assert!(result.is_err());
    }
}
