use model::env::{
    AWS_LAMBDA_FUNCTION_NAME, IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS, IDEMPOTENCY_KEY_PATH,
    IDEMPOTENCY_KEY_SCOPE, IDEMPOTENCY_RESULT_TTL_SECONDS,
};
use std::env;
use std::time::Duration;

/// Settings for one coordinator. Constructed once by the owner and passed
/// into `IdempotencyCoordinator::new`, never held as process-global state.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// Path expression locating the designated fields in the request
    pub key_path: String,
    /// Prefix separating this function's keys from other users of the table
    pub key_scope: String,
    /// How long a claim may stay unfinished before it is reclaimable
    pub in_progress_ttl: Duration,
    /// How long a completed result is served before the key expires
    pub result_ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        IdempotencyConfig {
            key_path: "json(body).address".to_string(),
            key_scope: "function".to_string(),
            in_progress_ttl: Duration::from_secs(30),
            result_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl IdempotencyConfig {
    /// Build a config from the environment, falling back to defaults.
    /// The key scope falls back to the Lambda function name.
    pub fn from_env() -> Self {
        let defaults: IdempotencyConfig = IdempotencyConfig::default();

        IdempotencyConfig {
            key_path: env::var(IDEMPOTENCY_KEY_PATH).unwrap_or(defaults.key_path),
            key_scope: env::var(IDEMPOTENCY_KEY_SCOPE)
                .or_else(|_| env::var(AWS_LAMBDA_FUNCTION_NAME))
                .unwrap_or(defaults.key_scope),
            in_progress_ttl: seconds_from_env(
                IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS,
                defaults.in_progress_ttl,
            ),
            result_ttl: seconds_from_env(IDEMPOTENCY_RESULT_TTL_SECONDS, defaults.result_ttl),
        }
    }
}

fn seconds_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-wide, so defaults and overrides are
    // exercised in a single test to keep the reads ordered.
    #[test]
    fn from_env_applies_defaults_then_overrides() {
        let defaults: IdempotencyConfig = IdempotencyConfig::from_env();

        assert_eq!("json(body).address", defaults.key_path);
        assert_eq!(Duration::from_secs(30), defaults.in_progress_ttl);
        assert_eq!(Duration::from_secs(3600), defaults.result_ttl);

        unsafe {
            env::set_var(IDEMPOTENCY_KEY_PATH, "json(body).request_id");
            env::set_var(IDEMPOTENCY_KEY_SCOPE, "helloidem");
            env::set_var(IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS, "5");
            env::set_var(IDEMPOTENCY_RESULT_TTL_SECONDS, "120");
        }

        let overridden: IdempotencyConfig = IdempotencyConfig::from_env();

        assert_eq!("json(body).request_id", overridden.key_path);
        assert_eq!("helloidem", overridden.key_scope);
        assert_eq!(Duration::from_secs(5), overridden.in_progress_ttl);
        assert_eq!(Duration::from_secs(120), overridden.result_ttl);

        unsafe {
            env::remove_var(IDEMPOTENCY_KEY_PATH);
            env::remove_var(IDEMPOTENCY_KEY_SCOPE);
            env::remove_var(IDEMPOTENCY_IN_PROGRESS_TTL_SECONDS);
            env::remove_var(IDEMPOTENCY_RESULT_TTL_SECONDS);
        }
    }

    #[test]
    fn unparseable_ttl_falls_back_to_default() {
        assert_eq!(
            Duration::from_secs(30),
            seconds_from_env("IDEMPOTENCY_UNSET_TTL", Duration::from_secs(30))
        );
    }
}
