use crate::{IdempotencyConfig, IdempotencyError};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Derives the stable record key identifying a logical request.
///
/// The configured path expression walks the parsed request with dotted
/// segments. A leading `json(field)` segment parses that string field as
/// embedded JSON first, so a key can come from structured data nested
/// inside a string-typed transport field, e.g. `json(body).address`.
pub struct KeyExtractor {
    path: KeyPath,
    scope: String,
}

impl KeyExtractor {
    pub fn new(config: &IdempotencyConfig) -> Result<KeyExtractor, IdempotencyError> {
        Ok(KeyExtractor {
            path: KeyPath::parse(&config.key_path)?,
            scope: config.key_scope.clone(),
        })
    }

    /// Derive the record key for a request.
    ///
    /// Equal designated fields always produce the same key; this is the
    /// anchor of the whole deduplication guarantee. Resolution failure is a
    /// hard error, the request cannot be safely deduplicated.
    pub fn derive_key(&self, request: &Value) -> Result<String, IdempotencyError> {
        let resolved: Value = self.resolve(request)?;

        if resolved.is_null() {
            return Err(self.error("path resolved to null"));
        }

        // serde_json renders object keys sorted, so structurally equal
        // values serialize identically
        let canonical: String = serde_json::to_string(&resolved)
            .map_err(|err| self.error(format!("could not serialize resolved value: {err}")))?;

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());

        Ok(format!("{}#{}", self.scope, hex::encode(hasher.finalize())))
    }

    fn resolve(&self, request: &Value) -> Result<Value, IdempotencyError> {
        let mut current: Value = match &self.path.embedded_json_field {
            Some(field) => {
                let embedded: &Value = request
                    .get(field)
                    .ok_or_else(|| self.error(format!("request has no field `{field}`")))?;
                let text: &str = embedded
                    .as_str()
                    .ok_or_else(|| self.error(format!("field `{field}` is not a string")))?;

                serde_json::from_str(text)
                    .map_err(|err| self.error(format!("field `{field}` is not valid JSON: {err}")))?
            }
            None => request.clone(),
        };

        for segment in &self.path.segments {
            current = current
                .get(segment)
                .cloned()
                .ok_or_else(|| self.error(format!("no value at segment `{segment}`")))?;
        }

        Ok(current)
    }

    fn error(&self, reason: impl Into<String>) -> IdempotencyError {
        key_resolution_error(&self.path.raw, reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct KeyPath {
    raw: String,
    embedded_json_field: Option<String>,
    segments: Vec<String>,
}

impl KeyPath {
    fn parse(expression: &str) -> Result<KeyPath, IdempotencyError> {
        let (embedded_json_field, rest) = match expression.strip_prefix("json(") {
            Some(tail) => {
                let (field, rest) = tail
                    .split_once(')')
                    .ok_or_else(|| key_resolution_error(expression, "unterminated `json(`"))?;
                if field.is_empty() {
                    return Err(key_resolution_error(expression, "empty `json()` field"));
                }

                let rest: &str = match rest {
                    "" => "",
                    dotted => dotted.strip_prefix('.').ok_or_else(|| {
                        key_resolution_error(expression, "expected `.` after `json(..)`")
                    })?,
                };

                (Some(field.to_string()), rest)
            }
            None => (None, expression),
        };

        let segments: Vec<String> = match rest {
            "" => Vec::new(),
            dotted => dotted.split('.').map(str::to_string).collect(),
        };

        if segments.iter().any(String::is_empty) {
            return Err(key_resolution_error(expression, "empty path segment"));
        }
        if embedded_json_field.is_none() && segments.is_empty() {
            return Err(key_resolution_error(expression, "empty path expression"));
        }

        Ok(KeyPath {
            raw: expression.to_string(),
            embedded_json_field,
            segments,
        })
    }
}

fn key_resolution_error(path: &str, reason: impl Into<String>) -> IdempotencyError {
    IdempotencyError::KeyResolution {
        path: path.to_string(),
        reason: reason.into(),
    }
}
