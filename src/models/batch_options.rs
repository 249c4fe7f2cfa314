use serde::{Deserialize, Serialize};

use crate::callbacks::StoredCommand;

/// Options snapshot stored with a batch.
///
/// Copied from the pending batch when the batch is stored and never modified
/// afterwards. Routing fields are resolved against the configured defaults at
/// dispatch, so a stored snapshot always names its connection and queue.
///
/// Serialized into the `options` JSONB column:
/// ```json
/// {
///   "connection": "default",
///   "queue": "imports",
///   "allow_failures": false,
///   "success": [{"name": "notify_import_done", "arguments": {"user_id": 7}}],
///   "catch": [],
///   "finally": []
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub allow_failures: bool,
    #[serde(default)]
    pub success: Vec<StoredCommand>,
    #[serde(default)]
    pub catch: Vec<StoredCommand>,
    #[serde(default)]
    pub finally: Vec<StoredCommand>,
}

impl BatchOptions {
    pub fn allows_failures(&self) -> bool {
        self.allow_failures
    }

    /// Fill in routing the batch left unset
    pub fn with_default_routing(mut self, connection: &str, queue: &str) -> Self {
        self.connection.get_or_insert_with(|| connection.to_string());
        self.queue.get_or_insert_with(|| queue.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing_keeps_explicit_values() {
        let options = BatchOptions {
            queue: Some("imports".to_string()),
            ..Default::default()
        }
        .with_default_routing("default", "default");

        assert_eq!(options.connection.as_deref(), Some("default"));
        assert_eq!(options.queue.as_deref(), Some("imports"));
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let options: BatchOptions = serde_json::from_str(r#"{"allow_failures": true}"#).unwrap();
        assert!(options.allows_failures());
        assert!(options.success.is_empty());
        assert!(options.connection.is_none());
    }
}
