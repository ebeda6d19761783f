use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection configuration (filters, operationalized metrics, document streams) pushed by the
/// Quick Pulse service.
///
/// The content is opaque to this crate and kept verbatim. Only the ETag is used, to find out
/// whether the service has a newer configuration than the one the caller already uses.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CollectionConfigurationInfo {
    /// Version token of this configuration.
    #[serde(rename = "ETag")]
    pub etag: String,

    /// Everything else in the configuration.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}
