use std::{error::Error as StdError, fmt::Debug, time::Duration};

/// Errors that occurred while exchanging live metrics with the Quick Pulse service.
///
/// These never leave [`ping`](crate::QuickPulseServiceClient::ping) or
/// [`submit`](crate::QuickPulseServiceClient::submit). They are logged where they happen and the
/// exchange degrades to "no response" or "no configuration update".
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Live metrics data failed to serialize to JSON.
    ///
    /// Note: This is an error in this crate. If you spot this, please open an issue.
    #[error("serializing live metrics request failed with {0}")]
    SerializeRequest(serde_json::Error),

    /// Live metrics data failed to compress.
    #[error("compressing live metrics request failed with {0}")]
    CompressRequest(std::io::Error),

    /// The HTTP request could not be built, e.g. because an identity value is not a valid header
    /// value.
    #[error("building live metrics request failed with {0}")]
    BuildRequest(http::Error),

    /// Could not complete the HTTP request to the Quick Pulse service.
    #[error("sending live metrics request failed with {0}")]
    Connection(Box<dyn StdError + Send + Sync + 'static>),

    /// The Quick Pulse service did not answer within the configured timeout.
    #[error("live metrics request timed out after {0:?}")]
    Timeout(Duration),

    /// The Quick Pulse service answered with an unsuccessful status code.
    #[error("live metrics request failed with status {0}")]
    Status(u16),

    /// The collection configuration in a response body could not be deserialized.
    #[error("deserializing collection configuration failed with {0}")]
    DeserializeConfiguration(serde_json::Error),

    /// An operationalized metric declares an aggregation this crate cannot compute.
    #[error("unsupported aggregation {aggregation:?} for metric {metric_id:?}")]
    UnsupportedAggregation {
        /// Id of the operationalized metric.
        metric_id: String,
        /// Declared aggregation.
        aggregation: String,
    },

    /// Aggregating an operationalized metric produced NaN or infinity, which cannot be sent.
    #[error("aggregation of metric {metric_id:?} is not finite: {value}")]
    NonFiniteAggregation {
        /// Id of the operationalized metric.
        metric_id: String,
        /// Aggregated value.
        value: f64,
    },
}
