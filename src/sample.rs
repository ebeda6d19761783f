//! Input types handed to the client by the sampling engine.
//!
//! Collecting performance counters and telemetry and folding them into a [`QuickPulseDataSample`]
//! happens outside of this crate. The client only projects already aggregated samples onto the
//! wire.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, str::FromStr, time::Duration};

/// One aggregated live metrics sample covering the interval up to `end_timestamp`.
#[derive(Debug, Clone, Default)]
pub struct QuickPulseDataSample {
    /// End of the interval this sample covers.
    pub end_timestamp: DateTime<Utc>,

    /// Incoming requests per second.
    pub requests_per_second: f64,
    /// Average request duration in milliseconds.
    pub request_duration_average_ms: f64,
    /// Number of requests the average duration is calculated from.
    pub request_count: u64,
    /// Failed requests per second.
    pub requests_failed_per_second: f64,
    /// Succeeded requests per second.
    pub requests_succeeded_per_second: f64,

    /// Outgoing dependency calls per second.
    pub dependency_calls_per_second: f64,
    /// Average dependency call duration in milliseconds.
    pub dependency_call_duration_average_ms: f64,
    /// Number of dependency calls the average duration is calculated from.
    pub dependency_call_count: u64,
    /// Failed dependency calls per second.
    pub dependency_calls_failed_per_second: f64,
    /// Succeeded dependency calls per second.
    pub dependency_calls_succeeded_per_second: f64,

    /// Exceptions per second.
    pub exceptions_per_second: f64,

    /// Raw performance counter values, e.g. `\Processor(_Total)\% Processor Time`.
    pub performance_counters: Vec<(String, f64)>,

    /// Operationalized metrics accumulated according to the current collection configuration.
    pub metric_accumulators: Vec<AccumulatedValues>,

    /// Recent telemetry in chronological order.
    pub documents: Vec<TelemetryDocument>,

    /// Whether the document quota was exhausted while collecting this sample.
    pub global_document_quota_reached: bool,

    /// Processes using the most CPU, highest first.
    pub top_cpu_processes: Option<Vec<ProcessCpuData>>,

    /// Whether CPU data of other processes could not be read.
    pub top_cpu_data_access_denied: bool,
}

/// CPU usage of a single process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessCpuData {
    /// Process name.
    pub process_name: String,
    /// CPU usage in percent.
    pub cpu_percentage: f64,
}

/// Final aggregation of an operationalized metric as declared by the collection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationType {
    /// Average of all values.
    Avg,
    /// Sum of all values.
    Sum,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// An aggregation this crate does not know how to compute.
    Unsupported(String),
}

impl FromStr for AggregationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Avg" => AggregationType::Avg,
            "Sum" => AggregationType::Sum,
            "Min" => AggregationType::Min,
            "Max" => AggregationType::Max,
            other => AggregationType::Unsupported(other.into()),
        })
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregationType::Avg => "Avg",
            AggregationType::Sum => "Sum",
            AggregationType::Min => "Min",
            AggregationType::Max => "Max",
            AggregationType::Unsupported(name) => name,
        })
    }
}

/// Values accumulated for one operationalized metric during a sample interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedValues {
    /// Metric id from the collection configuration.
    pub metric_id: String,
    /// Declared aggregation.
    pub aggregation: AggregationType,
    /// Accumulated values.
    pub values: Vec<f64>,
}

impl AccumulatedValues {
    /// Create an empty accumulator.
    pub fn new(metric_id: impl Into<String>, aggregation: AggregationType) -> Self {
        Self {
            metric_id: metric_id.into(),
            aggregation,
            values: Vec::new(),
        }
    }

    /// Add a value to the series.
    pub fn add_value(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Apply the declared aggregation. Returns the aggregated value and the number of values it
    /// was calculated from.
    ///
    /// Average, minimum and maximum of an empty series are 0.
    pub fn calculate_aggregation(&self) -> Result<(f64, usize), Error> {
        let count = self.values.len();
        let values = self.values.iter().copied();
        let value = match &self.aggregation {
            AggregationType::Sum => values.sum(),
            AggregationType::Avg if count == 0 => 0.0,
            AggregationType::Avg => values.sum::<f64>() / count as f64,
            AggregationType::Min => values.reduce(f64::min).unwrap_or(0.0),
            AggregationType::Max => values.reduce(f64::max).unwrap_or(0.0),
            AggregationType::Unsupported(aggregation) => {
                return Err(Error::UnsupportedAggregation {
                    metric_id: self.metric_id.clone(),
                    aggregation: aggregation.clone(),
                })
            }
        };

        if value.is_finite() {
            Ok((value, count))
        } else {
            Err(Error::NonFiniteAggregation {
                metric_id: self.metric_id.clone(),
                value,
            })
        }
    }
}

/// A recent telemetry item surfaced in the live feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetryDocument {
    /// Telemetry specific fields.
    #[serde(flatten)]
    pub kind: DocumentKind,
    /// SDK version that produced the telemetry.
    pub version: String,
    /// When the telemetry happened.
    #[serde(serialize_with = "serialize_time")]
    pub timestamp: DateTime<Utc>,
    /// Operation (trace) id.
    pub operation_id: String,
    /// Custom properties.
    pub properties: Vec<DocumentProperty>,
}

/// Telemetry type specific document fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "DocumentType", rename_all_fields = "PascalCase")]
pub enum DocumentKind {
    /// An incoming request.
    Request {
        /// Request name.
        name: String,
        /// Whether the request succeeded.
        success: Option<bool>,
        /// Request duration.
        #[serde(serialize_with = "serialize_duration")]
        duration: Duration,
        /// Response code.
        response_code: String,
        /// Request url.
        url: String,
    },
    /// An outgoing dependency call.
    #[serde(rename = "RemoteDependency")]
    Dependency {
        /// Dependency name.
        name: String,
        /// Target of the call.
        target: String,
        /// Whether the call succeeded.
        success: Option<bool>,
        /// Call duration.
        #[serde(serialize_with = "serialize_duration")]
        duration: Duration,
        /// Result code.
        result_code: String,
        /// Command, e.g. a url or a database statement.
        command_name: String,
        /// Dependency type, e.g. `HTTP`.
        dependency_type_name: String,
    },
    /// An exception.
    Exception {
        /// Exception including stack trace.
        exception: String,
        /// Exception message.
        exception_message: String,
        /// Exception type.
        exception_type: String,
    },
    /// A custom event.
    Event {
        /// Event name.
        name: String,
    },
    /// A trace message.
    Trace {
        /// Message.
        message: String,
        /// Severity level, e.g. `Warning`.
        severity_level: String,
    },
}

impl DocumentKind {
    /// Contract name the service uses to tell document types apart.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            DocumentKind::Request { .. } => "RequestTelemetryDocument",
            DocumentKind::Dependency { .. } => "DependencyTelemetryDocument",
            DocumentKind::Exception { .. } => "ExceptionTelemetryDocument",
            DocumentKind::Event { .. } => "EventTelemetryDocument",
            DocumentKind::Trace { .. } => "TraceTelemetryDocument",
        }
    }
}

/// Custom property of a telemetry document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProperty {
    /// Property name.
    pub key: String,
    /// Property value.
    pub value: String,
}

fn serialize_time<S: serde::Serializer>(
    time: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::convert::time_to_string(*time))
}

fn serialize_duration<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::convert::duration_to_string(*duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn accumulator(aggregation: AggregationType, values: &[f64]) -> AccumulatedValues {
        let mut acc = AccumulatedValues::new("metric", aggregation);
        for value in values {
            acc.add_value(*value);
        }
        acc
    }

    #[test_case(AggregationType::Sum, &[1.0, 2.0, 4.5], 7.5, 3 ; "sum")]
    #[test_case(AggregationType::Avg, &[1.0, 2.0, 6.0], 3.0, 3 ; "avg")]
    #[test_case(AggregationType::Min, &[3.0, -2.0, 6.0], -2.0, 3 ; "min")]
    #[test_case(AggregationType::Max, &[3.0, -2.0, 6.0], 6.0, 3 ; "max")]
    #[test_case(AggregationType::Sum, &[], 0.0, 0 ; "sum empty")]
    #[test_case(AggregationType::Avg, &[], 0.0, 0 ; "avg empty")]
    #[test_case(AggregationType::Min, &[], 0.0, 0 ; "min empty")]
    #[test_case(AggregationType::Max, &[], 0.0, 0 ; "max empty")]
    fn aggregation(aggregation: AggregationType, values: &[f64], value: f64, count: usize) {
        let result = accumulator(aggregation, values)
            .calculate_aggregation()
            .unwrap();
        assert_eq!((value, count), result);
    }

    #[test]
    fn unsupported_aggregation_fails() {
        let err = accumulator("Median".parse().unwrap(), &[1.0])
            .calculate_aggregation()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedAggregation { aggregation, .. } if aggregation == "Median"
        ));
    }

    #[test]
    fn non_finite_aggregation_fails() {
        let err = accumulator(AggregationType::Sum, &[f64::MAX, f64::MAX])
            .calculate_aggregation()
            .unwrap_err();
        assert!(matches!(err, Error::NonFiniteAggregation { .. }));
    }

    #[test_case("Avg", AggregationType::Avg)]
    #[test_case("Sum", AggregationType::Sum)]
    #[test_case("Min", AggregationType::Min)]
    #[test_case("Max", AggregationType::Max)]
    #[test_case("avg", AggregationType::Unsupported("avg".into()) ; "case sensitive")]
    fn parse_aggregation(input: &'static str, expected: AggregationType) {
        assert_eq!(expected, input.parse().unwrap());
        assert_eq!(input, expected.to_string());
    }
}
