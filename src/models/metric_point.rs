use serde::Serialize;

/// A single aggregated metric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MetricPoint {
    pub(crate) name: String,
    pub(crate) value: f64,
    /// Number of raw observations folded into `value`. The service needs it to re-aggregate across
    /// instances.
    pub(crate) weight: i32,
}
