use crate::models::{MetricPoint, QuickPulseDocument};
use crate::sample::ProcessCpuData;
use serde::Serialize;

/// Version of the envelope schema. The service uses it to reject or adapt to schema drift.
pub(crate) const INVARIANT_VERSION: i32 = 5;

/// Maximum number of processes reported in `TopCpuProcesses`.
pub(crate) const MAX_TOP_CPU_PROCESSES: usize = 5;

/// One live metrics reporting envelope.
///
/// Ping sends a single envelope without metrics, documents and instrumentation key. Submit sends
/// an array with one envelope per sample.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct MonitoringDataPoint<'a> {
    pub(crate) version: &'a str,
    pub(crate) invariant_version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) instrumentation_key: Option<&'a str>,
    pub(crate) instance: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) role_name: Option<&'a str>,
    pub(crate) stream_id: &'a str,
    pub(crate) machine_name: &'a str,
    pub(crate) timestamp: String,
    pub(crate) is_web_app: bool,
    pub(crate) performance_collection_supported: bool,
    pub(crate) processor_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) metrics: Option<Vec<MetricPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) documents: Option<Vec<QuickPulseDocument<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_cpu_processes: Option<&'a [ProcessCpuData]>,
    pub(crate) top_cpu_data_access_denied: bool,
    pub(crate) global_document_quota_reached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) collection_configuration_errors: Option<&'a [String]>,
}
