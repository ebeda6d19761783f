use crate::{
    convert::round_metric_value,
    models::{MetricPoint, QuickPulseDocument},
    sample::QuickPulseDataSample,
};
use tracing::warn;

const REQUESTS_PER_SECOND: &str = "\\ApplicationInsights\\Requests/Sec";
const REQUEST_DURATION: &str = "\\ApplicationInsights\\Request Duration";
const REQUESTS_FAILED_PER_SECOND: &str = "\\ApplicationInsights\\Requests Failed/Sec";
const REQUESTS_SUCCEEDED_PER_SECOND: &str = "\\ApplicationInsights\\Requests Succeeded/Sec";
const DEPENDENCY_CALLS_PER_SECOND: &str = "\\ApplicationInsights\\Dependency Calls/Sec";
const DEPENDENCY_CALL_DURATION: &str = "\\ApplicationInsights\\Dependency Call Duration";
const DEPENDENCY_CALLS_FAILED_PER_SECOND: &str =
    "\\ApplicationInsights\\Dependency Calls Failed/Sec";
const DEPENDENCY_CALLS_SUCCEEDED_PER_SECOND: &str =
    "\\ApplicationInsights\\Dependency Calls Succeeded/Sec";
const EXCEPTIONS_PER_SECOND: &str = "\\ApplicationInsights\\Exceptions/Sec";

pub(crate) const BUILT_IN_METRIC_COUNT: usize = 9;

/// Metrics reported for a sample: the built-in metrics, then raw performance counters, then
/// operationalized metrics.
///
/// An operationalized metric that fails to aggregate is skipped.
pub(crate) fn project_metrics(sample: &QuickPulseDataSample) -> Vec<MetricPoint> {
    let mut metrics = Vec::with_capacity(
        BUILT_IN_METRIC_COUNT + sample.performance_counters.len() + sample.metric_accumulators.len(),
    );

    metrics.extend([
        built_in_metric(REQUESTS_PER_SECOND, sample.requests_per_second, 1),
        built_in_metric(
            REQUEST_DURATION,
            sample.request_duration_average_ms,
            sample.request_count,
        ),
        built_in_metric(
            REQUESTS_FAILED_PER_SECOND,
            sample.requests_failed_per_second,
            1,
        ),
        built_in_metric(
            REQUESTS_SUCCEEDED_PER_SECOND,
            sample.requests_succeeded_per_second,
            1,
        ),
        built_in_metric(
            DEPENDENCY_CALLS_PER_SECOND,
            sample.dependency_calls_per_second,
            1,
        ),
        built_in_metric(
            DEPENDENCY_CALL_DURATION,
            sample.dependency_call_duration_average_ms,
            sample.dependency_call_count,
        ),
        built_in_metric(
            DEPENDENCY_CALLS_FAILED_PER_SECOND,
            sample.dependency_calls_failed_per_second,
            1,
        ),
        built_in_metric(
            DEPENDENCY_CALLS_SUCCEEDED_PER_SECOND,
            sample.dependency_calls_succeeded_per_second,
            1,
        ),
        built_in_metric(EXCEPTIONS_PER_SECOND, sample.exceptions_per_second, 1),
    ]);

    for (name, value) in &sample.performance_counters {
        if value.is_finite() {
            metrics.push(metric_point(name, *value, 1));
        } else {
            warn!(counter = %name, value, "skipping non-finite performance counter");
        }
    }

    for accumulator in &sample.metric_accumulators {
        match accumulator.calculate_aggregation() {
            Ok((value, count)) => {
                metrics.push(metric_point(&accumulator.metric_id, value, count as u64))
            }
            Err(err) => warn!(
                metric_id = %accumulator.metric_id,
                error = %err,
                "skipping operationalized metric"
            ),
        }
    }

    metrics
}

/// Documents of a sample, newest first.
pub(crate) fn project_documents(sample: &QuickPulseDataSample) -> Vec<QuickPulseDocument<'_>> {
    sample
        .documents
        .iter()
        .rev()
        .map(QuickPulseDocument::from)
        .collect()
}

/// Built-in metrics are always sent. JSON has no representation for NaN or infinity, so those
/// are reported as 0.
fn built_in_metric(name: &str, value: f64, weight: u64) -> MetricPoint {
    if value.is_finite() {
        metric_point(name, value, weight)
    } else {
        warn!(metric = name, value, "reporting non-finite built-in metric as 0");
        metric_point(name, 0.0, weight)
    }
}

fn metric_point(name: &str, value: f64, weight: u64) -> MetricPoint {
    MetricPoint {
        name: name.into(),
        value: round_metric_value(value),
        weight: i32::try_from(weight).unwrap_or(i32::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{AccumulatedValues, AggregationType, DocumentKind, TelemetryDocument};
    use chrono::{TimeZone, Utc};

    fn names(metrics: &[MetricPoint]) -> Vec<&str> {
        metrics.iter().map(|m| m.name.as_str()).collect()
    }

    fn event(name: &str, secs: i64) -> TelemetryDocument {
        TelemetryDocument {
            kind: DocumentKind::Event { name: name.into() },
            version: "1.0".into(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            operation_id: String::new(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn built_in_metrics_are_always_present() {
        let metrics = project_metrics(&QuickPulseDataSample::default());
        assert_eq!(
            vec![
                REQUESTS_PER_SECOND,
                REQUEST_DURATION,
                REQUESTS_FAILED_PER_SECOND,
                REQUESTS_SUCCEEDED_PER_SECOND,
                DEPENDENCY_CALLS_PER_SECOND,
                DEPENDENCY_CALL_DURATION,
                DEPENDENCY_CALLS_FAILED_PER_SECOND,
                DEPENDENCY_CALLS_SUCCEEDED_PER_SECOND,
                EXCEPTIONS_PER_SECOND,
            ],
            names(&metrics)
        );
    }

    #[test]
    fn built_in_metric_values_and_weights() {
        let sample = QuickPulseDataSample {
            requests_per_second: 10.123456,
            request_duration_average_ms: 12.5,
            request_count: 20,
            dependency_call_duration_average_ms: 3.00005,
            dependency_call_count: 7,
            exceptions_per_second: 0.5,
            ..Default::default()
        };
        let metrics = project_metrics(&sample);
        assert_eq!(
            MetricPoint {
                name: REQUESTS_PER_SECOND.into(),
                value: 10.1235,
                weight: 1
            },
            metrics[0]
        );
        assert_eq!(
            MetricPoint {
                name: REQUEST_DURATION.into(),
                value: 12.5,
                weight: 20
            },
            metrics[1]
        );
        assert_eq!(
            MetricPoint {
                name: DEPENDENCY_CALL_DURATION.into(),
                value: 3.0001,
                weight: 7
            },
            metrics[5]
        );
        assert_eq!(0.5, metrics[8].value);
    }

    #[test]
    fn performance_counters_and_operationalized_metrics_follow_built_ins() {
        let mut avg = AccumulatedValues::new("avg-metric", AggregationType::Avg);
        avg.add_value(1.0);
        avg.add_value(2.0);
        let sample = QuickPulseDataSample {
            performance_counters: vec![
                ("\\Processor(_Total)\\% Processor Time".into(), 12.345678),
                ("\\Memory\\Committed Bytes".into(), 1024.0),
            ],
            metric_accumulators: vec![avg],
            ..Default::default()
        };
        let metrics = project_metrics(&sample);
        assert_eq!(BUILT_IN_METRIC_COUNT + 3, metrics.len());
        assert_eq!(
            MetricPoint {
                name: "\\Processor(_Total)\\% Processor Time".into(),
                value: 12.3457,
                weight: 1
            },
            metrics[9]
        );
        assert_eq!("\\Memory\\Committed Bytes", metrics[10].name);
        assert_eq!(
            MetricPoint {
                name: "avg-metric".into(),
                value: 1.5,
                weight: 2
            },
            metrics[11]
        );
    }

    #[test]
    fn failing_operationalized_metric_is_skipped() {
        let mut first = AccumulatedValues::new("first", AggregationType::Sum);
        first.add_value(1.0);
        let broken = AccumulatedValues::new("broken", "Percentile".parse().unwrap());
        let mut last = AccumulatedValues::new("last", AggregationType::Max);
        last.add_value(3.0);
        let sample = QuickPulseDataSample {
            performance_counters: vec![("counter".into(), 1.0)],
            metric_accumulators: vec![first, broken, last],
            ..Default::default()
        };
        let metrics = project_metrics(&sample);
        assert_eq!(BUILT_IN_METRIC_COUNT + 3, metrics.len());
        assert_eq!(vec!["counter", "first", "last"], names(&metrics)[9..].to_vec());
    }

    #[test]
    fn non_finite_values_never_reach_the_wire() {
        let sample = QuickPulseDataSample {
            requests_per_second: f64::INFINITY,
            request_duration_average_ms: f64::NAN,
            request_count: 3,
            exceptions_per_second: f64::NEG_INFINITY,
            performance_counters: vec![
                ("nan".into(), f64::NAN),
                ("big".into(), 1e305),
                ("inf".into(), f64::INFINITY),
            ],
            ..Default::default()
        };
        let metrics = project_metrics(&sample);
        assert_eq!(BUILT_IN_METRIC_COUNT + 1, metrics.len());
        assert_eq!(0.0, metrics[0].value);
        assert_eq!(
            MetricPoint {
                name: REQUEST_DURATION.into(),
                value: 0.0,
                weight: 3
            },
            metrics[1]
        );
        assert_eq!(0.0, metrics[8].value);
        assert_eq!(
            MetricPoint {
                name: "big".into(),
                value: 1e305,
                weight: 1
            },
            metrics[9]
        );

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(!json.contains("null"), "{}", json);
    }

    #[test]
    fn operationalized_metric_weight_is_clamped() {
        let weight = metric_point("m", 1.0, u64::MAX).weight;
        assert_eq!(i32::MAX, weight);
    }

    #[test]
    fn documents_are_newest_first() {
        let sample = QuickPulseDataSample {
            documents: vec![event("first", 1), event("second", 2), event("third", 3)],
            ..Default::default()
        };
        let documents = project_documents(&sample);
        let names: Vec<_> = documents
            .iter()
            .map(|d| match &d.document.kind {
                DocumentKind::Event { name } => name.as_str(),
                _ => panic!("we should not get here"),
            })
            .collect();
        assert_eq!(vec!["third", "second", "first"], names);
        assert_eq!("EventTelemetryDocument", documents[0].type_);
    }
}
