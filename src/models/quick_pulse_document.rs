use crate::sample::TelemetryDocument;
use serde::Serialize;

/// Telemetry document tagged with the contract name the service deserializes it as.
#[derive(Debug, Serialize)]
pub(crate) struct QuickPulseDocument<'a> {
    #[serde(rename = "__type")]
    pub(crate) type_: &'static str,
    #[serde(flatten)]
    pub(crate) document: &'a TelemetryDocument,
}

impl<'a> From<&'a TelemetryDocument> for QuickPulseDocument<'a> {
    fn from(document: &'a TelemetryDocument) -> Self {
        QuickPulseDocument {
            type_: document.kind.type_name(),
            document,
        }
    }
}
