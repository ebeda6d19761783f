//! JSON wire format of live metrics requests and responses.

use crate::{
    models::{CollectionConfigurationInfo, MonitoringDataPoint},
    Error,
};
use std::io::Write;

/// Writes the body of a ping request: a single envelope.
pub(crate) fn write_ping_body(
    writer: &mut dyn Write,
    data_point: &MonitoringDataPoint<'_>,
) -> Result<(), Error> {
    serde_json::to_writer(writer, data_point).map_err(Error::SerializeRequest)
}

/// Writes the body of a submit request: an array of envelopes, one per sample.
pub(crate) fn write_submit_body(
    writer: &mut dyn Write,
    data_points: &[MonitoringDataPoint<'_>],
) -> Result<(), Error> {
    serde_json::to_writer(writer, data_points).map_err(Error::SerializeRequest)
}

pub(crate) fn parse_collection_configuration(
    body: &[u8],
) -> Result<CollectionConfigurationInfo, Error> {
    serde_json::from_slice(body).map_err(Error::DeserializeConfiguration)
}
