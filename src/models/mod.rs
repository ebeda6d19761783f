mod collection_configuration_info;
mod metric_point;
mod monitoring_data_point;
mod quick_pulse_document;

pub use collection_configuration_info::*;
pub(crate) use metric_point::*;
pub(crate) use monitoring_data_point::*;
pub(crate) use quick_pulse_document::*;
