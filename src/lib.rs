//! A client for the [Azure Application Insights] live metrics stream, also known as Quick Pulse.
//!
//! [Azure Application Insights]: https://docs.microsoft.com/en-us/azure/azure-monitor/app/app-insights-overview
//!
//! **Disclaimer**: This is not an official Microsoft product.
//!
//! The client implements the ping/submit protocol of the Quick Pulse service. It does not collect
//! any data and does not schedule itself. Collecting samples and deciding when to call the
//! service is up to the caller.
//!
//! # Usage
//!
//! ```rust,no_run
//! # #[cfg(feature = "reqwest-client")] {
//! use application_insights_quickpulse::{
//!     new_client_from_connection_string, QuickPulseDataSample, Subscription,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
//! let client = new_client_from_connection_string(
//!     "InstrumentationKey=...",
//!     reqwest::Client::new(),
//! )?
//! .with_role_name("my-service");
//! let ikey = client.instrumentation_key().unwrap_or_default().to_string();
//!
//! let mut etag = String::new();
//! let mut subscribed = false;
//! loop {
//!     let response = if subscribed {
//!         let sample = QuickPulseDataSample::default();
//!         client.submit(&[sample], &ikey, &etag, &[]).await
//!     } else {
//!         client.ping(&ikey, chrono::Utc::now(), &etag).await
//!     };
//!     if let Some(configuration) = response.configuration {
//!         etag = configuration.etag;
//!     }
//!     subscribed = response.subscription == Subscription::Subscribed;
//!     let interval = if subscribed { 1 } else { 5 };
//!     tokio::time::sleep(Duration::from_secs(interval)).await;
//! }
//! # }
//! # }
//! ```
//!
//! # Protocol
//!
//! | Call     | Request                          | Identity headers | Body                         |
//! | -------- | -------------------------------- | ---------------- | ---------------------------- |
//! | `ping`   | `POST {service}/ping?ikey={key}` | yes              | one envelope without metrics |
//! | `submit` | `POST {service}/post?ikey={key}` | no               | one envelope per sample      |
//!
//! Both calls send the ETag of the collection configuration the caller currently uses. The
//! service answers with `x-ms-qps-subscribed` and the ETag of its latest configuration. The
//! configuration itself is only read from the response body when the caller is subscribed and
//! the ETags differ.
//!
//! Neither call ever fails. Network errors, timeouts and malformed responses all result in
//! [`Subscription::Indeterminate`], which means "no change, try again later". It is never mixed
//! up with [`Subscription::NotSubscribed`].
//!
//! # Metrics
//!
//! Every submitted sample contains these metrics, followed by the sample's performance counters
//! and operationalized metrics:
//!
//! | Metric                                              | Weight                 |
//! | --------------------------------------------------- | ---------------------- |
//! | `\ApplicationInsights\Requests/Sec`                 | 1                      |
//! | `\ApplicationInsights\Request Duration`             | number of requests     |
//! | `\ApplicationInsights\Requests Failed/Sec`          | 1                      |
//! | `\ApplicationInsights\Requests Succeeded/Sec`       | 1                      |
//! | `\ApplicationInsights\Dependency Calls/Sec`         | 1                      |
//! | `\ApplicationInsights\Dependency Call Duration`     | number of dependencies |
//! | `\ApplicationInsights\Dependency Calls Failed/Sec`  | 1                      |
//! | `\ApplicationInsights\Dependency Calls Succeeded/Sec` | 1                    |
//! | `\ApplicationInsights\Exceptions/Sec`               | 1                      |
//!
//! All values are rounded to 4 decimal places.
#![doc(html_root_url = "https://docs.rs/application-insights-quickpulse/0.1.0")]
#![deny(missing_docs, unreachable_pub, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(test, deny(warnings))]

mod client;
mod codec;
mod connection_string;
mod convert;
mod error;
mod models;
mod projection;
mod sample;
mod uploader;

pub use client::{
    new_client_from_connection_string, new_client_from_env, QuickPulseResponse,
    QuickPulseServiceClient, Subscription,
};
pub use error::Error;
pub use models::CollectionConfigurationInfo;
pub use opentelemetry_http::HttpClient;
pub use sample::{
    AccumulatedValues, AggregationType, DocumentKind, DocumentProperty, ProcessCpuData,
    QuickPulseDataSample, TelemetryDocument,
};
