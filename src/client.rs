use crate::{
    codec::{parse_collection_configuration, write_ping_body, write_submit_body},
    connection_string::ConnectionString,
    convert::time_to_ms_date,
    models::{
        CollectionConfigurationInfo, MonitoringDataPoint, INVARIANT_VERSION,
        MAX_TOP_CPU_PROCESSES,
    },
    projection::{project_documents, project_metrics},
    sample::QuickPulseDataSample,
    uploader::{self, QuickPulseRequest, QPS_CONFIGURATION_ETAG},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, Response, Uri};
use opentelemetry_http::HttpClient;
use opentelemetry_sdk::trace::{IdGenerator as _, RandomIdGenerator};
use std::{error::Error as StdError, fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::form_urlencoded;

pub(crate) const DEFAULT_SERVICE_URI: &str =
    "https://rt.services.visualstudio.com/QuickPulseService.svc";
pub(crate) const SERVICE_PATH: &str = "QuickPulseService.svc";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const UNKNOWN_MACHINE_NAME: &str = "Unknown";

#[allow(clippy::declare_interior_mutable_const)]
const QPS_SUBSCRIBED: HeaderName = HeaderName::from_static("x-ms-qps-subscribed");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_REDIRECT: HeaderName = HeaderName::from_static("x-ms-qps-service-endpoint-redirect-v2");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_INTERVAL_HINT: HeaderName =
    HeaderName::from_static("x-ms-qps-service-endpoint-interval-hint");

/// Whether the Quick Pulse service wants live data from this stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// Somebody is watching. Keep submitting samples.
    Subscribed,
    /// Nobody is watching. Keep pinging.
    NotSubscribed,
    /// The exchange failed or the response did not say. Treat as "no change, try again later".
    Indeterminate,
}

impl Subscription {
    /// Returns `true` for [`Subscription::Subscribed`].
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Subscription::Subscribed)
    }
}

/// Outcome of a ping or submit exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickPulseResponse {
    /// Subscription state reported by the service.
    pub subscription: Subscription,

    /// New collection configuration. Only set when subscribed and the service has a configuration
    /// with a different ETag than the one sent, and it could be parsed.
    pub configuration: Option<CollectionConfigurationInfo>,

    /// Endpoint the service asks to use for future requests.
    pub redirected_host: Option<Uri>,

    /// Interval the service asks to ping at.
    pub polling_interval_hint: Option<Duration>,
}

impl QuickPulseResponse {
    fn indeterminate() -> Self {
        QuickPulseResponse {
            subscription: Subscription::Indeterminate,
            configuration: None,
            redirected_host: None,
            polling_interval_hint: None,
        }
    }
}

/// Identity of the reporting stream, fixed at construction.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub(crate) instance_name: String,
    pub(crate) stream_id: String,
    pub(crate) machine_name: String,
    pub(crate) role_name: Option<String>,
    pub(crate) version: String,
    pub(crate) is_web_app: bool,
    pub(crate) processor_count: usize,
}

impl Identity {
    fn detect() -> Self {
        let machine_name =
            sysinfo::System::host_name().unwrap_or_else(|| UNKNOWN_MACHINE_NAME.into());
        Identity {
            instance_name: machine_name.clone(),
            stream_id: format!("{:032x}", RandomIdGenerator::default().new_trace_id()),
            machine_name,
            role_name: None,
            version: format!("rust:{}", env!("CARGO_PKG_VERSION")),
            is_web_app: false,
            processor_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    fn data_point(&self, timestamp: DateTime<Utc>) -> MonitoringDataPoint<'_> {
        MonitoringDataPoint {
            version: &self.version,
            invariant_version: INVARIANT_VERSION,
            instrumentation_key: None,
            instance: &self.instance_name,
            role_name: self.role_name.as_deref(),
            stream_id: &self.stream_id,
            machine_name: &self.machine_name,
            timestamp: time_to_ms_date(timestamp),
            is_web_app: self.is_web_app,
            performance_collection_supported: true,
            processor_count: self.processor_count,
            metrics: None,
            documents: None,
            top_cpu_processes: None,
            top_cpu_data_access_denied: false,
            global_document_quota_reached: false,
            collection_configuration_errors: None,
        }
    }
}

/// Live metrics (Quick Pulse) service client.
///
/// Answers one question per call: does the service want live data from this stream right now?
/// Scheduling the calls is up to the caller:
///
/// - While not subscribed, [`ping`](Self::ping) every few seconds.
/// - While subscribed, [`submit`](Self::submit) a sample every second.
/// - Fall back to pinging whenever a call returns anything but [`Subscription::Subscribed`].
///
/// The client holds no state besides its configuration. The caller keeps the ETag of the
/// collection configuration it currently uses and passes it to every call.
#[derive(Clone)]
pub struct QuickPulseServiceClient<C> {
    client: Arc<C>,
    service_uri: String,
    instrumentation_key: Option<String>,
    identity: Identity,
    timeout: Duration,
}

impl<C: Debug> Debug for QuickPulseServiceClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuickPulseServiceClient")
            .field("client", &self.client)
            .field("service_uri", &self.service_uri)
            .field("stream_id", &self.identity.stream_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Create a new client from an Application Insights connection string.
///
/// The service uri is derived from the `LiveEndpoint` (or `EndpointSuffix`) and the
/// instrumentation key is available via
/// [`instrumentation_key`](QuickPulseServiceClient::instrumentation_key).
pub fn new_client_from_connection_string<C: HttpClient + 'static>(
    connection_string: impl AsRef<str>,
    client: C,
) -> Result<QuickPulseServiceClient<C>, Box<dyn StdError + Send + Sync + 'static>> {
    let connection_string: ConnectionString = connection_string.as_ref().parse()?;
    let service_uri =
        uploader::append_path(&connection_string.live_endpoint.to_string(), SERVICE_PATH);
    let mut quick_pulse_client = QuickPulseServiceClient::new(service_uri, client);
    quick_pulse_client.instrumentation_key = Some(connection_string.instrumentation_key);
    Ok(quick_pulse_client)
}

/// Create a new client.
///
/// Reads connection string from `APPLICATIONINSIGHTS_CONNECTION_STRING` environment variable.
pub fn new_client_from_env<C: HttpClient + 'static>(
    client: C,
) -> Result<QuickPulseServiceClient<C>, Box<dyn StdError + Send + Sync + 'static>> {
    let connection_string = std::env::var("APPLICATIONINSIGHTS_CONNECTION_STRING")?;
    new_client_from_connection_string(connection_string, client)
}

impl<C> QuickPulseServiceClient<C> {
    /// Create a new client talking to the given service uri, e.g.
    /// `https://rt.services.visualstudio.com/QuickPulseService.svc`.
    ///
    /// Stream id, machine name and processor count are detected. The instance name defaults to
    /// the machine name.
    pub fn new(service_uri: impl Into<String>, client: C) -> Self {
        QuickPulseServiceClient {
            client: Arc::new(client),
            service_uri: service_uri.into(),
            instrumentation_key: None,
            identity: Identity::detect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a new client talking to the public Quick Pulse service.
    pub fn with_default_service_uri(client: C) -> Self {
        Self::new(DEFAULT_SERVICE_URI, client)
    }

    /// Set the instance name, e.g. a container or VM name.
    pub fn with_instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.identity.instance_name = instance_name.into();
        self
    }

    /// Set the stream id. Should be unique per monitored process and stay the same for its
    /// lifetime.
    ///
    /// Default: random 32 character hex string
    pub fn with_stream_id(mut self, stream_id: impl Into<String>) -> Self {
        self.identity.stream_id = stream_id.into();
        self
    }

    /// Set the machine name.
    ///
    /// Default: host name of this machine
    pub fn with_machine_name(mut self, machine_name: impl Into<String>) -> Self {
        self.identity.machine_name = machine_name.into();
        self
    }

    /// Set the cloud role name.
    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.identity.role_name = Some(role_name.into());
        self
    }

    /// Set the SDK version reported to the service.
    ///
    /// Default: `rust:<version of this crate>`
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.identity.version = version.into();
        self
    }

    /// Set whether the monitored process is a web app.
    ///
    /// Default: false
    pub fn with_is_web_app(mut self, is_web_app: bool) -> Self {
        self.identity.is_web_app = is_web_app;
        self
    }

    /// Set the number of processors reported to the service.
    pub fn with_processor_count(mut self, processor_count: usize) -> Self {
        self.identity.processor_count = processor_count;
        self
    }

    /// Set the timeout of a single ping or submit request.
    ///
    /// Default: 3 seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Instrumentation key from the connection string, if the client was created from one.
    pub fn instrumentation_key(&self) -> Option<&str> {
        self.instrumentation_key.as_deref()
    }

    /// Stream id sent to the service.
    pub fn stream_id(&self) -> &str {
        &self.identity.stream_id
    }
}

impl<C: HttpClient + 'static> QuickPulseServiceClient<C> {
    /// Ask the service whether it wants live data from this stream.
    ///
    /// `configuration_etag` is the ETag of the collection configuration the caller currently
    /// uses (empty if none). A new configuration is only returned when the service's ETag differs.
    ///
    /// Never fails. Any problem results in [`Subscription::Indeterminate`].
    pub async fn ping(
        &self,
        instrumentation_key: &str,
        timestamp: DateTime<Utc>,
        configuration_etag: &str,
    ) -> QuickPulseResponse {
        let data_point = self.identity.data_point(timestamp);
        let path = path_with_key("ping", instrumentation_key);
        let response = uploader::send(
            self.client.as_ref(),
            QuickPulseRequest {
                service_uri: &self.service_uri,
                path_and_query: &path,
                identity: Some(&self.identity),
                configuration_etag,
                timeout: self.timeout,
            },
            |writer| write_ping_body(writer, &data_point),
        )
        .await;

        process_response(response, configuration_etag)
    }

    /// Send samples to the service.
    ///
    /// `collection_configuration_errors` are problems the caller found in the current collection
    /// configuration. They are sent along so the service can show them to the user.
    ///
    /// Never fails. Any problem results in [`Subscription::Indeterminate`].
    pub async fn submit(
        &self,
        samples: &[QuickPulseDataSample],
        instrumentation_key: &str,
        configuration_etag: &str,
        collection_configuration_errors: &[String],
    ) -> QuickPulseResponse {
        let data_points: Vec<_> = samples
            .iter()
            .map(|sample| {
                let mut data_point = self.identity.data_point(sample.end_timestamp);
                data_point.instrumentation_key = Some(instrumentation_key);
                data_point.metrics = Some(project_metrics(sample));
                data_point.documents = Some(project_documents(sample));
                data_point.top_cpu_processes = sample.top_cpu_processes.as_deref().map(|p| {
                    let len = p.len().min(MAX_TOP_CPU_PROCESSES);
                    &p[..len]
                });
                data_point.top_cpu_data_access_denied = sample.top_cpu_data_access_denied;
                data_point.global_document_quota_reached = sample.global_document_quota_reached;
                data_point.collection_configuration_errors = Some(collection_configuration_errors);
                data_point
            })
            .collect();

        let path = path_with_key("post", instrumentation_key);
        let response = uploader::send(
            self.client.as_ref(),
            QuickPulseRequest {
                service_uri: &self.service_uri,
                path_and_query: &path,
                identity: None,
                configuration_etag,
                timeout: self.timeout,
            },
            |writer| write_submit_body(writer, &data_points),
        )
        .await;

        process_response(response, configuration_etag)
    }
}

fn process_response(
    response: Option<Response<Bytes>>,
    configuration_etag: &str,
) -> QuickPulseResponse {
    let response = match response {
        Some(response) => response,
        None => return QuickPulseResponse::indeterminate(),
    };
    let headers = response.headers();

    let subscription = match header_str(headers, QPS_SUBSCRIBED).and_then(parse_bool) {
        Some(true) => Subscription::Subscribed,
        Some(false) => Subscription::NotSubscribed,
        None => {
            warn!("live metrics response has no valid subscribed header");
            return QuickPulseResponse::indeterminate();
        }
    };

    let latest_etag = header_str(headers, QPS_CONFIGURATION_ETAG);
    let configuration = if subscription.is_subscribed() && latest_etag != Some(configuration_etag)
    {
        match parse_collection_configuration(response.body()) {
            Ok(configuration) => Some(configuration),
            Err(err) => {
                warn!(
                    etag = latest_etag.unwrap_or_default(),
                    error = %err,
                    "ignoring collection configuration update"
                );
                None
            }
        }
    } else {
        None
    };

    let redirected_host = header_str(headers, QPS_REDIRECT).and_then(|v| Uri::try_from(v).ok());
    let polling_interval_hint = header_str(headers, QPS_INTERVAL_HINT)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis);

    debug!(
        ?subscription,
        configuration_updated = configuration.is_some(),
        "live metrics exchange completed"
    );
    QuickPulseResponse {
        subscription,
        configuration,
        redirected_host,
        polling_interval_hint,
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parses `true` or `false`, ignoring case and surrounding whitespace.
fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Relative request path with the instrumentation key as an encoded query parameter.
fn path_with_key(action: &str, instrumentation_key: &str) -> String {
    let ikey: String = form_urlencoded::byte_serialize(instrumentation_key.as_bytes()).collect();
    format!("{}?ikey={}", action, ikey)
}
