use crate::{client::Identity, convert::time_to_ticks, models::INVARIANT_VERSION, Error};
use bytes::Bytes;
use chrono::Utc;
use flate2::{write::GzEncoder, Compression};
use futures_timer::Delay;
use futures_util::future::{self, Either};
use http::{HeaderName, Request, Response, Uri};
use opentelemetry_http::HttpClient;
use std::{io::Write, time::Duration};
use tracing::{debug, warn};

// Allow interior mutability. See https://github.com/hyperium/http/issues/599
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_TRANSMISSION_TIME: HeaderName =
    HeaderName::from_static("x-ms-qps-transmission-time");
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const QPS_CONFIGURATION_ETAG: HeaderName =
    HeaderName::from_static("x-ms-qps-configuration-etag");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_STREAM_ID: HeaderName = HeaderName::from_static("x-ms-qps-stream-id");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_MACHINE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-machine-name");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_INSTANCE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-instance-name");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_ROLE_NAME: HeaderName = HeaderName::from_static("x-ms-qps-role-name");
#[allow(clippy::declare_interior_mutable_const)]
const QPS_INVARIANT_VERSION: HeaderName = HeaderName::from_static("x-ms-qps-invariant-version");

/// Request to the Quick Pulse service, before the body is written.
pub(crate) struct QuickPulseRequest<'a> {
    pub(crate) service_uri: &'a str,
    pub(crate) path_and_query: &'a str,
    /// Identity headers are only sent on ping. The service remembers the stream from there.
    pub(crate) identity: Option<&'a Identity>,
    pub(crate) configuration_etag: &'a str,
    pub(crate) timeout: Duration,
}

/// Sends a single request to the Quick Pulse service.
///
/// `write_body` writes the JSON payload straight into the compressed request body.
///
/// Any failure is logged and results in `None`. Live metrics must never fault the host
/// application, so no error leaves this function.
pub(crate) async fn send(
    client: &dyn HttpClient,
    request: QuickPulseRequest<'_>,
    write_body: impl FnOnce(&mut dyn Write) -> Result<(), Error>,
) -> Option<Response<Bytes>> {
    match try_send(client, &request, write_body).await {
        Ok(response) => Some(response),
        Err(err) => {
            warn!(
                path = request.path_and_query,
                error = %err,
                "live metrics request failed"
            );
            None
        }
    }
}

async fn try_send(
    client: &dyn HttpClient,
    request: &QuickPulseRequest<'_>,
    write_body: impl FnOnce(&mut dyn Write) -> Result<(), Error>,
) -> Result<Response<Bytes>, Error> {
    let mut gzip_encoder = GzEncoder::new(Vec::new(), Compression::default());
    write_body(&mut gzip_encoder)?;
    let payload = gzip_encoder.finish().map_err(Error::CompressRequest)?;

    let uri = Uri::try_from(append_path(request.service_uri, request.path_and_query))
        .map_err(|err| Error::BuildRequest(err.into()))?;
    let mut request_builder = Request::post(uri)
        .header(QPS_TRANSMISSION_TIME, time_to_ticks(Utc::now()))
        .header(QPS_CONFIGURATION_ETAG, request.configuration_etag)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::CONTENT_ENCODING, "gzip");
    if let Some(identity) = request.identity {
        request_builder = request_builder
            .header(QPS_INSTANCE_NAME, identity.instance_name.as_str())
            .header(QPS_STREAM_ID, identity.stream_id.as_str())
            .header(QPS_MACHINE_NAME, identity.machine_name.as_str())
            .header(QPS_INVARIANT_VERSION, INVARIANT_VERSION);
        if let Some(role_name) = &identity.role_name {
            request_builder = request_builder.header(QPS_ROLE_NAME, role_name.as_str());
        }
    }
    let http_request = request_builder
        .body(Bytes::from(payload))
        .map_err(Error::BuildRequest)?;

    let response = match future::select(
        client.send_bytes(http_request),
        Delay::new(request.timeout),
    )
    .await
    {
        Either::Left((response, _)) => response.map_err(Error::Connection)?,
        Either::Right(((), _)) => return Err(Error::Timeout(request.timeout)),
    };

    if response.status().is_success() {
        debug!(
            path = request.path_and_query,
            status = response.status().as_u16(),
            "live metrics request succeeded"
        );
        Ok(response)
    } else {
        Err(Error::Status(response.status().as_u16()))
    }
}

/// Joins the service uri and a relative path with exactly one `/` between them.
pub(crate) fn append_path(service_uri: &str, path: &str) -> String {
    match (service_uri.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", service_uri, &path[1..]),
        (false, false) => format!("{}/{}", service_uri, path),
        _ => format!("{}{}", service_uri, path),
    }
}
