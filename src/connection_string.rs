use std::{borrow::Cow, collections::HashMap, str::FromStr};

pub(crate) const DEFAULT_LIVE_ENDPOINT: &str = "https://rt.services.visualstudio.com";
const FIELDS_SEPARATOR: char = ';';
const FIELD_KEY_VALUE_SEPARATOR: char = '=';

#[derive(Debug)]
pub(crate) struct ConnectionString {
    pub(crate) live_endpoint: http::Uri,
    pub(crate) instrumentation_key: String,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ParseError {
    #[error("invalid format")]
    InvalidFormat,
    #[error("missing instrumentation key")]
    MissingInstrumentationKey,
    #[error("unsupported authorization; only \"ikey\" is supported")]
    UnsupportedAuthorization,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(http::uri::InvalidUri),
}

impl FromStr for ConnectionString {
    type Err = ParseError;

    /// Parse the given connection string.
    ///
    /// Only the fields live metrics needs are read. Others, like the ingestion endpoint, are
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result: HashMap<String, String> = s
            .split(FIELDS_SEPARATOR)
            .filter(|kv| !kv.trim().is_empty())
            .map(|kv| match kv.split_once(FIELD_KEY_VALUE_SEPARATOR) {
                Some((key, value)) if !value.contains(FIELD_KEY_VALUE_SEPARATOR) => {
                    Ok((key.trim().to_lowercase(), value.to_string()))
                }
                _ => Err(ParseError::InvalidFormat),
            })
            .collect::<Result<_, _>>()?;

        let live_endpoint = if let Some(live_endpoint) = result.remove("liveendpoint") {
            sanitize_url(live_endpoint)?
        } else if let Some(endpoint_suffix) = result.remove("endpointsuffix") {
            let location_prefix = result
                .remove("location")
                .map(|x| format!("{}.", x))
                .unwrap_or_default();
            sanitize_url(format!(
                "https://{}live.{}",
                location_prefix, endpoint_suffix
            ))?
        } else {
            http::Uri::from_static(DEFAULT_LIVE_ENDPOINT)
        };

        if let Some(authorization) = result.remove("authorization") {
            if !authorization.eq_ignore_ascii_case("ikey") {
                return Err(ParseError::UnsupportedAuthorization);
            }
        }
        let instrumentation_key = result
            .remove("instrumentationkey")
            .filter(|key| !key.is_empty())
            .ok_or(ParseError::MissingInstrumentationKey)?;

        Ok(ConnectionString {
            live_endpoint,
            instrumentation_key,
        })
    }
}

fn sanitize_url(url: String) -> Result<http::Uri, ParseError> {
    let mut new_url: Cow<str> = url.trim().into();
    if !new_url.starts_with("https://") {
        new_url = new_url.replace("http://", "https://").into();
    }

    new_url
        .trim_end_matches('/')
        .try_into()
        .map_err(ParseError::InvalidEndpoint)
}
