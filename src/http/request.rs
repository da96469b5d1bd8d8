//! Turns a parameter bag into a transport-ready request.

use std::collections::BTreeMap;

use log::{debug, warn};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use serde_json::Value;

use super::error::RequestError;

/// User agent identifying requests made by this tool.
pub const DEFAULT_USER_AGENT: &str = concat!("apiprobe/", env!("APIPROBE_VERSION"));

/// Headers and body for a single request.
///
/// At most one body encoding is used: when both `data` and `form_data` are
/// set, the multipart form wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub headers: BTreeMap<String, String>,
    /// Sent as a JSON document.
    pub data: Option<Value>,
    /// Sent as `multipart/form-data`, one part per field.
    pub form_data: Option<BTreeMap<String, String>>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_json(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_data
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

/// A fully assembled request, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl PreparedRequest {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Builds the request for `base_url + "/" + endpoint`.
///
/// `user_agent` is only applied when the caller did not set a `User-Agent`
/// header of their own.
#[tracing::instrument(skip(params, user_agent))]
pub fn build_request(
    method: Method,
    base_url: &str,
    endpoint: &str,
    params: &RequestParams,
    user_agent: &str,
) -> Result<PreparedRequest, RequestError> {
    let url = build_url(base_url, endpoint)?;
    let mut headers = build_headers(&params.headers)?;

    if !headers.contains_key(USER_AGENT) {
        let value = HeaderValue::from_str(user_agent)
            .map_err(|_| RequestError::invalid(format!("invalid user agent '{}'", user_agent)))?;
        headers.insert(USER_AGENT, value);
    }

    let body = if let Some(fields) = &params.form_data {
        if params.data.is_some() {
            warn!("Both JSON data and form data were given; sending the multipart form");
        }
        let boundary = generate_boundary();
        let content_type = format!("multipart/form-data; boundary={}", boundary);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&content_type)
                .map_err(|_| RequestError::invalid("invalid multipart boundary"))?,
        );
        Some(encode_multipart(fields, &boundary))
    } else if let Some(data) = &params.data {
        let body = serde_json::to_vec(data)
            .map_err(|e| RequestError::invalid(format!("failed to encode JSON body: {}", e)))?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Some(body)
    } else {
        None
    };

    debug!(
        "Prepared {} {} ({} bytes of body)",
        method,
        url,
        body.as_ref().map_or(0, Vec::len)
    );

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
    })
}

fn build_url(base_url: &str, endpoint: &str) -> Result<Url, RequestError> {
    let raw = format!("{}/{}", base_url, endpoint);
    let url = Url::parse(&raw)
        .map_err(|e| RequestError::invalid(format!("invalid URL '{}': {}", raw, e)))?;

    if url.cannot_be_a_base() || !url.has_host() {
        return Err(RequestError::invalid(format!(
            "invalid URL '{}': not an absolute URL",
            raw
        )));
    }

    Ok(url)
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, RequestError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 2);
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RequestError::invalid(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| RequestError::invalid(format!("invalid value for header '{}'", name)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn generate_boundary() -> String {
    format!("----apiprobe-formdata-{:016x}", fastrand::u64(..))
}

/// Encodes `fields` as a `multipart/form-data` body, in key order.
fn encode_multipart(fields: &BTreeMap<String, String>, boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_field_name(name)
            )
            .as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

// Same percent-escaping browsers apply to form-data names.
fn escape_field_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
