//! Response value handed back to callers.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde_json::Value;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response declared a JSON content type and parsed as JSON.
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Decodes raw bytes. JSON is only attempted when `content_type` says so;
    /// a JSON response that does not parse falls back to text.
    pub fn decode(content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        if content_type.is_some_and(is_json_content_type) {
            if let Ok(value) = serde_json::from_slice(&bytes) {
                return ResponseBody::Json(value);
            }
        }

        match String::from_utf8(bytes) {
            Ok(text) => ResponseBody::Text(text),
            Err(e) => ResponseBody::Bytes(e.into_bytes()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// The final answer of a request: the last status, headers and body observed.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Builds a response from raw parts, decoding the body per its content type.
    pub fn from_parts(status: StatusCode, headers: HeaderMap, bytes: Vec<u8>) -> Self {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let body = ResponseBody::decode(content_type, bytes);
        Self::new(status, headers, body)
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Option<&Value> {
        self.body.as_json()
    }

    /// Looks up a nested JSON value with a JSON pointer such as
    /// `/data/characters/results/0/name`.
    pub fn json_pointer(&self, pointer: &str) -> Option<&Value> {
        self.json().and_then(|v| v.pointer(pointer))
    }
}
