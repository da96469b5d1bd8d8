//! Transport seam and its reqwest-backed implementation.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use super::error::TransportError;
use super::request::PreparedRequest;
use super::response::ApiResponse;

/// Sends one prepared request and reports what came back.
///
/// Implementations return `Err` with an embedded response for HTTP-level
/// failures (non-2xx), and `Err` without one when nothing was received.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse, TransportError>;
}

/// [`Transport`] over a reqwest [`Client`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &PreparedRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::with_source("Failed to send request", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::with_source("Failed to read response body", e))?;

        debug!("{} {} -> {} ({} bytes)", request.method, request.url, status, bytes.len());

        let response = ApiResponse::from_parts(status, headers, bytes.to_vec());
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::with_response(
                format!("{} {} returned an error status", request.method, request.url),
                response,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{RequestParams, build_request};
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_success_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("content-type", "application/json")
            .match_header("user-agent", "apiprobe-test")
            .match_body(mockito::Matcher::Json(json!({"query": "{ ping }"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"ping": "pong"}}"#)
            .create_async()
            .await;

        let params = RequestParams::new().with_json(json!({"query": "{ ping }"}));
        let request =
            build_request(Method::POST, &server.url(), "graphql", &params, "apiprobe-test")
                .unwrap();

        let transport = ReqwestTransport::new(Client::new());
        let response = transport.send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json_pointer("/data/ping"), Some(&json!("pong")));
    }

    #[tokio::test]
    async fn test_send_error_status_embeds_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("no such thing")
            .create_async()
            .await;

        let request = build_request(
            Method::GET,
            &server.url(),
            "missing",
            &RequestParams::new(),
            "ua",
        )
        .unwrap();

        let err = ReqwestTransport::default().send(&request).await.unwrap_err();

        mock.assert_async().await;
        let response = err.response().expect("embedded response");
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body.as_text(), Some("no such thing"));
    }

    #[tokio::test]
    async fn test_send_multipart() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header(
                "content-type",
                mockito::Matcher::Regex("^multipart/form-data; boundary=.+$".to_string()),
            )
            .match_body(mockito::Matcher::Regex(
                "name=\"file\"\r\n\r\nhello".to_string(),
            ))
            .with_status(201)
            .create_async()
            .await;

        let params = RequestParams::new().with_form_field("file", "hello");
        let request =
            build_request(Method::POST, &server.url(), "upload", &params, "ua").unwrap();

        let response = ReqwestTransport::default().send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status_code(), 201);
    }

    #[tokio::test]
    async fn test_send_connection_refused_has_no_response() {
        // Bind then drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let request = build_request(
            Method::GET,
            &format!("http://127.0.0.1:{}", port),
            "health",
            &RequestParams::new(),
            "ua",
        )
        .unwrap();

        let err = ReqwestTransport::default().send(&request).await.unwrap_err();
        assert!(err.response().is_none());
    }
}
