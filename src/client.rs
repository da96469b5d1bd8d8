//! Caller-facing client: build, send with retries, return the final response.

use std::collections::BTreeMap;

use log::debug;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::http::{
    ApiResponse, ReqwestTransport, RequestError, RequestParams, RetryPolicy, Transport,
    TransportError, build_request, resolve,
};
use crate::retry::{DEFAULT_ATTEMPTS, DEFAULT_DELAY_MS};

/// Path of the GraphQL endpoint, relative to the base URL.
pub const GRAPHQL_ENDPOINT: &str = "graphql";

/// Everything needed for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub base_url: String,
    pub endpoint: String,
    pub params: RequestParams,
    /// Status codes that trigger another attempt instead of being final.
    pub retry_status_codes: Vec<u16>,
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RequestOptions {
    pub fn new(method: Method, base_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            params: RequestParams::default(),
            retry_status_codes: Vec::new(),
            attempts: DEFAULT_ATTEMPTS.get(),
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A GraphQL operation sent to `<base_url>/graphql`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlOptions {
    pub query: String,
    pub variables: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub retry_status_codes: Vec<u16>,
    pub attempts: u32,
    pub delay_ms: u64,
}

impl GraphqlOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            headers: BTreeMap::new(),
            retry_status_codes: Vec::new(),
            attempts: DEFAULT_ATTEMPTS.get(),
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// The JSON document posted to the server.
    pub fn payload(&self) -> Result<Value, RequestError> {
        let payload = GraphqlPayload {
            query: &self.query,
            variables: self.variables.as_ref(),
        };
        serde_json::to_value(payload)
            .map_err(|e| RequestError::invalid(format!("failed to encode GraphQL payload: {}", e)))
    }
}

#[derive(Serialize)]
struct GraphqlPayload<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a Value>,
}

/// Retrying request client over any [`Transport`].
#[derive(Clone)]
pub struct ApiClient<T: Transport> {
    transport: T,
    config: Config,
}

impl ApiClient<ReqwestTransport> {
    /// Client backed by reqwest.
    pub fn with_reqwest(config: Config) -> Result<Self, RequestError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::with_source("Failed to build HTTP client", e))?;
        Ok(Self::new(ReqwestTransport::new(client), config))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sends a request, retrying per the options, and returns the final response.
    ///
    /// Responses with a status listed in `retry_status_codes` are retried; if
    /// every attempt gets one, the last of them is returned. Errors are only
    /// returned for invalid options and for transport failures that persist
    /// through all attempts.
    #[tracing::instrument(skip(self, options), fields(method = %options.method, endpoint = %options.endpoint))]
    pub async fn request(&self, options: RequestOptions) -> Result<ApiResponse, RequestError> {
        let policy = RetryPolicy::new(
            options.attempts,
            options.delay_ms,
            options.retry_status_codes.iter().copied(),
        )?;
        let request = build_request(
            options.method,
            &options.base_url,
            &options.endpoint,
            &options.params,
            &self.config.user_agent,
        )?;

        let operation_name = format!("{} {}", request.method, request.url);
        debug!(
            "{}: up to {} attempt(s), retrying on {:?}",
            operation_name, policy.attempts, policy.retry_status_codes
        );

        let response = resolve(&operation_name, &policy, || self.transport.send(&request)).await?;

        debug!("{}: final status {}", operation_name, response.status);
        Ok(response)
    }

    /// Posts a GraphQL operation to the configured base URL.
    #[tracing::instrument(skip(self, options))]
    pub async fn graphql(&self, options: GraphqlOptions) -> Result<ApiResponse, RequestError> {
        let params = RequestParams {
            headers: options.headers.clone(),
            data: Some(options.payload()?),
            form_data: None,
        };

        let request = RequestOptions::new(Method::POST, &self.config.base_url, GRAPHQL_ENDPOINT)
            .with_params(params)
            .with_retry_status_codes(options.retry_status_codes)
            .with_attempts(options.attempts)
            .with_delay_ms(options.delay_ms);

        self.request(request).await
    }
}
