//! Retrying HTTP/GraphQL client for end-to-end API tests.
//!
//! Status codes listed as retryable never surface as errors: once attempts run
//! out the last response is handed back so tests can assert on it directly.

pub mod client;
pub mod config;
pub mod http;
pub mod retry;

pub use client::{ApiClient, GRAPHQL_ENDPOINT, GraphqlOptions, RequestOptions};
pub use config::Config;
pub use http::{ApiResponse, RequestError, RequestParams, ResponseBody, TransportError};
