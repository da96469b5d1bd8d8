//! HTTP request building, transport and status-aware retries.

mod error;
mod request;
mod resolve;
mod response;
mod transport;

pub use error::{RequestError, TransportError};
pub use request::{DEFAULT_USER_AGENT, PreparedRequest, RequestParams, build_request};
pub use resolve::{RetryPolicy, resolve};
pub use response::{ApiResponse, ResponseBody};
pub use transport::{ReqwestTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;
