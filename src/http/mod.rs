//! HTTP transport layer: retry policy, error classification, and the injectable
//! unary transport used by the request coordinator.

pub mod classify;
pub mod retry;
pub mod transport;

pub use classify::classify_http_error;
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
