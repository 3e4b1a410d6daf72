//! Async client for Google's Gemini generation API, supporting both the direct
//! (API-key) backend and Vertex AI (OAuth2 service-account) backend behind one
//! request coordinator.
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod sse;
pub mod streaming;
pub mod telemetry;
pub mod wire;

pub use auth::Backend;
pub use config::GeminiConfig;
pub use error::{ApiErrorKind, ErrorCategory, LlmError};
pub use request::RequestCoordinator;
pub use streaming::{StreamId, StreamMessage, StreamState, StreamStatus, SubscriberId};
