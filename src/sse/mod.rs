pub mod parser;
pub mod transport;

pub use parser::{SseEvent, SseParser};
pub use transport::{SseOutcome, StreamSse};
