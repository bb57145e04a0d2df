//! Tower middleware applied to every request.
//!
//! - `RequestIdLayer`: assigns or propagates `x-request-id`
//! - `LoggingLayer`: one span per request with start and completion events

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};
