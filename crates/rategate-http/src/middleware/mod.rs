//! HTTP middleware: rate governance and request ID tracking.

pub mod rate_limit;
pub mod request_id;
