//! Foundational low-level utilities shared across dqsync crates.
//!
//! Provides the atomic report writer, the check-window date helper, and the HTTP retry
//! policy used by the monitoring client and every catalog backend.

pub mod atomic_io;
pub mod time_utils;
pub mod transport;

pub use atomic_io::write_text_atomic;
pub use time_utils::check_window_start;
pub use transport::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    send_with_retry, truncate_for_error, RetryPolicy, TerminalReply,
};
