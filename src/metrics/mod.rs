//! Metrics and observability infrastructure.
//!
//! Events are emitted through the `metrics` facade; the collector and its
//! export format live outside this crate. The core only reports numbers.

pub mod events;

/// Macro for emitting metric events (Vector-style pattern).
///
/// Calls the `InternalEvent::emit()` method on the given event, which records
/// the corresponding counter, gauge, or histogram.
///
/// # Example
///
/// ```ignore
/// use floe::metrics::events::JobCompleted;
///
/// emit!(JobCompleted {
///     original_bytes: 4096,
///     compressed_bytes: 1024,
///     records: 100,
///     target: "events".to_string(),
/// });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use crate::emit;
