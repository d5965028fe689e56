//! Duration calculator.
//!
//! Converts state + timestamp pairs into duration buckets: given the entry
//! timestamp of the state being left and the transition instant, yields the
//! elapsed whole seconds to add to that state's bucket.

use chrono::{DateTime, Utc};

/// Elapsed whole seconds between `from` and `to`.
///
/// Returns 0 if `from` is absent; a missing entry timestamp means no time can
/// be attributed, and reporting stays best-effort rather than failing.
///
/// Callers must ensure `to >= from`; if the clock reads violate that (skew
/// across processes), the result floors at 0 and the event is logged. Negative
/// durations must never reach the accumulators, where they would corrupt
/// aggregate reports.
pub fn elapsed_seconds(from: Option<DateTime<Utc>>, to: DateTime<Utc>) -> u64 {
    let Some(from) = from else {
        return 0;
    };

    let secs = (to - from).num_seconds();
    if secs < 0 {
        tracing::warn!(%from, %to, "clock skew produced a negative elapsed time, clamping to zero");
        return 0;
    }

    secs as u64
}
