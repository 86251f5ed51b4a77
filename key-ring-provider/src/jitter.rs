//! Non-cryptographic, bounded jitter applied to the refresh period.

use chrono::Duration;
use rand::Rng;

/// Narrow `period` into `[0.8 * period, period)` using a thread-local,
/// OS-entropy-seeded PRNG.
///
/// A fresh generator per call would risk collapsing to identical jitter for
/// refreshes that start in the same instant on different threads; `rand`'s
/// `thread_rng` is lazily seeded once per thread and reused, which avoids
/// that (§9).
#[must_use]
pub fn jittered(period: Duration) -> Duration {
    let fudge: f64 = rand::thread_rng().gen_range(0.0..1.0);
    let millis = period.num_milliseconds() as f64 * (1.0 - fudge * 0.2);
    Duration::milliseconds(millis as i64)
}
