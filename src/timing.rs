//! Operation timing: logs start/finish and feeds a duration histogram.
//!
//! Wraps core calls from the driver; the core itself never depends on it.

use std::time::Instant;

use metrics::histogram;

pub const OPERATION_SECONDS: &str = "chat_density_operation_seconds";

/// Run `f`, logging how long `op` took.
pub fn timed<T>(op: &'static str, f: impl FnOnce() -> T) -> T {
    tracing::debug!(target: "timing", op, "started");
    let started = Instant::now();
    let out = f();
    let elapsed = started.elapsed();

    histogram!(OPERATION_SECONDS, "op" => op).record(elapsed.as_secs_f64());
    tracing::info!(
        target: "timing",
        op,
        took_ms = elapsed.as_secs_f64() * 1_000.0,
        "finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_wrapped_value() {
        // no recorder installed: metrics calls are no-ops
        let v = timed("unit", || 40 + 2);
        assert_eq!(v, 42);

        let r: Result<u8, &str> = timed("unit_err", || Err("boom"));
        assert_eq!(r, Err("boom"));
    }
}
