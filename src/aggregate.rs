//! # Bucket Aggregator
//! Turns a time-ordered chat sequence into per-window message counts.
//!
//! Two modes:
//! - [`BucketMode::MessageAnchored`] (default): each bucket starts at an
//!   actual message timestamp. When a message lands more than `width`
//!   seconds after the current origin, the running bucket is closed and that
//!   message becomes the next origin. Origin-setting messages are not
//!   counted, so buckets vary in span with message density and the series is
//!   sparse (quiet gaps produce no buckets).
//! - [`BucketMode::Aligned`]: fixed cadence on multiples of `width`, every
//!   message counted exactly once, zero buckets kept for quiet gaps.
//!
//! Downstream charts built from older exports depend on the anchored
//! bucketing, so it stays the default.

use serde::{Deserialize, Serialize};

use crate::error::{check_width, DensityError, Result};
use crate::ingest::types::ChatMessage;

/// Upper bound on dense buckets produced by [`BucketMode::Aligned`].
pub const MAX_ALIGNED_BUCKETS: usize = 10_000_000;

/// Number of messages attributed to the window starting at `start_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "time_in_seconds")]
    pub start_seconds: f64,
    #[serde(rename = "number_of_comments")]
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketMode {
    #[default]
    MessageAnchored,
    Aligned,
}

impl std::str::FromStr for BucketMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "message_anchored" | "anchored" => Ok(Self::MessageAnchored),
            "aligned" | "calendar" => Ok(Self::Aligned),
            other => anyhow::bail!("unknown bucket mode: {other}"),
        }
    }
}

/// Message-anchored aggregation (the default mode).
pub fn aggregate(events: &[ChatMessage], width_seconds: f64) -> Result<Vec<Bucket>> {
    aggregate_with(events, width_seconds, BucketMode::MessageAnchored)
}

/// Counts per 60 seconds, message-anchored.
pub fn per_minute(events: &[ChatMessage]) -> Result<Vec<Bucket>> {
    aggregate(events, 60.0)
}

pub fn aggregate_with(
    events: &[ChatMessage],
    width_seconds: f64,
    mode: BucketMode,
) -> Result<Vec<Bucket>> {
    check_width(width_seconds)?;
    validate_order(events)?;

    let buckets = match mode {
        BucketMode::MessageAnchored => anchored(events, width_seconds),
        BucketMode::Aligned => aligned(events, width_seconds)?,
    };

    tracing::debug!(
        target: "aggregate",
        events = events.len(),
        buckets = buckets.len(),
        width_seconds,
        ?mode,
        "aggregated"
    );
    Ok(buckets)
}

/// Fail fast on NaN/inf or decreasing timestamps; we never sort silently.
pub fn validate_order(events: &[ChatMessage]) -> Result<()> {
    let mut prev = f64::NEG_INFINITY;
    for (index, ev) in events.iter().enumerate() {
        let t = ev.timestamp_seconds;
        if !t.is_finite() {
            return Err(DensityError::MalformedRecord {
                index,
                timestamp: t,
                reason: "timestamp is not a finite number",
            });
        }
        if t < prev {
            return Err(DensityError::MalformedRecord {
                index,
                timestamp: t,
                reason: "timestamp decreases (input must be sorted ascending)",
            });
        }
        prev = t;
    }
    Ok(())
}

fn anchored(events: &[ChatMessage], width: f64) -> Vec<Bucket> {
    let Some((first, rest)) = events.split_first() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut origin = first.timestamp_seconds;
    let mut count: u64 = 0;

    for ev in rest {
        let t = ev.timestamp_seconds;
        if t > origin + width {
            out.push(Bucket {
                start_seconds: origin,
                count,
            });
            // the overflowing message opens the next bucket but is not counted
            origin = t;
            count = 0;
        } else {
            count += 1;
        }
    }

    if count > 0 {
        out.push(Bucket {
            start_seconds: origin,
            count,
        });
    }
    out
}

fn aligned(events: &[ChatMessage], width: f64) -> Result<Vec<Bucket>> {
    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Ok(Vec::new());
    };

    let first_slot = (first.timestamp_seconds / width).floor();
    let last_slot = (last.timestamp_seconds / width).floor();
    let span = last_slot - first_slot + 1.0;
    if !(span.is_finite() && span <= MAX_ALIGNED_BUCKETS as f64) {
        return Err(DensityError::TooManyBuckets {
            width,
            slots: span,
            limit: MAX_ALIGNED_BUCKETS,
        });
    }
    let slots = span as usize;

    let mut out: Vec<Bucket> = (0..slots)
        .map(|i| Bucket {
            start_seconds: (first_slot + i as f64) * width,
            count: 0,
        })
        .collect();

    for ev in events {
        let idx = ((ev.timestamp_seconds / width).floor() - first_slot) as usize;
        // float rounding at the very top edge
        let idx = idx.min(slots - 1);
        out[idx].count += 1;
    }
    Ok(out)
}
