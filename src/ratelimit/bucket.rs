//! Token Bucket Module
//!
//! Continuous token bucket: tokens accrue at `refill_rate` per second up to
//! `capacity`, and each admitted request spends `cost` tokens.

use std::time::Instant;

// == Bucket Limits ==
/// Capacity and refill rate a bucket is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLimits {
    /// Maximum token balance
    pub capacity: f64,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl BucketLimits {
    /// Creates limits, clamping negative or non-finite inputs to zero.
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity: sanitize(capacity),
            refill_rate: sanitize(refill_rate),
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// == Token Bucket ==
/// Per-key rate accounting state.
///
/// The balance stays within `[0, capacity]` at every observation point.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    // == Constructor ==
    /// Creates a full bucket.
    pub fn new(limits: BucketLimits, now: Instant) -> Self {
        Self {
            capacity: limits.capacity,
            refill_rate: limits.refill_rate,
            tokens: limits.capacity,
            last_refill: now,
        }
    }

    // == Refill ==
    /// Credits tokens for the time elapsed since the last refill.
    ///
    /// Time running backwards credits nothing.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    // == Consume ==
    /// Refills, then spends `cost` tokens if the balance allows it.
    ///
    /// Returns true if the request is admitted.
    pub fn consume(&mut self, cost: u32, now: Instant) -> bool {
        self.refill(now);

        let cost = f64::from(cost);
        if self.tokens >= cost {
            self.tokens = (self.tokens - cost).max(0.0);
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}
