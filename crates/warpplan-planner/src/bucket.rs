//! Token bucket limiting oracle calls per minute.

/// Continuously refilling bucket of `rpm` tokens.
///
/// Never blocks: a caller that cannot take a token falls back instead of
/// waiting.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rpm: f64,
    tokens: f64,
    last_refill: f64,
}

impl TokenBucket {
    /// A full bucket as of `now`.
    pub fn new(rpm: f64, now: f64) -> Self {
        Self {
            rpm,
            tokens: rpm,
            last_refill: now,
        }
    }

    /// Add `rpm` tokens per elapsed minute, up to capacity.
    pub fn refill(&mut self, now: f64) {
        let elapsed_min = (now - self.last_refill).max(0.0) / 60.0;
        self.tokens = (self.tokens + self.rpm * elapsed_min).min(self.rpm);
        self.last_refill = now;
    }

    /// Take one token if a whole one is available.
    pub fn try_take(&mut self, now: f64) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, refreshed to `now`.
    pub fn available(&mut self, now: f64) -> f64 {
        self.refill(now);
        self.tokens
    }
}
