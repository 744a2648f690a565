//! Rate limiter built over `Timer`: each elapsed period adds `fill` tokens,
//! saturated at `capacity`; `spend` draws tokens down.

use std::time::Duration;

use crate::error::{PacingError, Result};
use crate::timer::Timer;

pub struct TokenBucket {
    timer: Timer,
    capacity: u32,
    fill: u32,
    tokens: u32,
}

impl TokenBucket {
    pub fn new(capacity: u32, fill: u32, period: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(PacingError::InvalidArgument("capacity must be nonzero".into()));
        }
        if fill == 0 {
            return Err(PacingError::InvalidArgument("fill must be nonzero".into()));
        }
        Ok(TokenBucket {
            timer: Timer::new(period)?,
            capacity,
            fill,
            tokens: 0,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn fill(&self) -> u32 {
        self.fill
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn start(&mut self) -> Result<()> {
        self.timer.start()?;
        self.tokens = 0;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.timer.stop()?;
        Ok(())
    }

    /// Spend `amount` tokens; fails with `invalid-argument` if insufficient
    /// tokens are available (the caller is expected to `refill` first).
    pub fn spend(&mut self, amount: u32) -> Result<()> {
        if self.tokens < amount {
            return Err(PacingError::InvalidArgument(format!(
                "overspend: have {} tokens, need {amount}",
                self.tokens
            )));
        }
        self.tokens -= amount;
        Ok(())
    }

    /// Block until at least one token becomes available.
    pub fn refill(&mut self) -> Result<()> {
        while self.tokens == 0 {
            self.try_refill(-1)?;
        }
        Ok(())
    }

    /// Equivalent to `try_refill(-1)`.
    pub fn try_refill_blocking(&mut self) -> Result<()> {
        self.try_refill(-1)
    }

    pub fn try_refill(&mut self, timeout_ms: i32) -> Result<()> {
        if self.tokens == 0 {
            if self.timer.ticks() == 0 {
                self.timer.try_accumulate(timeout_ms)?;
            }
            let elapsed = self.timer.ticks();
            if elapsed > 0 {
                let increment = self.timer.consume() as u64 * self.fill as u64;
                let limit = (self.capacity - self.tokens) as u64;
                self.tokens += increment.min(limit) as u32;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_requires_sufficient_tokens() {
        let mut bucket = TokenBucket::new(4, 1, Duration::from_secs(60)).unwrap();
        assert!(bucket.spend(1).is_err());
    }

    #[test]
    fn fills_up_to_capacity_and_spends() {
        let mut bucket = TokenBucket::new(2, 1, Duration::from_millis(5)).unwrap();
        bucket.start().unwrap();
        bucket.refill().unwrap();
        assert!(bucket.tokens() >= 1);
        bucket.spend(1).unwrap();
        bucket.stop().unwrap();
    }
}
