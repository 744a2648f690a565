//! Consumer protocol: `cursor = outlet.until()`, then token-gated stepping
//! through readable positions, with resync-to-head on detected data loss.
//! Lag detection is by position comparison against `outlet.start()`, never
//! by timestamp.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use piper_device::PlaybackSink;
use piper_pacing::TokenBucket;

use crate::error::Result;
use crate::outlet::Outlet;

pub struct DrainLoop<'p> {
    outlet: Outlet<'p>,
    bucket: TokenBucket,
    cursor: u64,
    resyncs: u64,
}

impl<'p> DrainLoop<'p> {
    pub fn new(outlet: Outlet<'p>, bucket: TokenBucket) -> Self {
        let cursor = outlet.until();
        DrainLoop {
            outlet,
            bucket,
            cursor,
            resyncs: 0,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Run until `quit` is set or `sink` reports an I/O error.
    pub fn run(&mut self, sink: &mut dyn PlaybackSink, quit: &AtomicBool) -> Result<()> {
        self.bucket.start()?;
        while !quit.load(std::sync::atomic::Ordering::Relaxed) {
            self.step(sink, quit)?;
        }
        Ok(())
    }

    /// One iteration of the drain protocol; exposed separately so tests can
    /// drive it deterministically without a background thread.
    pub fn step(&mut self, sink: &mut dyn PlaybackSink, quit: &AtomicBool) -> Result<()> {
        self.bucket.try_refill_blocking()?;
        if self.bucket.tokens() == 0 {
            return Ok(());
        }

        let until = self.outlet.until();
        if until == self.cursor {
            self.outlet.watch(Duration::from_millis(50), quit);
            return Ok(());
        }
        let start = self.outlet.start();
        if start > self.cursor {
            tracing::warn!(cursor = self.cursor, start, "discarding old data, resyncing to head");
            self.cursor = self.outlet.until();
            self.resyncs += 1;
            return Ok(());
        }

        let block = self.outlet.content(self.cursor)?;
        sink.write_all(block)?;
        self.bucket.spend(1)?;
        self.cursor += 1;
        Ok(())
    }
}
