//! Glues a capture source to an `Inlet`: one token is spent per block
//! flushed, so the flush rate tracks the timer's tick rate regardless of how
//! fast the capture source can produce bytes.

use std::sync::atomic::AtomicBool;

use piper_device::CaptureSource;
use piper_pacing::TokenBucket;

use crate::error::Result;
use crate::inlet::Inlet;

pub struct ProducerLoop<'p> {
    inlet: Inlet<'p>,
    bucket: TokenBucket,
    cursor: u64,
}

impl<'p> ProducerLoop<'p> {
    pub fn new(inlet: Inlet<'p>, bucket: TokenBucket) -> Self {
        let cursor = inlet.start();
        ProducerLoop { inlet, bucket, cursor }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Run until `quit` is set or `source` reports an I/O error.
    pub fn run(&mut self, source: &mut dyn CaptureSource, quit: &AtomicBool) -> Result<()> {
        self.bucket.start()?;
        while !quit.load(std::sync::atomic::Ordering::Relaxed) {
            self.step(source)?;
        }
        Ok(())
    }

    /// One iteration of the producer protocol; exposed separately so tests
    /// can drive it deterministically without a background thread.
    pub fn step(&mut self, source: &mut dyn CaptureSource) -> Result<()> {
        if self.bucket.tokens() == 0 {
            self.bucket.try_refill_blocking()?;
            return Ok(());
        }

        let dest = self.inlet.content(self.cursor)?;
        let mut filled = 0;
        while filled < dest.len() {
            let n = source.read_into(&mut dest[filled..])?;
            if n == 0 {
                return Err(crate::error::SessionError::EndOfStream);
            }
            filled += n;
        }
        self.inlet.set_preamble(
            self.cursor,
            crate::preamble::Preamble {
                timestamp: piper_pacing::now_ns(),
            },
        )?;
        self.inlet.flush()?;
        self.bucket.spend(1)?;
        self.cursor += 1;
        Ok(())
    }
}
