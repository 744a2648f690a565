//! Read-only consumer handle: no session is required since readers never
//! mutate the transport. `watch` implements the back-off described in the
//! component design: spin-sleep in increments of `period` while the
//! transport is active, `10 × period` while it is not.

use std::time::Duration;

use crate::error::Result;
use crate::pipe::{Pipe, CONTENT_COMPONENT, PREAMBLE_COMPONENT};
use crate::preamble::Preamble;

pub struct Outlet<'p> {
    pipe: &'p Pipe,
}

impl<'p> Outlet<'p> {
    pub fn new(pipe: &'p Pipe) -> Self {
        Outlet { pipe }
    }

    pub fn start(&self) -> u64 {
        self.pipe.transport().start()
    }

    pub fn until(&self) -> u64 {
        self.pipe.transport().middle()
    }

    pub fn window(&self) -> u64 {
        self.pipe.transport().readable()
    }

    pub fn preamble(&self, position: u64) -> Result<Preamble> {
        let bytes = self.pipe.transport().view(position, PREAMBLE_COMPONENT)?;
        Ok(Preamble::read_from(bytes))
    }

    pub fn content(&self, position: u64) -> Result<&[u8]> {
        Ok(self.pipe.transport().view(position, CONTENT_COMPONENT)?)
    }

    /// Sleep up to `timeout` or until `until()` advances, whichever comes
    /// first. A signal (surfaced to callers as a set quit flag, checked
    /// between spins) causes early return.
    pub fn watch(&self, timeout: Duration, quit: &std::sync::atomic::AtomicBool) {
        let period = self.pipe.metadata().period_time;
        let step = if self.pipe.transport().active() {
            Duration::from_nanos(period)
        } else {
            Duration::from_nanos(period * 10)
        };
        let baseline = self.until();
        let deadline = std::time::Instant::now() + timeout;
        while self.until() == baseline && std::time::Instant::now() < deadline {
            if quit.load(std::sync::atomic::Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(step.min(timeout));
        }
    }
}
