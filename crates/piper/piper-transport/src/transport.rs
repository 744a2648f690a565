//! Enforces the windowed producer/consumer protocol over a `Medium`: session
//! acquisition, block visibility, flush, view. The only synchronizing
//! variable is `writes`; session acquisition is a separate, coarser CAS.

use std::sync::atomic::Ordering;

use crate::backer::Backer;
use crate::error::{Result, TransportError};
use crate::medium::Medium;

pub type Session = u64;
pub type Position = u64;

pub const INVALID_SESSION: Session = 0;

pub struct Transport<'a> {
    backer: &'a Backer,
    medium: &'a Medium,
    capacity: u64,
    readable: u64,
    writable: u64,
}

impl<'a> Transport<'a> {
    /// Bind to a medium with the default window split: `readable = capacity -
    /// 1`, `writable = 1`.
    pub fn new(backer: &'a Backer, medium: &'a Medium) -> Self {
        let capacity = backer.slot_count() as u64;
        Transport {
            backer,
            medium,
            capacity,
            readable: capacity - 1,
            writable: 1,
        }
    }

    /// Bind to a medium with an explicit window split, e.g. one recovered
    /// from a pipe's application metadata blob.
    pub fn with_window(backer: &'a Backer, medium: &'a Medium, readable: u64, writable: u64) -> Result<Self> {
        let capacity = backer.slot_count() as u64;
        if readable == 0 || writable == 0 || readable + writable > capacity {
            return Err(TransportError::InvalidArgument(format!(
                "readable={readable} writable={writable} incompatible with capacity={capacity}"
            )));
        }
        Ok(Transport {
            backer,
            medium,
            capacity,
            readable,
            writable,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn readable(&self) -> u64 {
        self.readable
    }

    pub fn writable(&self) -> u64 {
        self.writable
    }

    /// Grow the writable window to `writable`, growing the readable window
    /// only as much as necessary to keep `readable + writable <= capacity`.
    /// Never shrinks an already-larger readable window.
    pub fn reserve(&mut self, writable: u64) -> Result<()> {
        if writable == 0 || writable >= self.capacity {
            return Err(TransportError::InvalidArgument(format!(
                "writable window {writable} out of range [1, {})",
                self.capacity
            )));
        }
        self.writable = writable;
        self.readable = self.readable.max(self.capacity - writable);
        Ok(())
    }

    #[inline]
    fn slot(&self, position: Position) -> u32 {
        (position % self.capacity) as u32
    }

    /// Lower bound of the visible window: `max(0, writes - readable)`.
    pub fn start(&self) -> Position {
        let writes = self.medium.writes().load(Ordering::Acquire);
        if writes < self.readable {
            0
        } else {
            writes - self.readable
        }
    }

    /// First writable slot / one past the last readable slot.
    pub fn middle(&self) -> Position {
        self.medium.writes().load(Ordering::Acquire)
    }

    /// Last writable slot.
    pub fn until(&self) -> Position {
        self.medium.writes().load(Ordering::Acquire) + self.writable - 1
    }

    pub fn active(&self) -> bool {
        self.medium.session().load(Ordering::Acquire) != INVALID_SESSION
    }

    /// Read-only view of `component` at readable position `p`. Fails with
    /// `invalid-position` unless `start <= p < middle` (re-read at call
    /// time).
    pub fn view(&self, position: Position, component: usize) -> Result<&'a [u8]> {
        let writes = self.medium.writes().load(Ordering::Acquire);
        let start = if writes < self.readable {
            0
        } else {
            writes - self.readable
        };
        if position < start || position >= writes {
            return Err(TransportError::InvalidPosition {
                position,
                start,
                end: writes,
            });
        }
        Ok(self.medium.component(self.backer, self.slot(position), component))
    }

    /// Acquire the exclusive writer session. Fails with `concurrent-session`
    /// if another session is already active; the discarded ticket is
    /// harmless (monotonicity of `tickets` is all that's required).
    pub fn begin(&self) -> Result<Session> {
        let session = self.medium.tickets().fetch_add(1, Ordering::Acquire);
        match self.medium.session().compare_exchange(
            INVALID_SESSION,
            session,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::debug!(session, "writer session acquired");
                Ok(session)
            }
            Err(_) => Err(TransportError::ConcurrentSession),
        }
    }

    /// Mutable view of `component` at writable position `p`, held by session
    /// `s`. Fails with `stale-session` if `s` is not the live session, or
    /// `invalid-argument` if `p` is outside `[middle, until]`.
    pub fn input(&self, session: Session, position: Position, component: usize) -> Result<&'a mut [u8]> {
        let live = self.medium.session().load(Ordering::Acquire);
        if live != session {
            return Err(TransportError::StaleSession {
                provided: session,
                live,
            });
        }
        let middle = self.medium.writes().load(Ordering::Acquire);
        let until = middle + self.writable - 1;
        if position < middle || position > until {
            return Err(TransportError::InvalidArgument(format!(
                "position {position} outside writable window [{middle}, {until}]"
            )));
        }
        Ok(self
            .medium
            .component_mut(self.backer, self.slot(position), component))
    }

    /// Commit the current writable block: `writes.fetch_add(1, Release)`.
    pub fn flush(&self, session: Session) -> Result<()> {
        let live = self.medium.session().load(Ordering::Acquire);
        if live != session {
            return Err(TransportError::StaleSession {
                provided: session,
                live,
            });
        }
        self.medium.writes().fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Release the writer session. Errors if `session` is not the current
    /// holder.
    pub fn finish(&self, session: Session) -> Result<()> {
        match self.medium.session().compare_exchange(
            session,
            INVALID_SESSION,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::debug!(session, "writer session released");
                Ok(())
            }
            Err(_) => Err(TransportError::InvalidArgument(format!(
                "finish: session {session} is not the live session"
            ))),
        }
    }

    /// Operator action: force the session atomic back to INVALID regardless
    /// of its current value, reclaiming an orphaned session after an
    /// abnormal writer exit.
    pub fn unclog(&self) {
        let previous = self.medium.session().swap(INVALID_SESSION, Ordering::Release);
        if previous != INVALID_SESSION {
            tracing::warn!(previous_session = previous, "unclogged orphaned session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backer::Backer;
    use crate::medium::Medium;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(tag: &str) -> std::path::PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::path::PathBuf::from(format!("/tmp/piper_transport_test_{tag}_{ts}"))
    }

    fn make(tag: &str, slot_count: u32) -> (Backer, Medium, std::path::PathBuf) {
        let path = tmp_path(tag);
        let metadata = vec![0u8; 64];
        let backer = Backer::create(&path, &metadata, &[16, 1024], slot_count).unwrap();
        let medium = Medium::open(&backer).unwrap();
        (backer, medium, path)
    }

    #[test]
    fn single_writer_enforced() {
        let (backer, medium, path) = make("e2", 4);
        let transport = Transport::new(&backer, &medium);
        let s1 = transport.begin().unwrap();
        assert!(s1 >= 1);
        assert!(transport.active());
        assert!(transport.begin().is_err());
        transport.finish(s1).unwrap();
        assert!(!transport.active());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn window_invariant_holds_after_writes() {
        let (backer, medium, path) = make("window", 8);
        let mut transport = Transport::new(&backer, &medium);
        transport.reserve(3).unwrap();
        let s = transport.begin().unwrap();
        for _ in 0..5 {
            let p = transport.middle();
            transport.input(s, p, 1).unwrap();
            transport.flush(s).unwrap();
        }
        let start = transport.start();
        let middle = transport.middle();
        let until = transport.until();
        assert!(start <= middle);
        assert!(middle <= until + 1);
        assert!(middle - start <= transport.readable());
        assert_eq!(until - middle + 1, transport.writable());
        transport.finish(s).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn wrap_reuses_slots_with_correct_contents() {
        let (backer, medium, path) = make("wrap", 4);
        let transport = Transport::new(&backer, &medium);
        let s = transport.begin().unwrap();
        for p in 0u64..20 {
            let slot = transport.input(s, p, 1).unwrap();
            slot.fill(p as u8);
            transport.flush(s).unwrap();
        }
        let view = transport.view(19, 1).unwrap();
        assert!(view.iter().all(|&b| b == 19));
        transport.finish(s).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unclog_recovers_orphaned_session() {
        let (backer, medium, path) = make("unclog", 4);
        let transport = Transport::new(&backer, &medium);
        let _s1 = transport.begin().unwrap();
        assert!(transport.begin().is_err());
        transport.unclog();
        let s2 = transport.begin().unwrap();
        assert!(s2 >= 1);
        let _ = std::fs::remove_file(&path);
    }
}
