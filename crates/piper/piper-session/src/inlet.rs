//! Producer handle: acquires the transport's writer session on construction,
//! releases it on drop. A process must hold at most one `Inlet` per pipe;
//! constructing a second one fails at `begin()` with concurrent-session.

use piper_transport::Session;

use crate::error::Result;
use crate::pipe::{Pipe, CONTENT_COMPONENT, PREAMBLE_COMPONENT};
use crate::preamble::Preamble;

pub struct Inlet<'p> {
    pipe: &'p Pipe,
    session: Session,
}

impl<'p> Inlet<'p> {
    pub fn new(pipe: &'p Pipe) -> Result<Self> {
        let session = pipe.transport().begin()?;
        Ok(Inlet { pipe, session })
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn start(&self) -> u64 {
        self.pipe.transport().middle()
    }

    pub fn until(&self) -> u64 {
        self.pipe.transport().until()
    }

    pub fn window(&self) -> u64 {
        self.pipe.transport().writable()
    }

    pub fn preamble(&self, position: u64) -> Result<Preamble> {
        let bytes = self.pipe.transport().input(self.session, position, PREAMBLE_COMPONENT)?;
        Ok(Preamble::read_from(bytes))
    }

    pub fn set_preamble(&self, position: u64, preamble: Preamble) -> Result<()> {
        let bytes = self.pipe.transport().input(self.session, position, PREAMBLE_COMPONENT)?;
        preamble.write_to(bytes);
        Ok(())
    }

    pub fn content(&self, position: u64) -> Result<&mut [u8]> {
        Ok(self.pipe.transport().input(self.session, position, CONTENT_COMPONENT)?)
    }

    pub fn flush(&self) -> Result<()> {
        self.pipe.transport().flush(self.session)?;
        Ok(())
    }
}

impl Drop for Inlet<'_> {
    fn drop(&mut self) {
        // best-effort: if this fails the session is already gone (e.g. an
        // external `unclog` ran concurrently), which is not this drop's
        // problem to report.
        let _ = self.pipe.transport().finish(self.session);
    }
}
