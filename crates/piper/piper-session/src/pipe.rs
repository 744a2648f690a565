//! `Pipe` is the single owning record for a named transport: it owns the
//! `Backer` and `Medium`, and hands out borrowed `Transport` values
//! configured with its current readable/writable split. `Inlet` and
//! `Outlet` borrow a `Pipe` rather than each other, which sidesteps the
//! self-referential-struct problem a literal port of the cyclic
//! Inlet→Transport→Medium→Backer ownership chain would run into in Rust.

use std::path::Path;

use piper_transport::{Backer, Medium, Metadata, Transport, TransportError, METADATA_BYTES};

use crate::error::{Result, SessionError};
use crate::preamble::PREAMBLE_SIZE;

pub const CONTENT_COMPONENT: usize = 1;
pub const PREAMBLE_COMPONENT: usize = 0;

pub struct Pipe {
    metadata: Metadata,
    backer: Backer,
    medium: Medium,
    readable: u64,
    writable: u64,
}

impl Pipe {
    /// Create a new backing file sized for `slot_count` blocks of
    /// `metadata.period_size` content bytes each, with the readable/writable
    /// split taken from `metadata`.
    pub fn create(path: impl AsRef<Path>, metadata: Metadata, slot_count: u32) -> Result<Self> {
        let metadata_bytes = metadata.to_bytes();
        let component_sizes = [PREAMBLE_SIZE as u32, metadata.period_size];
        let backer = Backer::create(path, &metadata_bytes, &component_sizes, slot_count)?;
        let medium = Medium::open(&backer)?;

        // writes/session start zeroed by set_len's zero-fill (the
        // INVALID/unclogged state); tickets is written explicitly to 1.
        Ok(Pipe {
            readable: metadata.readable as u64,
            writable: metadata.writable as u64,
            metadata,
            backer,
            medium,
        })
    }

    /// Open an existing backing file, reading its application metadata blob
    /// back out of the mapped region.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let backer = Backer::open(path)?;
        let medium = Medium::open(&backer)?;
        let metadata = Metadata::from_bytes(medium.metadata(&backer))?;

        if backer.metadata_size() as usize != METADATA_BYTES {
            return Err(SessionError::Transport(TransportError::InvalidLayout(format!(
                "metadata_size {} does not match expected {METADATA_BYTES}",
                backer.metadata_size()
            ))));
        }
        if backer.component_count() != 2 {
            return Err(SessionError::Transport(TransportError::InvalidLayout(format!(
                "component_count {} is not 2",
                backer.component_count()
            ))));
        }
        if backer.component_size(PREAMBLE_COMPONENT) != PREAMBLE_SIZE as u32 {
            return Err(SessionError::Transport(TransportError::InvalidLayout(format!(
                "preamble component size {} does not match expected {PREAMBLE_SIZE}",
                backer.component_size(PREAMBLE_COMPONENT)
            ))));
        }
        if backer.component_size(CONTENT_COMPONENT) != metadata.period_size {
            return Err(SessionError::Transport(TransportError::InvalidLayout(format!(
                "content component size {} does not match metadata period_size {}",
                backer.component_size(CONTENT_COMPONENT),
                metadata.period_size
            ))));
        }

        Ok(Pipe {
            readable: metadata.readable as u64,
            writable: metadata.writable as u64,
            metadata,
            backer,
            medium,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn backer(&self) -> &Backer {
        &self.backer
    }

    /// Grow the writable window; the readable window only grows as much as
    /// necessary to keep `readable + writable <= capacity`, never shrinks.
    pub fn reserve(&mut self, writable: u64) {
        let capacity = self.backer.slot_count() as u64;
        self.writable = writable;
        self.readable = self.readable.max(capacity - writable);
    }

    pub fn transport(&self) -> Transport<'_> {
        Transport::with_window(&self.backer, &self.medium, self.readable, self.writable)
            .expect("pipe's readable/writable window was already validated at construction")
    }
}
