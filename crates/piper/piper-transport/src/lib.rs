//! On-disk/mmap shared-memory transport: file layout (`Backer`), the live
//! mapping (`Medium`), and the windowed single-writer/multi-reader protocol
//! on top of it (`Transport`).

pub mod backer;
pub mod error;
pub mod layout;
pub mod medium;
pub mod metadata;
pub mod transport;

pub use backer::Backer;
pub use error::{Result, TransportError};
pub use layout::Layout;
pub use medium::Medium;
pub use metadata::{Metadata, METADATA_BYTES};
pub use transport::{Position, Session, Transport, INVALID_SESSION};
