//! Owns the backing file on disk: header fields, metadata blob, and the
//! page-aligned component areas computed from them. A `Backer` does not mmap
//! anything itself — that's `Medium`'s job — it only establishes and
//! validates the on-disk shape.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};
use crate::layout::{Layout, HEADER_STATIC_BYTES, MAX_COMPONENT_COUNT, TICKETS_OFFSET};

pub struct Backer {
    path: PathBuf,
    layout: Layout,
}

impl Backer {
    /// Create a new backing file exclusively (fails if it already exists),
    /// lay out the header/metadata/component regions, and write the header
    /// and metadata blob to disk.
    pub fn create(
        path: impl AsRef<Path>,
        metadata: &[u8],
        component_sizes: &[u32],
        slot_count: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        let page_size = page_size::get();
        if metadata.is_empty() {
            return Err(TransportError::InvalidArgument(
                "metadata must be nonempty".into(),
            ));
        }
        let layout = Layout::compute(page_size, slot_count, component_sizes, metadata.len() as u32)?;

        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(layout.total_size)?;

        write_header(&file, &layout)?;
        file.write_at(metadata, layout.metadata_offset)?;
        file.sync_all()?;

        Ok(Backer {
            path: path.to_path_buf(),
            layout,
        })
    }

    /// Open an existing backing file, re-reading and re-validating its
    /// header. The recomputed layout must match what's actually on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let page_size = page_size::get();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut buf = [0u8; HEADER_STATIC_BYTES];
        file.read_at(&mut buf, 0)?;

        let slot_count = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let component_count = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;
        let metadata_size = u32::from_le_bytes(buf[8..12].try_into().unwrap());

        if slot_count < 2 {
            return Err(TransportError::InvalidLayout(format!(
                "slot_count {slot_count} < 2"
            )));
        }
        if component_count == 0 || component_count > MAX_COMPONENT_COUNT {
            return Err(TransportError::InvalidLayout(format!(
                "component_count {component_count} out of range"
            )));
        }
        if metadata_size == 0 {
            return Err(TransportError::InvalidLayout("metadata_size is zero".into()));
        }

        let mut component_sizes = Vec::with_capacity(component_count);
        for i in 0..component_count {
            let off = 12 + i * 4;
            let size = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            if size == 0 {
                return Err(TransportError::InvalidLayout(format!(
                    "component_sizes[{i}] is zero"
                )));
            }
            component_sizes.push(size);
        }

        let layout = Layout::compute(page_size, slot_count, &component_sizes, metadata_size)?;

        let actual_len = file.metadata()?.len();
        if layout.total_size > actual_len {
            return Err(TransportError::InvalidLayout(format!(
                "computed total_size {} exceeds file size {}",
                layout.total_size, actual_len
            )));
        }

        Ok(Backer {
            path: path.to_path_buf(),
            layout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn slot_count(&self) -> u32 {
        self.layout.slot_count
    }

    pub fn component_count(&self) -> u32 {
        self.layout.component_count
    }

    pub fn metadata_size(&self) -> u32 {
        self.layout.metadata_size
    }

    pub fn component_size(&self, component: usize) -> u32 {
        self.layout.component_size(component)
    }

    pub fn component_offset(&self, slot: u32, component: usize) -> u64 {
        self.layout.component_offset(slot, component)
    }

    pub fn total_size(&self) -> u64 {
        self.layout.total_size
    }

    pub fn metadata_offset(&self) -> u64 {
        self.layout.metadata_offset
    }

    pub fn writes_offset(&self) -> u64 {
        crate::layout::WRITES_OFFSET as u64
    }

    pub fn tickets_offset(&self) -> u64 {
        crate::layout::TICKETS_OFFSET as u64
    }

    pub fn session_offset(&self) -> u64 {
        crate::layout::SESSION_OFFSET as u64
    }
}

fn write_header(file: &File, layout: &Layout) -> Result<()> {
    let mut buf = [0u8; HEADER_STATIC_BYTES];
    buf[0..4].copy_from_slice(&layout.slot_count.to_le_bytes());
    buf[4..8].copy_from_slice(&layout.component_count.to_le_bytes());
    buf[8..12].copy_from_slice(&layout.metadata_size.to_le_bytes());
    for i in 0..MAX_COMPONENT_COUNT {
        let off = 12 + i * 4;
        buf[off..off + 4].copy_from_slice(&layout.component_sizes[i].to_le_bytes());
    }
    file.write_at(&buf, 0)?;
    // writes/session start zeroed by set_len's implicit zero-fill; tickets
    // starts at 1 so the first fetch_add in begin() hands out session id 1.
    file.write_at(&1u64.to_le_bytes(), TICKETS_OFFSET as u64)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(tag: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        PathBuf::from(format!("/tmp/piper_backer_test_{tag}_{ts}"))
    }

    #[test]
    fn create_then_open_agree_on_layout() {
        let path = tmp_path("create_open");
        let metadata = vec![0u8; 64];
        let backer = Backer::create(&path, &metadata, &[16, 1024], 4).unwrap();
        let total = backer.total_size();
        let reopened = Backer::open(&path).unwrap();
        assert_eq!(reopened.total_size(), total);
        assert_eq!(reopened.component_offset(0, 1), backer.component_offset(0, 1));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn create_fails_if_file_exists() {
        let path = tmp_path("exists");
        let metadata = vec![0u8; 64];
        let _first = Backer::create(&path, &metadata, &[16, 1024], 4).unwrap();
        let second = Backer::create(&path, &metadata, &[16, 1024], 4);
        assert!(second.is_err());
        let _ = std::fs::remove_file(&path);
    }
}
