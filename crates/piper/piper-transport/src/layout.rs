//! Deterministic file layout: header, metadata blob, and one page-aligned
//! area per component. `Backer::create` and `Backer::open` must derive the
//! exact same offsets from the same `(metadata_size, component_sizes,
//! slot_count)` triple — that determinism is the whole point of storing
//! nothing else on disk.

use crate::error::{Result, TransportError};

pub const MAX_COMPONENT_COUNT: usize = 16;

/// Byte layout of the fixed header region, before page padding.
///
/// The wire table for this format places `writes`/`tickets`/`session`
/// immediately after `component_sizes` at offsets 76/84/92, but those
/// offsets are not 8-byte aligned (12 + 16*4 = 76) and Rust cannot safely
/// hand out a misaligned `&AtomicU64`. Four bytes of explicit padding are
/// inserted so the three counters land on 80/88/96 instead, preserving
/// field order and widths while fixing the alignment.
pub const HEADER_STATIC_BYTES: usize = 4 + 4 + 4 + MAX_COMPONENT_COUNT * 4; // 76
pub const HEADER_PAD_BYTES: usize = 4;
pub const WRITES_OFFSET: usize = HEADER_STATIC_BYTES + HEADER_PAD_BYTES; // 80
pub const TICKETS_OFFSET: usize = WRITES_OFFSET + 8; // 88
pub const SESSION_OFFSET: usize = TICKETS_OFFSET + 8; // 96
pub const HEADER_LOGICAL_BYTES: usize = SESSION_OFFSET + 8; // 104

#[inline]
pub fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Computed, page-aligned placement of every region in the backing file.
#[derive(Debug, Clone)]
pub struct Layout {
    pub page_size: usize,
    pub slot_count: u32,
    pub component_count: u32,
    pub metadata_size: u32,
    pub component_sizes: [u32; MAX_COMPONENT_COUNT],
    pub metadata_offset: u64,
    pub component_offsets: [u64; MAX_COMPONENT_COUNT],
    pub total_size: u64,
}

impl Layout {
    pub fn compute(
        page_size: usize,
        slot_count: u32,
        component_sizes: &[u32],
        metadata_size: u32,
    ) -> Result<Self> {
        if slot_count < 2 {
            return Err(TransportError::InvalidArgument(format!(
                "slot_count must be >= 2, got {slot_count}"
            )));
        }
        let component_count = component_sizes.len();
        if component_count == 0 || component_count > MAX_COMPONENT_COUNT {
            return Err(TransportError::InvalidArgument(format!(
                "component_count must be in [1, {MAX_COMPONENT_COUNT}], got {component_count}"
            )));
        }
        if metadata_size == 0 {
            return Err(TransportError::InvalidArgument(
                "metadata_size must be nonzero".into(),
            ));
        }
        for (i, &size) in component_sizes.iter().enumerate() {
            if size == 0 {
                return Err(TransportError::InvalidArgument(format!(
                    "component_sizes[{i}] must be nonzero"
                )));
            }
        }

        let mut sizes = [0u32; MAX_COMPONENT_COUNT];
        sizes[..component_count].copy_from_slice(component_sizes);

        let metadata_offset = page_size as u64;
        let mut offsets = [0u64; MAX_COMPONENT_COUNT];
        let mut cursor = align_up(metadata_offset as usize + metadata_size as usize, page_size) as u64;
        for i in 0..component_count {
            offsets[i] = cursor;
            let area_bytes = sizes[i] as u64 * slot_count as u64;
            cursor = align_up((cursor + area_bytes) as usize, page_size) as u64;
        }

        Ok(Layout {
            page_size,
            slot_count,
            component_count: component_count as u32,
            metadata_size,
            component_sizes: sizes,
            metadata_offset,
            component_offsets: offsets,
            total_size: cursor,
        })
    }

    #[inline]
    pub fn component_size(&self, component: usize) -> u32 {
        self.component_sizes[component]
    }

    #[inline]
    pub fn component_offset(&self, slot: u32, component: usize) -> u64 {
        self.component_offsets[component] + slot as u64 * self.component_sizes[component] as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_deterministic() {
        let a = Layout::compute(4096, 4, &[16, 1024], 64).unwrap();
        let b = Layout::compute(4096, 4, &[16, 1024], 64).unwrap();
        assert_eq!(a.total_size, b.total_size);
        assert_eq!(a.component_offsets, b.component_offsets);
    }

    #[test]
    fn layout_matches_expected_page_aligned_shape() {
        let page = 4096usize;
        let layout = Layout::compute(page, 4, &[16, 1024], 64).unwrap();
        assert_eq!(layout.slot_count, 4);
        assert_eq!(layout.component_count, 2);
        assert_eq!(layout.component_sizes[0], 16);
        assert_eq!(layout.component_sizes[1], 1024);

        let header_meta = align_up(page + 64, page) as u64;
        let comp0 = align_up(header_meta as usize + 4 * 16, page) as u64;
        let comp1 = align_up(comp0 as usize + 4 * 1024, page) as u64;
        assert_eq!(layout.component_offsets[0], header_meta);
        assert_eq!(layout.component_offsets[1], comp0);
        assert_eq!(layout.total_size, comp1);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(Layout::compute(4096, 1, &[16], 64).is_err());
        assert!(Layout::compute(4096, 4, &[], 64).is_err());
        assert!(Layout::compute(4096, 4, &[16, 0], 64).is_err());
        assert!(Layout::compute(4096, 4, &[16], 0).is_err());
    }
}
