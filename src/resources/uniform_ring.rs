//! Ring buffer for per-draw uniform blocks.
//!
//! Every commit of a shader program's uniform block is written to the next
//! aligned slot of the program's ring, and the slot offset is used as the
//! dynamic offset when the program's bind group is set. Draws recorded in the
//! same frame therefore never overwrite each other's constants. The ring is
//! rewound at the start of each frame.
//!
//! A ring is a chain of equally sized pages. When a frame fills the last page
//! another one is created, so a frame can commit any number of blocks. Pages
//! are kept for later frames.

use crate::backend::{BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend};

/// A sub-allocation from a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingAllocation {
    /// Page buffer holding the slot.
    pub buffer: BufferHandle,
    /// Byte offset into `buffer`.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

/// Paged uniform ring.
#[derive(Debug)]
pub struct UniformRing {
    label: String,
    pages: Vec<BufferHandle>,
    slot_size: u64,
    slots_per_page: u64,
    page: usize,
    next_slot: u64,
    frame: u64,
}

impl UniformRing {
    /// Number of slots per page.
    pub const DEFAULT_SLOTS: u64 = 256;

    /// Create a ring whose slots hold `block_size` bytes aligned to `alignment`.
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        block_size: u64,
        alignment: u64,
        slots_per_page: u64,
    ) -> BackendResult<Self> {
        let mut ring = Self {
            label: label.to_string(),
            pages: Vec::new(),
            slot_size: align_up(block_size.max(16), alignment.max(1)),
            slots_per_page: slots_per_page.max(1),
            page: 0,
            next_slot: 0,
            frame: 0,
        };
        ring.add_page(backend)?;
        Ok(ring)
    }

    fn add_page<B: GraphicsBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(format!("{} uniform ring page {}", self.label, self.pages.len())),
            size: self.slot_size * self.slots_per_page,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        })?;
        self.pages.push(buffer);

        log::debug!(
            "Uniform ring for {} now has {} pages of {} slots of {} bytes",
            self.label,
            self.pages.len(),
            self.slots_per_page,
            self.slot_size
        );
        Ok(())
    }

    /// First page, the one every frame starts on
    pub fn buffer(&self) -> BufferHandle {
        self.pages[0]
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Allocate the next slot for `frame`, rewinding when the frame changes.
    ///
    /// A full page moves on to the next one, creating it if this is the
    /// busiest frame so far. Slots handed out earlier in the frame stay valid.
    pub fn allocate<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        frame: u64,
    ) -> BackendResult<RingAllocation> {
        if frame != self.frame {
            self.frame = frame;
            self.page = 0;
            self.next_slot = 0;
        }
        if self.next_slot == self.slots_per_page {
            self.page += 1;
            self.next_slot = 0;
            if self.page == self.pages.len() {
                self.add_page(backend)?;
            }
        }

        let allocation = RingAllocation {
            buffer: self.pages[self.page],
            offset: self.next_slot * self.slot_size,
            size: self.slot_size,
        };
        self.next_slot += 1;
        Ok(allocation)
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        for page in &self.pages {
            backend.destroy_buffer(*page);
        }
    }
}

/// Round `value` up to the next multiple of `alignment`.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use std::collections::HashSet;

    #[test]
    fn test_slots_are_aligned() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut ring = UniformRing::new(&mut backend, "test", 200, 256, 4).unwrap();
        assert_eq!(ring.slot_size(), 256);
        assert_eq!(ring.allocate(&mut backend, 1).unwrap().offset, 0);
        assert_eq!(ring.allocate(&mut backend, 1).unwrap().offset, 256);
    }

    #[test]
    fn test_new_frame_rewinds() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut ring = UniformRing::new(&mut backend, "test", 64, 256, 4).unwrap();
        ring.allocate(&mut backend, 1).unwrap();
        ring.allocate(&mut backend, 1).unwrap();
        let first = ring.allocate(&mut backend, 2).unwrap();
        assert_eq!((first.buffer, first.offset), (ring.buffer(), 0));
    }

    #[test]
    fn test_full_page_chains_a_new_one() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut ring = UniformRing::new(&mut backend, "test", 64, 256, 2).unwrap();
        let slots: Vec<_> = (0..5)
            .map(|_| ring.allocate(&mut backend, 1).unwrap())
            .map(|a| (a.buffer, a.offset))
            .collect();
        let unique: HashSet<_> = slots.iter().copied().collect();
        assert_eq!(unique.len(), slots.len());
        assert_eq!(ring.page_count(), 3);
        assert_eq!(slots[2], (slots[2].0, 0));
        assert_ne!(slots[2].0, slots[0].0);
    }

    #[test]
    fn test_pages_are_reused_by_later_frames() {
        let mut backend = HeadlessBackend::new(4, 4);
        let mut ring = UniformRing::new(&mut backend, "test", 64, 256, 1).unwrap();
        let busy: Vec<_> = (0..3).map(|_| ring.allocate(&mut backend, 1).unwrap()).collect();
        let again: Vec<_> = (0..3).map(|_| ring.allocate(&mut backend, 2).unwrap()).collect();
        assert_eq!(busy, again);
        assert_eq!(ring.page_count(), 3);
    }
}
