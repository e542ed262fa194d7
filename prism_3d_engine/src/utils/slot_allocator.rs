/// Allocates and recycles `u32` slot indices.
///
/// Backs the resource tables and the material pools. Freed indices go to
/// a LIFO free list and are handed out again by later allocations, so a
/// slot is only ever recycled after an explicit `free`.
///
/// An optional capacity turns the allocator into a fixed-size pool:
/// `alloc` returns `None` once every slot is live.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::new();
/// let a = alloc.alloc().unwrap();  // 0
/// let b = alloc.alloc().unwrap();  // 1
/// alloc.free(a);                   // 0 is now available
/// let c = alloc.alloc().unwrap();  // 0 (recycled)
/// ```
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    free_list: Vec<u32>,
    live: Vec<bool>,
    len: u32,
    capacity: Option<u32>,
}

impl SlotAllocator {
    /// Create an unbounded allocator
    pub fn new() -> Self {
        Self {
            free_list: Vec::new(),
            live: Vec::new(),
            len: 0,
            capacity: None,
        }
    }

    /// Create an allocator that never hands out more than `capacity` slots
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            free_list: Vec::new(),
            live: Vec::with_capacity(capacity as usize),
            len: 0,
            capacity: Some(capacity),
        }
    }

    /// Allocate the next available slot index
    ///
    /// Returns `None` when a bounded allocator is full.
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                let id = self.live.len() as u32;
                if self.capacity.is_some_and(|cap| id >= cap) {
                    return None;
                }
                self.live.push(false);
                id
            }
        };
        self.live[id as usize] = true;
        self.len += 1;
        Some(id)
    }

    /// Return a slot index to the pool for reuse
    ///
    /// Returns `false` (and changes nothing) for an index that is not live,
    /// which covers double frees and never-issued indices.
    pub fn free(&mut self, id: u32) -> bool {
        match self.live.get_mut(id as usize) {
            Some(live) if *live => {
                *live = false;
                self.len -= 1;
                self.free_list.push(id);
                true
            }
            _ => false,
        }
    }

    /// Whether `id` is currently allocated
    pub fn is_allocated(&self, id: u32) -> bool {
        self.live.get(id as usize).copied().unwrap_or(false)
    }

    /// Highest index ever allocated + 1.
    ///
    /// Minimum length the backing storage needs to hold every live index.
    pub fn high_water_mark(&self) -> u32 {
        self.live.len() as u32
    }

    /// Maximum number of live slots, if bounded
    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release every slot at once
    pub fn clear(&mut self) {
        self.free_list.clear();
        self.live.clear();
        self.len = 0;
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
