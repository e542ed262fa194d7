use super::*;

// ============================================================================
// Basic allocation tests
// ============================================================================

#[test]
fn test_sequential_alloc() {
    let mut alloc = SlotAllocator::new();
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(1));
    assert_eq!(alloc.alloc(), Some(2));
    assert_eq!(alloc.len(), 3);
    assert_eq!(alloc.high_water_mark(), 3);
}

#[test]
fn test_new_is_empty() {
    let alloc = SlotAllocator::default();
    assert!(alloc.is_empty());
    assert_eq!(alloc.high_water_mark(), 0);
    assert_eq!(alloc.capacity(), None);
}

// ============================================================================
// Free and recycle tests
// ============================================================================

#[test]
fn test_free_multiple_recycle_lifo() {
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc().unwrap(); // 0
    let _b = alloc.alloc().unwrap(); // 1
    let c = alloc.alloc().unwrap(); // 2
    assert!(alloc.free(a));
    assert!(alloc.free(c));

    // Free list is a stack: 2 first, then 0
    assert_eq!(alloc.alloc(), Some(2));
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(3));
}

#[test]
fn test_double_free_is_rejected() {
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc().unwrap();
    assert!(alloc.free(a));
    assert!(!alloc.free(a));
    assert_eq!(alloc.len(), 0);
    // Only one copy of `a` sits on the free list
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(1));
}

#[test]
fn test_free_never_issued_index() {
    let mut alloc = SlotAllocator::new();
    assert!(!alloc.free(7));
    assert!(!alloc.is_allocated(7));
}

#[test]
fn test_is_allocated_tracks_state() {
    let mut alloc = SlotAllocator::new();
    let a = alloc.alloc().unwrap();
    assert!(alloc.is_allocated(a));
    alloc.free(a);
    assert!(!alloc.is_allocated(a));
}

// ============================================================================
// Bounded pools
// ============================================================================

#[test]
fn test_bounded_allocator_exhausts() {
    let mut alloc = SlotAllocator::with_capacity(2);
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(1));
    assert_eq!(alloc.alloc(), None);
    assert_eq!(alloc.len(), 2);

    alloc.free(0);
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), None);
}

#[test]
fn test_clear_resets_everything() {
    let mut alloc = SlotAllocator::with_capacity(4);
    alloc.alloc();
    alloc.alloc();
    alloc.clear();
    assert!(alloc.is_empty());
    assert_eq!(alloc.high_water_mark(), 0);
    assert_eq!(alloc.alloc(), Some(0));
}
