/// Flat arena of resources addressed by typed handles
///
/// Inserting appends (or reuses a slot freed by an explicit `remove`) and
/// returns the handle. Lookups of the sentinel, of never-issued slots and
/// of removed slots all miss; nothing ever resolves to an arbitrary entry.

use std::marker::PhantomData;
use crate::error::{Error, Result};
use crate::utils::SlotAllocator;
use super::handle::ResourceHandle;

pub struct ResourceTable<H: ResourceHandle, T> {
    entries: Vec<Option<T>>,
    slots: SlotAllocator,
    _handle: PhantomData<H>,
}

impl<H: ResourceHandle, T> ResourceTable<H, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: SlotAllocator::new(),
            _handle: PhantomData,
        }
    }

    /// Store `value` and return its handle
    pub fn insert(&mut self, value: T) -> H {
        // Unbounded allocator: alloc never fails
        let slot = self.slots.alloc().unwrap_or(self.entries.len() as u32);
        let index = slot as usize;
        if index == self.entries.len() {
            self.entries.push(Some(value));
        } else {
            self.entries[index] = Some(value);
        }
        H::from_slot(slot)
    }

    pub fn get(&self, handle: H) -> Option<&T> {
        let slot = handle.slot()?;
        self.entries.get(slot as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let slot = handle.slot()?;
        self.entries.get_mut(slot as usize)?.as_mut()
    }

    /// Like `get`, with an `InvalidResource` error naming the table
    pub fn lookup(&self, handle: H) -> Result<&T> {
        self.get(handle).ok_or_else(|| {
            Error::InvalidResource(format!("{} handle {:?} is not live", H::KIND, handle))
        })
    }

    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Release one entry; its slot may be reissued afterwards
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let slot = handle.slot()?;
        if !self.slots.free(slot) {
            return None;
        }
        self.entries.get_mut(slot as usize)?.take()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live entries with their handles, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|value| (H::from_slot(slot as u32), value)))
    }

    /// Bulk release (shutdown)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }
}

impl<H: ResourceHandle, T> Default for ResourceTable<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
