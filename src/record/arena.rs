//! Arena of records addressed by stable handles
//!
//! Records that point at other records (a visit at its last URL, a download
//! at its host) hold a [`Handle`] into the target's arena. The arena keeps a
//! referenced-by count next to each record; the count changes only through
//! [`Arena::set_ref`], and a referenced record cannot be removed.

use crate::error::{Error, Result};

/// Stable address of an arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

struct Entry<R> {
    value: R,
    refs: u32,
}

struct Slot<R> {
    generation: u32,
    entry: Option<Entry<R>>,
}

pub struct Arena<R> {
    slots: Vec<Slot<R>>,
    free: Vec<u32>,
    len: usize,
}

impl<R> Default for Arena<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Arena<R> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: R) -> Handle {
        self.len += 1;
        let entry = Some(Entry { value, refs: 0 });

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            return Handle {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            entry,
        });
        Handle {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn entry(&self, handle: Handle) -> Option<&Entry<R>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry<R>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn get(&self, handle: Handle) -> Option<&R> {
        self.entry(handle).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut R> {
        self.entry_mut(handle).map(|e| &mut e.value)
    }

    /// Number of records currently pointing at `handle`
    pub fn ref_count(&self, handle: Handle) -> u32 {
        self.entry(handle).map_or(0, |e| e.refs)
    }

    /// Repoint `slot` at `target`, moving one reference from the old target
    /// to the new one. Setting the same target is a no-op.
    pub fn set_ref(&mut self, slot: &mut Option<Handle>, target: Option<Handle>) -> Result<()> {
        if *slot == target {
            return Ok(());
        }

        if let Some(new) = target {
            let entry = self
                .entry_mut(new)
                .ok_or_else(|| Error::logic("reference to a removed arena record"))?;
            entry.refs += 1;
        }

        if let Some(old) = slot.take() {
            if let Some(entry) = self.entry_mut(old) {
                entry.refs = entry.refs.saturating_sub(1);
            }
        }

        *slot = target;
        Ok(())
    }

    /// Remove an unreferenced record
    pub fn remove(&mut self, handle: Handle) -> Result<R> {
        match self.entry(handle) {
            None => return Err(Error::logic("arena handle is stale")),
            Some(entry) if entry.refs > 0 => {
                return Err(Error::logic(format!(
                    "arena record is still referenced {} time(s)",
                    entry.refs
                )))
            }
            Some(_) => {}
        }

        let slot = &mut self.slots[handle.index as usize];
        let entry = slot
            .entry
            .take()
            .ok_or_else(|| Error::logic("arena handle is stale"))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Ok(entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &R)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|e| {
                (
                    Handle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    &e.value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_set_ref_moves_counts() -> Result<()> {
        let mut urls = Arena::new();
        let first = urls.insert("/index.html");
        let second = urls.insert("/about.html");

        let mut last_url = None;
        urls.set_ref(&mut last_url, Some(first))?;
        assert_eq!(urls.ref_count(first), 1);

        urls.set_ref(&mut last_url, Some(second))?;
        assert_eq!(urls.ref_count(first), 0);
        assert_eq!(urls.ref_count(second), 1);

        urls.set_ref(&mut last_url, Some(second))?;
        assert_eq!(urls.ref_count(second), 1);

        urls.set_ref(&mut last_url, None)?;
        assert_eq!(urls.ref_count(second), 0);
        assert_eq!(last_url, None);
        Ok(())
    }

    #[test]
    fn test_referenced_record_cannot_be_removed() -> Result<()> {
        let mut hosts = Arena::new();
        let host = hosts.insert(42u64);
        let mut owner = None;
        hosts.set_ref(&mut owner, Some(host))?;

        assert!(matches!(hosts.remove(host), Err(Error::Logic(_))));
        hosts.set_ref(&mut owner, None)?;
        assert_eq!(hosts.remove(host)?, 42);
        Ok(())
    }

    #[test]
    fn test_stale_handle_after_reuse() -> Result<()> {
        let mut arena = Arena::new();
        let old = arena.insert(1);
        arena.remove(old)?;
        let new = arena.insert(2);

        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        let mut slot = None;
        assert!(arena.set_ref(&mut slot, Some(old)).is_err());
        Ok(())
    }
}
