use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Anything an arena can own must report how many bytes it pins.
pub trait Footprint {
    fn footprint(&self) -> usize;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error(
        "arena {arena} capacity exceeded: requested {requested} bytes with {reserved} of {capacity} already reserved"
    )]
    CapacityExceeded {
        arena: u64,
        requested: usize,
        reserved: usize,
        capacity: usize,
    },

    #[error("handle belongs to arena {handle_arena}, not arena {arena}")]
    ForeignHandle { arena: u64, handle_arena: u64 },

    #[error("handle from generation {handle_generation} used after release (arena {arena} is at generation {generation})")]
    Released {
        arena: u64,
        handle_generation: u64,
        generation: u64,
    },

    #[error("slot {slot} is out of range for arena {arena} holding {len} items")]
    SlotOutOfRange { arena: u64, slot: usize, len: usize },
}

/// Arena-bound reference to one stored item.
///
/// A handle is only meaningful for the arena that issued it, and only until
/// that arena is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    arena: u64,
    generation: u64,
    slot: usize,
}

impl Handle {
    pub fn arena_id(&self) -> u64 {
        self.arena
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

struct ArenaState<T> {
    generation: u64,
    reserved: usize,
    slots: Vec<T>,
}

/// Owner of every buffer produced by one conversion.
///
/// Items are reserved against a byte budget, addressed by [`Handle`] and
/// dropped all at once by [`Arena::release`] (or when the arena drops).
/// Individual items are never freed on their own.
pub struct Arena<T> {
    id: u64,
    capacity: usize,
    state: Mutex<ArenaState<T>>,
}

impl<T: Footprint + Clone> Arena<T> {
    pub fn new(capacity: usize) -> Self {
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Creating arena {} with capacity {} bytes", id, capacity);

        Self {
            id,
            capacity,
            state: Mutex::new(ArenaState {
                generation: 0,
                reserved: 0,
                slots: Vec::new(),
            }),
        }
    }

    /// An arena with no byte budget.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check_room(&self, state: &ArenaState<T>, requested: usize) -> Result<(), ArenaError> {
        if requested > self.capacity - state.reserved {
            return Err(ArenaError::CapacityExceeded {
                arena: self.id,
                requested,
                reserved: state.reserved,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Fail with `CapacityExceeded` unless `bytes` more would fit right now.
    pub fn ensure_room(&self, bytes: usize) -> Result<(), ArenaError> {
        let state = self.state.lock();
        self.check_room(&state, bytes)
    }

    /// Take ownership of `item`, reserving its footprint.
    pub fn insert(&self, item: T) -> Result<Handle, ArenaError> {
        let requested = item.footprint();
        let mut state = self.state.lock();
        self.check_room(&state, requested)?;

        state.reserved += requested;
        state.slots.push(item);
        let slot = state.slots.len() - 1;
        debug!(
            "Arena {} reserved {} bytes for slot {} ({} bytes total)",
            self.id, requested, slot, state.reserved
        );

        Ok(Handle {
            arena: self.id,
            generation: state.generation,
            slot,
        })
    }

    /// Take ownership of every item or of none.
    pub fn insert_all(&self, items: Vec<T>) -> Result<Vec<Handle>, ArenaError> {
        let requested = items
            .iter()
            .fold(0usize, |acc, item| acc.saturating_add(item.footprint()));
        let mut state = self.state.lock();
        self.check_room(&state, requested)?;

        state.reserved += requested;
        let first = state.slots.len();
        let count = items.len();
        state.slots.extend(items);
        debug!(
            "Arena {} reserved {} bytes for slots {}..{} ({} bytes total)",
            self.id,
            requested,
            first,
            first + count,
            state.reserved
        );

        let generation = state.generation;
        Ok((first..first + count)
            .map(|slot| Handle {
                arena: self.id,
                generation,
                slot,
            })
            .collect())
    }

    /// Fetch a clone of the item behind `handle`.
    pub fn get(&self, handle: Handle) -> Result<T, ArenaError> {
        if handle.arena != self.id {
            return Err(ArenaError::ForeignHandle {
                arena: self.id,
                handle_arena: handle.arena,
            });
        }

        let state = self.state.lock();
        if handle.generation != state.generation {
            return Err(ArenaError::Released {
                arena: self.id,
                handle_generation: handle.generation,
                generation: state.generation,
            });
        }

        state
            .slots
            .get(handle.slot)
            .cloned()
            .ok_or(ArenaError::SlotOutOfRange {
                arena: self.id,
                slot: handle.slot,
                len: state.slots.len(),
            })
    }

    /// Drop every item at once. Outstanding handles become invalid.
    pub fn release(&self) {
        let mut state = self.state.lock();
        info!(
            "Releasing arena {}: {} items, {} bytes",
            self.id,
            state.slots.len(),
            state.reserved
        );
        state.slots.clear();
        state.reserved = 0;
        state.generation += 1;
    }

    pub fn reserved_bytes(&self) -> usize {
        self.state.lock().reserved
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("generation", &state.generation)
            .field("reserved", &state.reserved)
            .field("items", &state.slots.len())
            .finish()
    }
}

impl<T> Drop for Arena<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.slots.is_empty() {
            debug!(
                "Dropping arena {} with {} live items ({} bytes)",
                self.id,
                state.slots.len(),
                state.reserved
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Block(Vec<u8>);

    impl Footprint for Block {
        fn footprint(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn insert_and_get() {
        let arena = Arena::new(64);
        let h = arena.insert(Block(vec![1, 2, 3])).unwrap();
        assert_eq!(arena.get(h).unwrap(), Block(vec![1, 2, 3]));
        assert_eq!(arena.reserved_bytes(), 3);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let arena = Arena::new(8);
        arena.insert(Block(vec![0; 6])).unwrap();
        let err = arena.insert(Block(vec![0; 3])).unwrap_err();
        assert!(matches!(
            err,
            ArenaError::CapacityExceeded {
                requested: 3,
                reserved: 6,
                capacity: 8,
                ..
            }
        ));
        // A failed insert reserves nothing.
        assert_eq!(arena.reserved_bytes(), 6);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn insert_all_is_all_or_nothing() {
        let arena = Arena::new(10);
        arena.insert(Block(vec![0; 2])).unwrap();

        let err = arena
            .insert_all(vec![Block(vec![0; 4]), Block(vec![0; 5])])
            .unwrap_err();
        assert!(matches!(err, ArenaError::CapacityExceeded { requested: 9, reserved: 2, .. }));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.reserved_bytes(), 2);
        assert!(arena.ensure_room(9).is_err());
        assert!(arena.ensure_room(8).is_ok());

        let handles = arena
            .insert_all(vec![Block(vec![1; 4]), Block(vec![2; 4])])
            .unwrap();
        assert_eq!(handles.iter().map(Handle::slot).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(arena.get(handles[1]).unwrap(), Block(vec![2; 4]));
        assert_eq!(arena.reserved_bytes(), 10);
    }

    #[test]
    fn release_invalidates_handles() {
        let arena = Arena::unbounded();
        let h = arena.insert(Block(vec![7; 4])).unwrap();
        arena.release();

        assert!(arena.is_empty());
        assert_eq!(arena.reserved_bytes(), 0);
        assert_eq!(arena.generation(), 1);
        assert!(matches!(arena.get(h), Err(ArenaError::Released { .. })));

        // Slot numbering restarts but the old handle stays dead.
        let h2 = arena.insert(Block(vec![1])).unwrap();
        assert_eq!(h2.slot(), h.slot());
        assert!(arena.get(h).is_err());
        assert!(arena.get(h2).is_ok());
    }

    #[test]
    fn foreign_handle_rejected() {
        let a = Arena::unbounded();
        let b: Arena<Block> = Arena::unbounded();
        let h = a.insert(Block(vec![1])).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(matches!(b.get(h), Err(ArenaError::ForeignHandle { .. })));
    }
}
