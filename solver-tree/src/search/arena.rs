//! Slot arena holding the nodes of the tree.
//!
//! Nodes are created and destroyed at a high rate during search. Slots are
//! recycled through a free list, so allocation is O(1) amortized and the
//! backing storage only grows in bulk. A [`NodeId`] carries the generation
//! of its slot: a handle to a freed node never resolves to the slot's next
//! occupant.

use std::fmt;

use crate::error::TreeResult;

/// Stable handle to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot position.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot arena.
pub(crate) struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> NodeArena<T> {
    /// Create an arena with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> TreeResult<Self> {
        let mut slots = Vec::new();
        slots.try_reserve(capacity)?;
        let mut free = Vec::new();
        free.try_reserve(capacity)?;
        Ok(Self {
            slots,
            free,
            live: 0,
        })
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> TreeResult<NodeId> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.live += 1;
            return Ok(NodeId {
                index,
                generation: slot.generation,
            });
        }
        // Growing `slots` here keeps the free list able to take every slot back
        self.slots.try_reserve(1)?;
        self.free.try_reserve(self.slots.len() + 1 - self.free.len())?;
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.live += 1;
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    /// Take the value out; the handle becomes stale.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Every live node.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| {
                (
                    NodeId {
                        index: i as u32,
                        generation,
                    },
                    v,
                )
            })
        })
    }

    /// Free every node at once. Outstanding handles all become stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
    }
}
