//! Thread table and slot lists
//!
//! Arena of thread records addressed by stable handles, plus doubly linked
//! lists threaded through slot indices. This replaces pointer-intrusive
//! list nodes with index links: O(1) tail insert, unlink and head peek,
//! no self-referential aliasing.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::sched::thread::{Thread, ThreadId};

/// Embedded list link: slot indices of the neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Link {
    pub const fn detached() -> Self {
        Self { prev: None, next: None }
    }
}

/// Which scheduling list a thread currently sits on.
///
/// A thread belongs to at most one list at a time; transitions detach it
/// from the tagged list before re-inserting anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTag {
    None,
    Ready(u8),
    Sleep,
    Delete,
}

/// Doubly linked list of arena slots
#[derive(Debug, Clone, Copy)]
pub struct SlotList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl SlotList {
    pub const EMPTY: SlotList = SlotList {
        head: None,
        tail: None,
        len: 0,
    };

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `slot` at the tail and tag the thread with `tag`.
    pub fn push_back(&mut self, table: &mut ThreadTable, slot: usize, tag: ListTag) {
        debug_assert_eq!(table.get(slot).tag, ListTag::None, "slot already listed");

        let old_tail = self.tail;
        {
            let thread = table.get_mut(slot);
            thread.link = Link { prev: old_tail, next: None };
            thread.tag = tag;
        }
        match old_tail {
            Some(t) => table.get_mut(t).link.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    /// Unlink `slot` from this list.
    pub fn remove(&mut self, table: &mut ThreadTable, slot: usize) {
        let link = table.get(slot).link;

        match link.prev {
            Some(p) => table.get_mut(p).link.next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => table.get_mut(n).link.prev = link.prev,
            None => self.tail = link.prev,
        }

        let thread = table.get_mut(slot);
        thread.link = Link::detached();
        thread.tag = ListTag::None;
        self.len -= 1;
    }
}

/// Arena slot: occupied or on the free list
struct Slot {
    thread: Option<Thread>,
}

/// Global thread registry: arena storage plus handle resolution.
pub struct ThreadTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
    index: HashMap<ThreadId, usize>,
    next_id: ThreadId,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Assign a handle to `thread` and store it, returning the handle and
    /// the arena slot.
    pub fn register(&mut self, mut thread: Thread) -> (ThreadId, usize) {
        let id = self.next_id;
        self.next_id += 1;
        thread.id = id;

        let slot = match self.free.pop() {
            Some(s) => {
                self.slots[s].thread = Some(thread);
                s
            }
            None => {
                self.slots.push(Slot { thread: Some(thread) });
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
        (id, slot)
    }

    /// Remove the handle mapping. The record stays in its slot until
    /// [`release`](Self::release) reclaims it.
    pub fn unregister(&mut self, slot: usize) {
        let id = self.get(slot).id;
        self.index.remove(&id);
    }

    /// Free the slot and hand the record back to the caller.
    pub fn release(&mut self, slot: usize) -> Thread {
        let thread = self.slots[slot].thread.take().expect("releasing a free slot");
        self.index.remove(&thread.id);
        self.free.push(slot);
        thread
    }

    pub fn slot_of(&self, id: ThreadId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, slot: usize) -> &Thread {
        self.slots[slot].thread.as_ref().expect("free slot")
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Thread {
        self.slots[slot].thread.as_mut().expect("free slot")
    }

    /// Simultaneous mutable access to two distinct slots, for the context
    /// switch source/target pair.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Thread, &mut Thread) {
        debug_assert_ne!(a, b);
        if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            (
                lo[a].thread.as_mut().expect("free slot"),
                hi[0].thread.as_mut().expect("free slot"),
            )
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            let (first, second) = (
                hi[0].thread.as_mut().expect("free slot"),
                lo[b].thread.as_mut().expect("free slot"),
            );
            (first, second)
        }
    }
}
