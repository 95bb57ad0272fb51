//! Iterable weak containers.
//!
//! Entries are keyed by heap allocation id and never extend object lifetime:
//! the reachability walk does not traverse weak keys, so a key only alive
//! inside a weak container is swept like any other garbage. A dead entry is
//! physically dropped the next time `size`, `has`, `get`, or iteration
//! observes it; until then it is merely invisible.

use crate::heap::{Heap, ObjRef};
use crate::value::Value;

/// Weak-keyed map with insertion-order iteration over live entries.
#[derive(Debug, Clone, Default)]
pub struct IterableWeakMap {
    entries: Vec<(u64, Value)>,
}

impl IterableWeakMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn compact(&mut self, heap: &Heap) {
        self.entries.retain(|(id, _)| heap.is_live(*id));
    }

    pub fn set(&mut self, heap: &Heap, key: ObjRef, value: Value) {
        self.compact(heap);
        for (id, slot) in &mut self.entries {
            if *id == key.id() {
                *slot = value;
                return;
            }
        }
        self.entries.push((key.id(), value));
    }

    pub fn get(&mut self, heap: &Heap, key: ObjRef) -> Option<Value> {
        self.compact(heap);
        self.entries
            .iter()
            .find(|(id, _)| *id == key.id())
            .map(|(_, v)| v.clone())
    }

    pub fn has(&mut self, heap: &Heap, key: ObjRef) -> bool {
        self.compact(heap);
        self.entries.iter().any(|(id, _)| *id == key.id())
    }

    pub fn delete(&mut self, heap: &Heap, key: ObjRef) -> bool {
        self.compact(heap);
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != key.id());
        self.entries.len() != before
    }

    /// Number of currently-live entries.
    pub fn size(&mut self, heap: &Heap) -> usize {
        self.compact(heap);
        self.entries.len()
    }

    /// Live entries in insertion order.
    pub fn entries(&mut self, heap: &Heap) -> Vec<(ObjRef, Value)> {
        self.compact(heap);
        self.entries
            .iter()
            .map(|(id, v)| (ObjRef::from_id(*id), v.clone()))
            .collect()
    }

    /// Raw entries, live or not; the snapshot encoder filters dead ids
    /// itself so that encoding is not an observation.
    pub fn raw_entries(&self) -> &[(u64, Value)] {
        &self.entries
    }

    /// Replace raw entries wholesale (snapshot decode).
    pub(crate) fn restore_entries(&mut self, entries: Vec<(u64, Value)>) {
        self.entries = entries;
    }
}

/// Weak set with insertion-order iteration over live members.
#[derive(Debug, Clone, Default)]
pub struct IterableWeakSet {
    members: Vec<u64>,
}

impl IterableWeakSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn compact(&mut self, heap: &Heap) {
        self.members.retain(|id| heap.is_live(*id));
    }

    pub fn add(&mut self, heap: &Heap, member: ObjRef) {
        self.compact(heap);
        if !self.members.contains(&member.id()) {
            self.members.push(member.id());
        }
    }

    pub fn has(&mut self, heap: &Heap, member: ObjRef) -> bool {
        self.compact(heap);
        self.members.contains(&member.id())
    }

    pub fn delete(&mut self, heap: &Heap, member: ObjRef) -> bool {
        self.compact(heap);
        let before = self.members.len();
        self.members.retain(|id| *id != member.id());
        self.members.len() != before
    }

    pub fn size(&mut self, heap: &Heap) -> usize {
        self.compact(heap);
        self.members.len()
    }

    /// Live members in insertion order.
    pub fn members(&mut self, heap: &Heap) -> Vec<ObjRef> {
        self.compact(heap);
        self.members.iter().map(|id| ObjRef::from_id(*id)).collect()
    }

    pub fn raw_members(&self) -> &[u64] {
        &self.members
    }

    pub(crate) fn restore_members(&mut self, members: Vec<u64>) {
        self.members = members;
    }
}
