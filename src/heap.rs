//! The pseudo-heap: an owning arena of pseudo-objects behind stable handles.
//!
//! Handles carry the allocation id, not the slot index; a reused slot gets a
//! fresh id, so a stale handle can never resurrect a new object. Reachability
//! is computed lazily (at sweeps and snapshots) by walking the real object
//! graph from the interpreter's roots; the heap itself only stores and
//! reclaims.

use crate::object::PseudoObject;
use crate::prelude::{FxHashMap, FxHashSet};
use crate::value::Value;

/// Opaque handle to a pseudo-object. Copyable; identity is the allocation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u64);

impl ObjRef {
    pub fn id(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a raw id. Only for internal tables that store
    /// ids (weak containers, the decoder); a dead id yields a handle that
    /// resolves to nothing.
    pub(crate) fn from_id(id: u64) -> ObjRef {
        ObjRef(id)
    }
}

struct Slot {
    id: u64,
    obj: Option<PseudoObject>,
}

/// Arena of pseudo-objects with pooled slots and id-keyed liveness.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<usize>,
    id_to_index: FxHashMap<u64, usize>,
    next_id: u64,
    live: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            id_to_index: FxHashMap::default(),
            next_id: 0,
            live: 0,
        }
    }

    pub fn alloc(&mut self, obj: PseudoObject) -> ObjRef {
        let id = self.next_id;
        self.next_id += 1;
        let index = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.id = id;
            slot.obj = Some(obj);
            index
        } else {
            self.slots.push(Slot { id, obj: Some(obj) });
            self.slots.len() - 1
        };
        self.id_to_index.insert(id, index);
        self.live += 1;
        ObjRef(id)
    }

    pub fn get(&self, r: ObjRef) -> Option<&PseudoObject> {
        let index = *self.id_to_index.get(&r.0)?;
        self.slots[index].obj.as_ref()
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut PseudoObject> {
        let index = *self.id_to_index.get(&r.0)?;
        self.slots[index].obj.as_mut()
    }

    /// Whether an allocation id still resolves. This is the liveness test the
    /// weak containers use.
    pub fn is_live(&self, id: u64) -> bool {
        self.id_to_index.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Reclaim every object whose id is not in `live`. Returns the number of
    /// objects swept.
    pub fn sweep(&mut self, live: &FxHashSet<u64>) -> usize {
        let mut swept = 0;
        for index in 0..self.slots.len() {
            let id = self.slots[index].id;
            if self.slots[index].obj.is_some() && !live.contains(&id) {
                self.slots[index].obj = None;
                self.id_to_index.remove(&id);
                self.free.push(index);
                self.live -= 1;
                swept += 1;
            }
        }
        if swept > 0 {
            log::debug!("heap sweep reclaimed {swept} objects, {} live", self.live);
        }
        swept
    }

    /// Walk the prototype chain for `key`, returning the first slot's value.
    pub fn get_property_value(&self, r: ObjRef, key: &str) -> Option<Value> {
        let mut current = Some(r);
        while let Some(obj_ref) = current {
            let obj = self.get(obj_ref)?;
            if let Some(slot) = obj.get_own(key) {
                return Some(slot.value.clone());
            }
            current = obj.proto;
        }
        None
    }

    /// Whether `key` is present anywhere on the prototype chain.
    pub fn has_property(&self, r: ObjRef, key: &str) -> bool {
        let mut current = Some(r);
        while let Some(obj_ref) = current {
            let Some(obj) = self.get(obj_ref) else {
                return false;
            };
            if obj.has_own(key) {
                return true;
            }
            current = obj.proto;
        }
        false
    }

    /// Whether `candidate` appears on `start`'s prototype chain (used to
    /// reject cycles before a prototype write).
    pub fn proto_chain_contains(&self, start: Option<ObjRef>, candidate: ObjRef) -> bool {
        let mut current = start;
        while let Some(obj_ref) = current {
            if obj_ref == candidate {
                return true;
            }
            current = self.get(obj_ref).and_then(|o| o.proto);
        }
        false
    }
}
