//! Named object registry.
//!
//! A deterministic bidirectional table of `name <-> pseudo-object` used for
//! built-in singletons (`Object.prototype`, ...) and as the source of
//! human-meaningful references in snapshots. Iteration order is registration
//! order, which is fixed by the bootstrap sequence, so two interpreters built
//! the same way agree on it.

use crate::heap::ObjRef;
use crate::prelude::{FxHashMap, IndexMap};
use crate::value::JsString;

#[derive(Debug, Default)]
pub struct Registry {
    by_name: IndexMap<JsString, ObjRef>,
    by_ref: FxHashMap<ObjRef, JsString>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name -> obj`. Re-registering a name rebinds it; the old
    /// object loses its name.
    pub fn register(&mut self, name: impl Into<JsString>, obj: ObjRef) {
        let name = name.into();
        if let Some(old) = self.by_name.insert(name.clone(), obj) {
            self.by_ref.remove(&old);
        }
        self.by_ref.insert(obj, name);
    }

    pub fn lookup(&self, name: &str) -> Option<ObjRef> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, obj: ObjRef) -> Option<&JsString> {
        self.by_ref.get(&obj)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&JsString, ObjRef)> {
        self.by_name.iter().map(|(k, v)| (k, *v))
    }
}
