//! Native-function table.
//!
//! Every host-implemented callable is registered under a stable string id
//! before execution starts. Snapshots reference natives only by id, so
//! restoring requires an identically-seeded table; an unknown id at decode is
//! a missing-native error.

use crate::error::NativeError;
use crate::prelude::{FxHashMap, IndexMap};
use crate::value::{JsString, Value};

/// Native function signature: `(interpreter, this, args) -> value`.
pub type NativeFn =
    fn(&mut crate::interpreter::Interpreter, Value, &[Value]) -> Result<Value, NativeError>;

#[derive(Clone)]
pub struct NativeEntry {
    pub id: JsString,
    pub func: NativeFn,
    pub arity: usize,
}

impl std::fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEntry")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Registration table, id-keyed with a reverse index by function pointer.
/// Enumeration order is registration order.
#[derive(Debug, Default)]
pub struct NativeRegistry {
    by_id: IndexMap<JsString, NativeEntry>,
    by_fn: FxHashMap<usize, JsString>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin. Ids must be unique; re-registration of an id is a
    /// bootstrap bug and panics.
    pub fn register(&mut self, id: impl Into<JsString>, func: NativeFn, arity: usize) {
        let id = id.into();
        assert!(
            !self.by_id.contains_key(id.as_str()),
            "duplicate native id '{id}'"
        );
        self.by_fn.insert(func as usize, id.clone());
        self.by_id.insert(
            id.clone(),
            NativeEntry { id, func, arity },
        );
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&NativeEntry> {
        self.by_id.get(id)
    }

    pub fn id_of(&self, func: NativeFn) -> Option<&JsString> {
        self.by_fn.get(&(func as usize))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeEntry> {
        self.by_id.values()
    }
}
