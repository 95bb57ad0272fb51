//! Pseudo-object layout.
//!
//! Every user-visible object is a `PseudoObject` stored in the pseudo-heap,
//! fully disjoint from host-runtime objects. Special behavior is keyed off a
//! class tag byte carried on the object, not off prototype identity; the
//! per-tag payload lives in `InternalSlots`.

use std::rc::Rc;

use crate::ast::Statement;
use crate::heap::ObjRef;
use crate::host::HostHandle;
use crate::prelude::IndexMap;
use crate::scheduler::ThreadId;
use crate::scope::ScopeId;
use crate::value::{JsString, Value};
use crate::weak::{IterableWeakMap, IterableWeakSet};

/// Object class tag. Decides internal-slot shape, snapshot record type, and
/// default prototype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassTag {
    Object,
    Function,
    Array,
    Date,
    RegExp,
    Error,
    Arguments,
    Map,
    Set,
    WeakMap,
    WeakSet,
    Thread,
    Box,
    Server,
    /// World-defined tag; serialized verbatim as the record type.
    User(JsString),
}

impl ClassTag {
    pub fn name(&self) -> &str {
        match self {
            ClassTag::Object => "Object",
            ClassTag::Function => "Function",
            ClassTag::Array => "Array",
            ClassTag::Date => "Date",
            ClassTag::RegExp => "RegExp",
            ClassTag::Error => "Error",
            ClassTag::Arguments => "Arguments",
            ClassTag::Map => "Map",
            ClassTag::Set => "Set",
            ClassTag::WeakMap => "IterableWeakMap",
            ClassTag::WeakSet => "IterableWeakSet",
            ClassTag::Thread => "Thread",
            ClassTag::Box => "Box",
            ClassTag::Server => "Server",
            ClassTag::User(tag) => tag.as_str(),
        }
    }
}

/// One property slot. Keys are always strings; numeric indices use their
/// decimal string form.
#[derive(Debug, Clone)]
pub struct PropertySlot {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertySlot {
    pub fn data(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Non-enumerable, non-configurable, writable: the shape of `length` and
    /// friends.
    pub fn hidden(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: false,
            configurable: false,
        }
    }

    pub fn with_attributes(
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
        }
    }
}

/// A user-defined function body plus its captured scope.
#[derive(Debug, Clone)]
pub struct InterpretedFunction {
    pub name: Option<JsString>,
    pub params: Rc<[String]>,
    pub body: Rc<[Statement]>,
    pub scope: ScopeId,
}

/// What a Function-class object executes.
#[derive(Debug, Clone)]
pub enum FunctionSlot {
    /// Host builtin, referenced across snapshots by its table id.
    Native { id: JsString },
    /// Source-defined closure.
    Interpreted(InterpretedFunction),
}

/// Per-class internal slots.
#[derive(Debug, Clone, Default)]
pub enum InternalSlots {
    #[default]
    None,
    Function(FunctionSlot),
    /// `length` is kept one above the largest present integer key, or
    /// whatever was explicitly written.
    Array {
        length: u32,
    },
    Date {
        /// Milliseconds since the Unix epoch.
        timestamp: f64,
    },
    RegExp {
        source: JsString,
        flags: JsString,
    },
    Map {
        entries: Vec<(Value, Value)>,
    },
    Set {
        entries: Vec<Value>,
    },
    WeakMap(IterableWeakMap),
    WeakSet(IterableWeakSet),
    Thread {
        thread: ThreadId,
    },
    /// Host socket/server back-slot. Never serialized; null after restore
    /// until the host reconnects it.
    Server {
        handle: Option<HostHandle>,
    },
}

/// A user-level object in the pseudo-heap.
#[derive(Debug, Clone)]
pub struct PseudoObject {
    pub proto: Option<ObjRef>,
    pub extensible: bool,
    pub class: ClassTag,
    pub properties: IndexMap<JsString, PropertySlot>,
    pub slots: InternalSlots,
}

impl Default for PseudoObject {
    fn default() -> Self {
        Self::new(ClassTag::Object, None)
    }
}

impl PseudoObject {
    pub fn new(class: ClassTag, proto: Option<ObjRef>) -> Self {
        Self {
            proto,
            extensible: true,
            class,
            properties: IndexMap::default(),
            slots: InternalSlots::None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.slots, InternalSlots::Function(_))
    }

    pub fn function_slot(&self) -> Option<&FunctionSlot> {
        match &self.slots {
            InternalSlots::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn get_own(&self, key: &str) -> Option<&PropertySlot> {
        self.properties.get(key)
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Ordinary `[[Set]]` on the object itself: honors `writable` on an
    /// existing slot and `extensible` for additions. Returns false when the
    /// write was rejected.
    pub fn set_property(&mut self, key: JsString, value: Value) -> bool {
        if let Some(slot) = self.properties.get_mut(key.as_str()) {
            if !slot.writable {
                return false;
            }
            slot.value = value;
            self.note_index_write(key.as_str());
            return true;
        }
        if !self.extensible {
            return false;
        }
        let key_str = key.as_str().to_string();
        self.properties.insert(key, PropertySlot::data(value));
        self.note_index_write(&key_str);
        true
    }

    /// `[[DefineOwnProperty]]` with explicit attributes; used by the decoder
    /// and by builtins. Bypasses the writable check but not extensibility for
    /// new keys.
    pub fn define_property(&mut self, key: JsString, slot: PropertySlot) -> bool {
        let exists = self.properties.contains_key(key.as_str());
        if !exists && !self.extensible {
            return false;
        }
        let key_str = key.as_str().to_string();
        self.properties.insert(key, slot);
        self.note_index_write(&key_str);
        true
    }

    /// Delete an own property. Non-configurable slots survive; returns true
    /// when the key is absent afterwards.
    pub fn delete_property(&mut self, key: &str) -> bool {
        match self.properties.get(key) {
            None => true,
            Some(slot) if !slot.configurable => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
        }
    }

    /// Own enumerable keys in insertion order.
    pub fn enumerable_keys(&self) -> Vec<JsString> {
        self.properties
            .iter()
            .filter(|(_, slot)| slot.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Current array length; 0 for non-arrays.
    pub fn array_length(&self) -> u32 {
        match self.slots {
            InternalSlots::Array { length } => length,
            _ => 0,
        }
    }

    /// Maintain the Array `length` invariant after a property write:
    /// an integer key at or past `length` grows it; an explicit write to
    /// `length` truncates trailing index properties.
    fn note_index_write(&mut self, key: &str) {
        let InternalSlots::Array { length } = &mut self.slots else {
            return;
        };
        if key == "length" {
            let wanted = self
                .properties
                .get("length")
                .map(|slot| slot.value.to_number_primitive())
                .unwrap_or(0.0);
            let new_len = if wanted.is_finite() && wanted >= 0.0 {
                wanted as u32
            } else {
                0
            };
            let old_len = *length;
            *length = new_len;
            if new_len < old_len {
                let doomed: Vec<JsString> = self
                    .properties
                    .keys()
                    .filter(|k| matches!(array_index(k.as_str()), Some(i) if i >= new_len))
                    .cloned()
                    .collect();
                for k in doomed {
                    self.properties.shift_remove(k.as_str());
                }
            }
            if let Some(slot) = self.properties.get_mut("length") {
                slot.value = Value::Number(new_len as f64);
            }
        } else if let Some(i) = array_index(key) {
            if i >= *length {
                *length = i + 1;
                if let Some(slot) = self.properties.get_mut("length") {
                    slot.value = Value::Number(*length as f64);
                }
            }
        }
    }
}

/// Parse a canonical array index: the decimal string form of a u32 below
/// 2^32-1, with no leading zeros.
pub fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    let i = key.parse::<u32>().ok()?;
    if i == u32::MAX {
        return None;
    }
    Some(i)
}
