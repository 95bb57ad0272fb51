//! The interpreter root.
//!
//! Owns the pseudo-heap, scope arena, registry, native table, and scheduler,
//! and exposes the host boundary: load programs, spawn and kill threads,
//! step/run, snapshot and restore. Construction seeds the global environment
//! and built-in singletons; a snapshot can only be restored into an
//! interpreter seeded the same way.

pub mod builtins;
pub mod lvalue;
pub mod step;

use std::rc::Rc;

use crate::ast::{BinaryOp, FunctionDeclaration, FunctionExpression, Program};
use crate::error::{ErrorKind, NativeError};
use crate::heap::{Heap, ObjRef};
use crate::host::{Clock, IoEvent};
use crate::object::{
    ClassTag, FunctionSlot, InternalSlots, InterpretedFunction, PropertySlot, PseudoObject,
};
use crate::natives::NativeRegistry;
use crate::prelude::FxHashSet;
use crate::registry::Registry;
use crate::scheduler::{Scheduler, ThreadId, ThreadStatus};
use crate::scope::{self, ScopeArena, ScopeId};
use crate::value::{CheapClone, JsString, Value};

use self::step::{
    to_int32, to_uint32, Abrupt, CallDispatch, FrameKind, StateFrame, StepSignal, Suspension,
};

/// Interpreter tuning knobs.
pub struct InterpreterConfig {
    /// Steps a thread may take per scheduler slice.
    pub step_budget: usize,
    /// Heap allocations between automatic collections; 0 disables them.
    pub gc_threshold: usize,
    /// Assigning a name no scope declares throws `ReferenceError` (strict
    /// style). Turning this off creates the binding on the global scope.
    pub set_unresolved_is_error: bool,
    /// Frame-stack ceiling per thread.
    pub max_stack_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            step_budget: 1000,
            gc_threshold: 4096,
            set_unresolved_is_error: true,
            max_stack_depth: 4096,
        }
    }
}

/// Hint for ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    Default,
    Number,
    String,
}

/// The interpreter. See the crate docs for the execution and snapshot model.
pub struct Interpreter {
    pub heap: Heap,
    pub scopes: ScopeArena,
    pub registry: Registry,
    pub natives: NativeRegistry,
    pub scheduler: Scheduler,
    pub config: InterpreterConfig,
    pub(crate) clock: Box<dyn Clock>,
    /// Set by natives that want the current thread parked after this step.
    pub(crate) pending_suspension: Option<Suspension>,
    /// Thread currently being stepped (valid only inside a tick).
    pub(crate) current_thread: Option<ThreadId>,
    /// Uncaught user errors, for the host to drain.
    pub(crate) uncaught: Vec<(ThreadId, Value)>,
    /// Boot-time function object per native id. Snapshot decode resolves
    /// `Function` records with an `id` back to these, preserving identity.
    pub(crate) native_objects: crate::prelude::FxHashMap<JsString, ObjRef>,
    /// World-defined class tags the decoder should accept.
    pub(crate) user_tags: crate::prelude::FxHashSet<JsString>,
    allocs_since_sweep: usize,
}

impl Interpreter {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_config(clock, InterpreterConfig::default())
    }

    pub fn with_config(clock: Box<dyn Clock>, config: InterpreterConfig) -> Self {
        let mut interp = Self {
            heap: Heap::new(),
            scopes: ScopeArena::new(),
            registry: Registry::new(),
            natives: NativeRegistry::new(),
            scheduler: Scheduler::new(),
            config,
            clock,
            pending_suspension: None,
            current_thread: None,
            uncaught: Vec::new(),
            native_objects: crate::prelude::FxHashMap::default(),
            user_tags: crate::prelude::FxHashSet::default(),
            allocs_since_sweep: 0,
        };
        builtins::install(&mut interp);
        interp
    }

    // ── host boundary ───────────────────────────────────────────────────

    /// Hoist a program into the global scope and spawn a thread for it.
    pub fn load_program(&mut self, program: &Program) -> ThreadId {
        scope::hoist(&mut self.scopes, ScopeId::GLOBAL, &program.body);
        for decl in scope::collect_functions(&program.body) {
            let obj = self.create_closure_from_decl(&decl, ScopeId::GLOBAL);
            self.scopes
                .declare_with(ScopeId::GLOBAL, decl.id.as_str(), Value::Object(obj));
        }
        let root = StateFrame::new(
            ScopeId::GLOBAL,
            FrameKind::Block {
                body: program.body.cheap_clone(),
                index: 0,
            },
        );
        self.scheduler.add_thread(vec![root])
    }

    /// Spawn a thread that calls `func` with the given arguments.
    pub fn spawn_call(&mut self, func: Value, args: Vec<Value>) -> Result<ThreadId, NativeError> {
        match self.dispatch_call(&func, Value::Undefined, args)? {
            CallDispatch::Frame(frame) => Ok(self.scheduler.add_thread(vec![frame])),
            CallDispatch::Value(_) => {
                // A native ran to completion on the spot; the thread is born
                // finished.
                let id = self.scheduler.add_thread(Vec::new());
                if let Some(t) = self.scheduler.get_mut(id) {
                    t.status = ThreadStatus::Done;
                }
                Ok(id)
            }
        }
    }

    /// Request a kill; honored at the thread's next scheduling point, without
    /// running its finally blocks.
    pub fn kill(&mut self, id: ThreadId) {
        self.scheduler.kill(id);
    }

    /// Report host I/O readiness, unblocking waiting threads.
    pub fn io_ready(&mut self, event: IoEvent) {
        self.scheduler.io_ready(event.handle);
    }

    /// Advance the world by exactly one step of the next runnable thread.
    /// Returns false when nothing was runnable.
    pub fn step(&mut self) -> bool {
        self.run_slice(1) > 0
    }

    /// One scheduler tick: wake expired sleepers, then give the next runnable
    /// thread up to `step_budget` steps. Returns steps executed.
    pub fn tick(&mut self) -> usize {
        self.run_slice(self.config.step_budget)
    }

    /// Run ticks until `budget` steps have executed or nothing is runnable.
    /// Returns steps executed.
    pub fn run(&mut self, budget: usize) -> usize {
        let mut done = 0;
        while done < budget {
            let n = self.run_slice(self.config.step_budget.min(budget - done));
            if n == 0 {
                break;
            }
            done += n;
        }
        done
    }

    /// Completion value of the most recently finished or stepped thread's
    /// last expression statement.
    pub fn thread_result(&self, id: ThreadId) -> Option<Value> {
        self.scheduler.get(id).map(|t| t.result.clone())
    }

    /// Drain uncaught user errors.
    pub fn take_uncaught(&mut self) -> Vec<(ThreadId, Value)> {
        std::mem::take(&mut self.uncaught)
    }

    /// Current monotonic time, per the host clock.
    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Declare a world-defined class tag so snapshots carrying it decode.
    /// Must run before `restore`, like native registration.
    pub fn register_class_tag(&mut self, tag: impl Into<JsString>) {
        self.user_tags.insert(tag.into());
    }

    /// Register a host built-in under a stable id and hand back its function
    /// object. Must happen before any snapshot of a world using it is
    /// restored; ids are how snapshots reference natives.
    pub fn register_native(
        &mut self,
        id: &str,
        func: crate::natives::NativeFn,
        arity: usize,
    ) -> ObjRef {
        self.natives.register(id, func, arity);
        self.create_native_function(id)
    }

    /// Bind a global-scope variable from the host.
    pub fn bind_global(&mut self, name: &str, value: Value) {
        self.scopes.declare_with(ScopeId::GLOBAL, name, value);
    }

    /// Park the current thread until the host reports `handle` ready. For
    /// use inside host natives (socket reads and the like).
    pub fn block_current_thread(&mut self, handle: crate::host::HostHandle) {
        self.request_block(handle);
    }

    /// Encode the complete live state into a snapshot record array.
    pub fn snapshot(&self) -> Vec<serde_json::Value> {
        crate::snapshot::snapshot(self)
    }

    /// Rehydrate a snapshot into this freshly-seeded interpreter. On error
    /// the observable state is unchanged.
    pub fn restore(
        &mut self,
        records: &[serde_json::Value],
    ) -> Result<(), crate::error::DecodeError> {
        crate::snapshot::restore(self, records)
    }

    /// Build a `Server`-class pseudo-object wrapping a host socket handle.
    /// The handle slot is never serialized; after a restore it is null until
    /// the host reconnects it.
    pub fn create_server_object(&mut self, handle: crate::host::HostHandle) -> ObjRef {
        let proto = self.proto_for("Object.prototype");
        let mut obj = PseudoObject::new(ClassTag::Server, proto);
        obj.slots = InternalSlots::Server {
            handle: Some(handle),
        };
        self.alloc(obj)
    }

    fn run_slice(&mut self, budget: usize) -> usize {
        self.scheduler.wake_sleepers(self.clock.now_ms());
        self.maybe_collect();
        let mut thread = loop {
            let Some(thread) = self.scheduler.take_next_runnable() else {
                return 0;
            };
            if thread.killed {
                // Kill cleanup is the thread's whole tick: the state tree is
                // dropped without running finally blocks.
                log::warn!("thread {} killed; discarding state tree", thread.id.0);
                self.scheduler.finish(thread);
                continue;
            }
            break thread;
        };
        self.current_thread = Some(thread.id);
        let mut steps = 0;
        let mut outcome = None;
        while steps < budget {
            match self.step_thread(&mut thread) {
                StepSignal::Continue => steps += 1,
                StepSignal::Done => {
                    steps += 1;
                    outcome = Some(None);
                    break;
                }
                StepSignal::Suspend(s) => {
                    steps += 1;
                    outcome = Some(Some(s));
                    break;
                }
            }
        }
        self.current_thread = None;
        match outcome {
            Some(None) => self.scheduler.finish(thread),
            Some(Some(Suspension::SleepUntil(at))) => self.scheduler.park_sleeping(thread, at),
            Some(Some(Suspension::Block(handle))) => self.scheduler.park_blocked(thread, handle),
            Some(Some(Suspension::Yield)) | None => self.scheduler.requeue(thread),
        }
        steps
    }

    // ── natives' scheduling requests ────────────────────────────────────

    pub(crate) fn request_sleep(&mut self, ms: f64) {
        let at = self.clock.now_ms() + ms.max(0.0);
        self.pending_suspension = Some(Suspension::SleepUntil(at));
    }

    pub(crate) fn request_yield(&mut self) {
        self.pending_suspension = Some(Suspension::Yield);
    }

    pub(crate) fn request_block(&mut self, handle: crate::host::HostHandle) {
        self.pending_suspension = Some(Suspension::Block(handle));
    }

    // ── object construction ─────────────────────────────────────────────

    pub(crate) fn alloc(&mut self, obj: PseudoObject) -> ObjRef {
        self.allocs_since_sweep += 1;
        self.heap.alloc(obj)
    }

    pub(crate) fn proto_for(&self, name: &str) -> Option<ObjRef> {
        self.registry.lookup(name)
    }

    pub fn create_plain_object(&mut self) -> ObjRef {
        let proto = self.proto_for("Object.prototype");
        self.alloc(PseudoObject::new(ClassTag::Object, proto))
    }

    pub fn create_array_object(&mut self) -> ObjRef {
        let proto = self.proto_for("Array.prototype");
        let mut obj = PseudoObject::new(ClassTag::Array, proto);
        obj.slots = InternalSlots::Array { length: 0 };
        obj.define_property(
            JsString::from("length"),
            PropertySlot::hidden(Value::Number(0.0)),
        );
        self.alloc(obj)
    }

    pub fn create_array_from(&mut self, elements: Vec<Value>) -> ObjRef {
        let arr = self.create_array_object();
        for (i, v) in elements.into_iter().enumerate() {
            if let Some(obj) = self.heap.get_mut(arr) {
                obj.set_property(JsString::from(i.to_string()), v);
            }
        }
        arr
    }

    pub fn create_regexp(&mut self, source: &str, flags: &str) -> ObjRef {
        let proto = self.proto_for("RegExp.prototype");
        let mut obj = PseudoObject::new(ClassTag::RegExp, proto);
        obj.slots = InternalSlots::RegExp {
            source: JsString::from(source),
            flags: JsString::from(flags),
        };
        self.alloc(obj)
    }

    pub fn create_date(&mut self, timestamp: f64) -> ObjRef {
        let proto = self.proto_for("Date.prototype");
        let mut obj = PseudoObject::new(ClassTag::Date, proto);
        obj.slots = InternalSlots::Date { timestamp };
        self.alloc(obj)
    }

    /// A function object around an interpreted or native slot, with the
    /// `prototype`/`constructor` pair user code expects on constructables.
    pub(crate) fn create_function_object(&mut self, slot: FunctionSlot, arity: usize) -> ObjRef {
        let fn_proto = self.proto_for("Function.prototype");
        let mut obj = PseudoObject::new(ClassTag::Function, fn_proto);
        obj.slots = InternalSlots::Function(slot);
        obj.define_property(
            JsString::from("length"),
            PropertySlot::with_attributes(Value::Number(arity as f64), false, false, true),
        );
        let func = self.alloc(obj);

        let proto = self.create_plain_object();
        if let Some(p) = self.heap.get_mut(proto) {
            p.define_property(
                JsString::from("constructor"),
                PropertySlot::hidden(Value::Object(func)),
            );
        }
        if let Some(f) = self.heap.get_mut(func) {
            f.define_property(
                JsString::from("prototype"),
                PropertySlot::hidden(Value::Object(proto)),
            );
        }
        func
    }

    /// A function object for a registered native id. Bootstrap-time only;
    /// the id must exist.
    pub(crate) fn create_native_function(&mut self, id: &str) -> ObjRef {
        let arity = self
            .natives
            .lookup_by_id(id)
            .map(|e| e.arity)
            .unwrap_or_else(|| panic!("native '{id}' not registered"));
        let obj = self.create_function_object(
            FunctionSlot::Native {
                id: JsString::from(id),
            },
            arity,
        );
        self.native_objects.insert(JsString::from(id), obj);
        obj
    }

    /// The boot function object for a native id.
    pub(crate) fn native_object(&self, id: &str) -> Option<ObjRef> {
        self.native_objects.get(id).copied()
    }

    pub(crate) fn create_closure_from_expr(
        &mut self,
        func: &Rc<FunctionExpression>,
        scope: ScopeId,
    ) -> ObjRef {
        // A named function expression sees its own name inside the body.
        let capture = match &func.id {
            Some(_) => self.scopes.alloc(Some(scope)),
            None => scope,
        };
        let obj = self.create_function_object(
            FunctionSlot::Interpreted(InterpretedFunction {
                name: func.id.as_deref().map(JsString::from),
                params: func.params.cheap_clone(),
                body: func.body.body.cheap_clone(),
                scope: capture,
            }),
            func.params.len(),
        );
        if let Some(name) = &func.id {
            self.scopes
                .declare_with(capture, name.as_str(), Value::Object(obj));
        }
        obj
    }

    pub(crate) fn create_closure_from_decl(
        &mut self,
        func: &FunctionDeclaration,
        scope: ScopeId,
    ) -> ObjRef {
        self.create_function_object(
            FunctionSlot::Interpreted(InterpretedFunction {
                name: Some(JsString::from(func.id.as_str())),
                params: func.params.cheap_clone(),
                body: func.body.body.cheap_clone(),
                scope,
            }),
            func.params.len(),
        )
    }

    fn create_arguments_object(&mut self, args: &[Value]) -> ObjRef {
        let proto = self.proto_for("Object.prototype");
        let mut obj = PseudoObject::new(ClassTag::Arguments, proto);
        for (i, v) in args.iter().enumerate() {
            obj.define_property(
                JsString::from(i.to_string()),
                PropertySlot::data(v.clone()),
            );
        }
        obj.define_property(
            JsString::from("length"),
            PropertySlot::hidden(Value::Number(args.len() as f64)),
        );
        self.alloc(obj)
    }

    /// Build a user `Error` pseudo-object of the given class.
    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self
            .proto_for(&format!("{}.prototype", kind.name()))
            .or_else(|| self.proto_for("Error.prototype"));
        let mut obj = PseudoObject::new(ClassTag::Error, proto);
        obj.set_property(JsString::from("name"), Value::from(kind.name()));
        obj.set_property(JsString::from("message"), Value::from(message));
        Value::Object(self.alloc(obj))
    }

    /// Turn a native-side error into the user value the throw completion
    /// carries.
    pub(crate) fn reify_error(&mut self, err: NativeError) -> Value {
        match err {
            NativeError::Raise { kind, message } => self.create_error(kind, &message),
            NativeError::Thrown(v) => v,
        }
    }

    // ── property access across value kinds ──────────────────────────────

    pub(crate) fn get_member(&mut self, base: &Value, key: &str) -> Result<Value, NativeError> {
        match base {
            Value::Object(r) => Ok(self.heap.get_property_value(*r, key).unwrap_or_default()),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.as_str().chars().count() as f64));
                }
                if let Ok(i) = key.parse::<usize>() {
                    if let Some(c) = s.as_str().chars().nth(i) {
                        return Ok(Value::from(c.to_string()));
                    }
                }
                Ok(Value::Undefined)
            }
            Value::Number(_) | Value::Boolean(_) => Ok(Value::Undefined),
            Value::Null | Value::Undefined => Err(NativeError::type_error(format!(
                "cannot read property '{key}' of {}",
                base.to_string_primitive()
            ))),
        }
    }

    pub(crate) fn set_member(
        &mut self,
        base: &Value,
        key: &str,
        value: Value,
    ) -> Result<(), NativeError> {
        match base {
            Value::Object(r) => {
                if let Some(obj) = self.heap.get_mut(*r) {
                    // Rejected writes (non-writable, non-extensible) are
                    // silent, matching sloppy-mode assignment.
                    obj.set_property(JsString::from(key), value);
                }
                Ok(())
            }
            Value::Null | Value::Undefined => Err(NativeError::type_error(format!(
                "cannot set property '{key}' of {}",
                base.to_string_primitive()
            ))),
            _ => Ok(()),
        }
    }

    /// Set an object's prototype, rejecting chain cycles.
    pub fn set_prototype(
        &mut self,
        obj: ObjRef,
        proto: Option<ObjRef>,
    ) -> Result<(), NativeError> {
        if let Some(p) = proto {
            if self.heap.proto_chain_contains(Some(p), obj) {
                return Err(NativeError::type_error(
                    "cyclic prototype chain rejected",
                ));
            }
        }
        if let Some(o) = self.heap.get_mut(obj) {
            o.proto = proto;
        }
        Ok(())
    }

    /// Own-then-chain enumerable keys, shadowed names skipped.
    pub(crate) fn enumerable_chain_keys(&self, r: ObjRef) -> Vec<JsString> {
        let mut keys = Vec::new();
        let mut seen: FxHashSet<JsString> = FxHashSet::default();
        let mut current = Some(r);
        while let Some(obj_ref) = current {
            let Some(obj) = self.heap.get(obj_ref) else { break };
            for (key, slot) in obj.properties.iter() {
                if seen.insert(key.clone()) && slot.enumerable {
                    keys.push(key.clone());
                }
            }
            current = obj.proto;
        }
        keys
    }

    // ── calls ───────────────────────────────────────────────────────────

    pub(crate) fn dispatch_call(
        &mut self,
        func: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<CallDispatch, NativeError> {
        let Value::Object(r) = func else {
            return Err(NativeError::type_error(format!(
                "{} is not a function",
                self.to_string(func)
            )));
        };
        let slot = self
            .heap
            .get(*r)
            .and_then(|o| o.function_slot().cloned())
            .ok_or_else(|| {
                NativeError::type_error(format!("{} is not a function", self.to_string(func)))
            })?;
        match slot {
            FunctionSlot::Native { id } => {
                let entry = self.natives.lookup_by_id(id.as_str()).ok_or_else(|| {
                    NativeError::type_error(format!("native function '{id}' is not registered"))
                })?;
                let f = entry.func;
                let v = f(self, this, &args)?;
                Ok(CallDispatch::Value(v))
            }
            FunctionSlot::Interpreted(f) => {
                let call_scope = self.prepare_call_scope(&f, this, &args);
                Ok(CallDispatch::Frame(StateFrame::new(
                    call_scope,
                    FrameKind::CallBody {
                        body: f.body.cheap_clone(),
                        index: 0,
                    },
                )))
            }
        }
    }

    fn prepare_call_scope(
        &mut self,
        f: &InterpretedFunction,
        this: Value,
        args: &[Value],
    ) -> ScopeId {
        let call_scope = self.scopes.alloc(Some(f.scope));
        for (i, param) in f.params.iter().enumerate() {
            let v = args.get(i).cloned().unwrap_or(Value::Undefined);
            self.scopes.declare_with(call_scope, param.as_str(), v);
        }
        self.scopes.declare_with(call_scope, "this", this);
        let arguments = self.create_arguments_object(args);
        self.scopes
            .declare_with(call_scope, "arguments", Value::Object(arguments));
        scope::hoist(&mut self.scopes, call_scope, &f.body);
        for decl in scope::collect_functions(&f.body) {
            let obj = self.create_closure_from_decl(&decl, call_scope);
            self.scopes
                .declare_with(call_scope, decl.id.as_str(), Value::Object(obj));
        }
        call_scope
    }

    /// The fresh `this` for `new F(...)`: prototype from `F.prototype` when
    /// that is an object, `Object.prototype` otherwise.
    pub(crate) fn construct_this(&mut self, func: &Value) -> Result<ObjRef, NativeError> {
        let Value::Object(r) = func else {
            return Err(NativeError::type_error(format!(
                "{} is not a constructor",
                self.to_string(func)
            )));
        };
        if self.heap.get(*r).map(|o| o.is_callable()) != Some(true) {
            return Err(NativeError::type_error(format!(
                "{} is not a constructor",
                self.to_string(func)
            )));
        }
        let proto = match self.heap.get_property_value(*r, "prototype") {
            Some(Value::Object(p)) => Some(p),
            _ => self.proto_for("Object.prototype"),
        };
        Ok(self.alloc(PseudoObject::new(ClassTag::Object, proto)))
    }

    // ── coercions & operators (C1) ──────────────────────────────────────

    pub fn type_of(&self, v: &Value) -> &'static str {
        match v {
            Value::Undefined => "undefined",
            Value::Null => "object", // historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(r) => {
                if self.heap.get(*r).map(|o| o.is_callable()).unwrap_or(false) {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    pub fn to_primitive(&self, v: &Value, hint: PrimitiveHint) -> Value {
        let Value::Object(r) = v else {
            return v.clone();
        };
        if hint == PrimitiveHint::Number {
            if let Some(obj) = self.heap.get(*r) {
                if let InternalSlots::Date { timestamp } = obj.slots {
                    return Value::Number(timestamp);
                }
            }
        }
        Value::String(JsString::from(self.object_to_string(*r, 0)))
    }

    pub fn to_number(&self, v: &Value) -> f64 {
        self.to_primitive(v, PrimitiveHint::Number)
            .to_number_primitive()
    }

    pub fn to_string(&self, v: &Value) -> JsString {
        match v {
            Value::Object(r) => JsString::from(self.object_to_string(*r, 0)),
            other => other.to_string_primitive(),
        }
    }

    fn object_to_string(&self, r: ObjRef, depth: usize) -> String {
        let Some(obj) = self.heap.get(r) else {
            return "[object Object]".to_string();
        };
        match (&obj.class, &obj.slots) {
            (ClassTag::Array, _) => {
                if depth > 8 {
                    return String::new();
                }
                let len = obj.array_length();
                let mut parts = Vec::with_capacity(len as usize);
                for i in 0..len {
                    let v = self
                        .heap
                        .get_property_value(r, &i.to_string())
                        .unwrap_or_default();
                    let s = match &v {
                        Value::Undefined | Value::Null => String::new(),
                        Value::Object(inner) => self.object_to_string(*inner, depth + 1),
                        other => other.to_string_primitive().as_str().to_string(),
                    };
                    parts.push(s);
                }
                parts.join(",")
            }
            (_, InternalSlots::Date { timestamp }) => crate::snapshot::format_date(*timestamp),
            (_, InternalSlots::RegExp { source, flags }) => format!("/{source}/{flags}"),
            (_, InternalSlots::Function(slot)) => {
                let name = match slot {
                    FunctionSlot::Native { id } => id.as_str().to_string(),
                    FunctionSlot::Interpreted(f) => f
                        .name
                        .as_ref()
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default(),
                };
                format!("function {name}() {{ ... }}")
            }
            (ClassTag::Error, _) => {
                let name = self
                    .heap
                    .get_property_value(r, "name")
                    .map(|v| self.to_string(&v).as_str().to_string())
                    .unwrap_or_else(|| "Error".to_string());
                let message = self
                    .heap
                    .get_property_value(r, "message")
                    .map(|v| self.to_string(&v).as_str().to_string())
                    .unwrap_or_default();
                if message.is_empty() {
                    name
                } else {
                    format!("{name}: {message}")
                }
            }
            _ => "[object Object]".to_string(),
        }
    }

    /// The ES5 loose-equality table.
    pub fn loose_equals(&self, a: &Value, b: &Value) -> bool {
        use Value::*;
        match (a, b) {
            (Undefined | Null, Undefined | Null) => true,
            (Number(_), Number(_))
            | (String(_), String(_))
            | (Boolean(_), Boolean(_))
            | (Object(_), Object(_)) => a.strict_equals(b),
            (Number(x), String(s)) => !x.is_nan() && *x == Value::String(s.clone()).to_number_primitive(),
            (String(s), Number(x)) => !x.is_nan() && *x == Value::String(s.clone()).to_number_primitive(),
            (Boolean(x), _) => self.loose_equals(&Number(if *x { 1.0 } else { 0.0 }), b),
            (_, Boolean(x)) => self.loose_equals(a, &Number(if *x { 1.0 } else { 0.0 })),
            (Number(_) | String(_), Object(_)) => {
                self.loose_equals(a, &self.to_primitive(b, PrimitiveHint::Default))
            }
            (Object(_), Number(_) | String(_)) => {
                self.loose_equals(&self.to_primitive(a, PrimitiveHint::Default), b)
            }
            _ => false,
        }
    }

    pub(crate) fn binary_op(
        &mut self,
        op: BinaryOp,
        a: &Value,
        b: &Value,
    ) -> Result<Value, NativeError> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let pa = self.to_primitive(a, PrimitiveHint::Default);
                let pb = self.to_primitive(b, PrimitiveHint::Default);
                if pa.is_string() || pb.is_string() {
                    let mut s = pa.to_string_primitive().as_str().to_string();
                    s.push_str(pb.to_string_primitive().as_str());
                    Value::from(s)
                } else {
                    Value::Number(pa.to_number_primitive() + pb.to_number_primitive())
                }
            }
            Sub => Value::Number(self.to_number(a) - self.to_number(b)),
            Mul => Value::Number(self.to_number(a) * self.to_number(b)),
            Div => Value::Number(self.to_number(a) / self.to_number(b)),
            Mod => Value::Number(self.to_number(a) % self.to_number(b)),
            Equal => Value::Boolean(self.loose_equals(a, b)),
            NotEqual => Value::Boolean(!self.loose_equals(a, b)),
            StrictEqual => Value::Boolean(a.strict_equals(b)),
            StrictNotEqual => Value::Boolean(!a.strict_equals(b)),
            Less | LessEqual | Greater | GreaterEqual => {
                let pa = self.to_primitive(a, PrimitiveHint::Number);
                let pb = self.to_primitive(b, PrimitiveHint::Number);
                match (&pa, &pb) {
                    (Value::String(x), Value::String(y)) => {
                        let (x, y) = (x.as_str(), y.as_str());
                        Value::Boolean(match op {
                            Less => x < y,
                            LessEqual => x <= y,
                            Greater => x > y,
                            _ => x >= y,
                        })
                    }
                    _ => {
                        let (x, y) = (pa.to_number_primitive(), pb.to_number_primitive());
                        if x.is_nan() || y.is_nan() {
                            Value::Boolean(false)
                        } else {
                            Value::Boolean(match op {
                                Less => x < y,
                                LessEqual => x <= y,
                                Greater => x > y,
                                _ => x >= y,
                            })
                        }
                    }
                }
            }
            BitAnd => Value::Number((to_int32(self.to_number(a)) & to_int32(self.to_number(b))) as f64),
            BitOr => Value::Number((to_int32(self.to_number(a)) | to_int32(self.to_number(b))) as f64),
            BitXor => Value::Number((to_int32(self.to_number(a)) ^ to_int32(self.to_number(b))) as f64),
            ShiftLeft => {
                let shift = to_uint32(self.to_number(b)) & 31;
                Value::Number((to_int32(self.to_number(a)) << shift) as f64)
            }
            ShiftRight => {
                let shift = to_uint32(self.to_number(b)) & 31;
                Value::Number((to_int32(self.to_number(a)) >> shift) as f64)
            }
            ShiftRightUnsigned => {
                let shift = to_uint32(self.to_number(b)) & 31;
                Value::Number((to_uint32(self.to_number(a)) >> shift) as f64)
            }
            In => {
                let Value::Object(r) = b else {
                    return Err(NativeError::type_error(
                        "'in' requires an object right-hand side",
                    ));
                };
                let key = self.to_string(a);
                Value::Boolean(self.heap.has_property(*r, key.as_str()))
            }
            InstanceOf => {
                let Value::Object(ctor) = b else {
                    return Err(NativeError::type_error(
                        "right-hand side of 'instanceof' is not callable",
                    ));
                };
                if self.heap.get(*ctor).map(|o| o.is_callable()) != Some(true) {
                    return Err(NativeError::type_error(
                        "right-hand side of 'instanceof' is not callable",
                    ));
                }
                let proto = match self.heap.get_property_value(*ctor, "prototype") {
                    Some(Value::Object(p)) => p,
                    _ => return Ok(Value::Boolean(false)),
                };
                match a {
                    Value::Object(r) => {
                        let start = self.heap.get(*r).and_then(|o| o.proto);
                        Value::Boolean(self.heap.proto_chain_contains(start, proto))
                    }
                    _ => Value::Boolean(false),
                }
            }
        })
    }

    // ── garbage collection ──────────────────────────────────────────────

    /// Mark-and-sweep from the interpreter's roots. Weak-container entries
    /// are not traced, so objects only they reference get reclaimed and
    /// disappear from the containers at their next observation.
    pub fn collect(&mut self) -> usize {
        let (live_objs, live_scopes) = self.trace_reachable();
        let swept = self.heap.sweep(&live_objs);
        self.scopes.sweep(&live_scopes);
        self.allocs_since_sweep = 0;
        swept
    }

    fn maybe_collect(&mut self) {
        if self.config.gc_threshold > 0 && self.allocs_since_sweep >= self.config.gc_threshold {
            self.collect();
        }
    }

    pub(crate) fn trace_reachable(&self) -> (FxHashSet<u64>, FxHashSet<usize>) {
        let mut live_objs: FxHashSet<u64> = FxHashSet::default();
        let mut live_scopes: FxHashSet<usize> = FxHashSet::default();
        let mut obj_work: Vec<ObjRef> = Vec::new();
        let mut scope_work: Vec<ScopeId> = vec![ScopeId::GLOBAL];
        // Weak maps seen during the walk; their values need an ephemeron
        // fixpoint because a key may become live after the map was visited.
        let mut weak_maps: Vec<ObjRef> = Vec::new();

        for (_, r) in self.registry.iter() {
            obj_work.push(r);
        }
        for (_, v) in &self.uncaught {
            if let Value::Object(r) = v {
                obj_work.push(*r);
            }
        }
        for thread in self.scheduler.threads() {
            if let Value::Object(r) = &thread.result {
                obj_work.push(*r);
            }
            if let Some(Abrupt::Return(v) | Abrupt::Throw(v)) = &thread.pending {
                if let Value::Object(r) = v {
                    obj_work.push(*r);
                }
            }
            for frame in &thread.frames {
                scope_work.push(frame.scope);
                frame.trace(
                    &mut |v| {
                        if let Value::Object(r) = v {
                            obj_work.push(*r);
                        }
                    },
                    &mut |s| scope_work.push(s),
                );
            }
        }

        loop {
            if let Some(sid) = scope_work.pop() {
                if live_scopes.insert(sid.index()) {
                    if let Some(scope) = self.scopes.get(sid) {
                        if let Some(parent) = scope.parent {
                            scope_work.push(parent);
                        }
                        for v in scope.vars.values() {
                            if let Value::Object(r) = v {
                                obj_work.push(*r);
                            }
                        }
                    }
                }
                continue;
            }
            if let Some(r) = obj_work.pop() {
                if !live_objs.insert(r.id()) {
                    continue;
                }
                let Some(obj) = self.heap.get(r) else { continue };
                if let Some(proto) = obj.proto {
                    obj_work.push(proto);
                }
                for slot in obj.properties.values() {
                    if let Value::Object(v) = &slot.value {
                        obj_work.push(*v);
                    }
                }
                match &obj.slots {
                    InternalSlots::Function(FunctionSlot::Interpreted(f)) => {
                        scope_work.push(f.scope);
                    }
                    InternalSlots::Map { entries } => {
                        for (k, v) in entries {
                            if let Value::Object(x) = k {
                                obj_work.push(*x);
                            }
                            if let Value::Object(x) = v {
                                obj_work.push(*x);
                            }
                        }
                    }
                    InternalSlots::Set { entries } => {
                        for v in entries {
                            if let Value::Object(x) = v {
                                obj_work.push(*x);
                            }
                        }
                    }
                    // Weak keys are not traced; weak-map values are handled
                    // by the ephemeron pass below.
                    InternalSlots::WeakMap(_) => weak_maps.push(r),
                    _ => {}
                }
                continue;
            }
            // Ephemeron pass: a weak-map value is live iff its key is.
            let mut found = false;
            for &map_ref in &weak_maps {
                if let Some(obj) = self.heap.get(map_ref) {
                    if let InternalSlots::WeakMap(map) = &obj.slots {
                        for (key_id, v) in map.raw_entries() {
                            if live_objs.contains(key_id) {
                                if let Value::Object(r) = v {
                                    if !live_objs.contains(&r.id()) {
                                        obj_work.push(*r);
                                        found = true;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            if !found {
                break;
            }
        }

        (live_objs, live_scopes)
    }
}
