//! Persistent, checkpointable interpreter for an ES5-family world language.
//!
//! `jsmud` executes user programs step by step against a pseudo-heap of
//! user-level objects, runs many cooperative fibers on one host thread with
//! time-sliced scheduling, and can serialize its entire live state — every
//! object, closure, suspended frame, and thread — to a portable record array
//! from which a freshly started process resumes exactly where it left off.
//!
//! The host supplies the parser (programs arrive as an ESTree-shaped AST),
//! the clock, I/O readiness events, and the native built-ins; the
//! interpreter owns everything else.
//!
//! # Example
//!
//! ```
//! use jsmud::ast::build;
//! use jsmud::ast::BinaryOp::{Add, Div, Mul, Sub};
//! use jsmud::{Interpreter, SystemClock};
//!
//! // (3 + 12/4) * (10 - 3)
//! let program = build::program(vec![build::expr_stmt(build::binary(
//!     Mul,
//!     build::binary(Add, build::number(3.0), build::binary(Div, build::number(12.0), build::number(4.0))),
//!     build::binary(Sub, build::number(10.0), build::number(3.0)),
//! ))]);
//!
//! let mut interp = Interpreter::new(Box::new(SystemClock::new()));
//! let main = interp.load_program(&program);
//! interp.run(10_000);
//! assert_eq!(interp.thread_result(main).unwrap().as_number(), Some(42.0));
//! ```

pub mod ast;
pub mod error;
pub mod heap;
pub mod host;
pub mod interpreter;
pub mod natives;
pub mod object;
pub(crate) mod prelude;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod snapshot;
pub mod value;
pub mod weak;

pub use error::{DecodeError, ErrorKind, NativeError};
pub use heap::{Heap, ObjRef};
pub use host::{Clock, HostHandle, IoEvent, ManualClock, SystemClock};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use natives::{NativeFn, NativeRegistry};
pub use object::{ClassTag, PropertySlot, PseudoObject};
pub use registry::Registry;
pub use scheduler::{ThreadId, ThreadStatus};
pub use scope::ScopeId;
pub use snapshot::{restore, snapshot, SNAPSHOT_VERSION};
pub use value::{JsString, Value};
