//! The step engine.
//!
//! Every AST node kind has a state frame; a thread's suspended continuation
//! is its stack of frames (root first, innermost on top). One call to
//! `step_thread` advances the top frame by exactly one step: the frame either
//! pushes a child, finishes and delivers a value to the frame below via
//! `accept`, or raises an abrupt completion that unwinds frame by frame until
//! something intercepts it. Nothing suspends mid-step, so every scheduler
//! boundary is a clean state-tree node boundary.

use std::rc::Rc;

use crate::ast::{
    AssignmentOp, BinaryOp, Expression, ForInLeft, ForInit, FunctionExpression, Literal,
    LogicalOp, MemberProperty, ObjectProperty, Statement, SwitchCase, UnaryOp, UpdateOp,
    VariableDeclarator,
};
use crate::error::NativeError;
use crate::heap::ObjRef;
use crate::host::HostHandle;
use crate::scheduler::Thread;
use crate::scope::ScopeId;
use crate::value::{CheapClone, JsString, Value};

use super::lvalue::LValue;
use super::Interpreter;

/// Abrupt completion threaded up the state tree.
#[derive(Debug, Clone)]
pub enum Abrupt {
    Break(Option<JsString>),
    Continue(Option<JsString>),
    Return(Value),
    Throw(Value),
}

/// Why a thread gave up its slice.
#[derive(Debug, Clone, Copy)]
pub enum Suspension {
    /// Sleep until the given monotonic ms.
    SleepUntil(f64),
    /// Wait for host I/O readiness on a handle.
    Block(HostHandle),
    /// Go to the back of the runnable queue.
    Yield,
}

/// Result of stepping a thread once.
#[derive(Debug)]
pub(crate) enum StepSignal {
    Continue,
    Done,
    Suspend(Suspension),
}

/// One vertex of the continuation tree: a frame kind plus the scope it
/// evaluates in.
#[derive(Debug)]
pub struct StateFrame {
    pub scope: ScopeId,
    pub kind: FrameKind,
}

impl StateFrame {
    pub fn new(scope: ScopeId, kind: FrameKind) -> Self {
        Self { scope, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Test,
    TestDone,
    RunBody,
    BodyDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForPhase {
    Init,
    InitDone,
    Test,
    TestDone,
    BodyDone,
    UpdateDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForInPhase {
    Right,
    RightDone,
    Next,
    BodyDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPhase {
    Start,
    BlockDone,
    HandlerDone,
    FinallyDone,
}

/// Completion saved while a finally block runs.
#[derive(Debug, Clone)]
pub enum SavedCompletion {
    NotSaved,
    Normal,
    Abrupt(Abrupt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Disc,
    FindCase,
    TestDone,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Callee,
    Args,
    Invoke,
}

/// Per-AST-node state kinds. Progress fields hold everything needed to
/// resume after a suspension between any two steps.
#[derive(Debug)]
pub enum FrameKind {
    // ── statements ──────────────────────────────────────────────────────
    Block {
        body: Rc<[Statement]>,
        index: usize,
    },
    ExprStmt {
        expr: Rc<Expression>,
        value: Option<Value>,
        started: bool,
    },
    VarDecl {
        decls: Rc<[VariableDeclarator]>,
        index: usize,
        value: Option<Value>,
        waiting: bool,
    },
    If {
        test: Rc<Expression>,
        consequent: Rc<Statement>,
        alternate: Option<Rc<Statement>>,
        decided: Option<bool>,
        started: bool,
    },
    While {
        test: Rc<Expression>,
        body: Rc<Statement>,
        label: Option<JsString>,
        phase: LoopPhase,
        test_result: Option<bool>,
    },
    DoWhile {
        test: Rc<Expression>,
        body: Rc<Statement>,
        label: Option<JsString>,
        phase: LoopPhase,
        test_result: Option<bool>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Rc<Expression>>,
        update: Option<Rc<Expression>>,
        body: Rc<Statement>,
        label: Option<JsString>,
        phase: ForPhase,
        test_result: Option<bool>,
    },
    ForIn {
        left: ForInLeft,
        right: Rc<Expression>,
        body: Rc<Statement>,
        label: Option<JsString>,
        phase: ForInPhase,
        keys: Vec<JsString>,
        index: usize,
        object: Option<ObjRef>,
    },
    Switch {
        discriminant: Rc<Expression>,
        cases: Rc<[SwitchCase]>,
        phase: SwitchPhase,
        disc: Option<Value>,
        test_value: Option<Value>,
        case_index: usize,
        stmt_index: usize,
    },
    Try {
        block: Rc<[Statement]>,
        handler_param: Option<JsString>,
        handler_body: Option<Rc<[Statement]>>,
        finalizer: Option<Rc<[Statement]>>,
        phase: TryPhase,
        saved: SavedCompletion,
    },
    Labeled {
        label: JsString,
        body: Rc<Statement>,
        started: bool,
    },
    Return {
        argument: Option<Rc<Expression>>,
        value: Option<Value>,
        started: bool,
    },
    Throw {
        argument: Rc<Expression>,
        value: Option<Value>,
        started: bool,
    },

    /// Function-call boundary: runs the body statements in the call scope,
    /// intercepts `return`, and delivers the return value to the caller.
    CallBody {
        body: Rc<[Statement]>,
        index: usize,
    },

    // ── expressions ─────────────────────────────────────────────────────
    Literal {
        literal: Literal,
    },
    Ident {
        name: JsString,
    },
    This,
    FunctionExpr {
        func: Rc<FunctionExpression>,
    },
    ObjectLit {
        props: Rc<[ObjectProperty]>,
        object: Option<ObjRef>,
        index: usize,
    },
    ArrayLit {
        elements: Rc<[Option<Rc<Expression>>]>,
        array: Option<ObjRef>,
        index: usize,
    },
    Member {
        object: Rc<Expression>,
        property: MemberProperty,
        base: Option<Value>,
        key: Option<JsString>,
    },
    Call {
        callee: Rc<Expression>,
        args: Rc<[Rc<Expression>]>,
        phase: CallPhase,
        this_val: Value,
        base: Option<Value>,
        key: Option<JsString>,
        func: Option<Value>,
        done_args: Vec<Value>,
    },
    New {
        callee: Rc<Expression>,
        args: Rc<[Rc<Expression>]>,
        phase: CallPhase,
        func: Option<Value>,
        done_args: Vec<Value>,
        this_obj: Option<ObjRef>,
        result: Option<Value>,
    },
    Assign {
        op: AssignmentOp,
        target: LValue,
        right: Rc<Expression>,
        old: Option<Value>,
        rhs: Option<Value>,
        rhs_started: bool,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: LValue,
    },
    Binary {
        op: BinaryOp,
        left: Rc<Expression>,
        right: Rc<Expression>,
        left_val: Option<Value>,
        right_val: Option<Value>,
        phase: u8,
    },
    Logical {
        op: LogicalOp,
        left: Rc<Expression>,
        right: Rc<Expression>,
        left_val: Option<Value>,
        started: bool,
    },
    Unary {
        op: UnaryOp,
        argument: Rc<Expression>,
        value: Option<Value>,
        started: bool,
    },
    Delete {
        object: Option<Rc<Expression>>,
        property: Option<MemberProperty>,
        base: Option<Value>,
        key: Option<JsString>,
        /// `Some(result)` when no member access is involved (`delete x`,
        /// `delete 1`): the answer is fixed, operand still evaluates.
        trivial: Option<bool>,
    },
    Conditional {
        test: Rc<Expression>,
        consequent: Rc<Expression>,
        alternate: Rc<Expression>,
        decided: Option<bool>,
        started: bool,
    },
    Sequence {
        exprs: Rc<[Rc<Expression>]>,
        index: usize,
        last: Value,
    },
    /// A node the engine cannot evaluate (for example an invalid assignment
    /// target); throws at its first step.
    Invalid {
        message: String,
    },
}

/// What a step did to the frame stack.
enum Transition {
    /// Push a child; this frame resumes when the child delivers.
    Push(StateFrame),
    /// Tail-position handoff: this frame is done, the replacement delivers
    /// straight to this frame's parent.
    Replace(StateFrame),
    /// Done, statement context: nothing to deliver.
    Pop,
    /// Done, expression context: deliver exactly one value to the parent.
    PopValue(Value),
    /// Done; the value is the thread's completion value.
    PopCompletion(Value),
    /// Progress was made inside the frame; step it again.
    Stay,
    /// Raise an abrupt completion and start unwinding.
    Raise(Abrupt),
}

/// Outcome of offering a pending abrupt completion to a popped frame.
enum Unwind {
    /// Frame does not intercept; keep unwinding.
    Pass(Abrupt),
    /// Frame consumed it; push it back, optionally with a child on top
    /// (catch handler or finally block).
    Resume {
        frame: StateFrame,
        child: Option<StateFrame>,
    },
    /// Frame consumed it and is finished (break out of a loop).
    Exit,
    /// Function boundary consumed a return: deliver the value downward.
    Deliver(Value),
}

/// How a statement enters the frame stack.
enum StmtAction {
    Frame(StateFrame),
    /// No-op at evaluation time (empty statement, hoisted declaration).
    Skip,
    Abrupt(Abrupt),
}

impl Interpreter {
    /// Advance `thread` by one indivisible step.
    pub(crate) fn step_thread(&mut self, thread: &mut Thread) -> StepSignal {
        if let Some(abrupt) = thread.pending.take() {
            return self.step_unwind(thread, abrupt);
        }

        let Some(mut frame) = thread.frames.pop() else {
            return StepSignal::Done;
        };

        let transition = match self.step_frame(&mut frame) {
            Ok(t) => t,
            Err(err) => {
                let value = self.reify_error(err);
                Transition::Raise(Abrupt::Throw(value))
            }
        };

        match transition {
            Transition::Push(child) => {
                if thread.frames.len() + 2 > self.config.max_stack_depth {
                    let err = self.reify_error(NativeError::range_error(
                        "maximum call stack size exceeded",
                    ));
                    thread.pending = Some(Abrupt::Throw(err));
                } else {
                    thread.frames.push(frame);
                    thread.frames.push(child);
                }
            }
            Transition::Replace(next) => {
                thread.frames.push(next);
            }
            Transition::Stay => {
                thread.frames.push(frame);
            }
            Transition::Pop => {}
            Transition::PopValue(v) => self.deliver(thread, v),
            Transition::PopCompletion(v) => {
                thread.result = v;
            }
            Transition::Raise(abrupt) => {
                thread.pending = Some(abrupt);
            }
        }

        if let Some(suspension) = self.pending_suspension.take() {
            return StepSignal::Suspend(suspension);
        }
        if thread.frames.is_empty() && thread.pending.is_none() {
            StepSignal::Done
        } else {
            StepSignal::Continue
        }
    }

    /// Deliver a child's value to the new top frame's acceptor. With an empty
    /// stack the value becomes the thread's completion value.
    fn deliver(&mut self, thread: &mut Thread, v: Value) {
        match thread.frames.pop() {
            Some(mut frame) => {
                self.accept(&mut frame, v);
                thread.frames.push(frame);
            }
            None => thread.result = v,
        }
    }

    /// Unwind one frame with a pending abrupt completion.
    fn step_unwind(&mut self, thread: &mut Thread, abrupt: Abrupt) -> StepSignal {
        let Some(frame) = thread.frames.pop() else {
            // Reached the root. An uncaught throw terminates the thread and
            // is reported through the host boundary; a stray
            // break/continue/return cannot come from a well-formed parse.
            if let Abrupt::Throw(value) = abrupt {
                log::warn!(
                    "thread {}: uncaught {}",
                    thread.id.0,
                    self.to_string(&value)
                );
                self.uncaught.push((thread.id, value));
            }
            return StepSignal::Done;
        };

        match self.offer_abrupt(frame, abrupt) {
            Unwind::Pass(abrupt) => {
                thread.pending = Some(abrupt);
                StepSignal::Continue
            }
            Unwind::Resume { frame, child } => {
                thread.frames.push(frame);
                if let Some(child) = child {
                    thread.frames.push(child);
                }
                StepSignal::Continue
            }
            Unwind::Exit => {
                if thread.frames.is_empty() {
                    StepSignal::Done
                } else {
                    StepSignal::Continue
                }
            }
            Unwind::Deliver(v) => {
                self.deliver(thread, v);
                if thread.frames.is_empty() {
                    StepSignal::Done
                } else {
                    StepSignal::Continue
                }
            }
        }
    }

    /// Offer a pending abrupt completion to a frame popped during unwinding.
    fn offer_abrupt(&mut self, mut frame: StateFrame, abrupt: Abrupt) -> Unwind {
        fn label_matches(frame_label: &Option<JsString>, target: &Option<JsString>) -> bool {
            match target {
                None => true,
                Some(t) => frame_label.as_ref() == Some(t),
            }
        }

        let scope = frame.scope;
        match &mut frame.kind {
            FrameKind::While { label, phase, .. } => match &abrupt {
                Abrupt::Break(target) if label_matches(label, target) => Unwind::Exit,
                Abrupt::Continue(target) if label_matches(label, target) => {
                    *phase = LoopPhase::Test;
                    Unwind::Resume { frame, child: None }
                }
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::DoWhile { label, phase, .. } => match &abrupt {
                Abrupt::Break(target) if label_matches(label, target) => Unwind::Exit,
                Abrupt::Continue(target) if label_matches(label, target) => {
                    *phase = LoopPhase::BodyDone;
                    Unwind::Resume { frame, child: None }
                }
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::For { label, phase, .. } => match &abrupt {
                Abrupt::Break(target) if label_matches(label, target) => Unwind::Exit,
                Abrupt::Continue(target) if label_matches(label, target) => {
                    *phase = ForPhase::BodyDone;
                    Unwind::Resume { frame, child: None }
                }
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::ForIn { label, phase, .. } => match &abrupt {
                Abrupt::Break(target) if label_matches(label, target) => Unwind::Exit,
                Abrupt::Continue(target) if label_matches(label, target) => {
                    *phase = ForInPhase::Next;
                    Unwind::Resume { frame, child: None }
                }
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::Switch { .. } => match &abrupt {
                Abrupt::Break(None) => Unwind::Exit,
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::Labeled { label, .. } => match &abrupt {
                Abrupt::Break(Some(target)) if target == label => Unwind::Exit,
                _ => Unwind::Pass(abrupt),
            },
            FrameKind::CallBody { .. } => match abrupt {
                Abrupt::Return(v) => Unwind::Deliver(v),
                other => Unwind::Pass(other),
            },
            FrameKind::Try {
                phase,
                saved,
                handler_param,
                handler_body,
                finalizer,
                ..
            } => {
                let in_block = matches!(*phase, TryPhase::BlockDone);
                if let (Abrupt::Throw(value), true, Some(body)) =
                    (&abrupt, in_block, handler_body.clone())
                {
                    let catch_scope = self.scopes.alloc(Some(scope));
                    if let Some(param) = handler_param.clone() {
                        self.scopes.declare_with(catch_scope, param, value.clone());
                    }
                    *phase = TryPhase::HandlerDone;
                    let child = StateFrame::new(catch_scope, FrameKind::Block { body, index: 0 });
                    return Unwind::Resume {
                        frame,
                        child: Some(child),
                    };
                }
                if matches!(*phase, TryPhase::BlockDone | TryPhase::HandlerDone) {
                    if let Some(body) = finalizer.clone() {
                        *saved = SavedCompletion::Abrupt(abrupt);
                        *phase = TryPhase::FinallyDone;
                        let child = StateFrame::new(scope, FrameKind::Block { body, index: 0 });
                        return Unwind::Resume {
                            frame,
                            child: Some(child),
                        };
                    }
                }
                Unwind::Pass(abrupt)
            }
            _ => Unwind::Pass(abrupt),
        }
    }

    /// Build the action for executing one statement in `scope`.
    fn statement_action(&mut self, scope: ScopeId, stmt: &Statement) -> StmtAction {
        match stmt {
            // Hoisted at scope entry; nothing left to do.
            Statement::Empty | Statement::FunctionDeclaration(_) => StmtAction::Skip,
            Statement::Break(b) => StmtAction::Abrupt(Abrupt::Break(
                b.label.as_deref().map(JsString::from),
            )),
            Statement::Continue(c) => StmtAction::Abrupt(Abrupt::Continue(
                c.label.as_deref().map(JsString::from),
            )),
            Statement::Expression(e) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::ExprStmt {
                    expr: e.expression.cheap_clone(),
                    value: None,
                    started: false,
                },
            )),
            Statement::VariableDeclaration(decl) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::VarDecl {
                    decls: decl.declarations.cheap_clone(),
                    index: 0,
                    value: None,
                    waiting: false,
                },
            )),
            Statement::Block(block) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::Block {
                    body: block.body.cheap_clone(),
                    index: 0,
                },
            )),
            Statement::If(s) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::If {
                    test: s.test.cheap_clone(),
                    consequent: s.consequent.cheap_clone(),
                    alternate: s.alternate.as_ref().map(CheapClone::cheap_clone),
                    decided: None,
                    started: false,
                },
            )),
            Statement::While(s) => StmtAction::Frame(self.while_frame(scope, s, None)),
            Statement::DoWhile(s) => StmtAction::Frame(self.do_while_frame(scope, s, None)),
            Statement::For(s) => StmtAction::Frame(self.for_frame(scope, s, None)),
            Statement::ForIn(s) => StmtAction::Frame(self.for_in_frame(scope, s, None)),
            Statement::Switch(s) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::Switch {
                    discriminant: s.discriminant.cheap_clone(),
                    cases: s.cases.cheap_clone(),
                    phase: SwitchPhase::Disc,
                    disc: None,
                    test_value: None,
                    case_index: 0,
                    stmt_index: 0,
                },
            )),
            Statement::Try(s) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::Try {
                    block: s.block.body.cheap_clone(),
                    handler_param: s
                        .handler
                        .as_ref()
                        .map(|h| JsString::from(h.param.as_str())),
                    handler_body: s.handler.as_ref().map(|h| h.body.body.cheap_clone()),
                    finalizer: s.finalizer.as_ref().map(|f| f.body.cheap_clone()),
                    phase: TryPhase::Start,
                    saved: SavedCompletion::NotSaved,
                },
            )),
            Statement::Labeled(l) => {
                let label = Some(JsString::from(l.label.as_str()));
                match &*l.body {
                    Statement::While(s) => StmtAction::Frame(self.while_frame(scope, s, label)),
                    Statement::DoWhile(s) => {
                        StmtAction::Frame(self.do_while_frame(scope, s, label))
                    }
                    Statement::For(s) => StmtAction::Frame(self.for_frame(scope, s, label)),
                    Statement::ForIn(s) => StmtAction::Frame(self.for_in_frame(scope, s, label)),
                    _ => StmtAction::Frame(StateFrame::new(
                        scope,
                        FrameKind::Labeled {
                            label: JsString::from(l.label.as_str()),
                            body: l.body.cheap_clone(),
                            started: false,
                        },
                    )),
                }
            }
            Statement::Return(r) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::Return {
                    argument: r.argument.as_ref().map(CheapClone::cheap_clone),
                    value: None,
                    started: false,
                },
            )),
            Statement::Throw(t) => StmtAction::Frame(StateFrame::new(
                scope,
                FrameKind::Throw {
                    argument: t.argument.cheap_clone(),
                    value: None,
                    started: false,
                },
            )),
        }
    }

    fn while_frame(
        &self,
        scope: ScopeId,
        s: &crate::ast::WhileStatement,
        label: Option<JsString>,
    ) -> StateFrame {
        StateFrame::new(
            scope,
            FrameKind::While {
                test: s.test.cheap_clone(),
                body: s.body.cheap_clone(),
                label,
                phase: LoopPhase::Test,
                test_result: None,
            },
        )
    }

    fn do_while_frame(
        &self,
        scope: ScopeId,
        s: &crate::ast::DoWhileStatement,
        label: Option<JsString>,
    ) -> StateFrame {
        StateFrame::new(
            scope,
            FrameKind::DoWhile {
                test: s.test.cheap_clone(),
                body: s.body.cheap_clone(),
                label,
                phase: LoopPhase::RunBody,
                test_result: None,
            },
        )
    }

    fn for_frame(
        &self,
        scope: ScopeId,
        s: &crate::ast::ForStatement,
        label: Option<JsString>,
    ) -> StateFrame {
        StateFrame::new(
            scope,
            FrameKind::For {
                init: s.init.clone(),
                test: s.test.as_ref().map(CheapClone::cheap_clone),
                update: s.update.as_ref().map(CheapClone::cheap_clone),
                body: s.body.cheap_clone(),
                label,
                phase: ForPhase::Init,
                test_result: None,
            },
        )
    }

    fn for_in_frame(
        &self,
        scope: ScopeId,
        s: &crate::ast::ForInStatement,
        label: Option<JsString>,
    ) -> StateFrame {
        StateFrame::new(
            scope,
            FrameKind::ForIn {
                left: s.left.clone(),
                right: s.right.cheap_clone(),
                body: s.body.cheap_clone(),
                label,
                phase: ForInPhase::Right,
                keys: Vec::new(),
                index: 0,
                object: None,
            },
        )
    }

    /// Build an expression evaluation frame.
    fn expr_frame(&self, scope: ScopeId, expr: &Rc<Expression>) -> StateFrame {
        let kind = match &**expr {
            Expression::Identifier(id) => FrameKind::Ident {
                name: JsString::from(id.name.as_str()),
            },
            Expression::Literal(lit) => FrameKind::Literal {
                literal: lit.clone(),
            },
            Expression::This => FrameKind::This,
            Expression::Function(f) => FrameKind::FunctionExpr {
                func: f.cheap_clone(),
            },
            Expression::Object(o) => FrameKind::ObjectLit {
                props: o.properties.cheap_clone(),
                object: None,
                index: 0,
            },
            Expression::Array(a) => FrameKind::ArrayLit {
                elements: a.elements.cheap_clone(),
                array: None,
                index: 0,
            },
            Expression::Member(m) => FrameKind::Member {
                object: m.object.cheap_clone(),
                property: m.property.clone(),
                base: None,
                key: None,
            },
            Expression::Call(c) => FrameKind::Call {
                callee: c.callee.cheap_clone(),
                args: c.arguments.cheap_clone(),
                phase: CallPhase::Callee,
                this_val: Value::Undefined,
                base: None,
                key: None,
                func: None,
                done_args: Vec::new(),
            },
            Expression::New(n) => FrameKind::New {
                callee: n.callee.cheap_clone(),
                args: n.arguments.cheap_clone(),
                phase: CallPhase::Callee,
                func: None,
                done_args: Vec::new(),
                this_obj: None,
                result: None,
            },
            Expression::Assignment(a) => match LValue::from_expression(&a.left) {
                Ok(target) => FrameKind::Assign {
                    op: a.operator,
                    target,
                    right: a.right.cheap_clone(),
                    old: None,
                    rhs: None,
                    rhs_started: false,
                },
                Err(_) => FrameKind::Invalid {
                    message: "invalid assignment target".into(),
                },
            },
            Expression::Update(u) => match LValue::from_expression(&u.argument) {
                Ok(target) => FrameKind::Update {
                    op: u.operator,
                    prefix: u.prefix,
                    target,
                },
                Err(_) => FrameKind::Invalid {
                    message: "invalid update target".into(),
                },
            },
            Expression::Binary(b) => FrameKind::Binary {
                op: b.operator,
                left: b.left.cheap_clone(),
                right: b.right.cheap_clone(),
                left_val: None,
                right_val: None,
                phase: 0,
            },
            Expression::Logical(l) => FrameKind::Logical {
                op: l.operator,
                left: l.left.cheap_clone(),
                right: l.right.cheap_clone(),
                left_val: None,
                started: false,
            },
            Expression::Unary(u) => match u.operator {
                UnaryOp::Delete => match &*u.argument {
                    Expression::Member(m) => FrameKind::Delete {
                        object: Some(m.object.cheap_clone()),
                        property: Some(m.property.clone()),
                        base: None,
                        key: None,
                        trivial: None,
                    },
                    Expression::Identifier(_) => FrameKind::Delete {
                        object: None,
                        property: None,
                        base: None,
                        key: None,
                        trivial: Some(false),
                    },
                    _ => FrameKind::Delete {
                        object: Some(u.argument.cheap_clone()),
                        property: None,
                        base: None,
                        key: None,
                        trivial: Some(true),
                    },
                },
                _ => FrameKind::Unary {
                    op: u.operator,
                    argument: u.argument.cheap_clone(),
                    value: None,
                    started: false,
                },
            },
            Expression::Conditional(c) => FrameKind::Conditional {
                test: c.test.cheap_clone(),
                consequent: c.consequent.cheap_clone(),
                alternate: c.alternate.cheap_clone(),
                decided: None,
                started: false,
            },
            Expression::Sequence(s) => FrameKind::Sequence {
                exprs: s.expressions.cheap_clone(),
                index: 0,
                last: Value::Undefined,
            },
        };
        StateFrame::new(scope, kind)
    }

    /// Execute one step of a frame.
    fn step_frame(&mut self, frame: &mut StateFrame) -> Result<Transition, NativeError> {
        let scope = frame.scope;
        match &mut frame.kind {
            FrameKind::Block { body, index } => {
                if *index < body.len() {
                    let stmt = body[*index].clone();
                    *index += 1;
                    Ok(match self.statement_action(scope, &stmt) {
                        StmtAction::Frame(f) => Transition::Push(f),
                        StmtAction::Skip => Transition::Stay,
                        StmtAction::Abrupt(a) => Transition::Raise(a),
                    })
                } else {
                    Ok(Transition::Pop)
                }
            }

            FrameKind::CallBody { body, index } => {
                if *index < body.len() {
                    let stmt = body[*index].clone();
                    *index += 1;
                    Ok(match self.statement_action(scope, &stmt) {
                        StmtAction::Frame(f) => Transition::Push(f),
                        StmtAction::Skip => Transition::Stay,
                        StmtAction::Abrupt(a) => Transition::Raise(a),
                    })
                } else {
                    Ok(Transition::PopValue(Value::Undefined))
                }
            }

            FrameKind::ExprStmt {
                expr,
                value,
                started,
            } => {
                if !*started {
                    *started = true;
                    let child = self.expr_frame(scope, expr);
                    Ok(Transition::Push(child))
                } else {
                    Ok(Transition::PopCompletion(
                        value.take().unwrap_or(Value::Undefined),
                    ))
                }
            }

            FrameKind::VarDecl {
                decls,
                index,
                value,
                waiting,
            } => {
                if *waiting {
                    let v = value.take().unwrap_or(Value::Undefined);
                    let name = decls[*index].id.clone();
                    *waiting = false;
                    *index += 1;
                    let strict = self.config.set_unresolved_is_error;
                    self.scopes.set_var(scope, &name, v, strict)?;
                    return Ok(Transition::Stay);
                }
                while *index < decls.len() && decls[*index].init.is_none() {
                    *index += 1;
                }
                if *index >= decls.len() {
                    return Ok(Transition::Pop);
                }
                let init = decls[*index].init.clone().expect("checked above");
                *waiting = true;
                let child = self.expr_frame(scope, &init);
                Ok(Transition::Push(child))
            }

            FrameKind::If {
                test,
                consequent,
                alternate,
                decided,
                started,
            } => {
                if !*started {
                    *started = true;
                    let child = self.expr_frame(scope, test);
                    return Ok(Transition::Push(child));
                }
                let branch = if decided.take().unwrap_or(false) {
                    Some(consequent.cheap_clone())
                } else {
                    alternate.as_ref().map(CheapClone::cheap_clone)
                };
                match branch {
                    Some(stmt) => Ok(match self.statement_action(scope, &stmt) {
                        StmtAction::Frame(f) => Transition::Replace(f),
                        StmtAction::Skip => Transition::Pop,
                        StmtAction::Abrupt(a) => Transition::Raise(a),
                    }),
                    None => Ok(Transition::Pop),
                }
            }

            FrameKind::While {
                test,
                body,
                phase,
                test_result,
                ..
            } => match *phase {
                LoopPhase::Test => {
                    *phase = LoopPhase::TestDone;
                    let child = self.expr_frame(scope, test);
                    Ok(Transition::Push(child))
                }
                LoopPhase::TestDone => {
                    if test_result.take().unwrap_or(false) {
                        let body = body.cheap_clone();
                        *phase = LoopPhase::BodyDone;
                        Ok(match self.statement_action(scope, &body) {
                            StmtAction::Frame(f) => Transition::Push(f),
                            StmtAction::Skip => Transition::Stay,
                            StmtAction::Abrupt(a) => Transition::Raise(a),
                        })
                    } else {
                        Ok(Transition::Pop)
                    }
                }
                LoopPhase::RunBody | LoopPhase::BodyDone => {
                    *phase = LoopPhase::Test;
                    Ok(Transition::Stay)
                }
            },

            FrameKind::DoWhile {
                test,
                body,
                phase,
                test_result,
                ..
            } => match *phase {
                LoopPhase::RunBody => {
                    let body = body.cheap_clone();
                    *phase = LoopPhase::BodyDone;
                    Ok(match self.statement_action(scope, &body) {
                        StmtAction::Frame(f) => Transition::Push(f),
                        StmtAction::Skip => Transition::Stay,
                        StmtAction::Abrupt(a) => Transition::Raise(a),
                    })
                }
                LoopPhase::BodyDone => {
                    *phase = LoopPhase::TestDone;
                    let child = self.expr_frame(scope, test);
                    Ok(Transition::Push(child))
                }
                LoopPhase::Test | LoopPhase::TestDone => {
                    if test_result.take().unwrap_or(false) {
                        *phase = LoopPhase::RunBody;
                        Ok(Transition::Stay)
                    } else {
                        Ok(Transition::Pop)
                    }
                }
            },

            FrameKind::For {
                init,
                test,
                update,
                body,
                phase,
                test_result,
                ..
            } => match *phase {
                ForPhase::Init => match init.take() {
                    Some(ForInit::Variable(decl)) => {
                        *phase = ForPhase::InitDone;
                        Ok(Transition::Push(StateFrame::new(
                            scope,
                            FrameKind::VarDecl {
                                decls: decl.declarations,
                                index: 0,
                                value: None,
                                waiting: false,
                            },
                        )))
                    }
                    Some(ForInit::Expression(expr)) => {
                        *phase = ForPhase::InitDone;
                        let child = self.expr_frame(scope, &expr);
                        Ok(Transition::Push(child))
                    }
                    None => {
                        *phase = ForPhase::Test;
                        Ok(Transition::Stay)
                    }
                },
                ForPhase::InitDone => {
                    *phase = ForPhase::Test;
                    Ok(Transition::Stay)
                }
                ForPhase::Test => match test {
                    Some(test) => {
                        let child = self.expr_frame(scope, &test.cheap_clone());
                        *phase = ForPhase::TestDone;
                        Ok(Transition::Push(child))
                    }
                    None => {
                        let body = body.cheap_clone();
                        *phase = ForPhase::BodyDone;
                        Ok(match self.statement_action(scope, &body) {
                            StmtAction::Frame(f) => Transition::Push(f),
                            StmtAction::Skip => Transition::Stay,
                            StmtAction::Abrupt(a) => Transition::Raise(a),
                        })
                    }
                },
                ForPhase::TestDone => {
                    if test_result.take().unwrap_or(false) {
                        let body = body.cheap_clone();
                        *phase = ForPhase::BodyDone;
                        Ok(match self.statement_action(scope, &body) {
                            StmtAction::Frame(f) => Transition::Push(f),
                            StmtAction::Skip => Transition::Stay,
                            StmtAction::Abrupt(a) => Transition::Raise(a),
                        })
                    } else {
                        Ok(Transition::Pop)
                    }
                }
                ForPhase::BodyDone => match update {
                    Some(update) => {
                        let child = self.expr_frame(scope, &update.cheap_clone());
                        *phase = ForPhase::UpdateDone;
                        Ok(Transition::Push(child))
                    }
                    None => {
                        *phase = ForPhase::Test;
                        Ok(Transition::Stay)
                    }
                },
                ForPhase::UpdateDone => {
                    *phase = ForPhase::Test;
                    Ok(Transition::Stay)
                }
            },

            FrameKind::ForIn {
                left,
                right,
                body,
                phase,
                keys,
                index,
                object,
                ..
            } => match *phase {
                ForInPhase::Right => {
                    *phase = ForInPhase::RightDone;
                    let child = self.expr_frame(scope, right);
                    Ok(Transition::Push(child))
                }
                ForInPhase::RightDone => {
                    *phase = ForInPhase::Next;
                    Ok(Transition::Stay)
                }
                ForInPhase::Next => {
                    if *index >= keys.len() {
                        return Ok(Transition::Pop);
                    }
                    let key = keys[*index].clone();
                    *index += 1;
                    // A key deleted mid-iteration is skipped.
                    if let Some(obj) = object {
                        if !self.heap.has_property(*obj, key.as_str()) {
                            return Ok(Transition::Stay);
                        }
                    }
                    let name = match left {
                        ForInLeft::Variable(name) => name.clone(),
                        ForInLeft::Target(expr) => match &**expr {
                            Expression::Identifier(id) => id.name.clone(),
                            _ => {
                                return Err(NativeError::syntax_error(
                                    "unsupported for-in target",
                                ))
                            }
                        },
                    };
                    let strict = self.config.set_unresolved_is_error;
                    self.scopes
                        .set_var(scope, &name, Value::String(key), strict)?;
                    let body = body.cheap_clone();
                    *phase = ForInPhase::BodyDone;
                    Ok(match self.statement_action(scope, &body) {
                        StmtAction::Frame(f) => Transition::Push(f),
                        StmtAction::Skip => Transition::Stay,
                        StmtAction::Abrupt(a) => Transition::Raise(a),
                    })
                }
                ForInPhase::BodyDone => {
                    *phase = ForInPhase::Next;
                    Ok(Transition::Stay)
                }
            },

            FrameKind::Switch {
                discriminant,
                cases,
                phase,
                disc,
                test_value,
                case_index,
                stmt_index,
            } => match *phase {
                SwitchPhase::Disc => {
                    *phase = SwitchPhase::FindCase;
                    let child = self.expr_frame(scope, discriminant);
                    Ok(Transition::Push(child))
                }
                SwitchPhase::FindCase => {
                    if *case_index >= cases.len() {
                        // No case matched; fall back to default if present.
                        match cases.iter().position(|c| c.test.is_none()) {
                            Some(d) => {
                                *case_index = d;
                                *stmt_index = 0;
                                *phase = SwitchPhase::Run;
                                Ok(Transition::Stay)
                            }
                            None => Ok(Transition::Pop),
                        }
                    } else if let Some(test) = &cases[*case_index].test {
                        let child = self.expr_frame(scope, &test.cheap_clone());
                        *phase = SwitchPhase::TestDone;
                        Ok(Transition::Push(child))
                    } else {
                        *case_index += 1;
                        Ok(Transition::Stay)
                    }
                }
                SwitchPhase::TestDone => {
                    let d = disc.clone().unwrap_or(Value::Undefined);
                    let t = test_value.take().unwrap_or(Value::Undefined);
                    if d.strict_equals(&t) {
                        *stmt_index = 0;
                        *phase = SwitchPhase::Run;
                    } else {
                        *case_index += 1;
                        *phase = SwitchPhase::FindCase;
                    }
                    Ok(Transition::Stay)
                }
                SwitchPhase::Run => {
                    if *case_index >= cases.len() {
                        return Ok(Transition::Pop);
                    }
                    let case = &cases[*case_index];
                    if *stmt_index < case.consequent.len() {
                        let stmt = case.consequent[*stmt_index].clone();
                        *stmt_index += 1;
                        Ok(match self.statement_action(scope, &stmt) {
                            StmtAction::Frame(f) => Transition::Push(f),
                            StmtAction::Skip => Transition::Stay,
                            StmtAction::Abrupt(a) => Transition::Raise(a),
                        })
                    } else {
                        // Fall through to the next case's statements.
                        *case_index += 1;
                        *stmt_index = 0;
                        Ok(Transition::Stay)
                    }
                }
            },

            FrameKind::Try {
                block,
                finalizer,
                phase,
                saved,
                ..
            } => match *phase {
                TryPhase::Start => {
                    *phase = TryPhase::BlockDone;
                    Ok(Transition::Push(StateFrame::new(
                        scope,
                        FrameKind::Block {
                            body: block.cheap_clone(),
                            index: 0,
                        },
                    )))
                }
                TryPhase::BlockDone | TryPhase::HandlerDone => match finalizer {
                    Some(body) => {
                        *saved = SavedCompletion::Normal;
                        *phase = TryPhase::FinallyDone;
                        Ok(Transition::Push(StateFrame::new(
                            scope,
                            FrameKind::Block {
                                body: body.cheap_clone(),
                                index: 0,
                            },
                        )))
                    }
                    None => Ok(Transition::Pop),
                },
                TryPhase::FinallyDone => {
                    match std::mem::replace(saved, SavedCompletion::NotSaved) {
                        SavedCompletion::Abrupt(a) => Ok(Transition::Raise(a)),
                        SavedCompletion::Normal | SavedCompletion::NotSaved => {
                            Ok(Transition::Pop)
                        }
                    }
                }
            },

            FrameKind::Labeled {
                body, started, ..
            } => {
                if *started {
                    return Ok(Transition::Pop);
                }
                *started = true;
                let body = body.cheap_clone();
                Ok(match self.statement_action(scope, &body) {
                    StmtAction::Frame(f) => Transition::Push(f),
                    StmtAction::Skip => Transition::Pop,
                    StmtAction::Abrupt(a) => Transition::Raise(a),
                })
            }

            FrameKind::Return {
                argument,
                value,
                started,
            } => match argument {
                Some(expr) if !*started => {
                    *started = true;
                    let child = self.expr_frame(scope, &expr.cheap_clone());
                    Ok(Transition::Push(child))
                }
                _ => Ok(Transition::Raise(Abrupt::Return(
                    value.take().unwrap_or(Value::Undefined),
                ))),
            },

            FrameKind::Throw {
                argument,
                value,
                started,
            } => {
                if !*started {
                    *started = true;
                    let child = self.expr_frame(scope, argument);
                    Ok(Transition::Push(child))
                } else {
                    Ok(Transition::Raise(Abrupt::Throw(
                        value.take().unwrap_or(Value::Undefined),
                    )))
                }
            }

            // ── expressions ────────────────────────────────────────────
            FrameKind::Literal { literal } => {
                let v = match literal {
                    Literal::Null => Value::Null,
                    Literal::Boolean(b) => Value::Boolean(*b),
                    Literal::Number(n) => Value::Number(*n),
                    Literal::String(s) => Value::from(s.as_str()),
                    Literal::RegExp { pattern, flags } => {
                        let r = self.create_regexp(pattern.as_str(), flags.as_str());
                        Value::Object(r)
                    }
                };
                Ok(Transition::PopValue(v))
            }

            FrameKind::Ident { name } => {
                let v = self.scopes.get_var(scope, name.as_str())?;
                Ok(Transition::PopValue(v))
            }

            FrameKind::This => {
                let v = self
                    .scopes
                    .get_var(scope, "this")
                    .unwrap_or(Value::Undefined);
                Ok(Transition::PopValue(v))
            }

            FrameKind::FunctionExpr { func } => {
                let obj = self.create_closure_from_expr(func, scope);
                Ok(Transition::PopValue(Value::Object(obj)))
            }

            FrameKind::ObjectLit {
                props,
                object,
                index,
            } => {
                if object.is_none() {
                    *object = Some(self.create_plain_object());
                }
                if *index < props.len() {
                    let value_expr = props[*index].value.cheap_clone();
                    let child = self.expr_frame(scope, &value_expr);
                    Ok(Transition::Push(child))
                } else {
                    Ok(Transition::PopValue(Value::Object(
                        object.expect("created above"),
                    )))
                }
            }

            FrameKind::ArrayLit {
                elements,
                array,
                index,
            } => {
                if array.is_none() {
                    *array = Some(self.create_array_object());
                }
                while *index < elements.len() && elements[*index].is_none() {
                    *index += 1;
                }
                if *index < elements.len() {
                    let expr = elements[*index].clone().expect("skipped holes above");
                    let child = self.expr_frame(scope, &expr);
                    Ok(Transition::Push(child))
                } else {
                    let arr = array.expect("created above");
                    let wanted = elements.len() as u32;
                    if let Some(obj) = self.heap.get_mut(arr) {
                        if obj.array_length() < wanted {
                            obj.set_property(
                                JsString::from("length"),
                                Value::Number(wanted as f64),
                            );
                        }
                    }
                    Ok(Transition::PopValue(Value::Object(arr)))
                }
            }

            FrameKind::Member {
                object,
                property,
                base,
                key,
            } => {
                if base.is_none() {
                    let child = self.expr_frame(scope, &object.cheap_clone());
                    return Ok(Transition::Push(child));
                }
                if key.is_none() {
                    match property {
                        MemberProperty::Static(name) => {
                            *key = Some(JsString::from(name.as_str()));
                        }
                        MemberProperty::Computed(expr) => {
                            let child = self.expr_frame(scope, &expr.cheap_clone());
                            return Ok(Transition::Push(child));
                        }
                    }
                }
                let base = base.clone().expect("checked above");
                let key = key.clone().expect("filled above");
                let v = self.get_member(&base, key.as_str())?;
                Ok(Transition::PopValue(v))
            }

            FrameKind::Call {
                callee,
                args,
                phase,
                this_val,
                base,
                key,
                func,
                done_args,
            } => match *phase {
                CallPhase::Callee => {
                    if let Expression::Member(m) = &**callee {
                        if base.is_none() {
                            let child = self.expr_frame(scope, &m.object.cheap_clone());
                            return Ok(Transition::Push(child));
                        }
                        if key.is_none() {
                            match &m.property {
                                MemberProperty::Static(name) => {
                                    *key = Some(JsString::from(name.as_str()));
                                }
                                MemberProperty::Computed(expr) => {
                                    let child = self.expr_frame(scope, &expr.cheap_clone());
                                    return Ok(Transition::Push(child));
                                }
                            }
                        }
                        let b = base.clone().expect("checked above");
                        let k = key.clone().expect("filled above");
                        *func = Some(self.get_member(&b, k.as_str())?);
                        *this_val = b;
                        *phase = CallPhase::Args;
                        Ok(Transition::Stay)
                    } else if func.is_none() {
                        let child = self.expr_frame(scope, &callee.cheap_clone());
                        Ok(Transition::Push(child))
                    } else {
                        *phase = CallPhase::Args;
                        Ok(Transition::Stay)
                    }
                }
                CallPhase::Args => {
                    if done_args.len() < args.len() {
                        let expr = args[done_args.len()].cheap_clone();
                        let child = self.expr_frame(scope, &expr);
                        Ok(Transition::Push(child))
                    } else {
                        *phase = CallPhase::Invoke;
                        Ok(Transition::Stay)
                    }
                }
                CallPhase::Invoke => {
                    let func = func.clone().unwrap_or(Value::Undefined);
                    let this = this_val.clone();
                    let args = std::mem::take(done_args);
                    match self.dispatch_call(&func, this, args)? {
                        CallDispatch::Value(v) => Ok(Transition::PopValue(v)),
                        CallDispatch::Frame(f) => Ok(Transition::Replace(f)),
                    }
                }
            },

            FrameKind::New {
                callee,
                args,
                phase,
                func,
                done_args,
                this_obj,
                result,
            } => match *phase {
                CallPhase::Callee => {
                    if func.is_none() {
                        let child = self.expr_frame(scope, &callee.cheap_clone());
                        Ok(Transition::Push(child))
                    } else {
                        *phase = CallPhase::Args;
                        Ok(Transition::Stay)
                    }
                }
                CallPhase::Args => {
                    if done_args.len() < args.len() {
                        let expr = args[done_args.len()].cheap_clone();
                        let child = self.expr_frame(scope, &expr);
                        Ok(Transition::Push(child))
                    } else {
                        *phase = CallPhase::Invoke;
                        Ok(Transition::Stay)
                    }
                }
                CallPhase::Invoke => {
                    if let Some(r) = result.take() {
                        let this = this_obj.expect("constructed before body ran");
                        let final_value = match r {
                            Value::Object(obj) => Value::Object(obj),
                            _ => Value::Object(this),
                        };
                        return Ok(Transition::PopValue(final_value));
                    }
                    let func = func.clone().unwrap_or(Value::Undefined);
                    let fresh = self.construct_this(&func)?;
                    *this_obj = Some(fresh);
                    let args = std::mem::take(done_args);
                    match self.dispatch_call(&func, Value::Object(fresh), args)? {
                        CallDispatch::Value(v) => {
                            let final_value = match v {
                                Value::Object(obj) => Value::Object(obj),
                                _ => Value::Object(fresh),
                            };
                            Ok(Transition::PopValue(final_value))
                        }
                        CallDispatch::Frame(f) => Ok(Transition::Push(f)),
                    }
                }
            },

            FrameKind::Assign {
                op,
                target,
                right,
                old,
                rhs,
                rhs_started,
            } => {
                if !target.ready() {
                    let sub = target.next_subexpr().expect("not ready implies subexpr");
                    let child = self.expr_frame(scope, &sub);
                    return Ok(Transition::Push(child));
                }
                if !*rhs_started {
                    // Compound targets read their old value before the right
                    // side runs.
                    if op.binary_op().is_some() {
                        *old = Some(target.get(self, scope)?);
                    }
                    *rhs_started = true;
                    let child = self.expr_frame(scope, &right.cheap_clone());
                    return Ok(Transition::Push(child));
                }
                let rhs = rhs.take().unwrap_or(Value::Undefined);
                let value = match op.binary_op() {
                    None => rhs,
                    Some(bin) => {
                        let old = old.take().unwrap_or(Value::Undefined);
                        self.binary_op(bin, &old, &rhs)?
                    }
                };
                target.set(self, scope, value.clone())?;
                Ok(Transition::PopValue(value))
            }

            FrameKind::Update { op, prefix, target } => {
                if !target.ready() {
                    let sub = target.next_subexpr().expect("not ready implies subexpr");
                    let child = self.expr_frame(scope, &sub);
                    return Ok(Transition::Push(child));
                }
                let old_raw = target.get(self, scope)?;
                let old = self.to_number(&old_raw);
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                target.set(self, scope, Value::Number(new))?;
                let v = if *prefix { new } else { old };
                Ok(Transition::PopValue(Value::Number(v)))
            }

            FrameKind::Binary {
                op,
                left,
                right,
                left_val,
                right_val,
                phase,
            } => match *phase {
                0 => {
                    *phase = 1;
                    let child = self.expr_frame(scope, left);
                    Ok(Transition::Push(child))
                }
                1 => {
                    *phase = 2;
                    let child = self.expr_frame(scope, right);
                    Ok(Transition::Push(child))
                }
                _ => {
                    let a = left_val.take().unwrap_or(Value::Undefined);
                    let b = right_val.take().unwrap_or(Value::Undefined);
                    let v = self.binary_op(*op, &a, &b)?;
                    Ok(Transition::PopValue(v))
                }
            },

            FrameKind::Logical {
                op,
                left,
                right,
                left_val,
                started,
            } => {
                if !*started {
                    *started = true;
                    let child = self.expr_frame(scope, &left.cheap_clone());
                    return Ok(Transition::Push(child));
                }
                let l = left_val.take().unwrap_or(Value::Undefined);
                let truthy = l.to_boolean();
                let short_circuit = match op {
                    LogicalOp::And => !truthy,
                    LogicalOp::Or => truthy,
                };
                if short_circuit {
                    Ok(Transition::PopValue(l))
                } else {
                    let child = self.expr_frame(scope, &right.cheap_clone());
                    Ok(Transition::Replace(child))
                }
            }

            FrameKind::Unary {
                op,
                argument,
                value,
                started,
            } => {
                if !*started {
                    // `typeof unresolved` answers "undefined" instead of
                    // throwing, so identifiers are probed, not evaluated.
                    if *op == UnaryOp::TypeOf {
                        if let Expression::Identifier(id) = &**argument {
                            if !self.scopes.has_var(scope, &id.name) {
                                return Ok(Transition::PopValue(Value::from("undefined")));
                            }
                        }
                    }
                    *started = true;
                    let child = self.expr_frame(scope, argument);
                    return Ok(Transition::Push(child));
                }
                let v = value.take().unwrap_or(Value::Undefined);
                let result = match op {
                    UnaryOp::Minus => Value::Number(-self.to_number(&v)),
                    UnaryOp::Plus => Value::Number(self.to_number(&v)),
                    UnaryOp::Not => Value::Boolean(!v.to_boolean()),
                    UnaryOp::BitNot => Value::Number(!to_int32(self.to_number(&v)) as f64),
                    UnaryOp::TypeOf => Value::from(self.type_of(&v)),
                    UnaryOp::Void => Value::Undefined,
                    UnaryOp::Delete => unreachable!("routed to Delete frames"),
                };
                Ok(Transition::PopValue(result))
            }

            FrameKind::Delete {
                object,
                property,
                base,
                key,
                trivial,
            } => {
                if let Some(answer) = *trivial {
                    match object {
                        Some(expr) if base.is_none() => {
                            // Evaluate the operand for effects only.
                            let child = self.expr_frame(scope, &expr.cheap_clone());
                            return Ok(Transition::Push(child));
                        }
                        _ => return Ok(Transition::PopValue(Value::Boolean(answer))),
                    }
                }
                if base.is_none() {
                    let expr = object.clone().expect("member delete has an object");
                    let child = self.expr_frame(scope, &expr);
                    return Ok(Transition::Push(child));
                }
                if key.is_none() {
                    match property.as_ref().expect("member delete has a property") {
                        MemberProperty::Static(name) => {
                            *key = Some(JsString::from(name.as_str()));
                        }
                        MemberProperty::Computed(expr) => {
                            let child = self.expr_frame(scope, &expr.cheap_clone());
                            return Ok(Transition::Push(child));
                        }
                    }
                }
                let b = base.clone().expect("checked above");
                let k = key.clone().expect("filled above");
                let result = match b {
                    Value::Object(r) => match self.heap.get_mut(r) {
                        Some(obj) => obj.delete_property(k.as_str()),
                        None => true,
                    },
                    Value::Null | Value::Undefined => {
                        return Err(NativeError::type_error(format!(
                            "cannot delete property '{k}' of {}",
                            b.to_string_primitive()
                        )))
                    }
                    _ => true,
                };
                Ok(Transition::PopValue(Value::Boolean(result)))
            }

            FrameKind::Conditional {
                test,
                consequent,
                alternate,
                decided,
                started,
            } => {
                if !*started {
                    *started = true;
                    let child = self.expr_frame(scope, test);
                    return Ok(Transition::Push(child));
                }
                let branch = if decided.take().unwrap_or(false) {
                    consequent.cheap_clone()
                } else {
                    alternate.cheap_clone()
                };
                let child = self.expr_frame(scope, &branch);
                Ok(Transition::Replace(child))
            }

            FrameKind::Sequence { exprs, index, last } => {
                if *index < exprs.len() {
                    let expr = exprs[*index].cheap_clone();
                    *index += 1;
                    let child = self.expr_frame(scope, &expr);
                    Ok(Transition::Push(child))
                } else {
                    Ok(Transition::PopValue(std::mem::take(last)))
                }
            }

            FrameKind::Invalid { message } => Err(NativeError::syntax_error(message.clone())),
        }
    }

    /// Receive a child's value into this frame's progress fields. Exactly one
    /// call per finished expression child.
    fn accept(&mut self, frame: &mut StateFrame, v: Value) {
        match &mut frame.kind {
            FrameKind::ExprStmt { value, .. } => *value = Some(v),
            FrameKind::VarDecl { value, .. } => *value = Some(v),
            FrameKind::If { decided, .. } => *decided = Some(v.to_boolean()),
            FrameKind::While { test_result, .. } | FrameKind::DoWhile { test_result, .. } => {
                *test_result = Some(v.to_boolean())
            }
            FrameKind::For {
                phase, test_result, ..
            } => {
                if *phase == ForPhase::TestDone {
                    *test_result = Some(v.to_boolean());
                }
                // Init and update expression values are discarded.
            }
            FrameKind::ForIn {
                keys,
                object,
                ..
            } => {
                match &v {
                    Value::Object(r) => {
                        *object = Some(*r);
                        *keys = self.enumerable_chain_keys(*r);
                    }
                    Value::String(s) => {
                        *keys = (0..s.as_str().chars().count())
                            .map(|i| JsString::from(i.to_string()))
                            .collect();
                    }
                    // null/undefined (and other primitives): zero iterations.
                    _ => keys.clear(),
                }
            }
            FrameKind::Switch {
                disc, test_value, ..
            } => {
                if disc.is_none() {
                    *disc = Some(v);
                } else {
                    *test_value = Some(v);
                }
            }
            FrameKind::Return { value, .. } => *value = Some(v),
            FrameKind::Throw { value, .. } => *value = Some(v),
            FrameKind::ObjectLit {
                props,
                object,
                index,
            } => {
                if let Some(obj) = object {
                    let key = JsString::from(props[*index].key.as_str());
                    if let Some(o) = self.heap.get_mut(*obj) {
                        o.set_property(key, v);
                    }
                }
                *index += 1;
            }
            FrameKind::ArrayLit { array, index, .. } => {
                if let Some(arr) = array {
                    let key = JsString::from(index.to_string());
                    if let Some(o) = self.heap.get_mut(*arr) {
                        o.set_property(key, v);
                    }
                }
                *index += 1;
            }
            FrameKind::Member { base, key, .. } => {
                if base.is_none() {
                    *base = Some(v);
                } else {
                    *key = Some(self.to_string(&v));
                }
            }
            FrameKind::Call {
                callee,
                phase,
                base,
                key,
                func,
                done_args,
                ..
            } => match *phase {
                CallPhase::Callee => {
                    if matches!(&**callee, Expression::Member(_)) {
                        if base.is_none() {
                            *base = Some(v);
                        } else {
                            *key = Some(self.to_string(&v));
                        }
                    } else {
                        *func = Some(v);
                    }
                }
                _ => done_args.push(v),
            },
            FrameKind::New {
                phase,
                func,
                done_args,
                result,
                ..
            } => match *phase {
                CallPhase::Callee => *func = Some(v),
                CallPhase::Args => done_args.push(v),
                CallPhase::Invoke => *result = Some(v),
            },
            FrameKind::Assign { target, rhs, rhs_started, .. } => {
                if !target.ready() {
                    target.accept(self, v);
                } else if *rhs_started {
                    *rhs = Some(v);
                }
            }
            FrameKind::Update { target, .. } => {
                target.accept(self, v);
            }
            FrameKind::Binary {
                left_val,
                right_val,
                phase,
                ..
            } => {
                if *phase <= 1 {
                    *left_val = Some(v);
                } else {
                    *right_val = Some(v);
                }
            }
            FrameKind::Logical { left_val, .. } => *left_val = Some(v),
            FrameKind::Unary { value, .. } => *value = Some(v),
            FrameKind::Delete { base, key, property, .. } => {
                if base.is_none() {
                    *base = Some(v);
                } else if property.is_some() {
                    *key = Some(self.to_string(&v));
                }
            }
            FrameKind::Conditional { decided, .. } => *decided = Some(v.to_boolean()),
            FrameKind::Sequence { last, .. } => *last = v,
            // Statement-context frames receive no values.
            _ => {}
        }
    }
}

impl StateFrame {
    /// Visit every value and scope this frame holds. Used by the collector;
    /// the snapshot encoder has its own full codec.
    pub fn trace(&self, visit: &mut dyn FnMut(&Value), visit_scope: &mut dyn FnMut(ScopeId)) {
        fn opt(v: &Option<Value>, visit: &mut dyn FnMut(&Value)) {
            if let Some(v) = v {
                visit(v);
            }
        }
        fn obj(r: &Option<ObjRef>, visit: &mut dyn FnMut(&Value)) {
            if let Some(r) = r {
                visit(&Value::Object(*r));
            }
        }
        visit_scope(self.scope);
        match &self.kind {
            FrameKind::ExprStmt { value, .. }
            | FrameKind::VarDecl { value, .. }
            | FrameKind::Return { value, .. }
            | FrameKind::Throw { value, .. }
            | FrameKind::Unary { value, .. } => opt(value, visit),
            FrameKind::Switch {
                disc, test_value, ..
            } => {
                opt(disc, visit);
                opt(test_value, visit);
            }
            FrameKind::Try { saved, .. } => {
                if let SavedCompletion::Abrupt(Abrupt::Return(v) | Abrupt::Throw(v)) = saved {
                    visit(v);
                }
            }
            FrameKind::ObjectLit { object, .. } => obj(object, visit),
            FrameKind::ArrayLit { array, .. } => obj(array, visit),
            FrameKind::ForIn { object, .. } => obj(object, visit),
            FrameKind::Member { base, .. } | FrameKind::Delete { base, .. } => opt(base, visit),
            FrameKind::Call {
                this_val,
                base,
                func,
                done_args,
                ..
            } => {
                visit(this_val);
                opt(base, visit);
                opt(func, visit);
                for v in done_args {
                    visit(v);
                }
            }
            FrameKind::New {
                func,
                done_args,
                this_obj,
                result,
                ..
            } => {
                opt(func, visit);
                for v in done_args {
                    visit(v);
                }
                obj(this_obj, visit);
                opt(result, visit);
            }
            FrameKind::Assign {
                target, old, rhs, ..
            } => {
                target.trace(visit);
                opt(old, visit);
                opt(rhs, visit);
            }
            FrameKind::Update { target, .. } => target.trace(visit),
            FrameKind::Binary {
                left_val,
                right_val,
                ..
            } => {
                opt(left_val, visit);
                opt(right_val, visit);
            }
            FrameKind::Logical { left_val, .. } => opt(left_val, visit),
            FrameKind::Sequence { last, .. } => visit(last),
            _ => {}
        }
    }
}

/// Result of dispatching a call.
pub(crate) enum CallDispatch {
    Value(Value),
    Frame(StateFrame),
}

/// ToInt32.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let m = n.trunc();
    let m = m.rem_euclid(4294967296.0);
    if m >= 2147483648.0 {
        (m - 4294967296.0) as i32
    } else {
        m as i32
    }
}

/// ToUint32.
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    n.trunc().rem_euclid(4294967296.0) as u32
}
