//! Abstract syntax tree for the world language.
//!
//! The parser is a host collaborator; it hands the interpreter a tree in this
//! ESTree-shaped schema. Subtrees that execution state can point into are
//! `Rc`-shared so suspended frames hold cheap references, and everything
//! derives serde so snapshots can embed AST records.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A complete program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Rc<[Statement]>,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<FunctionDeclaration>),

    Block(BlockStatement),
    If(IfStatement),
    Switch(SwitchStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    Try(TryStatement),

    Return(ReturnStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Throw(ThrowStatement),

    Expression(ExpressionStatement),
    Empty,
    Labeled(LabeledStatement),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Rc<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStatement {
    pub body: Rc<[Statement]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub declarations: Rc<[VariableDeclarator]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclarator {
    pub id: String,
    pub init: Option<Rc<Expression>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub id: String,
    pub params: Rc<[String]>,
    pub body: BlockStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStatement {
    pub test: Rc<Expression>,
    pub consequent: Rc<Statement>,
    pub alternate: Option<Rc<Statement>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Rc<Expression>,
    pub cases: Rc<[SwitchCase]>,
}

/// `test` is `None` for the `default:` case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub test: Option<Rc<Expression>>,
    pub consequent: Rc<[Statement]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Rc<Expression>>,
    pub update: Option<Rc<Expression>>,
    pub body: Rc<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForInStatement {
    pub left: ForInLeft,
    pub right: Rc<Expression>,
    pub body: Rc<Statement>,
}

/// `var x in o` declares (hoisted); `x in o` assigns an existing binding or
/// member target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInLeft {
    Variable(String),
    Target(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStatement {
    pub test: Rc<Expression>,
    pub body: Rc<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoWhileStatement {
    pub body: Rc<Statement>,
    pub test: Rc<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: String,
    pub body: BlockStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub argument: Option<Rc<Expression>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakStatement {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueStatement {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub argument: Rc<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledStatement {
    pub label: String,
    pub body: Rc<Statement>,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    This,

    Array(ArrayExpression),
    Object(ObjectExpression),
    Function(Rc<FunctionExpression>),

    Unary(UnaryExpression),
    Update(UpdateExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Assignment(AssignmentExpression),
    Conditional(ConditionalExpression),
    Sequence(SequenceExpression),

    Member(MemberExpression),
    Call(CallExpression),
    New(NewExpression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Regex literals build a RegExp pseudo-object at evaluation time.
    RegExp { pattern: String, flags: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayExpression {
    /// `None` marks an elision; it reads back as `undefined`.
    pub elements: Rc<[Option<Rc<Expression>>]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectExpression {
    pub properties: Rc<[ObjectProperty]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: String,
    pub value: Rc<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionExpression {
    pub id: Option<String>,
    pub params: Rc<[String]>,
    pub body: BlockStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Rc<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub argument: Rc<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    ShiftRightUnsignedAssign,
}

impl AssignmentOp {
    /// The binary operator a compound assignment applies, `None` for plain `=`.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::BitAndAssign => Some(BinaryOp::BitAnd),
            AssignmentOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignmentOp::BitXorAssign => Some(BinaryOp::BitXor),
            AssignmentOp::ShiftLeftAssign => Some(BinaryOp::ShiftLeft),
            AssignmentOp::ShiftRightAssign => Some(BinaryOp::ShiftRight),
            AssignmentOp::ShiftRightUnsignedAssign => Some(BinaryOp::ShiftRightUnsigned),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub test: Rc<Expression>,
    pub consequent: Rc<Expression>,
    pub alternate: Rc<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceExpression {
    pub expressions: Rc<[Rc<Expression>]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberExpression {
    pub object: Rc<Expression>,
    pub property: MemberProperty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberProperty {
    /// `obj.name`
    Static(String),
    /// `obj[expr]`
    Computed(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Rc<Expression>,
    pub arguments: Rc<[Rc<Expression>]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpression {
    pub callee: Rc<Expression>,
    pub arguments: Rc<[Rc<Expression>]>,
}

pub mod build {
    //! Convenience constructors for assembling programs in host code and
    //! tests, where a parser is not wired in.

    use super::*;

    pub fn program(body: Vec<Statement>) -> Program {
        Program { body: body.into() }
    }

    pub fn block(body: Vec<Statement>) -> BlockStatement {
        BlockStatement { body: body.into() }
    }

    pub fn expr_stmt(expression: Expression) -> Statement {
        Statement::Expression(ExpressionStatement {
            expression: Rc::new(expression),
        })
    }

    pub fn var(name: &str, init: Option<Expression>) -> Statement {
        Statement::VariableDeclaration(VariableDeclaration {
            declarations: vec![VariableDeclarator {
                id: name.to_string(),
                init: init.map(Rc::new),
            }]
            .into(),
        })
    }

    pub fn func_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
        Statement::FunctionDeclaration(Rc::new(FunctionDeclaration {
            id: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: block(body),
        }))
    }

    pub fn func_expr(name: Option<&str>, params: &[&str], body: Vec<Statement>) -> Expression {
        Expression::Function(Rc::new(FunctionExpression {
            id: name.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            body: block(body),
        }))
    }

    pub fn ident(name: &str) -> Expression {
        Expression::Identifier(Identifier {
            name: name.to_string(),
        })
    }

    pub fn number(n: f64) -> Expression {
        Expression::Literal(Literal::Number(n))
    }

    pub fn string(s: &str) -> Expression {
        Expression::Literal(Literal::String(s.to_string()))
    }

    pub fn boolean(b: bool) -> Expression {
        Expression::Literal(Literal::Boolean(b))
    }

    pub fn null() -> Expression {
        Expression::Literal(Literal::Null)
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary(BinaryExpression {
            operator: op,
            left: Rc::new(left),
            right: Rc::new(right),
        })
    }

    pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Expression {
        Expression::Logical(LogicalExpression {
            operator: op,
            left: Rc::new(left),
            right: Rc::new(right),
        })
    }

    pub fn unary(op: UnaryOp, argument: Expression) -> Expression {
        Expression::Unary(UnaryExpression {
            operator: op,
            argument: Rc::new(argument),
        })
    }

    pub fn update(op: UpdateOp, prefix: bool, argument: Expression) -> Expression {
        Expression::Update(UpdateExpression {
            operator: op,
            prefix,
            argument: Rc::new(argument),
        })
    }

    pub fn assign(left: Expression, right: Expression) -> Expression {
        assign_op(AssignmentOp::Assign, left, right)
    }

    pub fn assign_op(op: AssignmentOp, left: Expression, right: Expression) -> Expression {
        Expression::Assignment(AssignmentExpression {
            operator: op,
            left: Rc::new(left),
            right: Rc::new(right),
        })
    }

    pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
        Expression::Conditional(ConditionalExpression {
            test: Rc::new(test),
            consequent: Rc::new(consequent),
            alternate: Rc::new(alternate),
        })
    }

    pub fn member(object: Expression, name: &str) -> Expression {
        Expression::Member(MemberExpression {
            object: Rc::new(object),
            property: MemberProperty::Static(name.to_string()),
        })
    }

    pub fn index(object: Expression, key: Expression) -> Expression {
        Expression::Member(MemberExpression {
            object: Rc::new(object),
            property: MemberProperty::Computed(Rc::new(key)),
        })
    }

    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
        Expression::Call(CallExpression {
            callee: Rc::new(callee),
            arguments: arguments.into_iter().map(Rc::new).collect(),
        })
    }

    pub fn new_expr(callee: Expression, arguments: Vec<Expression>) -> Expression {
        Expression::New(NewExpression {
            callee: Rc::new(callee),
            arguments: arguments.into_iter().map(Rc::new).collect(),
        })
    }

    pub fn array(elements: Vec<Expression>) -> Expression {
        Expression::Array(ArrayExpression {
            elements: elements
                .into_iter()
                .map(|e| Some(Rc::new(e)))
                .collect(),
        })
    }

    pub fn object(props: Vec<(&str, Expression)>) -> Expression {
        Expression::Object(ObjectExpression {
            properties: props
                .into_iter()
                .map(|(k, v)| ObjectProperty {
                    key: k.to_string(),
                    value: Rc::new(v),
                })
                .collect(),
        })
    }

    pub fn if_stmt(
        test: Expression,
        consequent: Vec<Statement>,
        alternate: Option<Vec<Statement>>,
    ) -> Statement {
        Statement::If(IfStatement {
            test: Rc::new(test),
            consequent: Rc::new(Statement::Block(block(consequent))),
            alternate: alternate.map(|body| Rc::new(Statement::Block(block(body)))),
        })
    }

    pub fn while_stmt(test: Expression, body: Vec<Statement>) -> Statement {
        Statement::While(WhileStatement {
            test: Rc::new(test),
            body: Rc::new(Statement::Block(block(body))),
        })
    }

    pub fn for_stmt(
        init: Option<Statement>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Vec<Statement>,
    ) -> Statement {
        let init = init.map(|s| match s {
            Statement::VariableDeclaration(decl) => ForInit::Variable(decl),
            Statement::Expression(e) => ForInit::Expression(e.expression),
            other => panic!("unsupported for-init statement: {other:?}"),
        });
        Statement::For(ForStatement {
            init,
            test: test.map(Rc::new),
            update: update.map(Rc::new),
            body: Rc::new(Statement::Block(block(body))),
        })
    }

    pub fn ret(argument: Option<Expression>) -> Statement {
        Statement::Return(ReturnStatement {
            argument: argument.map(Rc::new),
        })
    }

    pub fn throw(argument: Expression) -> Statement {
        Statement::Throw(ThrowStatement {
            argument: Rc::new(argument),
        })
    }

    pub fn try_stmt(
        block_body: Vec<Statement>,
        handler: Option<(&str, Vec<Statement>)>,
        finalizer: Option<Vec<Statement>>,
    ) -> Statement {
        Statement::Try(TryStatement {
            block: block(block_body),
            handler: handler.map(|(param, body)| CatchClause {
                param: param.to_string(),
                body: block(body),
            }),
            finalizer: finalizer.map(block),
        })
    }
}
