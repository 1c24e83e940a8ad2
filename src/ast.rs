use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::object::Object;
use crate::position::Position;
use crate::token::Token;

/// An expression node: a kind plus the span it covers in the source.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos_start: Position,
    pub pos_end: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos_start: Position, pos_end: Position) -> Self {
        Self {
            kind,
            pos_start,
            pos_end,
        }
    }
}

/// How a `Retrieve`/`Set` addresses its holder: `holder.name` or
/// `holder[index]`.
#[derive(Debug)]
pub enum Accessor {
    Property(Token),
    Index(Box<Expr>),
}

#[derive(Debug)]
pub enum ExprKind {
    Literal {
        value: Object,
    },
    Binary {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },
    Unary {
        op: Token,
        right: Box<Expr>,
    },
    // `depth` is the number of scope hops computed by the resolver;
    // -1 means "global".
    Variable {
        name: Token,
        depth: Cell<i32>,
    },
    Assignment {
        name: Token,
        op: Token,
        value: Box<Expr>,
        depth: Cell<i32>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Increment {
        target: Box<Expr>,
        prefix: bool,
    },
    Decrement {
        target: Box<Expr>,
        prefix: bool,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Retrieve {
        holder: Box<Expr>,
        accessor: Accessor,
    },
    Set {
        holder: Box<Expr>,
        accessor: Accessor,
        op: Token,
        value: Box<Expr>,
    },
    This {
        keyword: Token,
        depth: Cell<i32>,
    },
    Super {
        keyword: Token,
        method: Token,
        depth: Cell<i32>,
    },
    Lambda(Rc<FunctionDecl>),
    List {
        items: Vec<Expr>,
    },
    // A comma-joined expression sequence; evaluates to the last value.
    Pack {
        expressions: Vec<Expr>,
    },
}

/// Shared between `func` declarations, class methods and lambdas. Runtime
/// function values keep an `Rc` to this node.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub defaults: Vec<Expr>,
    pub body: Vec<Rc<Stmt>>,
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos_start: Position,
    pub pos_end: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos_start: Position, pos_end: Position) -> Self {
        Self {
            kind,
            pos_start,
            pos_end,
        }
    }
}

#[derive(Debug)]
pub enum StmtKind {
    Expression {
        expr: Expr,
    },
    VarDecl {
        name: Token,
        initializer: Option<Expr>,
    },
    FuncDecl {
        decl: Rc<FunctionDecl>,
    },
    ClassDecl {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
        superclass: Option<Expr>,
    },
    Block {
        statements: Vec<Rc<Stmt>>,
    },
    If {
        condition: Expr,
        then_branch: Rc<Stmt>,
        else_branch: Option<Rc<Stmt>>,
    },
    While {
        condition: Expr,
        body: Rc<Stmt>,
    },
    For {
        initializer: Option<Rc<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Rc<Stmt>,
    },
    Break {
        keyword: Token,
    },
    Continue {
        keyword: Token,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Import {
        symbols: BTreeMap<Token, Option<Token>>,
        path: Token,
        // Filled by the resolver with the absolute module path.
        resolved: RefCell<Option<String>>,
    },
    // `var a, b, c;` expands to several declarations carried together.
    Pack {
        statements: Vec<Rc<Stmt>>,
    },
    // Placeholder emitted after a parse error so later stages can keep
    // walking the tree.
    Error,
}

pub struct AstPrinter;

impl AstPrinter {
    pub fn stmt_to_string(stmt: &Stmt) -> String {
        match &stmt.kind {
            StmtKind::Expression { expr } => format!("{};", Self::expr_to_string(expr)),
            StmtKind::VarDecl { name, initializer } => match initializer {
                Some(init) => format!("var {} = {};", name.lexeme, Self::expr_to_string(init)),
                None => format!("var {};", name.lexeme),
            },
            StmtKind::FuncDecl { decl } => format!("(func {})", Self::decl_name(decl)),
            StmtKind::ClassDecl {
                name,
                methods,
                superclass,
            } => {
                let parent = match superclass {
                    Some(s) => format!(" > {}", Self::expr_to_string(s)),
                    None => String::new(),
                };
                let methods = methods
                    .iter()
                    .map(|m| Self::decl_name(m))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("(class {}{} [{}])", name.lexeme, parent, methods)
            }
            StmtKind::Block { statements } => {
                let inner = statements
                    .iter()
                    .map(|s| Self::stmt_to_string(s))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{{ {} }}", inner)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = format!(
                    "(if {} {}",
                    Self::expr_to_string(condition),
                    Self::stmt_to_string(then_branch)
                );
                if let Some(else_branch) = else_branch {
                    out.push_str(&format!(" else {}", Self::stmt_to_string(else_branch)));
                }
                out.push(')');
                out
            }
            StmtKind::While { condition, body } => format!(
                "(while {} {})",
                Self::expr_to_string(condition),
                Self::stmt_to_string(body)
            ),
            StmtKind::For { body, .. } => format!("(for .. {})", Self::stmt_to_string(body)),
            StmtKind::Break { .. } => "break;".to_owned(),
            StmtKind::Continue { .. } => "continue;".to_owned(),
            StmtKind::Return { value, .. } => match value {
                Some(value) => format!("return {};", Self::expr_to_string(value)),
                None => "return;".to_owned(),
            },
            StmtKind::Import { symbols, path, .. } => {
                let names = symbols
                    .keys()
                    .map(|t| t.lexeme.clone())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("(import {{ {} }} from \"{}\")", names, path.lexeme)
            }
            StmtKind::Pack { statements } => {
                let inner = statements
                    .iter()
                    .map(|s| Self::stmt_to_string(s))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("(pack {})", inner)
            }
            StmtKind::Error => "(error)".to_owned(),
        }
    }

    pub fn expr_to_string(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal { value } => format!("{value}"),
            ExprKind::Binary { left, op, right } => format!(
                "({} {} {})",
                op.lexeme,
                Self::expr_to_string(left),
                Self::expr_to_string(right)
            ),
            ExprKind::Unary { op, right } => {
                format!("({} {})", op.lexeme, Self::expr_to_string(right))
            }
            ExprKind::Variable { name, .. } => name.lexeme.clone(),
            ExprKind::Assignment { name, op, value, .. } => format!(
                "({} {} {})",
                op.lexeme,
                name.lexeme,
                Self::expr_to_string(value)
            ),
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => format!(
                "(?: {} {} {})",
                Self::expr_to_string(condition),
                Self::expr_to_string(then_branch),
                Self::expr_to_string(else_branch)
            ),
            ExprKind::Or { left, right } => format!(
                "(or {} {})",
                Self::expr_to_string(left),
                Self::expr_to_string(right)
            ),
            ExprKind::And { left, right } => format!(
                "(and {} {})",
                Self::expr_to_string(left),
                Self::expr_to_string(right)
            ),
            ExprKind::Increment { target, prefix } => {
                if *prefix {
                    format!("(++ {})", Self::expr_to_string(target))
                } else {
                    format!("({} ++)", Self::expr_to_string(target))
                }
            }
            ExprKind::Decrement { target, prefix } => {
                if *prefix {
                    format!("(-- {})", Self::expr_to_string(target))
                } else {
                    format!("({} --)", Self::expr_to_string(target))
                }
            }
            ExprKind::Call { callee, arguments } => {
                let args = arguments
                    .iter()
                    .map(Self::expr_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("(call {} [{}])", Self::expr_to_string(callee), args)
            }
            ExprKind::Retrieve { holder, accessor } => match accessor {
                Accessor::Property(name) => {
                    format!("{}.{}", Self::expr_to_string(holder), name.lexeme)
                }
                Accessor::Index(index) => format!(
                    "{}[{}]",
                    Self::expr_to_string(holder),
                    Self::expr_to_string(index)
                ),
            },
            ExprKind::Set {
                holder,
                accessor,
                op,
                value,
            } => {
                let target = match accessor {
                    Accessor::Property(name) => {
                        format!("{}.{}", Self::expr_to_string(holder), name.lexeme)
                    }
                    Accessor::Index(index) => format!(
                        "{}[{}]",
                        Self::expr_to_string(holder),
                        Self::expr_to_string(index)
                    ),
                };
                format!("({} {} {})", op.lexeme, target, Self::expr_to_string(value))
            }
            ExprKind::This { .. } => "this".to_owned(),
            ExprKind::Super { method, .. } => format!("super.{}", method.lexeme),
            ExprKind::Lambda(decl) => format!("(lambda/{})", decl.params.len()),
            ExprKind::List { items } => {
                let items = items
                    .iter()
                    .map(Self::expr_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{}]", items)
            }
            ExprKind::Pack { expressions } => {
                let inner = expressions
                    .iter()
                    .map(Self::expr_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("(, {})", inner)
            }
        }
    }

    fn decl_name(decl: &FunctionDecl) -> String {
        decl.name
            .as_ref()
            .map(|t| t.lexeme.clone())
            .unwrap_or_else(|| "anonymous".to_owned())
    }
}
