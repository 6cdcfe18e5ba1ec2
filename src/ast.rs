use std::fmt;

/// Stable identifier for one node of a [`Module`] tree.
///
/// Ids are assigned by [`annotate`] via a fixed depth-first pre-order walk.
/// Cloning a tree preserves assigned ids, so an id picked on the original
/// tree addresses the structurally corresponding node on any clone.
pub type NodeId = u32;

/// One parsed Python source unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// A statement with its source line and optional node id.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: Option<NodeId>,
    /// 1-based line in the original source, used for human descriptions.
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        /// `elif` chains are represented as a single nested `If` here.
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Return {
        value: Option<Expr>,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    ExprStmt {
        value: Expr,
    },
    Pass,
}

/// An expression with its source line and optional node id.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: Option<NodeId>,
    pub line: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Int(i64),
    Str(String),
    Bool(bool),
    NoneLit,
    List(Vec<Expr>),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// A possibly chained comparison, `left ops[0] comparators[0] ops[1] ...`.
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
        };
        f.write_str(s)
    }
}

/// Shared borrow of one tree node during a walk.
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

/// Mutable borrow of one tree node during a walk.
pub enum NodeMut<'a> {
    Stmt(&'a mut Stmt),
    Expr(&'a mut Expr),
}

/// Visit every node of the tree in depth-first pre-order.
pub fn for_each_node<'a>(module: &'a Module, f: &mut dyn FnMut(Node<'a>)) {
    for stmt in &module.body {
        walk_stmt(stmt, f);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, f: &mut dyn FnMut(Node<'a>)) {
    f(Node::Stmt(stmt));
    match &stmt.kind {
        StmtKind::FunctionDef { body, .. } => {
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::If { test, body, orelse } => {
            walk_expr(test, f);
            for s in body {
                walk_stmt(s, f);
            }
            for s in orelse {
                walk_stmt(s, f);
            }
        }
        StmtKind::While { test, body } => {
            walk_expr(test, f);
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::For { iter, body, .. } => {
            walk_expr(iter, f);
            for s in body {
                walk_stmt(s, f);
            }
        }
        StmtKind::Return { value } => {
            if let Some(v) = value {
                walk_expr(v, f);
            }
        }
        StmtKind::Assign { target, value } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        StmtKind::ExprStmt { value } => walk_expr(value, f),
        StmtKind::Pass => {}
    }
}

fn walk_expr<'a>(expr: &'a Expr, f: &mut dyn FnMut(Node<'a>)) {
    f(Node::Expr(expr));
    match &expr.kind {
        ExprKind::Name(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::NoneLit => {}
        ExprKind::List(items) => {
            for e in items {
                walk_expr(e, f);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr(operand, f),
        ExprKind::BoolOp { values, .. } => {
            for e in values {
                walk_expr(e, f);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr(left, f);
            for e in comparators {
                walk_expr(e, f);
            }
        }
        ExprKind::Call { func, args } => {
            walk_expr(func, f);
            for e in args {
                walk_expr(e, f);
            }
        }
        ExprKind::Attribute { value, .. } => walk_expr(value, f),
        ExprKind::Subscript { value, index } => {
            walk_expr(value, f);
            walk_expr(index, f);
        }
    }
}

/// Visit every node mutably, in the same order as [`for_each_node`].
pub fn for_each_node_mut(module: &mut Module, f: &mut dyn FnMut(NodeMut<'_>)) {
    for stmt in &mut module.body {
        walk_stmt_mut(stmt, f);
    }
}

fn walk_stmt_mut(stmt: &mut Stmt, f: &mut dyn FnMut(NodeMut<'_>)) {
    f(NodeMut::Stmt(stmt));
    match &mut stmt.kind {
        StmtKind::FunctionDef { body, .. } => {
            for s in body {
                walk_stmt_mut(s, f);
            }
        }
        StmtKind::If { test, body, orelse } => {
            walk_expr_mut(test, f);
            for s in body {
                walk_stmt_mut(s, f);
            }
            for s in orelse {
                walk_stmt_mut(s, f);
            }
        }
        StmtKind::While { test, body } => {
            walk_expr_mut(test, f);
            for s in body {
                walk_stmt_mut(s, f);
            }
        }
        StmtKind::For { iter, body, .. } => {
            walk_expr_mut(iter, f);
            for s in body {
                walk_stmt_mut(s, f);
            }
        }
        StmtKind::Return { value } => {
            if let Some(v) = value {
                walk_expr_mut(v, f);
            }
        }
        StmtKind::Assign { target, value } => {
            walk_expr_mut(target, f);
            walk_expr_mut(value, f);
        }
        StmtKind::ExprStmt { value } => walk_expr_mut(value, f),
        StmtKind::Pass => {}
    }
}

fn walk_expr_mut(expr: &mut Expr, f: &mut dyn FnMut(NodeMut<'_>)) {
    f(NodeMut::Expr(expr));
    match &mut expr.kind {
        ExprKind::Name(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::NoneLit => {}
        ExprKind::List(items) => {
            for e in items {
                walk_expr_mut(e, f);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr_mut(operand, f),
        ExprKind::BoolOp { values, .. } => {
            for e in values {
                walk_expr_mut(e, f);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr_mut(left, f);
            for e in comparators {
                walk_expr_mut(e, f);
            }
        }
        ExprKind::Call { func, args } => {
            walk_expr_mut(func, f);
            for e in args {
                walk_expr_mut(e, f);
            }
        }
        ExprKind::Attribute { value, .. } => walk_expr_mut(value, f),
        ExprKind::Subscript { value, index } => {
            walk_expr_mut(value, f);
            walk_expr_mut(index, f);
        }
    }
}

/// Assign a [`NodeId`] to every node of the tree, in walk order.
///
/// Clones made after annotation carry the same ids, which is the whole
/// inter-tree correspondence mechanism: select a node here, then find it
/// again on a private clone before mutating.
pub fn annotate(module: &mut Module) {
    let mut next: NodeId = 0;
    for_each_node_mut(module, &mut |node| {
        let slot = match node {
            NodeMut::Stmt(s) => &mut s.id,
            NodeMut::Expr(e) => &mut e.id,
        };
        *slot = Some(next);
        next += 1;
    });
}

/// Remove all node ids so they cannot influence rendered output.
pub fn strip_ids(module: &mut Module) {
    for_each_node_mut(module, &mut |node| match node {
        NodeMut::Stmt(s) => s.id = None,
        NodeMut::Expr(e) => e.id = None,
    });
}

/// Source line of the node with the given id, or `None` if the id is absent.
pub fn node_line(module: &Module, id: NodeId) -> Option<u32> {
    let mut found = None;
    for_each_node(module, &mut |node| {
        let (node_id, line) = match node {
            Node::Stmt(s) => (s.id, s.line),
            Node::Expr(e) => (e.id, e.line),
        };
        if found.is_none() && node_id == Some(id) {
            found = Some(line);
        }
    });
    found
}
