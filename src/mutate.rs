//! The mutation operator catalog.
//!
//! Each operator scans the annotated original tree once for eligible nodes,
//! then edits a private clone located by node id. An `apply` returning
//! `false` means "no candidate from this node" and is never an error.

use crate::ast::{
    BinOp, CmpOp, Expr, ExprKind, Module, Node, NodeId, NodeMut, Stmt, StmtKind, UnaryOp,
    for_each_node, for_each_node_mut,
};

/// Inclusive magnitude bound for integer literals the tweaker may touch.
pub const SMALL_INT_BOUND: i64 = 3;

/// The closed set of mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutator {
    ArithmeticOp,
    CompareOp,
    IfNegation,
    SmallInt,
    StmtDuplicate,
    StmtDelete,
    StmtSwap,
}

/// All operators in their fixed catalog order.
pub fn default_catalog() -> Vec<Mutator> {
    vec![
        Mutator::ArithmeticOp,
        Mutator::CompareOp,
        Mutator::IfNegation,
        Mutator::SmallInt,
        Mutator::StmtDuplicate,
        Mutator::StmtDelete,
        Mutator::StmtSwap,
    ]
}

/// Fixed alternatives per arithmetic operator; the first entry is the one
/// applied, the rest document the compatibility table.
fn arith_alternatives(op: BinOp) -> &'static [BinOp] {
    match op {
        BinOp::Add => &[BinOp::Sub],
        BinOp::Sub => &[BinOp::Add],
        BinOp::Mul => &[BinOp::FloorDiv, BinOp::Div],
        BinOp::Div => &[BinOp::FloorDiv, BinOp::Mul],
        BinOp::FloorDiv => &[BinOp::Div, BinOp::Mul],
        BinOp::Mod => &[BinOp::FloorDiv, BinOp::Mul],
    }
}

/// Fixed alternatives per comparison operator.
fn cmp_alternatives(op: CmpOp) -> &'static [CmpOp] {
    match op {
        CmpOp::Gt => &[CmpOp::GtE, CmpOp::Lt, CmpOp::LtE],
        CmpOp::Lt => &[CmpOp::LtE, CmpOp::Gt, CmpOp::GtE],
        CmpOp::GtE => &[CmpOp::Gt, CmpOp::LtE],
        CmpOp::LtE => &[CmpOp::Lt, CmpOp::GtE],
        CmpOp::Eq => &[CmpOp::NotEq],
        CmpOp::NotEq => &[CmpOp::Eq],
    }
}

fn small_int_eligible(v: i64) -> bool {
    (-SMALL_INT_BOUND..=SMALL_INT_BOUND).contains(&v)
}

impl Mutator {
    /// Short, stable operator name used in candidate descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            Mutator::ArithmeticOp => "arithmetic_op",
            Mutator::CompareOp => "compare_op",
            Mutator::IfNegation => "if_negation",
            Mutator::SmallInt => "small_int",
            Mutator::StmtDuplicate => "stmt_duplicate",
            Mutator::StmtDelete => "stmt_delete",
            Mutator::StmtSwap => "stmt_swap",
        }
    }

    /// Ids of all nodes this operator can edit, in a fixed traversal order.
    pub fn find_nodes(&self, module: &Module) -> Vec<NodeId> {
        match self {
            Mutator::ArithmeticOp => collect_exprs(module, |e| {
                matches!(e.kind, ExprKind::BinOp { .. })
            }),
            Mutator::CompareOp => collect_exprs(module, |e| {
                matches!(e.kind, ExprKind::Compare { .. })
            }),
            Mutator::IfNegation => {
                let mut ids = Vec::new();
                for_each_node(module, &mut |node| {
                    if let Node::Stmt(s) = node {
                        if matches!(s.kind, StmtKind::If { .. }) {
                            if let Some(id) = s.id {
                                ids.push(id);
                            }
                        }
                    }
                });
                ids
            }
            Mutator::SmallInt => collect_exprs(module, |e| {
                matches!(e.kind, ExprKind::Int(v) if small_int_eligible(v))
            }),
            Mutator::StmtDuplicate | Mutator::StmtDelete | Mutator::StmtSwap => {
                let mut ids = Vec::new();
                collect_stmt_list_members(&module.body, &mut ids);
                ids
            }
        }
    }

    /// Perform exactly one localized edit at the node with the given id.
    ///
    /// Returns `false` when the id is absent, the node is no longer eligible,
    /// or the edit is structurally a no-op (e.g. swapping the last statement
    /// of its list).
    pub fn apply(&self, module: &mut Module, target: NodeId) -> bool {
        match self {
            Mutator::ArithmeticOp => edit_expr(module, target, |e| {
                if let ExprKind::BinOp { op, .. } = &mut e.kind {
                    *op = arith_alternatives(*op)[0];
                    true
                } else {
                    false
                }
            }),
            Mutator::CompareOp => edit_expr(module, target, |e| {
                if let ExprKind::Compare { ops, .. } = &mut e.kind {
                    // Flip only the first comparator of a chain.
                    match ops.first_mut() {
                        Some(op) => {
                            *op = cmp_alternatives(*op)[0];
                            true
                        }
                        None => false,
                    }
                } else {
                    false
                }
            }),
            Mutator::IfNegation => {
                let mut applied = false;
                for_each_node_mut(module, &mut |node| {
                    if let NodeMut::Stmt(s) = node {
                        if s.id == Some(target) && !applied {
                            if let StmtKind::If { test, .. } = &mut s.kind {
                                let line = test.line;
                                let placeholder = Expr {
                                    id: None,
                                    line,
                                    kind: ExprKind::NoneLit,
                                };
                                let guard = std::mem::replace(test, placeholder);
                                *test = Expr {
                                    id: None,
                                    line,
                                    kind: ExprKind::UnaryOp {
                                        op: UnaryOp::Not,
                                        operand: Box::new(guard),
                                    },
                                };
                                applied = true;
                            }
                        }
                    }
                });
                applied
            }
            Mutator::SmallInt => edit_expr(module, target, |e| {
                if let ExprKind::Int(v) = &mut e.kind {
                    if !small_int_eligible(*v) {
                        return false;
                    }
                    *v = if *v >= 0 { *v + 1 } else { *v - 1 };
                    true
                } else {
                    false
                }
            }),
            Mutator::StmtDuplicate => {
                edit_stmt_list(module, target, |list, idx, _owner| {
                    let copy = list[idx].clone();
                    list.insert(idx, copy);
                    true
                })
            }
            Mutator::StmtDelete => edit_stmt_list(module, target, |list, idx, owner| {
                let removed = list.remove(idx);
                if list.is_empty() && owner == ListOwner::Block {
                    // A block must keep at least one statement to stay renderable.
                    list.push(Stmt {
                        id: None,
                        line: removed.line,
                        kind: StmtKind::Pass,
                    });
                }
                true
            }),
            Mutator::StmtSwap => edit_stmt_list(module, target, |list, idx, _owner| {
                if idx + 1 >= list.len() {
                    return false;
                }
                list.swap(idx, idx + 1);
                true
            }),
        }
    }
}

fn collect_exprs(module: &Module, pred: impl Fn(&Expr) -> bool) -> Vec<NodeId> {
    let mut ids = Vec::new();
    for_each_node(module, &mut |node| {
        if let Node::Expr(e) = node {
            if pred(e) {
                if let Some(id) = e.id {
                    ids.push(id);
                }
            }
        }
    });
    ids
}

fn edit_expr(module: &mut Module, target: NodeId, edit: impl Fn(&mut Expr) -> bool) -> bool {
    let mut applied = false;
    for_each_node_mut(module, &mut |node| {
        if let NodeMut::Expr(e) = node {
            if e.id == Some(target) && !applied {
                applied = edit(e);
            }
        }
    });
    applied
}

/// Owner of a statement list; only the module itself may end up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListOwner {
    Module,
    Block,
}

/// Collect ids of statements as members of their enclosing lists, each list
/// in full before descending into nested blocks.
fn collect_stmt_list_members(body: &[Stmt], ids: &mut Vec<NodeId>) {
    ids.extend(body.iter().filter_map(|s| s.id));
    for stmt in body {
        match &stmt.kind {
            StmtKind::FunctionDef { body, .. }
            | StmtKind::While { body, .. }
            | StmtKind::For { body, .. } => collect_stmt_list_members(body, ids),
            StmtKind::If { body, orelse, .. } => {
                collect_stmt_list_members(body, ids);
                collect_stmt_list_members(orelse, ids);
            }
            _ => {}
        }
    }
}

/// Find the statement list containing the target statement and run the edit
/// with the list, the member index, and the list's owner.
fn edit_stmt_list(
    module: &mut Module,
    target: NodeId,
    edit: impl FnOnce(&mut Vec<Stmt>, usize, ListOwner) -> bool,
) -> bool {
    fn locate<'a>(
        body: &'a mut Vec<Stmt>,
        owner: ListOwner,
        target: NodeId,
    ) -> Option<(&'a mut Vec<Stmt>, usize, ListOwner)> {
        if let Some(idx) = body.iter().position(|s| s.id == Some(target)) {
            return Some((body, idx, owner));
        }
        for stmt in body.iter_mut() {
            let found = match &mut stmt.kind {
                StmtKind::FunctionDef { body, .. }
                | StmtKind::While { body, .. }
                | StmtKind::For { body, .. } => locate(body, ListOwner::Block, target),
                StmtKind::If { body, orelse, .. } => locate(body, ListOwner::Block, target)
                    .or_else(|| locate(orelse, ListOwner::Block, target)),
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    match locate(&mut module.body, ListOwner::Module, target) {
        Some((list, idx, owner)) => edit(list, idx, owner),
        None => false,
    }
}
