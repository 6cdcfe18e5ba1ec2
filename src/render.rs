//! Render a tree back to Python source.
//!
//! Output is normalized (4-space indent, one statement per line, minimal
//! parentheses), the way `ast.unparse` normalizes. Candidates are always
//! regenerated from the tree, never spliced into the original text.

use crate::ast::{BinOp, BoolOp, Expr, ExprKind, Module, Stmt, StmtKind, UnaryOp};

// Precedence levels, lowest binds loosest.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_CMP: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_UNARY: u8 = 7;
const PREC_POSTFIX: u8 = 8;
const PREC_ATOM: u8 = 9;

/// Render a whole module; output ends with a newline.
pub fn render_module(module: &Module) -> String {
    let mut out = String::new();
    render_stmts(&mut out, &module.body, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn render_stmts(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        render_stmt(out, stmt, depth);
    }
}

fn render_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    match &stmt.kind {
        StmtKind::FunctionDef { name, params, body } => {
            indent(out, depth);
            out.push_str("def ");
            out.push_str(name);
            out.push('(');
            out.push_str(&params.join(", "));
            out.push_str("):\n");
            render_stmts(out, body, depth + 1);
        }
        StmtKind::If { .. } => render_if(out, stmt, depth, "if"),
        StmtKind::While { test, body } => {
            indent(out, depth);
            out.push_str("while ");
            out.push_str(&render_expr(test, 0));
            out.push_str(":\n");
            render_stmts(out, body, depth + 1);
        }
        StmtKind::For { target, iter, body } => {
            indent(out, depth);
            out.push_str("for ");
            out.push_str(target);
            out.push_str(" in ");
            out.push_str(&render_expr(iter, 0));
            out.push_str(":\n");
            render_stmts(out, body, depth + 1);
        }
        StmtKind::Return { value } => {
            indent(out, depth);
            match value {
                Some(v) => {
                    out.push_str("return ");
                    out.push_str(&render_expr(v, 0));
                }
                None => out.push_str("return"),
            }
            out.push('\n');
        }
        StmtKind::Assign { target, value } => {
            indent(out, depth);
            out.push_str(&render_expr(target, 0));
            out.push_str(" = ");
            out.push_str(&render_expr(value, 0));
            out.push('\n');
        }
        StmtKind::ExprStmt { value } => {
            indent(out, depth);
            out.push_str(&render_expr(value, 0));
            out.push('\n');
        }
        StmtKind::Pass => {
            indent(out, depth);
            out.push_str("pass\n");
        }
    }
}

fn render_if(out: &mut String, stmt: &Stmt, depth: usize, keyword: &str) {
    let StmtKind::If { test, body, orelse } = &stmt.kind else {
        unreachable!("render_if called on a non-if statement");
    };

    indent(out, depth);
    out.push_str(keyword);
    out.push(' ');
    out.push_str(&render_expr(test, 0));
    out.push_str(":\n");
    render_stmts(out, body, depth + 1);

    if orelse.is_empty() {
        return;
    }

    // A sole nested `if` in the orelse slot renders as `elif`.
    if orelse.len() == 1 {
        if let StmtKind::If { .. } = orelse[0].kind {
            render_if(out, &orelse[0], depth, "elif");
            return;
        }
    }

    indent(out, depth);
    out.push_str("else:\n");
    render_stmts(out, orelse, depth + 1);
}

fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::BoolOp { op: BoolOp::Or, .. } => PREC_OR,
        ExprKind::BoolOp {
            op: BoolOp::And, ..
        } => PREC_AND,
        ExprKind::UnaryOp {
            op: UnaryOp::Not, ..
        } => PREC_NOT,
        ExprKind::Compare { .. } => PREC_CMP,
        ExprKind::BinOp { op, .. } => match op {
            BinOp::Add | BinOp::Sub => PREC_ADD,
            BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => PREC_MUL,
        },
        ExprKind::UnaryOp {
            op: UnaryOp::Neg, ..
        } => PREC_UNARY,
        ExprKind::Call { .. } | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {
            PREC_POSTFIX
        }
        _ => PREC_ATOM,
    }
}

/// Render one expression, parenthesizing when its precedence is below the
/// context's minimum.
fn render_expr(expr: &Expr, min_prec: u8) -> String {
    let own = precedence(expr);
    let body = match &expr.kind {
        ExprKind::Name(n) => n.clone(),
        ExprKind::Int(v) => v.to_string(),
        ExprKind::Str(s) => render_str(s),
        ExprKind::Bool(true) => "True".to_string(),
        ExprKind::Bool(false) => "False".to_string(),
        ExprKind::NoneLit => "None".to_string(),
        ExprKind::List(items) => {
            let parts: Vec<String> = items.iter().map(|e| render_expr(e, 0)).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::BinOp { op, left, right } => {
            format!(
                "{} {op} {}",
                render_expr(left, own),
                render_expr(right, own + 1)
            )
        }
        ExprKind::UnaryOp { op, operand } => match op {
            UnaryOp::Not => format!("not {}", render_expr(operand, PREC_NOT)),
            UnaryOp::Neg => format!("-{}", render_expr(operand, PREC_UNARY)),
        },
        ExprKind::BoolOp { op, values } => {
            let joiner = match op {
                BoolOp::And => " and ",
                BoolOp::Or => " or ",
            };
            let parts: Vec<String> = values.iter().map(|e| render_expr(e, own)).collect();
            parts.join(joiner)
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut s = render_expr(left, PREC_CMP + 1);
            for (op, cmp) in ops.iter().zip(comparators) {
                s.push_str(&format!(" {op} {}", render_expr(cmp, PREC_CMP + 1)));
            }
            s
        }
        ExprKind::Call { func, args } => {
            let parts: Vec<String> = args.iter().map(|e| render_expr(e, 0)).collect();
            format!("{}({})", render_expr(func, PREC_POSTFIX), parts.join(", "))
        }
        ExprKind::Attribute { value, attr } => {
            format!("{}.{attr}", render_expr(value, PREC_POSTFIX))
        }
        ExprKind::Subscript { value, index } => {
            format!(
                "{}[{}]",
                render_expr(value, PREC_POSTFIX),
                render_expr(index, 0)
            )
        }
    };

    if own < min_prec {
        format!("({body})")
    } else {
        body
    }
}

fn render_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
