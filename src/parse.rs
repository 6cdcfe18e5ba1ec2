//! Parser for the Python subset py-mend mutates.
//!
//! Line-oriented: each logical line is lexed on its own, and blocks are
//! recovered from indentation. Anything outside the subset is a hard parse
//! error, which the session treats as fatal (no candidates can be generated
//! from a tree we do not have).

use anyhow::{Result, bail};

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, ExprKind, Module, Stmt, StmtKind, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Int(i64),
    Str(String),
    Sym(&'static str),
}

#[derive(Debug)]
struct Line {
    number: u32,
    indent: usize,
    toks: Vec<Tok>,
}

/// Parse one source unit into a [`Module`].
pub fn parse_module(source: &str) -> Result<Module> {
    let lines = lex_lines(source)?;
    if let Some(first) = lines.first() {
        if first.indent != 0 {
            bail!("line {}: unexpected indentation", first.number);
        }
    }

    let mut parser = Parser { lines, pos: 0 };
    let body = parser.parse_block(0)?;

    if let Some(line) = parser.current() {
        bail!("line {}: unexpected indentation", line.number);
    }

    Ok(Module { body })
}

fn lex_lines(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let number = (idx + 1) as u32;

        let mut indent = 0usize;
        let mut rest = raw;
        loop {
            if let Some(r) = rest.strip_prefix(' ') {
                indent += 1;
                rest = r;
            } else if rest.starts_with('\t') {
                bail!("line {number}: tab indentation is not supported");
            } else {
                break;
            }
        }

        let toks = lex_tokens(rest, number)?;
        if toks.is_empty() {
            continue; // blank or comment-only line
        }

        lines.push(Line {
            number,
            indent,
            toks,
        });
    }

    Ok(lines)
}

fn lex_tokens(text: &str, number: u32) -> Result<Vec<Tok>> {
    let mut toks = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c == ' ' {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && {
                let b = bytes[i] as char;
                b.is_ascii_alphanumeric() || b == '_'
            } {
                i += 1;
            }
            toks.push(Tok::Name(text[start..i].to_string()));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            let value: i64 = text[start..i]
                .parse()
                .map_err(|_| anyhow::anyhow!("line {number}: integer literal out of range"))?;
            toks.push(Tok::Int(value));
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            i += 1;
            let mut value = String::new();
            loop {
                if i >= bytes.len() {
                    bail!("line {number}: unterminated string literal");
                }
                let ch = bytes[i] as char;
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    if i >= bytes.len() {
                        bail!("line {number}: unterminated string escape");
                    }
                    let esc = bytes[i] as char;
                    i += 1;
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        other => bail!("line {number}: unsupported string escape \\{other}"),
                    }
                } else {
                    value.push(ch);
                }
            }
            toks.push(Tok::Str(value));
            continue;
        }

        // Two-character symbols take priority over their one-character prefixes.
        let two = if i + 1 < bytes.len() {
            &text[i..i + 2]
        } else {
            ""
        };
        let sym2 = match two {
            "==" => Some("=="),
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            "//" => Some("//"),
            _ => None,
        };
        if let Some(sym) = sym2 {
            toks.push(Tok::Sym(sym));
            i += 2;
            continue;
        }

        let sym1 = match c {
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            ',' => ",",
            ':' => ":",
            '.' => ".",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            other => bail!("line {number}: unsupported character {other:?}"),
        };
        toks.push(Tok::Sym(sym1));
        i += 1;
    }

    Ok(toks)
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> Option<&Line> {
        self.lines.get(self.pos)
    }

    /// Parse consecutive statements at exactly the indent of the first line
    /// at or below `min_indent`, stopping on a dedent.
    fn parse_block(&mut self, min_indent: usize) -> Result<Vec<Stmt>> {
        let block_indent = match self.current() {
            Some(line) if line.indent >= min_indent => line.indent,
            _ => return Ok(Vec::new()),
        };

        let mut body = Vec::new();
        while let Some(line) = self.current() {
            if line.indent < block_indent {
                break;
            }
            if line.indent > block_indent {
                bail!("line {}: unexpected indentation", line.number);
            }
            body.push(self.parse_stmt()?);
        }

        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let line = self.current().expect("parse_stmt called at end of input");
        let number = line.number;
        let indent = line.indent;

        let head = match line.toks.first() {
            Some(Tok::Name(n)) => n.as_str(),
            _ => "",
        };

        match head {
            "def" => self.parse_def(indent),
            "if" => self.parse_if(indent),
            "while" => self.parse_while(indent),
            "for" => self.parse_for(indent),
            "elif" | "else" => bail!("line {number}: {head:?} without a matching if"),
            _ => {
                let line = &self.lines[self.pos];
                let mut cur = Cursor::new(&line.toks, line.number);
                let stmt = cur.parse_simple_stmt()?;
                cur.expect_end()?;
                self.pos += 1;
                Ok(stmt)
            }
        }
    }

    /// Parse the suite after a header's `:`, either inline on the same line
    /// or as an indented block on the following lines.
    fn parse_suite(&mut self, header_indent: usize, inline: Vec<Tok>, number: u32) -> Result<Vec<Stmt>> {
        self.pos += 1;

        if !inline.is_empty() {
            let mut cur = Cursor::new(&inline, number);
            let stmt = cur.parse_simple_stmt()?;
            cur.expect_end()?;
            return Ok(vec![stmt]);
        }

        let body = self.parse_block(header_indent + 1)?;
        if body.is_empty() {
            bail!("line {number}: expected an indented block");
        }
        Ok(body)
    }

    fn parse_def(&mut self, indent: usize) -> Result<Stmt> {
        let line = &self.lines[self.pos];
        let number = line.number;
        let mut cur = Cursor::new(&line.toks, number);

        cur.expect_name("def")?;
        let name = cur.take_name()?;
        cur.expect_sym("(")?;

        let mut params = Vec::new();
        if !cur.at_sym(")") {
            loop {
                params.push(cur.take_name()?);
                if cur.at_sym(",") {
                    cur.advance();
                } else {
                    break;
                }
            }
        }
        cur.expect_sym(")")?;
        cur.expect_sym(":")?;
        let inline = cur.remaining();

        let body = self.parse_suite(indent, inline, number)?;

        Ok(Stmt {
            id: None,
            line: number,
            kind: StmtKind::FunctionDef { name, params, body },
        })
    }

    fn parse_if(&mut self, indent: usize) -> Result<Stmt> {
        let line = &self.lines[self.pos];
        let number = line.number;
        let mut cur = Cursor::new(&line.toks, number);

        cur.advance(); // `if` or `elif`
        let test = cur.parse_expr()?;
        cur.expect_sym(":")?;
        let inline = cur.remaining();

        let body = self.parse_suite(indent, inline, number)?;
        let orelse = self.parse_orelse(indent)?;

        Ok(Stmt {
            id: None,
            line: number,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn parse_orelse(&mut self, indent: usize) -> Result<Vec<Stmt>> {
        let Some(line) = self.current() else {
            return Ok(Vec::new());
        };
        if line.indent != indent {
            return Ok(Vec::new());
        }

        match line.toks.first() {
            Some(Tok::Name(n)) if n == "elif" => {
                // An elif chain is a nested `if` in the orelse slot.
                let nested = self.parse_if(indent)?;
                Ok(vec![nested])
            }
            Some(Tok::Name(n)) if n == "else" => {
                let number = line.number;
                let mut cur = Cursor::new(&line.toks, number);
                cur.expect_name("else")?;
                cur.expect_sym(":")?;
                let inline = cur.remaining();
                self.parse_suite(indent, inline, number)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn parse_while(&mut self, indent: usize) -> Result<Stmt> {
        let line = &self.lines[self.pos];
        let number = line.number;
        let mut cur = Cursor::new(&line.toks, number);

        cur.expect_name("while")?;
        let test = cur.parse_expr()?;
        cur.expect_sym(":")?;
        let inline = cur.remaining();

        let body = self.parse_suite(indent, inline, number)?;

        Ok(Stmt {
            id: None,
            line: number,
            kind: StmtKind::While { test, body },
        })
    }

    fn parse_for(&mut self, indent: usize) -> Result<Stmt> {
        let line = &self.lines[self.pos];
        let number = line.number;
        let mut cur = Cursor::new(&line.toks, number);

        cur.expect_name("for")?;
        let target = cur.take_name()?;
        cur.expect_name("in")?;
        let iter = cur.parse_expr()?;
        cur.expect_sym(":")?;
        let inline = cur.remaining();

        let body = self.parse_suite(indent, inline, number)?;

        Ok(Stmt {
            id: None,
            line: number,
            kind: StmtKind::For { target, iter, body },
        })
    }
}

/// Token cursor over one logical line.
struct Cursor<'a> {
    toks: &'a [Tok],
    i: usize,
    line: u32,
}

impl<'a> Cursor<'a> {
    fn new(toks: &'a [Tok], line: u32) -> Self {
        Self { toks, i: 0, line }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.i)
    }

    fn advance(&mut self) {
        self.i += 1;
    }

    fn remaining(&self) -> Vec<Tok> {
        self.toks[self.i..].to_vec()
    }

    fn at_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(Tok::Sym(s)) if *s == sym)
    }

    fn at_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Tok::Name(n)) if n == name)
    }

    fn expect_sym(&mut self, sym: &str) -> Result<()> {
        if self.at_sym(sym) {
            self.advance();
            Ok(())
        } else {
            bail!("line {}: expected {sym:?}, found {:?}", self.line, self.peek())
        }
    }

    fn expect_name(&mut self, name: &str) -> Result<()> {
        if self.at_name(name) {
            self.advance();
            Ok(())
        } else {
            bail!("line {}: expected {name:?}, found {:?}", self.line, self.peek())
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => bail!("line {}: unexpected trailing {tok:?}", self.line),
        }
    }

    fn take_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok::Name(n)) => {
                let name = n.clone();
                self.advance();
                Ok(name)
            }
            other => bail!("line {}: expected a name, found {other:?}", self.line),
        }
    }

    fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: None,
            line: self.line,
            kind,
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let line = self.line;

        if self.at_name("pass") {
            self.advance();
            return Ok(Stmt {
                id: None,
                line,
                kind: StmtKind::Pass,
            });
        }

        if self.at_name("return") {
            self.advance();
            let value = if self.peek().is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt {
                id: None,
                line,
                kind: StmtKind::Return { value },
            });
        }

        let first = self.parse_expr()?;
        if self.at_sym("=") {
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Stmt {
                id: None,
                line,
                kind: StmtKind::Assign {
                    target: first,
                    value,
                },
            });
        }

        Ok(Stmt {
            id: None,
            line,
            kind: StmtKind::ExprStmt { value: first },
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let first = self.parse_and()?;
        if !self.at_name("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at_name("or") {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(self.expr(ExprKind::BoolOp {
            op: BoolOp::Or,
            values,
        }))
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let first = self.parse_not()?;
        if !self.at_name("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at_name("and") {
            self.advance();
            values.push(self.parse_not()?);
        }
        Ok(self.expr(ExprKind::BoolOp {
            op: BoolOp::And,
            values,
        }))
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.at_name("not") {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(self.expr(ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            }));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_arith()?;

        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.peek_cmp_op() {
            self.advance();
            ops.push(op);
            comparators.push(self.parse_arith()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(self.expr(ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators,
        }))
    }

    fn peek_cmp_op(&self) -> Option<CmpOp> {
        let Some(Tok::Sym(s)) = self.peek() else {
            return None;
        };
        match *s {
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::NotEq),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::LtE),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::GtE),
            _ => None,
        }
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.at_sym("+") {
                BinOp::Add
            } else if self.at_sym("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.expr(ExprKind::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.at_sym("*") {
                BinOp::Mul
            } else if self.at_sym("//") {
                BinOp::FloorDiv
            } else if self.at_sym("/") {
                BinOp::Div
            } else if self.at_sym("%") {
                BinOp::Mod
            } else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.expr(ExprKind::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.at_sym("-") {
            self.advance();
            let operand = self.parse_unary()?;
            // Fold minus over an integer literal, so negative small constants
            // are a single node (the literal tweaker depends on this).
            if let ExprKind::Int(v) = operand.kind {
                return Ok(self.expr(ExprKind::Int(-v)));
            }
            return Ok(self.expr(ExprKind::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut value = self.parse_atom()?;
        loop {
            if self.at_sym("(") {
                self.advance();
                let mut args = Vec::new();
                if !self.at_sym(")") {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.at_sym(",") {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_sym(")")?;
                value = self.expr(ExprKind::Call {
                    func: Box::new(value),
                    args,
                });
            } else if self.at_sym("[") {
                self.advance();
                let index = self.parse_expr()?;
                self.expect_sym("]")?;
                value = self.expr(ExprKind::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                });
            } else if self.at_sym(".") {
                self.advance();
                let attr = self.take_name()?;
                value = self.expr(ExprKind::Attribute {
                    value: Box::new(value),
                    attr,
                });
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Tok::Int(v)) => {
                self.advance();
                Ok(self.expr(ExprKind::Int(v)))
            }
            Some(Tok::Str(s)) => {
                self.advance();
                Ok(self.expr(ExprKind::Str(s)))
            }
            Some(Tok::Name(n)) => {
                self.advance();
                let kind = match n.as_str() {
                    "True" => ExprKind::Bool(true),
                    "False" => ExprKind::Bool(false),
                    "None" => ExprKind::NoneLit,
                    _ => ExprKind::Name(n),
                };
                Ok(self.expr(kind))
            }
            Some(Tok::Sym("(")) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Some(Tok::Sym("[")) => {
                self.advance();
                let mut items = Vec::new();
                if !self.at_sym("]") {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.at_sym(",") {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_sym("]")?;
                Ok(self.expr(ExprKind::List(items)))
            }
            other => bail!(
                "line {}: expected an expression, found {other:?}",
                self.line
            ),
        }
    }
}
