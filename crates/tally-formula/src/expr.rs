//! Formula expression tree and its spreadsheet text form.

use std::fmt::Write as _;
use std::ops;

use tally_core::CellAddress;

/// Binary operators, in the spreadsheet's precedence classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Gt | Self::Ge | Self::Lt | Self::Le | Self::Eq => 1,
            Self::Add | Self::Sub => 2,
            Self::Mul | Self::Div => 3,
            Self::Pow => 4,
        }
    }

    /// Whether `a op (b op c)` differs from `(a op b) op c`.
    fn right_needs_parens_on_tie(&self) -> bool {
        !matches!(self, Self::Add | Self::Mul)
    }
}

/// Built-in functions the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Exp,
    Ln,
    Choose,
    Sum,
    Min,
    Max,
    If,
    Average,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exp => "EXP",
            Self::Ln => "LN",
            Self::Choose => "CHOOSE",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::If => "IF",
            Self::Average => "AVERAGE",
        }
    }
}

const PREC_NEG: u8 = 5;
const PREC_ATOM: u8 = 6;

/// A formula expression. Leaves reference cells by concrete address.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Ref(CellAddress),
    /// A rectangular range on one sheet, inclusive.
    Range(CellAddress, CellAddress),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    pub fn num(n: f64) -> Self {
        Self::Number(n)
    }

    pub fn cell(addr: &CellAddress) -> Self {
        Self::Ref(addr.clone())
    }

    pub fn range(from: &CellAddress, to: &CellAddress) -> Self {
        Self::Range(from.clone(), to.clone())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Self {
        Self::binary(BinOp::Pow, self, exponent.into())
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinOp::Gt, self, rhs.into())
    }

    pub fn exp(arg: Expr) -> Self {
        Self::Call(Func::Exp, vec![arg])
    }

    pub fn ln(arg: Expr) -> Self {
        Self::Call(Func::Ln, vec![arg])
    }

    pub fn sum(args: Vec<Expr>) -> Self {
        Self::Call(Func::Sum, args)
    }

    pub fn choose(index: Expr, options: Vec<Expr>) -> Self {
        let mut args = Vec::with_capacity(options.len() + 1);
        args.push(index);
        args.extend(options);
        Self::Call(Func::Choose, args)
    }

    pub fn if_then(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::Call(Func::If, vec![cond, then, otherwise])
    }

    /// Every address this expression reads, with ranges expanded, in
    /// left-to-right order. Duplicates are kept.
    pub fn references(&self) -> Vec<CellAddress> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<CellAddress>) {
        match self {
            Self::Number(_) => {}
            Self::Ref(a) => out.push(a.clone()),
            Self::Range(from, to) => out.extend(expand_range(from, to)),
            Self::Neg(inner) => inner.collect_refs(out),
            Self::Binary(_, l, r) => {
                l.collect_refs(out);
                r.collect_refs(out);
            }
            Self::Call(_, args) => {
                for a in args {
                    a.collect_refs(out);
                }
            }
        }
    }

    /// Formula text (with leading `=`) as written into a cell on `host_sheet`.
    pub fn to_formula(&self, host_sheet: &str) -> String {
        let mut s = String::from("=");
        self.write(&mut s, host_sheet);
        s
    }

    /// Formula text without the leading `=`.
    pub fn render(&self, host_sheet: &str) -> String {
        let mut s = String::new();
        self.write(&mut s, host_sheet);
        s
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary(op, _, _) => op.precedence(),
            Self::Neg(_) => PREC_NEG,
            Self::Number(n) if *n < 0.0 => PREC_NEG,
            _ => PREC_ATOM,
        }
    }

    fn write(&self, out: &mut String, host: &str) {
        match self {
            Self::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Self::Ref(a) => out.push_str(&a.reference_from(host)),
            Self::Range(from, to) => {
                out.push_str(&from.reference_from(host));
                out.push(':');
                out.push_str(&to.a1());
            }
            Self::Neg(inner) => {
                out.push('-');
                write_child(out, host, inner, inner.precedence() < PREC_NEG);
            }
            Self::Binary(op, l, r) => {
                let p = op.precedence();
                write_child(out, host, l, l.precedence() < p);
                out.push_str(op.symbol());
                let tie = r.precedence() == p && op.right_needs_parens_on_tie();
                write_child(out, host, r, r.precedence() < p || tie);
            }
            Self::Call(func, args) => {
                out.push_str(func.name());
                out.push('(');
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    a.write(out, host);
                }
                out.push(')');
            }
        }
    }
}

fn write_child(out: &mut String, host: &str, child: &Expr, parens: bool) {
    if parens {
        out.push('(');
        child.write(out, host);
        out.push(')');
    } else {
        child.write(out, host);
    }
}

/// Expands an inclusive range into its cells, row-major.
pub fn expand_range(from: &CellAddress, to: &CellAddress) -> Vec<CellAddress> {
    let (r0, r1) = (from.row.min(to.row), from.row.max(to.row));
    let (c0, c1) = (from.col.min(to.col), from.col.max(to.col));
    let mut out = Vec::with_capacity(((r1 - r0 + 1) * (c1 - c0 + 1)) as usize);
    for row in r0..=r1 {
        for col in c0..=c1 {
            out.push(CellAddress::new(from.document, from.sheet.clone(), row, col));
        }
    }
    out
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&CellAddress> for Expr {
    fn from(a: &CellAddress) -> Self {
        Self::Ref(a.clone())
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::binary($op, self, rhs.into())
            }
        }
    };
}

impl_binop!(Add, add, BinOp::Add);
impl_binop!(Sub, sub, BinOp::Sub);
impl_binop!(Mul, mul, BinOp::Mul);
impl_binop!(Div, div, BinOp::Div);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}
