//! Deterministic formula evaluation.
//!
//! Emulates the host spreadsheet's recalculation closely enough to check
//! generated documents: empty cells read as zero, `CHOOSE` and `IF` only
//! evaluate the selected branch, and every cell is computed at most once.

use std::collections::{HashMap, HashSet};

use tally_core::CellAddress;

use crate::expr::{BinOp, Expr, Func, expand_range};

/// What a cell holds, as seen by the evaluator.
#[derive(Debug, Clone, Copy)]
pub enum LookupValue<'a> {
    Empty,
    Number(f64),
    Text(&'a str),
    Formula(&'a Expr),
}

/// Anything that can answer "what is in this cell".
pub trait CellLookup {
    fn lookup(&self, addr: &CellAddress) -> LookupValue<'_>;
}

/// Errors that can occur while evaluating a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("circular reference through {0}")]
    Cycle(CellAddress),

    #[error("division by zero in {0}")]
    DivisionByZero(CellAddress),

    #[error("non-numeric value at {0}")]
    NotNumeric(CellAddress),

    #[error("CHOOSE index {index} outside 1..={options} in {cell}")]
    ChooseOutOfRange {
        cell: CellAddress,
        index: f64,
        options: usize,
    },

    #[error("invalid argument to {func} in {cell}")]
    InvalidArgument { func: &'static str, cell: CellAddress },
}

/// Memoising evaluator over one [`CellLookup`].
pub struct Evaluator<'a, L: CellLookup + ?Sized> {
    lookup: &'a L,
    cache: HashMap<CellAddress, f64>,
    in_progress: HashSet<CellAddress>,
}

impl<'a, L: CellLookup + ?Sized> Evaluator<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Numeric value of a cell. Empty cells are zero.
    pub fn value(&mut self, addr: &CellAddress) -> Result<f64, EvalError> {
        if let Some(v) = self.cache.get(addr) {
            return Ok(*v);
        }
        let v = match self.lookup.lookup(addr) {
            LookupValue::Empty => 0.0,
            LookupValue::Number(n) => n,
            LookupValue::Text(_) => return Err(EvalError::NotNumeric(addr.clone())),
            LookupValue::Formula(expr) => {
                if !self.in_progress.insert(addr.clone()) {
                    return Err(EvalError::Cycle(addr.clone()));
                }
                let result = self.eval(expr, addr);
                self.in_progress.remove(addr);
                result?
            }
        };
        self.cache.insert(addr.clone(), v);
        Ok(v)
    }

    /// Evaluate a free-standing expression as if it were hosted at `host`.
    pub fn eval(&mut self, expr: &Expr, host: &CellAddress) -> Result<f64, EvalError> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Ref(a) => self.value(a),
            Expr::Range(from, to) => {
                // A bare range in scalar position behaves like a single-cell range.
                if from == to {
                    self.value(from)
                } else {
                    Err(EvalError::InvalidArgument {
                        func: "range",
                        cell: host.clone(),
                    })
                }
            }
            Expr::Neg(inner) => Ok(-self.eval(inner, host)?),
            Expr::Binary(op, l, r) => {
                let a = self.eval(l, host)?;
                let b = self.eval(r, host)?;
                self.binary(*op, a, b, host)
            }
            Expr::Call(func, args) => self.call(*func, args, host),
        }
    }

    fn binary(&self, op: BinOp, a: f64, b: f64, host: &CellAddress) -> Result<f64, EvalError> {
        let truth = |c: bool| if c { 1.0 } else { 0.0 };
        let v = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => {
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero(host.clone()));
                }
                a / b
            }
            BinOp::Pow => {
                let v = a.powf(b);
                if !v.is_finite() {
                    return Err(EvalError::InvalidArgument {
                        func: "^",
                        cell: host.clone(),
                    });
                }
                v
            }
            BinOp::Gt => truth(a > b),
            BinOp::Ge => truth(a >= b),
            BinOp::Lt => truth(a < b),
            BinOp::Le => truth(a <= b),
            BinOp::Eq => truth(a == b),
        };
        Ok(v)
    }

    fn call(&mut self, func: Func, args: &[Expr], host: &CellAddress) -> Result<f64, EvalError> {
        let invalid = || EvalError::InvalidArgument {
            func: func.name(),
            cell: host.clone(),
        };
        match func {
            Func::Exp => {
                let [x] = args else { return Err(invalid()) };
                Ok(self.eval(x, host)?.exp())
            }
            Func::Ln => {
                let [x] = args else { return Err(invalid()) };
                let x = self.eval(x, host)?;
                if x <= 0.0 {
                    return Err(invalid());
                }
                Ok(x.ln())
            }
            Func::Choose => {
                let Some((index, options)) = args.split_first() else {
                    return Err(invalid());
                };
                let raw = self.eval(index, host)?;
                let idx = raw.trunc();
                if idx < 1.0 || idx as usize > options.len() {
                    return Err(EvalError::ChooseOutOfRange {
                        cell: host.clone(),
                        index: raw,
                        options: options.len(),
                    });
                }
                self.eval(&options[idx as usize - 1], host)
            }
            Func::If => {
                let [cond, then, otherwise] = args else {
                    return Err(invalid());
                };
                if self.eval(cond, host)? != 0.0 {
                    self.eval(then, host)
                } else {
                    self.eval(otherwise, host)
                }
            }
            Func::Sum | Func::Min | Func::Max | Func::Average => {
                let values = self.aggregate_args(args, host)?;
                match func {
                    Func::Sum => Ok(values.iter().sum()),
                    Func::Min => Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
                        .map(|v| if values.is_empty() { 0.0 } else { v }),
                    Func::Max => Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                        .map(|v| if values.is_empty() { 0.0 } else { v }),
                    _ => {
                        if values.is_empty() {
                            return Err(EvalError::DivisionByZero(host.clone()));
                        }
                        Ok(values.iter().sum::<f64>() / values.len() as f64)
                    }
                }
            }
        }
    }

    /// Flattens aggregate arguments. Text and empty cells inside ranges are
    /// skipped, as the host spreadsheet does.
    fn aggregate_args(&mut self, args: &[Expr], host: &CellAddress) -> Result<Vec<f64>, EvalError> {
        let mut values = Vec::new();
        for arg in args {
            if let Expr::Range(from, to) = arg {
                for addr in expand_range(from, to) {
                    match self.lookup.lookup(&addr) {
                        LookupValue::Empty | LookupValue::Text(_) => {}
                        _ => values.push(self.value(&addr)?),
                    }
                }
            } else {
                values.push(self.eval(arg, host)?);
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DocumentId;

    /// A sparse in-memory sheet for tests.
    #[derive(Default)]
    struct Cells(HashMap<CellAddress, Cell>);

    enum Cell {
        Num(f64),
        Text(String),
        Formula(Expr),
    }

    impl CellLookup for Cells {
        fn lookup(&self, addr: &CellAddress) -> LookupValue<'_> {
            match self.0.get(addr) {
                None => LookupValue::Empty,
                Some(Cell::Num(n)) => LookupValue::Number(*n),
                Some(Cell::Text(s)) => LookupValue::Text(s),
                Some(Cell::Formula(e)) => LookupValue::Formula(e),
            }
        }
    }

    fn at(a1: &str) -> CellAddress {
        let (row, col) = tally_core::parse_a1(a1).unwrap();
        CellAddress::new(DocumentId::Integrated, "S", row, col)
    }

    impl Cells {
        fn num(mut self, a1: &str, n: f64) -> Self {
            self.0.insert(at(a1), Cell::Num(n));
            self
        }
        fn text(mut self, a1: &str, s: &str) -> Self {
            self.0.insert(at(a1), Cell::Text(s.into()));
            self
        }
        fn formula(mut self, a1: &str, e: Expr) -> Self {
            self.0.insert(at(a1), Cell::Formula(e));
            self
        }
    }

    fn r(a1: &str) -> Expr {
        Expr::cell(&at(a1))
    }

    #[test]
    fn exponential_decay_halves_at_1460() {
        let cells = Cells::default()
            .num("B1", 1000.0)
            .num("B2", -0.000475)
            .num("B3", 1460.0)
            .formula("C1", r("B1") * Expr::exp(r("B2") * r("B3")));
        let v = Evaluator::new(&cells).value(&at("C1")).unwrap();
        assert!((v / 1000.0 - 0.5).abs() < 0.001, "got {v}");
    }

    #[test]
    fn chained_cells_and_empty_as_zero() {
        let cells = Cells::default()
            .num("A1", 2.0)
            .formula("A2", r("A1") + r("Z9"))
            .formula("A3", r("A2") * 3.0)
            .formula("A4", Expr::sum(vec![Expr::range(&at("A1"), &at("A3"))]));
        let mut ev = Evaluator::new(&cells);
        assert_eq!(ev.value(&at("A3")).unwrap(), 6.0);
        assert_eq!(ev.value(&at("A4")).unwrap(), 10.0);
    }

    #[test]
    fn choose_selects_only_one_branch() {
        let cells = Cells::default()
            .num("B1", 2.0)
            .num("C1", 10.0)
            .num("D1", 20.0)
            .formula("E1", r("C1") / 0.0)
            .formula("F1", Expr::choose(r("B1"), vec![r("E1"), r("D1"), r("C1")]));
        assert_eq!(Evaluator::new(&cells).value(&at("F1")).unwrap(), 20.0);
    }

    #[test]
    fn choose_out_of_range() {
        let cells = Cells::default()
            .num("B1", 4.0)
            .formula("F1", Expr::choose(r("B1"), vec![Expr::num(1.0), Expr::num(2.0)]));
        let err = Evaluator::new(&cells).value(&at("F1")).unwrap_err();
        assert!(matches!(err, EvalError::ChooseOutOfRange { options: 2, .. }));
    }

    #[test]
    fn cycles_are_reported() {
        let cells = Cells::default()
            .formula("A1", r("A2") + 1.0)
            .formula("A2", r("A1") + 1.0);
        let err = Evaluator::new(&cells).value(&at("A1")).unwrap_err();
        assert!(matches!(err, EvalError::Cycle(_)));
    }

    #[test]
    fn text_operand_is_an_error_but_skipped_in_ranges() {
        let cells = Cells::default()
            .text("A1", "label")
            .num("A2", 5.0)
            .formula("B1", r("A1") + 1.0)
            .formula("B2", Expr::sum(vec![Expr::range(&at("A1"), &at("A2"))]));
        let mut ev = Evaluator::new(&cells);
        assert_eq!(ev.value(&at("B1")), Err(EvalError::NotNumeric(at("A1"))));
        assert_eq!(ev.value(&at("B2")).unwrap(), 5.0);
    }

    #[test]
    fn if_and_comparisons() {
        let cells = Cells::default()
            .num("A1", 0.0)
            .num("A2", 200.0)
            .formula(
                "B1",
                Expr::if_then(r("A1").gt(0.0), r("A2") / r("A1"), Expr::num(0.0)),
            )
            .formula("B2", Expr::ln(r("A1")));
        let mut ev = Evaluator::new(&cells);
        assert_eq!(ev.value(&at("B1")).unwrap(), 0.0);
        assert!(matches!(
            ev.value(&at("B2")),
            Err(EvalError::InvalidArgument { func: "LN", .. })
        ));
    }
}
