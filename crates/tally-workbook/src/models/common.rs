//! Layout pieces shared by the model sheets.
//!
//! Every model sheet has the same skeleton:
//!
//! ```text
//! row 0   title
//! row 1   subtitle
//! row 3   input header, then one row per parameter (and the selector)
//!         key figures (rows reserved here, filled after the table)
//!         table header, then one row per period
//! ```

use tally_core::{CellAddress, LogicalKey};
use tally_formula::Expr;

use crate::builder::LayoutCtx;
use crate::error::{EngineError, Result};

pub const LABEL_COL: u32 = 0;
pub const VALUE_COL: u32 = 1;
pub const UNIT_COL: u32 = 2;
pub const CONFIDENCE_COL: u32 = 3;
pub const SOURCE_COL: u32 = 4;

const INPUT_HEADER_ROW: u32 = 3;

/// Title and subtitle rows.
pub fn heading(ctx: &mut LayoutCtx<'_>, sheet: &str, title: &str, subtitle: &str) -> Result<()> {
    ctx.label(sheet, 0, LABEL_COL, title)?;
    ctx.label(sheet, 1, LABEL_COL, subtitle)
}

/// The input area of a model sheet.
///
/// A parameter another builder already surfaced is referenced where it
/// lives and takes no row here.
pub struct InputBlock {
    sheet: String,
    next_row: u32,
}

impl InputBlock {
    pub fn start(ctx: &mut LayoutCtx<'_>, sheet: &str) -> Result<Self> {
        ctx.labels(
            sheet,
            INPUT_HEADER_ROW,
            LABEL_COL,
            &["Inputs", "Value", "Unit", "Confidence", "Source"],
        )?;
        Ok(Self {
            sheet: sheet.to_string(),
            next_row: INPUT_HEADER_ROW + 1,
        })
    }

    /// Reference to a parameter's value cell, placing its row if needed.
    pub fn param(&mut self, ctx: &mut LayoutCtx<'_>, key: &str) -> Result<Expr> {
        if let Some(addr) = ctx.placed(&LogicalKey::param(key))? {
            return Ok(Expr::cell(&addr));
        }
        let param = ctx.parameter(key)?;
        let row = self.next_row;
        let sheet = self.sheet.clone();
        ctx.label(&sheet, row, LABEL_COL, param.description.as_str())?;
        let addr = ctx.place_parameter(key, &sheet, row, VALUE_COL)?;
        if !param.unit.is_empty() {
            ctx.label(&sheet, row, UNIT_COL, param.unit.as_str())?;
        }
        ctx.label(&sheet, row, CONFIDENCE_COL, param.confidence.as_str())?;
        if !param.source.is_empty() {
            ctx.label(&sheet, row, SOURCE_COL, param.source.as_str())?;
        }
        self.next_row += 1;
        Ok(Expr::cell(&addr))
    }

    /// Claims the next row for something other than a parameter.
    pub fn reserve(&mut self) -> u32 {
        let row = self.next_row;
        self.next_row += 1;
        row
    }

    /// First row after the block.
    pub fn end_row(&self) -> u32 {
        self.next_row
    }
}

/// Key figures shown above the table but allocated once the table exists.
pub struct KpiSection {
    sheet: String,
    first_row: u32,
    capacity: u32,
    used: u32,
}

impl KpiSection {
    pub fn reserve(ctx: &mut LayoutCtx<'_>, sheet: &str, header_row: u32, capacity: u32) -> Result<Self> {
        ctx.labels(sheet, header_row, LABEL_COL, &["Key figures", "Value", "Unit"])?;
        Ok(Self {
            sheet: sheet.to_string(),
            first_row: header_row + 1,
            capacity,
            used: 0,
        })
    }

    pub fn add(
        &mut self,
        ctx: &mut LayoutCtx<'_>,
        key: &str,
        label: &str,
        unit: &str,
        expr: Expr,
    ) -> Result<CellAddress> {
        if self.used >= self.capacity {
            return Err(EngineError::SectionOverflow {
                sheet: self.sheet.clone(),
                section: "key figures".into(),
                capacity: self.capacity,
                key: key.to_string(),
            });
        }
        let row = self.first_row + self.used;
        let sheet = self.sheet.clone();
        ctx.label(&sheet, row, LABEL_COL, label)?;
        let addr = ctx.place_formula(LogicalKey::quantity(key), &sheet, row, VALUE_COL, expr)?;
        if !unit.is_empty() {
            ctx.label(&sheet, row, UNIT_COL, unit)?;
        }
        self.used += 1;
        Ok(addr)
    }

    /// First row after the reserved area.
    pub fn end_row(&self) -> u32 {
        self.first_row + self.capacity
    }
}

/// Writes a table header and returns the first data row.
pub fn table_header(ctx: &mut LayoutCtx<'_>, sheet: &str, row: u32, columns: &[&str]) -> Result<u32> {
    ctx.labels(sheet, row, LABEL_COL, columns)?;
    Ok(row + 1)
}

/// Drivers of fee revenue, placed once per sheet.
///
/// Fee revenue in year `y` is demand (M tokens/day) times the fee per
/// million tokens, times days per year. Every sheet that needs revenue
/// derives it from here.
pub struct RevenueDrivers {
    demand0: Expr,
    demand_growth: Expr,
    fee0: Expr,
    fee_decline: Expr,
    days: Expr,
}

impl RevenueDrivers {
    pub fn place(ctx: &mut LayoutCtx<'_>, inputs: &mut InputBlock) -> Result<Self> {
        Ok(Self {
            demand0: inputs.param(ctx, "inference_demand_initial")?,
            demand_growth: inputs.param(ctx, "inference_demand_growth")?,
            fee0: inputs.param(ctx, "fee_per_million_tokens")?,
            fee_decline: inputs.param(ctx, "fee_decline_rate")?,
            days: inputs.param(ctx, "days_per_year")?,
        })
    }

    pub fn demand(&self, year: Expr) -> Expr {
        compound(&self.demand0, &self.demand_growth, year)
    }

    pub fn fee(&self, year: Expr) -> Expr {
        decline(&self.fee0, &self.fee_decline, year)
    }

    pub fn daily(demand: Expr, fee: Expr) -> Expr {
        demand * fee
    }

    pub fn annual(&self, daily: Expr) -> Expr {
        daily * self.days.clone()
    }

    /// Annual revenue for `year` as one expression.
    pub fn annual_revenue(&self, year: Expr) -> Expr {
        self.annual(Self::daily(self.demand(year.clone()), self.fee(year)))
    }
}

/// `base * (1 + rate) ^ exponent`
pub fn compound(base: &Expr, rate: &Expr, exponent: Expr) -> Expr {
    base.clone() * (Expr::num(1.0) + rate.clone()).pow(exponent)
}

/// `base * (1 - rate) ^ exponent`
pub fn decline(base: &Expr, rate: &Expr, exponent: Expr) -> Expr {
    base.clone() * (Expr::num(1.0) - rate.clone()).pow(exponent)
}

/// Tokens released from the emission pool between two epochs:
/// `pool * (EXP(rate * from) - EXP(rate * to))`.
pub fn released(pool: &Expr, rate: &Expr, from: Expr, to: Expr) -> Expr {
    pool.clone() * (Expr::exp(rate.clone() * from) - Expr::exp(rate.clone() * to))
}
