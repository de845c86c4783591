//! Scenario toggles: one selector cell switching between laid-out columns.
//!
//! Every scenario column is a complete formula-driven trajectory. The
//! "active" value of a row is a single `CHOOSE(selector, col_1, .., col_n)`,
//! so switching scenarios is left entirely to the spreadsheet's own
//! recalculation.

use tally_core::{CellAddress, LogicalKey};
use tally_formula::Expr;

use crate::block::ScenarioGroup;
use crate::builder::LayoutCtx;
use crate::error::{EngineError, Result};

pub const PRICE_SCENARIOS: [&str; 3] = ["Bear", "Base", "Bull"];
pub const HOST_SCENARIOS: [&str; 3] = ["Low", "Base", "High"];

/// 1-based index of `value` among `options`.
///
/// Accepts a scenario name (case-insensitive) or its index.
pub fn scenario_index(group: &str, options: &[&str], value: &str) -> Result<usize> {
    let value = value.trim();
    let by_name = options.iter().position(|o| o.eq_ignore_ascii_case(value)).map(|i| i + 1);
    let by_index = value.parse::<usize>().ok().filter(|i| (1..=options.len()).contains(i));
    by_name.or(by_index).ok_or_else(|| EngineError::InvalidScenario {
        group: group.to_string(),
        value: value.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
    })
}

/// A placed selector cell.
#[derive(Debug, Clone)]
pub struct ScenarioToggle {
    selector: CellAddress,
    options: Vec<String>,
}

impl ScenarioToggle {
    /// Places the selector (label, cell, option legend) at `row` and
    /// registers the scenario group with the document.
    pub fn place(
        ctx: &mut LayoutCtx<'_>,
        key: LogicalKey,
        group: &str,
        options: &[&str],
        default: &str,
        sheet: &str,
        row: u32,
    ) -> Result<Self> {
        let default = scenario_index(group, options, default)?;
        ctx.label(sheet, row, 0, format!("Scenario selector (1-{})", options.len()))?;
        let selector = ctx.place_selector(key, sheet, row, 1, default)?;
        let legend = options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}={o}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        ctx.label(sheet, row, 2, legend)?;
        ctx.add_scenario_group(ScenarioGroup {
            name: group.to_string(),
            selector: selector.clone(),
            options: options.iter().map(|o| o.to_string()).collect(),
            default,
        });
        Ok(Self {
            selector,
            options: options.iter().map(|o| o.to_string()).collect(),
        })
    }

    pub fn selector(&self) -> &CellAddress {
        &self.selector
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The active-value formula over one row's scenario columns, given in
    /// option order.
    pub fn pick(&self, columns: Vec<Expr>) -> Expr {
        debug_assert_eq!(columns.len(), self.options.len());
        Expr::choose(Expr::cell(&self.selector), columns)
    }
}
