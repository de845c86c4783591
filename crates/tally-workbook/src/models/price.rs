//! Token price trajectory under three growth scenarios.

use std::collections::BTreeSet;

use tally_core::{LogicalKey, ModelKind};
use tally_formula::Expr;

use super::common::{InputBlock, KpiSection, compound, heading, table_header};
use crate::builder::{LayoutCtx, ModelBuilder, params};
use crate::error::Result;
use crate::scenario::{PRICE_SCENARIOS, ScenarioToggle};

const PARAMS: [&str; 4] = [
    "token_price_initial",
    "price_growth_bear",
    "price_growth_base",
    "price_growth_bull",
];

const GROWTH: [&str; 3] = ["price_growth_bear", "price_growth_base", "price_growth_bull"];

pub const SELECTOR: &str = "price.scenario";
pub const KPI_YEAR4: &str = "price.kpi.year4";
pub const KPI_TERMINAL: &str = "price.kpi.terminal";

pub fn year(y: u32) -> LogicalKey {
    LogicalKey::row("price.year", y)
}

pub fn active(y: u32) -> LogicalKey {
    LogicalKey::row("price.active", y)
}

pub fn scenario_column(scenario: usize, y: u32) -> LogicalKey {
    LogicalKey::row(&format!("price.{}", PRICE_SCENARIOS[scenario].to_lowercase()), y)
}

const NARRATIVE: &str = "\
Price compounds yearly from the launch price: price(y) = p0 * (1 + g) ^ y, \
with one growth rate per scenario.

All three trajectories are always laid out. The active column picks one of \
them through the scenario selector, so switching scenarios never changes a \
formula, only the selector value.

These are planning scenarios, not forecasts. The bull case doubles the price \
every year and should be read as an upper bound.";

/// Year of the early price figure: year 4, or the horizon when shorter.
pub fn kpi_year(horizon: u32) -> u32 {
    horizon.min(4)
}

/// Lays out bear, base and bull price paths plus the active selection.
#[derive(Debug, Clone)]
pub struct PriceBuilder {
    horizon: u32,
    scenario: String,
}

impl PriceBuilder {
    pub fn new(horizon: u32, scenario: impl Into<String>) -> Self {
        Self {
            horizon,
            scenario: scenario.into(),
        }
    }

    fn kpi_year(&self) -> u32 {
        kpi_year(self.horizon)
    }
}

impl ModelBuilder for PriceBuilder {
    fn name(&self) -> &'static str {
        "price"
    }

    fn sheet_name(&self) -> &str {
        ModelKind::Price.sheet_title()
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = [KPI_YEAR4, KPI_TERMINAL, SELECTOR]
            .into_iter()
            .map(LogicalKey::quantity)
            .collect();
        for y in [0, self.horizon] {
            keys.insert(year(y));
            keys.insert(active(y));
        }
        keys
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        params(&PARAMS)
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        let s = self.sheet_name();
        heading(ctx, s, "Price Trajectory", "Token price per year under each growth scenario")?;

        let mut inputs = InputBlock::start(ctx, s)?;
        let p0 = inputs.param(ctx, "token_price_initial")?;
        let growth = GROWTH
            .iter()
            .map(|k| inputs.param(ctx, k))
            .collect::<Result<Vec<_>>>()?;
        let selector_row = inputs.reserve();
        let toggle = ScenarioToggle::place(
            ctx,
            LogicalKey::quantity(SELECTOR),
            "price",
            &PRICE_SCENARIOS,
            &self.scenario,
            s,
            selector_row,
        )?;

        let mut kpis = KpiSection::reserve(ctx, s, inputs.end_row() + 1, 2)?;
        let first = table_header(
            ctx,
            s,
            kpis.end_row() + 1,
            &["Year", "Bear", "Base", "Bull", "Active"],
        )?;

        for y in 0..=self.horizon {
            let row = first + y;
            let yr = Expr::cell(&ctx.place_constant(year(y), s, row, 0, f64::from(y))?);
            let mut columns = Vec::with_capacity(GROWTH.len());
            for (i, g) in growth.iter().enumerate() {
                let addr = ctx.place_formula(scenario_column(i, y), s, row, 1 + i as u32, compound(&p0, g, yr.clone()))?;
                columns.push(Expr::cell(&addr));
            }
            ctx.place_formula(active(y), s, row, 4, toggle.pick(columns))?;
        }

        let y4 = ctx.reference(&active(self.kpi_year()))?;
        kpis.add(ctx, KPI_YEAR4, &format!("Active price, year {}", self.kpi_year()), "USD", y4)?;
        let terminal = ctx.reference(&active(self.horizon))?;
        kpis.add(ctx, KPI_TERMINAL, &format!("Active price, year {}", self.horizon), "USD", terminal)?;
        Ok(())
    }

    fn narrative(&self) -> &'static str {
        NARRATIVE
    }
}
