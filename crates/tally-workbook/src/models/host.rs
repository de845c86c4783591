//! Profitability of a single GPU host under three utilization scenarios.

use std::collections::BTreeSet;

use tally_core::{LogicalKey, ModelKind};
use tally_formula::Expr;

use super::common::{InputBlock, KpiSection, LABEL_COL, UNIT_COL, VALUE_COL, heading, released, table_header};
use crate::builder::{LayoutCtx, ModelBuilder, params};
use crate::error::Result;
use crate::scenario::{HOST_SCENARIOS, ScenarioToggle};

const PARAMS: [&str; 14] = [
    "emission_pool",
    "emission_decay_rate",
    "epochs_per_year",
    "token_price_initial",
    "host_network_share",
    "host_gpu_count",
    "host_capex_per_gpu",
    "host_power_kw_per_gpu",
    "electricity_cost_kwh",
    "host_opex_monthly",
    "hours_per_year",
    "utilization_low",
    "utilization_base",
    "utilization_high",
];

const UTILIZATION: [&str; 3] = ["utilization_low", "utilization_base", "utilization_high"];

pub const SELECTOR: &str = "host.scenario";
pub const CAPEX: &str = "host.capex";
pub const POWER_COST: &str = "host.power_cost";
pub const OPEX: &str = "host.opex";
pub const KPI_PAYBACK: &str = "host.kpi.payback_years";
pub const KPI_ROI: &str = "host.kpi.roi";

pub fn year(y: u32) -> LogicalKey {
    LogicalKey::row("host.year", y)
}

pub fn net_active(y: u32) -> LogicalKey {
    LogicalKey::row("host.net_active", y)
}

pub fn cumulative(y: u32) -> LogicalKey {
    LogicalKey::row("host.cumulative", y)
}

pub fn scenario_column(scenario: usize, y: u32) -> LogicalKey {
    LogicalKey::row(&format!("host.net_{}", HOST_SCENARIOS[scenario].to_lowercase()), y)
}

const NARRATIVE: &str = "\
A host earns its network share of each year's emission release, valued at \
the launch price. Running the GPUs costs power (GPU count * kW per GPU * hours \
* electricity price) scaled by utilization, plus a fixed monthly operating \
cost.

Net profit is laid out for low, base and high utilization. The active column \
follows the scenario selector, and the cumulative column starts from the \
negative hardware outlay.

Payback is the hardware outlay divided by the first year's active profit; it \
reads 0 when the first year loses money.";

/// Lays out host economics for years 1 through the horizon.
#[derive(Debug, Clone)]
pub struct HostBuilder {
    horizon: u32,
    scenario: String,
}

impl HostBuilder {
    pub fn new(horizon: u32, scenario: impl Into<String>) -> Self {
        Self {
            horizon: horizon.max(1),
            scenario: scenario.into(),
        }
    }
}

impl ModelBuilder for HostBuilder {
    fn name(&self) -> &'static str {
        "host"
    }

    fn sheet_name(&self) -> &str {
        ModelKind::Host.sheet_title()
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = [SELECTOR, CAPEX, POWER_COST, OPEX, KPI_PAYBACK, KPI_ROI]
            .into_iter()
            .map(LogicalKey::quantity)
            .collect();
        for y in [1, self.horizon] {
            keys.insert(year(y));
            keys.insert(net_active(y));
            keys.insert(cumulative(y));
        }
        keys
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        params(&PARAMS)
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        let s = self.sheet_name();
        heading(ctx, s, "Host Profitability", "Yearly economics of one GPU host")?;

        let mut inputs = InputBlock::start(ctx, s)?;
        let pool = inputs.param(ctx, "emission_pool")?;
        let rate = inputs.param(ctx, "emission_decay_rate")?;
        let epy = inputs.param(ctx, "epochs_per_year")?;
        let price0 = inputs.param(ctx, "token_price_initial")?;
        let share = inputs.param(ctx, "host_network_share")?;
        let gpus = inputs.param(ctx, "host_gpu_count")?;
        let capex_per_gpu = inputs.param(ctx, "host_capex_per_gpu")?;
        let kw = inputs.param(ctx, "host_power_kw_per_gpu")?;
        let electricity = inputs.param(ctx, "electricity_cost_kwh")?;
        let opex_monthly = inputs.param(ctx, "host_opex_monthly")?;
        let hours = inputs.param(ctx, "hours_per_year")?;
        let utilization = UTILIZATION
            .iter()
            .map(|k| inputs.param(ctx, k))
            .collect::<Result<Vec<_>>>()?;
        let selector_row = inputs.reserve();
        let toggle = ScenarioToggle::place(
            ctx,
            LogicalKey::quantity(SELECTOR),
            "host",
            &HOST_SCENARIOS,
            &self.scenario,
            s,
            selector_row,
        )?;

        // Derived costs sit between the inputs and the key figures.
        let derived = inputs.end_row() + 1;
        ctx.labels(s, derived, LABEL_COL, &["Derived", "Value", "Unit"])?;
        let costs = [
            (CAPEX, "Hardware outlay", "USD", gpus.clone() * capex_per_gpu),
            (
                POWER_COST,
                "Power cost at full utilization",
                "USD/year",
                gpus * kw * hours * electricity,
            ),
            (OPEX, "Fixed operating cost", "USD/year", opex_monthly * 12.0),
        ];
        let mut derived_cells = Vec::with_capacity(costs.len());
        for (i, (key, label, unit, expr)) in costs.into_iter().enumerate() {
            let row = derived + 1 + i as u32;
            ctx.label(s, row, LABEL_COL, label)?;
            derived_cells.push(Expr::cell(&ctx.place_formula(LogicalKey::quantity(key), s, row, VALUE_COL, expr)?));
            ctx.label(s, row, UNIT_COL, unit)?;
        }
        let (capex, power_cost, opex) = (
            derived_cells[0].clone(),
            derived_cells[1].clone(),
            derived_cells[2].clone(),
        );

        let mut kpis = KpiSection::reserve(ctx, s, derived + 1 + derived_cells.len() as u32 + 1, 2)?;
        let first = table_header(
            ctx,
            s,
            kpis.end_row() + 1,
            &[
                "Year",
                "Reward (tokens)",
                "Reward (USD)",
                "Net, low",
                "Net, base",
                "Net, high",
                "Net, active",
                "Cumulative",
            ],
        )?;

        let mut previous: Option<Expr> = None;
        for y in 1..=self.horizon {
            let row = first + y - 1;
            let yr = Expr::cell(&ctx.place_constant(year(y), s, row, 0, f64::from(y))?);
            let tokens = ctx.place_formula(
                LogicalKey::row("host.reward_tokens", y),
                s,
                row,
                1,
                released(&pool, &rate, (yr.clone() - 1.0) * epy.clone(), yr * epy.clone()) * share.clone(),
            )?;
            let usd = ctx.place_formula(
                LogicalKey::row("host.reward_usd", y),
                s,
                row,
                2,
                Expr::cell(&tokens) * price0.clone(),
            )?;
            let mut columns = Vec::with_capacity(utilization.len());
            for (i, util) in utilization.iter().enumerate() {
                let net = util.clone() * (Expr::cell(&usd) - power_cost.clone()) - opex.clone();
                let addr = ctx.place_formula(scenario_column(i, y), s, row, 3 + i as u32, net)?;
                columns.push(Expr::cell(&addr));
            }
            let active = Expr::cell(&ctx.place_formula(net_active(y), s, row, 6, toggle.pick(columns))?);
            let running = match previous.take() {
                None => -capex.clone() + active,
                Some(prev) => prev + active,
            };
            previous = Some(Expr::cell(&ctx.place_formula(cumulative(y), s, row, 7, running)?));
        }

        let first_year = ctx.reference(&net_active(1))?;
        kpis.add(
            ctx,
            KPI_PAYBACK,
            "Payback period",
            "years",
            Expr::if_then(
                first_year.clone().gt(0.0),
                capex.clone() / first_year.clone(),
                Expr::num(0.0),
            ),
        )?;
        kpis.add(ctx, KPI_ROI, "First-year return on hardware", "ratio", first_year / capex)?;
        Ok(())
    }

    fn narrative(&self) -> &'static str {
        NARRATIVE
    }
}
