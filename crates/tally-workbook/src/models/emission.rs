//! Emission schedule: exponential decay of the emission pool.

use std::collections::BTreeSet;

use tally_core::{LogicalKey, ModelKind};
use tally_formula::Expr;

use super::common::{InputBlock, KpiSection, heading, table_header};
use crate::builder::{LayoutCtx, ModelBuilder, params};
use crate::error::Result;

const PARAMS: [&str; 5] = [
    "genesis_supply",
    "emission_pool",
    "emission_decay_rate",
    "emission_schedule_step_epochs",
    "emission_kpi_epoch",
];

pub const KPI_DECAY_FACTOR: &str = "emission.kpi.decay_factor";
pub const KPI_CIRCULATING: &str = "emission.kpi.circulating";
pub const KPI_HALF_LIFE: &str = "emission.kpi.half_life";
pub const KPI_MAX_SUPPLY: &str = "emission.kpi.max_supply";

pub const KPIS: [&str; 4] = [KPI_DECAY_FACTOR, KPI_CIRCULATING, KPI_HALF_LIFE, KPI_MAX_SUPPLY];

pub fn epoch(period: u32) -> LogicalKey {
    LogicalKey::row("emission.epoch", period)
}

pub fn factor(period: u32) -> LogicalKey {
    LogicalKey::row("emission.factor", period)
}

pub fn circulating(period: u32) -> LogicalKey {
    LogicalKey::row("emission.circulating", period)
}

const NARRATIVE: &str = "\
The emission pool is released on a continuous exponential decay. After epoch t \
the share of the pool still unreleased is EXP(rate * t), so the tokens emitted \
in one epoch are pool * -rate * EXP(rate * t) and the cumulative release is \
pool * (1 - EXP(rate * t)).

With the catalogue decay rate of -0.000475 the pool halves roughly every 1460 \
epochs (four years of daily epochs). Circulating supply is the genesis \
allocation plus everything released so far.

The table samples the curve every schedule step. Edit the decay rate or the \
step in the inputs and every row recomputes.";

/// Lays out the emission curve, one row per schedule step.
#[derive(Debug, Clone)]
pub struct EmissionBuilder {
    periods: u32,
}

impl EmissionBuilder {
    pub fn new(periods: u32) -> Self {
        Self { periods }
    }
}

impl ModelBuilder for EmissionBuilder {
    fn name(&self) -> &'static str {
        "emission"
    }

    fn sheet_name(&self) -> &str {
        ModelKind::Emission.sheet_title()
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = KPIS.iter().map(|k| LogicalKey::quantity(*k)).collect();
        for period in [0, self.periods] {
            keys.insert(epoch(period));
            keys.insert(circulating(period));
        }
        keys
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        params(&PARAMS)
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        let s = self.sheet_name();
        heading(
            ctx,
            s,
            "Emission Schedule",
            "Exponential decay of the emission pool per schedule step",
        )?;

        let mut inputs = InputBlock::start(ctx, s)?;
        let genesis = inputs.param(ctx, "genesis_supply")?;
        let pool = inputs.param(ctx, "emission_pool")?;
        let rate = inputs.param(ctx, "emission_decay_rate")?;
        let step = inputs.param(ctx, "emission_schedule_step_epochs")?;
        let kpi_epoch = inputs.param(ctx, "emission_kpi_epoch")?;

        let mut kpis = KpiSection::reserve(ctx, s, inputs.end_row() + 1, KPIS.len() as u32)?;
        let first = table_header(
            ctx,
            s,
            kpis.end_row() + 1,
            &[
                "Period",
                "Epoch",
                "Unreleased share",
                "Emitted per epoch",
                "Cumulative emitted",
                "Circulating supply",
            ],
        )?;

        for k in 0..=self.periods {
            let row = first + k;
            let period = ctx.place_constant(LogicalKey::row("emission.period", k), s, row, 0, f64::from(k))?;
            let ep = ctx.place_formula(epoch(k), s, row, 1, Expr::cell(&period) * step.clone())?;
            let fac = ctx.place_formula(factor(k), s, row, 2, Expr::exp(rate.clone() * Expr::cell(&ep)))?;
            ctx.place_formula(
                LogicalKey::row("emission.per_epoch", k),
                s,
                row,
                3,
                pool.clone() * -rate.clone() * Expr::cell(&fac),
            )?;
            let cumulative = ctx.place_formula(
                LogicalKey::row("emission.cumulative", k),
                s,
                row,
                4,
                pool.clone() * (Expr::num(1.0) - Expr::cell(&fac)),
            )?;
            ctx.place_formula(circulating(k), s, row, 5, genesis.clone() + Expr::cell(&cumulative))?;
        }

        let decay_at_kpi = Expr::exp(rate.clone() * kpi_epoch);
        kpis.add(ctx, KPI_DECAY_FACTOR, "Unreleased share at KPI epoch", "ratio", decay_at_kpi.clone())?;
        kpis.add(
            ctx,
            KPI_CIRCULATING,
            "Circulating supply at KPI epoch",
            "tokens",
            genesis.clone() + pool.clone() * (Expr::num(1.0) - decay_at_kpi),
        )?;
        kpis.add(
            ctx,
            KPI_HALF_LIFE,
            "Half-life",
            "epochs",
            Expr::ln(Expr::num(0.5)) / rate,
        )?;
        kpis.add(ctx, KPI_MAX_SUPPLY, "Maximum supply", "tokens", genesis + pool)?;
        Ok(())
    }

    fn narrative(&self) -> &'static str {
        NARRATIVE
    }
}
