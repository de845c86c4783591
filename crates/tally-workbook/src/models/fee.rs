//! Fee revenue, its four-way split and the shift from emission subsidy to
//! fee income.

use std::collections::BTreeSet;

use tally_core::{CellAddress, LogicalKey, ModelKind};
use tally_formula::Expr;

use super::common::{InputBlock, KpiSection, RevenueDrivers, heading, released, table_header};
use crate::builder::{LayoutCtx, ModelBuilder, params};
use crate::error::Result;

const PARAMS: [&str; 13] = [
    "inference_demand_initial",
    "inference_demand_growth",
    "fee_per_million_tokens",
    "fee_decline_rate",
    "days_per_year",
    "split_hosts",
    "split_ai_fund",
    "split_buyback",
    "split_yield",
    "emission_pool",
    "emission_decay_rate",
    "epochs_per_year",
    "token_price_initial",
];

pub const SPLITS: [&str; 4] = ["split_hosts", "split_ai_fund", "split_buyback", "split_yield"];

pub const KPI_FEE_SHARE: &str = "fee.kpi.fee_share";
pub const KPI_REVENUE: &str = "fee.kpi.revenue";
pub const KPI_SPLIT_TOTAL: &str = "fee.kpi.split_total";

pub fn year(y: u32) -> LogicalKey {
    LogicalKey::row("fee.year", y)
}

pub fn annual_revenue(y: u32) -> LogicalKey {
    LogicalKey::row("fee.annual_revenue", y)
}

pub fn split_check(y: u32) -> LogicalKey {
    LogicalKey::row("fee.split_check", y)
}

pub fn host_fee_share(y: u32) -> LogicalKey {
    LogicalKey::row("fee.host_fee_share", y)
}

const SPLIT_COLUMNS: [&str; 4] = ["fee.hosts", "fee.ai_fund", "fee.buyback", "fee.yield"];

const NARRATIVE: &str = "\
Inference demand (millions of tokens per day) grows yearly while the fee per \
million tokens declines, so daily revenue is demand * fee and annual revenue \
multiplies by the days in a year.

Annual revenue is split four ways: hosts, the AI fund, buyback and staking \
yield. The split check column sums the four shares and divides by the revenue; \
it reads 1 on every row when the shares are consistent.

The subsidy column values the emission released to hosts in the same year at \
the launch price. The host fee share is fee income over fee income plus \
subsidy, which shows how quickly hosts stop depending on emission.";

/// Lays out fee revenue, the split and the subsidy transition.
#[derive(Debug, Clone)]
pub struct FeeBuilder {
    horizon: u32,
}

impl FeeBuilder {
    pub fn new(horizon: u32) -> Self {
        Self { horizon }
    }
}

impl ModelBuilder for FeeBuilder {
    fn name(&self) -> &'static str {
        "fee"
    }

    fn sheet_name(&self) -> &str {
        ModelKind::Fee.sheet_title()
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = [KPI_FEE_SHARE, KPI_REVENUE, KPI_SPLIT_TOTAL]
            .into_iter()
            .map(LogicalKey::quantity)
            .collect();
        for y in [0, self.horizon] {
            keys.insert(year(y));
            keys.insert(annual_revenue(y));
            keys.insert(host_fee_share(y));
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
            "Fee Transition",
            "Fee revenue, its split and the move away from emission subsidy",
        )?;

        let mut inputs = InputBlock::start(ctx, s)?;
        let drivers = RevenueDrivers::place(ctx, &mut inputs)?;
        let splits = SPLITS
            .iter()
            .map(|k| inputs.param(ctx, k))
            .collect::<Result<Vec<_>>>()?;
        let pool = inputs.param(ctx, "emission_pool")?;
        let rate = inputs.param(ctx, "emission_decay_rate")?;
        let epy = inputs.param(ctx, "epochs_per_year")?;
        let price0 = inputs.param(ctx, "token_price_initial")?;

        let mut kpis = KpiSection::reserve(ctx, s, inputs.end_row() + 1, 3)?;
        let first = table_header(
            ctx,
            s,
            kpis.end_row() + 1,
            &[
                "Year",
                "Demand (M tokens/day)",
                "Fee per M tokens",
                "Daily revenue",
                "Annual revenue",
                "Hosts",
                "AI fund",
                "Buyback",
                "Yield",
                "Split check",
                "Emission subsidy (USD)",
                "Host fee share",
            ],
        )?;

        for y in 0..=self.horizon {
            let row = first + y;
            let yr = Expr::cell(&ctx.place_constant(year(y), s, row, 0, f64::from(y))?);
            let demand = ctx.place_formula(
                LogicalKey::row("fee.demand", y),
                s,
                row,
                1,
                drivers.demand(yr.clone()),
            )?;
            let fee = ctx.place_formula(
                LogicalKey::row("fee.fee", y),
                s,
                row,
                2,
                drivers.fee(yr.clone()),
            )?;
            let daily = ctx.place_formula(
                LogicalKey::row("fee.daily_revenue", y),
                s,
                row,
                3,
                RevenueDrivers::daily(Expr::cell(&demand), Expr::cell(&fee)),
            )?;
            let annual = ctx.place_formula(annual_revenue(y), s, row, 4, drivers.annual(Expr::cell(&daily)))?;

            let mut shares: Vec<CellAddress> = Vec::with_capacity(SPLITS.len());
            for (i, (column, split)) in SPLIT_COLUMNS.iter().zip(&splits).enumerate() {
                shares.push(ctx.place_formula(
                    LogicalKey::row(column, y),
                    s,
                    row,
                    5 + i as u32,
                    Expr::cell(&annual) * split.clone(),
                )?);
            }
            let (host_rev, last_share) = (&shares[0], &shares[shares.len() - 1]);
            ctx.place_formula(
                split_check(y),
                s,
                row,
                9,
                Expr::sum(vec![Expr::range(host_rev, last_share)]) / Expr::cell(&annual),
            )?;
            let subsidy = ctx.place_formula(
                LogicalKey::row("fee.subsidy_usd", y),
                s,
                row,
                10,
                released(&pool, &rate, yr.clone() * epy.clone(), (yr + 1.0) * epy.clone()) * price0.clone(),
            )?;
            ctx.place_formula(
                host_fee_share(y),
                s,
                row,
                11,
                Expr::cell(host_rev) / (Expr::cell(host_rev) + Expr::cell(&subsidy)),
            )?;
        }

        let share = ctx.reference(&host_fee_share(self.horizon))?;
        kpis.add(
            ctx,
            KPI_FEE_SHARE,
            &format!("Host fee share, year {}", self.horizon),
            "share",
            share,
        )?;
        let revenue = ctx.reference(&annual_revenue(self.horizon))?;
        kpis.add(
            ctx,
            KPI_REVENUE,
            &format!("Annual fee revenue, year {}", self.horizon),
            "USD",
            revenue,
        )?;
        let total = splits
            .into_iter()
            .reduce(|acc, e| acc + e)
            .unwrap_or_else(|| Expr::num(0.0));
        kpis.add(ctx, KPI_SPLIT_TOTAL, "Sum of split shares", "share", total)?;
        Ok(())
    }

    fn narrative(&self) -> &'static str {
        NARRATIVE
    }
}
