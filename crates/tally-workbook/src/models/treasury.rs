//! Treasury balance and protocol-owned liquidity funded by fee buyback.

use std::collections::BTreeSet;

use tally_core::{LogicalKey, ModelKind};
use tally_formula::Expr;

use super::common::{InputBlock, KpiSection, RevenueDrivers, heading, table_header};
use crate::builder::{LayoutCtx, ModelBuilder, params};
use crate::error::Result;

const PARAMS: [&str; 9] = [
    "inference_demand_initial",
    "inference_demand_growth",
    "fee_per_million_tokens",
    "fee_decline_rate",
    "days_per_year",
    "split_buyback",
    "treasury_initial_usd",
    "treasury_annual_spend_usd",
    "pol_allocation_rate",
];

pub const KPI_BALANCE: &str = "treasury.kpi.balance";
pub const KPI_POL: &str = "treasury.kpi.pol";
pub const KPI_RUNWAY: &str = "treasury.kpi.runway_years";

pub fn year(y: u32) -> LogicalKey {
    LogicalKey::row("treasury.year", y)
}

pub fn balance(y: u32) -> LogicalKey {
    LogicalKey::row("treasury.balance", y)
}

pub fn pol_total(y: u32) -> LogicalKey {
    LogicalKey::row("treasury.pol_total", y)
}

const NARRATIVE: &str = "\
The buyback share of fee revenue flows into the treasury each year. Part of \
it, the POL allocation rate, is paired into protocol-owned liquidity and \
leaves the spendable balance.

The balance starts from the launch treasury and moves by buyback inflow, \
minus the POL allocation, minus the yearly operating spend. Cumulative POL \
tracks the liquidity the protocol owns outright.

Runway is the launch treasury over the yearly spend, ignoring inflows.";

/// Lays out the treasury balance and POL accumulation.
#[derive(Debug, Clone)]
pub struct TreasuryBuilder {
    horizon: u32,
}

impl TreasuryBuilder {
    pub fn new(horizon: u32) -> Self {
        Self { horizon }
    }
}

impl ModelBuilder for TreasuryBuilder {
    fn name(&self) -> &'static str {
        "treasury"
    }

    fn sheet_name(&self) -> &str {
        ModelKind::Treasury.sheet_title()
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = [KPI_BALANCE, KPI_POL, KPI_RUNWAY]
            .into_iter()
            .map(LogicalKey::quantity)
            .collect();
        for y in [0, self.horizon] {
            keys.insert(year(y));
            keys.insert(balance(y));
            keys.insert(pol_total(y));
        }
        keys
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        params(&PARAMS)
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        let s = self.sheet_name();
        heading(ctx, s, "Treasury & POL", "Treasury balance and protocol-owned liquidity per year")?;

        let mut inputs = InputBlock::start(ctx, s)?;
        let drivers = RevenueDrivers::place(ctx, &mut inputs)?;
        let buyback_share = inputs.param(ctx, "split_buyback")?;
        let initial = inputs.param(ctx, "treasury_initial_usd")?;
        let spend = inputs.param(ctx, "treasury_annual_spend_usd")?;
        let pol_rate = inputs.param(ctx, "pol_allocation_rate")?;

        let mut kpis = KpiSection::reserve(ctx, s, inputs.end_row() + 1, 3)?;
        let first = table_header(
            ctx,
            s,
            kpis.end_row() + 1,
            &["Year", "Buyback inflow", "POL allocation", "Treasury balance", "Cumulative POL"],
        )?;

        let mut previous: Option<(Expr, Expr)> = None;
        for y in 0..=self.horizon {
            let row = first + y;
            let yr = Expr::cell(&ctx.place_constant(year(y), s, row, 0, f64::from(y))?);
            let revenue = drivers.annual_revenue(yr);
            let buyback = Expr::cell(&ctx.place_formula(
                LogicalKey::row("treasury.buyback", y),
                s,
                row,
                1,
                revenue * buyback_share.clone(),
            )?);
            let pol = Expr::cell(&ctx.place_formula(
                LogicalKey::row("treasury.pol", y),
                s,
                row,
                2,
                buyback.clone() * pol_rate.clone(),
            )?);
            let (opening, pol_before) = match previous.take() {
                None => (initial.clone(), None),
                Some((bal, total)) => (bal, Some(total)),
            };
            let bal = Expr::cell(&ctx.place_formula(
                balance(y),
                s,
                row,
                3,
                opening + buyback - pol.clone() - spend.clone(),
            )?);
            let total = match pol_before {
                None => pol,
                Some(before) => before + pol,
            };
            let total = Expr::cell(&ctx.place_formula(pol_total(y), s, row, 4, total)?);
            previous = Some((bal, total));
        }

        let end_balance = ctx.reference(&balance(self.horizon))?;
        kpis.add(
            ctx,
            KPI_BALANCE,
            &format!("Treasury balance, year {}", self.horizon),
            "USD",
            end_balance,
        )?;
        let end_pol = ctx.reference(&pol_total(self.horizon))?;
        kpis.add(
            ctx,
            KPI_POL,
            &format!("Protocol-owned liquidity, year {}", self.horizon),
            "USD",
            end_pol,
        )?;
        kpis.add(ctx, KPI_RUNWAY, "Runway without inflows", "years", initial / spend)?;
        Ok(())
    }

    fn narrative(&self) -> &'static str {
        NARRATIVE
    }
}
