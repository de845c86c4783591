//! Integrated dashboard: every model's key figures on one sheet.

use std::collections::BTreeSet;

use tally_core::LogicalKey;

use super::common::{LABEL_COL, UNIT_COL, VALUE_COL, heading};
use super::{emission, fee, host, price, treasury};
use crate::block::{CellRange, ChartKind, ChartSeries, ChartSpec};
use crate::builder::{LayoutCtx, ModelBuilder};
use crate::error::Result;

pub const SHEET: &str = "Dashboard";
pub const MARKET_CAP: &str = "dashboard.market_cap";
pub const FDV: &str = "dashboard.fdv";

/// `(source key, label, unit)` in display order.
const FIGURES: [(&str, &str, &str); 14] = [
    (emission::KPI_CIRCULATING, "Circulating supply at KPI epoch", "tokens"),
    (emission::KPI_MAX_SUPPLY, "Maximum supply", "tokens"),
    (emission::KPI_HALF_LIFE, "Emission half-life", "epochs"),
    (emission::KPI_DECAY_FACTOR, "Unreleased share at KPI epoch", "ratio"),
    (price::KPI_YEAR4, "Active price, early year", "USD"),
    (price::KPI_TERMINAL, "Active price, final year", "USD"),
    (fee::KPI_REVENUE, "Annual fee revenue, final year", "USD"),
    (fee::KPI_FEE_SHARE, "Host fee share, final year", "share"),
    (fee::KPI_SPLIT_TOTAL, "Sum of split shares", "share"),
    (host::KPI_PAYBACK, "Host payback period", "years"),
    (host::KPI_ROI, "Host first-year return", "ratio"),
    (treasury::KPI_BALANCE, "Treasury balance, final year", "USD"),
    (treasury::KPI_POL, "Protocol-owned liquidity, final year", "USD"),
    (treasury::KPI_RUNWAY, "Treasury runway without inflows", "years"),
];

/// Dashboard key mirroring a model key figure, e.g.
/// `emission.kpi.circulating` -> `dashboard.emission.circulating`.
pub fn mirror_key(source: &str) -> LogicalKey {
    LogicalKey::quantity(format!("dashboard.{}", source.replacen(".kpi.", ".", 1)))
}

/// Live summary of the integrated document.
#[derive(Debug, Clone)]
pub struct DashboardBuilder {
    emission_periods: u32,
    horizon: u32,
}

impl DashboardBuilder {
    pub fn new(emission_periods: u32, horizon: u32) -> Self {
        Self {
            emission_periods,
            horizon,
        }
    }

    fn series_endpoints(&self) -> [LogicalKey; 8] {
        let p = self.emission_periods;
        let h = self.horizon;
        [
            emission::epoch(0),
            emission::epoch(p),
            emission::circulating(0),
            emission::circulating(p),
            price::year(0),
            price::year(h),
            price::active(0),
            price::active(h),
        ]
    }

    /// Display label; the early price figure names its actual year.
    fn figure_label(&self, source: &str, label: &str) -> String {
        if source == price::KPI_YEAR4 {
            format!("Active price, year {}", price::kpi_year(self.horizon))
        } else {
            label.to_string()
        }
    }

    fn range(&self, ctx: &LayoutCtx<'_>, from: LogicalKey, to: LogicalKey) -> Result<CellRange> {
        Ok(CellRange::new(ctx.address_of(&from)?, ctx.address_of(&to)?))
    }
}

impl ModelBuilder for DashboardBuilder {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn sheet_name(&self) -> &str {
        SHEET
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = FIGURES.iter().map(|(k, _, _)| mirror_key(k)).collect();
        keys.insert(LogicalKey::quantity(MARKET_CAP));
        keys.insert(LogicalKey::quantity(FDV));
        keys
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        let mut keys: BTreeSet<LogicalKey> = FIGURES.iter().map(|(k, _, _)| LogicalKey::quantity(*k)).collect();
        keys.extend(self.series_endpoints());
        keys
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        heading(ctx, SHEET, "Token Economics Dashboard", "Key figures from every model, live")?;
        ctx.labels(SHEET, 3, LABEL_COL, &["Metric", "Value", "Unit"])?;

        let mut row = 4;
        for (source, label, unit) in FIGURES {
            let value = ctx.reference(&LogicalKey::quantity(source))?;
            ctx.label(SHEET, row, LABEL_COL, self.figure_label(source, label))?;
            ctx.place_formula(mirror_key(source), SHEET, row, VALUE_COL, value)?;
            ctx.label(SHEET, row, UNIT_COL, unit)?;
            row += 1;
        }

        row += 1;
        ctx.labels(SHEET, row, LABEL_COL, &["Valuation", "Value", "Unit"])?;
        let circulating = ctx.reference(&LogicalKey::quantity(emission::KPI_CIRCULATING))?;
        let max_supply = ctx.reference(&LogicalKey::quantity(emission::KPI_MAX_SUPPLY))?;
        let year4 = ctx.reference(&LogicalKey::quantity(price::KPI_YEAR4))?;
        let terminal = ctx.reference(&LogicalKey::quantity(price::KPI_TERMINAL))?;
        let valuations = [
            (
                MARKET_CAP,
                format!("Market cap at KPI epoch, year {} price", price::kpi_year(self.horizon)),
                circulating * year4,
            ),
            (FDV, "Fully diluted value, final-year price".to_string(), max_supply * terminal),
        ];
        for (key, label, expr) in valuations {
            row += 1;
            ctx.label(SHEET, row, LABEL_COL, label)?;
            ctx.place_formula(LogicalKey::quantity(key), SHEET, row, VALUE_COL, expr)?;
            ctx.label(SHEET, row, UNIT_COL, "USD")?;
        }

        let [epoch0, epoch_n, circ0, circ_n, year0, year_n, active0, active_n] = self.series_endpoints();
        let supply = ChartSpec {
            title: "Circulating supply".into(),
            kind: ChartKind::Line,
            sheet: SHEET.into(),
            anchor: "F3".into(),
            series: vec![ChartSeries {
                name: "Circulating supply".into(),
                values: self.range(ctx, circ0, circ_n)?,
                categories: Some(self.range(ctx, epoch0, epoch_n)?),
            }],
        };
        let price_path = ChartSpec {
            title: "Active token price".into(),
            kind: ChartKind::Line,
            sheet: SHEET.into(),
            anchor: "F22".into(),
            series: vec![ChartSeries {
                name: "Active price".into(),
                values: self.range(ctx, active0, active_n)?,
                categories: Some(self.range(ctx, year0, year_n)?),
            }],
        };
        ctx.add_chart(supply);
        ctx.add_chart(price_path);
        Ok(())
    }
}
