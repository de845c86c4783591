//! What a builder run leaves behind: its footprint and its products.

use serde::Serialize;
use tally_core::{CellAddress, LogicalKey, quote_sheet};

/// Rectangular area a builder occupies on one sheet (zero-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl Extent {
    pub fn at(row: u32, col: u32) -> Self {
        Self {
            first_row: row,
            last_row: row,
            first_col: col,
            last_col: col,
        }
    }

    pub fn include(&mut self, row: u32, col: u32) {
        self.first_row = self.first_row.min(row);
        self.last_row = self.last_row.max(row);
        self.first_col = self.first_col.min(col);
        self.last_col = self.last_col.max(col);
    }

    pub fn rows(&self) -> u32 {
        self.last_row - self.first_row + 1
    }
}

/// Result of one builder's layout pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetBlock {
    pub builder: String,

    /// Occupied area per sheet, in the order the builder first wrote to them.
    pub extents: Vec<(String, Extent)>,

    /// Every logical key the builder placed, in allocation order.
    pub produced: Vec<LogicalKey>,
}

impl SheetBlock {
    pub fn extent(&self, sheet: &str) -> Option<&Extent> {
        self.extents.iter().find(|(s, _)| s == sheet).map(|(_, e)| e)
    }
}

/// An inclusive range of cells on one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellRange {
    pub from: CellAddress,
    pub to: CellAddress,
}

impl CellRange {
    pub fn new(from: CellAddress, to: CellAddress) -> Self {
        Self { from, to }
    }

    /// Absolute reference text, e.g. `'Price Trajectory'!$E$12:$E$22`.
    pub fn absolute(&self) -> String {
        let abs = |a: &CellAddress| {
            let col = tally_core::column_name(a.col);
            format!("${col}${}", a.row + 1)
        };
        format!("{}!{}:{}", quote_sheet(&self.from.sheet), abs(&self.from), abs(&self.to))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Column,
}

/// One plotted series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub values: CellRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<CellRange>,
}

/// A chart the rendering side should draw. Only the declaration lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    /// Sheet the chart is anchored on.
    pub sheet: String,
    /// Top-left anchor cell in A1 form.
    pub anchor: String,
    pub series: Vec<ChartSeries>,
}

/// A selector cell and the named scenarios it switches between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioGroup {
    pub name: String,
    pub selector: CellAddress,
    pub options: Vec<String>,
    /// 1-based index written into the selector at generation time.
    pub default: usize,
}
