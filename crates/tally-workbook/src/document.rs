//! In-memory document model handed to the rendering side.
//!
//! A [`Document`] is a list of sheets, each a sparse grid of [`Cell`]s, plus
//! the chart and scenario declarations that travel with it. Cells are
//! append-only during generation: writing to an occupied coordinate is an
//! [`EngineError::AddressCollision`]. Every cell records the order in which it
//! was allocated so the validator can prove references only point backwards.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tally_core::{CellAddress, DocumentId, LogicalKey};
use tally_formula::{CellLookup, EvalError, Evaluator, Expr, LookupValue};

use crate::block::{ChartSpec, ScenarioGroup, SheetBlock};
use crate::error::{EngineError, Result};

const SEP: u8 = 0;

/// What a cell is for. Drives protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRole {
    /// Editable parameter value.
    Input,
    /// Scenario selector.
    Selector,
    /// Non-editable literal (structural indices, fixed conversions).
    Constant,
    /// Formula-driven value.
    Computed,
    /// Headings and descriptive text.
    Label,
}

impl CellRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Selector => "selector",
            Self::Constant => "constant",
            Self::Computed => "computed",
            Self::Label => "label",
        }
    }

    /// Whether end users may edit cells of this role.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Input | Self::Selector)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Number(f64),
    Text(String),
    Formula(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: CellContent,
    pub role: CellRole,
    pub locked: bool,
    pub key: Option<LogicalKey>,
    /// Allocation order within the document.
    pub seq: u64,
}

impl Cell {
    pub fn formula(&self) -> Option<&Expr> {
        match &self.content {
            CellContent::Formula(e) => Some(e),
            _ => None,
        }
    }

    fn owner(&self) -> String {
        match (&self.key, &self.content) {
            (Some(k), _) => k.to_string(),
            (None, CellContent::Text(t)) => format!("label '{t}'"),
            (None, _) => self.role.as_str().to_string(),
        }
    }
}

/// One worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Sheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &Cell)> {
        self.cells.iter().map(|(&(r, c), cell)| (r, c, cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A generated document variant.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    title: String,
    sheets: Vec<Sheet>,
    keys: HashMap<LogicalKey, CellAddress>,
    charts: Vec<ChartSpec>,
    scenario_groups: Vec<ScenarioGroup>,
    blocks: Vec<SheetBlock>,
    next_seq: u64,
}

impl Document {
    pub fn new(id: DocumentId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            sheets: Vec::new(),
            keys: HashMap::new(),
            charts: Vec::new(),
            scenario_groups: Vec::new(),
            blocks: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sheets in creation order.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Creates the sheet if it does not exist yet.
    pub fn ensure_sheet(&mut self, name: &str) {
        if self.sheet(name).is_none() {
            self.sheets.push(Sheet::new(name));
        }
    }

    pub fn cell(&self, addr: &CellAddress) -> Option<&Cell> {
        if addr.document != self.id {
            return None;
        }
        self.sheet(&addr.sheet)?.cell(addr.row, addr.col)
    }

    #[cfg(test)]
    pub(crate) fn cell_mut(&mut self, addr: &CellAddress) -> Option<&mut Cell> {
        let sheet = self.sheets.iter_mut().find(|s| s.name == addr.sheet)?;
        sheet.cells.get_mut(&(addr.row, addr.col))
    }

    /// Writes a new cell. Editable roles are left unlocked, everything else
    /// is locked.
    pub fn put(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        content: CellContent,
        role: CellRole,
        key: Option<LogicalKey>,
    ) -> Result<CellAddress> {
        let address = CellAddress::new(self.id, sheet, row, col);
        let seq = self.next_seq;
        let target = self.sheet_mut(sheet);
        if let Some(existing) = target.cells.get(&(row, col)) {
            return Err(EngineError::AddressCollision {
                address,
                existing: existing.owner(),
                requested: key.as_ref().map_or_else(|| role.as_str().to_string(), |k| k.to_string()),
            });
        }
        target.cells.insert(
            (row, col),
            Cell {
                content,
                role,
                locked: !role.is_editable(),
                key: key.clone(),
                seq,
            },
        );
        if let Some(k) = key {
            self.keys.insert(k, address.clone());
        }
        self.next_seq += 1;
        Ok(address)
    }

    fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    /// Address a logical key was placed at.
    pub fn address_of(&self, key: &LogicalKey) -> Option<&CellAddress> {
        self.keys.get(key)
    }

    /// Every keyed cell, in allocation order.
    pub fn keyed_cells(&self) -> Vec<(&LogicalKey, &CellAddress)> {
        let mut out: Vec<_> = self.keys.iter().collect();
        out.sort_by_key(|(_, a)| self.cell(a).map_or(u64::MAX, |c| c.seq));
        out
    }

    /// Iterates all cells, sheet by sheet, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.sheets.iter().flat_map(move |s| {
            s.cells()
                .map(move |(r, c, cell)| (CellAddress::new(self.id, s.name.clone(), r, c), cell))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.sheets.iter().map(Sheet::len).sum()
    }

    pub fn formula_count(&self) -> usize {
        self.cells().filter(|(_, c)| c.formula().is_some()).count()
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.charts
    }

    pub fn add_chart(&mut self, chart: ChartSpec) {
        self.charts.push(chart);
    }

    pub fn scenario_groups(&self) -> &[ScenarioGroup] {
        &self.scenario_groups
    }

    pub fn add_scenario_group(&mut self, group: ScenarioGroup) {
        self.scenario_groups.push(group);
    }

    /// Builder footprints, in build order.
    pub fn blocks(&self) -> &[SheetBlock] {
        &self.blocks
    }

    pub(crate) fn push_block(&mut self, block: SheetBlock) {
        self.blocks.push(block);
    }

    /// Overwrites the value of an editable cell, as an end user would.
    pub fn set_input(&mut self, addr: &CellAddress, value: f64) -> Result<()> {
        if addr.document != self.id {
            return Err(EngineError::protection(addr, "cell belongs to another document"));
        }
        let cell = self
            .sheets
            .iter_mut()
            .find(|s| s.name == addr.sheet)
            .and_then(|s| s.cells.get_mut(&(addr.row, addr.col)));
        match cell {
            Some(cell) if cell.role.is_editable() => {
                cell.content = CellContent::Number(value);
                Ok(())
            }
            Some(cell) => Err(EngineError::protection(
                addr,
                format!("{} cell is not editable", cell.role.as_str()),
            )),
            None => Err(EngineError::protection(addr, "no cell to edit")),
        }
    }

    /// [`Document::set_input`] by logical key.
    pub fn set_input_key(&mut self, key: &LogicalKey, value: f64) -> Result<()> {
        let addr = self
            .address_of(key)
            .cloned()
            .ok_or_else(|| EngineError::unresolved(key))?;
        self.set_input(&addr, value)
    }

    /// Evaluates one cell the way the host spreadsheet would.
    pub fn evaluate(&self, addr: &CellAddress) -> std::result::Result<f64, EvalError> {
        Evaluator::new(self).value(addr)
    }

    /// Evaluates the cell a logical key was placed at.
    pub fn value_of(&self, key: &LogicalKey) -> Result<f64> {
        let addr = self.address_of(key).ok_or_else(|| EngineError::unresolved(key))?;
        Ok(self.evaluate(addr)?)
    }

    /// SHA-256 hex digest over the document's canonical textual form.
    ///
    /// Covers every cell (coordinate, role, lock flag, key, rendered content)
    /// plus chart and scenario declarations.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        write_str(&mut h, &self.id.to_string());
        write_str(&mut h, &self.title);
        for sheet in &self.sheets {
            write_str(&mut h, &sheet.name);
            for (row, col, cell) in sheet.cells() {
                h.update(row.to_le_bytes());
                h.update(col.to_le_bytes());
                write_str(&mut h, cell.role.as_str());
                h.update([u8::from(cell.locked), SEP]);
                write_str(&mut h, &cell.key.as_ref().map(|k| k.to_string()).unwrap_or_default());
                match &cell.content {
                    CellContent::Number(n) => {
                        h.update(b"n");
                        h.update(n.to_bits().to_le_bytes());
                        h.update([SEP]);
                    }
                    CellContent::Text(t) => {
                        h.update(b"t");
                        write_str(&mut h, t);
                    }
                    CellContent::Formula(e) => {
                        h.update(b"f");
                        write_str(&mut h, &e.render(&sheet.name));
                    }
                }
            }
        }
        for chart in &self.charts {
            write_str(&mut h, &chart.title);
            write_str(&mut h, &chart.anchor);
            for s in &chart.series {
                write_str(&mut h, &s.name);
                write_str(&mut h, &s.values.absolute());
            }
        }
        for group in &self.scenario_groups {
            write_str(&mut h, &group.name);
            write_str(&mut h, &group.selector.to_string());
            for option in &group.options {
                write_str(&mut h, option);
            }
        }
        format!("{:x}", h.finalize())
    }
}

fn write_str(h: &mut Sha256, s: &str) {
    h.update(s.as_bytes());
    h.update([SEP]);
}

impl CellLookup for Document {
    fn lookup(&self, addr: &CellAddress) -> LookupValue<'_> {
        match self.cell(addr).map(|c| &c.content) {
            None => LookupValue::Empty,
            Some(CellContent::Number(n)) => LookupValue::Number(*n),
            Some(CellContent::Text(t)) => LookupValue::Text(t),
            Some(CellContent::Formula(e)) => LookupValue::Formula(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new(DocumentId::Integrated, "Test")
    }

    #[test]
    fn put_rejects_occupied_coordinate() {
        let mut d = doc();
        d.put("S", 0, 0, CellContent::Text("Title".into()), CellRole::Label, None)
            .unwrap();
        let err = d
            .put(
                "S",
                0,
                0,
                CellContent::Number(1.0),
                CellRole::Input,
                Some(LogicalKey::param("x")),
            )
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::AddressCollision {
                address: CellAddress::new(DocumentId::Integrated, "S", 0, 0),
                existing: "label 'Title'".into(),
                requested: "param:x".into(),
            }
        );
    }

    #[test]
    fn roles_drive_locking_and_sequence_increases() {
        let mut d = doc();
        let a = d
            .put("S", 1, 1, CellContent::Number(2.0), CellRole::Input, Some(LogicalKey::param("a")))
            .unwrap();
        let b = d
            .put(
                "S",
                2,
                1,
                CellContent::Formula(Expr::cell(&a) * 2.0),
                CellRole::Computed,
                Some(LogicalKey::quantity("s.b")),
            )
            .unwrap();
        let (ca, cb) = (d.cell(&a).unwrap(), d.cell(&b).unwrap());
        assert!(!ca.locked);
        assert!(cb.locked);
        assert!(ca.seq < cb.seq);
        assert_eq!(d.formula_count(), 1);
        assert_eq!(d.value_of(&LogicalKey::quantity("s.b")).unwrap(), 4.0);
    }

    #[test]
    fn set_input_only_touches_editable_cells() {
        let mut d = doc();
        let a = d
            .put("S", 0, 1, CellContent::Number(2.0), CellRole::Input, Some(LogicalKey::param("a")))
            .unwrap();
        let b = d
            .put(
                "S",
                1,
                1,
                CellContent::Formula(Expr::cell(&a) + 1.0),
                CellRole::Computed,
                Some(LogicalKey::quantity("s.b")),
            )
            .unwrap();

        d.set_input(&a, 10.0).unwrap();
        assert_eq!(d.evaluate(&b).unwrap(), 11.0);

        let err = d.set_input(&b, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::ProtectionPolicy { .. }));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = doc();
        let mut b = doc();
        for d in [&mut a, &mut b] {
            d.put("S", 0, 0, CellContent::Number(1.0), CellRole::Input, Some(LogicalKey::param("p")))
                .unwrap();
        }
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.set_input_key(&LogicalKey::param("p"), 2.0).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn foreign_addresses_read_as_empty() {
        let mut d = doc();
        d.put("S", 0, 0, CellContent::Number(5.0), CellRole::Input, None)
            .unwrap();
        let foreign = CellAddress::new(DocumentId::Standalone(tally_core::ModelKind::Fee), "S", 0, 0);
        assert!(d.cell(&foreign).is_none());
        assert_eq!(d.evaluate(&foreign).unwrap(), 0.0);
    }
}
