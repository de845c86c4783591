//! JSON description of a generated document.
//!
//! The manifest lists every cell with its coordinate, role, lock flag,
//! logical key and content, alongside the evaluated value the workbook will
//! show. Downstream tooling reads it instead of parsing xlsx.

use std::path::Path;

use serde::Serialize;
use tally_core::CellAddress;
use tally_workbook::{CellContent, CellRole, ChartSpec, Document, ScenarioGroup};
use tracing::info;

use crate::atomic::write_atomic;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct Manifest<'d> {
    pub document: String,
    pub title: &'d str,
    pub catalogue_version: &'d str,
    pub fingerprint: String,
    pub sheets: Vec<ManifestSheet>,
    pub charts: &'d [ChartSpec],
    pub scenario_groups: &'d [ScenarioGroup],
}

#[derive(Debug, Serialize)]
pub struct ManifestSheet {
    pub name: String,
    pub cells: Vec<ManifestCell>,
}

#[derive(Debug, Serialize)]
pub struct ManifestCell {
    pub a1: String,
    pub role: CellRole,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Literal number, or the evaluated result of a formula.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl<'d> Manifest<'d> {
    pub fn from_document(document: &'d Document, catalogue_version: &'d str) -> Self {
        let sheets = document
            .sheets()
            .iter()
            .map(|sheet| ManifestSheet {
                name: sheet.name().to_string(),
                cells: sheet
                    .cells()
                    .map(|(row, col, cell)| {
                        let address = CellAddress::new(document.id(), sheet.name(), row, col);
                        let (formula, text, value) = match &cell.content {
                            CellContent::Number(n) => (None, None, Some(*n)),
                            CellContent::Text(t) => (None, Some(t.clone()), None),
                            CellContent::Formula(expr) => (
                                Some(expr.to_formula(sheet.name())),
                                None,
                                document.evaluate(&address).ok(),
                            ),
                        };
                        ManifestCell {
                            a1: address.a1(),
                            role: cell.role,
                            locked: cell.locked,
                            key: cell.key.as_ref().map(ToString::to_string),
                            formula,
                            text,
                            value,
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            document: document.id().to_string(),
            title: document.title(),
            catalogue_version,
            fingerprint: document.fingerprint(),
            sheets,
            charts: document.charts(),
            scenario_groups: document.scenario_groups(),
        }
    }

    /// Number of cells across all sheets.
    pub fn cell_count(&self) -> usize {
        self.sheets.iter().map(|s| s.cells.len()).sum()
    }
}

/// Pretty JSON for the manifest of `document`, newline terminated.
pub fn manifest_bytes(document: &Document, catalogue_version: &str) -> Result<Vec<u8>> {
    let manifest = Manifest::from_document(document, catalogue_version);
    let mut bytes = serde_json::to_vec_pretty(&manifest)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes the manifest for `document` as pretty JSON at `path`.
pub fn write_manifest(document: &Document, catalogue_version: &str, path: &Path) -> Result<()> {
    let bytes = manifest_bytes(document, catalogue_version)?;
    write_atomic(path, &bytes)?;
    info!(document = %document.id(), path = %path.display(), "manifest written");
    Ok(())
}
