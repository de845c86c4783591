//! xlsx output through `rust_xlsxwriter`.

use std::path::Path;

use rust_xlsxwriter::{
    Chart, ChartType, Color, DocProperties, ExcelDateTime, Format, Formula, Workbook, Worksheet,
};
use tally_core::{CellAddress, parse_a1};
use tally_workbook::{Cell, CellContent, CellRole, ChartKind, ChartSpec, Document, Sheet};
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::error::{RenderError, Result};

const LABEL_WIDTH: f64 = 44.0;
const VALUE_WIDTH: f64 = 16.0;

/// Creation date stamped into every workbook, in place of the wall clock.
const CREATED: (u16, u8, u8) = (2024, 1, 1);

/// Cell formats by role.
struct Styles {
    title: Format,
    label: Format,
    input: Format,
    selector: Format,
    constant: Format,
    computed: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(14),
            label: Format::new(),
            input: Format::new()
                .set_unlocked()
                .set_font_color(Color::RGB(0x0000FF))
                .set_background_color(Color::RGB(0xFFF2CC)),
            selector: Format::new()
                .set_unlocked()
                .set_bold()
                .set_background_color(Color::RGB(0xFCE4D6)),
            constant: Format::new().set_font_color(Color::RGB(0x595959)),
            computed: Format::new().set_num_format("#,##0.0000"),
        }
    }

    fn for_cell(&self, row: u32, cell: &Cell) -> &Format {
        match cell.role {
            CellRole::Input => &self.input,
            CellRole::Selector => &self.selector,
            CellRole::Constant => &self.constant,
            CellRole::Computed => &self.computed,
            CellRole::Label if row == 0 => &self.title,
            CellRole::Label => &self.label,
        }
    }
}

/// Serializes a document to xlsx bytes.
///
/// Every sheet is protected; only input and selector cells are unlocked.
/// Formulas carry their evaluated value so viewers that do not recalculate
/// still show numbers. The same document always yields the same bytes.
pub fn workbook_bytes(document: &Document) -> Result<Vec<u8>> {
    let styles = Styles::new();
    let (year, month, day) = CREATED;
    let created = ExcelDateTime::from_ymd(year, month, day)?;
    let mut workbook = Workbook::new();
    workbook.set_properties(
        &DocProperties::new()
            .set_title(document.title())
            .set_creation_datetime(&created),
    );

    for sheet in document.sheets() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name())?;
        write_sheet(worksheet, document, sheet, &styles)?;
        for chart in document.charts().iter().filter(|c| c.sheet == sheet.name()) {
            insert_chart(worksheet, chart)?;
        }
        worksheet.protect();
        debug!(sheet = sheet.name(), cells = sheet.len(), "sheet written");
    }

    Ok(workbook.save_to_buffer()?)
}

/// Writes a document as an xlsx file at `path`.
pub fn write_xlsx(document: &Document, path: &Path) -> Result<()> {
    let bytes = workbook_bytes(document)?;
    write_atomic(path, &bytes)?;
    info!(document = %document.id(), path = %path.display(), bytes = bytes.len(), "workbook written");
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, document: &Document, sheet: &Sheet, styles: &Styles) -> Result<()> {
    let mut last_col = 0;
    for (row, col, cell) in sheet.cells() {
        last_col = last_col.max(col);
        let c = col as u16;
        let format = styles.for_cell(row, cell);
        match &cell.content {
            CellContent::Number(n) => {
                worksheet.write_number_with_format(row, c, *n, format)?;
            }
            CellContent::Text(t) => {
                worksheet.write_string_with_format(row, c, t, format)?;
            }
            CellContent::Formula(expr) => {
                let mut formula = Formula::new(expr.render(sheet.name()));
                let address = CellAddress::new(document.id(), sheet.name(), row, col);
                if let Ok(value) = document.evaluate(&address) {
                    formula = formula.set_result(value.to_string());
                }
                worksheet.write_formula_with_format(row, c, formula, format)?;
            }
        }
    }

    worksheet.set_column_width(0, LABEL_WIDTH)?;
    for col in 1..=last_col as u16 {
        worksheet.set_column_width(col, VALUE_WIDTH)?;
    }
    Ok(())
}

fn insert_chart(worksheet: &mut Worksheet, spec: &ChartSpec) -> Result<()> {
    let (row, col) = parse_a1(&spec.anchor).ok_or_else(|| RenderError::InvalidAnchor(spec.anchor.clone()))?;
    let mut chart = Chart::new(match spec.kind {
        ChartKind::Line => ChartType::Line,
        ChartKind::Column => ChartType::Column,
    });
    chart.title().set_name(spec.title.as_str());
    for series in &spec.series {
        let s = chart.add_series();
        s.set_name(series.name.as_str()).set_values(series.values.absolute().as_str());
        if let Some(categories) = &series.categories {
            s.set_categories(categories.absolute().as_str());
        }
    }
    worksheet.insert_chart(row, col as u16, &chart)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use pretty_assertions::assert_eq;
    use tally_core::{DocumentId, LogicalKey, ModelKind, Registry};
    use tally_workbook::{Assembler, LayoutOptions};

    fn generate(id: DocumentId) -> Document {
        let registry = Registry::canonical().unwrap();
        Assembler::new(&registry, LayoutOptions::default())
            .generate(id)
            .unwrap()
    }

    #[test]
    fn written_workbook_reads_back() {
        let doc = generate(DocumentId::Standalone(ModelKind::Emission));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emission.xlsx");
        write_xlsx(&doc, &path).unwrap();

        let mut book: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["Emission Schedule", "Glossary", "Notes"]);

        let values = book.worksheet_range("Emission Schedule").unwrap();
        assert_eq!(
            values.get_value((0, 0)),
            Some(&Data::String("Emission Schedule".into()))
        );
        let rate = doc.address_of(&LogicalKey::param("emission_decay_rate")).unwrap();
        assert_eq!(values.get_value((rate.row, rate.col)), Some(&Data::Float(-0.000475)));

        let formulas = book.worksheet_formula("Emission Schedule").unwrap();
        let circulating = doc
            .address_of(&LogicalKey::quantity("emission.circulating[20]"))
            .unwrap();
        let text = formulas.get_value((circulating.row, circulating.col)).unwrap();
        let cell = doc.cell(circulating).unwrap();
        assert_eq!(text, &cell.formula().unwrap().render("Emission Schedule"));
    }

    #[test]
    fn glossary_formulas_point_at_the_model_sheet() {
        let doc = generate(DocumentId::Standalone(ModelKind::Price));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("price.xlsx");
        write_xlsx(&doc, &path).unwrap();

        let mut book: Xlsx<_> = open_workbook(&path).unwrap();
        let formulas = book.worksheet_formula("Glossary").unwrap();
        let texts: Vec<&String> = formulas.used_cells().map(|(_, _, f)| f).filter(|f| !f.is_empty()).collect();
        assert!(!texts.is_empty());
        assert!(texts.iter().all(|f| f.starts_with("'Price Trajectory'!")), "{texts:?}");
    }

    #[test]
    fn integrated_workbook_keeps_sheet_order() {
        let doc = generate(DocumentId::Integrated);
        let bytes = workbook_bytes(&doc).unwrap();
        assert!(bytes.starts_with(b"PK"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integrated.xlsx");
        write_xlsx(&doc, &path).unwrap();
        let book: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            book.sheet_names(),
            vec![
                "Emission Schedule",
                "Price Trajectory",
                "Fee Transition",
                "Host Profitability",
                "Treasury & POL",
                "Dashboard"
            ]
        );
    }

    #[test]
    fn workbook_bytes_are_reproducible() {
        let doc = generate(DocumentId::Integrated);
        let first = workbook_bytes(&doc).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = workbook_bytes(&doc).unwrap();
        assert!(first == second, "workbook bytes differ between runs");
    }

    #[test]
    fn bad_chart_anchor_is_rejected() {
        let mut doc = generate(DocumentId::Integrated);
        let mut chart = doc.charts()[0].clone();
        chart.anchor = "not-a-cell".into();
        doc.add_chart(chart);
        assert!(matches!(workbook_bytes(&doc), Err(RenderError::InvalidAnchor(_))));
    }
}
