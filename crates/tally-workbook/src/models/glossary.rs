//! Glossary and notes sheets for standalone documents.

use std::collections::BTreeSet;

use tally_core::{LogicalKey, ModelKind};

use crate::builder::{LayoutCtx, ModelBuilder};
use crate::document::{CellContent, CellRole};
use crate::error::Result;

pub const SHEET: &str = "Glossary";
pub const NOTES_SHEET: &str = "Notes";

const COLUMNS: [&str; 7] = ["Key", "Description", "Value", "Unit", "Confidence", "Source", "Since"];
const VALUE_COL: u32 = 2;

pub fn param_key(key: &str) -> LogicalKey {
    LogicalKey::quantity(format!("glossary.param.{key}"))
}

pub fn figure_key(source: &LogicalKey) -> LogicalKey {
    let name = source.to_string().replacen(".kpi.", ".", 1);
    LogicalKey::quantity(format!("glossary.figure.{name}"))
}

/// Lists every parameter one model consumes, live-linked to the cell the
/// model reads, with its provenance.
#[derive(Debug, Clone)]
pub struct GlossaryBuilder {
    model: ModelKind,
    narrative: &'static str,
    consumes: BTreeSet<LogicalKey>,
    figures: Vec<LogicalKey>,
}

impl GlossaryBuilder {
    pub fn for_model(model: ModelKind, builder: &dyn ModelBuilder) -> Self {
        let produces = builder.produces();
        let figures = produces
            .iter()
            .filter(|k| matches!(k, LogicalKey::Quantity(q) if q.contains(".kpi.")))
            .cloned()
            .collect();
        let mut consumes = builder.consumes();
        consumes.extend(produces);
        Self {
            model,
            narrative: builder.narrative(),
            consumes,
            figures,
        }
    }
}

impl ModelBuilder for GlossaryBuilder {
    fn name(&self) -> &'static str {
        "glossary"
    }

    fn sheet_name(&self) -> &str {
        SHEET
    }

    fn produces(&self) -> BTreeSet<LogicalKey> {
        let params = self.consumes.iter().filter_map(|k| k.param_key()).map(param_key);
        params.chain(self.figures.iter().map(figure_key)).collect()
    }

    fn consumes(&self) -> BTreeSet<LogicalKey> {
        self.consumes.clone()
    }

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
        ctx.label(SHEET, 0, 0, format!("{} Glossary", self.model.sheet_title()))?;
        ctx.label(SHEET, 1, 0, "Every parameter this model reads, with its source")?;
        ctx.labels(SHEET, 3, 0, &COLUMNS)?;

        let parameters = ctx.consumed_parameters();
        let mut row = 4;
        for param in &parameters {
            ctx.label(SHEET, row, 0, param.key.as_str())?;
            ctx.label(SHEET, row, 1, param.description.as_str())?;
            if param.number().is_some() {
                let value = ctx.reference(&LogicalKey::param(param.key.as_str()))?;
                ctx.place_formula(param_key(&param.key), SHEET, row, VALUE_COL, value)?;
            } else {
                let text = CellContent::Text(param.value.to_string());
                ctx.place(param_key(&param.key), SHEET, row, VALUE_COL, text, CellRole::Constant)?;
            }
            let rest = [
                param.unit.as_str(),
                param.confidence.as_str(),
                param.source.as_str(),
                param.since.as_str(),
            ];
            ctx.labels(SHEET, row, VALUE_COL + 1, &rest)?;
            row += 1;
        }

        if !self.figures.is_empty() {
            row += 1;
            ctx.labels(SHEET, row, 0, &["Key figure", "", "Value"])?;
            for figure in &self.figures {
                row += 1;
                let value = ctx.reference(figure)?;
                ctx.label(SHEET, row, 0, figure.to_string())?;
                ctx.place_formula(figure_key(figure), SHEET, row, VALUE_COL, value)?;
            }
        }

        ctx.label(NOTES_SHEET, 0, 0, format!("{} Notes", self.model.sheet_title()))?;
        let mut row = 2;
        for paragraph in self.narrative.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            ctx.label(NOTES_SHEET, row, 0, paragraph)?;
            row += 2;
        }
        let version = ctx.catalogue_version().to_string();
        ctx.labels(NOTES_SHEET, row, 0, &["Catalogue version", version.as_str()])?;
        let count = parameters.len().to_string();
        ctx.labels(NOTES_SHEET, row + 1, 0, &["Parameters surfaced", count.as_str()])?;
        Ok(())
    }
}
