//! Workbook assembly: one independent run per document variant.

use rayon::prelude::*;
use serde::Serialize;
use tally_core::{DocumentId, ModelKind, Registry};
use tracing::{debug, info};

use crate::builder::{ModelBuilder, run_builder};
use crate::document::Document;
use crate::error::Result;
use crate::models::{
    DashboardBuilder, EmissionBuilder, FeeBuilder, GlossaryBuilder, HostBuilder, PriceBuilder, TreasuryBuilder,
};
use crate::order::build_order;
use crate::resolver::Resolver;
use crate::validate::{ValidationReport, validate};

/// Layout knobs shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutOptions {
    /// Years laid out by the yearly models (price, fee, host, treasury).
    pub horizon_years: u32,
    /// Schedule steps laid out by the emission model.
    pub emission_periods: u32,
    /// Initial price scenario (name or 1-based index).
    pub price_scenario: String,
    /// Initial host utilization scenario (name or 1-based index).
    pub host_scenario: String,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            horizon_years: 10,
            emission_periods: 40,
            price_scenario: "base".into(),
            host_scenario: "base".into(),
        }
    }
}

/// One builder in a variant's build order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub builder: String,
    pub sheet: String,
    pub produces: usize,
    pub consumes_params: usize,
    pub consumes_quantities: usize,
}

/// Composes builders into document variants against one shared registry.
pub struct Assembler<'r> {
    registry: &'r Registry,
    options: LayoutOptions,
}

impl<'r> Assembler<'r> {
    pub fn new(registry: &'r Registry, options: LayoutOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// The builder for one domain model, configured from the options.
    pub fn model_builder(&self, kind: ModelKind) -> Box<dyn ModelBuilder> {
        let o = &self.options;
        match kind {
            ModelKind::Emission => Box::new(EmissionBuilder::new(o.emission_periods)),
            ModelKind::Price => Box::new(PriceBuilder::new(o.horizon_years, o.price_scenario.clone())),
            ModelKind::Fee => Box::new(FeeBuilder::new(o.horizon_years)),
            ModelKind::Host => Box::new(HostBuilder::new(o.horizon_years, o.host_scenario.clone())),
            ModelKind::Treasury => Box::new(TreasuryBuilder::new(o.horizon_years)),
        }
    }

    /// Builders making up a variant, in declaration order.
    pub fn builders_for(&self, id: DocumentId) -> Vec<Box<dyn ModelBuilder>> {
        match id {
            DocumentId::Integrated => {
                let mut builders: Vec<Box<dyn ModelBuilder>> =
                    ModelKind::ALL.iter().map(|k| self.model_builder(*k)).collect();
                builders.push(Box::new(DashboardBuilder::new(
                    self.options.emission_periods,
                    self.options.horizon_years,
                )));
                builders
            }
            DocumentId::Standalone(kind) => {
                let model = self.model_builder(kind);
                let glossary = GlossaryBuilder::for_model(kind, model.as_ref());
                vec![model, Box::new(glossary)]
            }
        }
    }

    /// The build order for a variant without running anything.
    pub fn plan(&self, id: DocumentId) -> Result<Vec<PlanStep>> {
        let builders = self.builders_for(id);
        let order = build_order(&builders)?;
        Ok(order
            .into_iter()
            .map(|i| {
                let b = &builders[i];
                let consumes = b.consumes();
                let params = consumes.iter().filter(|k| k.is_param()).count();
                PlanStep {
                    builder: b.name().to_string(),
                    sheet: b.sheet_name().to_string(),
                    produces: b.produces().len(),
                    consumes_params: params,
                    consumes_quantities: consumes.len() - params,
                }
            })
            .collect())
    }

    /// Generates one variant.
    pub fn generate(&self, id: DocumentId) -> Result<Document> {
        self.generate_with_report(id).map(|(doc, _)| doc)
    }

    /// Generates one variant and returns the validator's counts with it.
    ///
    /// Any error aborts the variant; no partially built document escapes.
    pub fn generate_with_report(&self, id: DocumentId) -> Result<(Document, ValidationReport)> {
        let builders = self.builders_for(id);
        let order = build_order(&builders)?;
        debug!(document = %id, builders = builders.len(), "build order computed");

        let mut resolver = Resolver::new(id);
        let mut document = Document::new(id, document_title(id));
        for i in order {
            run_builder(builders[i].as_ref(), self.registry, &mut resolver, &mut document)?;
        }
        let report = validate(&document, &resolver)?;

        info!(
            document = %id,
            sheets = document.sheets().len(),
            cells = report.cells,
            formulas = report.formulas,
            "document generated"
        );
        Ok((document, report))
    }

    /// Generates every variant in turn. One variant failing leaves the
    /// others untouched.
    pub fn generate_all(&self) -> Vec<(DocumentId, Result<Document>)> {
        self.generate_many(&DocumentId::all())
    }

    pub fn generate_many(&self, ids: &[DocumentId]) -> Vec<(DocumentId, Result<Document>)> {
        ids.iter().map(|&id| (id, self.generate(id))).collect()
    }

    /// [`Assembler::generate_many`] across rayon's thread pool. Results come
    /// back in input order.
    pub fn generate_many_parallel(&self, ids: &[DocumentId]) -> Vec<(DocumentId, Result<Document>)> {
        ids.par_iter().map(|&id| (id, self.generate(id))).collect()
    }

    pub fn generate_all_parallel(&self) -> Vec<(DocumentId, Result<Document>)> {
        self.generate_many_parallel(&DocumentId::all())
    }
}

/// Title written into a variant's document properties.
pub fn document_title(id: DocumentId) -> String {
    match id {
        DocumentId::Integrated => "Token Economics Model (Integrated)".to_string(),
        DocumentId::Standalone(kind) => format!("{} Model", kind.sheet_title()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::document::CellContent;
    use crate::error::EngineError;
    use crate::models::{dashboard, emission, fee, host, price, treasury};
    use pretty_assertions::assert_eq;
    use tally_core::LogicalKey;

    fn registry() -> Registry {
        Registry::canonical().unwrap()
    }

    fn generate(reg: &Registry, id: DocumentId) -> Document {
        Assembler::new(reg, LayoutOptions::default()).generate(id).unwrap()
    }

    fn value(doc: &Document, key: LogicalKey) -> f64 {
        doc.value_of(&key).unwrap()
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1.0)
    }

    #[test]
    fn every_variant_generates_and_validates() {
        let reg = registry();
        for (id, result) in Assembler::new(&reg, LayoutOptions::default()).generate_all() {
            let doc = result.unwrap_or_else(|e| panic!("{id}: {e}"));
            assert!(doc.formula_count() > 0, "{id} has no formulas");
        }
    }

    #[test]
    fn emission_halves_at_epoch_1460() {
        let reg = registry();
        let doc = generate(&reg, DocumentId::Standalone(ModelKind::Emission));
        assert_eq!(value(&doc, emission::epoch(20)), 1460.0);
        let factor = value(&doc, emission::factor(20));
        assert!(close(factor, (-0.000475f64 * 1460.0).exp(), 1e-12));
        assert!((factor - 0.5).abs() < 1e-3, "factor {factor}");

        let kpi = value(&doc, LogicalKey::quantity(emission::KPI_DECAY_FACTOR));
        assert!(close(kpi, factor, 1e-12));
        let half_life = value(&doc, LogicalKey::quantity(emission::KPI_HALF_LIFE));
        assert!((half_life - 1459.24).abs() < 0.1, "half-life {half_life}");
    }

    #[test]
    fn revenue_split_sums_to_one_on_every_row() {
        let reg = registry();
        let doc = generate(&reg, DocumentId::Integrated);
        for y in 0..=10 {
            let check = value(&doc, fee::split_check(y));
            assert!((check - 1.0).abs() < 1e-9, "year {y}: {check}");
        }
        let total = value(&doc, LogicalKey::quantity(fee::KPI_SPLIT_TOTAL));
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn treasury_inflow_matches_fee_buyback_column() {
        let reg = registry();
        let doc = generate(&reg, DocumentId::Integrated);
        for y in 0..=10 {
            let fee_side = value(&doc, LogicalKey::row("fee.buyback", y));
            let treasury_side = value(&doc, LogicalKey::row("treasury.buyback", y));
            assert!(close(treasury_side, fee_side, 1e-12), "year {y}: {treasury_side} vs {fee_side}");
        }
    }

    #[test]
    fn standalone_surfaces_exactly_the_consumed_parameters() {
        let reg = registry();
        let asm = Assembler::new(&reg, LayoutOptions::default());
        for kind in ModelKind::ALL {
            let doc = asm.generate(DocumentId::Standalone(kind)).unwrap();
            let surfaced: BTreeSet<LogicalKey> = doc
                .keyed_cells()
                .into_iter()
                .map(|(k, _)| k.clone())
                .filter(LogicalKey::is_param)
                .collect();
            let declared: BTreeSet<LogicalKey> = asm
                .model_builder(kind)
                .consumes()
                .into_iter()
                .filter(LogicalKey::is_param)
                .collect();
            assert_eq!(surfaced, declared, "{kind}");

            let glossary = doc.sheet("Glossary").unwrap();
            let listed = glossary.cells().filter(|(_, c, _)| *c == 0).count();
            // title, subtitle and header occupy column A too
            assert!(listed >= declared.len() + 3);
        }
    }

    #[test]
    fn glossary_values_follow_edited_inputs() {
        let reg = registry();
        let mut doc = generate(&reg, DocumentId::Standalone(ModelKind::Price));
        let glossary_price = crate::models::glossary::param_key("token_price_initial");
        assert_eq!(value(&doc, glossary_price.clone()), 0.5);
        doc.set_input_key(&LogicalKey::param("token_price_initial"), 2.0).unwrap();
        assert_eq!(value(&doc, glossary_price), 2.0);
    }

    #[test]
    fn switching_scenario_only_changes_active_values() {
        let reg = registry();
        let mut doc = generate(&reg, DocumentId::Integrated);
        let base = value(&doc, price::active(4));
        assert!(close(base, 0.5 * 1.25f64.powi(4), 1e-12));
        let columns_before: Vec<_> = (0..3)
            .map(|s| {
                let addr = doc.address_of(&price::scenario_column(s, 4)).unwrap();
                doc.cell(addr).unwrap().clone()
            })
            .collect();

        doc.set_input_key(&LogicalKey::quantity(price::SELECTOR), 1.0).unwrap();
        let bear = value(&doc, price::active(4));
        assert!(close(bear, 0.5 * 0.7f64.powi(4), 1e-12));
        assert_eq!(value(&doc, price::active(4)), bear);

        let columns_after: Vec<_> = (0..3)
            .map(|s| {
                let addr = doc.address_of(&price::scenario_column(s, 4)).unwrap();
                doc.cell(addr).unwrap().clone()
            })
            .collect();
        assert_eq!(columns_before, columns_after);
        assert!(close(value(&doc, price::scenario_column(1, 4)), base, 1e-12));
    }

    #[test]
    fn initial_scenario_comes_from_options() {
        let reg = registry();
        let options = LayoutOptions {
            price_scenario: "bull".into(),
            ..LayoutOptions::default()
        };
        let doc = Assembler::new(&reg, options)
            .generate(DocumentId::Standalone(ModelKind::Price))
            .unwrap();
        assert_eq!(value(&doc, price::active(1)), 1.0);
        assert_eq!(doc.scenario_groups()[0].default, 3);
    }

    #[test]
    fn unknown_scenario_aborts_the_variant() {
        let reg = registry();
        let options = LayoutOptions {
            host_scenario: "extreme".into(),
            ..LayoutOptions::default()
        };
        let asm = Assembler::new(&reg, options);
        let err = asm.generate(DocumentId::Standalone(ModelKind::Host)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidScenario { ref group, .. } if group == "host"));
        // other variants are unaffected
        assert!(asm.generate(DocumentId::Standalone(ModelKind::Emission)).is_ok());
    }

    #[test]
    fn missing_catalogue_key_is_reported() {
        let canonical = registry();
        let params = canonical
            .all()
            .iter()
            .filter(|p| p.key != "split_hosts")
            .cloned()
            .collect();
        let reg = Registry::from_parameters(canonical.version(), params).unwrap();
        let asm = Assembler::new(&reg, LayoutOptions::default());
        assert_eq!(
            asm.generate(DocumentId::Integrated).unwrap_err(),
            EngineError::UnknownParameter {
                key: "split_hosts".into()
            }
        );
        assert!(asm.generate(DocumentId::Standalone(ModelKind::Price)).is_ok());
    }

    #[test]
    fn integrated_reuses_parameters_across_sheets() {
        let reg = registry();
        let integrated = generate(&reg, DocumentId::Integrated);
        let pool = integrated.address_of(&LogicalKey::param("emission_pool")).unwrap();
        assert_eq!(pool.sheet, "Emission Schedule");

        let standalone = generate(&reg, DocumentId::Standalone(ModelKind::Fee));
        let pool = standalone.address_of(&LogicalKey::param("emission_pool")).unwrap();
        assert_eq!(pool.sheet, "Fee Transition");
        assert_eq!(pool.document, DocumentId::Standalone(ModelKind::Fee));
    }

    #[test]
    fn dashboard_mirrors_model_figures() {
        let reg = registry();
        let doc = generate(&reg, DocumentId::Integrated);
        let circulating = value(&doc, LogicalKey::quantity(emission::KPI_CIRCULATING));
        assert_eq!(value(&doc, dashboard::mirror_key(emission::KPI_CIRCULATING)), circulating);
        let year4 = value(&doc, LogicalKey::quantity(price::KPI_YEAR4));
        let market_cap = value(&doc, LogicalKey::quantity(dashboard::MARKET_CAP));
        assert!(close(market_cap, circulating * year4, 1e-12));
        assert_eq!(value(&doc, LogicalKey::quantity(treasury::KPI_RUNWAY)), 2.5);

        let charts = doc.charts();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].series[0].values.from.sheet, "Emission Schedule");
        assert_eq!(charts[0].series[0].values.to.row - charts[0].series[0].values.from.row, 40);
    }

    #[test]
    fn dashboard_labels_follow_a_short_horizon() {
        let reg = registry();
        let options = LayoutOptions {
            horizon_years: 3,
            ..LayoutOptions::default()
        };
        let doc = Assembler::new(&reg, options).generate(DocumentId::Integrated).unwrap();
        let labels: Vec<String> = doc
            .sheet(dashboard::SHEET)
            .unwrap()
            .cells()
            .filter_map(|(_, _, cell)| match &cell.content {
                CellContent::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect();

        assert!(labels.iter().any(|l| l == "Active price, year 3"), "{labels:?}");
        assert!(labels.iter().any(|l| l == "Market cap at KPI epoch, year 3 price"));
        assert!(labels.iter().all(|l| !l.contains("year 4")), "{labels:?}");
        assert_eq!(
            value(&doc, LogicalKey::quantity(price::KPI_YEAR4)),
            value(&doc, price::active(3))
        );
    }

    #[test]
    fn host_payback_is_outlay_over_first_year() {
        let reg = registry();
        let doc = generate(&reg, DocumentId::Standalone(ModelKind::Host));
        let capex = value(&doc, LogicalKey::quantity(host::CAPEX));
        assert_eq!(capex, 200_000.0);
        let first = value(&doc, host::net_active(1));
        assert!(first > 0.0);
        let payback = value(&doc, LogicalKey::quantity(host::KPI_PAYBACK));
        assert!(close(payback, capex / first, 1e-12));
        let cumulative = value(&doc, host::cumulative(1));
        assert!(close(cumulative, first - capex, 1e-12));
    }

    #[test]
    fn generation_is_reproducible_and_leaves_registry_alone() {
        let reg = registry();
        let before = reg.fingerprint();
        let asm = Assembler::new(&reg, LayoutOptions::default());
        let first: Vec<String> = asm
            .generate_all()
            .into_iter()
            .map(|(_, d)| d.unwrap().fingerprint())
            .collect();
        let second: Vec<String> = asm
            .generate_all_parallel()
            .into_iter()
            .map(|(_, d)| d.unwrap().fingerprint())
            .collect();
        assert_eq!(first, second);
        assert_eq!(reg.fingerprint(), before);
        let distinct: BTreeSet<_> = first.iter().collect();
        assert_eq!(distinct.len(), first.len());
    }

    #[test]
    fn plan_puts_dashboard_last() {
        let reg = registry();
        let asm = Assembler::new(&reg, LayoutOptions::default());
        let plan = asm.plan(DocumentId::Integrated).unwrap();
        let names: Vec<_> = plan.iter().map(|s| s.builder.as_str()).collect();
        assert_eq!(names, vec!["emission", "price", "fee", "host", "treasury", "dashboard"]);
        assert_eq!(plan[5].consumes_params, 0);

        let plan = asm.plan(DocumentId::Standalone(ModelKind::Fee)).unwrap();
        assert_eq!(plan[1].builder, "glossary");
        assert_eq!(plan[1].consumes_params, 13);
    }
}
