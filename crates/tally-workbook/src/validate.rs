//! Post-build sweep over a finished document.

use std::collections::HashSet;

use serde::Serialize;
use tally_formula::Expr;
use tracing::debug;

use crate::document::{CellContent, CellRole, Document};
use crate::error::{DanglingReason, EngineError, Result};
use crate::resolver::Resolver;

/// Counts gathered by a successful sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub cells: usize,
    pub formulas: usize,
    pub references: usize,
    pub inputs: usize,
    pub scenario_groups: usize,
}

/// Checks references, injectivity, protection and selector ranges.
///
/// The first violation aborts; a document that fails must not be handed on.
pub fn validate(document: &Document, resolver: &Resolver) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    check_injective(document, resolver)?;

    for (address, cell) in document.cells() {
        report.cells += 1;
        check_protection(&address, cell.role, cell.locked, &cell.content)?;
        if cell.role.is_editable() {
            report.inputs += 1;
        }

        let Some(expr) = cell.formula() else { continue };
        report.formulas += 1;
        for target in references(expr) {
            report.references += 1;
            let dangling = |reason| EngineError::DanglingReference {
                cell: address.clone(),
                target: target.clone(),
                reason,
            };
            if target.document != document.id() {
                return Err(dangling(DanglingReason::ForeignDocument));
            }
            let Some(target_cell) = document.cell(&target) else {
                return Err(dangling(DanglingReason::Unallocated));
            };
            if resolver.key_at(&target).is_none() {
                return Err(dangling(DanglingReason::Unallocated));
            }
            if target_cell.seq >= cell.seq {
                return Err(dangling(DanglingReason::Forward));
            }
            if matches!(target_cell.content, CellContent::Text(_)) {
                return Err(dangling(DanglingReason::TextTarget));
            }
        }
    }

    for group in document.scenario_groups() {
        report.scenario_groups += 1;
        let value = match document.cell(&group.selector).map(|c| &c.content) {
            Some(CellContent::Number(n)) => *n,
            _ => f64::NAN,
        };
        let in_range = value.fract() == 0.0 && value >= 1.0 && value <= group.options.len() as f64;
        if !in_range {
            return Err(EngineError::InvalidScenario {
                group: group.name.clone(),
                value: value.to_string(),
                options: group.options.clone(),
            });
        }
    }

    debug!(
        document = %document.id(),
        cells = report.cells,
        formulas = report.formulas,
        references = report.references,
        "validated"
    );
    Ok(report)
}

/// Referenced addresses, each once. Range endpoints on a foreign sheet are
/// reported as-is so the document check can reject them.
fn references(expr: &Expr) -> Vec<tally_core::CellAddress> {
    let mut seen = HashSet::new();
    expr.references()
        .into_iter()
        .filter(|a| seen.insert(a.clone()))
        .collect()
}

fn check_injective(document: &Document, resolver: &Resolver) -> Result<()> {
    let mut coords = HashSet::new();
    for (key, address) in resolver.placements() {
        if !coords.insert(address.clone()) {
            return Err(EngineError::AddressCollision {
                address: address.clone(),
                existing: resolver
                    .key_at(address)
                    .map(|k| k.to_string())
                    .unwrap_or_default(),
                requested: key.to_string(),
            });
        }
        let owner = document.cell(address).and_then(|c| c.key.as_ref());
        if owner != Some(key) {
            return Err(EngineError::AddressCollision {
                address: address.clone(),
                existing: owner.map(|k| k.to_string()).unwrap_or_else(|| "nothing".into()),
                requested: key.to_string(),
            });
        }
    }
    Ok(())
}

fn check_protection(
    address: &tally_core::CellAddress,
    role: CellRole,
    locked: bool,
    content: &CellContent,
) -> Result<()> {
    match role {
        CellRole::Input | CellRole::Selector => {
            if locked {
                return Err(EngineError::protection(address, "editable cell is locked"));
            }
            if matches!(content, CellContent::Formula(_)) {
                return Err(EngineError::protection(address, "editable cell holds a formula"));
            }
        }
        CellRole::Computed | CellRole::Constant | CellRole::Label => {
            if !locked {
                return Err(EngineError::protection(
                    address,
                    format!("{} cell is unlocked", role.as_str()),
                ));
            }
            if role == CellRole::Computed && !matches!(content, CellContent::Formula(_)) {
                return Err(EngineError::protection(address, "computed cell holds a literal"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tally_core::{CellAddress, DocumentId, LogicalKey, ModelKind};

    use crate::block::ScenarioGroup;

    fn place(
        doc: &mut Document,
        res: &mut Resolver,
        key: &str,
        row: u32,
        content: CellContent,
        role: CellRole,
    ) -> CellAddress {
        let key = LogicalKey::from(key);
        res.resolve(&key, "S", row, 1).unwrap();
        doc.put("S", row, 1, content, role, Some(key)).unwrap()
    }

    fn fresh() -> (Document, Resolver) {
        (
            Document::new(DocumentId::Integrated, "t"),
            Resolver::new(DocumentId::Integrated),
        )
    }

    #[test]
    fn well_formed_document_passes() {
        let (mut doc, mut res) = fresh();
        let a = place(&mut doc, &mut res, "param:a", 0, CellContent::Number(3.0), CellRole::Input);
        place(
            &mut doc,
            &mut res,
            "s.b",
            1,
            CellContent::Formula(Expr::cell(&a) * 2.0),
            CellRole::Computed,
        );
        let report = validate(&doc, &res).unwrap();
        assert_eq!(report.formulas, 1);
        assert_eq!(report.references, 1);
        assert_eq!(report.inputs, 1);
    }

    #[test]
    fn forward_reference_is_dangling() {
        let (mut doc, mut res) = fresh();
        let later = CellAddress::new(DocumentId::Integrated, "S", 1, 1);
        let first = place(
            &mut doc,
            &mut res,
            "s.first",
            0,
            CellContent::Formula(Expr::cell(&later) + 1.0),
            CellRole::Computed,
        );
        place(&mut doc, &mut res, "param:x", 1, CellContent::Number(1.0), CellRole::Input);
        assert_eq!(
            validate(&doc, &res).unwrap_err(),
            EngineError::DanglingReference {
                cell: first,
                target: later,
                reason: DanglingReason::Forward,
            }
        );
    }

    #[test]
    fn reference_to_text_is_dangling() {
        let (mut doc, mut res) = fresh();
        let label = place(
            &mut doc,
            &mut res,
            "param:region",
            0,
            CellContent::Text("EU".into()),
            CellRole::Input,
        );
        let sum = place(
            &mut doc,
            &mut res,
            "s.sum",
            1,
            CellContent::Formula(Expr::cell(&label) + 1.0),
            CellRole::Computed,
        );
        assert_eq!(
            validate(&doc, &res).unwrap_err(),
            EngineError::DanglingReference {
                cell: sum,
                target: label,
                reason: DanglingReason::TextTarget,
            }
        );
    }

    #[test]
    fn selector_outside_its_options_is_rejected() {
        let options = vec!["Bear".to_string(), "Base".to_string(), "Bull".to_string()];
        for value in [0.0, 4.0, 2.5] {
            let (mut doc, mut res) = fresh();
            let selector = place(
                &mut doc,
                &mut res,
                "s.scenario",
                0,
                CellContent::Number(value),
                CellRole::Selector,
            );
            doc.add_scenario_group(ScenarioGroup {
                name: "price".into(),
                selector,
                options: options.clone(),
                default: 2,
            });
            assert_eq!(
                validate(&doc, &res).unwrap_err(),
                EngineError::InvalidScenario {
                    group: "price".into(),
                    value: value.to_string(),
                    options: options.clone(),
                },
                "selector value {value}"
            );
        }
    }

    #[test]
    fn selector_within_its_options_passes() {
        let (mut doc, mut res) = fresh();
        let selector = place(
            &mut doc,
            &mut res,
            "s.scenario",
            0,
            CellContent::Number(3.0),
            CellRole::Selector,
        );
        doc.add_scenario_group(ScenarioGroup {
            name: "price".into(),
            selector,
            options: vec!["Bear".into(), "Base".into(), "Bull".into()],
            default: 3,
        });
        assert_eq!(validate(&doc, &res).unwrap().scenario_groups, 1);
    }

    #[test]
    fn reference_into_another_document_is_dangling() {
        let (mut doc, mut res) = fresh();
        let foreign = CellAddress::new(DocumentId::Standalone(ModelKind::Price), "S", 0, 1);
        place(
            &mut doc,
            &mut res,
            "s.x",
            0,
            CellContent::Formula(Expr::cell(&foreign)),
            CellRole::Computed,
        );
        let err = validate(&doc, &res).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DanglingReference {
                reason: DanglingReason::ForeignDocument,
                ..
            }
        ));
    }

    #[test]
    fn reference_to_unkeyed_or_missing_cell_is_dangling() {
        let (mut doc, mut res) = fresh();
        doc.put("S", 0, 0, CellContent::Number(1.0), CellRole::Constant, None)
            .unwrap();
        let unkeyed = CellAddress::new(DocumentId::Integrated, "S", 0, 0);
        place(
            &mut doc,
            &mut res,
            "s.x",
            1,
            CellContent::Formula(Expr::cell(&unkeyed)),
            CellRole::Computed,
        );
        let err = validate(&doc, &res).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DanglingReference {
                reason: DanglingReason::Unallocated,
                ..
            }
        ));
    }

    #[test]
    fn locked_input_violates_protection() {
        let (mut doc, mut res) = fresh();
        let a = place(&mut doc, &mut res, "param:a", 0, CellContent::Number(3.0), CellRole::Input);
        doc.cell_mut(&a).unwrap().locked = true;
        assert!(matches!(
            validate(&doc, &res).unwrap_err(),
            EngineError::ProtectionPolicy { .. }
        ));
    }

    #[test]
    fn computed_literal_violates_protection() {
        let (mut doc, mut res) = fresh();
        place(&mut doc, &mut res, "s.x", 0, CellContent::Number(3.0), CellRole::Computed);
        let err = validate(&doc, &res).unwrap_err();
        assert_eq!(err.to_string(), "protection policy violated at integrated/S!B1: computed cell holds a literal");
    }

    #[test]
    fn resolver_and_document_disagreement_is_a_collision() {
        let (mut doc, mut res) = fresh();
        place(&mut doc, &mut res, "param:a", 0, CellContent::Number(3.0), CellRole::Input);
        res.resolve(&LogicalKey::param("ghost"), "S", 5, 5).unwrap();
        assert!(matches!(
            validate(&doc, &res).unwrap_err(),
            EngineError::AddressCollision { .. }
        ));
    }
}
