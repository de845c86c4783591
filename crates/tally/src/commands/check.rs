//! `tally check` -- generate and validate every variant in memory.

use anyhow::{Result, bail};
use serde::Serialize;
use tally_core::DocumentId;
use tally_workbook::{Assembler, ValidationReport};

use crate::context::RuntimeContext;
use crate::output::{ICON_FAIL, ICON_PASS, output_json, render_fail, render_muted, render_pass};

#[derive(Debug, Serialize)]
struct VariantCheck {
    variant: DocumentId,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Failure caused by the catalogue or builder set, not one layout.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    configuration_bug: bool,
}

/// Execute the `tally check` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let config = ctx.load_config()?;
    let registry = ctx.load_registry(&config)?;
    let assembler = Assembler::new(&registry, ctx.layout_options(&config));

    let checks: Vec<VariantCheck> = DocumentId::all()
        .into_iter()
        .map(|id| match assembler.generate_with_report(id) {
            Ok((document, report)) => VariantCheck {
                variant: id,
                ok: true,
                report: Some(report),
                fingerprint: Some(document.fingerprint()),
                error: None,
                configuration_bug: false,
            },
            Err(e) => VariantCheck {
                variant: id,
                ok: false,
                report: None,
                fingerprint: None,
                error: Some(e.to_string()),
                configuration_bug: e.is_configuration_bug(),
            },
        })
        .collect();

    if ctx.json {
        output_json(&serde_json::json!({
            "catalogue": registry.version(),
            "parameters": registry.len(),
            "variants": checks,
        }));
    } else {
        for c in &checks {
            match (&c.report, &c.error) {
                (Some(r), _) => {
                    if !ctx.quiet {
                        println!(
                            "{} {:<10} {}",
                            render_pass(ICON_PASS),
                            c.variant.to_string(),
                            render_muted(&format!(
                                "{} cells, {} formulas, {} references, {} inputs",
                                r.cells, r.formulas, r.references, r.inputs
                            ))
                        );
                    }
                }
                (None, error) => println!(
                    "{} {:<10} {}",
                    render_fail(ICON_FAIL),
                    c.variant.to_string(),
                    error.as_deref().unwrap_or_default()
                ),
            }
        }
    }

    let failed = checks.iter().filter(|c| !c.ok).count();
    if failed > 0 {
        bail!("{failed} of {} variants failed validation", checks.len());
    }
    Ok(())
}
