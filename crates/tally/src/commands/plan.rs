//! `tally plan` -- show the build order for one variant.

use anyhow::Result;
use tally_workbook::{Assembler, document_title};

use crate::cli::PlanArgs;
use crate::context::{RuntimeContext, parse_variant};
use crate::output::{output_json, output_table, render_bold};

/// Execute the `tally plan` command.
pub fn run(ctx: &RuntimeContext, args: &PlanArgs) -> Result<()> {
    let id = parse_variant(&args.variant)?;
    let config = ctx.load_config()?;
    let registry = ctx.load_registry(&config)?;
    let assembler = Assembler::new(&registry, ctx.layout_options(&config));
    let steps = assembler.plan(id)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "variant": id,
            "title": document_title(id),
            "steps": steps,
        }));
        return Ok(());
    }

    if !ctx.quiet {
        println!("{}", render_bold(&document_title(id)));
    }
    let rows: Vec<Vec<String>> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.builder.clone(),
                s.sheet.clone(),
                s.produces.to_string(),
                s.consumes_params.to_string(),
                s.consumes_quantities.to_string(),
            ]
        })
        .collect();
    output_table(&["#", "BUILDER", "SHEET", "PRODUCES", "PARAMS", "READS"], &rows);
    Ok(())
}
