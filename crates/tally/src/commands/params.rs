//! `tally params` -- list catalogue parameters.

use std::collections::BTreeSet;

use anyhow::Result;
use tally_core::{ModelKind, Parameter};
use tally_workbook::Assembler;

use crate::cli::ParamsArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table, render_muted};

/// Execute the `tally params` command.
pub fn run(ctx: &RuntimeContext, args: &ParamsArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let registry = ctx.load_registry(&config)?;

    let params: Vec<&Parameter> = match &args.model {
        Some(name) => {
            let kind: ModelKind = name.parse().map_err(anyhow::Error::msg)?;
            let assembler = Assembler::new(&registry, ctx.layout_options(&config));
            let keys: BTreeSet<String> = assembler
                .model_builder(kind)
                .consumes()
                .iter()
                .filter_map(|k| k.param_key().map(str::to_string))
                .collect();
            registry.subset(&keys)
        }
        None => registry.all().iter().collect(),
    };

    if ctx.json {
        output_json(&params);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = params
        .iter()
        .map(|p| {
            vec![
                p.key.clone(),
                p.value.to_string(),
                p.unit.clone(),
                p.confidence.as_str().to_string(),
                if p.editable { String::new() } else { "locked".to_string() },
            ]
        })
        .collect();
    output_table(&["KEY", "VALUE", "UNIT", "CONFIDENCE", ""], &rows);
    if !ctx.quiet {
        println!(
            "{}",
            render_muted(&format!("{} parameters, catalogue {}", params.len(), registry.version()))
        );
    }
    Ok(())
}
