//! `tally eval` -- evaluate one cell, optionally after editing inputs.
//!
//! Edits go through [`Document::set_input_key`], so only input and selector
//! cells can be changed, exactly as in the protected workbook.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tally_core::{LogicalKey, Registry};
use tally_workbook::{Assembler, Document};

use crate::cli::EvalArgs;
use crate::context::{RuntimeContext, parse_variant};
use crate::output::{format_number, output_json, render_muted};

#[derive(Debug, Serialize)]
struct EvalResult {
    variant: String,
    key: String,
    sheet: String,
    cell: String,
    value: f64,
    edits: Vec<Edit>,
}

#[derive(Debug, Serialize)]
struct Edit {
    key: String,
    value: f64,
}

/// Execute the `tally eval` command.
pub fn run(ctx: &RuntimeContext, args: &EvalArgs) -> Result<()> {
    let id = parse_variant(&args.variant)?;
    let config = ctx.load_config()?;
    let registry = ctx.load_registry(&config)?;
    let edits = args
        .sets
        .iter()
        .map(|s| parse_set(&registry, s))
        .collect::<Result<Vec<_>>>()?;

    let assembler = Assembler::new(&registry, ctx.layout_options(&config));
    let mut document = assembler
        .generate(id)
        .with_context(|| format!("failed to generate {id}"))?;

    let key = resolve_key(&registry, &args.key);
    let value = evaluate_with_edits(&mut document, &edits, &key)?;
    let address = document
        .address_of(&key)
        .with_context(|| format!("{key} is not placed in {id}"))?;

    let result = EvalResult {
        variant: id.to_string(),
        key: key.to_string(),
        sheet: address.sheet.clone(),
        cell: address.a1(),
        value,
        edits: edits
            .iter()
            .map(|(k, v)| Edit {
                key: k.to_string(),
                value: *v,
            })
            .collect(),
    };

    if ctx.json {
        output_json(&result);
    } else {
        println!("{}", format_number(result.value));
        if !ctx.quiet {
            println!(
                "{}",
                render_muted(&format!("{} at '{}'!{}", result.key, result.sheet, result.cell))
            );
        }
    }
    Ok(())
}

/// Applies edits in order, then evaluates `key`.
fn evaluate_with_edits(document: &mut Document, edits: &[(LogicalKey, f64)], key: &LogicalKey) -> Result<f64> {
    for (k, v) in edits {
        document
            .set_input_key(k, *v)
            .with_context(|| format!("cannot set {k}"))?;
    }
    document
        .value_of(key)
        .with_context(|| format!("cannot evaluate {key}"))
}

/// Bare catalogue keys name parameters; anything else is a quantity key.
fn resolve_key(registry: &Registry, text: &str) -> LogicalKey {
    if registry.contains(text) {
        LogicalKey::param(text)
    } else {
        LogicalKey::from(text)
    }
}

fn parse_set(registry: &Registry, text: &str) -> Result<(LogicalKey, f64)> {
    let Some((key, value)) = text.split_once('=') else {
        bail!("invalid --set '{text}' (expected KEY=VALUE)");
    };
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid number in --set '{text}'"))?;
    Ok((resolve_key(registry, key.trim()), value))
}
