//! `tally generate` -- assemble documents and write them to disk.
//!
//! Variants fail independently: a variant that does not validate or cannot
//! be written is reported and skipped, the others are still written, and the
//! command exits non-zero at the end.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tally_config::TallyConfig;
use tally_core::DocumentId;
use tally_render::write_document;
use tally_workbook::{Assembler, Document};
use tracing::info;

use crate::cli::GenerateArgs;
use crate::context::{RuntimeContext, parse_variants};
use crate::output::{ICON_FAIL, ICON_PASS, output_json, render_fail, render_muted, render_pass};

#[derive(Debug, Serialize)]
struct Written {
    variant: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<String>,
    sheets: usize,
    cells: usize,
    formulas: usize,
    fingerprint: String,
}

#[derive(Debug, Serialize)]
struct Failed {
    variant: String,
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    catalogue: String,
    written: Vec<Written>,
    failed: Vec<Failed>,
}

/// Execute the `tally generate` command.
pub fn run(ctx: &RuntimeContext, args: &GenerateArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let registry = ctx.load_registry(&config)?;
    let names = if args.variants.is_empty() {
        &config.variants
    } else {
        &args.variants
    };
    let ids = parse_variants(names)?;
    let out_dir = match &args.out {
        Some(dir) => dir.clone(),
        None => ctx.project_root()?.join(&config.output_dir),
    };
    let with_manifest = config.manifest && !args.no_manifest;

    let assembler = Assembler::new(&registry, ctx.layout_options(&config));
    let results = if args.parallel || config.parallel {
        assembler.generate_many_parallel(&ids)
    } else {
        assembler.generate_many(&ids)
    };

    let mut summary = Summary {
        catalogue: registry.version().to_string(),
        ..Summary::default()
    };
    for (id, result) in results {
        let path = out_dir.join(output_file(&config, id));
        let outcome = result
            .map_err(anyhow::Error::from)
            .and_then(|document| write(&document, registry.version(), &path, with_manifest));
        match outcome {
            Ok(written) => summary.written.push(written),
            Err(e) => summary.failed.push(Failed {
                variant: id.to_string(),
                error: format!("{e:#}"),
            }),
        }
    }
    info!(written = summary.written.len(), failed = summary.failed.len(), "generate finished");

    if ctx.json {
        output_json(&summary);
    } else {
        print_summary(ctx, &summary);
    }

    if !summary.failed.is_empty() {
        bail!("{} of {} variants failed", summary.failed.len(), ids.len());
    }
    Ok(())
}

/// File name for one variant, from the configured names.
fn output_file(config: &TallyConfig, id: DocumentId) -> String {
    match id.model() {
        None => config.integrated_file.clone(),
        Some(model) => config.standalone_file(model.as_str()),
    }
}

/// `integrated.xlsx` -> `integrated.manifest.json`
fn manifest_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.manifest.json"))
}

fn write(document: &Document, catalogue_version: &str, path: &Path, with_manifest: bool) -> Result<Written> {
    let manifest = with_manifest.then(|| manifest_path(path));
    write_document(document, catalogue_version, path, manifest.as_deref())
        .with_context(|| format!("failed to write {}", path.display()))?;
    let manifest = manifest.map(|m| m.display().to_string());
    Ok(Written {
        variant: document.id().to_string(),
        path: path.display().to_string(),
        manifest,
        sheets: document.sheets().len(),
        cells: document.cell_count(),
        formulas: document.formula_count(),
        fingerprint: document.fingerprint(),
    })
}

fn print_summary(ctx: &RuntimeContext, summary: &Summary) {
    for w in &summary.written {
        if ctx.quiet {
            continue;
        }
        println!(
            "{} {:<10} {}  {}",
            render_pass(ICON_PASS),
            w.variant,
            w.path,
            render_muted(&format!("{} sheets, {} cells, {} formulas", w.sheets, w.cells, w.formulas))
        );
    }
    for f in &summary.failed {
        println!("{} {:<10} {}", render_fail(ICON_FAIL), f.variant, f.error);
    }
}
