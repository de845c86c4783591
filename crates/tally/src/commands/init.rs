//! `tally init` -- create a `.tally/` directory with a default config.

use std::env;

use anyhow::{Context, Result, bail};
use tally_config::config::CONFIG_FILE;
use tally_config::{TallyConfig, ensure_tally_dir, save_config};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, render_accent};

/// Execute the `tally init` command.
pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let target = match ctx.tally_dir {
        Some(ref dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };
    let tally_dir = ensure_tally_dir(&target)
        .with_context(|| format!("failed to create .tally directory in {}", target.display()))?;

    let config_path = tally_dir.join(CONFIG_FILE);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists\n\nUse --force to overwrite it with defaults.",
            config_path.display()
        );
    }

    save_config(&tally_dir, &TallyConfig::default())
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    if ctx.json {
        output_json(&serde_json::json!({
            "tally_dir": tally_dir.display().to_string(),
            "config": config_path.display().to_string(),
        }));
    } else if !ctx.quiet {
        println!("Initialized {}", render_accent(&tally_dir.display().to_string()));
        println!("Edit {} to change layout, scenarios or catalogue overlays.", CONFIG_FILE);
    }
    Ok(())
}
