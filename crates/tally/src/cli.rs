//! Clap CLI definitions for the `tally` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tally -- token economics workbook generator.
///
/// Lays out the emission, price, fee, host and treasury models as
/// spreadsheet documents whose formulas reference live parameter cells.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    about = "Token economics workbook generator",
    long_about = "Generates integrated and standalone spreadsheet models from one parameter catalogue. Every formula references live input cells.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the .tally directory (default: $TALLY_DIR, then discovered upwards).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra catalogue layer applied after the configured ones (repeatable).
    #[arg(long = "catalogue", global = true, value_name = "PATH")]
    pub catalogues: Vec<PathBuf>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate workbooks (all configured variants by default).
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// List catalogue parameters.
    Params(ParamsArgs),

    /// Show the build order for one variant.
    Plan(PlanArgs),

    /// Evaluate one cell of a variant, optionally after editing inputs.
    Eval(EvalArgs),

    /// Generate and validate every variant without writing files.
    Check,

    /// Create a .tally directory with a default config.
    Init(InitArgs),

    /// Print version information.
    Version,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Variant to generate: integrated, emission, price, fee, host, treasury (repeatable).
    #[arg(long = "variant", value_name = "VARIANT")]
    pub variants: Vec<String>,

    /// Output directory (default: output_dir from config).
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Generate variants on a thread pool.
    #[arg(long)]
    pub parallel: bool,

    /// Skip the JSON manifest beside each workbook.
    #[arg(long)]
    pub no_manifest: bool,
}

#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Only parameters the given model consumes.
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Document variant.
    pub variant: String,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Document variant.
    pub variant: String,

    /// Parameter key or quantity key to evaluate.
    pub key: String,

    /// Overwrite an input or selector before evaluating (KEY=VALUE, repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub sets: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn eval_collects_sets() {
        let cli = Cli::try_parse_from([
            "tally",
            "eval",
            "price",
            "price.kpi.terminal",
            "--set",
            "token_price_initial=1",
            "--set",
            "price.scenario=3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Eval(args)) => {
                assert_eq!(args.variant, "price");
                assert_eq!(args.sets.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tally", "check", "--json", "--catalogue", "extra.toml"]).unwrap();
        assert!(cli.global.json);
        assert_eq!(cli.global.catalogues, vec![PathBuf::from("extra.toml")]);
    }
}
