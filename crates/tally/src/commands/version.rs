//! `tally version` -- print version, catalogue version and platform.

use anyhow::Result;
use tally_core::Catalogue;

use crate::context::RuntimeContext;
use crate::output::output_json;

/// Version string. Set at compile time via Cargo.toml (workspace version).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Execute the `tally version` command.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    let catalogue = Catalogue::canonical()?;

    if ctx.json {
        let info = serde_json::json!({
            "version": VERSION,
            "catalogue": catalogue.version(),
            "os": os,
            "arch": arch,
        });
        output_json(&info);
    } else {
        println!(
            "tally version {} (catalogue {}) {}/{}",
            VERSION,
            catalogue.version(),
            os,
            arch
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_constant_exists() {
        assert!(!VERSION.is_empty());
    }
}
