//! Command handlers, one module per subcommand.

pub mod check;
pub mod eval;
pub mod generate;
pub mod init;
pub mod params;
pub mod plan;
pub mod version;
