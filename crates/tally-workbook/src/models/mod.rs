//! The five domain models plus the dashboard and glossary support sheets.

pub mod common;
pub mod dashboard;
pub mod emission;
pub mod fee;
pub mod glossary;
pub mod host;
pub mod price;
pub mod treasury;

pub use dashboard::DashboardBuilder;
pub use emission::EmissionBuilder;
pub use fee::FeeBuilder;
pub use glossary::GlossaryBuilder;
pub use host::HostBuilder;
pub use price::PriceBuilder;
pub use treasury::TreasuryBuilder;
