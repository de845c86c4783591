//! Core types for the tally workbook engine.
//!
//! This crate owns the parameter catalogue and the immutable [`Registry`]
//! built from it, plus the addressing vocabulary shared by every other
//! crate: [`LogicalKey`], [`CellAddress`] and [`DocumentId`].

pub mod address;
pub mod catalogue;
pub mod error;
pub mod key;
pub mod parameter;
pub mod registry;
pub mod variant;

pub use address::{CellAddress, column_name, parse_a1, quote_sheet};
pub use catalogue::{Catalogue, CatalogueLayer};
pub use error::{CatalogueError, RegistryError};
pub use key::LogicalKey;
pub use parameter::{Confidence, ParamValue, Parameter};
pub use registry::Registry;
pub use variant::{DocumentId, ModelKind};
