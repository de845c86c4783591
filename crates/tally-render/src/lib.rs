//! Hand-off of finished documents to files.
//!
//! Two outputs exist: the xlsx workbook end users open ([`write_xlsx`]) and
//! a JSON manifest describing every cell ([`write_manifest`]). Both are
//! written to a temporary file beside the target and persisted in one
//! rename, so a failed write never leaves a partial file behind.
//! [`write_document`] writes the pair so that neither lands without the other.

mod bundle;
pub mod error;
pub mod manifest;
pub mod xlsx;

mod atomic;

pub use bundle::write_document;
pub use error::{RenderError, Result};
pub use manifest::{Manifest, manifest_bytes, write_manifest};
pub use xlsx::{workbook_bytes, write_xlsx};
