//! Workbook assembly for the tally engine.
//!
//! Builders lay out their models through a per-document [`Resolver`], which
//! turns logical keys into concrete cell coordinates. The [`Assembler`]
//! orders builders by their declared dependencies, runs them, validates the
//! result and hands back a finished in-memory [`Document`].
//!
//! ```no_run
//! use tally_core::{DocumentId, Registry};
//! use tally_workbook::{Assembler, LayoutOptions};
//!
//! let registry = Registry::canonical()?;
//! let assembler = Assembler::new(&registry, LayoutOptions::default());
//! let document = assembler.generate(DocumentId::Integrated)?;
//! println!("{} cells", document.cell_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assembler;
pub mod block;
pub mod builder;
pub mod document;
pub mod error;
pub mod models;
pub mod order;
pub mod resolver;
pub mod scenario;
pub mod validate;

pub use assembler::{Assembler, LayoutOptions, PlanStep, document_title};
pub use block::{CellRange, ChartKind, ChartSeries, ChartSpec, Extent, ScenarioGroup, SheetBlock};
pub use builder::{LayoutCtx, ModelBuilder, run_builder};
pub use document::{Cell, CellContent, CellRole, Document, Sheet};
pub use error::{DanglingReason, EngineError, Result};
pub use order::build_order;
pub use resolver::Resolver;
pub use scenario::{HOST_SCENARIOS, PRICE_SCENARIOS, ScenarioToggle, scenario_index};
pub use validate::{ValidationReport, validate};
