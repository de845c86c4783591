//! The model builder capability and the context builders lay out through.
//!
//! A builder never touches the [`Document`] or [`Resolver`] directly. It gets
//! a [`LayoutCtx`], which enforces the builder's declared dependency sets:
//!
//! * parameters may only be read or placed if listed in `consumes()`;
//! * another builder's quantities may only be read if listed in `consumes()`;
//! * a builder may only place quantities inside its own namespace
//!   (`"<name>."`).
//!
//! After layout, [`run_builder`] checks every declared product and every
//! consumed parameter was actually placed.

use std::collections::{BTreeMap, BTreeSet};

use tally_core::{CellAddress, DocumentId, LogicalKey, Parameter, Registry};
use tally_formula::Expr;
use tracing::debug;

use crate::block::{ChartSpec, Extent, ScenarioGroup, SheetBlock};
use crate::document::{CellContent, CellRole, Document};
use crate::error::{EngineError, Result};
use crate::resolver::Resolver;

/// One domain model (or support sheet) that can lay itself out.
pub trait ModelBuilder: Send + Sync {
    /// Stable builder name; also the namespace of its quantities.
    fn name(&self) -> &'static str;

    /// Primary sheet the builder writes to.
    fn sheet_name(&self) -> &str;

    /// Keys other builders may rely on after this one ran.
    fn produces(&self) -> BTreeSet<LogicalKey>;

    /// Parameters and foreign quantities this builder reads.
    fn consumes(&self) -> BTreeSet<LogicalKey>;

    fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()>;

    /// Prose for the standalone narrative sheet.
    fn narrative(&self) -> &'static str {
        ""
    }
}

/// Catalogue keys as consumed parameter keys.
pub fn params(keys: &[&str]) -> BTreeSet<LogicalKey> {
    keys.iter().map(|k| LogicalKey::param(*k)).collect()
}

/// Layout surface handed to one builder for one run.
pub struct LayoutCtx<'a> {
    builder: &'static str,
    namespace: String,
    registry: &'a Registry,
    resolver: &'a mut Resolver,
    document: &'a mut Document,
    consumes: BTreeSet<LogicalKey>,
    placed: Vec<LogicalKey>,
    extents: BTreeMap<String, (usize, Extent)>,
}

impl<'a> LayoutCtx<'a> {
    pub fn new(
        builder: &dyn ModelBuilder,
        registry: &'a Registry,
        resolver: &'a mut Resolver,
        document: &'a mut Document,
    ) -> Self {
        Self {
            builder: builder.name(),
            namespace: format!("{}.", builder.name()),
            registry,
            resolver,
            document,
            consumes: builder.consumes(),
            placed: Vec::new(),
            extents: BTreeMap::new(),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document.id()
    }

    /// Catalogue version of the registry in use.
    pub fn catalogue_version(&self) -> &str {
        self.registry.version()
    }

    fn check_declared(&self, key: &LogicalKey) -> Result<()> {
        let own = matches!(key, LogicalKey::Quantity(q) if q.starts_with(&self.namespace));
        if own || self.consumes.contains(key) {
            Ok(())
        } else {
            Err(EngineError::UndeclaredDependency {
                builder: self.builder.to_string(),
                key: key.clone(),
            })
        }
    }

    /// A consumed parameter's catalogue entry.
    pub fn parameter(&self, key: &str) -> Result<&'a Parameter> {
        self.check_declared(&LogicalKey::param(key))?;
        Ok(self.registry.get(key)?)
    }

    /// A consumed parameter's numeric value.
    pub fn number(&self, key: &str) -> Result<f64> {
        self.check_declared(&LogicalKey::param(key))?;
        Ok(self.registry.number(key)?)
    }

    /// Consumed parameters in catalogue order.
    pub fn consumed_parameters(&self) -> Vec<&'a Parameter> {
        let keys: BTreeSet<String> = self
            .consumes
            .iter()
            .filter_map(|k| k.param_key().map(str::to_string))
            .collect();
        self.registry.subset(&keys)
    }

    /// Where a key lives if some builder already placed it.
    pub fn placed(&self, key: &LogicalKey) -> Result<Option<CellAddress>> {
        self.check_declared(key)?;
        Ok(self.resolver.address_of(key).ok())
    }

    /// Address of an already-placed key.
    pub fn address_of(&self, key: &LogicalKey) -> Result<CellAddress> {
        self.check_declared(key)?;
        self.resolver.address_of(key)
    }

    /// A reference expression to an already-placed key.
    pub fn reference(&self, key: &LogicalKey) -> Result<Expr> {
        Ok(Expr::cell(&self.address_of(key)?))
    }

    fn track(&mut self, sheet: &str, row: u32, col: u32) {
        let order = self.extents.len();
        self.extents
            .entry(sheet.to_string())
            .and_modify(|(_, e)| e.include(row, col))
            .or_insert((order, Extent::at(row, col)));
    }

    /// Allocates `key` and writes its cell.
    pub fn place(
        &mut self,
        key: LogicalKey,
        sheet: &str,
        row: u32,
        col: u32,
        content: CellContent,
        role: CellRole,
    ) -> Result<CellAddress> {
        self.check_declared(&key)?;
        let address = self.resolver.resolve(&key, sheet, row, col)?;
        if address.coord() != (sheet, row, col) {
            return Err(EngineError::AddressCollision {
                address,
                existing: key.to_string(),
                requested: format!("second placement of {key}"),
            });
        }
        self.document.put(sheet, row, col, content, role, Some(key.clone()))?;
        self.track(sheet, row, col);
        self.placed.push(key);
        Ok(address)
    }

    pub fn place_formula(
        &mut self,
        key: LogicalKey,
        sheet: &str,
        row: u32,
        col: u32,
        expr: Expr,
    ) -> Result<CellAddress> {
        self.place(key, sheet, row, col, CellContent::Formula(expr), CellRole::Computed)
    }

    /// A structural literal such as a period index.
    pub fn place_constant(
        &mut self,
        key: LogicalKey,
        sheet: &str,
        row: u32,
        col: u32,
        value: f64,
    ) -> Result<CellAddress> {
        self.place(key, sheet, row, col, CellContent::Number(value), CellRole::Constant)
    }

    /// Surfaces a parameter's value. Editable parameters become inputs,
    /// the rest locked constants.
    pub fn place_parameter(&mut self, key: &str, sheet: &str, row: u32, col: u32) -> Result<CellAddress> {
        let param = self.parameter(key)?;
        let content = match param.number() {
            Some(n) => CellContent::Number(n),
            None => CellContent::Text(param.value.to_string()),
        };
        let role = if param.editable {
            CellRole::Input
        } else {
            CellRole::Constant
        };
        self.place(LogicalKey::param(key), sheet, row, col, content, role)
    }

    pub fn place_selector(
        &mut self,
        key: LogicalKey,
        sheet: &str,
        row: u32,
        col: u32,
        value: usize,
    ) -> Result<CellAddress> {
        self.place(key, sheet, row, col, CellContent::Number(value as f64), CellRole::Selector)
    }

    /// Writes unkeyed descriptive text.
    pub fn label(&mut self, sheet: &str, row: u32, col: u32, text: impl Into<String>) -> Result<()> {
        self.document
            .put(sheet, row, col, CellContent::Text(text.into()), CellRole::Label, None)?;
        self.track(sheet, row, col);
        Ok(())
    }

    /// Writes a row of labels starting at `col`.
    pub fn labels(&mut self, sheet: &str, row: u32, col: u32, texts: &[&str]) -> Result<()> {
        for (i, text) in texts.iter().enumerate() {
            if !text.is_empty() {
                self.label(sheet, row, col + i as u32, *text)?;
            }
        }
        Ok(())
    }

    pub fn add_chart(&mut self, chart: ChartSpec) {
        self.document.add_chart(chart);
    }

    pub fn add_scenario_group(&mut self, group: ScenarioGroup) {
        self.document.add_scenario_group(group);
    }

    fn finish(self) -> SheetBlock {
        let mut extents: Vec<_> = self.extents.into_iter().collect();
        extents.sort_by_key(|(_, (order, _))| *order);
        SheetBlock {
            builder: self.builder.to_string(),
            extents: extents.into_iter().map(|(s, (_, e))| (s, e)).collect(),
            produced: self.placed,
        }
    }
}

/// Runs one builder against a document and verifies its declarations.
pub fn run_builder(
    builder: &dyn ModelBuilder,
    registry: &Registry,
    resolver: &mut Resolver,
    document: &mut Document,
) -> Result<SheetBlock> {
    for key in builder.consumes() {
        if let Some(k) = key.param_key() {
            registry.get(k)?;
        }
    }

    let mut ctx = LayoutCtx::new(builder, registry, resolver, document);
    builder.layout(&mut ctx)?;
    let block = ctx.finish();

    for key in builder.produces() {
        if !resolver.contains(&key) {
            return Err(EngineError::MissingProduct {
                builder: builder.name().to_string(),
                key,
            });
        }
    }
    for key in builder.consumes().into_iter().filter(LogicalKey::is_param) {
        if !resolver.contains(&key) {
            return Err(EngineError::MissingProduct {
                builder: builder.name().to_string(),
                key,
            });
        }
    }

    debug!(
        builder = builder.name(),
        placed = block.produced.len(),
        sheets = block.extents.len(),
        "builder finished"
    );
    document.push_block(block.clone());
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Doubler;

    impl ModelBuilder for Doubler {
        fn name(&self) -> &'static str {
            "doubler"
        }
        fn sheet_name(&self) -> &str {
            "Double"
        }
        fn produces(&self) -> BTreeSet<LogicalKey> {
            [LogicalKey::quantity("doubler.out")].into()
        }
        fn consumes(&self) -> BTreeSet<LogicalKey> {
            params(&["token_price_initial"])
        }
        fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
            ctx.label("Double", 0, 0, "Doubler")?;
            let p = ctx.place_parameter("token_price_initial", "Double", 1, 1)?;
            ctx.place_formula(LogicalKey::quantity("doubler.out"), "Double", 2, 1, Expr::cell(&p) * 2.0)?;
            Ok(())
        }
    }

    struct Sneaky;

    impl ModelBuilder for Sneaky {
        fn name(&self) -> &'static str {
            "sneaky"
        }
        fn sheet_name(&self) -> &str {
            "Sneaky"
        }
        fn produces(&self) -> BTreeSet<LogicalKey> {
            BTreeSet::new()
        }
        fn consumes(&self) -> BTreeSet<LogicalKey> {
            BTreeSet::new()
        }
        fn layout(&self, ctx: &mut LayoutCtx<'_>) -> Result<()> {
            ctx.number("genesis_supply")?;
            Ok(())
        }
    }

    fn setup() -> (Registry, Resolver, Document) {
        (
            Registry::canonical().unwrap(),
            Resolver::new(DocumentId::Integrated),
            Document::new(DocumentId::Integrated, "t"),
        )
    }

    #[test]
    fn run_records_block_and_products() {
        let (reg, mut res, mut doc) = setup();
        let block = run_builder(&Doubler, &reg, &mut res, &mut doc).unwrap();
        assert_eq!(
            block.produced,
            vec![
                LogicalKey::param("token_price_initial"),
                LogicalKey::quantity("doubler.out")
            ]
        );
        assert_eq!(block.extent("Double"), Some(&Extent { first_row: 0, last_row: 2, first_col: 0, last_col: 1 }));
        assert_eq!(doc.value_of(&LogicalKey::quantity("doubler.out")).unwrap(), 1.0);
        assert_eq!(doc.blocks().len(), 1);
    }

    #[test]
    fn undeclared_parameter_read_is_rejected() {
        let (reg, mut res, mut doc) = setup();
        let err = run_builder(&Sneaky, &reg, &mut res, &mut doc).unwrap_err();
        assert_eq!(
            err,
            EngineError::UndeclaredDependency {
                builder: "sneaky".into(),
                key: LogicalKey::param("genesis_supply"),
            }
        );
    }

    #[test]
    fn missing_catalogue_key_fails_before_layout() {
        let reg = Registry::from_parameters("v0", Vec::new()).unwrap();
        let mut res = Resolver::new(DocumentId::Integrated);
        let mut doc = Document::new(DocumentId::Integrated, "t");
        let err = run_builder(&Doubler, &reg, &mut res, &mut doc).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownParameter {
                key: "token_price_initial".into()
            }
        );
        assert_eq!(doc.cell_count(), 0);
    }

    #[test]
    fn placing_the_same_key_twice_collides() {
        let (reg, mut res, mut doc) = setup();
        run_builder(&Doubler, &reg, &mut res, &mut doc).unwrap();
        let err = run_builder(&Doubler, &reg, &mut res, &mut doc).unwrap_err();
        assert!(matches!(err, EngineError::AddressCollision { .. }), "{err:?}");
    }
}
