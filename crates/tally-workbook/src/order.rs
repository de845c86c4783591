//! Build ordering over declared builder dependencies.
//!
//! Edges come only from the static `produces`/`consumes` declarations, never
//! from inspecting formulas. Parameters are external inputs and create no
//! edges. Ties are broken by declaration order so the result is stable.

use std::collections::{BTreeSet, HashMap};

use tally_core::LogicalKey;

use crate::builder::ModelBuilder;
use crate::error::{EngineError, Result};

/// Returns builder indices in a safe build order.
pub fn build_order(builders: &[Box<dyn ModelBuilder>]) -> Result<Vec<usize>> {
    let mut producer: HashMap<LogicalKey, usize> = HashMap::new();
    for (i, b) in builders.iter().enumerate() {
        for key in b.produces() {
            if let Some(&first) = producer.get(&key) {
                return Err(EngineError::DuplicateProducer {
                    key,
                    first: builders[first].name().to_string(),
                    second: b.name().to_string(),
                });
            }
            producer.insert(key, i);
        }
    }

    let n = builders.len();
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut indegree = vec![0usize; n];
    for (i, b) in builders.iter().enumerate() {
        let mut upstream = BTreeSet::new();
        for key in b.consumes().into_iter().filter(|k| !k.is_param()) {
            match producer.get(&key) {
                Some(&p) if p != i => {
                    upstream.insert(p);
                }
                Some(_) => {}
                None => return Err(EngineError::UnresolvedReference { key }),
            }
        }
        for p in upstream {
            if dependents[p].insert(i) {
                indegree[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() < n {
        let builders = (0..n)
            .filter(|&i| indegree[i] > 0)
            .map(|i| builders[i].name().to_string())
            .collect();
        return Err(EngineError::CyclicDependency { builders });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LayoutCtx;
    use pretty_assertions::assert_eq;

    struct Stub {
        name: &'static str,
        produces: Vec<&'static str>,
        consumes: Vec<&'static str>,
    }

    impl ModelBuilder for Stub {
        fn name(&self) -> &'static str {
            self.name
        }
        fn sheet_name(&self) -> &str {
            self.name
        }
        fn produces(&self) -> BTreeSet<LogicalKey> {
            self.produces.iter().map(|k| LogicalKey::from(*k)).collect()
        }
        fn consumes(&self) -> BTreeSet<LogicalKey> {
            self.consumes.iter().map(|k| LogicalKey::from(*k)).collect()
        }
        fn layout(&self, _ctx: &mut LayoutCtx<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn stub(name: &'static str, produces: &[&'static str], consumes: &[&'static str]) -> Box<dyn ModelBuilder> {
        Box::new(Stub {
            name,
            produces: produces.to_vec(),
            consumes: consumes.to_vec(),
        })
    }

    fn names(builders: &[Box<dyn ModelBuilder>], order: &[usize]) -> Vec<&'static str> {
        order.iter().map(|&i| builders[i].name()).collect()
    }

    #[test]
    fn consumers_run_after_producers() {
        let builders = vec![
            stub("dashboard", &["dashboard.fdv"], &["price.kpi", "emission.kpi"]),
            stub("price", &["price.kpi"], &["param:token_price_initial"]),
            stub("emission", &["emission.kpi"], &["param:emission_pool"]),
        ];
        let order = build_order(&builders).unwrap();
        assert_eq!(names(&builders, &order), vec!["price", "emission", "dashboard"]);
    }

    #[test]
    fn independent_builders_keep_declaration_order() {
        let builders = vec![
            stub("emission", &["emission.kpi"], &["param:a"]),
            stub("price", &["price.kpi"], &["param:a"]),
            stub("fee", &["fee.kpi"], &["param:b"]),
        ];
        assert_eq!(build_order(&builders).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let builders = vec![
            stub("emission", &["emission.kpi"], &[]),
            stub("fee", &["fee.kpi"], &["treasury.kpi"]),
            stub("treasury", &["treasury.kpi"], &["fee.kpi"]),
        ];
        assert_eq!(
            build_order(&builders).unwrap_err(),
            EngineError::CyclicDependency {
                builders: vec!["fee".into(), "treasury".into()]
            }
        );
    }

    #[test]
    fn consumed_quantity_without_producer() {
        let builders = vec![stub("dashboard", &[], &["host.kpi.payback"])];
        assert_eq!(
            build_order(&builders).unwrap_err(),
            EngineError::UnresolvedReference {
                key: LogicalKey::quantity("host.kpi.payback")
            }
        );
    }

    #[test]
    fn duplicate_producers_are_rejected() {
        let builders = vec![stub("a", &["x.kpi"], &[]), stub("b", &["x.kpi"], &[])];
        assert!(matches!(
            build_order(&builders).unwrap_err(),
            EngineError::DuplicateProducer { .. }
        ));
    }
}
