//! The parameter registry: the single, read-only source of truth for values.
//!
//! A [`Registry`] is built once from a [`Catalogue`] and then shared by
//! reference with every builder. It exposes no mutation after construction.

use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

use crate::catalogue::Catalogue;
use crate::error::{CatalogueError, RegistryError};
use crate::parameter::{ParamValue, Parameter};

/// Separator byte written between hashed fields.
const SEP: u8 = 0;

/// Immutable catalogue of parameters, in catalogue order.
#[derive(Debug, Clone)]
pub struct Registry {
    version: String,
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from an already-layered catalogue.
    pub fn from_catalogue(catalogue: Catalogue) -> Result<Self, RegistryError> {
        let version = catalogue.version().to_string();
        Self::from_parameters(version, catalogue.into_parameters())
    }

    /// Build a registry from a flat parameter list. Keys must be unique.
    pub fn from_parameters(
        version: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(parameters.len());
        for (i, p) in parameters.iter().enumerate() {
            if index.insert(p.key.clone(), i).is_some() {
                return Err(RegistryError::DuplicateKey { key: p.key.clone() });
            }
        }
        Ok(Self {
            version: version.into(),
            parameters,
            index,
        })
    }

    /// The registry over the embedded canonical catalogue.
    pub fn canonical() -> Result<Self, CatalogueError> {
        let catalogue = Catalogue::canonical()?;
        Ok(Self::from_catalogue(catalogue)?)
    }

    /// Look up a parameter by key.
    pub fn get(&self, key: &str) -> Result<&Parameter, RegistryError> {
        self.index
            .get(key)
            .map(|&i| &self.parameters[i])
            .ok_or_else(|| RegistryError::unknown(key))
    }

    /// Look up a numeric parameter value.
    pub fn number(&self, key: &str) -> Result<f64, RegistryError> {
        self.get(key)?
            .number()
            .ok_or_else(|| RegistryError::NotNumeric { key: key.into() })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Every parameter, in catalogue order.
    pub fn all(&self) -> &[Parameter] {
        &self.parameters
    }

    /// The parameters whose keys are in `keys`, in catalogue order.
    pub fn subset(&self, keys: &BTreeSet<String>) -> Vec<&Parameter> {
        self.parameters
            .iter()
            .filter(|p| keys.contains(&p.key))
            .collect()
    }

    /// Catalogue version the registry was built from.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// SHA-256 hex digest over every parameter, in order.
    ///
    /// Two registries with the same fingerprint hold identical contents.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        write_str(&mut h, &self.version);
        for p in &self.parameters {
            write_str(&mut h, &p.key);
            match &p.value {
                ParamValue::Number(n) => {
                    h.update(b"n");
                    h.update(n.to_bits().to_le_bytes());
                    h.update([SEP]);
                }
                ParamValue::Text(s) => {
                    h.update(b"t");
                    write_str(&mut h, s);
                }
            }
            write_str(&mut h, p.confidence.as_str());
            write_str(&mut h, &p.description);
            write_str(&mut h, &p.source);
            write_str(&mut h, &p.unit);
            write_str(&mut h, &p.since);
            h.update([u8::from(p.editable), SEP]);
        }
        format!("{:x}", h.finalize())
    }
}

fn write_str(h: &mut Sha256, s: &str) {
    h.update(s.as_bytes());
    h.update([SEP]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Confidence;
    use pretty_assertions::assert_eq;

    fn param(key: &str, value: ParamValue) -> Parameter {
        Parameter {
            key: key.into(),
            value,
            confidence: Confidence::Low,
            description: key.to_uppercase(),
            source: "test".into(),
            unit: String::new(),
            since: "v0".into(),
            editable: true,
        }
    }

    #[test]
    fn get_unknown_key_fails() {
        let reg = Registry::canonical().unwrap();
        let err = reg.get("no_such_key").unwrap_err();
        assert_eq!(err, RegistryError::unknown("no_such_key"));
        assert_eq!(err.key(), "no_such_key");
    }

    #[test]
    fn number_rejects_text() {
        let reg = Registry::from_parameters(
            "v0",
            vec![param("label", ParamValue::Text("abc".into()))],
        )
        .unwrap();
        assert!(matches!(reg.number("label"), Err(RegistryError::NotNumeric { .. })));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = Registry::from_parameters(
            "v0",
            vec![
                param("a", ParamValue::Number(1.0)),
                param("a", ParamValue::Number(2.0)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKey { key: "a".into() });
    }

    #[test]
    fn subset_keeps_catalogue_order() {
        let reg = Registry::canonical().unwrap();
        let keys: BTreeSet<String> = ["split_yield", "genesis_supply", "missing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let subset: Vec<&str> = reg.subset(&keys).iter().map(|p| p.key.as_str()).collect();
        assert_eq!(subset, vec!["genesis_supply", "split_yield"]);
    }

    #[test]
    fn canonical_split_sums_to_one() {
        let reg = Registry::canonical().unwrap();
        let total: f64 = ["split_hosts", "split_ai_fund", "split_buyback", "split_yield"]
            .iter()
            .map(|k| reg.number(k).unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = Registry::canonical().unwrap();
        let b = Registry::canonical().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut params = a.all().to_vec();
        params[0].value = ParamValue::Number(1.0);
        let c = Registry::from_parameters(a.version(), params).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
