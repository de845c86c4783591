//! Versioned parameter catalogues.
//!
//! A catalogue is a sequence of layers, one per milestone version. Layers are
//! append-only: a later layer may add keys but never redefine one an earlier
//! layer introduced. The canonical catalogue ships embedded in the crate.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::parameter::Parameter;

/// The v1.0 research values.
const V1_0: &str = include_str!("../catalogue/v1_0.toml");

/// The v1.1 additions (revenue split, utilization scenarios, treasury).
const V1_1: &str = include_str!("../catalogue/v1_1.toml");

/// One milestone version of the catalogue, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueLayer {
    /// Version label, e.g. `v1.1`.
    pub version: String,

    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Parse a catalogue layer from a TOML string.
pub fn parse_toml(content: &str) -> Result<CatalogueLayer, CatalogueError> {
    toml::from_str(content).map_err(|e| CatalogueError::Parse(e.to_string()))
}

/// Parse a catalogue layer from a JSON string.
pub fn parse_json(content: &str) -> Result<CatalogueLayer, CatalogueError> {
    serde_json::from_str(content).map_err(|e| CatalogueError::Parse(e.to_string()))
}

/// Load a catalogue layer from a file (TOML vs JSON by extension).
pub fn load_layer(path: &Path) -> Result<CatalogueLayer, CatalogueError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content),
        Some("json") => parse_json(&content),
        _ => parse_json(&content).or_else(|_| parse_toml(&content)),
    }
}

/// An ordered, append-only collection of parameters.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    versions: Vec<String>,
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded catalogue: v1.0 followed by v1.1.
    pub fn canonical() -> Result<Self, CatalogueError> {
        let mut catalogue = Self::new();
        catalogue.apply(parse_toml(V1_0)?)?;
        catalogue.apply(parse_toml(V1_1)?)?;
        Ok(catalogue)
    }

    /// Append a layer. Every key in the layer must be new.
    pub fn apply(&mut self, layer: CatalogueLayer) -> Result<(), CatalogueError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for param in &layer.parameters {
            if !seen.insert(param.key.as_str()) {
                return Err(CatalogueError::DuplicateKey {
                    key: param.key.clone(),
                    version: layer.version.clone(),
                });
            }
            if let Some(&idx) = self.index.get(&param.key) {
                return Err(CatalogueError::Redefined {
                    key: param.key.clone(),
                    version: layer.version.clone(),
                    first: self.parameters[idx].since.clone(),
                });
            }
        }

        for mut param in layer.parameters {
            if param.since.is_empty() {
                param.since = layer.version.clone();
            }
            self.index.insert(param.key.clone(), self.parameters.len());
            self.parameters.push(param);
        }
        self.versions.push(layer.version);
        Ok(())
    }

    /// Latest applied version label (empty for an empty catalogue).
    pub fn version(&self) -> &str {
        self.versions.last().map(String::as_str).unwrap_or("")
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn into_parameters(self) -> Vec<Parameter> {
        self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
