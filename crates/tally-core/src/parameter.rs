//! Parameter data model.

use std::fmt;

use serde::{Deserialize, Serialize};

fn default_editable() -> bool {
    true
}

/// How much the research backing a value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value: numeric for anything formulas compute with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A named input value with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Stable key, unique within the registry.
    pub key: String,

    pub value: ParamValue,

    pub confidence: Confidence,

    /// Human-readable description, used as the row label.
    pub description: String,

    /// Source citation (free text).
    #[serde(default)]
    pub source: String,

    /// Unit of measure, e.g. `USD` or `tokens/epoch`.
    #[serde(default)]
    pub unit: String,

    /// Catalogue version that introduced the key (filled in by the loader).
    #[serde(default)]
    pub since: String,

    /// Whether end users may edit the value in generated documents.
    #[serde(default = "default_editable")]
    pub editable: bool,
}

impl Parameter {
    pub fn number(&self) -> Option<f64> {
        self.value.as_number()
    }
}
