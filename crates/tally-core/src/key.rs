//! Logical keys: stable names for values formulas may reference.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix that marks a parameter key in the textual form.
const PARAM_PREFIX: &str = "param:";

/// A stable identifier for a referenceable value.
///
/// Parameters are keyed by their catalogue key; computed quantities use a
/// dotted path owned by the builder that produces them, with an optional
/// row index (`emission.circulating[20]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalKey {
    Param(String),
    Quantity(String),
}

impl LogicalKey {
    pub fn param(key: impl Into<String>) -> Self {
        Self::Param(key.into())
    }

    pub fn quantity(path: impl Into<String>) -> Self {
        Self::Quantity(path.into())
    }

    /// Key of one row of a computed column, e.g. `price.active[4]`.
    pub fn row(column: &str, index: u32) -> Self {
        Self::Quantity(format!("{column}[{index}]"))
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }

    /// Returns the catalogue key for parameter keys.
    pub fn param_key(&self) -> Option<&str> {
        match self {
            Self::Param(k) => Some(k),
            Self::Quantity(_) => None,
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(k) => write!(f, "{PARAM_PREFIX}{k}"),
            Self::Quantity(q) => f.write_str(q),
        }
    }
}

impl From<&str> for LogicalKey {
    fn from(s: &str) -> Self {
        match s.strip_prefix(PARAM_PREFIX) {
            Some(k) => Self::Param(k.to_owned()),
            None => Self::Quantity(s.to_owned()),
        }
    }
}

impl Serialize for LogicalKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}
