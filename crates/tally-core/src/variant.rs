//! Document variants and the domain models they are assembled from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One domain model of the tokenomics workbook family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Emission,
    Price,
    Fee,
    Host,
    Treasury,
}

impl ModelKind {
    /// Every model, in canonical document order.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Emission,
        ModelKind::Price,
        ModelKind::Fee,
        ModelKind::Host,
        ModelKind::Treasury,
    ];

    /// Returns the short identifier used in file names and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emission => "emission",
            Self::Price => "price",
            Self::Fee => "fee",
            Self::Host => "host",
            Self::Treasury => "treasury",
        }
    }

    /// Returns the sheet title the model is laid out on.
    pub fn sheet_title(&self) -> &'static str {
        match self {
            Self::Emission => "Emission Schedule",
            Self::Price => "Price Trajectory",
            Self::Fee => "Fee Transition",
            Self::Host => "Host Profitability",
            Self::Treasury => "Treasury & POL",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emission" | "emissions" => Ok(Self::Emission),
            "price" => Ok(Self::Price),
            "fee" | "fees" => Ok(Self::Fee),
            "host" | "hosts" => Ok(Self::Host),
            "treasury" | "pol" => Ok(Self::Treasury),
            other => Err(format!("unknown model '{other}'")),
        }
    }
}

/// Identity of one generated document. Each variant owns its own address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    /// Every model plus the cross-model dashboard in one multi-sheet document.
    Integrated,
    /// One model with its glossary and narrative sheets.
    Standalone(ModelKind),
}

impl DocumentId {
    /// Every document variant, integrated first.
    pub fn all() -> Vec<DocumentId> {
        let mut out = vec![DocumentId::Integrated];
        out.extend(ModelKind::ALL.iter().map(|m| DocumentId::Standalone(*m)));
        out
    }

    /// Returns the model for standalone documents.
    pub fn model(&self) -> Option<ModelKind> {
        match self {
            Self::Integrated => None,
            Self::Standalone(m) => Some(*m),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrated => f.write_str("integrated"),
            Self::Standalone(m) => write!(f, "{m}"),
        }
    }
}

impl FromStr for DocumentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("integrated") {
            return Ok(Self::Integrated);
        }
        let model = s.strip_prefix("standalone:").unwrap_or(s);
        model.parse::<ModelKind>().map(Self::Standalone)
    }
}

impl Serialize for DocumentId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
