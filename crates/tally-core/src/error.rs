//! Error types for catalogue loading and registry lookups.

/// Errors raised while parsing or layering parameter catalogues.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("parse error: {0}")]
    Parse(String),

    /// The same key appears twice within one catalogue layer.
    #[error("duplicate parameter '{key}' in catalogue {version}")]
    DuplicateKey { key: String, version: String },

    /// A later layer tried to redefine a key an earlier layer introduced.
    #[error("catalogue {version} redefines parameter '{key}' (introduced in {first})")]
    Redefined {
        key: String,
        version: String,
        first: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by [`crate::Registry`] lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A builder asked for a key the catalogue does not define.
    #[error("unknown parameter: {key}")]
    UnknownParameter { key: String },

    /// A numeric value was requested for a textual parameter.
    #[error("parameter {key} is not numeric")]
    NotNumeric { key: String },

    #[error("duplicate parameter key: {key}")]
    DuplicateKey { key: String },
}

impl RegistryError {
    pub fn unknown(key: impl Into<String>) -> Self {
        Self::UnknownParameter { key: key.into() }
    }

    /// Returns the parameter key the error is about.
    pub fn key(&self) -> &str {
        match self {
            Self::UnknownParameter { key }
            | Self::NotNumeric { key }
            | Self::DuplicateKey { key } => key,
        }
    }
}
