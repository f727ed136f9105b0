//! Error types for style reconciliation.

use thiserror::Error;

/// Invalid widget configuration. Rejects the whole update it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("layer '{layer}' references missing source '{source_id}'")]
    DanglingSource { layer: String, source_id: String },

    #[error("layer '{layer}' of type '{kind}' has no source")]
    LayerWithoutSource { layer: String, kind: String },

    #[error("layer id '{layer}' appears more than once")]
    DuplicateLayerId { layer: String },

    #[error("hover layer '{layer}' is not in the layer list")]
    UnknownHoverLayer { layer: String },
}

impl ConfigurationError {
    /// Id of the offending layer.
    pub fn layer_id(&self) -> &str {
        match self {
            ConfigurationError::DanglingSource { layer, .. }
            | ConfigurationError::LayerWithoutSource { layer, .. }
            | ConfigurationError::DuplicateLayerId { layer }
            | ConfigurationError::UnknownHoverLayer { layer } => layer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A property value does not have the shape of the style model.
    #[error("invalid {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

impl StyleError {
    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        StyleError::Decode {
            what,
            reason: err.to_string(),
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, StyleError::Configuration(_))
    }
}

/// Failure reported by a live map for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("source '{0}' already exists")]
    SourceExists(String),

    #[error("source '{0}' not found")]
    SourceNotFound(String),

    #[error("source '{source_id}' is still used by layer '{layer}'")]
    SourceInUse { source_id: String, layer: String },

    #[error("layer '{0}' already exists")]
    LayerExists(String),

    #[error("layer '{0}' not found")]
    LayerNotFound(String),

    #[error("map has been removed")]
    Removed,

    #[error("map backend error: {0}")]
    Backend(String),
}
