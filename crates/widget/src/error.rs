use legend::ColorbarError;
use style::{ConfigurationError, PatchError, StyleError};
use thiserror::Error;

use crate::props::PropName;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Style(#[from] StyleError),

    #[error("invalid {prop}: {inner}")]
    Colorbar { prop: PropName, inner: ColorbarError },

    #[error("cannot patch {prop}: {inner}")]
    Patch { prop: PropName, inner: PatchError },
}

impl WidgetError {
    /// Errors caused by the widget configuration rather than by the update
    /// mechanics.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            WidgetError::Style(e) => e.is_configuration_error(),
            WidgetError::Colorbar { .. } => true,
            WidgetError::Patch { .. } => false,
        }
    }

    /// The layer an error is about, when there is one.
    pub fn layer_id(&self) -> Option<&str> {
        match self {
            WidgetError::Style(StyleError::Configuration(e)) => Some(e.layer_id()),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for WidgetError {
    fn from(e: ConfigurationError) -> Self {
        WidgetError::Style(StyleError::Configuration(e))
    }
}
