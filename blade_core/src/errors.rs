//! # Error Types
//!
//! Structured error types for blade_core. Geometry and configuration issues
//! that the pipeline can recover from (layer clamping, undersized grids,
//! unconverged flow-solver runs) are *not* errors — they are logged warnings
//! and processing continues. The variants here are the conditions the
//! pipeline cannot proceed past: missing named layers or materials, broken
//! cross-references, malformed input documents.
//!
//! ## Example
//!
//! ```rust
//! use blade_core::errors::{BladeError, BladeResult};
//!
//! fn find_layer(names: &[&str], wanted: &str) -> BladeResult<usize> {
//!     names
//!         .iter()
//!         .position(|n| n.eq_ignore_ascii_case(wanted))
//!         .ok_or_else(|| BladeError::layer_not_found(wanted))
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for blade_core operations
pub type BladeResult<T> = Result<T, BladeError>;

/// Structured error type for the blade geometry pipeline.
///
/// Each variant provides specific context about what went wrong,
/// enabling programmatic error handling by callers and optimizers.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum BladeError {
    /// An input value is invalid (out of range, wrong type, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A composite layer referenced by name was not found
    #[error("Layer not found: {layer_name}")]
    LayerNotFound { layer_name: String },

    /// A shear web referenced by name was not found
    #[error("Web not found: {web_name}")]
    WebNotFound { web_name: String },

    /// Material not found in the material library
    #[error("Material not found: {material_name}")]
    MaterialNotFound { material_name: String },

    /// A reference airfoil named in the planform was not found in the library
    #[error("Airfoil not found: {airfoil_name}")]
    AirfoilNotFound { airfoil_name: String },

    /// "Fixed to layer" boundary references form a cycle
    #[error("Reference cycle among fixed layer boundaries: {chain}")]
    ReferenceCycle { chain: String },

    /// The ontology document is structurally unusable
    #[error("Malformed ontology: {reason}")]
    MalformedOntology { reason: String },

    /// The external flow solver could not be invoked at all
    #[error("Flow solver error: {reason}")]
    FlowSolver { reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// YAML/JSON serialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BladeError {
    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        BladeError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a LayerNotFound error
    pub fn layer_not_found(layer_name: impl Into<String>) -> Self {
        BladeError::LayerNotFound {
            layer_name: layer_name.into(),
        }
    }

    /// Create a WebNotFound error
    pub fn web_not_found(web_name: impl Into<String>) -> Self {
        BladeError::WebNotFound {
            web_name: web_name.into(),
        }
    }

    /// Create a MaterialNotFound error
    pub fn material_not_found(material_name: impl Into<String>) -> Self {
        BladeError::MaterialNotFound {
            material_name: material_name.into(),
        }
    }

    /// Create an AirfoilNotFound error
    pub fn airfoil_not_found(airfoil_name: impl Into<String>) -> Self {
        BladeError::AirfoilNotFound {
            airfoil_name: airfoil_name.into(),
        }
    }

    /// Create a MalformedOntology error
    pub fn malformed(reason: impl Into<String>) -> Self {
        BladeError::MalformedOntology {
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        BladeError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        BladeError::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for BladeError {
    fn from(e: serde_yaml::Error) -> Self {
        BladeError::SerializationError {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for BladeError {
    fn from(e: serde_json::Error) -> Self {
        BladeError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BladeError::layer_not_found("Spar_Cap_SS");
        assert_eq!(err.to_string(), "Layer not found: Spar_Cap_SS");

        let err = BladeError::invalid_input("n_span", "1", "grid needs at least 2 points");
        assert!(err.to_string().contains("n_span"));
        assert!(err.to_string().contains("at least 2 points"));
    }

    #[test]
    fn test_error_serialization() {
        let err = BladeError::material_not_found("glass_biax");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("MaterialNotFound"));

        let roundtrip: BladeError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, roundtrip);
    }
}
