//! Error types for latgen.

use thiserror::Error;

/// Exit status for a malformed configuration (usage printed).
pub const EXIT_CONFIG: i32 = 1;

/// Exit status for any failure while constructing decoder components.
pub const EXIT_SETUP: i32 = 2;

#[derive(Error, Debug)]
pub enum LatgenError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Missing required argument: {name}")]
    MissingArgument { name: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Resource load errors
    #[error("Failed to load acoustic model from {path}: {message}")]
    ModelLoad { path: String, message: String },

    #[error("Failed to load decode graph from {path}: {message}")]
    GraphLoad { path: String, message: String },

    #[error("Failed to load word symbol table from {path}: {message}")]
    SymbolTableLoad { path: String, message: String },

    #[error("Failed to load feature transform from {path}: {message}")]
    TransformLoad { path: String, message: String },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    // Audio errors
    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Failed to read audio: {message}")]
    AudioRead { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl LatgenError {
    /// True for errors detected before any resource is allocated.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LatgenError::ConfigFileNotFound { .. }
                | LatgenError::ConfigParse { .. }
                | LatgenError::ConfigInvalidValue { .. }
                | LatgenError::MissingArgument { .. }
                | LatgenError::Config(_)
        )
    }

    /// Process status code for a failed setup.
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            EXIT_CONFIG
        } else {
            EXIT_SETUP
        }
    }
}

pub type Result<T> = std::result::Result<T, LatgenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = LatgenError::ConfigInvalidValue {
            key: "left_context".to_string(),
            message: "must be divisible by delta_order".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for left_context: must be divisible by delta_order"
        );
    }

    #[test]
    fn test_model_load_display() {
        let error = LatgenError::ModelLoad {
            path: "/models/final.json".to_string(),
            message: "unexpected end of file".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to load acoustic model from /models/final.json: unexpected end of file"
        );
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let error = LatgenError::DimensionMismatch {
            context: "acoustic model".to_string(),
            expected: 39,
            actual: 40,
        };
        assert_eq!(
            error.to_string(),
            "Dimension mismatch in acoustic model: expected 39, got 40"
        );
    }

    #[test]
    fn test_missing_argument_display() {
        let error = LatgenError::MissingArgument {
            name: "silence-phones".to_string(),
        };
        assert_eq!(error.to_string(), "Missing required argument: silence-phones");
    }

    #[test]
    fn test_config_errors_exit_with_one() {
        let errors = [
            LatgenError::ConfigInvalidValue {
                key: "beam".to_string(),
                message: "must be positive".to_string(),
            },
            LatgenError::MissingArgument {
                name: "fst".to_string(),
            },
            LatgenError::ConfigParse {
                message: "bad".to_string(),
            },
        ];
        for error in errors {
            assert!(error.is_config_error(), "{error}");
            assert_eq!(error.exit_code(), EXIT_CONFIG);
        }
    }

    #[test]
    fn test_load_errors_exit_with_two() {
        let errors = [
            LatgenError::ModelLoad {
                path: "m".to_string(),
                message: "x".to_string(),
            },
            LatgenError::GraphLoad {
                path: "g".to_string(),
                message: "x".to_string(),
            },
            LatgenError::TransformLoad {
                path: "t".to_string(),
                message: "x".to_string(),
            },
            LatgenError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")),
        ];
        for error in errors {
            assert!(!error.is_config_error(), "{error}");
            assert_eq!(error.exit_code(), EXIT_SETUP);
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: LatgenError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error_is_config_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: LatgenError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.is_config_error());
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: LatgenError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LatgenError>();
        assert_sync::<LatgenError>();
    }
}
