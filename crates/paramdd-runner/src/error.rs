//! Error types for paramdd-runner
//!
//! Only fatal conditions live here. A failing or hung oracle run is an
//! ordinary [`crate::oracle::Cost`], not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a reduction run
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter file or diff precondition error
    #[error(transparent)]
    Model(#[from] paramdd_model::Error),

    /// The oracle command could not be started
    #[error("Failed to spawn oracle '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Checkpoint could not be written or read back
    #[error("Checkpoint error on {}: {source}", path.display())]
    Checkpoint {
        /// Checkpoint file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_display() {
        let err = Error::Spawn {
            program: "./run-tests".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("./run-tests"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_model_error_is_transparent() {
        let err: Error = paramdd_model::Error::UnknownKey("sat.gc".to_string()).into();
        assert_eq!(err.to_string(), "Unknown key: sat.gc");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("tolerance must be positive".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_error_from_serde_yaml() {
        let yaml_err: serde_yaml::Error = serde_yaml::from_str::<i32>("not: [yaml").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::YamlError(_)));
    }
}
