//! Error types for the Helm Release Operator

use kube::runtime::finalizer;
use thiserror::Error;

/// Result type for the operator
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the operator
#[derive(Debug, Error)]
pub enum Error {
    /// No REST mapping exists for a group/kind.
    ///
    /// Usually transient: the kind may appear once its CRD is established.
    #[error("no matches for kind \"{kind}\" in group \"{group}\" (searched versions: {searched_versions:?})")]
    UnknownKind {
        group: String,
        kind: String,
        searched_versions: Vec<String>,
    },

    /// A rendered manifest document could not be turned into a resource descriptor
    #[error("invalid manifest {document}: {message}")]
    Parse { document: String, message: String },

    /// The external watch registration call failed
    #[error("failed to watch {kind}: {message}")]
    WatchRegistration { kind: String, message: String },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Helm release install, upgrade or uninstall failed
    #[error("Release error: {0}")]
    ReleaseError(String),

    /// The owning custom resource is missing required metadata
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    FinalizerError(Box<finalizer::Error<Error>>),
}

impl From<finalizer::Error<Error>> for Error {
    fn from(err: finalizer::Error<Error>) -> Self {
        Error::FinalizerError(Box::new(err))
    }
}

impl Error {
    /// The error an apply or cleanup run failed with, looking through the
    /// finalizer wrapper
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::FinalizerError(err) => match err.as_ref() {
                finalizer::Error::ApplyFailed(inner) | finalizer::Error::CleanupFailed(inner) => {
                    inner.root_cause()
                }
                _ => self,
            },
            _ => self,
        }
    }

    /// Whether a requeue can reasonably be expected to clear the error
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            Error::UnknownKind { .. }
            | Error::WatchRegistration { .. }
            | Error::KubeError(_)
            | Error::ReleaseError(_) => true,
            Error::FinalizerError(err) => matches!(
                err.as_ref(),
                finalizer::Error::AddFinalizer(_) | finalizer::Error::RemoveFinalizer(_)
            ),
            _ => false,
        }
    }

    /// Short machine-readable reason, used for status conditions
    pub fn reason(&self) -> &'static str {
        match self.root_cause() {
            Error::UnknownKind { .. } => "UnknownKind",
            Error::Parse { .. } => "InvalidManifest",
            Error::WatchRegistration { .. } => "WatchFailed",
            Error::ReleaseError(_) => "InstallError",
            Error::KubeError(_) => "KubernetesError",
            Error::ConfigError(_) => "ConfigError",
            Error::InvalidOwner(_) => "InvalidOwner",
            Error::FinalizerError(_) => "FinalizerError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_message_names_group_and_kind() {
        let err = Error::UnknownKind {
            group: "apps".to_string(),
            kind: "ReplicaSet".to_string(),
            searched_versions: vec!["v1".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"ReplicaSet\""));
        assert!(msg.contains("\"apps\""));
        assert!(msg.contains("v1"));
        assert!(err.is_transient());
        assert_eq!(err.reason(), "UnknownKind");
    }

    #[test]
    fn parse_errors_are_not_transient() {
        let err = Error::Parse {
            document: "document 2".to_string(),
            message: "missing kind".to_string(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.reason(), "InvalidManifest");
    }

    #[test]
    fn finalizer_wrapped_errors_classify_by_their_cause() {
        let apply = Error::from(finalizer::Error::ApplyFailed(Error::UnknownKind {
            group: "example.com".to_string(),
            kind: "Widget".to_string(),
            searched_versions: vec!["v1".to_string()],
        }));
        assert!(matches!(apply.root_cause(), Error::UnknownKind { .. }));
        assert!(apply.is_transient());
        assert_eq!(apply.reason(), "UnknownKind");

        let cleanup = Error::from(finalizer::Error::CleanupFailed(Error::InvalidOwner(
            "no name".to_string(),
        )));
        assert!(!cleanup.is_transient());
        assert_eq!(cleanup.reason(), "InvalidOwner");

        let unnamed: Error = finalizer::Error::UnnamedObject.into();
        assert!(!unnamed.is_transient());
        assert_eq!(unnamed.reason(), "FinalizerError");
        assert!(unnamed.to_string().starts_with("Finalizer error"));
    }
}
