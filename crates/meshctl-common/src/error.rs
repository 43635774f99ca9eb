//! Error types shared across meshctl crates
//!
//! Variants carry structured context (resource names, the failing phase)
//! so callers can log or render them without re-parsing messages.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for meshctl operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid user-provided configuration
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Resource (or document) holding the invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "components.pilot.hub")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being decoded (if known)
        kind: Option<String>,
    },

    /// A resource the operation depends on does not exist
    #[error("{kind} {name} does not exist")]
    NotFound {
        /// Resource kind (e.g., "WorkloadEntry")
        kind: String,
        /// Resource name, namespaced as `ns/name` where relevant
        name: String,
    },

    /// Sidecar bootstrap error
    #[error("bootstrap error [{context}]: {message}")]
    Bootstrap {
        /// Description of what failed
        message: String,
        /// Phase where the error occurred (e.g., "identity", "gateway", "copy")
        context: String,
    },

    /// Local filesystem error
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being read or written
        path: String,
        /// The underlying io error
        source: std::io::Error,
    },

    /// Several independent failures collected from one operation
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<Error>),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

fn format_multiple(errors: &[Error]) -> String {
    match errors {
        [single] => single.to_string(),
        _ => {
            let lines: Vec<String> = errors.iter().map(|e| format!("\t* {}", e)).collect();
            format!("{} errors occurred:\n{}", errors.len(), lines.join("\n"))
        }
    }
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context
    pub fn validation_for(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific document kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a bootstrap error with context
    pub fn bootstrap(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create an io error tagged with the path involved
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Fold collected errors into a single result
    ///
    /// No errors is success, one error is returned as-is, more are wrapped
    /// in [`Error::Multiple`].
    pub fn join(mut errors: Vec<Error>) -> Result<(), Error> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}
