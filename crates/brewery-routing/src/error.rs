//! Routing error types.
//!
//! Every failure in route resolution and dispatch is a [`RouterError`]. Errors
//! are never recovered inside the router: they propagate to the front
//! controller, which is the single place that turns them into a response.
//!
//! Each variant carries two texts, mirroring how failures are reported to
//! developers:
//!
//! - [`RouterError::summary`]: a short message ("Could not invoke route.")
//! - `Display`: the longer diagnostic reason
//!
//! and maps onto one [`ErrorKind`] of the framework error taxonomy.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Classification of framework errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input shape, e.g. an unparsable callback string.
    MalformedArgument,
    /// Wrong type or value, e.g. a non-string route name.
    InvalidArgument,
    /// Illegal sequencing, e.g. registering a second component.
    BadCall,
    /// Post-condition violation, e.g. a resource that could not be imported.
    UnexpectedResult,
    /// Attempted to invoke a method the target does not implement.
    Typehint,
}

impl ErrorKind {
    /// Upper-case name used in diagnostic output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedArgument => "MALFORMED_ARGUMENT",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::BadCall => "BAD_CALL",
            ErrorKind::UnexpectedResult => "UNEXPECTED_RESULT",
            ErrorKind::Typehint => "TYPEHINT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while resolving or dispatching a route.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A callback string has no recognizable HTTP verb segment.
    #[error("route callback string `{callback}` is invalid: {reason}")]
    MalformedRoute { callback: String, reason: String },

    /// The route table has an unexpected shape.
    #[error("route table entry `{key}` is invalid: {reason}")]
    InvalidRouteTable { key: String, reason: String },

    /// A route key did not compile to a regular expression.
    #[error("route pattern `{pattern}` does not compile: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A component directory is missing.
    #[error("no such file or directory for component `{component}` at {}", path.display())]
    DirectoryNotFound { component: String, path: PathBuf },

    /// A second component was registered on the same route.
    #[error("route component already defined as `{existing}`, refusing `{requested}`")]
    ComponentAlreadyRegistered { existing: String, requested: String },

    /// The request method differs from the method the route accepts.
    #[error("request method `{requested}` is not allowed, route accepts {}", allowed.join(", "))]
    MethodNotAllowed {
        requested: String,
        allowed: Vec<String>,
    },

    /// A mandatory resource is not registered.
    #[error("route resource `{location}` does not exist")]
    ResourceNotFound { location: String },

    /// A constraint returned false.
    #[error("route constraint `{constraint}` failed")]
    ConstraintFailed { constraint: String },

    /// The resolved resource does not implement the routed method.
    #[error("route callback {resource}::{method} does not exist")]
    NotImplemented { resource: String, method: String },

    /// Application code returned an error.
    #[error("{resource}::{method} returned an error: {source}")]
    Handler {
        resource: String,
        method: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RouterError {
    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::MalformedRoute { .. } => ErrorKind::MalformedArgument,
            RouterError::InvalidRouteTable { .. } | RouterError::InvalidPattern { .. } => {
                ErrorKind::InvalidArgument
            }
            RouterError::ComponentAlreadyRegistered { .. } => ErrorKind::BadCall,
            RouterError::NotImplemented { .. } => ErrorKind::Typehint,
            RouterError::DirectoryNotFound { .. }
            | RouterError::MethodNotAllowed { .. }
            | RouterError::ResourceNotFound { .. }
            | RouterError::ConstraintFailed { .. }
            | RouterError::Handler { .. } => ErrorKind::UnexpectedResult,
        }
    }

    /// Short, user-facing message.
    pub fn summary(&self) -> &'static str {
        match self {
            RouterError::MalformedRoute { .. } => "Could not parse defined callback route.",
            RouterError::InvalidRouteTable { .. } | RouterError::InvalidPattern { .. } => {
                "Could not parse defined route maps."
            }
            RouterError::DirectoryNotFound { .. } => "Could not set router component.",
            RouterError::ComponentAlreadyRegistered { .. } => {
                "Could not register router component."
            }
            RouterError::MethodNotAllowed { .. } | RouterError::NotImplemented { .. } => {
                "Could not invoke route."
            }
            RouterError::ResourceNotFound { .. } => "Could not import route resource.",
            RouterError::ConstraintFailed { .. } => "Could not delegate route.",
            RouterError::Handler { .. } => "Route callback failed.",
        }
    }
}
