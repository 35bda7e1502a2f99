//! Errors building an application.

use brewery_routing::RouterError;
use thiserror::Error;

use crate::config::ConfigError;

/// Error returned by [`AppBuilder::build`](crate::AppBuilder::build).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The route table could not be read or parsed.
    #[error("invalid route table: {0}")]
    Routes(#[from] RouterError),

    /// The default blueprint was never registered.
    #[error("blueprint `{0}` is not registered")]
    UnknownBlueprint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_display() {
        let err = BuildError::UnknownBlueprint("Pistachio".into());
        assert_eq!(err.to_string(), "blueprint `Pistachio` is not registered");

        let err: BuildError = ConfigError::UnknownEnvironment("qa".into()).into();
        assert!(err.to_string().starts_with("unknown environment `qa`"));
    }
}
