//! Diagnostic bodies for failed requests.

use std::error::Error as _;
use std::fmt;

use brewery_routing::{ErrorKind, RouterError};

/// What a failed request reports back: the short summary, the diagnostic
/// reason, the error kind and every underlying cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump {
    pub summary: String,
    pub reason: String,
    pub kind: ErrorKind,
    pub causes: Vec<String>,
}

impl Dump {
    pub fn from_error(err: &RouterError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            summary: err.summary().to_string(),
            reason: err.to_string(),
            kind: err.kind(),
            causes,
        }
    }
}

impl fmt::Display for Dump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "reason: {}", self.reason)?;
        writeln!(f, "kind: {}", self.kind)?;
        for cause in &self.causes {
            writeln!(f, "caused by: {}", cause)?;
        }
        Ok(())
    }
}
