//! Template compilation pipeline.
//!
//! A [`Compiler`] runs an ordered list of [`Pass`]es over raw template
//! source. Each pass rewrites one family of directives into MiniJinja
//! syntax. The result is handed to MiniJinja unchanged, so a compiled
//! template may also use MiniJinja syntax directly.
//!
//! Which compiler a view uses is chosen by its [`Adapter`]: Pistachio
//! templates (`*.io.html`) run every Pistachio pass, plain templates
//! (`*.html`) are passed through as-is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::CompileError;
use crate::pistachio;

/// One rewrite over template source.
///
/// Passes must be idempotent: applying a pass to its own output yields the
/// same output.
pub trait Pass: Send + Sync {
    /// Unique name of the pass. Registering a second pass with the same
    /// name is a no-op.
    fn name(&self) -> &'static str;

    fn apply(&self, source: &str) -> Result<String, CompileError>;
}

/// Ordered set of passes.
#[derive(Default)]
pub struct Compiler {
    passes: Vec<Box<dyn Pass>>,
}

impl Compiler {
    /// Creates a compiler with no passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler that leaves source untouched.
    pub fn plain() -> Self {
        Self::new()
    }

    /// A compiler with the Pistachio passes registered in order.
    pub fn pistachio() -> Self {
        let mut compiler = Self::new();
        for pass in pistachio::passes() {
            compiler.passes.push(pass);
        }
        compiler
    }

    /// Appends a pass. Returns false when a pass with the same name is
    /// already registered.
    pub fn register(&mut self, pass: impl Pass + 'static) -> bool {
        if self.passes.iter().any(|p| p.name() == pass.name()) {
            return false;
        }
        self.passes.push(Box::new(pass));
        true
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs every pass in registration order.
    pub fn compile(&self, source: &str) -> Result<String, CompileError> {
        let mut output = source.to_string();
        if output.is_empty() {
            return Ok(output);
        }
        for pass in &self.passes {
            trace!("Running pass {}", pass.name());
            output = pass.apply(&output)?;
        }
        Ok(output)
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("passes", &self.pass_names())
            .finish()
    }
}

/// Template flavour of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Adapter {
    /// Pistachio directives, files named `<name>.<prefix>.<ext>`.
    #[default]
    #[serde(alias = "pistachio")]
    Pistachio,
    /// Raw MiniJinja, files named `<name>.<ext>`.
    #[serde(alias = "plain")]
    Plain,
}

impl Adapter {
    pub fn compiler(self) -> Compiler {
        match self {
            Adapter::Pistachio => Compiler::pistachio(),
            Adapter::Plain => Compiler::plain(),
        }
    }

    /// File extension for templates of this flavour, without a leading dot.
    ///
    /// ```rust
    /// use brewery_view::Adapter;
    ///
    /// assert_eq!(Adapter::Pistachio.file_extension("html", Some("io")), "io.html");
    /// assert_eq!(Adapter::Plain.file_extension("html", Some("io")), "html");
    /// ```
    pub fn file_extension(self, extension: &str, prefix: Option<&str>) -> String {
        let extension = extension.trim_start_matches('.');
        match (self, prefix.filter(|p| !p.is_empty())) {
            (Adapter::Pistachio, Some(prefix)) => {
                format!("{}.{}", prefix.trim_matches('.'), extension)
            }
            _ => extension.to_string(),
        }
    }

    /// File name of the template `name`.
    pub fn file_name(self, name: &str, extension: &str, prefix: Option<&str>) -> String {
        format!("{}.{}", name, self.file_extension(extension, prefix))
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adapter::Pistachio => write!(f, "Pistachio"),
            Adapter::Plain => write!(f, "Plain"),
        }
    }
}

impl FromStr for Adapter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pistachio" => Ok(Adapter::Pistachio),
            "plain" => Ok(Adapter::Plain),
            other => Err(format!("unknown view adapter: {other}")),
        }
    }
}
