//! Error types for template compilation and rendering.
//!
//! [`CompileError`] is raised by the Pistachio passes when a template uses
//! syntax that cannot be translated. [`RenderError`] is the error type of
//! every public rendering operation and wraps compile errors along with the
//! template engine's own failures.

use std::fmt;

/// A template that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The directive or token that failed, e.g. `@foreach`.
    pub directive: String,
    /// 1-based line the directive starts on.
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(directive: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
            line,
            message: message.into(),
        }
    }

    /// Builds an error for the directive starting at byte `offset` of `source`.
    pub(crate) fn at(
        source: &str,
        offset: usize,
        directive: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let line = source[..offset.min(source.len())].matches('\n').count() + 1;
        Self::new(directive, line, message)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on line {}: {}",
            self.directive, self.line, self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// Error type for view rendering operations.
#[derive(Debug)]
pub enum RenderError {
    /// Template source could not be compiled.
    CompileError {
        template: String,
        error: CompileError,
    },

    /// Template syntax error or evaluation failure.
    TemplateError(String),

    /// No template file for the requested name.
    TemplateNotFound(String),

    /// Variables could not be serialized.
    SerializationError(String),

    /// I/O error reading a template.
    IoError(std::io::Error),

    /// Other operational error.
    OperationError(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::CompileError { template, error } => {
                write!(f, "could not compile {}: {}", template, error)
            }
            RenderError::TemplateError(msg) => write!(f, "template error: {}", msg),
            RenderError::TemplateNotFound(name) => write!(f, "template not found: {}", name),
            RenderError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            RenderError::IoError(err) => write!(f, "I/O error: {}", err),
            RenderError::OperationError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::CompileError { error, .. } => Some(error),
            RenderError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IoError(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        // Loader failures (compile errors, I/O) arrive as InvalidOperation.
        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::UndefinedError
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownMethod => RenderError::TemplateError(err.to_string()),
            ErrorKind::BadSerialization => RenderError::SerializationError(err.to_string()),
            _ => RenderError::OperationError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_line() {
        let source = "<p>\n@foreach($i)\n</p>";
        let err = CompileError::at(source, 4, "@foreach", "unsupported");
        assert_eq!(err.line, 2);
        assert_eq!(err.to_string(), "@foreach on line 2: unsupported");
    }

    #[test]
    fn test_render_error_display() {
        let err = RenderError::TemplateNotFound("account/get".to_string());
        assert!(err.to_string().contains("template not found"));

        let err = RenderError::CompileError {
            template: "index.io.html".into(),
            error: CompileError::new("@if", 3, "unbalanced parentheses"),
        };
        assert_eq!(
            err.to_string(),
            "could not compile index.io.html: @if on line 3: unbalanced parentheses"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_minijinja_template_not_found() {
        let mj_err = minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template 'foo' not found",
        );
        let render_err: RenderError = mj_err.into();
        assert!(matches!(render_err, RenderError::TemplateNotFound(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let render_err: RenderError = io_err.into();
        assert!(matches!(render_err, RenderError::IoError(_)));
    }
}
