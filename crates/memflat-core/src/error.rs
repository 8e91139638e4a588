use crate::diagnostics::Diagnostic;
use crate::span::Span;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Diagnostic(Diagnostic),
    #[error("IR error at {0}: {1}")]
    Ir(Span, String),
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(diagnostic)
    }

    pub fn ir(span: Span, message: impl Into<String>) -> Self {
        Error::Ir(span, message.into())
    }

    pub fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Diagnostic(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }

    /// Location the failure is attributed to, when one is known.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Diagnostic(diagnostic) => diagnostic.span,
            Error::Ir(span, _) => Some(*span),
            Error::Generic(_) => None,
        }
    }

    /// Diagnostic code of the failure, if it carries one.
    pub fn code(&self) -> Option<&str> {
        self.as_diagnostic().and_then(|d| d.code.as_deref())
    }
}

pub type Result<T> = result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

impl From<Diagnostic> for Error {
    fn from(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(diagnostic)
    }
}
