use memflat_core::diagnostics::Diagnostic;
use memflat_core::error::Error;
use memflat_core::ir::{Type, ViewType};
use memflat_core::span::Span;

/// Failures the flattening pass can run into.
///
/// Fatal variants abort the pass. The others make a single rewrite decline
/// and surface as warnings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlattenError {
    #[error("{ty} does not have an identity layout")]
    UnsupportedLayout { ty: ViewType },
    #[error("failed to linearize index: cannot recover the extents of {ty}")]
    ShapeRecoveryFailure { ty: ViewType },
    #[error("replacement type incompatible ({source_ty} vs {target_ty})")]
    IncompatibleReshape { source_ty: Type, target_ty: Type },
    #[error("cannot deduce the byte width of element type {element}")]
    UnresolvableElementWidth { element: Type },
    #[error("byte offset {offset} is not a multiple of the element width {width}")]
    MisalignedByteOffset { offset: i64, width: u64 },
    #[error("failed to legalize {op}")]
    FailedToLegalize { op: String },
}

impl FlattenError {
    pub fn code(&self) -> &'static str {
        match self {
            FlattenError::UnsupportedLayout { .. } => "memflat::unsupported-layout",
            FlattenError::ShapeRecoveryFailure { .. } => "memflat::shape-recovery",
            FlattenError::IncompatibleReshape { .. } => "memflat::incompatible-reshape",
            FlattenError::UnresolvableElementWidth { .. } => "memflat::element-width",
            FlattenError::MisalignedByteOffset { .. } => "memflat::misaligned-offset",
            FlattenError::FailedToLegalize { .. } => "memflat::failed-to-legalize",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlattenError::ShapeRecoveryFailure { .. } | FlattenError::IncompatibleReshape { .. }
        )
    }

    /// Located diagnostic for this failure: an error when fatal, else a warning.
    pub fn to_diagnostic(&self, span: Span) -> Diagnostic {
        let diagnostic = if self.is_fatal() {
            Diagnostic::error(self.to_string())
        } else {
            Diagnostic::warning(self.to_string())
        };
        diagnostic
            .with_span(span)
            .with_code(self.code())
            .with_source_context("flatten-memref")
    }

    /// Turn this failure into an error attributed to `span`.
    pub fn at(&self, span: Span) -> Error {
        Error::diagnostic(self.to_diagnostic(span))
    }
}

/// Create a simple optimization error with default span
pub fn optimization_error(message: impl Into<String>) -> Error {
    Error::diagnostic(Diagnostic::error(message))
}

/// Create an optimization error with a specific error code
pub fn optimization_error_with_code(message: impl Into<String>, code: impl Into<String>) -> Error {
    Error::diagnostic(Diagnostic::error(message).with_code(code))
}

/// Create an optimization error with a specific span
pub fn optimization_error_with_span(message: impl Into<String>, span: Span) -> Error {
    Error::diagnostic(Diagnostic::error(message).with_span(span))
}

// Convenience macros for generating optimization errors

/// Macro to return early with an optimization error
#[macro_export]
macro_rules! opt_bail {
    ($message:expr) => {
        return Err($crate::error::optimization_error($message))
    };
    ($message:expr, code = $code:expr) => {
        return Err($crate::error::optimization_error_with_code($message, $code))
    };
    ($message:expr, span = $span:expr) => {
        return Err($crate::error::optimization_error_with_span($message, $span))
    };
}

/// Macro to ensure a condition is true, or return an optimization error
#[macro_export]
macro_rules! opt_ensure {
    ($cond:expr, $message:expr) => {
        if !($cond) {
            $crate::opt_bail!($message);
        }
    };
    ($cond:expr, $message:expr, code = $code:expr) => {
        if !($cond) {
            $crate::opt_bail!($message, code = $code);
        }
    };
    ($cond:expr, $message:expr, span = $span:expr) => {
        if !($cond) {
            $crate::opt_bail!($message, span = $span);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use memflat_core::diagnostics::DiagnosticLevel;
    use memflat_core::ir::Extent;

    #[test]
    fn fatal_failures_become_located_errors() {
        let error = FlattenError::IncompatibleReshape {
            source_ty: ViewType::new(vec![Extent::Dynamic], Type::f32()).into(),
            target_ty: ViewType::new(vec![Extent::Dynamic], Type::i32()).into(),
        };
        assert!(error.is_fatal());
        let span = Span::new(3, 4, 9);
        let located = error.at(span);
        assert_eq!(located.span(), Some(span));
        assert_eq!(located.code(), Some("memflat::incompatible-reshape"));
        assert_eq!(
            error.to_string(),
            "replacement type incompatible (view<?xf32> vs view<?xi32>)"
        );
    }

    #[test]
    fn declines_are_warnings() {
        let error = FlattenError::UnresolvableElementWidth {
            element: Type::Index,
        };
        assert!(!error.is_fatal());
        let diagnostic = error.to_diagnostic(Span::unknown());
        assert_eq!(diagnostic.level, DiagnosticLevel::Warning);
    }

    fn checked(value: usize) -> memflat_core::Result<usize> {
        crate::opt_ensure!(value > 0, "value must be positive", code = "memflat::test");
        Ok(value)
    }

    #[test]
    fn ensure_macro_attaches_code() {
        let error = checked(0).expect_err("zero is rejected");
        assert_eq!(error.code(), Some("memflat::test"));
        assert_eq!(checked(2).ok(), Some(2));
    }
}
