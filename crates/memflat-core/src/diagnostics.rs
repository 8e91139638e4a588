use crate::span::Span;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

/// Built-in templates supported by the diagnostic manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTemplate {
    Pretty,
    Plain,
}

/// Runtime configuration for emitting diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticDisplayOptions {
    pub template: DiagnosticTemplate,
    pub verbose_info: bool,
}

impl DiagnosticDisplayOptions {
    pub fn pretty(verbose_info: bool) -> Self {
        Self {
            template: DiagnosticTemplate::Pretty,
            verbose_info,
        }
    }

    pub fn plain(verbose_info: bool) -> Self {
        Self {
            template: DiagnosticTemplate::Plain,
            verbose_info,
        }
    }
}

impl Default for DiagnosticDisplayOptions {
    fn default() -> Self {
        DiagnosticDisplayOptions::plain(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
    pub source_context: Option<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    fn with_level(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            source_context: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "{}: ", span)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if !self.notes.is_empty() {
            write!(f, " (notes: {})", self.notes.join("; "))?;
        }

        Ok(())
    }
}

/// Collects diagnostics raised while a pass runs.
///
/// Clones share the same underlying buffer so a pass and its drivers can
/// report into one place.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticManager {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_diagnostic(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    pub fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|mut d| std::mem::take(&mut *d))
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .map(|d| d.iter().any(Diagnostic::is_error))
            .unwrap_or(false)
    }

    /// Render diagnostics into printable lines. The fallback context is used
    /// when a diagnostic does not specify a source context.
    pub fn render(
        diagnostics: &[Diagnostic],
        fallback_context: Option<&str>,
        options: &DiagnosticDisplayOptions,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for diagnostic in diagnostics {
            if diagnostic.level == DiagnosticLevel::Info && !options.verbose_info {
                continue;
            }
            let context = diagnostic
                .source_context
                .as_deref()
                .or(fallback_context)
                .unwrap_or("memflat");
            match options.template {
                DiagnosticTemplate::Pretty => render_pretty(diagnostic, context, &mut lines),
                DiagnosticTemplate::Plain => render_plain(diagnostic, context, &mut lines),
            }
        }
        lines
    }
}

fn render_pretty(diagnostic: &Diagnostic, context: &str, lines: &mut Vec<String>) {
    let prefix = match diagnostic.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
        DiagnosticLevel::Info => "info",
    };

    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("{}[{}]: {} ({})", prefix, code, diagnostic.message, context),
        None => format!("{}: {} ({})", prefix, diagnostic.message, context),
    };
    lines.push(header);

    if let Some(span) = &diagnostic.span {
        lines.push(format!("  --> {}", span));
    }

    for note in &diagnostic.notes {
        lines.push(format!("   = note: {}", note));
    }
}

fn render_plain(diagnostic: &Diagnostic, context: &str, lines: &mut Vec<String>) {
    let level = match diagnostic.level {
        DiagnosticLevel::Error => "ERROR",
        DiagnosticLevel::Warning => "WARNING",
        DiagnosticLevel::Info => "INFO",
    };

    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("[{}] {}: {} ({})", context, level, diagnostic.message, code),
        None => format!("[{}] {}: {}", context, level, diagnostic.message),
    };
    lines.push(header);

    if let Some(span) = &diagnostic.span {
        lines.push(format!("   at {}", span));
    }

    for note in &diagnostic.notes {
        lines.push(format!("   note: {}", note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rendering_includes_code_and_location() {
        let diagnostic = Diagnostic::error("failed to linearize index")
            .with_code("flatten::shape-recovery")
            .with_span(Span::new(1, 4, 9))
            .with_note("source view is view<?x4xf32>");
        let lines = DiagnosticManager::render(
            &[diagnostic],
            Some("flatten"),
            &DiagnosticDisplayOptions::plain(false),
        );
        assert_eq!(
            lines,
            vec![
                "[flatten] ERROR: failed to linearize index (flatten::shape-recovery)".to_string(),
                "   at 1:4-9".to_string(),
                "   note: source view is view<?x4xf32>".to_string(),
            ]
        );
    }

    #[test]
    fn info_is_hidden_unless_verbose() {
        let diagnostics = vec![Diagnostic::info("3 rewrites applied")];
        assert!(DiagnosticManager::render(
            &diagnostics,
            None,
            &DiagnosticDisplayOptions::pretty(false)
        )
        .is_empty());
        assert_eq!(
            DiagnosticManager::render(&diagnostics, None, &DiagnosticDisplayOptions::pretty(true)),
            vec!["info: 3 rewrites applied (memflat)".to_string()]
        );
    }

    #[test]
    fn manager_tracks_errors_across_clones() {
        let manager = DiagnosticManager::new();
        let shared = manager.clone();
        shared.add_diagnostic(Diagnostic::warning("declined"));
        assert!(!manager.has_errors());
        shared.add_diagnostic(Diagnostic::error("aborted"));
        assert!(manager.has_errors());
        assert_eq!(manager.take_diagnostics().len(), 2);
        assert!(manager.get_diagnostics().is_empty());
    }
}
