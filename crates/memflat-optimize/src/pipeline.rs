use memflat_core::diagnostics::{DiagnosticDisplayOptions, DiagnosticManager};
use memflat_core::error::Result;
use memflat_core::ir::Module;

use crate::error::optimization_error;
use crate::options::FlattenOptions;
use crate::passes::FlattenMemRefPass;
use crate::utils::{DeadCodePass, ModulePass, PassReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassName {
    FlattenMemRef,
    Dce,
}

impl PassName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassName::FlattenMemRef => "flatten-memref",
            PassName::Dce => "dce",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident.trim().to_ascii_lowercase().as_str() {
            "flatten-memref" | "flatten_memref" | "flatten" => Some(PassName::FlattenMemRef),
            "dce" | "erase-dead-ops" => Some(PassName::Dce),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PipelineReport {
    pub total_changes: usize,
    pub per_pass: Vec<(String, PassReport)>,
}

impl PipelineReport {
    /// Printable lines for every diagnostic raised by the pipeline, in pass
    /// order. Diagnostics without a source context are tagged with their pass.
    pub fn render_diagnostics(&self, options: &DiagnosticDisplayOptions) -> Vec<String> {
        self.per_pass
            .iter()
            .flat_map(|(name, report)| {
                DiagnosticManager::render(&report.diagnostics, Some(name), options)
            })
            .collect()
    }
}

/// Runs module passes in order, verifying the module after each one.
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
    verify_each: bool,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            verify_each: true,
        }
    }

    /// Build a pipeline from a list such as `"flatten-memref, dce"`.
    /// Separators may be commas, whitespace or `|`.
    pub fn parse(
        pipeline: &str,
        options: &FlattenOptions,
        diagnostics: &DiagnosticManager,
    ) -> Result<Self> {
        let mut manager = Self::new();
        for name in parse_pass_list(pipeline)? {
            let pass: Box<dyn ModulePass> = match name {
                PassName::FlattenMemRef => Box::new(FlattenMemRefPass::with_diagnostics(
                    options.clone(),
                    diagnostics.clone(),
                )),
                PassName::Dce => Box::new(DeadCodePass),
            };
            manager.add_pass(pass);
        }
        Ok(manager)
    }

    pub fn add_pass(&mut self, pass: Box<dyn ModulePass>) {
        self.passes.push(pass);
    }

    pub fn with_verification(mut self, verify_each: bool) -> Self {
        self.verify_each = verify_each;
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn run(&self, module: &mut Module) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        if self.verify_each {
            module.verify()?;
        }
        for pass in &self.passes {
            tracing::debug!("running pass {}", pass.name());
            let pass_report = pass.run(module)?;
            if self.verify_each {
                module.verify().map_err(|error| {
                    optimization_error(format!(
                        "module is malformed after {}: {}",
                        pass.name(),
                        error
                    ))
                })?;
            }
            report.total_changes += pass_report.total_changes;
            report.per_pass.push((pass.name().to_string(), pass_report));
        }
        Ok(report)
    }
}

fn parse_pass_list(raw: &str) -> Result<Vec<PassName>> {
    let mut passes = Vec::new();
    for token in raw.split(|ch: char| ch == ',' || ch.is_whitespace() || ch == '|') {
        let ident = token.trim().trim_matches('"').trim_matches('`');
        if ident.is_empty() {
            continue;
        }
        let pass = PassName::from_ident(ident)
            .ok_or_else(|| optimization_error(format!("unknown pass: {ident}")))?;
        passes.push(pass);
    }
    Ok(passes)
}
