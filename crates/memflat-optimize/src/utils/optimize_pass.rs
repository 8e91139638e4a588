// ModulePass trait - interface for passes over a whole module

use memflat_core::diagnostics::Diagnostic;
use memflat_core::error::Result;
use memflat_core::ir::Module;

/// What one pass did to a module.
#[derive(Debug, Default, Clone)]
pub struct PassReport {
    pub total_changes: usize,
    pub per_phase: Vec<(&'static str, usize)>,
    /// Warnings and errors raised while the pass ran.
    pub diagnostics: Vec<Diagnostic>,
}

impl PassReport {
    pub fn record(&mut self, phase: &'static str, changes: usize) {
        self.total_changes += changes;
        self.per_phase.push((phase, changes));
    }

    pub fn changes_in(&self, phase: &str) -> Option<usize> {
        self.per_phase
            .iter()
            .find(|(name, _)| *name == phase)
            .map(|(_, changes)| *changes)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

pub trait ModulePass {
    fn name(&self) -> &str;

    fn run(&self, module: &mut Module) -> Result<PassReport>;
}

/// Removes side-effect-free ops whose results are never used.
pub struct DeadCodePass;

impl ModulePass for DeadCodePass {
    fn name(&self) -> &str {
        "dce"
    }

    fn run(&self, module: &mut Module) -> Result<PassReport> {
        let mut report = PassReport::default();
        report.record("erase-dead-ops", crate::rewrite::erase_dead_ops(module));
        Ok(report)
    }
}
