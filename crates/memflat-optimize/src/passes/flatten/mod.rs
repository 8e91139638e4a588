//! Flattening of multi-dimensional views into one-dimensional ones.
//!
//! Every view-producing op is rewritten to produce a rank-1 view and every
//! access is given one linear element index. The pass runs in three phases:
//!
//! 1. alignment hints are erased,
//! 2. producers, accesses, casts and reshapes go through a partial
//!    conversion, which leaves ops it cannot rewrite in place,
//! 3. constant or dynamic byte offsets on bindings are folded into the
//!    index of the loads and stores that read through them.

mod accesses;
mod alignment;
mod fold_offset;
mod legality;
mod linearize;
mod producers;
mod type_converter;

pub use accesses::{
    AdjustConversionCast, FoldReshape, LinearizeLoad, LinearizeStore, LinearizeTransferRead,
    LinearizeTransferWrite,
};
pub use alignment::EraseAlignmentHints;
pub use fold_offset::FoldSubspanOffset;
pub use legality::is_legal;
pub use linearize::{linearize_indices, recover_extents};
pub use producers::{
    total_element_count, FlattenAlloc, FlattenBinding, FlattenGetGlobal, FlattenGlobal,
};
pub use type_converter::{canonical_view, TypeConverter};

use memflat_core::diagnostics::{Diagnostic, DiagnosticManager};
use memflat_core::error::{Error, Result};
use memflat_core::ir::Module;

use crate::error::FlattenError;
use crate::options::FlattenOptions;
use crate::rewrite::{apply_partial_conversion, apply_patterns_greedily, GreedyConfig, RewritePattern};
use crate::utils::{ModulePass, PassReport};

pub struct FlattenMemRefPass {
    options: FlattenOptions,
    diagnostics: DiagnosticManager,
}

impl FlattenMemRefPass {
    pub fn new(options: FlattenOptions) -> Self {
        Self::with_diagnostics(options, DiagnosticManager::new())
    }

    /// Report into an existing manager instead of a private one.
    pub fn with_diagnostics(options: FlattenOptions, diagnostics: DiagnosticManager) -> Self {
        Self {
            options,
            diagnostics,
        }
    }

    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &DiagnosticManager {
        &self.diagnostics
    }

    fn greedy_config(&self) -> GreedyConfig {
        GreedyConfig {
            max_iterations: self.options.max_iterations,
            erase_dead_ops: self.options.erase_dead_ops,
        }
    }

    fn conversion_patterns() -> Vec<Box<dyn RewritePattern>> {
        vec![
            Box::new(FlattenBinding {
                converter: TypeConverter::FullyDynamic,
            }),
            Box::new(FlattenAlloc {
                converter: TypeConverter::RankOnePreserving,
            }),
            Box::new(FlattenGlobal),
            Box::new(FlattenGetGlobal {
                converter: TypeConverter::RankOnePreserving,
            }),
            Box::new(LinearizeLoad),
            Box::new(LinearizeStore),
            Box::new(LinearizeTransferRead),
            Box::new(LinearizeTransferWrite),
            Box::new(AdjustConversionCast),
            Box::new(FoldReshape {
                converter: TypeConverter::RankOnePreserving,
            }),
        ]
    }

    fn run_phases(&self, module: &mut Module, report: &mut PassReport) -> Result<()> {
        let hints: Vec<Box<dyn RewritePattern>> = vec![Box::new(EraseAlignmentHints)];
        let erased = apply_patterns_greedily(module, &hints, self.greedy_config(), &self.diagnostics)?;
        report.record("erase-alignment-hints", erased);

        let stats = apply_partial_conversion(
            module,
            &Self::conversion_patterns(),
            is_legal,
            &self.diagnostics,
        )?;
        tracing::debug!(
            "conversion settled after {} sweeps with {} casts materialized",
            stats.sweeps,
            stats.materialized
        );
        for op in &stats.illegal {
            let operation = module.op(*op);
            let error = FlattenError::FailedToLegalize {
                op: operation.kind.name().to_string(),
            };
            tracing::warn!("{}", error);
            self.diagnostics.add_diagnostic(error.to_diagnostic(operation.span));
        }
        report.record("flatten", stats.applied);

        let folds: Vec<Box<dyn RewritePattern>> = vec![Box::new(FoldSubspanOffset {
            verify_divisibility: self.options.verify_offset_divisibility,
        })];
        let folded = apply_patterns_greedily(module, &folds, self.greedy_config(), &self.diagnostics)?;
        report.record("fold-subspan-offset", folded);
        Ok(())
    }
}

impl Default for FlattenMemRefPass {
    fn default() -> Self {
        Self::new(FlattenOptions::default())
    }
}

impl ModulePass for FlattenMemRefPass {
    fn name(&self) -> &str {
        "flatten-memref"
    }

    fn run(&self, module: &mut Module) -> Result<PassReport> {
        let seen = self.diagnostics.get_diagnostics().len();
        let mut report = PassReport::default();
        let outcome = self.run_phases(module, &mut report);

        if let Err(error) = &outcome {
            self.diagnostics.add_diagnostic(fatal_diagnostic(error));
        }
        report.diagnostics = self
            .diagnostics
            .get_diagnostics()
            .into_iter()
            .skip(seen)
            .collect();
        outcome?;

        tracing::info!(
            "flatten-memref: {} rewrites, {} diagnostics",
            report.total_changes,
            report.diagnostics.len()
        );
        Ok(report)
    }
}

fn fatal_diagnostic(error: &Error) -> Diagnostic {
    match error {
        Error::Diagnostic(diagnostic) => diagnostic.clone(),
        Error::Ir(span, message) => Diagnostic::error(message.clone()).with_span(*span),
        Error::Generic(message) => Diagnostic::error(message.clone()),
    }
}
