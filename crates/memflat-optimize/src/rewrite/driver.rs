use memflat_core::diagnostics::DiagnosticManager;
use memflat_core::error::Result;
use memflat_core::ir::{Module, OpId};

use super::{Match, RewriteMode, RewritePattern, Rewriter};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    pub sweeps: usize,
    pub applied: usize,
    pub materialized: usize,
    /// Ops still failing the legality predicate once the conversion settled.
    pub illegal: Vec<OpId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedyConfig {
    pub max_iterations: usize,
    pub erase_dead_ops: bool,
}

/// Try each pattern on `op` in order; the first success wins.
fn apply_first(
    op: OpId,
    patterns: &[Box<dyn RewritePattern>],
    rewriter: &mut Rewriter<'_>,
) -> Result<bool> {
    for pattern in patterns {
        if !pattern.matches_root(&rewriter.module().op(op).kind) {
            continue;
        }
        match pattern.match_and_rewrite(op, rewriter)? {
            Match::Success => {
                tracing::debug!("{} applied to {}", pattern.name(), op);
                return Ok(true);
            }
            Match::Failure(reason) => {
                tracing::debug!("{} declined {}: {}", pattern.name(), op, reason);
            }
        }
    }
    Ok(false)
}

/// Rewrite illegal ops until a sweep over the module makes no progress.
///
/// Ops that are legal, or that no pattern manages to rewrite, are left in
/// place. Rewrites already applied are kept when a pattern aborts.
pub fn apply_partial_conversion(
    module: &mut Module,
    patterns: &[Box<dyn RewritePattern>],
    is_legal: impl Fn(&Module, OpId) -> bool,
    diagnostics: &DiagnosticManager,
) -> Result<ConversionStats> {
    let mut stats = ConversionStats::default();
    let mut rewriter = Rewriter::new(module, RewriteMode::Conversion, diagnostics.clone());

    loop {
        stats.sweeps += 1;
        let mut progress = false;
        for op in rewriter.module().walk() {
            if rewriter.is_pending(op) || !rewriter.module().is_live(op) {
                continue;
            }
            if is_legal(rewriter.module(), op) {
                continue;
            }
            if apply_first(op, patterns, &mut rewriter)? {
                stats.applied += 1;
                progress = true;
            }
        }
        tracing::trace!(
            "conversion sweep {} applied {} rewrites so far",
            stats.sweeps,
            stats.applied
        );
        if !progress {
            break;
        }
    }

    stats.materialized = rewriter.finalize()?;
    stats.illegal = module
        .walk()
        .into_iter()
        .filter(|&op| !is_legal(module, op))
        .collect();
    Ok(stats)
}

/// Apply patterns anywhere they match until nothing changes.
///
/// Each sweep visits every live op once, then optionally erases dead
/// side-effect-free ops. Returns the number of pattern applications; fails
/// when the module still changes after `max_iterations` sweeps.
pub fn apply_patterns_greedily(
    module: &mut Module,
    patterns: &[Box<dyn RewritePattern>],
    config: GreedyConfig,
    diagnostics: &DiagnosticManager,
) -> Result<usize> {
    let mut applied = 0;
    let mut rewriter = Rewriter::new(module, RewriteMode::Greedy, diagnostics.clone());
    for iteration in 1..=config.max_iterations {
        let mut changed = false;
        for op in rewriter.module().walk() {
            if !rewriter.module().is_live(op) {
                continue;
            }
            if apply_first(op, patterns, &mut rewriter)? {
                applied += 1;
                changed = true;
            }
        }
        if config.erase_dead_ops {
            let erased = erase_dead_ops(rewriter.module_mut());
            changed |= erased > 0;
        }
        tracing::trace!("greedy sweep {} applied {} rewrites so far", iteration, applied);
        if !changed {
            return Ok(applied);
        }
    }
    crate::opt_bail!(
        format!(
            "rewrites did not converge within {} iterations",
            config.max_iterations
        ),
        code = "memflat::no-convergence"
    )
}

/// Erase side-effect-free ops whose results are all unused. Walking in reverse
/// removes whole dead chains in one call.
pub fn erase_dead_ops(module: &mut Module) -> usize {
    let mut erased = 0;
    for op in module.walk().into_iter().rev() {
        let Some(operation) = module.try_op(op) else {
            continue;
        };
        if !operation.kind.is_side_effect_free() || operation.results.is_empty() {
            continue;
        }
        if operation.results.iter().any(|&result| module.has_uses(result)) {
            continue;
        }
        module.erase_op(op);
        erased += 1;
    }
    erased
}
