//! Pattern-based rewriting over a [`Module`].
//!
//! Two drivers share one pattern interface. The partial-conversion driver
//! rewrites illegal ops until a sweep makes no progress and leaves the rest
//! untouched. The greedy driver applies patterns until a fixpoint within an
//! iteration cap, erasing dead side-effect-free ops between sweeps.

mod driver;
mod rewriter;

pub use driver::{
    apply_partial_conversion, apply_patterns_greedily, erase_dead_ops, ConversionStats, GreedyConfig,
};
pub use rewriter::{RewriteMode, Rewriter};

use memflat_core::error::Result;
use memflat_core::ir::{OpId, OpKind};

/// Outcome of one pattern application that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    Success,
    /// The pattern does not apply; the reason is logged, nothing changed.
    Failure(String),
}

impl Match {
    pub fn failure(reason: impl Into<String>) -> Self {
        Match::Failure(reason.into())
    }
}

pub trait RewritePattern {
    fn name(&self) -> &'static str;

    /// Whether ops of this kind can be the root of a match.
    fn matches_root(&self, kind: &OpKind) -> bool;

    /// Rewrite `op` through `rewriter`. `Err` aborts the whole driver.
    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match>;
}
