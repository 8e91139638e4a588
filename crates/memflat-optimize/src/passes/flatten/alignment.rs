use memflat_core::error::Result;
use memflat_core::ir::{OpId, OpKind};

use crate::rewrite::{Match, RewritePattern, Rewriter};

/// Removes `view.assume_alignment` hints, which refer to the shape they were
/// written against.
pub struct EraseAlignmentHints;

impl RewritePattern for EraseAlignmentHints {
    fn name(&self) -> &'static str {
        "erase-alignment-hints"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::AssumeAlignment { .. })
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        rewriter.erase_op(op);
        Ok(Match::Success)
    }
}
