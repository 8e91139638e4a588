use memflat_core::error::Result;
use memflat_core::ir::layout::num_bytes;
use memflat_core::ir::{AffineExpr, AffineMap, OpId, OpKind, ValueId};

use crate::error::FlattenError;
use crate::rewrite::{Match, RewritePattern, Rewriter};

/// Moves the byte offset of a binding into the element index of a load or
/// store reading from it directly.
///
/// The binding is cloned with a zero offset right after the original, and
/// the access index grows by `offset floordiv element_width`. Once every
/// access has moved, the original binding is dead.
pub struct FoldSubspanOffset {
    /// Decline, with a warning, constant offsets that are not a multiple of
    /// the element width instead of silently truncating them.
    pub verify_divisibility: bool,
}

struct Access {
    /// Stored value, for stores.
    value: Option<ValueId>,
    view: ValueId,
    index: ValueId,
}

impl FoldSubspanOffset {
    fn access(kind: &OpKind, operands: &[ValueId]) -> Option<Access> {
        match (kind, operands) {
            (OpKind::Load, [view, index]) => Some(Access {
                value: None,
                view: *view,
                index: *index,
            }),
            (OpKind::Store, [value, view, index]) => Some(Access {
                value: Some(*value),
                view: *view,
                index: *index,
            }),
            _ => None,
        }
    }
}

impl RewritePattern for FoldSubspanOffset {
    fn name(&self) -> &'static str {
        "fold-subspan-offset"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::Load | OpKind::Store)
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let Some(access) = Self::access(&operation.kind, &operation.operands) else {
            return Ok(Match::failure("expected 1-D view"));
        };
        let Some(view) = rewriter.module().view_type(access.view).cloned() else {
            return Ok(Match::failure("access does not go through a view"));
        };
        if !view.is_rank_one() {
            return Ok(Match::failure("expected 1-D view"));
        }

        let Some(binding_op) = rewriter.module().defining_op(access.view) else {
            return Ok(Match::failure("view is not defined by a binding"));
        };
        let binding = rewriter.module().op(binding_op).clone();
        let OpKind::BindingSubspan(attributes) = binding.kind else {
            return Ok(Match::failure("view is not defined by a binding"));
        };
        if !attributes.has_byte_offset {
            return Ok(Match::failure("binding has no byte offset"));
        }
        let byte_offset = binding.operands[0];
        let constant_offset = rewriter.module().constant_index(byte_offset);
        if constant_offset == Some(0) {
            return Ok(Match::failure("byte offset is already zero"));
        }

        let Some(width) = num_bytes(&view.element) else {
            rewriter.warn(
                op,
                &FlattenError::UnresolvableElementWidth {
                    element: view.element.as_ref().clone(),
                },
            );
            return Ok(Match::failure("cannot deduce element byte count"));
        };
        if let Some(offset) = constant_offset {
            if self.verify_divisibility && offset % width as i64 != 0 {
                rewriter.warn(op, &FlattenError::MisalignedByteOffset { offset, width });
                return Ok(Match::failure("byte offset is not element aligned"));
            }
        }

        let mut builder = rewriter.builder_after(binding_op);
        let zero = builder.constant_index(0)?;
        let rebased = builder.binding_subspan(
            attributes,
            view.clone(),
            Some(zero),
            &binding.operands[1..],
        )?;

        let mut builder = rewriter.builder_before(op);
        let element_offset = builder.create_or_fold_affine_apply(
            &AffineMap::new(
                0,
                1,
                vec![AffineExpr::symbol(0).floor_div(AffineExpr::constant(width as i64))],
            ),
            &[byte_offset],
        )?;
        let index = builder.create_or_fold_affine_apply(
            &AffineMap::new(0, 2, vec![AffineExpr::symbol(0) + AffineExpr::symbol(1)]),
            &[access.index, element_offset],
        )?;
        match access.value {
            None => {
                let loaded = builder.load(rebased, &[index])?;
                rewriter.replace_op(op, &[loaded])?;
            }
            Some(value) => {
                builder.store(value, rebased, &[index])?;
                rewriter.replace_op(op, &[])?;
            }
        }
        tracing::debug!(
            "folded byte offset of binding {} into {}",
            binding_op,
            operation.kind.name()
        );
        Ok(Match::Success)
    }
}
