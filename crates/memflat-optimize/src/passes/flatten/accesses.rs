//! Rewrites of the ops that consume views: element and block accesses,
//! conversion casts and reshapes.

use memflat_core::error::Result;
use memflat_core::ir::{AffineMap, OpId, OpKind, Transfer, Type, ValueId};

use crate::error::FlattenError;
use crate::rewrite::{Match, RewritePattern, Rewriter};

use super::linearize::linearize_indices;
use super::type_converter::TypeConverter;

const NOT_FLATTENED: &str = "expected converted view of rank 1";

fn remapped_all(rewriter: &Rewriter<'_>, values: &[ValueId]) -> Vec<ValueId> {
    values.iter().map(|&value| rewriter.remapped(value)).collect()
}

fn is_flattened(rewriter: &Rewriter<'_>, view: ValueId) -> bool {
    rewriter.remapped_type(view).is_rank_one_view()
}

/// Only minor-identity maps over one-dimensional tiles survive flattening
/// unchanged in meaning.
fn check_transfer(transfer: &Transfer, vector: &Type) -> Option<Match> {
    if !transfer.permutation_map.is_minor_identity() {
        return Some(Match::failure("cannot convert op with non-minor identity map"));
    }
    match vector {
        Type::Vector(vector) if vector.shape.len() == 1 => None,
        _ => Some(Match::failure("expected a one-dimensional vector")),
    }
}

fn flattened_transfer(transfer: Transfer) -> Transfer {
    Transfer {
        permutation_map: AffineMap::dim_identity(),
        in_bounds: transfer.in_bounds,
    }
}

pub struct LinearizeLoad;

impl RewritePattern for LinearizeLoad {
    fn name(&self) -> &'static str {
        "linearize-load"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::Load)
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operands = rewriter.module().op(op).operands.clone();
        let Some((&view, indices)) = operands.split_first() else {
            return Ok(Match::failure("load without a view"));
        };
        if !is_flattened(rewriter, view) {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let flat = rewriter.remapped(view);
        let indices = remapped_all(rewriter, indices);

        let mut builder = rewriter.builder_before(op);
        let linear = linearize_indices(&mut builder, view, &indices)?;
        let loaded = builder.load(flat, &[linear])?;
        rewriter.replace_op(op, &[loaded])?;
        Ok(Match::Success)
    }
}

pub struct LinearizeStore;

impl RewritePattern for LinearizeStore {
    fn name(&self) -> &'static str {
        "linearize-store"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::Store)
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operands = rewriter.module().op(op).operands.clone();
        let [value, view, indices @ ..] = operands.as_slice() else {
            return Ok(Match::failure("store without a value and a view"));
        };
        if !is_flattened(rewriter, *view) {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let value = rewriter.remapped(*value);
        let flat = rewriter.remapped(*view);
        let indices = remapped_all(rewriter, indices);

        let mut builder = rewriter.builder_before(op);
        let linear = linearize_indices(&mut builder, *view, &indices)?;
        builder.store(value, flat, &[linear])?;
        rewriter.replace_op(op, &[])?;
        Ok(Match::Success)
    }
}

pub struct LinearizeTransferRead;

impl RewritePattern for LinearizeTransferRead {
    fn name(&self) -> &'static str {
        "linearize-transfer-read"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::TransferRead(_))
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let OpKind::TransferRead(ref transfer) = operation.kind else {
            return Ok(Match::failure("not a block read"));
        };
        let Some(result) = operation.result() else {
            return Ok(Match::failure("block read without a result"));
        };
        let vector = rewriter.module().value_type(result).clone();
        if let Some(declined) = check_transfer(transfer, &vector) {
            return Ok(declined);
        }
        let [view, indices @ .., padding] = operation.operands.as_slice() else {
            return Ok(Match::failure("block read without a view and a padding"));
        };
        if !is_flattened(rewriter, *view) {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let flat = rewriter.remapped(*view);
        let padding = rewriter.remapped(*padding);
        let indices = remapped_all(rewriter, indices);

        let mut builder = rewriter.builder_before(op);
        let linear = linearize_indices(&mut builder, *view, &indices)?;
        let read = builder.transfer_read(
            flat,
            &[linear],
            padding,
            vector,
            flattened_transfer(transfer.clone()),
        )?;
        rewriter.replace_op(op, &[read])?;
        Ok(Match::Success)
    }
}

pub struct LinearizeTransferWrite;

impl RewritePattern for LinearizeTransferWrite {
    fn name(&self) -> &'static str {
        "linearize-transfer-write"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::TransferWrite(_))
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let OpKind::TransferWrite(transfer) = operation.kind else {
            return Ok(Match::failure("not a block write"));
        };
        let [vector, view, indices @ ..] = operation.operands.as_slice() else {
            return Ok(Match::failure("block write without a vector and a view"));
        };
        let vector_ty = rewriter.module().value_type(*vector).clone();
        if let Some(declined) = check_transfer(&transfer, &vector_ty) {
            return Ok(declined);
        }
        if !is_flattened(rewriter, *view) {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let vector = rewriter.remapped(*vector);
        let flat = rewriter.remapped(*view);
        let indices = remapped_all(rewriter, indices);

        let mut builder = rewriter.builder_before(op);
        let linear = linearize_indices(&mut builder, *view, &indices)?;
        builder.transfer_write(vector, flat, &[linear], flattened_transfer(transfer))?;
        rewriter.replace_op(op, &[])?;
        Ok(Match::Success)
    }
}

/// Re-points a single-input conversion cast at the flattened view.
pub struct AdjustConversionCast;

impl RewritePattern for AdjustConversionCast {
    fn name(&self) -> &'static str {
        "adjust-conversion-cast"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::UnrealizedCast)
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let ([input], [result]) = (operation.operands.as_slice(), operation.results.as_slice())
        else {
            return Ok(Match::failure("only single-input, single-result casts are adjusted"));
        };
        let input_ty = rewriter.remapped_type(*input);
        if !input_ty.is_view() {
            return Ok(Match::failure("cast does not take a view"));
        }
        if !input_ty.is_rank_one_view() {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let input = rewriter.remapped(*input);
        let target = rewriter.module().value_type(*result).clone();
        let cast = rewriter.builder_before(op).unrealized_cast(input, target)?;
        rewriter.replace_op(op, &[cast])?;
        Ok(Match::Success)
    }
}

/// Drops collapse and expand ops, whose source and result flatten to the
/// same storage. A static/dynamic extent mismatch is bridged with a cast.
pub struct FoldReshape {
    pub converter: TypeConverter,
}

impl RewritePattern for FoldReshape {
    fn name(&self) -> &'static str {
        "fold-reshape"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        kind.is_reshape()
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let ([source], [result]) = (operation.operands.as_slice(), operation.results.as_slice())
        else {
            return Ok(Match::failure("reshape without a single source and result"));
        };
        let Some(flat_source) = rewriter.remapped_type(*source).as_view().cloned() else {
            return Ok(Match::failure("reshape source is not a view"));
        };
        if !flat_source.is_rank_one() {
            return Ok(Match::failure(NOT_FLATTENED));
        }
        let Some(result_ty) = rewriter.module().view_type(*result) else {
            return Ok(Match::failure("reshape result is not a view"));
        };
        let needed = self.converter.convert_view(result_ty);
        let flat = rewriter.remapped(*source);

        if flat_source == needed {
            rewriter.replace_op(op, &[flat])?;
            return Ok(Match::Success);
        }
        let compatible = flat_source.element == needed.element
            && flat_source.memory_space == needed.memory_space
            && flat_source.has_identity_layout()
            && needed.has_identity_layout();
        if !compatible {
            let error = FlattenError::IncompatibleReshape {
                source_ty: flat_source.into(),
                target_ty: needed.into(),
            };
            return Err(error.at(operation.span));
        }
        let cast = rewriter.builder_before(op).view_cast(flat, needed)?;
        rewriter.replace_op(op, &[cast])?;
        Ok(Match::Success)
    }
}
