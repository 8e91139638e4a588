//! Rewrites of the ops that create views: bindings, allocations, globals and
//! global loads.

use memflat_core::error::Result;
use memflat_core::ir::{
    AffineExpr, AffineMap, Extent, GlobalDef, Layout, OpBuilder, OpId, OpKind, ValueId, ViewType,
};

use crate::error::FlattenError;
use crate::rewrite::{Match, RewritePattern, Rewriter};

use super::type_converter::TypeConverter;

/// Number of elements in `view`, as one index value.
///
/// Static extents enter the product as literals, dynamic ones as
/// `dynamic_dims` in declaration order.
pub fn total_element_count(
    builder: &mut OpBuilder<'_>,
    view: &ViewType,
    dynamic_dims: &[ValueId],
) -> Result<ValueId> {
    if let Some(count) = view.num_elements() {
        return builder.constant_index(count as i64);
    }
    memflat_core::ir_ensure!(
        dynamic_dims.len() == view.num_dynamic_dims(),
        builder.span(),
        "{} needs {} dynamic extents, got {}",
        view,
        view.num_dynamic_dims(),
        dynamic_dims.len()
    );

    let mut next_symbol = 0;
    let size = view
        .shape
        .iter()
        .fold(AffineExpr::constant(1), |size, extent| match extent {
            Extent::Static(n) => size * AffineExpr::constant(*n as i64),
            Extent::Dynamic => {
                let symbol = AffineExpr::symbol(next_symbol);
                next_symbol += 1;
                size * symbol
            }
        });
    let map = AffineMap::new(0, next_symbol, vec![size]);
    builder.create_or_fold_affine_apply(&map, dynamic_dims)
}

fn result_view(rewriter: &Rewriter<'_>, op: OpId) -> Option<ViewType> {
    let result = rewriter.module().op(op).result()?;
    rewriter.module().view_type(result).cloned()
}

/// Decline, with a warning, views that are not laid out row-major.
fn check_identity(rewriter: &mut Rewriter<'_>, op: OpId, view: &ViewType) -> Option<Match> {
    if view.has_identity_layout() {
        return None;
    }
    rewriter.warn(op, &FlattenError::UnsupportedLayout { ty: view.clone() });
    Some(Match::failure("non-identity layout"))
}

/// `buffer.binding` of any rank becomes a fully dynamic rank-1 binding whose
/// only extent is the element count.
pub struct FlattenBinding {
    pub converter: TypeConverter,
}

impl RewritePattern for FlattenBinding {
    fn name(&self) -> &'static str {
        "flatten-binding"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::BindingSubspan(_))
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let OpKind::BindingSubspan(binding) = operation.kind else {
            return Ok(Match::failure("not a binding"));
        };
        let Some(old_ty) = result_view(rewriter, op) else {
            return Ok(Match::failure("binding does not produce a view"));
        };
        if let Some(declined) = check_identity(rewriter, op, &old_ty) {
            return Ok(declined);
        }

        let (byte_offset, dynamic_dims) = if binding.has_byte_offset {
            let (offset, dims) = operation.operands.split_at(1);
            (Some(rewriter.remapped(offset[0])), dims.to_vec())
        } else {
            (None, operation.operands.clone())
        };
        let new_ty = self.converter.convert_view(&old_ty);

        let mut builder = rewriter.builder_before(op);
        let count = total_element_count(&mut builder, &old_ty, &dynamic_dims)?;
        let flat = builder.binding_subspan(binding, new_ty, byte_offset, &[count])?;
        // Rank-1 users keep seeing the type they were built against.
        let replacement = if old_ty.is_rank_one() {
            builder.view_cast(flat, old_ty)?
        } else {
            flat
        };
        rewriter.replace_op(op, &[replacement])?;
        Ok(Match::Success)
    }
}

/// Heap and stack allocations take one dynamic extent, the element count.
pub struct FlattenAlloc {
    pub converter: TypeConverter,
}

impl RewritePattern for FlattenAlloc {
    fn name(&self) -> &'static str {
        "flatten-alloc"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::Alloc { .. })
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let operation = rewriter.module().op(op).clone();
        let OpKind::Alloc { space, alignment } = operation.kind else {
            return Ok(Match::failure("not an allocation"));
        };
        let Some(old_ty) = result_view(rewriter, op) else {
            return Ok(Match::failure("allocation does not produce a view"));
        };
        if let Some(declined) = check_identity(rewriter, op, &old_ty) {
            return Ok(declined);
        }

        let new_ty = self.converter.convert_view(&old_ty);
        let dynamic_dims: Vec<ValueId> = operation
            .operands
            .iter()
            .map(|&dim| rewriter.remapped(dim))
            .collect();
        let mut builder = rewriter.builder_before(op);
        let count = total_element_count(&mut builder, &old_ty, &dynamic_dims)?;
        let flat = builder.alloc(space, new_ty, &[count], alignment)?;
        rewriter.replace_op(op, &[flat])?;
        Ok(Match::Success)
    }
}

/// Globals become fully static rank-1 globals with a flattened initializer.
pub struct FlattenGlobal;

impl RewritePattern for FlattenGlobal {
    fn name(&self) -> &'static str {
        "flatten-global"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::Global(_))
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let OpKind::Global(global) = rewriter.module().op(op).kind.clone() else {
            return Ok(Match::failure("not a global"));
        };
        if let Some(declined) = check_identity(rewriter, op, &global.ty) {
            return Ok(declined);
        }
        let Some(count) = global.ty.num_elements() else {
            return Ok(Match::failure("global has dynamic extents"));
        };

        let initial_value = match &global.initial_value {
            Some(payload) => match payload.reshape(&[count]) {
                Some(flat) => Some(flat),
                None => return Ok(Match::failure("initializer does not match the global's shape")),
            },
            None => None,
        };
        let ty = ViewType {
            shape: vec![Extent::Static(count)],
            element: global.ty.element.clone(),
            layout: Layout::Identity,
            memory_space: global.ty.memory_space,
        };

        rewriter.builder_before(op).global(GlobalDef {
            ty,
            initial_value,
            ..global
        })?;
        rewriter.replace_op(op, &[])?;
        Ok(Match::Success)
    }
}

/// A load of a multi-dimensional global reads the flattened global and casts
/// the result to the canonical view type.
pub struct FlattenGetGlobal {
    pub converter: TypeConverter,
}

impl RewritePattern for FlattenGetGlobal {
    fn name(&self) -> &'static str {
        "flatten-get-global"
    }

    fn matches_root(&self, kind: &OpKind) -> bool {
        matches!(kind, OpKind::GetGlobal { .. })
    }

    fn match_and_rewrite(&self, op: OpId, rewriter: &mut Rewriter<'_>) -> Result<Match> {
        let OpKind::GetGlobal { name } = rewriter.module().op(op).kind.clone() else {
            return Ok(Match::failure("not a global load"));
        };
        let Some(old_ty) = result_view(rewriter, op) else {
            return Ok(Match::failure("global load does not produce a view"));
        };
        if let Some(declined) = check_identity(rewriter, op, &old_ty) {
            return Ok(declined);
        }
        let Some(global) = rewriter.lookup_global(&name) else {
            return Ok(Match::failure(format!("no global named @{}", name)));
        };
        let OpKind::Global(def) = &rewriter.module().op(global).kind else {
            return Ok(Match::failure("symbol is not a global"));
        };
        if !def.ty.is_rank_one() {
            return Ok(Match::failure("global is not flattened yet"));
        }

        let global_ty = def.ty.clone();
        let new_ty = self.converter.convert_view(&old_ty);
        let mut builder = rewriter.builder_before(op);
        let loaded = builder.get_global(name, global_ty)?;
        let cast = builder.view_cast(loaded, new_ty)?;
        rewriter.replace_op(op, &[cast])?;
        Ok(Match::Success)
    }
}
