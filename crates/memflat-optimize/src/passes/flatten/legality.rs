use memflat_core::ir::{Module, OpId, OpKind, Type};

fn is_rank_one(ty: &Type) -> bool {
    ty.is_rank_one_view()
}

/// Whether `op` is already in the form the flattening conversion produces.
///
/// Ops outside the view vocabulary are always legal.
pub fn is_legal(module: &Module, op: OpId) -> bool {
    let op = module.op(op);
    let operand_ty = |index: usize| op.operands.get(index).map(|&v| module.value_type(v));
    let result_ty = |index: usize| op.results.get(index).map(|&v| module.value_type(v));

    match &op.kind {
        OpKind::Alloc { .. } | OpKind::GetGlobal { .. } => result_ty(0).is_some_and(is_rank_one),
        OpKind::CollapseShape { .. } | OpKind::ExpandShape { .. } => {
            result_ty(0).is_some_and(is_rank_one) && operand_ty(0).is_some_and(is_rank_one)
        }
        OpKind::BindingSubspan(_) => result_ty(0)
            .and_then(Type::as_view)
            .is_some_and(|view| view.is_rank_one() && view.is_dynamic_dim(0)),
        OpKind::Global(global) => global.ty.is_rank_one(),
        OpKind::Load | OpKind::TransferRead(_) => operand_ty(0).is_some_and(is_rank_one),
        OpKind::Store | OpKind::TransferWrite(_) => operand_ty(1).is_some_and(is_rank_one),
        OpKind::UnrealizedCast => match op.operands.as_slice() {
            [input] => {
                let ty = module.value_type(*input);
                !ty.is_view() || is_rank_one(ty)
            }
            _ => false,
        },
        _ => true,
    }
}
