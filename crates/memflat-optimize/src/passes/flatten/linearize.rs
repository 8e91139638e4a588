use memflat_core::error::Result;
use memflat_core::ir::layout::strided_linear_layout_map;
use memflat_core::ir::shape::zip_extents;
use memflat_core::ir::{
    AffineExpr, AffineMap, DimValue, Module, OpBuilder, OpKind, ShapeQuery, ValueId,
};

use crate::error::FlattenError;

/// Extents of the view `source`, asked of its producer.
///
/// Producers that state their result shape answer directly; allocations are
/// read off their dynamic-extent operands.
pub fn recover_extents(module: &Module, source: ValueId) -> Option<Vec<DimValue>> {
    if let ShapeQuery::Dims(dims) = module.shape_query(source) {
        return Some(dims);
    }
    let view = module.view_type(source)?;
    let op = module.try_op(module.defining_op(source)?)?;
    match op.kind {
        OpKind::Alloc { .. } => zip_extents(view.shape.iter().map(|e| e.as_static()), &op.operands),
        _ => None,
    }
}

/// One index into the flattened form of `source` addressing the same element
/// as `indices` do in `source` itself.
///
/// `source` is the view as it was before flattening. A view whose strides are
/// all static linearizes through its layout map; otherwise the extents are
/// recovered from the producer and combined row-major. Failing both is fatal.
pub fn linearize_indices(
    builder: &mut OpBuilder<'_>,
    source: ValueId,
    indices: &[ValueId],
) -> Result<ValueId> {
    let Some(view) = builder.module().view_type(source).cloned() else {
        memflat_core::ir_bail!(
            builder.span(),
            "cannot linearize into non-view {}",
            builder.module().value_type(source)
        );
    };
    memflat_core::ir_ensure!(
        indices.len() == view.rank(),
        builder.span(),
        "{} indices into {}",
        indices.len(),
        view
    );
    if view.rank() == 0 {
        return builder.constant_index(0);
    }

    if let Some(map) = strided_linear_layout_map(&view) {
        if map.num_symbols == 0 {
            return builder.create_or_fold_affine_apply(&map, indices);
        }
    }

    let Some(dims) = recover_extents(builder.module(), source) else {
        return Err(FlattenError::ShapeRecoveryFailure { ty: view }.at(builder.span()));
    };

    // index_0 * dim_1 + index_1, then times dim_2 plus index_2, and so on.
    let mut operands = vec![indices[0]];
    let mut expr = AffineExpr::symbol(0);
    for (&index, dim) in indices.iter().zip(&dims).skip(1) {
        let extent = match *dim {
            DimValue::Static(n) => AffineExpr::constant(n as i64),
            DimValue::Dynamic(value) => {
                operands.push(value);
                AffineExpr::symbol(operands.len() as u32 - 1)
            }
        };
        operands.push(index);
        expr = expr * extent + AffineExpr::symbol(operands.len() as u32 - 1);
    }
    let map = AffineMap::new(0, operands.len() as u32, vec![expr]);
    builder.create_or_fold_affine_apply(&map, &operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memflat_core::ir::{
        AllocSpace, BindingSubspan, DescriptorKind, Extent, Type, ViewType,
    };

    fn apply_map(module: &Module, value: ValueId) -> String {
        let op = module.op(module.defining_op(value).expect("op result"));
        match &op.kind {
            OpKind::AffineApply(map) => map.to_string(),
            other => panic!("expected affine.apply, got {:?}", other),
        }
    }

    #[test]
    fn static_row_major_index_folds_to_a_constant() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![ViewType::of(&[2, 3, 4], Type::f32()).into()]);
        let view = module.argument(func, 0);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let indices = [1, 2, 3]
            .map(|i| builder.constant_index(i).expect("constant"));
        let linear = linearize_indices(&mut builder, view, &indices).expect("linearize");
        assert_eq!(module.constant_index(linear), Some(23));
    }

    #[test]
    fn scalar_views_use_index_zero() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![ViewType::of(&[], Type::i32()).into()]);
        let view = module.argument(func, 0);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let linear = linearize_indices(&mut builder, view, &[]).expect("linearize");
        assert_eq!(module.constant_index(linear), Some(0));
    }

    #[test]
    fn dynamic_inner_extent_is_read_from_the_binding() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![Type::Index, Type::Index, Type::Index]);
        let n = module.argument(func, 0);
        let i = module.argument(func, 1);
        let j = module.argument(func, 2);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let binding = builder
            .binding_subspan(
                BindingSubspan {
                    set: 0,
                    binding: 0,
                    descriptor: DescriptorKind::StorageBuffer,
                    has_byte_offset: false,
                    alignment: None,
                },
                ViewType::new(vec![Extent::Static(4), Extent::Dynamic], Type::f32()),
                None,
                &[n],
            )
            .expect("binding");
        let linear = linearize_indices(&mut builder, binding, &[i, j]).expect("linearize");
        assert_eq!(apply_map(&module, linear), "()[s0, s1, s2] -> (s0 * s1 + s2)");
        let operands = &module.op(module.defining_op(linear).expect("op result")).operands;
        assert_eq!(operands, &vec![i, n, j]);
    }

    #[test]
    fn allocations_supply_their_dynamic_extents() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![Type::Index, Type::Index]);
        let n = module.argument(func, 0);
        let i = module.argument(func, 1);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let alloc = builder
            .alloc(
                AllocSpace::Heap,
                ViewType::new(vec![Extent::Dynamic, Extent::Dynamic], Type::f32()),
                &[n, n],
                None,
            )
            .expect("alloc");
        let linear = linearize_indices(&mut builder, alloc, &[i, i]).expect("linearize");
        assert_eq!(apply_map(&module, linear), "()[s0, s1] -> (s0 * s1 + s0)");
    }

    #[test]
    fn unknown_producers_cannot_be_linearized() {
        let mut module = Module::new();
        let view = ViewType::new(vec![Extent::Dynamic, Extent::Dynamic], Type::f32());
        let func = module.add_function("main", vec![view.into(), Type::Index]);
        let source = module.argument(func, 0);
        let i = module.argument(func, 1);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let error = linearize_indices(&mut builder, source, &[i, i]).expect_err("no extents");
        assert_eq!(error.code(), Some("memflat::shape-recovery"));
    }
}
