use memflat_core::ir::{
    AffineExpr, AffineMap, BindingSubspan, DescriptorKind, DimValue, Extent, Module, OpBuilder,
    OpKind, ShapeQuery, Type, ViewType,
};
use pretty_assertions::assert_eq;

fn storage() -> BindingSubspan {
    BindingSubspan {
        set: 0,
        binding: 0,
        descriptor: DescriptorKind::StorageBuffer,
        has_byte_offset: false,
        alignment: None,
    }
}

#[test]
fn bindings_report_their_extents() {
    let mut module = Module::new();
    let func = module.add_function("main", vec![Type::Index]);
    let n = module.argument(func, 0);
    let mut builder = OpBuilder::at_end(&mut module, func);
    let offset = builder.constant_index(16).expect("constant");
    let view = builder
        .binding_subspan(
            storage(),
            ViewType::new(vec![Extent::Dynamic, Extent::Static(4)], Type::f32()),
            Some(offset),
            &[n],
        )
        .expect("binding");

    assert_eq!(
        module.shape_query(view),
        ShapeQuery::Dims(vec![DimValue::Dynamic(n), DimValue::Static(4)])
    );
    assert_eq!(module.shape_query(n), ShapeQuery::Unsupported);
    module.verify().expect("well formed");
}

#[test]
fn chained_applies_fold_into_one() {
    let mut module = Module::new();
    let func = module.add_function("main", vec![Type::Index, Type::Index]);
    let i = module.argument(func, 0);
    let j = module.argument(func, 1);
    let mut builder = OpBuilder::at_end(&mut module, func);
    let scale = AffineMap::new(0, 1, vec![AffineExpr::symbol(0) * AffineExpr::constant(4)]);
    let scaled = builder
        .create_or_fold_affine_apply(&scale, &[i])
        .expect("scale");
    let sum = AffineMap::new(0, 2, vec![AffineExpr::symbol(0) + AffineExpr::symbol(1)]);
    let index = builder
        .create_or_fold_affine_apply(&sum, &[scaled, j])
        .expect("sum");

    let apply = module.op(module.defining_op(index).expect("apply"));
    match &apply.kind {
        OpKind::AffineApply(map) => assert_eq!(map.to_string(), "()[s0, s1] -> (s0 * 4 + s1)"),
        other => panic!("expected affine.apply, got {:?}", other),
    }
    assert_eq!(apply.operands, vec![i, j]);
}

#[test]
fn constant_operands_fold_to_a_constant() {
    let mut module = Module::new();
    let func = module.add_function("main", vec![]);
    let mut builder = OpBuilder::at_end(&mut module, func);
    let two = builder.constant_index(2).expect("constant");
    let three = builder.constant_index(3).expect("constant");
    let map = AffineMap::new(0, 2, vec![AffineExpr::symbol(0) * AffineExpr::constant(8) + AffineExpr::symbol(1)]);
    let folded = builder
        .create_or_fold_affine_apply(&map, &[two, three])
        .expect("fold");

    assert_eq!(module.constant_index(folded), Some(19));
}

#[test]
fn verify_rejects_use_before_definition() {
    let mut module = Module::new();
    let func = module.add_function("main", vec![Type::Index]);
    let i = module.argument(func, 0);
    let mut builder = OpBuilder::at_end(&mut module, func);
    let view = builder
        .binding_subspan(storage(), ViewType::of(&[8], Type::f32()), None, &[])
        .expect("binding");
    let load = builder.load(view, &[i]).expect("load");
    let load_op = module.defining_op(load).expect("load op");
    let binding_op = module.defining_op(view).expect("binding op");
    module.erase_op(binding_op);

    let error = module.verify().expect_err("dangling operand");
    assert!(error.to_string().contains("before its definition"));
    assert!(module.is_live(load_op));
}
