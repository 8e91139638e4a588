use memflat_core::ir::{Module, OpId, OpKind, Type, ValueId};

/// Live ops printed under `name`, in program order.
pub fn ops_named(module: &Module, name: &str) -> Vec<OpId> {
    module
        .walk()
        .into_iter()
        .filter(|&op| module.op(op).kind.name() == name)
        .collect()
}

pub fn single_op(module: &Module, name: &str) -> OpId {
    let ops = ops_named(module, name);
    assert_eq!(ops.len(), 1, "expected exactly one {name}, found {}", ops.len());
    ops[0]
}

/// Every view flowing through the function bodies has rank 1.
pub fn assert_all_views_rank_one(module: &Module) {
    for op in module.walk() {
        let operation = module.op(op);
        if let OpKind::Global(global) = &operation.kind {
            assert!(global.ty.is_rank_one(), "global {} is {}", global.name, global.ty);
        }
        for &value in operation.operands.iter().chain(&operation.results) {
            let ty = module.value_type(value);
            if let Type::View(view) = ty {
                assert!(
                    view.is_rank_one(),
                    "{} still touches {}",
                    operation.kind.name(),
                    ty
                );
            }
        }
    }
}

pub fn assert_constant(module: &Module, value: ValueId, expected: i64) {
    assert_eq!(
        module.constant_index(value),
        Some(expected),
        "value is not the constant {expected}"
    );
}
