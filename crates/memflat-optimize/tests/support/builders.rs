use memflat_core::ir::{
    BindingSubspan, DescriptorKind, Extent, FuncId, Module, OpBuilder, Type, ValueId, ViewType,
};

pub fn storage(set: u32, binding: u32) -> BindingSubspan {
    BindingSubspan {
        set,
        binding,
        descriptor: DescriptorKind::StorageBuffer,
        has_byte_offset: false,
        alignment: None,
    }
}

pub fn f32_view(shape: &[Option<u64>]) -> ViewType {
    ViewType::new(
        shape
            .iter()
            .map(|extent| extent.map_or(Extent::Dynamic, Extent::Static))
            .collect(),
        Type::f32(),
    )
}

/// A module with one function `main` taking `arguments`.
pub fn module_with_main(arguments: Vec<Type>) -> (Module, FuncId) {
    let mut module = Module::new();
    let func = module.add_function("main", arguments);
    (module, func)
}

pub fn constants(builder: &mut OpBuilder<'_>, values: &[i64]) -> Vec<ValueId> {
    values
        .iter()
        .map(|&value| builder.constant_index(value).expect("constant"))
        .collect()
}
