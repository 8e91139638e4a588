use super::module::{Module, ValueId};
use super::op::OpKind;

/// One extent of a view as seen at its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimValue {
    Static(u64),
    Dynamic(ValueId),
}

/// Answer of a producer asked for the extents of the view it defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeQuery {
    Dims(Vec<DimValue>),
    Unsupported,
}

impl Module {
    /// Per-dimension extents of `value`, when its producer can state them.
    ///
    /// Buffer bindings and opaque ops that declare their result extents
    /// answer; every other producer, and function arguments, do not.
    pub fn shape_query(&self, value: ValueId) -> ShapeQuery {
        let Some(view) = self.view_type(value) else {
            return ShapeQuery::Unsupported;
        };
        let Some(op) = self.defining_op(value).and_then(|id| self.try_op(id)) else {
            return ShapeQuery::Unsupported;
        };
        let dynamic = match &op.kind {
            OpKind::BindingSubspan(binding) => {
                let skip = usize::from(binding.has_byte_offset);
                op.operands.get(skip..).unwrap_or_default()
            }
            OpKind::Opaque(opaque) if opaque.result_dims && op.results.len() == 1 => {
                op.operands.as_slice()
            }
            _ => return ShapeQuery::Unsupported,
        };
        match zip_extents(view.shape.iter().map(|e| e.as_static()), dynamic) {
            Some(dims) => ShapeQuery::Dims(dims),
            None => ShapeQuery::Unsupported,
        }
    }
}

/// Pair static extents with literals and dynamic ones with `dynamic`, in order.
///
/// `None` when the operand count does not match the number of dynamic extents.
pub fn zip_extents(
    extents: impl IntoIterator<Item = Option<u64>>,
    dynamic: &[ValueId],
) -> Option<Vec<DimValue>> {
    let mut operands = dynamic.iter().copied();
    let dims = extents
        .into_iter()
        .map(|extent| match extent {
            Some(n) => Some(DimValue::Static(n)),
            None => operands.next().map(DimValue::Dynamic),
        })
        .collect::<Option<Vec<_>>>()?;
    operands.next().is_none().then_some(dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::{BindingSubspan, DescriptorKind, OpaqueOp};
    use crate::ir::{Extent, OpBuilder, Type, ViewType};

    #[test]
    fn bindings_report_extents_after_the_byte_offset() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![Type::Index, Type::Index]);
        let offset = module.argument(func, 0);
        let n = module.argument(func, 1);
        let view = ViewType::new(
            vec![Extent::Static(4), Extent::Dynamic, Extent::Static(2)],
            Type::f32(),
        );
        let mut builder = OpBuilder::at_end(&mut module, func);
        let binding = builder
            .binding_subspan(
                BindingSubspan {
                    set: 0,
                    binding: 1,
                    descriptor: DescriptorKind::StorageBuffer,
                    has_byte_offset: true,
                    alignment: Some(64),
                },
                view,
                Some(offset),
                &[n],
            )
            .expect("binding");
        assert_eq!(
            module.shape_query(binding),
            ShapeQuery::Dims(vec![
                DimValue::Static(4),
                DimValue::Dynamic(n),
                DimValue::Static(2)
            ])
        );
    }

    #[test]
    fn opaque_producers_answer_only_when_declared() {
        let mut module = Module::new();
        let func = module.add_function("main", vec![Type::Index]);
        let n = module.argument(func, 0);
        let view: Type = ViewType::new(vec![Extent::Dynamic, Extent::Static(3)], Type::i32()).into();
        let mut builder = OpBuilder::at_end(&mut module, func);
        let declared = builder
            .opaque(
                OpaqueOp {
                    name: "test.shaped".into(),
                    result_dims: true,
                    has_side_effects: false,
                },
                vec![n],
                vec![view.clone()],
            )
            .expect("opaque");
        let silent = builder
            .opaque(
                OpaqueOp {
                    name: "test.unknown".into(),
                    result_dims: false,
                    has_side_effects: false,
                },
                vec![n],
                vec![view],
            )
            .expect("opaque");
        let declared = module.op(declared).results[0];
        let silent = module.op(silent).results[0];
        assert_eq!(
            module.shape_query(declared),
            ShapeQuery::Dims(vec![DimValue::Dynamic(n), DimValue::Static(3)])
        );
        assert_eq!(module.shape_query(silent), ShapeQuery::Unsupported);
    }
}
