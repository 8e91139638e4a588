//! Structural checks over a [`Module`].

use std::collections::HashSet;

use crate::error::Result;

use super::module::{Module, OpId, Operation, ValueDef, ValueId};
use super::op::OpKind;
use super::ty::Type;

impl Module {
    /// Check that every operand is defined before it is used and that each op
    /// agrees with the types of its operands and results.
    pub fn verify(&self) -> Result<()> {
        for &global in self.globals() {
            let op = self.op(global);
            ir_ensure!(
                op.operands.is_empty() && op.results.is_empty(),
                op.span,
                "module-level {} must not take operands or produce results",
                op.kind.name()
            );
            ir_ensure!(
                matches!(op.kind, OpKind::Global(_)),
                op.span,
                "only globals may live at module level, found {}",
                op.kind.name()
            );
        }

        for (func_id, func) in self.functions() {
            let mut defined: HashSet<ValueId> = func.arguments.iter().copied().collect();
            for &id in func.body() {
                let op = self.op(id);
                for &operand in &op.operands {
                    ir_ensure!(
                        defined.contains(&operand),
                        op.span,
                        "{} in @{} uses {} before its definition",
                        op.kind.name(),
                        func.name,
                        operand
                    );
                    if let ValueDef::Argument { func: owner, .. } = self.value(operand).def {
                        ir_ensure!(
                            owner == func_id,
                            op.span,
                            "{} uses an argument of another function",
                            op.kind.name()
                        );
                    }
                }
                self.verify_op(id, op)?;
                defined.extend(op.results.iter().copied());
            }
        }
        Ok(())
    }

    fn verify_op(&self, id: OpId, op: &Operation) -> Result<()> {
        let span = op.span;
        let name = op.kind.name();
        match &op.kind {
            OpKind::ConstantIndex(_) => {
                self.expect_results(op, &[Type::Index])?;
            }
            OpKind::AffineApply(map) => {
                ir_ensure!(
                    map.num_results() == 1 && map.num_inputs() == op.operands.len(),
                    span,
                    "{} with map {} has {} operands",
                    name,
                    map,
                    op.operands.len()
                );
                self.expect_results(op, &[Type::Index])?;
            }
            OpKind::BindingSubspan(binding) => {
                let view = self.single_view_result(op)?;
                let expected = usize::from(binding.has_byte_offset) + view.num_dynamic_dims();
                ir_ensure!(
                    op.operands.len() == expected,
                    span,
                    "{} producing {} needs {} operands, has {}",
                    name,
                    view,
                    expected,
                    op.operands.len()
                );
            }
            OpKind::Alloc { .. } => {
                let view = self.single_view_result(op)?;
                ir_ensure!(
                    op.operands.len() == view.num_dynamic_dims(),
                    span,
                    "{} producing {} needs {} dynamic extents",
                    name,
                    view,
                    view.num_dynamic_dims()
                );
            }
            OpKind::Global(_) => {
                ir_bail!(span, "{} is only allowed at module level", name);
            }
            OpKind::GetGlobal { name: symbol } => {
                let view = self.single_view_result(op)?;
                let Some(global) = self.lookup_global(symbol) else {
                    ir_bail!(span, "{} refers to unknown global @{}", name, symbol);
                };
                if let OpKind::Global(def) = &self.op(global).kind {
                    ir_ensure!(
                        def.ty == *view,
                        span,
                        "{} yields {} but @{} is {}",
                        name,
                        view,
                        symbol,
                        def.ty
                    );
                }
            }
            OpKind::Load => {
                let view = self.operand_view(op, 0)?;
                ir_ensure!(
                    op.operands.len() == 1 + view.rank(),
                    span,
                    "{} from {} needs {} indices",
                    name,
                    view,
                    view.rank()
                );
                self.expect_results(op, &[view.element_type().clone()])?;
            }
            OpKind::Store => {
                let view = self.operand_view(op, 1)?;
                ir_ensure!(
                    op.operands.len() == 2 + view.rank(),
                    span,
                    "{} into {} needs {} indices",
                    name,
                    view,
                    view.rank()
                );
                ir_ensure!(
                    self.value_type(op.operands[0]) == view.element_type(),
                    span,
                    "{} of {} into {}",
                    name,
                    self.value_type(op.operands[0]),
                    view
                );
            }
            OpKind::TransferRead(transfer) => {
                let view = self.operand_view(op, 0)?;
                ir_ensure!(
                    op.operands.len() == 2 + view.rank()
                        && transfer.permutation_map.num_dims as usize == view.rank(),
                    span,
                    "{} from {} has a malformed operand list or map",
                    name,
                    view
                );
                ir_ensure!(
                    op.results.len() == 1
                        && matches!(self.value_type(op.results[0]), Type::Vector(_)),
                    span,
                    "{} must produce a vector",
                    name
                );
            }
            OpKind::TransferWrite(transfer) => {
                let view = self.operand_view(op, 1)?;
                ir_ensure!(
                    op.operands.len() == 2 + view.rank()
                        && transfer.permutation_map.num_dims as usize == view.rank(),
                    span,
                    "{} into {} has a malformed operand list or map",
                    name,
                    view
                );
            }
            OpKind::ViewCast => {
                let source = self.operand_view(op, 0)?;
                let target = self.single_view_result(op)?;
                ir_ensure!(
                    source.rank() == target.rank() && source.element_type() == target.element_type(),
                    span,
                    "{} cannot cast {} to {}",
                    name,
                    source,
                    target
                );
            }
            OpKind::CollapseShape { reassociation } | OpKind::ExpandShape { reassociation } => {
                let source = self.operand_view(op, 0)?;
                let target = self.single_view_result(op)?;
                let (wide, narrow) = match op.kind {
                    OpKind::CollapseShape { .. } => (source, target),
                    _ => (target, source),
                };
                let covered: usize = reassociation.iter().map(Vec::len).sum();
                ir_ensure!(
                    reassociation.len() == narrow.rank() && covered == wide.rank(),
                    span,
                    "{} reassociation does not match {} and {}",
                    name,
                    source,
                    target
                );
            }
            OpKind::AssumeAlignment { alignment } => {
                self.operand_view(op, 0)?;
                ir_ensure!(
                    alignment.is_power_of_two(),
                    span,
                    "{} alignment {} is not a power of two",
                    name,
                    alignment
                );
            }
            OpKind::Opaque(opaque) if opaque.result_dims => {
                let view = self.single_view_result(op)?;
                ir_ensure!(
                    op.operands.len() == view.num_dynamic_dims(),
                    span,
                    "{} in {} lists {} extents for {}",
                    name,
                    id,
                    op.operands.len(),
                    view
                );
            }
            OpKind::UnrealizedCast | OpKind::Opaque(_) => {}
        }
        Ok(())
    }

    fn expect_results(&self, op: &Operation, expected: &[Type]) -> Result<()> {
        let actual: Vec<&Type> = op.results.iter().map(|&r| self.value_type(r)).collect();
        ir_ensure!(
            actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, e)| *a == e),
            op.span,
            "{} has unexpected result types",
            op.kind.name()
        );
        Ok(())
    }

    fn single_view_result(&self, op: &Operation) -> Result<&super::ty::ViewType> {
        match op.results.as_slice() {
            [result] => match self.view_type(*result) {
                Some(view) => Ok(view),
                None => ir_bail!(op.span, "{} must produce a view", op.kind.name()),
            },
            _ => ir_bail!(op.span, "{} must produce exactly one result", op.kind.name()),
        }
    }

    fn operand_view(&self, op: &Operation, index: usize) -> Result<&super::ty::ViewType> {
        let Some(&operand) = op.operands.get(index) else {
            ir_bail!(op.span, "{} is missing operand #{}", op.kind.name(), index);
        };
        match self.view_type(operand) {
            Some(view) => Ok(view),
            None => ir_bail!(
                op.span,
                "{} operand #{} must be a view, found {}",
                op.kind.name(),
                index,
                self.value_type(operand)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Extent, Module, OpBuilder, Type, ViewType};

    #[test]
    fn well_formed_module_verifies() {
        let mut module = Module::new();
        let view = ViewType::new(vec![Extent::Dynamic], Type::f32());
        let func = module.add_function("main", vec![view.into()]);
        let arg = module.argument(func, 0);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let i = builder.constant_index(0).expect("constant");
        let value = builder.load(arg, &[i]).expect("load");
        builder.store(value, arg, &[i]).expect("store");
        assert!(module.verify().is_ok());
    }

    #[test]
    fn dangling_operand_is_rejected() {
        let mut module = Module::new();
        let view = ViewType::of(&[4], Type::f32());
        let func = module.add_function("main", vec![view.into()]);
        let arg = module.argument(func, 0);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let i = builder.constant_index(0).expect("constant");
        builder.load(arg, &[i]).expect("load");
        let constant = module.defining_op(i).expect("op result");
        module.erase_op(constant);
        assert!(module.verify().is_err());
    }

    #[test]
    fn load_index_count_must_match_rank() {
        let mut module = Module::new();
        let view = ViewType::of(&[4, 4], Type::f32());
        let func = module.add_function("main", vec![view.into()]);
        let arg = module.argument(func, 0);
        let mut builder = OpBuilder::at_end(&mut module, func);
        let i = builder.constant_index(0).expect("constant");
        builder.load(arg, &[i]).expect("load");
        assert!(module.verify().is_err());
    }
}
