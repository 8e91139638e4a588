//! Arena-backed program representation.
//!
//! Ops and values live in flat arenas and are addressed by stable handles.
//! Erasing an op leaves a tombstone so handles held elsewhere never alias a
//! different op. Uses are not stored; they are recovered by scanning, which
//! keeps rewiring a plain operand update.

use derive_more::Display;

use crate::error::Result;
use crate::span::Span;

use super::op::OpKind;
use super::ty::{Type, ViewType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("op{_0}")]
pub struct OpId(u32);

impl OpId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("v{_0}")]
pub struct ValueId(u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("fn{_0}")]
pub struct FuncId(u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Result { op: OpId, index: usize },
    Argument { func: FuncId, index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub ty: Type,
    pub def: ValueDef,
}

/// Which op list an op lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    Module,
    Function(FuncId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub span: Span,
    parent: Parent,
}

impl Operation {
    pub fn parent(&self) -> Parent {
        self.parent
    }

    /// First result, for the common single-result case.
    pub fn result(&self) -> Option<ValueId> {
        self.results.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub arguments: Vec<ValueId>,
    body: Vec<OpId>,
}

impl Function {
    pub fn body(&self) -> &[OpId] {
        &self.body
    }
}

/// Where a new op is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    Before(OpId),
    After(OpId),
    End(FuncId),
    ModuleEnd,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    ops: Vec<Option<Operation>>,
    values: Vec<ValueData>,
    globals: Vec<OpId>,
    functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, name: impl Into<String>, argument_types: Vec<Type>) -> FuncId {
        let func = FuncId(self.functions.len() as u32);
        let arguments = argument_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::Argument { func, index }))
            .collect();
        self.functions.push(Function {
            name: name.into(),
            arguments,
            body: Vec::new(),
        });
        func
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(idx, func)| (FuncId(idx as u32), func))
    }

    pub fn function(&self, func: FuncId) -> &Function {
        &self.functions[func.index()]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions()
            .find(|(_, func)| func.name == name)
            .map(|(id, _)| id)
    }

    pub fn argument(&self, func: FuncId, index: usize) -> ValueId {
        self.function(func).arguments[index]
    }

    pub fn globals(&self) -> &[OpId] {
        &self.globals
    }

    /// Panics when `id` refers to an erased op; use [`Module::try_op`] when
    /// that is expected.
    pub fn op(&self, id: OpId) -> &Operation {
        self.try_op(id)
            .unwrap_or_else(|| panic!("{} was erased", id))
    }

    pub fn try_op(&self, id: OpId) -> Option<&Operation> {
        self.ops.get(id.index()).and_then(Option::as_ref)
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut Operation {
        self.ops
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{} was erased", id))
    }

    pub fn is_live(&self, id: OpId) -> bool {
        self.try_op(id).is_some()
    }

    pub fn value(&self, value: ValueId) -> &ValueData {
        &self.values[value.index()]
    }

    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.value(value).ty
    }

    pub fn view_type(&self, value: ValueId) -> Option<&ViewType> {
        self.value_type(value).as_view()
    }

    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.value(value).def {
            ValueDef::Result { op, .. } => Some(op),
            ValueDef::Argument { .. } => None,
        }
    }

    /// Value of `value` when it is produced by a live index constant.
    pub fn constant_index(&self, value: ValueId) -> Option<i64> {
        let op = self.try_op(self.defining_op(value)?)?;
        match op.kind {
            OpKind::ConstantIndex(c) => Some(c),
            _ => None,
        }
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { ty, def });
        id
    }

    fn block(&self, parent: Parent) -> &Vec<OpId> {
        match parent {
            Parent::Module => &self.globals,
            Parent::Function(func) => &self.functions[func.index()].body,
        }
    }

    fn block_mut(&mut self, parent: Parent) -> &mut Vec<OpId> {
        match parent {
            Parent::Module => &mut self.globals,
            Parent::Function(func) => &mut self.functions[func.index()].body,
        }
    }

    fn resolve(&self, point: InsertPoint) -> Result<(Parent, usize)> {
        match point {
            InsertPoint::Before(anchor) | InsertPoint::After(anchor) => {
                let Some(op) = self.try_op(anchor) else {
                    crate::bail!("cannot insert next to erased {}", anchor);
                };
                let parent = op.parent;
                let position = self
                    .block(parent)
                    .iter()
                    .position(|&candidate| candidate == anchor)
                    .ok_or_else(|| crate::error::Error::ir(op.span, "op missing from its block"))?;
                match point {
                    InsertPoint::After(_) => Ok((parent, position + 1)),
                    _ => Ok((parent, position)),
                }
            }
            InsertPoint::End(func) => {
                if func.index() >= self.functions.len() {
                    crate::bail!("unknown function {}", func);
                }
                let parent = Parent::Function(func);
                Ok((parent, self.block(parent).len()))
            }
            InsertPoint::ModuleEnd => Ok((Parent::Module, self.globals.len())),
        }
    }

    pub fn insert_op(
        &mut self,
        point: InsertPoint,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
        span: Span,
    ) -> Result<OpId> {
        let (parent, position) = self.resolve(point)?;
        let id = OpId(self.ops.len() as u32);
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::Result { op: id, index }))
            .collect();
        self.ops.push(Some(Operation {
            kind,
            operands,
            results,
            span,
            parent,
        }));
        self.block_mut(parent).insert(position, id);
        Ok(id)
    }

    /// Remove an op. Any remaining uses of its results dangle; callers rewire
    /// them first.
    pub fn erase_op(&mut self, id: OpId) {
        let Some(op) = self.ops.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        self.block_mut(op.parent).retain(|&candidate| candidate != id);
    }

    /// Every live op in program order: globals first, then function bodies.
    pub fn walk(&self) -> Vec<OpId> {
        self.globals
            .iter()
            .chain(self.functions.iter().flat_map(|func| func.body.iter()))
            .copied()
            .collect()
    }

    pub fn num_live_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_some()).count()
    }

    /// `(user, operand index)` pairs for every live use of `value`.
    pub fn uses(&self, value: ValueId) -> Vec<(OpId, usize)> {
        self.walk()
            .into_iter()
            .flat_map(|user| {
                self.op(user)
                    .operands
                    .iter()
                    .enumerate()
                    .filter(|(_, operand)| **operand == value)
                    .map(move |(index, _)| (user, index))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        self.walk()
            .into_iter()
            .any(|user| self.op(user).operands.contains(&value))
    }

    pub fn set_operand(&mut self, op: OpId, index: usize, value: ValueId) {
        self.op_mut(op).operands[index] = value;
    }

    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) {
        self.replace_uses_where(from, to, |_| true);
    }

    /// Rewire uses of `from` to `to` in the users accepted by `filter`.
    pub fn replace_uses_where(
        &mut self,
        from: ValueId,
        to: ValueId,
        filter: impl Fn(OpId) -> bool,
    ) {
        for (user, index) in self.uses(from) {
            if filter(user) {
                self.set_operand(user, index, to);
            }
        }
    }

    pub fn lookup_global(&self, name: &str) -> Option<OpId> {
        self.globals.iter().copied().find(|&id| {
            matches!(&self.op(id).kind, OpKind::Global(global) if global.name == name)
        })
    }

    /// Position of `id` inside its block.
    pub fn position(&self, id: OpId) -> Option<usize> {
        let op = self.try_op(id)?;
        self.block(op.parent).iter().position(|&candidate| candidate == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Extent, ViewType};

    fn index_constant(module: &mut Module, point: InsertPoint, value: i64) -> ValueId {
        let op = module
            .insert_op(
                point,
                OpKind::ConstantIndex(value),
                Vec::new(),
                vec![Type::Index],
                Span::unknown(),
            )
            .expect("insertion succeeds");
        module.op(op).results[0]
    }

    #[test]
    fn insertion_respects_anchor_positions() {
        let mut module = Module::new();
        let func = module.add_function("main", Vec::new());
        let a = index_constant(&mut module, InsertPoint::End(func), 1);
        let a_op = module.defining_op(a).expect("op result");
        let b = index_constant(&mut module, InsertPoint::Before(a_op), 2);
        let c = index_constant(&mut module, InsertPoint::After(a_op), 3);
        let order: Vec<i64> = module
            .walk()
            .into_iter()
            .filter_map(|op| match module.op(op).kind {
                OpKind::ConstantIndex(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(module.constant_index(b), Some(2));
        assert_eq!(module.constant_index(c), Some(3));
    }

    #[test]
    fn replace_all_uses_rewires_operands() {
        let mut module = Module::new();
        let view = ViewType::new(vec![Extent::Dynamic], Type::f32());
        let func = module.add_function("main", vec![Type::View(view.clone())]);
        let arg = module.argument(func, 0);
        let zero = index_constant(&mut module, InsertPoint::End(func), 0);
        let load = module
            .insert_op(
                InsertPoint::End(func),
                OpKind::Load,
                vec![arg, zero],
                vec![Type::f32()],
                Span::unknown(),
            )
            .expect("insertion succeeds");
        let one = index_constant(&mut module, InsertPoint::Before(load), 1);

        assert_eq!(module.uses(zero), vec![(load, 1)]);
        module.replace_all_uses_with(zero, one);
        assert!(!module.has_uses(zero));
        assert_eq!(module.op(load).operands, vec![arg, one]);

        let zero_op = module.defining_op(zero).expect("op result");
        module.erase_op(zero_op);
        assert!(!module.is_live(zero_op));
        assert_eq!(module.constant_index(zero), None);
        assert_eq!(module.num_live_ops(), 2);
    }

    #[test]
    fn inserting_next_to_erased_op_fails() {
        let mut module = Module::new();
        let func = module.add_function("main", Vec::new());
        let value = index_constant(&mut module, InsertPoint::End(func), 7);
        let op = module.defining_op(value).expect("op result");
        module.erase_op(op);
        let result = module.insert_op(
            InsertPoint::After(op),
            OpKind::ConstantIndex(0),
            Vec::new(),
            vec![Type::Index],
            Span::unknown(),
        );
        assert!(result.is_err());
    }
}
