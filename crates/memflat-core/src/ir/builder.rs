use crate::error::Result;
use crate::span::Span;

use super::affine::{AffineExpr, AffineMap};
use super::module::{FuncId, InsertPoint, Module, OpId, ValueId};
use super::op::{AllocSpace, BindingSubspan, GlobalDef, OpKind, OpaqueOp, Transfer};
use super::ty::{Type, ViewType};

/// Inserts ops at a moving insertion point.
///
/// With an `After` point the builder advances past every op it creates, so a
/// sequence of calls produces ops in call order.
pub struct OpBuilder<'m> {
    module: &'m mut Module,
    point: InsertPoint,
    span: Span,
}

impl<'m> OpBuilder<'m> {
    pub fn new(module: &'m mut Module, point: InsertPoint) -> Self {
        Self {
            module,
            point,
            span: Span::unknown(),
        }
    }

    pub fn at_end(module: &'m mut Module, func: FuncId) -> Self {
        Self::new(module, InsertPoint::End(func))
    }

    pub fn before(module: &'m mut Module, op: OpId) -> Self {
        Self::new(module, InsertPoint::Before(op))
    }

    pub fn after(module: &'m mut Module, op: OpId) -> Self {
        Self::new(module, InsertPoint::After(op))
    }

    /// Attribute every op created from here on to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn insertion_point(&self) -> InsertPoint {
        self.point
    }

    pub fn set_insertion_point(&mut self, point: InsertPoint) {
        self.point = point;
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut *self.module
    }

    pub fn insert(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
    ) -> Result<OpId> {
        let id = self
            .module
            .insert_op(self.point, kind, operands, result_types, self.span)?;
        if let InsertPoint::After(_) = self.point {
            self.point = InsertPoint::After(id);
        }
        Ok(id)
    }

    fn insert_single(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_type: Type,
    ) -> Result<ValueId> {
        let id = self.insert(kind, operands, vec![result_type])?;
        self.module
            .op(id)
            .result()
            .ok_or_else(|| crate::error::Error::ir(self.span, "op created without a result"))
    }

    fn view_operand(&self, value: ValueId) -> Result<ViewType> {
        match self.module.view_type(value) {
            Some(view) => Ok(view.clone()),
            None => crate::ir_bail!(
                self.span,
                "expected a view operand, found {}",
                self.module.value_type(value)
            ),
        }
    }

    pub fn constant_index(&mut self, value: i64) -> Result<ValueId> {
        self.insert_single(OpKind::ConstantIndex(value), Vec::new(), Type::Index)
    }

    pub fn affine_apply(&mut self, map: AffineMap, operands: Vec<ValueId>) -> Result<ValueId> {
        crate::ir_ensure!(
            map.num_results() == 1 && map.num_inputs() == operands.len(),
            self.span,
            "affine.apply needs a single-result map over {} inputs, got {}",
            operands.len(),
            map
        );
        self.insert_single(OpKind::AffineApply(map), operands, Type::Index)
    }

    /// Build `map(operands)`, folding as much as possible first.
    ///
    /// Operands produced by other `affine.apply` ops are composed into the
    /// map, constant operands are substituted, and repeated operands share a
    /// symbol. A fully constant result becomes an `index.constant`, and a map
    /// that reduces to a single bare operand returns that operand unchanged.
    pub fn create_or_fold_affine_apply(
        &mut self,
        map: &AffineMap,
        operands: &[ValueId],
    ) -> Result<ValueId> {
        let Some(expr) = map.single_result() else {
            crate::ir_bail!(self.span, "cannot fold multi-result map {}", map);
        };
        crate::ir_ensure!(
            map.num_inputs() == operands.len(),
            self.span,
            "map {} expects {} inputs, got {}",
            map,
            map.num_inputs(),
            operands.len()
        );

        let mut inputs = Vec::new();
        let substituted: Vec<AffineExpr> = operands
            .iter()
            .map(|&operand| self.expand_operand(operand, &mut inputs))
            .collect();
        let (dims, symbols) = substituted.split_at(map.num_dims as usize);
        let folded = expr.replace(dims, symbols);

        if let Some(value) = folded.as_constant() {
            return self.constant_index(value);
        }

        let (folded, inputs) = compact_symbols(folded, inputs);
        if let (AffineExpr::Symbol(0), [single]) = (&folded, inputs.as_slice()) {
            return Ok(*single);
        }
        let num_symbols = inputs.len() as u32;
        self.affine_apply(AffineMap::new(0, num_symbols, vec![folded]), inputs)
    }

    /// Express `value` over the symbols collected in `inputs`.
    fn expand_operand(&self, value: ValueId, inputs: &mut Vec<ValueId>) -> AffineExpr {
        if let Some(constant) = self.module.constant_index(value) {
            return AffineExpr::constant(constant);
        }
        let producer = self
            .module
            .defining_op(value)
            .and_then(|op| self.module.try_op(op));
        if let Some(op) = producer {
            if let OpKind::AffineApply(map) = &op.kind {
                if let Some(expr) = map.single_result() {
                    let nested: Vec<AffineExpr> = op
                        .operands
                        .iter()
                        .map(|&operand| self.expand_operand(operand, inputs))
                        .collect();
                    let (dims, symbols) = nested.split_at(map.num_dims as usize);
                    return expr.replace(dims, symbols);
                }
            }
        }
        let position = match inputs.iter().position(|&input| input == value) {
            Some(position) => position,
            None => {
                inputs.push(value);
                inputs.len() - 1
            }
        };
        AffineExpr::symbol(position as u32)
    }

    pub fn binding_subspan(
        &mut self,
        mut binding: BindingSubspan,
        ty: ViewType,
        byte_offset: Option<ValueId>,
        dynamic_dims: &[ValueId],
    ) -> Result<ValueId> {
        crate::ir_ensure!(
            dynamic_dims.len() == ty.num_dynamic_dims(),
            self.span,
            "{} needs {} dynamic extents, got {}",
            ty,
            ty.num_dynamic_dims(),
            dynamic_dims.len()
        );
        binding.has_byte_offset = byte_offset.is_some();
        let operands = byte_offset
            .into_iter()
            .chain(dynamic_dims.iter().copied())
            .collect();
        self.insert_single(OpKind::BindingSubspan(binding), operands, ty.into())
    }

    pub fn alloc(
        &mut self,
        space: AllocSpace,
        ty: ViewType,
        dynamic_dims: &[ValueId],
        alignment: Option<u64>,
    ) -> Result<ValueId> {
        crate::ir_ensure!(
            dynamic_dims.len() == ty.num_dynamic_dims(),
            self.span,
            "{} needs {} dynamic extents, got {}",
            ty,
            ty.num_dynamic_dims(),
            dynamic_dims.len()
        );
        self.insert_single(
            OpKind::Alloc { space, alignment },
            dynamic_dims.to_vec(),
            ty.into(),
        )
    }

    pub fn global(&mut self, global: GlobalDef) -> Result<OpId> {
        self.insert(OpKind::Global(global), Vec::new(), Vec::new())
    }

    pub fn get_global(&mut self, name: impl Into<String>, ty: ViewType) -> Result<ValueId> {
        self.insert_single(
            OpKind::GetGlobal { name: name.into() },
            Vec::new(),
            ty.into(),
        )
    }

    pub fn load(&mut self, view: ValueId, indices: &[ValueId]) -> Result<ValueId> {
        let view_ty = self.view_operand(view)?;
        let operands = std::iter::once(view).chain(indices.iter().copied()).collect();
        self.insert_single(OpKind::Load, operands, view_ty.element_type().clone())
    }

    pub fn store(&mut self, value: ValueId, view: ValueId, indices: &[ValueId]) -> Result<OpId> {
        self.view_operand(view)?;
        let operands = [value, view]
            .into_iter()
            .chain(indices.iter().copied())
            .collect();
        self.insert(OpKind::Store, operands, Vec::new())
    }

    pub fn transfer_read(
        &mut self,
        view: ValueId,
        indices: &[ValueId],
        padding: ValueId,
        vector: Type,
        transfer: Transfer,
    ) -> Result<ValueId> {
        self.view_operand(view)?;
        let operands = std::iter::once(view)
            .chain(indices.iter().copied())
            .chain(std::iter::once(padding))
            .collect();
        self.insert_single(OpKind::TransferRead(transfer), operands, vector)
    }

    pub fn transfer_write(
        &mut self,
        vector: ValueId,
        view: ValueId,
        indices: &[ValueId],
        transfer: Transfer,
    ) -> Result<OpId> {
        self.view_operand(view)?;
        let operands = [vector, view]
            .into_iter()
            .chain(indices.iter().copied())
            .collect();
        self.insert(OpKind::TransferWrite(transfer), operands, Vec::new())
    }

    pub fn view_cast(&mut self, source: ValueId, ty: ViewType) -> Result<ValueId> {
        self.insert_single(OpKind::ViewCast, vec![source], ty.into())
    }

    pub fn unrealized_cast(&mut self, source: ValueId, ty: Type) -> Result<ValueId> {
        self.insert_single(OpKind::UnrealizedCast, vec![source], ty)
    }

    pub fn collapse_shape(
        &mut self,
        source: ValueId,
        reassociation: Vec<Vec<usize>>,
        ty: ViewType,
    ) -> Result<ValueId> {
        self.insert_single(
            OpKind::CollapseShape { reassociation },
            vec![source],
            ty.into(),
        )
    }

    pub fn expand_shape(
        &mut self,
        source: ValueId,
        reassociation: Vec<Vec<usize>>,
        ty: ViewType,
    ) -> Result<ValueId> {
        self.insert_single(
            OpKind::ExpandShape { reassociation },
            vec![source],
            ty.into(),
        )
    }

    pub fn assume_alignment(&mut self, view: ValueId, alignment: u64) -> Result<OpId> {
        self.view_operand(view)?;
        self.insert(
            OpKind::AssumeAlignment { alignment },
            vec![view],
            Vec::new(),
        )
    }

    pub fn opaque(
        &mut self,
        op: OpaqueOp,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
    ) -> Result<OpId> {
        self.insert(OpKind::Opaque(op), operands, result_types)
    }
}

/// Renumber the symbols of `expr` so only referenced inputs remain, in order.
fn compact_symbols(expr: AffineExpr, inputs: Vec<ValueId>) -> (AffineExpr, Vec<ValueId>) {
    let mut used = vec![false; inputs.len()];
    mark_symbols(&expr, &mut used);
    if used.iter().all(|&u| u) {
        return (expr, inputs);
    }

    let mut kept = Vec::new();
    let mut replacements = Vec::with_capacity(inputs.len());
    for (position, input) in inputs.into_iter().enumerate() {
        if used[position] {
            replacements.push(AffineExpr::symbol(kept.len() as u32));
            kept.push(input);
        } else {
            replacements.push(AffineExpr::constant(0));
        }
    }
    (expr.replace(&[], &replacements), kept)
}

fn mark_symbols(expr: &AffineExpr, used: &mut [bool]) {
    match expr {
        AffineExpr::Symbol(position) => {
            if let Some(slot) = used.get_mut(*position as usize) {
                *slot = true;
            }
        }
        AffineExpr::Constant(_) | AffineExpr::Dim(_) => {}
        AffineExpr::Add(lhs, rhs) | AffineExpr::Mul(lhs, rhs) | AffineExpr::FloorDiv(lhs, rhs) => {
            mark_symbols(lhs, used);
            mark_symbols(rhs, used);
        }
    }
}
