use std::collections::{HashMap, HashSet};

use memflat_core::diagnostics::DiagnosticManager;
use memflat_core::error::Result;
use memflat_core::ir::{InsertPoint, Module, OpBuilder, OpId, OpKind, Type, ValueId};

use crate::error::FlattenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Replaced ops stay in place until [`Rewriter::finalize`]; their
    /// results are recorded in a value mapping instead of being rewired.
    Conversion,
    /// Replacements take effect immediately.
    Greedy,
}

/// Mutation interface handed to rewrite patterns.
pub struct Rewriter<'m> {
    module: &'m mut Module,
    mode: RewriteMode,
    mapping: HashMap<ValueId, ValueId>,
    pending: Vec<OpId>,
    pending_set: HashSet<OpId>,
    diagnostics: DiagnosticManager,
    warned: HashSet<(OpId, &'static str)>,
}

impl<'m> Rewriter<'m> {
    pub fn new(module: &'m mut Module, mode: RewriteMode, diagnostics: DiagnosticManager) -> Self {
        Self {
            module,
            mode,
            mapping: HashMap::new(),
            pending: Vec::new(),
            pending_set: HashSet::new(),
            diagnostics,
            warned: HashSet::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut *self.module
    }

    /// Builder inserting right before `op`, tagged with its span.
    pub fn builder_before(&mut self, op: OpId) -> OpBuilder<'_> {
        let span = self.module.op(op).span;
        OpBuilder::new(&mut *self.module, InsertPoint::Before(op)).with_span(span)
    }

    /// Builder inserting right after `op`, tagged with its span.
    pub fn builder_after(&mut self, op: OpId) -> OpBuilder<'_> {
        let span = self.module.op(op).span;
        OpBuilder::new(&mut *self.module, InsertPoint::After(op)).with_span(span)
    }

    /// The value currently standing in for `value`.
    pub fn remapped(&self, value: ValueId) -> ValueId {
        let mut current = value;
        while let Some(&next) = self.mapping.get(&current) {
            current = next;
        }
        current
    }

    pub fn remapped_type(&self, value: ValueId) -> &Type {
        self.module.value_type(self.remapped(value))
    }

    pub fn is_pending(&self, op: OpId) -> bool {
        self.pending_set.contains(&op)
    }

    /// Live global named `name` that is not scheduled for removal.
    pub fn lookup_global(&self, name: &str) -> Option<OpId> {
        self.module.globals().iter().copied().find(|&id| {
            !self.is_pending(id)
                && matches!(&self.module.op(id).kind, OpKind::Global(global) if global.name == name)
        })
    }

    /// Replace every result of `op` by the matching entry of `replacements`.
    pub fn replace_op(&mut self, op: OpId, replacements: &[ValueId]) -> Result<()> {
        let results = self.module.op(op).results.clone();
        crate::opt_ensure!(
            results.len() == replacements.len(),
            format!(
                "{} has {} results but {} replacements were given",
                self.module.op(op).kind.name(),
                results.len(),
                replacements.len()
            ),
            span = self.module.op(op).span
        );
        match self.mode {
            RewriteMode::Conversion => {
                for (&from, &to) in results.iter().zip(replacements) {
                    if from != to {
                        self.mapping.insert(from, to);
                    }
                }
                self.schedule_erase(op);
            }
            RewriteMode::Greedy => {
                for (&from, &to) in results.iter().zip(replacements) {
                    self.module.replace_all_uses_with(from, to);
                }
                self.module.erase_op(op);
            }
        }
        Ok(())
    }

    /// Remove an op whose results have no remaining uses.
    pub fn erase_op(&mut self, op: OpId) {
        match self.mode {
            RewriteMode::Conversion => self.schedule_erase(op),
            RewriteMode::Greedy => self.module.erase_op(op),
        }
    }

    fn schedule_erase(&mut self, op: OpId) {
        if self.pending_set.insert(op) {
            self.pending.push(op);
        }
    }

    /// Report a non-fatal failure on `op`, once per op and failure kind.
    pub fn warn(&mut self, op: OpId, error: &FlattenError) {
        if !self.warned.insert((op, error.code())) {
            return;
        }
        let span = self.module.op(op).span;
        tracing::warn!("{}: {}", self.module.op(op).kind.name(), error);
        self.diagnostics.add_diagnostic(error.to_diagnostic(span));
    }

    /// Commit a conversion: rewire surviving users to the replacement values,
    /// bridging type mismatches with `unrealized_cast`, then drop replaced ops.
    ///
    /// Returns the number of casts that had to be materialized.
    pub fn finalize(self) -> Result<usize> {
        let Rewriter {
            module,
            mapping,
            pending,
            pending_set,
            ..
        } = self;

        let resolve = |value: ValueId| {
            let mut current = value;
            while let Some(&next) = mapping.get(&current) {
                current = next;
            }
            current
        };

        let mut originals: Vec<ValueId> = mapping.keys().copied().collect();
        originals.sort();

        let mut materialized = 0;
        for original in originals {
            let replacement = resolve(original);
            let mut casts: HashMap<OpId, ValueId> = HashMap::new();
            for (user, index) in module.uses(original) {
                if pending_set.contains(&user) {
                    continue;
                }
                if module.value_type(replacement) == module.value_type(original) {
                    module.set_operand(user, index, replacement);
                    continue;
                }
                let cast = match casts.get(&user) {
                    Some(&cast) => cast,
                    None => {
                        let target = module.value_type(original).clone();
                        let span = module.op(user).span;
                        let cast = OpBuilder::before(&mut *module, user)
                            .with_span(span)
                            .unrealized_cast(replacement, target)?;
                        materialized += 1;
                        casts.insert(user, cast);
                        cast
                    }
                };
                module.set_operand(user, index, cast);
            }
        }

        for op in pending.into_iter().rev() {
            module.erase_op(op);
        }
        Ok(materialized)
    }
}
