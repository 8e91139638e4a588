use std::collections::HashMap;
use std::fmt::{self, Formatter};

use itertools::Itertools;

use crate::pretty::{escape_symbol, PrettyCtx, PrettyPrintable};

use super::module::{Function, Module, Operation, ValueId};
use super::op::{GlobalDef, OpKind, Transfer, Visibility};

impl PrettyPrintable for Module {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        ctx.writeln(f, "module {")?;
        ctx.with_indent(|ctx| {
            let names = HashMap::new();
            for &global in self.globals() {
                write_op(self, self.op(global), &names, f, ctx)?;
            }
            for (_, func) in self.functions() {
                write_function(self, func, f, ctx)?;
            }
            Ok(())
        })?;
        ctx.writeln(f, "}")
    }
}

fn write_function(
    module: &Module,
    func: &Function,
    f: &mut Formatter<'_>,
    ctx: &mut PrettyCtx<'_>,
) -> fmt::Result {
    let mut names = HashMap::new();
    let params = func
        .arguments
        .iter()
        .enumerate()
        .map(|(idx, &arg)| {
            let name = format!("%arg{}", idx);
            let param = format!("{}: {}", name, module.value_type(arg));
            names.insert(arg, name);
            param
        })
        .join(", ");
    for (counter, value) in func
        .body()
        .iter()
        .flat_map(|&op| module.op(op).results.iter().copied())
        .enumerate()
    {
        names.insert(value, format!("%{}", counter));
    }

    ctx.writeln(f, format!("func @{}({}) {{", escape_symbol(&func.name), params))?;
    ctx.with_indent(|ctx| {
        for &op in func.body() {
            write_op(module, module.op(op), &names, f, ctx)?;
        }
        Ok(())
    })?;
    ctx.writeln(f, "}")
}

fn value_name(names: &HashMap<ValueId, String>, value: ValueId) -> String {
    names
        .get(&value)
        .cloned()
        .unwrap_or_else(|| format!("<{}>", value))
}

fn write_op(
    module: &Module,
    op: &Operation,
    names: &HashMap<ValueId, String>,
    f: &mut Formatter<'_>,
    ctx: &mut PrettyCtx<'_>,
) -> fmt::Result {
    let mut line = String::new();
    if !op.results.is_empty() {
        line.push_str(
            &op.results
                .iter()
                .map(|&result| value_name(names, result))
                .join(", "),
        );
        line.push_str(" = ");
    }
    line.push_str(op.kind.name());
    line.push_str(&format_attributes(&op.kind));
    if !op.operands.is_empty() {
        line.push(' ');
        line.push_str(
            &op.operands
                .iter()
                .map(|&operand| value_name(names, operand))
                .join(", "),
        );
    }
    if !op.results.is_empty() {
        line.push_str(" : ");
        line.push_str(
            &op.results
                .iter()
                .map(|&result| module.value_type(result).to_string())
                .join(", "),
        );
    }
    if ctx.options.show_locations && !op.span.is_unknown() {
        line.push_str(&format!(" loc({})", op.span));
    }
    ctx.writeln(f, line)
}

fn format_attributes(kind: &OpKind) -> String {
    match kind {
        OpKind::ConstantIndex(value) => format!(" {}", value),
        OpKind::AffineApply(map) => format!(" {}", map),
        OpKind::BindingSubspan(binding) => {
            let mut attrs = format!(
                " [{}, {}] {}",
                binding.set,
                binding.binding,
                binding.descriptor.as_str()
            );
            if let Some(alignment) = binding.alignment {
                attrs.push_str(&format!(" align {}", alignment));
            }
            attrs
        }
        OpKind::Alloc {
            alignment: Some(alignment),
            ..
        } => format!(" align {}", alignment),
        OpKind::Global(global) => format_global(global),
        OpKind::GetGlobal { name } => format!(" @{}", escape_symbol(name)),
        OpKind::TransferRead(transfer) | OpKind::TransferWrite(transfer) => {
            format_transfer(transfer)
        }
        OpKind::CollapseShape { reassociation } | OpKind::ExpandShape { reassociation } => {
            format!(
                " [{}]",
                reassociation
                    .iter()
                    .map(|group| format!("[{}]", group.iter().join(", ")))
                    .join(", ")
            )
        }
        OpKind::AssumeAlignment { alignment } => format!(" {}", alignment),
        _ => String::new(),
    }
}

fn format_global(global: &GlobalDef) -> String {
    let mut line = format!(" @{} : {}", escape_symbol(&global.name), global.ty);
    if global.visibility == Visibility::Private {
        line.push_str(" private");
    }
    if global.constant {
        line.push_str(" const");
    }
    if let Some(alignment) = global.alignment {
        line.push_str(&format!(" align {}", alignment));
    }
    if let Some(initial_value) = &global.initial_value {
        line.push_str(&format!(" = {}", initial_value));
    }
    line
}

fn format_transfer(transfer: &Transfer) -> String {
    let mut line = format!(" {}", transfer.permutation_map);
    if !transfer.in_bounds.is_empty() {
        line.push_str(&format!(" in_bounds [{}]", transfer.in_bounds.iter().join(", ")));
    }
    line
}
