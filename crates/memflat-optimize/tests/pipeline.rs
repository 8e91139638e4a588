use memflat_core::diagnostics::{DiagnosticDisplayOptions, DiagnosticManager};
use memflat_core::ir::{
    AffineExpr, AffineMap, AllocSpace, ElementsAttr, GlobalDef, InsertPoint, OpBuilder, Scalar,
    Transfer, Type, ViewType, Visibility,
};
use memflat_core::Result;
use memflat_optimize::{FlattenMemRefPass, FlattenOptions, ModulePass, PassManager};
use pretty_assertions::assert_eq;

mod support;

use support::assertions::{assert_all_views_rank_one, ops_named};
use support::builders::{constants, f32_view, module_with_main, storage};

/// A bit of everything: offset bindings, allocations, a global, reshapes and
/// an alignment hint.
fn mixed_module() -> memflat_core::ir::Module {
    let (mut module, func) = module_with_main(vec![Type::Index, Type::Index, Type::Index]);
    let n = module.argument(func, 0);
    let i = module.argument(func, 1);
    let j = module.argument(func, 2);
    let mut globals = OpBuilder::new(&mut module, InsertPoint::ModuleEnd);
    globals
        .global(GlobalDef {
            name: "weights".into(),
            ty: ViewType::of(&[2, 4], Type::f32()),
            initial_value: Some(ElementsAttr::splat(&[2, 4], Scalar::Float(0.5))),
            visibility: Visibility::Private,
            constant: true,
            alignment: None,
        })
        .expect("global");

    let mut builder = OpBuilder::at_end(&mut module, func);
    let offset = builder.constant_index(128).expect("constant");
    let input = builder
        .binding_subspan(storage(0, 0), f32_view(&[None, Some(4)]), Some(offset), &[n])
        .expect("binding");
    builder.assume_alignment(input, 64).expect("hint");
    let weights = builder
        .get_global("weights", ViewType::of(&[2, 4], Type::f32()))
        .expect("get_global");
    let scratch = builder
        .alloc(AllocSpace::Stack, f32_view(&[Some(2), Some(4)]), &[], None)
        .expect("alloc");
    let flat_scratch = builder
        .collapse_shape(scratch, vec![vec![0, 1]], f32_view(&[Some(8)]))
        .expect("collapse");
    let c = constants(&mut builder, &[0, 1]);
    let x = builder.load(input, &[i, j]).expect("load");
    let w = builder.load(weights, &[c[1], j]).expect("load");
    builder.store(x, scratch, &[c[0], j]).expect("store");
    builder.store(w, flat_scratch, &[i]).expect("store");
    let y = builder.load(flat_scratch, &[j]).expect("load");
    builder.store(y, input, &[i, c[1]]).expect("store");
    module
}

#[test]
fn every_view_ends_up_one_dimensional() -> Result<()> {
    let mut module = mixed_module();
    module.verify()?;

    let report = support::flatten(&mut module)?;

    assert_all_views_rank_one(&module);
    assert!(ops_named(&module, "view.assume_alignment").is_empty());
    assert_eq!(report.changes_in("erase-alignment-hints"), Some(1));
    assert_eq!(report.changes_in("fold-subspan-offset"), Some(2));
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    Ok(())
}

#[test]
fn flattening_twice_changes_nothing() -> Result<()> {
    let mut module = mixed_module();
    support::flatten(&mut module)?;
    let once = support::print(&module);

    let report = support::flatten(&mut module)?;

    assert_eq!(support::print(&module), once);
    assert_eq!(report.total_changes, 0);
    Ok(())
}

#[test]
fn greedy_phases_give_up_after_the_iteration_cap() {
    let mut module = mixed_module();
    let error = FlattenMemRefPass::new(support::options().with_max_iterations(1))
        .run(&mut module)
        .expect_err("erasing the hint needs a second sweep to settle");
    assert_eq!(error.code(), Some("memflat::no-convergence"));
}

#[test]
fn pass_manager_runs_and_verifies_each_pass() -> Result<()> {
    let mut module = mixed_module();
    let diagnostics = DiagnosticManager::new();
    let options = FlattenOptions::from_json_str(r#"{ "max_iterations": 8 }"#)?;
    let manager = PassManager::parse("flatten-memref | dce", &options, &diagnostics)?;
    assert_eq!(manager.len(), 2);

    let report = manager.run(&mut module)?;

    let names: Vec<&str> = report.per_pass.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["flatten-memref", "dce"]);
    assert_eq!(report.per_pass[1].1.total_changes, 0);
    assert!(!diagnostics.has_errors());
    assert_all_views_rank_one(&module);
    Ok(())
}

#[test]
fn pass_manager_rejects_malformed_input() {
    let (mut module, func) = module_with_main(vec![]);
    let mut builder = OpBuilder::at_end(&mut module, func);
    let buffer = builder
        .alloc(AllocSpace::Heap, f32_view(&[Some(4)]), &[], None)
        .expect("alloc");
    builder.assume_alignment(buffer, 3).expect("hint");

    let manager = PassManager::parse(
        "flatten-memref",
        &support::options(),
        &DiagnosticManager::new(),
    )
    .expect("known pass");
    assert!(manager.run(&mut module).is_err());
    assert_eq!(ops_named(&module, "view.assume_alignment").len(), 1);
}

#[test]
fn pipeline_report_renders_leftover_warnings() -> Result<()> {
    let (mut module, func) = module_with_main(vec![Type::f32(), Type::Index]);
    let padding = module.argument(func, 0);
    let i = module.argument(func, 1);
    let transposed = Transfer {
        permutation_map: AffineMap::new(2, 0, vec![AffineExpr::dim(0)]),
        in_bounds: vec![false],
    };
    let mut builder = OpBuilder::at_end(&mut module, func);
    let view = builder.binding_subspan(storage(0, 0), f32_view(&[Some(4), Some(8)]), None, &[])?;
    let tile = builder.transfer_read(view, &[i, i], padding, Type::vector(&[4], Type::f32()), transposed.clone())?;
    builder.transfer_write(tile, view, &[i, i], transposed)?;

    let manager = PassManager::parse("flatten-memref, dce", &support::options(), &DiagnosticManager::new())?;
    let report = manager.run(&mut module)?;
    let lines = report.render_diagnostics(&DiagnosticDisplayOptions::plain(false));

    let headers: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|line| line.starts_with('['))
        .collect();
    assert_eq!(
        headers,
        vec![
            "[flatten-memref] WARNING: failed to legalize view.read_block (memflat::failed-to-legalize)",
            "[flatten-memref] WARNING: failed to legalize view.write_block (memflat::failed-to-legalize)",
        ]
    );
    Ok(())
}
