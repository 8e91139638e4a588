//! Shared fixtures for memflat-optimize integration tests.
#![allow(dead_code)]

pub mod assertions;
pub mod builders;

use memflat_core::ir::Module;
use memflat_core::pretty::{pretty, PrettyOptions};
use memflat_optimize::{FlattenMemRefPass, FlattenOptions, ModulePass, PassReport};

/// Route `tracing` output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Options that do not depend on the environment of the test run.
pub fn options() -> FlattenOptions {
    FlattenOptions {
        max_iterations: 10,
        verify_offset_divisibility: false,
        erase_dead_ops: true,
    }
}

pub fn flatten(module: &mut Module) -> memflat_core::Result<PassReport> {
    flatten_with(module, options())
}

pub fn flatten_with(
    module: &mut Module,
    options: FlattenOptions,
) -> memflat_core::Result<PassReport> {
    init_tracing();
    let report = FlattenMemRefPass::new(options).run(module)?;
    module.verify()?;
    Ok(report)
}

pub fn print(module: &Module) -> String {
    pretty(module, PrettyOptions::default()).to_string()
}
