//! memflat-core: the IR substrate for view flattening.
//!
//! The IR is deliberately small: typed views over byte buffers, the ops that
//! produce and access them, and just enough affine arithmetic to express
//! linear element indices.

#[macro_use]
pub mod macros;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod pretty;
pub mod span;

// Re-export commonly used items for convenience
pub use tracing;

pub use ir::{
    AffineExpr, AffineMap, Extent, Layout, Module, OpBuilder, OpId, OpKind, Type, ValueId,
    ViewType,
};

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
