//! Typed views, the ops that produce and access them, and the arena module
//! they live in.

pub mod affine;
pub mod attr;
pub mod builder;
pub mod layout;
pub mod module;
pub mod op;
mod pretty;
pub mod shape;
pub mod ty;
mod verify;

pub use affine::{AffineExpr, AffineMap};
pub use attr::{ElementsAttr, Scalar};
pub use builder::OpBuilder;
pub use module::{FuncId, InsertPoint, Module, OpId, Operation, Parent, ValueDef, ValueId};
pub use op::{
    AllocSpace, BindingSubspan, DescriptorKind, GlobalDef, OpKind, OpaqueOp, Transfer, Visibility,
};
pub use shape::{DimValue, ShapeQuery};
pub use ty::{Extent, FloatKind, Layout, Type, VectorType, ViewType};
