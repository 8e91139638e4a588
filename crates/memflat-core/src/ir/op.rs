use super::affine::AffineMap;
use super::attr::ElementsAttr;
use super::ty::ViewType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    StorageBuffer,
    UniformBuffer,
}

impl DescriptorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DescriptorKind::StorageBuffer => "storage_buffer",
            DescriptorKind::UniformBuffer => "uniform_buffer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocSpace {
    Heap,
    Stack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

/// Materializes a view from an external buffer resource.
///
/// Operands: the byte offset first (when `has_byte_offset`), then one operand
/// per dynamic extent of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSubspan {
    pub set: u32,
    pub binding: u32,
    pub descriptor: DescriptorKind,
    pub has_byte_offset: bool,
    pub alignment: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub name: String,
    pub ty: ViewType,
    pub initial_value: Option<ElementsAttr>,
    pub visibility: Visibility,
    pub constant: bool,
    pub alignment: Option<u64>,
}

/// Attributes shared by block reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Maps source coordinates to the dims of the transferred tile.
    pub permutation_map: AffineMap,
    pub in_bounds: Vec<bool>,
}

/// An op this IR knows nothing about beyond its operands and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueOp {
    pub name: String,
    /// All operands are the dynamic extents of the single view result, in order.
    pub result_dims: bool,
    pub has_side_effects: bool,
}

/// The closed set of operations.
///
/// Operand conventions per kind:
/// - `AffineApply`: dims then symbols of the map
/// - `Alloc`: one operand per dynamic extent
/// - `Load`: view, indices...
/// - `Store`: value, view, indices...
/// - `TransferRead`: view, indices..., padding
/// - `TransferWrite`: vector, view, indices...
/// - casts, reshapes and `AssumeAlignment`: the source view
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    ConstantIndex(i64),
    AffineApply(AffineMap),
    BindingSubspan(BindingSubspan),
    Alloc {
        space: AllocSpace,
        alignment: Option<u64>,
    },
    Global(GlobalDef),
    GetGlobal {
        name: String,
    },
    Load,
    Store,
    TransferRead(Transfer),
    TransferWrite(Transfer),
    /// Value-preserving cast between views differing only in static vs dynamic extents.
    ViewCast,
    /// Type-erasing cast; any operand types to any result types.
    UnrealizedCast,
    CollapseShape {
        reassociation: Vec<Vec<usize>>,
    },
    ExpandShape {
        reassociation: Vec<Vec<usize>>,
    },
    AssumeAlignment {
        alignment: u64,
    },
    Opaque(OpaqueOp),
}

impl OpKind {
    pub fn name(&self) -> &str {
        match self {
            OpKind::ConstantIndex(_) => "index.constant",
            OpKind::AffineApply(_) => "affine.apply",
            OpKind::BindingSubspan(_) => "buffer.binding",
            OpKind::Alloc {
                space: AllocSpace::Heap,
                ..
            } => "view.alloc",
            OpKind::Alloc {
                space: AllocSpace::Stack,
                ..
            } => "view.alloca",
            OpKind::Global(_) => "view.global",
            OpKind::GetGlobal { .. } => "view.get_global",
            OpKind::Load => "view.load",
            OpKind::Store => "view.store",
            OpKind::TransferRead(_) => "view.read_block",
            OpKind::TransferWrite(_) => "view.write_block",
            OpKind::ViewCast => "view.cast",
            OpKind::UnrealizedCast => "unrealized_cast",
            OpKind::CollapseShape { .. } => "view.collapse",
            OpKind::ExpandShape { .. } => "view.expand",
            OpKind::AssumeAlignment { .. } => "view.assume_alignment",
            OpKind::Opaque(op) => &op.name,
        }
    }

    /// Ops that may be erased once their results are unused.
    pub fn is_side_effect_free(&self) -> bool {
        match self {
            OpKind::ConstantIndex(_)
            | OpKind::AffineApply(_)
            | OpKind::BindingSubspan(_)
            | OpKind::GetGlobal { .. }
            | OpKind::Load
            | OpKind::TransferRead(_)
            | OpKind::ViewCast
            | OpKind::UnrealizedCast
            | OpKind::CollapseShape { .. }
            | OpKind::ExpandShape { .. } => true,
            OpKind::Opaque(op) => !op.has_side_effects,
            OpKind::Alloc { .. }
            | OpKind::Global(_)
            | OpKind::Store
            | OpKind::TransferWrite(_)
            | OpKind::AssumeAlignment { .. } => false,
        }
    }

    pub fn is_reshape(&self) -> bool {
        matches!(
            self,
            OpKind::CollapseShape { .. } | OpKind::ExpandShape { .. }
        )
    }
}
