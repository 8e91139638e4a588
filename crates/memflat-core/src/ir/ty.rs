use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F16,
    BF16,
    F32,
    F64,
}

impl FloatKind {
    pub fn bit_width(self) -> u32 {
        match self {
            FloatKind::F16 | FloatKind::BF16 => 16,
            FloatKind::F32 => 32,
            FloatKind::F64 => 64,
        }
    }
}

/// Extent of one view dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extent {
    Static(u64),
    Dynamic,
}

impl Extent {
    pub fn is_dynamic(self) -> bool {
        matches!(self, Extent::Dynamic)
    }

    pub fn as_static(self) -> Option<u64> {
        match self {
            Extent::Static(n) => Some(n),
            Extent::Dynamic => None,
        }
    }
}

impl Display for Extent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Extent::Static(n) => write!(f, "{}", n),
            Extent::Dynamic => write!(f, "?"),
        }
    }
}

/// How a view's coordinates map onto its underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Row-major and contiguous, starting at element zero.
    Identity,
    Strided {
        offset: Extent,
        strides: Vec<Extent>,
    },
}

impl Layout {
    pub fn is_identity(&self) -> bool {
        matches!(self, Layout::Identity)
    }
}

/// A ranked, typed window over a memory buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewType {
    pub shape: Vec<Extent>,
    pub element: Box<Type>,
    pub layout: Layout,
    pub memory_space: Option<u32>,
}

impl ViewType {
    pub fn new(shape: Vec<Extent>, element: Type) -> Self {
        Self {
            shape,
            element: Box::new(element),
            layout: Layout::Identity,
            memory_space: None,
        }
    }

    /// Fully static view of the given extents.
    pub fn of(shape: &[u64], element: Type) -> Self {
        Self::new(shape.iter().copied().map(Extent::Static).collect(), element)
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn in_memory_space(mut self, space: u32) -> Self {
        self.memory_space = Some(space);
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_type(&self) -> &Type {
        &self.element
    }

    pub fn has_identity_layout(&self) -> bool {
        self.layout.is_identity()
    }

    pub fn has_static_shape(&self) -> bool {
        self.shape.iter().all(|e| !e.is_dynamic())
    }

    pub fn is_dynamic_dim(&self, dim: usize) -> bool {
        self.shape.get(dim).is_some_and(|e| e.is_dynamic())
    }

    pub fn num_dynamic_dims(&self) -> usize {
        self.shape.iter().filter(|e| e.is_dynamic()).count()
    }

    /// Total element count, `None` when any extent is dynamic. Rank 0 holds one element.
    pub fn num_elements(&self) -> Option<u64> {
        self.shape
            .iter()
            .map(|e| e.as_static())
            .try_fold(1u64, |acc, n| n.map(|n| acc * n))
    }

    pub fn is_rank_one(&self) -> bool {
        self.rank() == 1
    }
}

impl Display for ViewType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "view<")?;
        for extent in &self.shape {
            write!(f, "{}x", extent)?;
        }
        write!(f, "{}", self.element)?;
        if let Layout::Strided { offset, strides } = &self.layout {
            write!(
                f,
                ", strided<[{}], offset: {}>",
                strides.iter().join(", "),
                offset
            )?;
        }
        if let Some(space) = self.memory_space {
            write!(f, ", {}", space)?;
        }
        write!(f, ">")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub shape: Vec<u64>,
    pub element: Box<Type>,
}

impl VectorType {
    pub fn new(shape: Vec<u64>, element: Type) -> Self {
        Self {
            shape,
            element: Box::new(element),
        }
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }
}

impl Display for VectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "vector<")?;
        for n in &self.shape {
            write!(f, "{}x", n)?;
        }
        write!(f, "{}>", self.element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Index,
    Int(u32),
    Float(FloatKind),
    Vector(VectorType),
    View(ViewType),
    /// A type owned by some other part of the compiler; opaque to this IR.
    Opaque(String),
}

impl Type {
    pub fn index() -> Self {
        Type::Index
    }

    pub fn i8() -> Self {
        Type::Int(8)
    }

    pub fn i32() -> Self {
        Type::Int(32)
    }

    pub fn i64() -> Self {
        Type::Int(64)
    }

    pub fn f16() -> Self {
        Type::Float(FloatKind::F16)
    }

    pub fn f32() -> Self {
        Type::Float(FloatKind::F32)
    }

    pub fn f64() -> Self {
        Type::Float(FloatKind::F64)
    }

    pub fn vector(shape: &[u64], element: Type) -> Self {
        Type::Vector(VectorType::new(shape.to_vec(), element))
    }

    pub fn view(view: ViewType) -> Self {
        Type::View(view)
    }

    pub fn is_int_or_float(&self) -> bool {
        matches!(self, Type::Int(_) | Type::Float(_))
    }

    /// Bit width of integer and float types.
    pub fn int_or_float_bit_width(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            Type::Float(kind) => Some(kind.bit_width()),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&ViewType> {
        match self {
            Type::View(view) => Some(view),
            _ => None,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Type::View(_))
    }

    pub fn is_rank_one_view(&self) -> bool {
        self.as_view().is_some_and(ViewType::is_rank_one)
    }
}

impl From<ViewType> for Type {
    fn from(view: ViewType) -> Self {
        Type::View(view)
    }
}

impl From<VectorType> for Type {
    fn from(vector: VectorType) -> Self {
        Type::Vector(vector)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Index => write!(f, "index"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float(FloatKind::F16) => write!(f, "f16"),
            Type::Float(FloatKind::BF16) => write!(f, "bf16"),
            Type::Float(FloatKind::F32) => write!(f, "f32"),
            Type::Float(FloatKind::F64) => write!(f, "f64"),
            Type::Vector(vector) => write!(f, "{}", vector),
            Type::View(view) => write!(f, "{}", view),
            Type::Opaque(name) => write!(f, "opaque<\"{}\">", name),
        }
    }
}
