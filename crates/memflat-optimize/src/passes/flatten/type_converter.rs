use memflat_core::ir::{Extent, Layout, Type, ViewType};

/// Target-type oracle of the flattening rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeConverter {
    /// Every view becomes `view<?xT>` in the same memory space.
    FullyDynamic,
    /// Rank-1 views are kept as they are, others go fully dynamic. Used where
    /// a producer cannot give up its static extent.
    RankOnePreserving,
}

impl TypeConverter {
    pub fn convert_view(self, view: &ViewType) -> ViewType {
        if self == TypeConverter::RankOnePreserving && view.is_rank_one() {
            return view.clone();
        }
        canonical_view(view)
    }

    /// Non-view types pass through unchanged.
    pub fn convert_type(self, ty: &Type) -> Type {
        match ty {
            Type::View(view) => Type::View(self.convert_view(view)),
            other => other.clone(),
        }
    }
}

/// `view<?xT>` with the element type and memory space of `view`.
pub fn canonical_view(view: &ViewType) -> ViewType {
    ViewType {
        shape: vec![Extent::Dynamic],
        element: view.element.clone(),
        layout: Layout::Identity,
        memory_space: view.memory_space,
    }
}
