use super::affine::{AffineExpr, AffineMap};
use super::ty::{Extent, Layout, Type, ViewType};

/// Byte width of an integer or float element, with the bit width rounded up
/// to a power of two first. `i1` and `i8` take one byte, `i24` takes four.
pub fn rounded_element_byte_width(ty: &Type) -> Option<u64> {
    let bits = ty.int_or_float_bit_width()?;
    if bits == 0 {
        return None;
    }
    let aligned = u64::from(bits).next_power_of_two();
    Some(aligned.div_ceil(8))
}

/// Number of bytes one element of `ty` occupies in a buffer. Scalars use the
/// rounded width, vectors multiply it by their lane count. Anything else,
/// `index` and zero-lane vectors included, has no defined width.
pub fn num_bytes(ty: &Type) -> Option<u64> {
    if ty.is_int_or_float() {
        return rounded_element_byte_width(ty);
    }
    match ty {
        Type::Vector(vector) => {
            let bytes = num_bytes(&vector.element)? * vector.num_elements();
            (bytes > 0).then_some(bytes)
        }
        _ => None,
    }
}

/// Row-major strides of an identity-layout view. A stride is dynamic as soon
/// as any extent to its right is.
pub fn identity_strides(view: &ViewType) -> Vec<Extent> {
    let mut strides = vec![Extent::Static(1); view.rank()];
    let mut running = Extent::Static(1);
    for dim in (0..view.rank()).rev() {
        strides[dim] = running;
        running = match (running, view.shape[dim]) {
            (Extent::Static(acc), Extent::Static(n)) => Extent::Static(acc * n),
            _ => Extent::Dynamic,
        };
    }
    strides
}

/// The map from coordinates to a linear element offset, `offset + sum(stride_i * d_i)`.
///
/// Every dynamic stride or offset becomes a fresh symbol, so a map without
/// symbols is an exact, fully static linearization.
pub fn strided_linear_layout_map(view: &ViewType) -> Option<AffineMap> {
    let (offset, strides) = match &view.layout {
        Layout::Identity => (Extent::Static(0), identity_strides(view)),
        Layout::Strided { offset, strides } => {
            if strides.len() != view.rank() {
                return None;
            }
            (*offset, strides.clone())
        }
    };

    let mut num_symbols = 0u32;
    let mut next_term = |extent: Extent| match extent {
        Extent::Static(n) => AffineExpr::constant(n as i64),
        Extent::Dynamic => {
            let symbol = AffineExpr::symbol(num_symbols);
            num_symbols += 1;
            symbol
        }
    };

    let mut expr = next_term(offset);
    for (dim, stride) in strides.into_iter().enumerate() {
        expr = expr + AffineExpr::dim(dim as u32) * next_term(stride);
    }
    Some(AffineMap::new(view.rank() as u32, num_symbols, vec![expr]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ty::FloatKind;

    #[test]
    fn byte_widths_round_to_powers_of_two() {
        assert_eq!(num_bytes(&Type::Int(1)), Some(1));
        assert_eq!(num_bytes(&Type::i8()), Some(1));
        assert_eq!(num_bytes(&Type::Int(24)), Some(4));
        assert_eq!(num_bytes(&Type::Float(FloatKind::BF16)), Some(2));
        assert_eq!(num_bytes(&Type::f64()), Some(8));
        assert_eq!(num_bytes(&Type::vector(&[4], Type::f32())), Some(16));
        assert_eq!(num_bytes(&Type::Index), None);
        assert_eq!(num_bytes(&Type::Opaque("buffer".into())), None);
        assert_eq!(num_bytes(&Type::vector(&[2], Type::Index)), None);
    }

    #[test]
    fn zero_lane_vectors_have_no_width() {
        assert_eq!(num_bytes(&Type::vector(&[0], Type::f32())), None);
        assert_eq!(num_bytes(&Type::vector(&[4, 0], Type::i8())), None);
    }

    #[test]
    fn static_identity_layout_has_no_symbols() {
        let view = ViewType::of(&[2, 3, 4], Type::f32());
        let map = strided_linear_layout_map(&view).expect("identity layout");
        assert_eq!(map.num_symbols, 0);
        assert_eq!(map.evaluate(&[1, 2, 3], &[]), Some(vec![23]));
    }

    #[test]
    fn leading_dynamic_extent_keeps_layout_static() {
        let view = ViewType::new(
            vec![Extent::Dynamic, Extent::Static(8)],
            Type::f32(),
        );
        let map = strided_linear_layout_map(&view).expect("identity layout");
        assert_eq!(map.num_symbols, 0);
        assert_eq!(map.to_string(), "(d0, d1) -> (d0 * 8 + d1)");
    }

    #[test]
    fn inner_dynamic_extent_introduces_symbols() {
        let view = ViewType::new(
            vec![Extent::Static(4), Extent::Dynamic, Extent::Static(2)],
            Type::f32(),
        );
        assert_eq!(
            identity_strides(&view),
            vec![Extent::Dynamic, Extent::Static(2), Extent::Static(1)]
        );
        let map = strided_linear_layout_map(&view).expect("identity layout");
        assert_eq!(map.num_symbols, 1);
    }
}
