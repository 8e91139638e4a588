use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

/// A scalar literal stored in an initializer payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{:?}", value),
        }
    }
}

/// Initializer payload of a global constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementsAttr {
    /// Every element holds the same value.
    Splat { shape: Vec<u64>, value: Scalar },
    /// One value per element, in row-major order.
    Dense { shape: Vec<u64>, values: Vec<Scalar> },
}

impl ElementsAttr {
    pub fn splat(shape: &[u64], value: Scalar) -> Self {
        ElementsAttr::Splat {
            shape: shape.to_vec(),
            value,
        }
    }

    /// Dense payload, `None` when the value count does not match the shape.
    pub fn dense(shape: &[u64], values: Vec<Scalar>) -> Option<Self> {
        let expected: u64 = shape.iter().product();
        (expected == values.len() as u64).then(|| ElementsAttr::Dense {
            shape: shape.to_vec(),
            values,
        })
    }

    pub fn shape(&self) -> &[u64] {
        match self {
            ElementsAttr::Splat { shape, .. } | ElementsAttr::Dense { shape, .. } => shape,
        }
    }

    pub fn num_elements(&self) -> u64 {
        self.shape().iter().product()
    }

    /// Reinterpret the payload with a new shape of the same element count.
    ///
    /// Dense values are stored row-major already, so only the shape changes.
    pub fn reshape(&self, shape: &[u64]) -> Option<ElementsAttr> {
        if shape.iter().product::<u64>() != self.num_elements() {
            return None;
        }
        Some(match self {
            ElementsAttr::Splat { value, .. } => ElementsAttr::Splat {
                shape: shape.to_vec(),
                value: *value,
            },
            ElementsAttr::Dense { values, .. } => ElementsAttr::Dense {
                shape: shape.to_vec(),
                values: values.clone(),
            },
        })
    }
}

impl Display for ElementsAttr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ElementsAttr::Splat { value, .. } => write!(f, "dense<{}>", value),
            ElementsAttr::Dense { values, .. } => write!(f, "dense<[{}]>", values.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_requires_matching_count() {
        assert!(ElementsAttr::dense(&[2, 2], vec![Scalar::Int(1); 3]).is_none());
        assert!(ElementsAttr::dense(&[2, 2], vec![Scalar::Int(1); 4]).is_some());
    }

    #[test]
    fn reshape_keeps_row_major_values() {
        let values = vec![
            Scalar::Float(1.0),
            Scalar::Float(2.0),
            Scalar::Float(3.0),
            Scalar::Float(4.0),
        ];
        let dense = ElementsAttr::dense(&[2, 2], values.clone()).expect("valid payload");
        let flat = dense.reshape(&[4]).expect("same element count");
        assert_eq!(flat, ElementsAttr::Dense { shape: vec![4], values });
        assert!(dense.reshape(&[3]).is_none());
        assert_eq!(flat.to_string(), "dense<[1.0, 2.0, 3.0, 4.0]>");
    }
}
