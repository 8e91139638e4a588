//! Affine index arithmetic.
//!
//! Expressions are kept in a lightly canonical form: constants are folded
//! eagerly, neutral elements disappear, and a constant operand of `+`/`*`
//! always sits on the right. That is enough for linearized indices over
//! constant extents to collapse to literals.

use itertools::Itertools;
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, Mul};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    Constant(i64),
    Dim(u32),
    Symbol(u32),
    Add(Box<AffineExpr>, Box<AffineExpr>),
    Mul(Box<AffineExpr>, Box<AffineExpr>),
    FloorDiv(Box<AffineExpr>, Box<AffineExpr>),
}

/// Floor division on integers, rounding towards negative infinity.
pub fn floor_div(lhs: i64, rhs: i64) -> i64 {
    let quotient = lhs / rhs;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

impl AffineExpr {
    pub fn constant(value: i64) -> Self {
        AffineExpr::Constant(value)
    }

    pub fn dim(position: u32) -> Self {
        AffineExpr::Dim(position)
    }

    pub fn symbol(position: u32) -> Self {
        AffineExpr::Symbol(position)
    }

    pub fn as_constant(&self) -> Option<i64> {
        match self {
            AffineExpr::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn floor_div(self, rhs: AffineExpr) -> AffineExpr {
        match (self, rhs) {
            (AffineExpr::Constant(l), AffineExpr::Constant(r)) if r != 0 => {
                AffineExpr::Constant(floor_div(l, r))
            }
            (lhs, AffineExpr::Constant(1)) => lhs,
            (AffineExpr::Constant(0), _) => AffineExpr::Constant(0),
            (lhs, rhs) => AffineExpr::FloorDiv(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Substitute dims and symbols, re-simplifying on the way back up.
    pub fn replace(&self, dims: &[AffineExpr], symbols: &[AffineExpr]) -> AffineExpr {
        match self {
            AffineExpr::Constant(_) => self.clone(),
            AffineExpr::Dim(pos) => dims
                .get(*pos as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            AffineExpr::Symbol(pos) => symbols
                .get(*pos as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            AffineExpr::Add(lhs, rhs) => lhs.replace(dims, symbols) + rhs.replace(dims, symbols),
            AffineExpr::Mul(lhs, rhs) => lhs.replace(dims, symbols) * rhs.replace(dims, symbols),
            AffineExpr::FloorDiv(lhs, rhs) => lhs
                .replace(dims, symbols)
                .floor_div(rhs.replace(dims, symbols)),
        }
    }

    /// Evaluate with concrete dim and symbol values.
    pub fn evaluate(&self, dims: &[i64], symbols: &[i64]) -> Option<i64> {
        match self {
            AffineExpr::Constant(value) => Some(*value),
            AffineExpr::Dim(pos) => dims.get(*pos as usize).copied(),
            AffineExpr::Symbol(pos) => symbols.get(*pos as usize).copied(),
            AffineExpr::Add(lhs, rhs) => {
                Some(lhs.evaluate(dims, symbols)? + rhs.evaluate(dims, symbols)?)
            }
            AffineExpr::Mul(lhs, rhs) => {
                Some(lhs.evaluate(dims, symbols)? * rhs.evaluate(dims, symbols)?)
            }
            AffineExpr::FloorDiv(lhs, rhs) => {
                let divisor = rhs.evaluate(dims, symbols)?;
                if divisor == 0 {
                    return None;
                }
                Some(floor_div(lhs.evaluate(dims, symbols)?, divisor))
            }
        }
    }

    pub fn uses_symbols(&self) -> bool {
        match self {
            AffineExpr::Symbol(_) => true,
            AffineExpr::Constant(_) | AffineExpr::Dim(_) => false,
            AffineExpr::Add(lhs, rhs) | AffineExpr::Mul(lhs, rhs) | AffineExpr::FloorDiv(lhs, rhs) => {
                lhs.uses_symbols() || rhs.uses_symbols()
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            AffineExpr::Add(..) => 1,
            AffineExpr::Mul(..) | AffineExpr::FloorDiv(..) => 2,
            _ => 3,
        }
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl Add for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: AffineExpr) -> AffineExpr {
        match (self, rhs) {
            (AffineExpr::Constant(l), AffineExpr::Constant(r)) => AffineExpr::Constant(l + r),
            (AffineExpr::Constant(0), other) | (other, AffineExpr::Constant(0)) => other,
            (c @ AffineExpr::Constant(_), other) => other + c,
            (AffineExpr::Add(inner, c1), AffineExpr::Constant(c2)) if c1.as_constant().is_some() => {
                let folded = c1.as_constant().unwrap_or(0) + c2;
                *inner + AffineExpr::Constant(folded)
            }
            (lhs, rhs) => AffineExpr::Add(Box::new(lhs), Box::new(rhs)),
        }
    }
}

impl Mul for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: AffineExpr) -> AffineExpr {
        match (self, rhs) {
            (AffineExpr::Constant(l), AffineExpr::Constant(r)) => AffineExpr::Constant(l * r),
            (AffineExpr::Constant(0), _) | (_, AffineExpr::Constant(0)) => AffineExpr::Constant(0),
            (AffineExpr::Constant(1), other) | (other, AffineExpr::Constant(1)) => other,
            (c @ AffineExpr::Constant(_), other) => other * c,
            (AffineExpr::Mul(inner, c1), AffineExpr::Constant(c2)) if c1.as_constant().is_some() => {
                let folded = c1.as_constant().unwrap_or(1) * c2;
                *inner * AffineExpr::Constant(folded)
            }
            (lhs, rhs) => AffineExpr::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }
}

impl Display for AffineExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AffineExpr::Constant(value) => write!(f, "{}", value),
            AffineExpr::Dim(pos) => write!(f, "d{}", pos),
            AffineExpr::Symbol(pos) => write!(f, "s{}", pos),
            AffineExpr::Add(lhs, rhs) => {
                lhs.fmt_operand(f, 1)?;
                write!(f, " + ")?;
                rhs.fmt_operand(f, 2)
            }
            AffineExpr::Mul(lhs, rhs) => {
                lhs.fmt_operand(f, 2)?;
                write!(f, " * ")?;
                rhs.fmt_operand(f, 3)
            }
            AffineExpr::FloorDiv(lhs, rhs) => {
                lhs.fmt_operand(f, 2)?;
                write!(f, " floordiv ")?;
                rhs.fmt_operand(f, 3)
            }
        }
    }
}

/// A list of affine expressions over `num_dims` dims and `num_symbols` symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffineMap {
    pub num_dims: u32,
    pub num_symbols: u32,
    pub results: Vec<AffineExpr>,
}

impl AffineMap {
    pub fn new(num_dims: u32, num_symbols: u32, results: Vec<AffineExpr>) -> Self {
        Self {
            num_dims,
            num_symbols,
            results,
        }
    }

    /// `(d0, .., dn-1) -> (d0, .., dn-1)`
    pub fn identity(num_dims: u32) -> Self {
        Self::new(num_dims, 0, (0..num_dims).map(AffineExpr::dim).collect())
    }

    /// The one-dimensional identity `(d0) -> (d0)`.
    pub fn dim_identity() -> Self {
        Self::identity(1)
    }

    /// `(d0, .., dn-1) -> (dn-k, .., dn-1)`
    pub fn minor_identity(num_dims: u32, num_results: u32) -> Self {
        let first = num_dims.saturating_sub(num_results);
        Self::new(num_dims, 0, (first..num_dims).map(AffineExpr::dim).collect())
    }

    pub fn num_inputs(&self) -> usize {
        (self.num_dims + self.num_symbols) as usize
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    /// True when the results are the trailing dims, in order, with no reordering.
    pub fn is_minor_identity(&self) -> bool {
        self.num_symbols == 0
            && self.results.len() <= self.num_dims as usize
            && *self == Self::minor_identity(self.num_dims, self.results.len() as u32)
    }

    pub fn single_result(&self) -> Option<&AffineExpr> {
        match self.results.as_slice() {
            [expr] => Some(expr),
            _ => None,
        }
    }

    pub fn evaluate(&self, dims: &[i64], symbols: &[i64]) -> Option<Vec<i64>> {
        self.results
            .iter()
            .map(|expr| expr.evaluate(dims, symbols))
            .collect()
    }
}

impl Display for AffineMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})",
            (0..self.num_dims).map(|d| format!("d{}", d)).join(", ")
        )?;
        if self.num_symbols > 0 {
            write!(
                f,
                "[{}]",
                (0..self.num_symbols).map(|s| format!("s{}", s)).join(", ")
            )?;
        }
        write!(f, " -> ({})", self.results.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(pos: u32) -> AffineExpr {
        AffineExpr::dim(pos)
    }

    fn s(pos: u32) -> AffineExpr {
        AffineExpr::symbol(pos)
    }

    fn c(value: i64) -> AffineExpr {
        AffineExpr::constant(value)
    }

    #[test]
    fn constants_fold_eagerly() {
        assert_eq!(c(2) * c(3) + c(4), c(10));
        assert_eq!(s(0) * c(1) + c(0), s(0));
        assert_eq!(c(0) * s(3), c(0));
        assert_eq!((s(0) + c(2)) + c(3), s(0) + c(5));
        assert_eq!((s(0) * c(2)) * c(3), s(0) * c(6));
        assert_eq!(c(64).floor_div(c(4)), c(16));
        assert_eq!(s(0).floor_div(c(1)), s(0));
    }

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-8, 2), -4);
    }

    #[test]
    fn replacing_dims_with_constants_collapses_row_major_index() {
        // (d0, d1, d2) -> (d0 * 12 + d1 * 4 + d2)
        let expr = d(0) * c(12) + d(1) * c(4) + d(2);
        let folded = expr.replace(&[c(1), c(2), c(3)], &[]);
        assert_eq!(folded, c(23));
    }

    #[test]
    fn minor_identity_detection() {
        assert!(AffineMap::minor_identity(3, 2).is_minor_identity());
        assert!(AffineMap::identity(2).is_minor_identity());
        let transposed = AffineMap::new(2, 0, vec![d(1), d(0)]);
        assert!(!transposed.is_minor_identity());
        let broadcast = AffineMap::new(2, 0, vec![c(0)]);
        assert!(!broadcast.is_minor_identity());
    }

    #[test]
    fn display_parenthesizes_by_precedence() {
        let map = AffineMap::new(0, 3, vec![s(0) * s(1) + s(2)]);
        assert_eq!(map.to_string(), "()[s0, s1, s2] -> (s0 * s1 + s2)");
        let nested = (s(0) + s(1)) * s(2);
        assert_eq!(nested.to_string(), "(s0 + s1) * s2");
        assert_eq!(s(0).floor_div(s(1)).to_string(), "s0 floordiv s1");
        assert_eq!(AffineMap::dim_identity().to_string(), "(d0) -> (d0)");
    }
}
