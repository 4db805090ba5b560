//! Elementwise operation tags shared by the scalar and tensor graphs.
//!
//! A graph node stores which primitive it applies as one of these tags;
//! backends evaluate the tag over whole arrays with [`UnaryOp::apply`] and
//! [`BinaryOp::apply`].

use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;
use crate::scalar::Real;

/// Single-operand elementwise primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Sqrt,
    Log,
    Exp,
    Logistic,
    Softplus,
    Digamma,
    /// `n`-th derivative of `Digamma`, `n >= 1`. Order 1 is trigamma.
    Polygamma(u32),
    Lgamma,
}

impl UnaryOp {
    #[inline]
    pub fn apply<T: Real>(self, x: T) -> T {
        match self {
            UnaryOp::Negate => -x,
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Logistic => x.logistic(),
            UnaryOp::Softplus => x.softplus(),
            UnaryOp::Digamma => x.digamma(),
            UnaryOp::Polygamma(order) => x.polygamma(order),
            UnaryOp::Lgamma => x.lgamma(),
        }
    }

    /// `d/dx op(x)` evaluated at `x`.
    pub fn derivative<T: Real>(self, x: T) -> T {
        match self {
            UnaryOp::Negate => -T::one(),
            UnaryOp::Sqrt => T::one() / (T::from_f64(2.0) * x.sqrt()),
            UnaryOp::Log => T::one() / x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Logistic => {
                let s = x.logistic();
                s * (T::one() - s)
            }
            UnaryOp::Softplus => x.logistic(),
            UnaryOp::Digamma => x.trigamma(),
            UnaryOp::Polygamma(order) => x.polygamma(order + 1),
            UnaryOp::Lgamma => x.digamma(),
        }
    }
}

/// Two-operand elementwise primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Div,
    Pow,
}

impl BinaryOp {
    #[inline]
    pub fn apply<T: Real>(self, a: T, b: T) -> T {
        match self {
            BinaryOp::Plus => a + b,
            BinaryOp::Minus => a - b,
            BinaryOp::Times => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// Comparison applied by `count`: an element `e` is counted when
/// `e <cmp> threshold` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    #[inline]
    pub fn holds<T: Real>(self, element: T, threshold: T) -> bool {
        match self {
            Comparison::Greater => element > threshold,
            Comparison::GreaterOrEqual => element >= threshold,
            Comparison::Less => element < threshold,
            Comparison::LessOrEqual => element <= threshold,
        }
    }
}

impl FromStr for Comparison {
    type Err = GraphError;

    /// # Examples
    ///
    /// ```
    /// use probgrad::operations::Comparison;
    ///
    /// assert_eq!(">".parse::<Comparison>().unwrap(), Comparison::Greater);
    /// assert!("~".parse::<Comparison>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Comparison::Greater),
            ">=" => Ok(Comparison::GreaterOrEqual),
            "<" => Ok(Comparison::Less),
            "<=" => Ok(Comparison::LessOrEqual),
            other => Err(GraphError::UnsupportedCondition(other.to_string())),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}
