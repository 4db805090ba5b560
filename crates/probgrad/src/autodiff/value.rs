//! Scalar computation-graph nodes.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::autodiff::Complete;
use crate::operations::{BinaryOp, UnaryOp};
use crate::scalar::Real;

/// Persistent leaf state read by a parameter node and updated by gradients.
///
/// Implemented by optimizer slots; `update` receives the total gradient of
/// one backward pass.
pub trait Parameter<T> {
    fn value(&self) -> T;
    fn update(&self, gradient: T);
}

/// A node with a user-defined forward value and backward rule.
///
/// `backward` receives the incoming gradient and must forward it to the
/// node's own operands.
pub trait Differentiable<T> {
    fn forward(&self) -> T;
    fn backward(&self, gradient: T);
}

enum Op<T: Real> {
    Constant(T),
    Parameter(Rc<dyn Parameter<T>>),
    Unary(UnaryOp, Value<T>),
    Binary(BinaryOp, Value<T>, Value<T>),
    Buffer {
        inner: Value<T>,
        accumulated: Cell<Option<T>>,
    },
    Custom(Box<dyn Differentiable<T>>),
}

struct Node<T: Real> {
    op: Op<T>,
    memo: Cell<Option<T>>,
}

/// Handle to a scalar graph node.
///
/// Cloning is cheap and shares the node. The forward value is computed on
/// first access and memoized until the next [`dv`](Value::dv).
///
/// # Example
///
/// ```
/// use probgrad::Value;
///
/// let x = Value::constant(3.0);
/// let y = &x * &x + 1.0;
/// assert_eq!(y.v(), 10.0);
/// ```
pub struct Value<T: Real>(Rc<Node<T>>);

impl<T: Real> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Real> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.op {
            Op::Constant(_) => "Constant".to_string(),
            Op::Parameter(_) => "Parameter".to_string(),
            Op::Unary(op, _) => format!("{op:?}"),
            Op::Binary(op, _, _) => format!("{op:?}"),
            Op::Buffer { .. } => "Buffer".to_string(),
            Op::Custom(_) => "Custom".to_string(),
        };
        f.debug_struct("Value")
            .field("op", &kind)
            .field("memo", &self.0.memo.get())
            .finish()
    }
}

impl<T: Real> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Self::constant(value)
    }
}

impl<T: Real> Value<T> {
    fn from_op(op: Op<T>) -> Self {
        Self(Rc::new(Node {
            op,
            memo: Cell::new(None),
        }))
    }

    /// A node whose `dv` is a no-op.
    pub fn constant(value: T) -> Self {
        Self::from_op(Op::Constant(value))
    }

    /// A leaf reading from, and sending gradients to, persistent state.
    pub fn parameter(state: Rc<dyn Parameter<T>>) -> Self {
        Self::from_op(Op::Parameter(state))
    }

    /// Wrap a node with its own forward and backward rule.
    pub fn custom(node: Box<dyn Differentiable<T>>) -> Self {
        Self::from_op(Op::Custom(node))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.op, Op::Constant(_))
    }

    /// Forward value, computed from the operands on first access.
    pub fn v(&self) -> T {
        if let Some(v) = self.0.memo.get() {
            return v;
        }
        let v = match &self.0.op {
            Op::Constant(c) => *c,
            Op::Parameter(p) => p.value(),
            Op::Unary(op, a) => op.apply(a.v()),
            Op::Binary(op, a, b) => op.apply(a.v(), b.v()),
            Op::Buffer { inner, .. } => inner.v(),
            Op::Custom(node) => node.forward(),
        };
        self.0.memo.set(Some(v));
        v
    }

    /// Send `gradient` to the operands and drop the memoized value.
    ///
    /// Must be called at most once per backward pass; nodes feeding several
    /// consumers go through a [`Buffer`].
    pub fn dv(&self, gradient: T) {
        match &self.0.op {
            Op::Constant(_) => {}
            Op::Parameter(p) => p.update(gradient),
            Op::Unary(op, a) => {
                let local = op.derivative(a.v());
                a.dv(gradient * local);
            }
            Op::Binary(op, a, b) => binary_backward(*op, a, b, gradient),
            Op::Buffer { accumulated, .. } => {
                let total = match accumulated.get() {
                    Some(acc) => acc + gradient,
                    None => gradient,
                };
                accumulated.set(Some(total));
            }
            Op::Custom(node) => node.backward(gradient),
        }
        self.0.memo.set(None);
    }

    /// A constant holding the current forward value.
    pub fn detach(&self) -> Self {
        Self::constant(self.v())
    }

    /// Wrap this node in a gradient accumulator.
    pub fn buffer(&self) -> Buffer<T> {
        Buffer(Self::from_op(Op::Buffer {
            inner: self.clone(),
            accumulated: Cell::new(None),
        }))
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::from_op(Op::Unary(op, self.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &Self) -> Self {
        Self::from_op(Op::Binary(op, self.clone(), other.clone()))
    }

    pub fn plus(&self, other: &Self) -> Self {
        self.binary(BinaryOp::Plus, other)
    }

    pub fn minus(&self, other: &Self) -> Self {
        self.binary(BinaryOp::Minus, other)
    }

    pub fn times(&self, other: &Self) -> Self {
        self.binary(BinaryOp::Times, other)
    }

    pub fn div(&self, other: &Self) -> Self {
        self.binary(BinaryOp::Div, other)
    }

    /// `self ^ exponent`; the exponent receives a gradient only when it is
    /// not a constant.
    pub fn pow(&self, exponent: &Self) -> Self {
        self.binary(BinaryOp::Pow, exponent)
    }

    pub fn negate(&self) -> Self {
        self.unary(UnaryOp::Negate)
    }

    pub fn sqrt(&self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn log(&self) -> Self {
        self.unary(UnaryOp::Log)
    }

    pub fn exp(&self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    pub fn logistic(&self) -> Self {
        self.unary(UnaryOp::Logistic)
    }

    pub fn softplus(&self) -> Self {
        self.unary(UnaryOp::Softplus)
    }

    pub fn digamma(&self) -> Self {
        self.unary(UnaryOp::Digamma)
    }

    pub fn trigamma(&self) -> Self {
        self.unary(UnaryOp::Polygamma(1))
    }

    pub fn lgamma(&self) -> Self {
        self.unary(UnaryOp::Lgamma)
    }
}

fn binary_backward<T: Real>(op: BinaryOp, a: &Value<T>, b: &Value<T>, g: T) {
    // read both operands before either dv invalidates its memo
    let (av, bv) = (a.v(), b.v());
    match op {
        BinaryOp::Plus => {
            a.dv(g);
            b.dv(g);
        }
        BinaryOp::Minus => {
            a.dv(g);
            b.dv(-g);
        }
        BinaryOp::Times => {
            a.dv(g * bv);
            b.dv(g * av);
        }
        BinaryOp::Div => {
            a.dv(g / bv);
            b.dv(g * (-av) / (bv * bv));
        }
        BinaryOp::Pow => {
            a.dv(g * bv * av.powf(bv - T::one()));
            if !b.is_constant() {
                b.dv(g * av.powf(bv) * av.ln());
            }
        }
    }
}

/// Gradient accumulator in front of a node with several consumers.
///
/// Every `dv` before [`complete`](Complete::complete) is summed; `complete`
/// sends the total to the wrapped node once. Completing with nothing
/// accumulated does nothing.
///
/// # Example
///
/// ```
/// use probgrad::{Complete, Value};
///
/// let x = Value::constant(2.0);
/// let b = x.buffer();
/// b.dv(1.0);
/// b.dv(2.5);
/// assert_eq!(b.accumulated(), Some(3.5));
/// b.complete();
/// assert_eq!(b.accumulated(), None);
/// ```
#[derive(Debug, Clone)]
pub struct Buffer<T: Real>(Value<T>);

impl<T: Real> Buffer<T> {
    /// The gradient summed since the last flush.
    pub fn accumulated(&self) -> Option<T> {
        match &(self.0).0.op {
            Op::Buffer { accumulated, .. } => accumulated.get(),
            _ => unreachable!("buffer handle wraps a buffer node"),
        }
    }

    /// Handle to the buffered node itself.
    pub fn value(&self) -> &Value<T> {
        &self.0
    }
}

impl<T: Real> Deref for Buffer<T> {
    type Target = Value<T>;

    fn deref(&self) -> &Value<T> {
        &self.0
    }
}

impl<T: Real> Complete for Buffer<T> {
    fn complete(&self) {
        let node = &(self.0).0;
        if let Op::Buffer { inner, accumulated } = &node.op {
            if let Some(total) = accumulated.take() {
                inner.dv(total);
                node.memo.set(None);
            }
        }
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<T: Real> std::ops::$trait<Value<T>> for Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: Value<T>) -> Value<T> {
                Value::$op(&self, &rhs)
            }
        }

        impl<T: Real> std::ops::$trait<&Value<T>> for Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: &Value<T>) -> Value<T> {
                Value::$op(&self, rhs)
            }
        }

        impl<T: Real> std::ops::$trait<Value<T>> for &Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: Value<T>) -> Value<T> {
                Value::$op(self, &rhs)
            }
        }

        impl<T: Real> std::ops::$trait<&Value<T>> for &Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: &Value<T>) -> Value<T> {
                Value::$op(self, rhs)
            }
        }

        impl<T: Real> std::ops::$trait<T> for Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: T) -> Value<T> {
                Value::$op(&self, &Value::constant(rhs))
            }
        }

        impl<T: Real> std::ops::$trait<T> for &Value<T> {
            type Output = Value<T>;
            fn $method(self, rhs: T) -> Value<T> {
                Value::$op(self, &Value::constant(rhs))
            }
        }
    };
}

impl_binary_operator!(Add, add, plus);
impl_binary_operator!(Sub, sub, minus);
impl_binary_operator!(Mul, mul, times);
impl_binary_operator!(Div, div, div);

impl<T: Real> std::ops::Neg for Value<T> {
    type Output = Value<T>;
    fn neg(self) -> Value<T> {
        self.negate()
    }
}

impl<T: Real> std::ops::Neg for &Value<T> {
    type Output = Value<T>;
    fn neg(self) -> Value<T> {
        self.negate()
    }
}
