//! Shape-indexed graph nodes over an [`ArrayBackend`].
//!
//! `TensorValue` follows the same protocol as [`Value`]: a lazily memoized
//! forward array and a `dv` that pushes an incoming gradient array to the
//! operands. Shapes are fixed when a node is built, so every structural
//! error surfaces at construction and forward evaluation cannot fail.
//!
//! ```text
//! construction:  shape check ──► node { op, shape, memo }
//! forward:       v()  ──► backend op on operand v()s, memoized
//! backward:      dv(g) ──► backend ops on g ──► operand.dv(..)
//! ```

use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use num_traits::{One, Zero};
use rand::Rng;

use crate::autodiff::{Complete, Differentiable, Parameter, Value};
use crate::backend::ArrayBackend;
use crate::contract::{ContractionPlan, DotAxes};
use crate::error::GraphError;
use crate::operations::{BinaryOp, Comparison, UnaryOp};
use crate::scalar::Real;
use crate::strides::{insert_axis, remove_axis};

const BUILT: &str = "shapes validated when the node was built";

enum TensorOp<B: ArrayBackend> {
    Constant(B::Array),
    Parameter(Rc<dyn Parameter<B::Array>>),
    Fill(Value<B::Elem>),
    Unary(UnaryOp, TensorValue<B>),
    Binary(BinaryOp, TensorValue<B>, TensorValue<B>),
    Sum(TensorValue<B>, usize),
    Broadcast(TensorValue<B>, usize, usize),
    Cumsum(TensorValue<B>, usize),
    Dot(TensorValue<B>, TensorValue<B>, ContractionPlan),
    Count {
        input: TensorValue<B>,
        dim: usize,
        cmp: Comparison,
        threshold: TensorValue<B>,
    },
    Buffer {
        inner: TensorValue<B>,
        accumulated: RefCell<Option<B::Array>>,
    },
}

struct TensorNode<B: ArrayBackend> {
    op: TensorOp<B>,
    shape: Vec<usize>,
    memo: RefCell<Option<B::Array>>,
}

/// Handle to a tensor graph node.
///
/// # Example
///
/// ```
/// use probgrad::{DenseBackend, TensorValue};
///
/// let x = TensorValue::<DenseBackend>::from_elems(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// let rows = x.sum(1).unwrap();
/// assert_eq!(rows.shape(), &[2]);
/// assert_eq!(rows.v().data(), &[4.0, 6.0]);
/// ```
pub struct TensorValue<B: ArrayBackend>(Rc<TensorNode<B>>);

impl<B: ArrayBackend> Clone for TensorValue<B> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<B: ArrayBackend> fmt::Debug for TensorValue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.op {
            TensorOp::Constant(_) => "Constant".to_string(),
            TensorOp::Parameter(_) => "Parameter".to_string(),
            TensorOp::Fill(_) => "Fill".to_string(),
            TensorOp::Unary(op, _) => format!("{op:?}"),
            TensorOp::Binary(op, _, _) => format!("{op:?}"),
            TensorOp::Sum(_, dim) => format!("Sum({dim})"),
            TensorOp::Broadcast(_, dim, size) => format!("Broadcast({dim}, {size})"),
            TensorOp::Cumsum(_, dim) => format!("Cumsum({dim})"),
            TensorOp::Dot(..) => "Dot".to_string(),
            TensorOp::Count { dim, cmp, .. } => format!("Count({dim}, {cmp})"),
            TensorOp::Buffer { .. } => "Buffer".to_string(),
        };
        f.debug_struct("TensorValue")
            .field("op", &kind)
            .field("shape", &self.0.shape)
            .finish()
    }
}

fn check_axis(ndim: usize, dim: usize) -> Result<(), GraphError> {
    if dim >= ndim {
        return Err(GraphError::AxisOutOfRange { axis: dim, ndim });
    }
    Ok(())
}

impl<B: ArrayBackend> TensorValue<B> {
    fn from_op(op: TensorOp<B>, shape: Vec<usize>) -> Self {
        Self(Rc::new(TensorNode {
            op,
            shape,
            memo: RefCell::new(None),
        }))
    }

    pub fn constant(array: B::Array) -> Self {
        let shape = B::shape(&array);
        Self::from_op(TensorOp::Constant(array), shape)
    }

    /// Constant built from column-major elements.
    pub fn from_elems(data: Vec<B::Elem>, shape: &[usize]) -> Result<Self, GraphError> {
        Ok(Self::constant(B::from_elems(data, shape)?))
    }

    /// Constant filled with standard normal draws.
    pub fn random_normal<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::constant(B::random_normal(shape, rng))
    }

    /// A leaf over persistent array state; its shape is the shape of the
    /// state's current value.
    pub fn parameter(state: Rc<dyn Parameter<B::Array>>) -> Self {
        let shape = B::shape(&state.value());
        Self::from_op(TensorOp::Parameter(state), shape)
    }

    /// Broadcast a scalar node to `shape`. The backward pass sums the
    /// gradient back into the scalar.
    pub fn fill(value: &Value<B::Elem>, shape: &[usize]) -> Self {
        Self::from_op(TensorOp::Fill(value.clone()), shape.to_vec())
    }

    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    pub fn ndim(&self) -> usize {
        self.0.shape.len()
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.op, TensorOp::Constant(_))
    }

    /// Forward array, computed from the operands on first access.
    pub fn v(&self) -> B::Array {
        if let Some(cached) = self.0.memo.borrow().as_ref() {
            return cached.clone();
        }
        let value = self.compute();
        *self.0.memo.borrow_mut() = Some(value.clone());
        value
    }

    fn compute(&self) -> B::Array {
        match &self.0.op {
            TensorOp::Constant(a) => a.clone(),
            TensorOp::Parameter(p) => p.value(),
            TensorOp::Fill(x) => B::fill(x.v(), &self.0.shape),
            TensorOp::Unary(op, a) => B::map(*op, &a.v()),
            TensorOp::Binary(op, a, b) => B::zip(*op, &a.v(), &b.v()),
            TensorOp::Sum(a, dim) => B::reduce_sum(&a.v(), *dim),
            TensorOp::Broadcast(a, dim, size) => B::broadcast(&a.v(), *dim, *size),
            TensorOp::Cumsum(a, dim) => B::cumsum(&a.v(), *dim),
            TensorOp::Dot(a, b, plan) => B::tensordot(&a.v(), &b.v(), plan),
            TensorOp::Count {
                input,
                dim,
                cmp,
                threshold,
            } => B::count(&input.v(), *dim, *cmp, &threshold.v()),
            TensorOp::Buffer { inner, .. } => inner.v(),
        }
    }

    /// Send gradient `g` (shaped like this node) to the operands and drop
    /// the memoized value.
    pub fn dv(&self, g: B::Array) {
        match &self.0.op {
            TensorOp::Constant(_) | TensorOp::Count { .. } => {}
            TensorOp::Parameter(p) => p.update(g),
            TensorOp::Fill(x) => x.dv(B::sum_all(&g)),
            TensorOp::Unary(op, a) => unary_backward(*op, a, &g),
            TensorOp::Binary(op, a, b) => binary_backward(*op, a, b, &g),
            TensorOp::Sum(a, dim) => a.dv(B::broadcast(&g, *dim, a.shape()[*dim])),
            TensorOp::Broadcast(a, dim, _) => a.dv(B::reduce_sum(&g, *dim)),
            TensorOp::Cumsum(a, dim) => {
                // d x_i = sum_{j >= i} g_j = total - cumsum(g)_i + g_i
                let n = a.shape()[*dim];
                let total = B::broadcast(&B::reduce_sum(&g, *dim), *dim, n);
                let before = B::zip(BinaryOp::Minus, &B::cumsum(&g, *dim), &g);
                a.dv(B::zip(BinaryOp::Minus, &total, &before));
            }
            TensorOp::Dot(a, b, plan) => {
                if !a.is_constant() {
                    let axes = plan.a_gradient_axes();
                    let grad_plan = ContractionPlan::new(&self.0.shape, b.shape(), &axes).expect(BUILT);
                    a.dv(B::tensordot(&g, &b.v(), &grad_plan));
                }
                if !b.is_constant() {
                    let axes = plan.b_gradient_axes();
                    let grad_plan = ContractionPlan::new(a.shape(), &self.0.shape, &axes).expect(BUILT);
                    b.dv(B::tensordot(&a.v(), &g, &grad_plan));
                }
            }
            TensorOp::Buffer { accumulated, .. } => {
                let mut acc = accumulated.borrow_mut();
                let total = match acc.take() {
                    Some(prev) => B::zip(BinaryOp::Plus, &prev, &g),
                    None => g,
                };
                *acc = Some(total);
            }
        }
        self.0.memo.borrow_mut().take();
    }

    /// A constant holding the current forward array.
    pub fn detach(&self) -> Self {
        Self::constant(self.v())
    }

    /// Wrap this node in a gradient accumulator.
    pub fn buffer(&self) -> TensorBuffer<B> {
        TensorBuffer(Self::from_op(
            TensorOp::Buffer {
                inner: self.clone(),
                accumulated: RefCell::new(None),
            },
            self.0.shape.clone(),
        ))
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::from_op(TensorOp::Unary(op, self.clone()), self.0.shape.clone())
    }

    fn binary(&self, op: BinaryOp, other: &Self) -> Result<Self, GraphError> {
        if self.shape() != other.shape() {
            return Err(GraphError::ShapeMismatch {
                left: self.0.shape.clone(),
                right: other.0.shape.clone(),
            });
        }
        Ok(Self::from_op(
            TensorOp::Binary(op, self.clone(), other.clone()),
            self.0.shape.clone(),
        ))
    }

    pub fn plus(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(BinaryOp::Plus, other)
    }

    pub fn minus(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(BinaryOp::Minus, other)
    }

    pub fn times(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(BinaryOp::Times, other)
    }

    pub fn div(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(BinaryOp::Div, other)
    }

    pub fn pow(&self, exponent: &Self) -> Result<Self, GraphError> {
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

    /// Sum over axis `dim`, removing it.
    pub fn sum(&self, dim: usize) -> Result<Self, GraphError> {
        check_axis(self.ndim(), dim)?;
        let shape = remove_axis(self.shape(), dim);
        Ok(Self::from_op(TensorOp::Sum(self.clone(), dim), shape))
    }

    /// Insert axis `dim` of length `size` by replication. `dim` may equal
    /// the rank.
    pub fn broadcast(&self, dim: usize, size: usize) -> Result<Self, GraphError> {
        check_axis(self.ndim() + 1, dim)?;
        let shape = insert_axis(self.shape(), dim, size);
        Ok(Self::from_op(TensorOp::Broadcast(self.clone(), dim, size), shape))
    }

    /// Inclusive running sum along `dim`.
    pub fn cumsum(&self, dim: usize) -> Result<Self, GraphError> {
        check_axis(self.ndim(), dim)?;
        Ok(Self::from_op(TensorOp::Cumsum(self.clone(), dim), self.0.shape.clone()))
    }

    /// Contract with `other` over `axes.pairs`, placing the free axes at
    /// the positions given by the maps.
    ///
    /// # Errors
    ///
    /// See [`ContractionPlan::new`].
    ///
    /// # Example
    ///
    /// ```
    /// use probgrad::{DenseBackend, TensorValue};
    /// use probgrad::contract::DotAxes;
    ///
    /// let a = TensorValue::<DenseBackend>::from_elems(vec![1.0; 6], &[2, 3]).unwrap();
    /// let b = TensorValue::<DenseBackend>::from_elems(vec![1.0; 12], &[3, 4]).unwrap();
    /// let c = a.tensordot(&b, &DotAxes::pairs(&[(1, 0)], 2, 2)).unwrap();
    /// assert_eq!(c.shape(), &[2, 4]);
    /// ```
    pub fn tensordot(&self, other: &Self, axes: &DotAxes) -> Result<Self, GraphError> {
        let plan = ContractionPlan::new(self.shape(), other.shape(), axes)?;
        let shape = plan.result_shape.clone();
        Ok(Self::from_op(TensorOp::Dot(self.clone(), other.clone(), plan), shape))
    }

    /// Per-slice count along `dim` of elements `e` with `e <cmp> threshold`.
    ///
    /// `threshold` is shaped like `self` with `dim` removed. The result does
    /// not propagate gradients.
    pub fn count(&self, dim: usize, cmp: Comparison, threshold: &Self) -> Result<Self, GraphError> {
        check_axis(self.ndim(), dim)?;
        let shape = remove_axis(self.shape(), dim);
        if threshold.shape() != shape.as_slice() {
            return Err(GraphError::ShapeMismatch {
                left: shape,
                right: threshold.0.shape.clone(),
            });
        }
        Ok(Self::from_op(
            TensorOp::Count {
                input: self.clone(),
                dim,
                cmp,
                threshold: threshold.clone(),
            },
            shape,
        ))
    }

    /// Index of the maximum along `dim` for every slice.
    pub fn argmax(&self, dim: usize) -> Result<Vec<usize>, GraphError> {
        check_axis(self.ndim(), dim)?;
        Ok(B::argmax(&self.v(), dim))
    }

    /// Scalar sum of all elements, as a node of the scalar graph.
    pub fn sum_all(&self) -> Value<B::Elem> {
        Value::custom(Box::new(SumAll {
            input: self.clone(),
        }))
    }

    /// One element, as a node of the scalar graph.
    pub fn get(&self, index: &[usize]) -> Result<Value<B::Elem>, GraphError> {
        if index.len() != self.ndim() {
            return Err(GraphError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: index.len(),
            });
        }
        for (&i, &dim_size) in index.iter().zip(self.shape()) {
            if i >= dim_size {
                return Err(GraphError::IndexOutOfBounds { index: i, dim_size });
            }
        }
        Ok(Value::custom(Box::new(Element {
            input: self.clone(),
            index: index.to_vec(),
        })))
    }
}

fn unary_backward<B: ArrayBackend>(op: UnaryOp, a: &TensorValue<B>, g: &B::Array) {
    let x = a.v();
    let shape = a.shape();
    let times = |l: &B::Array, r: &B::Array| B::zip(BinaryOp::Times, l, r);
    let grad = match op {
        UnaryOp::Negate => B::map(UnaryOp::Negate, g),
        UnaryOp::Sqrt => {
            let two = B::fill(B::Elem::from_f64(2.0), shape);
            B::zip(BinaryOp::Div, g, &times(&two, &B::map(UnaryOp::Sqrt, &x)))
        }
        UnaryOp::Log => B::zip(BinaryOp::Div, g, &x),
        UnaryOp::Exp => times(g, &B::map(UnaryOp::Exp, &x)),
        UnaryOp::Logistic => {
            let s = B::map(UnaryOp::Logistic, &x);
            let complement = B::zip(BinaryOp::Minus, &B::fill(B::Elem::one(), shape), &s);
            times(g, &times(&s, &complement))
        }
        UnaryOp::Softplus => times(g, &B::map(UnaryOp::Logistic, &x)),
        UnaryOp::Digamma => times(g, &B::map(UnaryOp::Polygamma(1), &x)),
        UnaryOp::Polygamma(order) => times(g, &B::map(UnaryOp::Polygamma(order + 1), &x)),
        UnaryOp::Lgamma => times(g, &B::map(UnaryOp::Digamma, &x)),
    };
    a.dv(grad);
}

fn binary_backward<B: ArrayBackend>(op: BinaryOp, a: &TensorValue<B>, b: &TensorValue<B>, g: &B::Array) {
    let (av, bv) = (a.v(), b.v());
    let zip = |op: BinaryOp, l: &B::Array, r: &B::Array| B::zip(op, l, r);
    match op {
        BinaryOp::Plus => {
            a.dv(g.clone());
            b.dv(g.clone());
        }
        BinaryOp::Minus => {
            a.dv(g.clone());
            b.dv(B::map(UnaryOp::Negate, g));
        }
        BinaryOp::Times => {
            a.dv(zip(BinaryOp::Times, g, &bv));
            b.dv(zip(BinaryOp::Times, g, &av));
        }
        BinaryOp::Div => {
            a.dv(zip(BinaryOp::Div, g, &bv));
            let num = B::map(UnaryOp::Negate, &zip(BinaryOp::Times, g, &av));
            b.dv(zip(BinaryOp::Div, &num, &zip(BinaryOp::Times, &bv, &bv)));
        }
        BinaryOp::Pow => {
            let one = B::fill(B::Elem::one(), a.shape());
            let lowered = zip(BinaryOp::Pow, &av, &zip(BinaryOp::Minus, &bv, &one));
            a.dv(zip(BinaryOp::Times, g, &zip(BinaryOp::Times, &bv, &lowered)));
            if !b.is_constant() {
                let powered = zip(BinaryOp::Pow, &av, &bv);
                let local = zip(BinaryOp::Times, &powered, &B::map(UnaryOp::Log, &av));
                b.dv(zip(BinaryOp::Times, g, &local));
            }
        }
    }
}

struct SumAll<B: ArrayBackend> {
    input: TensorValue<B>,
}

impl<B: ArrayBackend> Differentiable<B::Elem> for SumAll<B> {
    fn forward(&self) -> B::Elem {
        B::sum_all(&self.input.v())
    }

    fn backward(&self, gradient: B::Elem) {
        self.input.dv(B::fill(gradient, self.input.shape()));
    }
}

struct Element<B: ArrayBackend> {
    input: TensorValue<B>,
    index: Vec<usize>,
}

impl<B: ArrayBackend> Differentiable<B::Elem> for Element<B> {
    fn forward(&self) -> B::Elem {
        B::get(&self.input.v(), &self.index)
    }

    fn backward(&self, gradient: B::Elem) {
        let mut grad = B::fill(B::Elem::zero(), self.input.shape());
        B::put(&mut grad, &self.index, gradient);
        self.input.dv(grad);
    }
}

/// Gradient accumulator for tensor nodes; see [`Buffer`](crate::Buffer).
pub struct TensorBuffer<B: ArrayBackend>(TensorValue<B>);

impl<B: ArrayBackend> Clone for TensorBuffer<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: ArrayBackend> fmt::Debug for TensorBuffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TensorBuffer").field(&self.0).finish()
    }
}

impl<B: ArrayBackend> TensorBuffer<B> {
    /// The gradient summed since the last flush.
    pub fn accumulated(&self) -> Option<B::Array> {
        match &(self.0).0.op {
            TensorOp::Buffer { accumulated, .. } => accumulated.borrow().clone(),
            _ => unreachable!("buffer handle wraps a buffer node"),
        }
    }

    pub fn value(&self) -> &TensorValue<B> {
        &self.0
    }
}

impl<B: ArrayBackend> Deref for TensorBuffer<B> {
    type Target = TensorValue<B>;

    fn deref(&self) -> &TensorValue<B> {
        &self.0
    }
}

impl<B: ArrayBackend> Complete for TensorBuffer<B> {
    fn complete(&self) {
        let node = &(self.0).0;
        if let TensorOp::Buffer { inner, accumulated } = &node.op {
            let total = accumulated.borrow_mut().take();
            if let Some(total) = total {
                inner.dv(total);
                node.memo.borrow_mut().take();
            }
        }
    }
}
