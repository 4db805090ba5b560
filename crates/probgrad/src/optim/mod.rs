//! Parameter state and update rules.
//!
//! A [`ParamStore`] owns the process-scoped state behind every parameter
//! node. Inference code asks it for a parameter by `(initial value,
//! learning rate, name)` on every step; the first request creates the
//! state, later requests hand out a fresh graph leaf over the same state.
//! Each `dv` on that leaf applies one update through the store's
//! [`UpdateRule`].
//!
//! ```text
//! ParamStore<R> ── key ──► Rc<Slot<R, S>> ◄── Value::parameter / TensorValue::parameter
//!                               │
//!                               └── R::step(state, value, gradient, lr, iteration)
//! ```

mod momentum;
mod sgd;

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::autodiff::{Parameter, TensorValue, Value};
use crate::backend::ArrayBackend;
use crate::operations::BinaryOp;
use crate::scalar::Real;

pub use momentum::{Momentum, MomentumState};
pub use sgd::Sgd;

/// Produces scalar parameter nodes.
pub trait Optimizer {
    fn param(&self, initial: f64, learning_rate: f64, name: &str) -> Value<f64>;
}

/// Produces tensor parameter nodes.
pub trait TensorOptimizer {
    fn tensor_param<B: ArrayBackend>(
        &self,
        initial: &B::Array,
        learning_rate: f64,
        name: &str,
    ) -> TensorValue<B>;
}

/// Parameter storage an update rule can operate on.
pub trait Storage: Clone + 'static {
    fn zeros_like(&self) -> Self;
    /// `self *= alpha`
    fn scale(&mut self, alpha: f64);
    /// `self += alpha * x`
    fn axpy(&mut self, alpha: f64, x: &Self);
}

impl Storage for f64 {
    fn zeros_like(&self) -> Self {
        0.0
    }

    fn scale(&mut self, alpha: f64) {
        *self *= alpha;
    }

    fn axpy(&mut self, alpha: f64, x: &Self) {
        *self += alpha * x;
    }
}

/// Backend array used as parameter storage.
pub struct ArrayStorage<B: ArrayBackend>(pub B::Array);

impl<B: ArrayBackend> Clone for ArrayStorage<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: ArrayBackend> ArrayStorage<B> {
    fn filled(&self, alpha: f64) -> B::Array {
        B::fill(B::Elem::from_f64(alpha), &B::shape(&self.0))
    }
}

impl<B: ArrayBackend> Storage for ArrayStorage<B> {
    fn zeros_like(&self) -> Self {
        Self(self.filled(0.0))
    }

    fn scale(&mut self, alpha: f64) {
        self.0 = B::zip(BinaryOp::Times, &self.0, &self.filled(alpha));
    }

    fn axpy(&mut self, alpha: f64, x: &Self) {
        let step = B::zip(BinaryOp::Times, &x.0, &self.filled(alpha));
        self.0 = B::zip(BinaryOp::Plus, &self.0, &step);
    }
}

/// How a gradient turns into a parameter update.
///
/// `iteration` counts updates of this parameter, starting at 1.
pub trait UpdateRule: Clone + 'static {
    type State<S: Storage>: 'static;

    fn init<S: Storage>(&self, initial: &S) -> Self::State<S>;

    fn step<S: Storage>(
        &self,
        state: &mut Self::State<S>,
        value: &mut S,
        gradient: &S,
        learning_rate: f64,
        iteration: u64,
    );
}

struct SlotState<R: UpdateRule, S: Storage> {
    value: S,
    rule_state: R::State<S>,
    iteration: u64,
}

/// Persistent state of one parameter.
struct Slot<R: UpdateRule, S: Storage> {
    rule: R,
    learning_rate: f64,
    state: RefCell<SlotState<R, S>>,
}

impl<R: UpdateRule, S: Storage> Slot<R, S> {
    fn new(rule: R, learning_rate: f64, initial: S) -> Self {
        let rule_state = rule.init(&initial);
        Self {
            rule,
            learning_rate,
            state: RefCell::new(SlotState {
                value: initial,
                rule_state,
                iteration: 0,
            }),
        }
    }

    fn current(&self) -> S {
        self.state.borrow().value.clone()
    }

    fn apply(&self, gradient: &S) {
        let mut guard = self.state.borrow_mut();
        guard.iteration += 1;
        let SlotState {
            value,
            rule_state,
            iteration,
        } = &mut *guard;
        self.rule
            .step(rule_state, value, gradient, self.learning_rate, *iteration);
    }
}

impl<R: UpdateRule> Parameter<f64> for Slot<R, f64> {
    fn value(&self) -> f64 {
        self.current()
    }

    fn update(&self, gradient: f64) {
        self.apply(&gradient);
    }
}

impl<R: UpdateRule, B: ArrayBackend> Parameter<B::Array> for Slot<R, ArrayStorage<B>> {
    fn value(&self) -> B::Array {
        self.current().0
    }

    fn update(&self, gradient: B::Array) {
        self.apply(&ArrayStorage(gradient));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ParamKey {
    name: String,
    learning_rate: u64,
    initial: Vec<u64>,
    backend: Option<TypeId>,
    shape: Vec<usize>,
}

/// Registry of parameter state, shared by every inference step.
///
/// # Example
///
/// ```
/// use probgrad::optim::{Optimizer, ParamStore, Sgd};
///
/// let store = ParamStore::new(Sgd);
/// let theta = store.param(0.0, 1.0, "theta");
/// theta.dv(0.5);
/// assert_eq!(store.value("theta"), Some(0.5));
/// // same key, same state
/// assert_eq!(store.param(0.0, 1.0, "theta").v(), 0.5);
/// assert_eq!(store.len(), 1);
/// ```
pub struct ParamStore<R: UpdateRule> {
    rule: R,
    // Values carry a creation serial so name lookups prefer the newest entry.
    scalars: RefCell<HashMap<ParamKey, (usize, Rc<Slot<R, f64>>)>>,
    tensors: RefCell<HashMap<ParamKey, (usize, Rc<dyn Any>)>>,
}

impl<R: UpdateRule> ParamStore<R> {
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            scalars: RefCell::new(HashMap::new()),
            tensors: RefCell::new(HashMap::new()),
        }
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Number of registered parameters, scalar and tensor.
    pub fn len(&self) -> usize {
        self.scalars.borrow().len() + self.tensors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the scalar parameter called `name`.
    ///
    /// When several parameters share the name under different learning
    /// rates or initial values, the most recently created one is returned.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.scalars
            .borrow()
            .iter()
            .filter(|(key, _)| key.name == name)
            .max_by_key(|(_, (serial, _))| *serial)
            .map(|(_, (_, slot))| slot.current())
    }

    /// Current value of the tensor parameter called `name` on backend `B`,
    /// newest first like [`ParamStore::value`].
    pub fn tensor_value<B: ArrayBackend>(&self, name: &str) -> Option<B::Array> {
        let backend = Some(TypeId::of::<B>());
        self.tensors
            .borrow()
            .iter()
            .filter(|(key, _)| key.name == name && key.backend == backend)
            .max_by_key(|(_, (serial, _))| *serial)
            .and_then(|(_, (_, slot))| slot.clone().downcast::<Slot<R, ArrayStorage<B>>>().ok())
            .map(|slot| slot.current().0)
    }
}

impl<R: UpdateRule> Optimizer for ParamStore<R> {
    fn param(&self, initial: f64, learning_rate: f64, name: &str) -> Value<f64> {
        let key = ParamKey {
            name: name.to_string(),
            learning_rate: learning_rate.to_bits(),
            initial: vec![initial.to_bits()],
            backend: None,
            shape: Vec::new(),
        };
        let serial = self.len();
        let slot = self
            .scalars
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| {
                debug!("creating parameter {name:?} (initial {initial}, learning rate {learning_rate})");
                (serial, Rc::new(Slot::new(self.rule.clone(), learning_rate, initial)))
            })
            .1
            .clone();
        Value::parameter(slot)
    }
}

impl<R: UpdateRule> TensorOptimizer for ParamStore<R> {
    fn tensor_param<B: ArrayBackend>(
        &self,
        initial: &B::Array,
        learning_rate: f64,
        name: &str,
    ) -> TensorValue<B> {
        let shape = B::shape(initial);
        let key = ParamKey {
            name: name.to_string(),
            learning_rate: learning_rate.to_bits(),
            initial: B::to_elems(initial)
                .into_iter()
                .map(|e| e.widen().to_bits())
                .collect(),
            backend: Some(TypeId::of::<B>()),
            shape: shape.clone(),
        };
        let serial = self.len();
        let entry = self
            .tensors
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| {
                debug!("creating tensor parameter {name:?} (shape {shape:?}, learning rate {learning_rate})");
                let slot = Slot::new(self.rule.clone(), learning_rate, ArrayStorage::<B>(initial.clone()));
                (serial, Rc::new(slot) as Rc<dyn Any>)
            })
            .1
            .clone();
        let slot = entry
            .downcast::<Slot<R, ArrayStorage<B>>>()
            .unwrap_or_else(|_| unreachable!("backend type is part of the key"));
        TensorValue::parameter(slot)
    }
}
