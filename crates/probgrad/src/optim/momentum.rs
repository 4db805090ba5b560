//! Momentum with a mass-corrected moving average.

use crate::optim::{Storage, UpdateRule};

/// Exponential moving average of the gradient, divided by the average's
/// total weight so early steps are not biased towards zero.
///
/// ```text
/// velocity = decay * velocity + (1 - decay) * gradient
/// mass     = decay * mass     + (1 - decay)
/// value   += velocity / mass * learning_rate / iteration
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    pub decay: f64,
}

impl Default for Momentum {
    fn default() -> Self {
        Self { decay: 0.9 }
    }
}

impl Momentum {
    pub fn new(decay: f64) -> Self {
        Self { decay }
    }
}

#[derive(Debug, Clone)]
pub struct MomentumState<S> {
    pub velocity: S,
    pub mass: f64,
}

impl UpdateRule for Momentum {
    type State<S: Storage> = MomentumState<S>;

    fn init<S: Storage>(&self, initial: &S) -> MomentumState<S> {
        MomentumState {
            velocity: initial.zeros_like(),
            mass: 0.0,
        }
    }

    fn step<S: Storage>(
        &self,
        state: &mut MomentumState<S>,
        value: &mut S,
        gradient: &S,
        learning_rate: f64,
        iteration: u64,
    ) {
        state.velocity.scale(self.decay);
        state.velocity.axpy(1.0 - self.decay, gradient);
        state.mass = self.decay * state.mass + (1.0 - self.decay);
        value.axpy(learning_rate / iteration as f64 / state.mass, &state.velocity);
    }
}
