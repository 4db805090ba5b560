//! Plain stochastic gradient ascent with a diminishing step.

use crate::optim::{Storage, UpdateRule};

/// `value += gradient * learning_rate / iteration`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sgd;

impl UpdateRule for Sgd {
    type State<S: Storage> = ();

    fn init<S: Storage>(&self, _initial: &S) {}

    fn step<S: Storage>(
        &self,
        _state: &mut (),
        value: &mut S,
        gradient: &S,
        learning_rate: f64,
        iteration: u64,
    ) {
        value.axpy(learning_rate / iteration as f64, gradient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_scales_by_iteration() {
        let mut value = 1.0;
        Sgd.step(&mut (), &mut value, &2.0, 0.5, 1);
        assert_eq!(value, 2.0);
        Sgd.step(&mut (), &mut value, &2.0, 0.5, 4);
        assert_eq!(value, 2.25);
    }
}
