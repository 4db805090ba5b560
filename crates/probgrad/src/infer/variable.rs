//! Sampled variables and observations.

use std::cell::Cell;

use log::warn;

use crate::autodiff::{Buffer, Complete};
use crate::infer::{Distribution, Score};

/// Per-variable gradient seeding strategy.
///
/// Called once from [`Variable::complete`] with the variable's own score
/// nodes and the totals `logp`/`logq` over its Markov blanket. The
/// estimator must `dv` both score nodes exactly once.
pub trait Estimator {
    fn seed(&self, model: &Score, guide: &Score, logp: f64, logq: f64);
}

/// A sampled outcome with a model (prior) score and a guide score.
///
/// Downstream scores that depend on this outcome are registered with
/// [`add_observation`](Self::add_observation) and
/// [`add_variable`](Self::add_variable) before [`complete`](Self::complete)
/// is called.
pub struct Variable<A> {
    value: A,
    model: Buffer<f64>,
    guide: Buffer<f64>,
    blanket_logp: Cell<f64>,
    blanket_logq: Cell<f64>,
    estimator: Option<Box<dyn Estimator>>,
    pending: Vec<Box<dyn Complete>>,
}

impl<A> Variable<A> {
    pub fn new(value: A, model_score: Score, guide_score: Score, estimator: Box<dyn Estimator>) -> Self {
        Self {
            value,
            model: model_score.buffer(),
            guide: guide_score.buffer(),
            blanket_logp: Cell::new(0.0),
            blanket_logq: Cell::new(0.0),
            estimator: Some(estimator),
            pending: Vec::new(),
        }
    }

    /// Observed data: both scores are constant zero and registrations are
    /// ignored.
    pub fn fixed(value: A) -> Self {
        Self {
            value,
            model: Score::constant(0.0).buffer(),
            guide: Score::constant(0.0).buffer(),
            blanket_logp: Cell::new(0.0),
            blanket_logq: Cell::new(0.0),
            estimator: None,
            pending: Vec::new(),
        }
    }

    /// Handles to complete after this variable's score buffers.
    pub fn with_pending(mut self, handles: impl IntoIterator<Item = Box<dyn Complete>>) -> Self {
        self.pending.extend(handles);
        self
    }

    pub fn get(&self) -> &A {
        &self.value
    }

    pub fn model_score(&self) -> &Score {
        &self.model
    }

    pub fn guide_score(&self) -> &Score {
        &self.guide
    }

    pub fn is_fixed(&self) -> bool {
        self.estimator.is_none()
    }

    /// Sum of blanket model and guide scores registered so far.
    pub fn blanket(&self) -> (f64, f64) {
        (self.blanket_logp.get(), self.blanket_logq.get())
    }

    /// Register the score of observed data depending on this variable.
    pub fn add_observation(&self, score: &Score) {
        if self.is_fixed() {
            warn!("observation registered against a fixed variable; no gradient can reach it");
            return;
        }
        self.blanket_logp.set(self.blanket_logp.get() + score.v());
    }

    /// Register the scores of a sampled variable depending on this one.
    pub fn add_variable(&self, model_score: &Score, guide_score: &Score) {
        if self.is_fixed() {
            warn!("variable registered against a fixed variable; no gradient can reach it");
            return;
        }
        self.blanket_logp.set(self.blanket_logp.get() + model_score.v());
        self.blanket_logq.set(self.blanket_logq.get() + guide_score.v());
    }

    /// Seed this variable's scores, then flush its buffers and pending
    /// handles.
    ///
    /// Every dependent must have registered, and completed, before this
    /// runs.
    pub fn complete(self) {
        let Some(estimator) = &self.estimator else {
            return;
        };
        let logp = self.model.v() + self.blanket_logp.get();
        let logq = self.guide.v() + self.blanket_logq.get();
        estimator.seed(&self.model, &self.guide, logp, logq);
        self.model.complete();
        self.guide.complete();
        for handle in &self.pending {
            handle.complete();
        }
    }
}

/// The score of observed data.
///
/// Built last and completed first: completion pushes a unit gradient into
/// the likelihood, reaching any sampled values it was computed from.
pub struct Observation {
    score: Score,
}

impl Observation {
    /// Score `value` under `dist`.
    pub fn new<A, D: Distribution<A> + ?Sized>(dist: &D, value: &A) -> Self {
        Self {
            score: dist.observe(value),
        }
    }

    /// Wrap a log-likelihood built by hand.
    pub fn from_score(score: Score) -> Self {
        Self { score }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn complete(self) {
        self.score.dv(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct Recorder {
        seen: Rc<Cell<Option<(f64, f64)>>>,
    }

    impl Estimator for Recorder {
        fn seed(&self, model: &Score, guide: &Score, logp: f64, logq: f64) {
            self.seen.set(Some((logp, logq)));
            model.dv(1.0);
            guide.dv(-1.0);
        }
    }

    #[test]
    fn test_blanket_sums_are_read_at_registration() {
        let seen = Rc::new(Cell::new(None));
        let v = Variable::new(
            true,
            Score::constant(-1.0),
            Score::constant(-2.0),
            Box::new(Recorder { seen: seen.clone() }),
        );
        v.add_observation(&Score::constant(-0.5));
        v.add_variable(&Score::constant(-3.0), &Score::constant(-4.0));
        assert_eq!(v.blanket(), (-3.5, -4.0));
        v.complete();
        assert_eq!(seen.get(), Some((-4.5, -6.0)));
    }

    #[test]
    fn test_fixed_variable_ignores_registrations() {
        let v = Variable::fixed(3_usize);
        assert!(v.is_fixed());
        v.add_observation(&Score::constant(-1.0));
        assert_eq!(v.blanket(), (0.0, 0.0));
        assert_eq!(*v.get(), 3);
        assert_eq!(v.model_score().v(), 0.0);
        v.complete();
    }
}
