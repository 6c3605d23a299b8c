//! Acquisition engine: scores candidate points under the surrogate model's
//! predictive distribution and selects the next point to evaluate.
//!
//! The default strategy is expected improvement with an exploration margin
//! `ε`. With `sign = +1` when maximizing and `-1` when minimizing, let
//! `m = sign·(μ(x) − f_best) − ε`. Then
//!
//! `EI(x) = E[max(0, m + σZ)] = m·Φ(m/σ) + σ·φ(m/σ)`
//!
//! which reduces to `max(0, m)` when `σ = 0`.
//!
//! Candidates are scanned in domain enumeration order and only a strictly
//! larger score replaces the incumbent, so ties go to the earliest candidate.
//! When the model carries no uncertainty anywhere (or is unfitted), the engine
//! falls back to the first unobserved candidate, or a random one if every
//! candidate has been observed.
//!
//! Points whose evaluation failed can be passed as `excluded`; they are left
//! out of the candidate set unless nothing else remains.

use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;
use crate::domain::{Domain, same_point};
use crate::model::{Prediction, SurrogateModel};
use crate::types::{Direction, Observation, Point};

/// Scoring strategy for candidate points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionFunction {
    /// Expected improvement over the best observation, less `epsilon`.
    #[default]
    ExpectedImprovement,
    /// Probability of improving on the best observation by more than `epsilon`.
    ProbabilityOfImprovement,
    /// Optimistic bound `sign·μ + kappa·σ`.
    UpperConfidenceBound,
}

/// Where a selected point came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Random initialization sample.
    Initialization,
    /// Maximizer of the acquisition function.
    Acquisition,
    /// Degenerate model; first unobserved or random candidate.
    Fallback,
}

/// A selected point together with the diagnostics that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// The point to evaluate next.
    pub point: Point,
    /// Acquisition score of `point`, if the model was consulted.
    pub score: Option<f64>,
    /// Model prediction at `point`, if the model was consulted.
    pub prediction: Option<Prediction>,
    /// How the point was chosen.
    pub source: SelectionSource,
}

impl Selection {
    pub(crate) fn initialization(point: Point) -> Self {
        Self {
            point,
            score: None,
            prediction: None,
            source: SelectionSource::Initialization,
        }
    }
}

/// Parameters that shape the acquisition score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcquisitionParams {
    /// Strategy.
    pub function: AcquisitionFunction,
    /// Optimization direction.
    pub direction: Direction,
    /// Minimum improvement margin, in objective units.
    pub epsilon: f64,
    /// Exploration weight of the upper confidence bound.
    pub kappa: f64,
}

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz-Stegun rational approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// Standard deviations below this are treated as exactly zero.
const MIN_STD: f64 = 1e-12;

/// Expected improvement of `prediction` over `f_best`.
#[must_use]
pub fn expected_improvement(
    prediction: Prediction,
    f_best: f64,
    direction: Direction,
    epsilon: f64,
) -> f64 {
    let m = direction.sign() * (prediction.mean - f_best) - epsilon;
    let std = prediction.std_dev();
    if std < MIN_STD {
        return m.max(0.0);
    }
    let z = m / std;
    (m * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
}

/// Probability that `prediction` improves on `f_best` by more than `epsilon`.
#[must_use]
pub fn probability_of_improvement(
    prediction: Prediction,
    f_best: f64,
    direction: Direction,
    epsilon: f64,
) -> f64 {
    let m = direction.sign() * (prediction.mean - f_best) - epsilon;
    let std = prediction.std_dev();
    if std < MIN_STD {
        return if m > 0.0 { 1.0 } else { 0.0 };
    }
    norm_cdf(m / std)
}

/// Optimistic bound on the (direction-adjusted) objective.
#[must_use]
pub fn upper_confidence_bound(prediction: Prediction, direction: Direction, kappa: f64) -> f64 {
    direction.sign() * prediction.mean + kappa * prediction.std_dev()
}

impl AcquisitionParams {
    /// Build from the sampling configuration of an experiment.
    #[must_use]
    pub fn from_config(config: &SamplingConfig, direction: Direction) -> Self {
        Self {
            function: config.kind,
            direction,
            epsilon: config.epsilon,
            kappa: config.kappa,
        }
    }

    /// Score a prediction against the incumbent `f_best`.
    #[must_use]
    pub fn score(&self, prediction: Prediction, f_best: f64) -> f64 {
        match self.function {
            AcquisitionFunction::ExpectedImprovement => {
                expected_improvement(prediction, f_best, self.direction, self.epsilon)
            }
            AcquisitionFunction::ProbabilityOfImprovement => {
                probability_of_improvement(prediction, f_best, self.direction, self.epsilon)
            }
            AcquisitionFunction::UpperConfidenceBound => {
                upper_confidence_bound(prediction, self.direction, self.kappa)
            }
        }
    }
}

/// Best observed value in the given direction, or `None` for an empty history.
#[must_use]
pub fn best_value(observations: &[Observation], direction: Direction) -> Option<f64> {
    observations
        .iter()
        .map(|o| o.value)
        .reduce(|a, b| if direction.is_better(b, a) { b } else { a })
}

/// Select the next point to evaluate.
///
/// * `model` - surrogate fitted on (a subset of) `observations`.
/// * `domain` - the search region; discrete domains are enumerated, bounded
///   domains contribute `config.n_candidates` random candidates.
/// * `observations` - full history; its best value is the incumbent.
/// * `excluded` - points to skip while any other candidate is left.
///
/// The returned point always belongs to `domain`.
pub fn select_next(
    model: &dyn SurrogateModel,
    domain: &Domain,
    observations: &[Observation],
    excluded: &[Point],
    direction: Direction,
    config: &SamplingConfig,
    rng: &mut fastrand::Rng,
) -> Selection {
    let mut candidates = domain.candidates(config.n_candidates, rng);
    if !excluded.is_empty() {
        let kept: Vec<Point> = candidates
            .iter()
            .filter(|c| !excluded.iter().any(|e| same_point(e, c)))
            .cloned()
            .collect();
        if !kept.is_empty() {
            candidates = kept;
        }
    }

    let f_best = best_value(observations, direction);
    let Some(f_best) = f_best.filter(|_| model.is_fitted()) else {
        return fallback(&candidates, observations, rng);
    };

    let predictions = model.predict(&candidates);
    if predictions.iter().all(|p| p.variance <= 0.0) {
        return fallback(&candidates, observations, rng);
    }

    let params = AcquisitionParams::from_config(config, direction);
    let mut best_idx = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, p) in predictions.iter().enumerate() {
        let s = params.score(*p, f_best);
        if s > best_score {
            best_score = s;
            best_idx = i;
        }
    }

    let mut point = candidates[best_idx].clone();
    let mut prediction = predictions[best_idx];
    if config.optimize_acq
        && let Domain::Bounded { bounds } = domain
    {
        (point, prediction, best_score) =
            refine(model, &params, f_best, bounds, point, prediction, best_score);
    }

    Selection {
        point,
        score: Some(best_score),
        prediction: Some(prediction),
        source: SelectionSource::Acquisition,
    }
}

/// Coordinate-wise pattern search around `start`, kept inside `bounds`.
fn refine(
    model: &dyn SurrogateModel,
    params: &AcquisitionParams,
    f_best: f64,
    bounds: &[(f64, f64)],
    start: Point,
    start_prediction: Prediction,
    start_score: f64,
) -> (Point, Prediction, f64) {
    const MAX_ROUNDS: usize = 30;
    const MIN_STEP: f64 = 1e-6;

    let mut point = start;
    let mut prediction = start_prediction;
    let mut score = start_score;
    let mut steps: Vec<f64> = bounds.iter().map(|(lo, hi)| 0.1 * (hi - lo)).collect();

    for _ in 0..MAX_ROUNDS {
        let mut improved = false;
        for (dim, &(lo, hi)) in bounds.iter().enumerate() {
            for dir in [1.0, -1.0] {
                let mut trial = point.clone();
                trial[dim] = (trial[dim] + dir * steps[dim]).clamp(lo, hi);
                let p = model.predict(core::slice::from_ref(&trial))[0];
                let s = params.score(p, f_best);
                if s > score {
                    point = trial;
                    prediction = p;
                    score = s;
                    improved = true;
                }
            }
        }
        if !improved {
            for step in &mut steps {
                *step *= 0.5;
            }
            if steps.iter().all(|&s| s < MIN_STEP) {
                break;
            }
        }
    }
    (point, prediction, score)
}

fn fallback(candidates: &[Point], observations: &[Observation], rng: &mut fastrand::Rng) -> Selection {
    let unobserved = candidates
        .iter()
        .find(|c| !observations.iter().any(|o| same_point(&o.point, c)));
    let point = match unobserved {
        Some(p) => p.clone(),
        None => candidates[rng.usize(0..candidates.len())].clone(),
    };
    Selection {
        point,
        score: None,
        prediction: None,
        source: SelectionSource::Fallback,
    }
}
