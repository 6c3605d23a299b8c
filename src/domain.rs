//! The search space of an experiment.
//!
//! A [`Domain`] is either an ordered list of admissible points (a discrete,
//! usually tabulated, space) or a set of per-dimension `(min, max)` bounds.
//! It can deserialize from both shapes used by experiment payloads:
//!
//! ```
//! use boaas::Domain;
//!
//! let discrete: Domain = serde_json::from_str("[[1.0, 2.0], [3.0, 4.0]]").unwrap();
//! assert_eq!(discrete.len(), Some(2));
//!
//! let bounded: Domain = serde_json::from_str(r#"{"bounds": [[0.0, 1.0], [-5.0, 5.0]]}"#).unwrap();
//! assert_eq!(bounded.dims(), 2);
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::rng_util;
use crate::types::Point;

/// Absolute tolerance used when matching a point against a discrete domain.
const MATCH_TOLERANCE: f64 = 1e-9;

/// The search space of an experiment.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Domain {
    /// An ordered, non-empty list of admissible points.
    Discrete(Vec<Point>),
    /// Per-dimension inclusive `(min, max)` bounds.
    Bounded {
        /// One `(min, max)` pair per dimension.
        bounds: Vec<(f64, f64)>,
    },
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Bounds {
            bounds: Vec<(f64, f64)>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Discrete(Vec<Point>),
            Bounded(Bounds),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Discrete(points) => Self::Discrete(points),
            Repr::Bounded(Bounds { bounds }) => Self::Bounded { bounds },
        })
    }
}

impl Domain {
    /// Creates a discrete domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `points` is empty, a point is empty,
    /// points differ in dimensionality, or a coordinate is not finite.
    pub fn discrete(points: Vec<Point>) -> Result<Self> {
        let domain = Self::Discrete(points);
        domain.validate_shape()?;
        Ok(domain)
    }

    /// Creates a bounded domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `bounds` is empty, a bound is not finite,
    /// or `min > max` for some dimension.
    pub fn bounded(bounds: Vec<(f64, f64)>) -> Result<Self> {
        let domain = Self::Bounded { bounds };
        domain.validate_shape()?;
        Ok(domain)
    }

    /// Checks the structural invariants of the domain itself.
    ///
    /// Deserialized domains are unchecked until this is called; experiment
    /// creation always calls it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated invariant.
    pub fn validate_shape(&self) -> Result<()> {
        match self {
            Self::Discrete(points) => {
                let Some(first) = points.first() else {
                    return Err(Error::Config("domain has no points".into()));
                };
                if first.is_empty() {
                    return Err(Error::Config("domain points have no dimensions".into()));
                }
                for (i, p) in points.iter().enumerate() {
                    if p.len() != first.len() {
                        return Err(Error::Config(format!(
                            "domain point {i} has {} dimensions, expected {}",
                            p.len(),
                            first.len()
                        )));
                    }
                    if p.iter().any(|v| !v.is_finite()) {
                        return Err(Error::Config(format!(
                            "domain point {i} has a non-finite coordinate"
                        )));
                    }
                }
                Ok(())
            }
            Self::Bounded { bounds } => {
                if bounds.is_empty() {
                    return Err(Error::Config("domain has no dimensions".into()));
                }
                for (i, &(lo, hi)) in bounds.iter().enumerate() {
                    if !lo.is_finite() || !hi.is_finite() {
                        return Err(Error::Config(format!(
                            "bounds of dimension {i} must be finite"
                        )));
                    }
                    if lo > hi {
                        return Err(Error::Config(format!(
                            "bounds of dimension {i}: min ({lo}) must be <= max ({hi})"
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Number of dimensions of every point in the domain.
    #[must_use]
    pub fn dims(&self) -> usize {
        match self {
            Self::Discrete(points) => points.first().map_or(0, Vec::len),
            Self::Bounded { bounds } => bounds.len(),
        }
    }

    /// Number of points for discrete domains, `None` for bounded ones.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Discrete(points) => Some(points.len()),
            Self::Bounded { .. } => None,
        }
    }

    /// Returns `true` for a discrete domain without points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// The declared points of a discrete domain.
    #[must_use]
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            Self::Discrete(points) => Some(points),
            Self::Bounded { .. } => None,
        }
    }

    /// The per-dimension `(min, max)` range covered by the domain.
    ///
    /// For discrete domains this is the bounding box of the declared points.
    #[must_use]
    pub fn bounding_box(&self) -> Vec<(f64, f64)> {
        match self {
            Self::Bounded { bounds } => bounds.clone(),
            Self::Discrete(points) => (0..self.dims())
                .map(|j| {
                    points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                        (lo.min(p[j]), hi.max(p[j]))
                    })
                })
                .collect(),
        }
    }

    /// Returns `true` if `point` lies within (bounded) or among (discrete) the domain.
    #[must_use]
    pub fn validate(&self, point: &[f64]) -> bool {
        self.check(point).is_ok()
    }

    /// Like [`validate`](Self::validate), but explains why a point is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Domain`] on a dimensionality mismatch, a non-finite
    /// coordinate, a coordinate outside its bounds, or a point that is not a
    /// member of a discrete domain.
    pub fn check(&self, point: &[f64]) -> Result<()> {
        if point.len() != self.dims() {
            return Err(Error::Domain(format!(
                "expected {} dimensions, got {}",
                self.dims(),
                point.len()
            )));
        }
        if let Some(i) = point.iter().position(|v| !v.is_finite()) {
            return Err(Error::Domain(format!("coordinate {i} is not finite")));
        }
        match self {
            Self::Bounded { bounds } => {
                for (i, (&v, &(lo, hi))) in point.iter().zip(bounds).enumerate() {
                    if v < lo || v > hi {
                        return Err(Error::Domain(format!(
                            "coordinate {i} = {v} outside [{lo}, {hi}]"
                        )));
                    }
                }
                Ok(())
            }
            Self::Discrete(points) => {
                if points.iter().any(|p| same_point(p, point)) {
                    Ok(())
                } else {
                    Err(Error::Domain(format!("{point:?} is not a declared point")))
                }
            }
        }
    }

    /// Draw `n` points uniformly at random.
    ///
    /// Discrete domains are sampled without replacement, so at most
    /// [`len`](Self::len) points are returned. Bounded domains draw each
    /// coordinate uniformly within its bounds. The same `(n, seed)` always
    /// yields the same sequence; `seed = None` uses system entropy.
    #[must_use]
    pub fn sample_random(&self, n: usize, seed: Option<u64>) -> Vec<Point> {
        let mut rng = rng_util::rng_from_seed(seed);
        self.sample_with(n, &mut rng)
    }

    /// Like [`sample_random`](Self::sample_random), drawing from an existing generator.
    pub(crate) fn sample_with(&self, n: usize, rng: &mut fastrand::Rng) -> Vec<Point> {
        match self {
            Self::Discrete(points) => {
                let k = n.min(points.len());
                let mut indices: Vec<usize> = (0..points.len()).collect();
                // Partial Fisher-Yates: the first k slots end up uniformly chosen.
                for i in 0..k {
                    let j = rng.usize(i..points.len());
                    indices.swap(i, j);
                }
                indices[..k].iter().map(|&i| points[i].clone()).collect()
            }
            Self::Bounded { bounds } => (0..n)
                .map(|_| {
                    bounds
                        .iter()
                        .map(|&(lo, hi)| {
                            if hi > lo {
                                rng_util::f64_range(rng, lo, hi)
                            } else {
                                lo
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }

    /// Candidate points for acquisition, in enumeration order.
    ///
    /// Discrete domains enumerate every declared point; bounded domains draw
    /// `n_random` uniform points from `rng`.
    pub(crate) fn candidates(&self, n_random: usize, rng: &mut fastrand::Rng) -> Vec<Point> {
        match self {
            Self::Discrete(points) => points.clone(),
            Self::Bounded { .. } => self.sample_with(n_random, rng),
        }
    }

    /// Restrict the domain to a sub-box.
    ///
    /// Discrete domains keep only the points inside `bounds`; bounded domains
    /// intersect their ranges with `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `bounds` has the wrong number of
    /// dimensions or the restriction leaves nothing to search.
    pub fn restrict(&self, bounds: &[(f64, f64)]) -> Result<Self> {
        if bounds.len() != self.dims() {
            return Err(Error::Config(format!(
                "sampling bounds have {} dimensions, domain has {}",
                bounds.len(),
                self.dims()
            )));
        }
        match self {
            Self::Discrete(points) => {
                let kept: Vec<Point> = points
                    .iter()
                    .filter(|p| {
                        p.iter()
                            .zip(bounds)
                            .all(|(&v, &(lo, hi))| v >= lo && v <= hi)
                    })
                    .cloned()
                    .collect();
                if kept.is_empty() {
                    return Err(Error::Config(
                        "sampling bounds exclude every domain point".into(),
                    ));
                }
                Ok(Self::Discrete(kept))
            }
            Self::Bounded { bounds: own } => {
                let mut merged = Vec::with_capacity(own.len());
                for (i, (&(a_lo, a_hi), &(b_lo, b_hi))) in own.iter().zip(bounds).enumerate() {
                    let lo = a_lo.max(b_lo);
                    let hi = a_hi.min(b_hi);
                    if lo > hi {
                        return Err(Error::Config(format!(
                            "sampling bounds do not overlap the domain in dimension {i}"
                        )));
                    }
                    merged.push((lo, hi));
                }
                Ok(Self::Bounded { bounds: merged })
            }
        }
    }
}

/// Returns `true` if two points are equal within [`MATCH_TOLERANCE`].
pub(crate) fn same_point(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= MATCH_TOLERANCE)
}
