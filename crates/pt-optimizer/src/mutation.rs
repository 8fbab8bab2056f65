//! (1+1) evolutionary neighbor generation with distance-weighted mutation.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use pt_types::{ParamValue, Parameter, ParameterSpace, Point, PointKey};

use crate::constraints::ConstraintValidator;

/// Mutation weights for every domain position relative to `index`.
///
/// Position `index` itself gets 0; the `d`-th neighbor on either side
/// (0-based) gets `2^-d`. Far positions of large domains underflow to 0.
pub fn neighbor_weights(index: usize, size: usize) -> Vec<f64> {
    debug_assert!(index < size);
    (0..size)
        .map(|j| {
            if j == index {
                0.0
            } else {
                let d = index.abs_diff(j) - 1;
                0.5f64.powi(d.min(i32::MAX as usize) as i32)
            }
        })
        .collect()
}

/// Draw a domain position other than `index`, favoring close positions.
///
/// `None` only for single-value domains, which have no neighbor.
pub fn weighted_neighbor<R: Rng + ?Sized>(index: usize, size: usize, rng: &mut R) -> Option<usize> {
    let dist = WeightedIndex::new(neighbor_weights(index, size)).ok()?;
    Some(dist.sample(rng))
}

/// Counters of discarded candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub skipped_inadmissible: usize,
    pub skipped_duplicate: usize,
}

impl GenerationStats {
    pub fn total_skipped(&self) -> usize {
        self.skipped_inadmissible + self.skipped_duplicate
    }
}

/// Produces new, admissible, never-before-seen points around a base point.
///
/// Owns the run's generated-points set; every key it ever emits or is told
/// about via [`NeighborGenerator::mark_generated`] is never emitted again.
#[derive(Debug)]
pub struct NeighborGenerator {
    space: ParameterSpace,
    validator: ConstraintValidator,
    generated: HashSet<PointKey>,
    rng: StdRng,
    mutation_rate: f64,
    max_attempts: usize,
    stats: GenerationStats,
}

impl NeighborGenerator {
    pub fn new(space: ParameterSpace, validator: ConstraintValidator, seed: u64) -> Self {
        let mutation_rate = 1.0 / space.len() as f64;
        Self {
            space,
            validator,
            generated: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
            mutation_rate,
            max_attempts: 10_000,
            stats: GenerationStats::default(),
        }
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
    }

    pub fn generated_count(&self) -> usize {
        self.generated.len()
    }

    pub fn generated_keys(&self) -> impl Iterator<Item = &PointKey> {
        self.generated.iter()
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.generated.contains(&point.key())
    }

    /// Record a point produced elsewhere (default, seeds). Returns `false`
    /// if it was already known.
    pub fn mark_generated(&mut self, point: &Point) -> bool {
        self.generated.insert(point.key())
    }

    /// Generate up to `count` new points around `base`.
    ///
    /// Returns fewer than `count` only when `max_attempts` consecutive
    /// candidates were rejected, i.e. the reachable space looks exhausted.
    pub fn generate(&mut self, base: &Point, count: usize) -> Vec<Point> {
        let mut points = Vec::with_capacity(count);
        let mut failed_attempts = 0;

        while points.len() < count {
            if failed_attempts >= self.max_attempts {
                warn!(
                    "No new admissible point after {} attempts, search space looks exhausted",
                    failed_attempts
                );
                break;
            }

            let candidate = self.mutate(base);

            if !self.validator.is_admissible(&candidate) {
                self.stats.skipped_inadmissible += 1;
                failed_attempts += 1;
                debug!(
                    "Impossible combination {}, {} impossible points skipped",
                    candidate.key(),
                    self.stats.skipped_inadmissible
                );
                continue;
            }

            if !self.generated.insert(candidate.key()) {
                self.stats.skipped_duplicate += 1;
                failed_attempts += 1;
                debug!("{} repeated points skipped", self.stats.skipped_duplicate);
                continue;
            }

            failed_attempts = 0;
            points.push(candidate);
        }

        points
    }

    fn mutate(&mut self, base: &Point) -> Point {
        let mut candidate = base.clone();
        for (i, param) in self.space.parameters().iter().enumerate() {
            if self.rng.random_bool(self.mutation_rate) {
                candidate = candidate.with_value(i, Self::next_value(param, base, i, &mut self.rng));
            }
        }
        candidate
    }

    fn next_value(param: &Parameter, base: &Point, i: usize, rng: &mut StdRng) -> ParamValue {
        let current = base.values()[i];
        // base points are domain-validated, so the value is always present
        let index = param.position(&current).unwrap_or(0);
        match weighted_neighbor(index, param.domain.len(), rng) {
            Some(j) => param.domain[j],
            None => current,
        }
    }
}
