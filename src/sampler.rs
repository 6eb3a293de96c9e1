//! Affine-invariant ensemble MCMC sampler.
//!
//! Implements the Goodman & Weare "stretch move": every walker proposes a
//! point on the line through itself and a randomly chosen partner walker.
//! Walkers are updated serially so that runs are reproducible for a given
//! RNG. Priors are uniform over a box of bounds.

use crate::config::SamplerConfig;
use crate::constants::STRETCH_SCALE;
use rand::Rng;
use rand_distr::StandardNormal;
use thiserror::Error;

/// Attempts at drawing a finite starting position for a walker
const MAX_INIT_ATTEMPTS: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("log-probability is not finite at the initial guess {0:?}")]
    NonFiniteStart(Vec<f64>),

    #[error("no proposal was accepted in {0} steps; the sampler did not move")]
    Stuck(usize),

    #[error("estimate of parameter {0} is not finite")]
    NonFiniteEstimate(usize),

    #[error("need at least 2 walkers and 1 sample step")]
    InvalidSettings,
}

/// Posterior summary of one run
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSummary {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    /// Accepted proposals over all proposals, burn-in included
    pub acceptance_fraction: f64,
    /// Post-burn samples summarized (walkers x steps)
    pub n_samples: usize,
}

#[derive(Debug, Clone)]
pub struct EnsembleSampler {
    nwalkers: usize,
    burn_steps: usize,
    sample_steps: usize,
    scale: f64,
}

impl EnsembleSampler {
    /// Sampler for `ndim` parameters sized from the config
    pub fn new(ndim: usize, config: &SamplerConfig) -> Self {
        Self {
            nwalkers: config.walkers_per_param * ndim,
            burn_steps: config.burn_steps,
            sample_steps: config.sample_steps,
            scale: STRETCH_SCALE,
        }
    }

    pub fn nwalkers(&self) -> usize {
        self.nwalkers
    }

    /// Sample `log_prob` inside `bounds`, starting around `start`
    pub fn run<F, R>(
        &self,
        log_prob: F,
        start: &[f64],
        bounds: &[(f64, f64)],
        rng: &mut R,
    ) -> Result<SampleSummary, SamplerError>
    where
        F: Fn(&[f64]) -> f64,
        R: Rng,
    {
        if self.nwalkers < 2 || self.sample_steps == 0 {
            return Err(SamplerError::InvalidSettings);
        }
        let ndim = start.len();

        let posterior = |x: &[f64]| -> f64 {
            let inside = x
                .iter()
                .zip(bounds)
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi);
            if inside { log_prob(x) } else { f64::NEG_INFINITY }
        };

        let start_lp = posterior(start);
        if !start_lp.is_finite() {
            return Err(SamplerError::NonFiniteStart(start.to_vec()));
        }

        let (mut walkers, mut lps) = self.initialize(&posterior, start, start_lp, bounds, rng);

        let mut accepted = 0usize;
        let mut proposals = 0usize;
        let mut mean = vec![0.0; ndim];
        let mut m2 = vec![0.0; ndim];
        let mut count = 0usize;

        for step in 0..self.burn_steps + self.sample_steps {
            for k in 0..self.nwalkers {
                let mut j = rng.gen_range(0..self.nwalkers - 1);
                if j >= k {
                    j += 1;
                }

                let u: f64 = rng.gen_range(0.0..1.0);
                let z = ((self.scale - 1.0) * u + 1.0).powi(2) / self.scale;
                let proposal: Vec<f64> = walkers[j]
                    .iter()
                    .zip(&walkers[k])
                    .map(|(xj, xk)| xj + z * (xk - xj))
                    .collect();

                let lp = posterior(&proposal);
                let log_ratio = (ndim as f64 - 1.0) * z.ln() + lp - lps[k];
                let threshold: f64 = rng.gen_range(0.0..1.0);

                proposals += 1;
                if lp.is_finite() && threshold.ln() < log_ratio {
                    walkers[k] = proposal;
                    lps[k] = lp;
                    accepted += 1;
                }
            }

            if step >= self.burn_steps {
                for walker in &walkers {
                    count += 1;
                    for (d, value) in walker.iter().enumerate() {
                        let delta = value - mean[d];
                        mean[d] += delta / count as f64;
                        m2[d] += delta * (value - mean[d]);
                    }
                }
            }
        }

        if accepted == 0 {
            return Err(SamplerError::Stuck(self.burn_steps + self.sample_steps));
        }

        let std: Vec<f64> = m2.iter().map(|m| (m / count as f64).sqrt()).collect();
        if let Some(d) = (0..ndim).find(|&d| !mean[d].is_finite() || !std[d].is_finite()) {
            return Err(SamplerError::NonFiniteEstimate(d));
        }

        Ok(SampleSummary {
            mean,
            std,
            acceptance_fraction: accepted as f64 / proposals as f64,
            n_samples: count,
        })
    }

    /// Scatter walkers around the start; a walker that cannot find a finite
    /// position keeps the start itself
    fn initialize<F, R>(
        &self,
        posterior: &F,
        start: &[f64],
        start_lp: f64,
        bounds: &[(f64, f64)],
        rng: &mut R,
    ) -> (Vec<Vec<f64>>, Vec<f64>)
    where
        F: Fn(&[f64]) -> f64,
        R: Rng,
    {
        let spread: Vec<f64> = start
            .iter()
            .zip(bounds)
            .map(|(x, (lo, hi))| {
                let width = hi - lo;
                let scale = match (width.is_finite() && width > 0.0, *x != 0.0) {
                    (true, true) => width.min(x.abs()),
                    (true, false) => width,
                    (false, _) => x.abs().max(1.0),
                };
                0.01 * scale
            })
            .collect();

        let mut walkers = Vec::with_capacity(self.nwalkers);
        let mut lps = Vec::with_capacity(self.nwalkers);

        for _ in 0..self.nwalkers {
            let mut placed = None;
            for _ in 0..MAX_INIT_ATTEMPTS {
                let candidate: Vec<f64> = start
                    .iter()
                    .zip(&spread)
                    .zip(bounds)
                    .map(|((x, s), (lo, hi))| {
                        let noise: f64 = rng.sample(StandardNormal);
                        (x + s * noise).clamp(*lo, *hi)
                    })
                    .collect();
                let lp = posterior(&candidate);
                if lp.is_finite() {
                    placed = Some((candidate, lp));
                    break;
                }
            }
            let (walker, lp) = placed.unwrap_or_else(|| (start.to_vec(), start_lp));
            walkers.push(walker);
            lps.push(lp);
        }

        (walkers, lps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn settings(burn: usize, samples: usize) -> SamplerConfig {
        SamplerConfig {
            walkers_per_param: 8,
            burn_steps: burn,
            sample_steps: samples,
        }
    }

    fn gaussian(x: &[f64]) -> f64 {
        // mean (1, -2), sigma (0.5, 2)
        -0.5 * (((x[0] - 1.0) / 0.5).powi(2) + ((x[1] + 2.0) / 2.0).powi(2))
    }

    #[test]
    fn test_recovers_gaussian_moments() {
        let sampler = EnsembleSampler::new(2, &settings(200, 2000));
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = [(-20.0, 20.0), (-30.0, 30.0)];

        let summary = sampler.run(gaussian, &[0.0, 0.0], &bounds, &mut rng).unwrap();

        assert!((summary.mean[0] - 1.0).abs() < 0.15, "{:?}", summary);
        assert!((summary.mean[1] + 2.0).abs() < 0.6, "{:?}", summary);
        assert!((summary.std[0] - 0.5).abs() < 0.15, "{:?}", summary);
        assert!((summary.std[1] - 2.0).abs() < 0.6, "{:?}", summary);
        assert!(summary.acceptance_fraction > 0.2 && summary.acceptance_fraction < 0.95);
        assert_eq!(summary.n_samples, 16 * 2000);
    }

    #[test]
    fn test_samples_stay_inside_bounds() {
        let sampler = EnsembleSampler::new(2, &settings(50, 200));
        let mut rng = StdRng::seed_from_u64(11);
        // The bounds cut the Gaussian off well inside its bulk
        let bounds = [(0.9, 1.1), (-2.5, -1.5)];

        let summary = sampler.run(gaussian, &[1.0, -2.0], &bounds, &mut rng).unwrap();
        assert!(summary.mean[0] >= 0.9 && summary.mean[0] <= 1.1);
        assert!(summary.mean[1] >= -2.5 && summary.mean[1] <= -1.5);
    }

    #[test]
    fn test_same_seed_same_result() {
        let sampler = EnsembleSampler::new(2, &settings(20, 50));
        let bounds = [(-20.0, 20.0), (-30.0, 30.0)];

        let a = sampler
            .run(gaussian, &[0.0, 0.0], &bounds, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = sampler
            .run(gaussian, &[0.0, 0.0], &bounds, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_finite_start() {
        let sampler = EnsembleSampler::new(2, &settings(10, 10));
        let mut rng = StdRng::seed_from_u64(1);
        let result = sampler.run(|_| f64::NAN, &[0.0, 0.0], &[(-1.0, 1.0), (-1.0, 1.0)], &mut rng);
        assert!(matches!(result, Err(SamplerError::NonFiniteStart(_))));
    }

    #[test]
    fn test_start_outside_bounds() {
        let sampler = EnsembleSampler::new(1, &settings(10, 10));
        let mut rng = StdRng::seed_from_u64(1);
        let result = sampler.run(|_| 0.0, &[5.0], &[(-1.0, 1.0)], &mut rng);
        assert!(matches!(result, Err(SamplerError::NonFiniteStart(_))));
    }

    #[test]
    fn test_stuck_sampler() {
        let sampler = EnsembleSampler::new(1, &settings(5, 5));
        let mut rng = StdRng::seed_from_u64(1);
        // Only the very first evaluation (the start) is finite
        let calls = std::cell::Cell::new(0usize);
        let log_prob = |_: &[f64]| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 { 0.0 } else { f64::NEG_INFINITY }
        };
        let result = sampler.run(log_prob, &[0.5], &[(0.0, 1.0)], &mut rng);
        assert_eq!(result, Err(SamplerError::Stuck(10)));
    }
}
