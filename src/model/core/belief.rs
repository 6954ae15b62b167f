//! Mixture-of-normals belief over the factor vector.
//!
//! A [`Belief`] is an immutable value: each filter step consumes the
//! previous belief by reference and returns a new one.
use crate::{
    model::core::params::MixtureParams,
    optimization::numerical_stability::log_sum_exp,
};
use ndarray::{Array1, Array2};

/// One normal component with its log-weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub log_weight: f64,
    pub mean: Array1<f64>,
    pub cov: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Belief {
    components: Vec<Component>,
}

impl Belief {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Initial belief from the mixture parameters. Zero-weight components
    /// are kept with log-weight `-∞`.
    pub fn initial(mixture: &MixtureParams) -> Self {
        let components = mixture
            .weights
            .iter()
            .zip(&mixture.means)
            .zip(&mixture.covs)
            .map(|((w, mean), cov)| Component {
                log_weight: w.ln(),
                mean: mean.clone(),
                cov: cov.clone(),
            })
            .collect();
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn n_factors(&self) -> usize {
        self.components.first().map_or(0, |c| c.mean.len())
    }

    /// Mixture weights (normalized).
    pub fn weights(&self) -> Vec<f64> {
        let logs: Vec<f64> = self.components.iter().map(|c| c.log_weight).collect();
        let total = log_sum_exp(&logs);
        logs.iter().map(|l| (l - total).exp()).collect()
    }

    /// Mixture mean `Σ_k w_k m_k`.
    pub fn mean(&self) -> Array1<f64> {
        let mut mean = Array1::zeros(self.n_factors());
        for (w, c) in self.weights().into_iter().zip(&self.components) {
            if w > 0.0 {
                mean.scaled_add(w, &c.mean);
            }
        }
        mean
    }
}
