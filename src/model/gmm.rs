//! Diagonal-covariance Gaussian mixture.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Raw mixture parameters as stored in the model file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagGmmParams {
    pub weights: Vec<f32>,
    pub means: Vec<Vec<f32>>,
    pub variances: Vec<Vec<f32>>,
}

/// Mixture with per-component constants precomputed for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagGmm {
    dim: usize,
    means: Vec<Vec<f32>>,
    inv_vars: Vec<Vec<f32>>,
    /// log w_m − ½ (D log 2π + Σ log σ²)
    gconsts: Vec<f32>,
}

impl DiagGmm {
    pub fn new(params: DiagGmmParams) -> Result<Self, String> {
        let num_comp = params.weights.len();
        if num_comp == 0 {
            return Err("mixture has no components".to_string());
        }
        if params.means.len() != num_comp || params.variances.len() != num_comp {
            return Err(format!(
                "{} weights but {} means and {} variances",
                num_comp,
                params.means.len(),
                params.variances.len()
            ));
        }
        let dim = params.means[0].len();
        if dim == 0 {
            return Err("zero-dimensional mixture".to_string());
        }
        if params.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("component weights must be non-negative".to_string());
        }
        let total: f32 = params.weights.iter().sum();
        if (total - 1.0).abs() > 1e-3 {
            return Err(format!("component weights sum to {}, expected 1", total));
        }

        let mut inv_vars = Vec::with_capacity(num_comp);
        let mut gconsts = Vec::with_capacity(num_comp);
        for (m, (mean, var)) in params.means.iter().zip(&params.variances).enumerate() {
            if mean.len() != dim || var.len() != dim {
                return Err(format!("component {} has inconsistent dimension", m));
            }
            if var.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(format!("component {} has a non-positive variance", m));
            }
            let log_det: f32 = var.iter().map(|v| v.ln()).sum();
            gconsts.push(
                params.weights[m].ln() - 0.5 * (dim as f32 * (2.0 * PI).ln() + log_det),
            );
            inv_vars.push(var.iter().map(|v| 1.0 / v).collect());
        }

        Ok(Self {
            dim,
            means: params.means,
            inv_vars,
            gconsts,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_components(&self) -> usize {
        self.gconsts.len()
    }

    /// Log-likelihood of `x` under the mixture (log-sum-exp over components).
    pub fn log_likelihood(&self, x: &[f32]) -> f32 {
        debug_assert_eq!(x.len(), self.dim);
        let per_component: Vec<f32> = self
            .gconsts
            .iter()
            .zip(self.means.iter().zip(&self.inv_vars))
            .map(|(gconst, (mean, inv_var))| {
                let mahalanobis: f32 = x
                    .iter()
                    .zip(mean.iter().zip(inv_var))
                    .map(|(xi, (mi, ivi))| (xi - mi) * (xi - mi) * ivi)
                    .sum();
                gconst - 0.5 * mahalanobis
            })
            .collect();

        let max = per_component
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if !max.is_finite() {
            return max;
        }
        max + per_component
            .iter()
            .map(|l| (l - max).exp())
            .sum::<f32>()
            .ln()
    }
}
