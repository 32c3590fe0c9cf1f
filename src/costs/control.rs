// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regularization costs over the control parameters.
//!
//! All four are evaluated once after the last step and depend only on the
//! T × K control array `u`. Limits are per channel.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use num_complex::Complex64;

use super::{check_alpha, check_channel_limits, Cost, ProblemLayout, DEFAULT_ALPHA};
use crate::error::{Error, Result};
use crate::linalg::rms_norm;

fn check_params(name: &str, limits: usize, params: &Array2<f64>) -> Result<()> {
    if params.ncols() != limits {
        return Err(Error::shape(
            name,
            format!("{} control channels", limits),
            params.ncols(),
        ));
    }
    Ok(())
}

/// Mean squared amplitude relative to the channel limits.
///
///   C = α·rms_norm(u / max_norm)²
#[derive(Debug, Clone)]
pub struct ControlNorm {
    max_norms: Vec<f64>,
    alpha: f64,
}

impl ControlNorm {
    pub const NAME: &'static str = "control_norm";

    pub fn new(max_norms: Vec<f64>) -> Self {
        Self {
            max_norms,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn normalized(&self, params: &Array2<f64>) -> Array2<f64> {
        let limits = Array1::from(self.max_norms.clone());
        params / &limits
    }
}

impl Cost for ControlNorm {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        false
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_channel_limits(Self::NAME, &self.max_norms, layout)
    }

    fn evaluate(&self, params: &Array2<f64>, _: &[Array2<Complex64>], _: usize) -> Result<f64> {
        check_params(Self::NAME, self.max_norms.len(), params)?;
        Ok(self.alpha * rms_norm(&self.normalized(params)).powi(2))
    }

    fn gradient_wrt_parameters(
        &self,
        params: &Array2<f64>,
        _: &[Array2<Complex64>],
        _: usize,
    ) -> Result<Array2<f64>> {
        check_params(Self::NAME, self.max_norms.len(), params)?;
        if params.is_empty() {
            return Ok(Array2::zeros(params.raw_dim()));
        }
        let scale = 2.0 * self.alpha / params.len() as f64;
        let limits_sq = Array1::from(self.max_norms.iter().map(|m| m * m).collect::<Vec<_>>());
        Ok(params / &limits_sq * scale)
    }
}

/// Net area under each channel relative to its limit.
///
///   C = α·Σ_k |Σ_t u[t, k]| / max_area_k / K
#[derive(Debug, Clone)]
pub struct ControlArea {
    max_areas: Vec<f64>,
    alpha: f64,
}

impl ControlArea {
    pub const NAME: &'static str = "control_area";

    pub fn new(max_areas: Vec<f64>) -> Self {
        Self {
            max_areas,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Cost for ControlArea {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        false
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_channel_limits(Self::NAME, &self.max_areas, layout)
    }

    fn evaluate(&self, params: &Array2<f64>, _: &[Array2<Complex64>], _: usize) -> Result<f64> {
        check_params(Self::NAME, self.max_areas.len(), params)?;
        let k = self.max_areas.len().max(1) as f64;
        let areas = params.sum_axis(Axis(0));
        let total: f64 = areas
            .iter()
            .zip(&self.max_areas)
            .map(|(a, m)| a.abs() / m)
            .sum();
        Ok(self.alpha * total / k)
    }

    fn gradient_wrt_parameters(
        &self,
        params: &Array2<f64>,
        _: &[Array2<Complex64>],
        _: usize,
    ) -> Result<Array2<f64>> {
        check_params(Self::NAME, self.max_areas.len(), params)?;
        let k = self.max_areas.len().max(1) as f64;
        let areas = params.sum_axis(Axis(0));
        let mut grad = Array2::<f64>::zeros(params.raw_dim());
        for (mut column, (area, m)) in grad
            .axis_iter_mut(Axis(1))
            .zip(areas.iter().zip(&self.max_areas))
        {
            // |x| is not differentiable at 0; use the zero subgradient there.
            let sign = if *area == 0.0 { 0.0 } else { area.signum() };
            column.fill(self.alpha * sign / m / k);
        }
        Ok(grad)
    }
}

/// n-th order forward difference along time, per channel.
fn diff(params: &Array2<f64>, order: usize) -> Array2<f64> {
    (0..order).fold(params.clone(), |acc, _| {
        let n = acc.nrows();
        if n == 0 {
            return acc;
        }
        Array2::from_shape_fn((n - 1, acc.ncols()), |(t, k)| acc[[t + 1, k]] - acc[[t, k]])
    })
}

/// Transpose of [`diff`]: maps a (T − order) × K array back to T × K.
fn diff_transpose(v: &Array2<f64>, order: usize) -> Array2<f64> {
    (0..order).fold(v.clone(), |acc, _| {
        let n = acc.nrows() + 1;
        Array2::from_shape_fn((n, acc.ncols()), |(t, k)| {
            let before = if t > 0 { acc[[t - 1, k]] } else { 0.0 };
            let here = if t < n - 1 { acc[[t, k]] } else { 0.0 };
            before - here
        })
    })
}

/// Smoothness penalty on the n-th time difference of each channel.
///
///   C = α·Σ_{t,k} (Δⁿu[t, k] / max_norm_k)² / ((T − n)·K)
#[derive(Debug, Clone)]
pub struct ControlVariation {
    max_norms: Vec<f64>,
    order: usize,
    alpha: f64,
}

impl ControlVariation {
    pub const NAME: &'static str = "control_variation";

    pub fn new(max_norms: Vec<f64>, order: usize) -> Self {
        Self {
            max_norms,
            order,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn scaled_diff(&self, params: &Array2<f64>) -> Result<Array2<f64>> {
        check_params(Self::NAME, self.max_norms.len(), params)?;
        if params.nrows() <= self.order {
            return Err(Error::InvalidConfiguration(format!(
                "{} of order {} needs more than {} time steps",
                Self::NAME,
                self.order,
                self.order
            )));
        }
        let limits = Array1::from(self.max_norms.clone());
        Ok(diff(params, self.order) / &limits)
    }
}

impl Cost for ControlVariation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        false
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_channel_limits(Self::NAME, &self.max_norms, layout)?;
        if self.order == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "{} order must be >= 1",
                Self::NAME
            )));
        }
        if layout.step_count <= self.order {
            return Err(Error::InvalidConfiguration(format!(
                "{} of order {} needs more than {} time steps, got {}",
                Self::NAME,
                self.order,
                self.order,
                layout.step_count
            )));
        }
        Ok(())
    }

    fn evaluate(&self, params: &Array2<f64>, _: &[Array2<Complex64>], _: usize) -> Result<f64> {
        let d = self.scaled_diff(params)?;
        Ok(self.alpha * d.mapv(|x| x * x).sum() / d.len() as f64)
    }

    fn gradient_wrt_parameters(
        &self,
        params: &Array2<f64>,
        _: &[Array2<Complex64>],
        _: usize,
    ) -> Result<Array2<f64>> {
        let d = self.scaled_diff(params)?;
        let limits = Array1::from(self.max_norms.clone());
        let scale = 2.0 * self.alpha / d.len() as f64;
        Ok(diff_transpose(&(d / &limits), self.order) * scale)
    }
}

/// FFT frequency grid for `n` samples spaced `dt` apart, in the usual
/// order: non-negative frequencies first, then negative ones.
fn fft_frequencies(n: usize, dt: f64) -> Vec<f64> {
    let span = n as f64 * dt;
    let positive = n.div_ceil(2);
    (0..n)
        .map(|m| {
            if m < positive {
                m as f64 / span
            } else {
                (m as f64 - n as f64) / span
            }
        })
        .collect()
}

/// Discrete Fourier transform coefficient F_m of one channel.
fn dft_coefficient(signal: ArrayView1<'_, f64>, m: usize) -> Complex64 {
    let n = signal.len() as f64;
    signal
        .iter()
        .enumerate()
        .map(|(t, u)| Complex64::from_polar(*u, -2.0 * PI * (m * t) as f64 / n))
        .sum()
}

/// Spectral power above each channel's bandwidth limit.
///
///   C = α·Σ_k Σ_{m: |f_m| > B_k} |F_km|² / (T·K)
///
/// where F_k is the discrete Fourier transform of channel k and f_m the
/// frequency grid for step duration `dt`.
#[derive(Debug, Clone)]
pub struct ControlBandwidthMax {
    max_bandwidths: Vec<f64>,
    dt: f64,
    alpha: f64,
}

impl ControlBandwidthMax {
    pub const NAME: &'static str = "control_bandwidth_max";

    pub fn new(max_bandwidths: Vec<f64>, dt: f64) -> Self {
        Self {
            max_bandwidths,
            dt,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Indices of out-of-band frequencies for each channel.
    fn penalized(&self, steps: usize) -> Vec<Vec<usize>> {
        let freqs = fft_frequencies(steps, self.dt);
        self.max_bandwidths
            .iter()
            .map(|b| {
                freqs
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.abs() > *b)
                    .map(|(m, _)| m)
                    .collect()
            })
            .collect()
    }

    fn normalizer(&self, params: &Array2<f64>) -> f64 {
        (params.nrows() * params.ncols()).max(1) as f64
    }
}

impl Cost for ControlBandwidthMax {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn alpha(&self) -> f64 {
        self.alpha
    }

    fn requires_step_evaluation(&self) -> bool {
        false
    }

    fn validate(&self, layout: &ProblemLayout) -> Result<()> {
        check_alpha(Self::NAME, self.alpha)?;
        check_channel_limits(Self::NAME, &self.max_bandwidths, layout)?;
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "{} needs a positive step duration, got {}",
                Self::NAME,
                self.dt
            )));
        }
        if (self.dt - layout.dt).abs() > 1e-9 * layout.dt.abs() {
            return Err(Error::InvalidConfiguration(format!(
                "{} step duration {} differs from the problem's {}",
                Self::NAME,
                self.dt,
                layout.dt
            )));
        }
        Ok(())
    }

    fn evaluate(&self, params: &Array2<f64>, _: &[Array2<Complex64>], _: usize) -> Result<f64> {
        check_params(Self::NAME, self.max_bandwidths.len(), params)?;
        let penalized = self.penalized(params.nrows());
        let power: f64 = params
            .axis_iter(Axis(1))
            .zip(&penalized)
            .map(|(channel, bins)| {
                bins.iter()
                    .map(|&m| dft_coefficient(channel, m).norm_sqr())
                    .sum::<f64>()
            })
            .sum();
        Ok(self.alpha * power / self.normalizer(params))
    }

    fn gradient_wrt_parameters(
        &self,
        params: &Array2<f64>,
        _: &[Array2<Complex64>],
        _: usize,
    ) -> Result<Array2<f64>> {
        check_params(Self::NAME, self.max_bandwidths.len(), params)?;
        let n = params.nrows();
        let penalized = self.penalized(n);
        let scale = 2.0 * self.alpha / self.normalizer(params);
        let mut grad = Array2::<f64>::zeros(params.raw_dim());

        for (k, (channel, bins)) in params.axis_iter(Axis(1)).zip(&penalized).enumerate() {
            for &m in bins {
                // ∂|F_m|²/∂u_t = 2·Re(conj(F_m)·e^{−2πi·m·t/T})
                let f_conj = dft_coefficient(channel, m).conj();
                for t in 0..n {
                    let phase = Complex64::from_polar(1.0, -2.0 * PI * (m * t) as f64 / n as f64);
                    grad[[t, k]] += scale * (f_conj * phase).re;
                }
            }
        }
        Ok(grad)
    }
}
