//! Automatic-order ARIMA for short univariate series.
//!
//! Order selection follows the usual stepwise-free recipe: pick the
//! differencing order with a KPSS level-stationarity test, then fit every
//! ARMA(p, q) up to the configured maxima on the differenced series and keep
//! the lowest AIC. ARMA coefficients come from Hannan–Rissanen two-stage
//! least squares; residuals and the likelihood proxy are conditional sums of
//! squares.

use crate::error::{PulseError, Result};
use serde::Serialize;
use std::fmt;

/// 5% critical value of the KPSS level-stationarity statistic.
const KPSS_CRITICAL_5PCT: f64 = 0.463;
const SINGULAR_EPS: f64 = 1e-10;
const MIN_SIGMA2: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone)]
pub struct AutoArima {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
}

impl Default for AutoArima {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_d: 2,
            max_q: 2,
        }
    }
}

/// A fitted model, ready to forecast.
#[derive(Debug, Clone)]
pub struct ArimaFit {
    pub order: ArimaOrder,
    pub constant: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub aic: f64,
    // levels[k] is the series differenced k times; levels[d] is what the ARMA part models
    levels: Vec<Vec<f64>>,
    residuals: Vec<f64>,
}

struct ArmaCandidate {
    p: usize,
    q: usize,
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    aic: f64,
}

impl AutoArima {
    pub fn fit(&self, series: &[f64]) -> Result<ArimaFit> {
        if series.is_empty() {
            return Err(PulseError::Forecast("series is empty".into()));
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(PulseError::Forecast("series contains non-finite values".into()));
        }

        let mut levels = vec![series.to_vec()];
        while levels.len() - 1 < self.max_d {
            let current = &levels[levels.len() - 1];
            if current.len() < 3 || kpss_is_stationary(current) {
                break;
            }
            let next = difference(current);
            levels.push(next);
        }
        let d = levels.len() - 1;
        let w = &levels[d];
        let with_constant = d < 2;

        let mut best = mean_model(w, with_constant);
        for p in 0..=self.max_p {
            for q in 0..=self.max_q {
                if p == 0 && q == 0 {
                    continue;
                }
                if let Some(candidate) = fit_arma(w, p, q, with_constant) {
                    if candidate.aic < best.aic {
                        best = candidate;
                    }
                }
            }
        }

        Ok(ArimaFit {
            order: ArimaOrder {
                p: best.p,
                d,
                q: best.q,
            },
            constant: best.constant,
            ar: best.ar,
            ma: best.ma,
            sigma2: best.sigma2,
            aic: best.aic,
            levels,
            residuals: best.residuals,
        })
    }
}

impl ArimaFit {
    /// Point forecasts for the next `horizon` periods on the original scale.
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        let d = self.order.d;
        let mut w = self.levels[d].clone();
        let mut e = self.residuals.clone();
        let n = w.len();

        for t in n..n + horizon {
            let mut next = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                if let Some(idx) = t.checked_sub(i + 1) {
                    next += phi * w[idx];
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if let Some(idx) = t.checked_sub(j + 1) {
                    next += theta * e[idx];
                }
            }
            w.push(next);
            e.push(0.0);
        }

        // integrate back down to the original level
        let mut out: Vec<f64> = w[n..].to_vec();
        for level in (0..d).rev() {
            let mut last = *self.levels[level].last().unwrap_or(&0.0);
            out = out
                .into_iter()
                .map(|delta| {
                    last += delta;
                    last
                })
                .collect();
        }
        out
    }

    /// One-step-ahead in-sample fit aligned with the input series; the first
    /// `d` points have no prediction.
    pub fn fitted(&self) -> Vec<Option<f64>> {
        let d = self.order.d;
        let y = &self.levels[0];
        (0..y.len())
            .map(|t| {
                t.checked_sub(d)
                    .and_then(|i| self.residuals.get(i))
                    .map(|e| y[t] - e)
            })
            .collect()
    }
}

fn difference(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        0.0
    } else {
        x.iter().sum::<f64>() / x.len() as f64
    }
}

/// KPSS test for level stationarity with a Bartlett-kernel long-run variance.
fn kpss_is_stationary(x: &[f64]) -> bool {
    let n = x.len();
    let m = mean(x);
    let e: Vec<f64> = x.iter().map(|v| v - m).collect();
    let ssr: f64 = e.iter().map(|v| v * v).sum();
    if ssr <= MIN_SIGMA2 {
        return true;
    }

    let mut s = 0.0;
    let mut eta = 0.0;
    for v in &e {
        s += v;
        eta += s * s;
    }
    let nf = n as f64;
    eta /= nf * nf;

    let lags = ((3.0 * nf.sqrt()) / 13.0).floor() as usize;
    let mut lrv = ssr;
    for k in 1..=lags.min(n - 1) {
        let weight = 1.0 - k as f64 / (lags as f64 + 1.0);
        let cov: f64 = (k..n).map(|t| e[t] * e[t - k]).sum();
        lrv += 2.0 * weight * cov;
    }
    lrv /= nf;
    if lrv <= 0.0 {
        return true;
    }
    eta / lrv < KPSS_CRITICAL_5PCT
}

/// AIC per effective observation. Candidates lose different numbers of
/// leading points to their lags, so totals are not comparable.
fn aic(sigma2: f64, n_eff: usize, k: usize) -> f64 {
    sigma2.max(MIN_SIGMA2).ln() + 2.0 * (k as f64 + 1.0) / n_eff as f64
}

fn mean_model(w: &[f64], with_constant: bool) -> ArmaCandidate {
    let constant = if with_constant { mean(w) } else { 0.0 };
    let residuals: Vec<f64> = w.iter().map(|v| v - constant).collect();
    let sigma2 = residuals.iter().map(|r| r * r).sum::<f64>() / w.len().max(1) as f64;
    ArmaCandidate {
        p: 0,
        q: 0,
        constant,
        ar: Vec::new(),
        ma: Vec::new(),
        residuals,
        sigma2,
        aic: aic(sigma2, w.len(), usize::from(with_constant)),
    }
}

fn fit_arma(w: &[f64], p: usize, q: usize, with_constant: bool) -> Option<ArmaCandidate> {
    let n = w.len();
    let c = usize::from(with_constant);

    // Stage 1: long autoregression to estimate the innovations
    let (innovations, long_order) = if q > 0 {
        let m = (p + q + 1).max((n as f64).sqrt() as usize);
        if n < 2 * m + 2 {
            return None;
        }
        let coef = regress_ar(w, m, with_constant)?;
        let mut innov = vec![0.0; n];
        for t in m..n {
            let mut pred = if with_constant { coef[0] } else { 0.0 };
            for i in 0..m {
                pred += coef[c + i] * w[t - i - 1];
            }
            innov[t] = w[t] - pred;
        }
        (innov, m)
    } else {
        (vec![0.0; n], 0)
    };

    // Stage 2: regress on lagged values and lagged innovations
    let start = p.max(if q > 0 { long_order + q } else { 0 });
    let k = c + p + q;
    if n < start + k + 2 {
        return None;
    }
    let mut x = Vec::with_capacity(n - start);
    let mut y = Vec::with_capacity(n - start);
    for t in start..n {
        let mut row = Vec::with_capacity(k);
        if with_constant {
            row.push(1.0);
        }
        row.extend((1..=p).map(|i| w[t - i]));
        row.extend((1..=q).map(|j| innovations[t - j]));
        x.push(row);
        y.push(w[t]);
    }
    let beta = least_squares(&x, &y)?;
    let constant = if with_constant { beta[0] } else { 0.0 };
    let ar = beta[c..c + p].to_vec();
    let ma = beta[c + p..].to_vec();

    // reject explosive or non-invertible fits
    if ar.iter().map(|v| v.abs()).sum::<f64>() >= 1.0 || ma.iter().map(|v| v.abs()).sum::<f64>() >= 1.0 {
        return None;
    }

    // Conditional-sum-of-squares residuals
    let mut residuals = vec![0.0; n];
    let mut ssr = 0.0;
    for t in p..n {
        let mut pred = constant;
        for (i, phi) in ar.iter().enumerate() {
            pred += phi * w[t - i - 1];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                pred += theta * residuals[t - j - 1];
            }
        }
        residuals[t] = w[t] - pred;
        ssr += residuals[t] * residuals[t];
    }
    let n_eff = n - p;
    let sigma2 = ssr / n_eff as f64;
    if !sigma2.is_finite() {
        return None;
    }

    Some(ArmaCandidate {
        p,
        q,
        constant,
        ar,
        ma,
        residuals,
        sigma2,
        aic: aic(sigma2, n_eff, k),
    })
}

fn regress_ar(w: &[f64], m: usize, with_constant: bool) -> Option<Vec<f64>> {
    let mut x = Vec::with_capacity(w.len() - m);
    let mut y = Vec::with_capacity(w.len() - m);
    for t in m..w.len() {
        let mut row = Vec::with_capacity(m + 1);
        if with_constant {
            row.push(1.0);
        }
        row.extend((1..=m).map(|i| w[t - i]));
        x.push(row);
        y.push(w[t]);
    }
    least_squares(&x, &y)
}

/// Ordinary least squares via the normal equations; `None` when singular.
fn least_squares(x: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    let k = x.first()?.len();
    if k == 0 {
        return None;
    }
    let mut a = vec![vec![0.0; k + 1]; k];
    for (row, target) in x.iter().zip(y) {
        for i in 0..k {
            for j in 0..k {
                a[i][j] += row[i] * row[j];
            }
            a[i][k] += row[i] * target;
        }
    }

    // Gaussian elimination with partial pivoting on the augmented matrix
    for col in 0..k {
        let pivot = (col..k).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_EPS {
            return None;
        }
        a.swap(col, pivot);
        for r in col + 1..k {
            let factor = a[r][col] / a[col][col];
            for c in col..=k {
                a[r][c] -= factor * a[col][c];
            }
        }
    }
    let mut beta = vec![0.0; k];
    for r in (0..k).rev() {
        let tail: f64 = (r + 1..k).map(|c| a[r][c] * beta[c]).sum();
        beta[r] = (a[r][k] - tail) / a[r][r];
    }
    beta.iter().all(|b| b.is_finite()).then_some(beta)
}
