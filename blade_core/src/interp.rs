//! # Interpolation Kernel
//!
//! Shape-preserving monotone cubic (PCHIP, Fritsch–Carlson) interpolation and
//! the small geometric helpers the pipeline is built on: grid remapping with
//! overshoot clamping, polyline arc length, point rotation, and Gaussian
//! smoothing for flap-deflected profiles.
//!
//! The remapping functions never extrapolate beyond the value range of their
//! control points: outputs are clamped to `[min(y_ref), max(y_ref)]`, which
//! keeps resampled planform quantities inside physically meaningful bounds.

use crate::errors::{BladeError, BladeResult};

/// Monotone cubic interpolator (Fritsch–Carlson derivative limiting).
///
/// Knot abscissae must be strictly monotonic; a descending grid is accepted
/// and reversed internally.
#[derive(Debug, Clone)]
pub struct Pchip {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Knot derivatives after monotonicity limiting.
    d: Vec<f64>,
}

impl Pchip {
    /// Builds the interpolant. Fails on fewer than 2 points or on a grid
    /// that is not strictly monotonic.
    pub fn new(x: &[f64], y: &[f64]) -> BladeResult<Self> {
        if x.len() != y.len() {
            return Err(BladeError::invalid_input(
                "x/y",
                format!("{}/{}", x.len(), y.len()),
                "grid and values must have equal length",
            ));
        }
        if x.len() < 2 {
            return Err(BladeError::invalid_input(
                "x",
                format!("{}", x.len()),
                "need at least 2 points to interpolate",
            ));
        }

        let (mut x, mut y) = (x.to_vec(), y.to_vec());
        if x[0] > x[x.len() - 1] {
            x.reverse();
            y.reverse();
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BladeError::invalid_input(
                "x",
                "non-monotonic",
                "grid must be strictly increasing or decreasing",
            ));
        }

        let d = fritsch_carlson_derivatives(&x, &y);
        Ok(Self { x, y, d })
    }

    /// Evaluates the interpolant at `xi`. Points outside the knot range use
    /// the boundary cubic (callers that must not overshoot clamp afterwards,
    /// see [`remap_to_grid`]).
    pub fn eval(&self, xi: f64) -> f64 {
        let n = self.x.len();
        // locate interval
        let k = if xi <= self.x[0] {
            0
        } else if xi >= self.x[n - 1] {
            n - 2
        } else {
            match self.x.binary_search_by(|v| v.total_cmp(&xi)) {
                Ok(i) => i.min(n - 2),
                Err(i) => i - 1,
            }
        };

        let h = self.x[k + 1] - self.x[k];
        let t = (xi - self.x[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * self.y[k] + h10 * h * self.d[k] + h01 * self.y[k + 1] + h11 * h * self.d[k + 1]
    }

    /// Evaluates at many points.
    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&xi| self.eval(xi)).collect()
    }
}

/// Fritsch–Carlson limited derivatives for a strictly increasing grid.
fn fritsch_carlson_derivatives(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 2 {
        let delta = (y[1] - y[0]) / (x[1] - x[0]);
        return vec![delta, delta];
    }

    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] <= 0.0 {
            d[k] = 0.0;
        } else {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }
    d[0] = edge_derivative(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = edge_derivative(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point endpoint derivative with shape-preservation limits.
fn edge_derivative(h0: f64, h1: f64, delta0: f64, delta1: f64) -> f64 {
    let mut d = ((2.0 * h0 + h1) * delta0 - h0 * delta1) / (h0 + h1);
    if d * delta0 <= 0.0 {
        d = 0.0;
    } else if delta0 * delta1 < 0.0 && d.abs() > 3.0 * delta0.abs() {
        d = 3.0 * delta0;
    }
    d
}

/// Resamples `(x_ref, y_ref)` onto `x` with monotone cubic interpolation and
/// clamps the output to the source value range so spline overshoot never
/// leaves `[min(y_ref), max(y_ref)]`.
///
/// A target endpoint that exceeds the source grid by a rounding error is
/// snapped onto the source endpoint before evaluation.
pub fn remap_to_grid(x_ref: &[f64], y_ref: &[f64], x: &[f64]) -> BladeResult<Vec<f64>> {
    let spline = Pchip::new(x_ref, y_ref)?;

    let x_max = x_ref.iter().cloned().fold(f64::MIN, f64::max);
    let x_min = x_ref.iter().cloned().fold(f64::MAX, f64::min);
    let y_min = y_ref.iter().cloned().fold(f64::MAX, f64::min);
    let y_max = y_ref.iter().cloned().fold(f64::MIN, f64::max);

    let out = x
        .iter()
        .map(|&xi| {
            let xi = snap_to_bounds(xi, x_min, x_max);
            spline.eval(xi).clamp(y_min, y_max)
        })
        .collect();
    Ok(out)
}

/// Scalar variant of [`remap_to_grid`].
pub fn remap_to_value(x_ref: &[f64], y_ref: &[f64], x: f64) -> BladeResult<f64> {
    Ok(remap_to_grid(x_ref, y_ref, &[x])?[0])
}

fn snap_to_bounds(x: f64, x_min: f64, x_max: f64) -> f64 {
    if x > x_max && approx_eq(x, x_max) {
        x_max
    } else if x < x_min && approx_eq(x, x_min) {
        x_min
    } else {
        x
    }
}

/// `np.isclose` style comparison (relative 1e-5, absolute 1e-8).
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Piecewise-linear interpolation; `x_ref` may be descending.
pub fn interp_linear(x_ref: &[f64], y_ref: &[f64], x: f64) -> BladeResult<f64> {
    if x_ref.len() != y_ref.len() || x_ref.len() < 2 {
        return Err(BladeError::invalid_input(
            "x_ref",
            format!("{}", x_ref.len()),
            "need at least 2 points to interpolate",
        ));
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = if x_ref[0] > x_ref[x_ref.len() - 1] {
        (
            x_ref.iter().rev().cloned().collect(),
            y_ref.iter().rev().cloned().collect(),
        )
    } else {
        (x_ref.to_vec(), y_ref.to_vec())
    };

    let n = xs.len();
    if x <= xs[0] {
        return Ok(ys[0]);
    }
    if x >= xs[n - 1] {
        return Ok(ys[n - 1]);
    }
    let k = xs.partition_point(|&v| v <= x) - 1;
    let t = (x - xs[k]) / (xs[k + 1] - xs[k]);
    Ok(ys[k] + t * (ys[k + 1] - ys[k]))
}

/// Cumulative arc length of a 2-D polyline.
pub fn arc_length(pts: &[[f64; 2]]) -> Vec<f64> {
    let mut arc = vec![0.0; pts.len()];
    for k in 1..pts.len() {
        let dx = pts[k][0] - pts[k - 1][0];
        let dy = pts[k][1] - pts[k - 1][1];
        arc[k] = arc[k - 1] + (dx * dx + dy * dy).sqrt();
    }
    arc
}

/// Rotates point `(xp, yp)` about origin `(xo, yo)` by `angle` radians
/// (counterclockwise positive).
pub fn rotate_point(xo: f64, yo: f64, xp: f64, yp: f64, angle: f64) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    let qx = xo + c * (xp - xo) - s * (yp - yo);
    let qy = yo + s * (xp - xo) + c * (yp - yo);
    (qx, qy)
}

/// Gaussian smoothing with reflected boundaries, kernel truncated at
/// four standard deviations.
pub fn gaussian_smooth(values: &[f64], sigma: f64) -> Vec<f64> {
    if values.is_empty() || sigma <= 0.0 {
        return values.to_vec();
    }
    let radius = (4.0 * sigma).ceil() as i64;
    let mut weights = Vec::with_capacity((2 * radius + 1) as usize);
    for k in -radius..=radius {
        let u = k as f64 / sigma;
        weights.push((-0.5 * u * u).exp());
    }
    let w_sum: f64 = weights.iter().sum();

    let n = values.len() as i64;
    let reflect = |mut i: i64| -> usize {
        // scipy 'reflect' mode: (d c b a | a b c d | d c b a)
        loop {
            if i < 0 {
                i = -i - 1;
            } else if i >= n {
                i = 2 * n - i - 1;
            } else {
                return i as usize;
            }
        }
    };

    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            for (j, w) in weights.iter().enumerate() {
                let k = i + j as i64 - radius;
                acc += w * values[reflect(k)];
            }
            acc / w_sum
        })
        .collect()
}

/// Evenly spaced values from `a` to `b` inclusive.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![a];
    }
    let step = (b - a) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { b } else { a + step * i as f64 })
        .collect()
}
