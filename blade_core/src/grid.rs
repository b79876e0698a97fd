//! # Spanwise Grid Construction
//!
//! Builds the single spanwise grid every pipeline stage shares. The grid must
//! contain every composite layer/web start and end station plus any
//! user-declared control radii; the remaining points are distributed to
//! approximate uniform spacing and hit the configured size exactly.
//!
//! When more required points exist than the configured grid size, all of them
//! are kept (the grid grows past the target) and a warning is logged:
//! dropping a composite boundary would silently corrupt the layout.

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::interp::linspace;

/// Collects required span points into a deduplicated, sorted list.
///
/// Candidates closer than the snap tolerance to an already-accepted point are
/// merged onto it rather than added. The returned list is what
/// [`build_span_grid`] guarantees to keep.
#[derive(Debug, Clone)]
pub struct RequiredPoints {
    config: GeometryConfig,
    points: Vec<f64>,
}

impl RequiredPoints {
    pub fn new(config: &GeometryConfig) -> Self {
        Self {
            config: config.clone(),
            points: Vec::new(),
        }
    }

    /// Adds a candidate point. Returns the accepted coordinate: either the
    /// candidate itself or the existing point it snapped onto.
    pub fn insert(&mut self, r: f64) -> f64 {
        for &p in &self.points {
            if self.config.is_close(r, p) {
                return p;
            }
        }
        self.points.push(r);
        r
    }

    /// Adds every candidate, ignoring the snap results.
    pub fn extend(&mut self, rs: &[f64]) {
        for &r in rs {
            self.insert(r);
        }
    }

    pub fn sorted(&self) -> Vec<f64> {
        let mut pts = self.points.clone();
        pts.sort_by(|a, b| a.total_cmp(b));
        pts
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Builds the unified spanwise grid.
///
/// Starts from the uniform spacing a `linspace` of size `n` implies, assigns
/// each gap between consecutive required points a proportional number of
/// filler points, then adds/removes single fillers (largest/smallest local
/// spacing first) until the total count is exactly `n`.
pub fn build_span_grid(required: &RequiredPoints, config: &GeometryConfig) -> BladeResult<Vec<f64>> {
    let n = config.n_span;
    let r_points = required.sorted();
    let n_pts = r_points.len();

    if n_pts < 2 {
        return Err(BladeError::invalid_input(
            "required_points",
            format!("{n_pts}"),
            "need at least the blade root and tip stations",
        ));
    }

    if n_pts >= n {
        if n_pts > n {
            log::warn!(
                "a grid size of {} was specified, but {} unique composite boundary stations were \
                 found; keeping all of them (increase the grid size to >= {} for uniform spacing)",
                n,
                n_pts,
                n_pts
            );
        }
        return Ok(r_points);
    }

    // Uniform step the target size implies over the full span.
    let dr = (r_points[n_pts - 1] - r_points[0]) / (n - 1) as f64;

    // Initial filler allocation proportional to gap width.
    let mut fill = vec![0usize; n_pts - 1];
    let mut dri = vec![0.0f64; n_pts - 1];
    for i in 0..n_pts - 1 {
        let gap = r_points[i + 1] - r_points[i];
        fill[i] = (gap / dr).floor() as usize;
        dri[i] = gap / (fill[i] + 1) as f64;
    }

    let mut n_out = fill.iter().sum::<usize>() + n_pts;
    while n_out != n {
        if n_out > n {
            // remove a filler from the gap with the smallest sub-spacing
            let idx = (0..fill.len())
                .filter(|&i| fill[i] > 0)
                .min_by(|&a, &b| dri[a].total_cmp(&dri[b]))
                .expect("filler removal requested with no fillers left");
            fill[idx] -= 1;
            dri[idx] = (r_points[idx + 1] - r_points[idx]) / (fill[idx] + 1) as f64;
        } else {
            // add a filler to the gap with the largest sub-spacing
            let idx = (0..fill.len())
                .max_by(|&a, &b| dri[a].total_cmp(&dri[b]))
                .expect("grid has at least one gap");
            fill[idx] += 1;
            dri[idx] = (r_points[idx + 1] - r_points[idx]) / (fill[idx] + 1) as f64;
        }
        n_out = fill.iter().sum::<usize>() + n_pts;
    }

    // Concatenate per-gap linspaces, keeping each gap's start point only once.
    let mut grid = Vec::with_capacity(n);
    for i in 0..n_pts - 1 {
        let seg = linspace(r_points[i], r_points[i + 1], fill[i] + 2);
        let take = if i == n_pts - 2 {
            seg.len()
        } else {
            seg.len() - 1
        };
        grid.extend_from_slice(&seg[..take]);
    }

    debug_assert_eq!(grid.len(), n);
    Ok(grid)
}
