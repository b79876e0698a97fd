//! # Planform Resampling
//!
//! Resamples every planform field from its native (possibly irregular) grid
//! onto the unified spanwise grid using shape-preserving monotone cubic
//! interpolation. Outputs are clamped to the source value range, so the
//! resampled planform never overshoots its control values.
//!
//! Relative thickness gets one extra correction: once the thinnest reference
//! airfoil's thickness is reached moving outboard, the distribution is held
//! flat at that minimum. Interpolation across the cylinder-to-airfoil
//! transition otherwise oscillates below the real minimum.

use serde::{Deserialize, Serialize};

use crate::errors::BladeResult;
use crate::interp::remap_to_grid;
use crate::ontology::{AirfoilDef, GridValues, OuterShape};

/// A per-station quantity that is only defined over part of the span.
///
/// `values[k]` belongs to station `start + k` of the unified grid. Stations
/// outside `[start, start + values.len())` carry no value; this replaces the
/// original None-padded arrays with an explicit active range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpanSeries {
    start: usize,
    values: Vec<f64>,
}

impl SpanSeries {
    /// A series covering every station with the same value.
    pub fn full(n: usize, value: f64) -> Self {
        Self {
            start: 0,
            values: vec![value; n],
        }
    }

    /// An empty series (no station carries a value).
    pub fn empty() -> Self {
        Self {
            start: 0,
            values: Vec::new(),
        }
    }

    /// A series over `[start, start + values.len())`.
    pub fn over_range(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    /// Value at station `i`, if the series is active there.
    pub fn get(&self, i: usize) -> Option<f64> {
        if i < self.start {
            return None;
        }
        self.values.get(i - self.start).copied()
    }

    /// Overwrites the value at station `i`. Grows the active range by
    /// appending when `i` is the station immediately past it.
    pub fn set(&mut self, i: usize, value: f64) {
        if self.values.is_empty() {
            self.start = i;
            self.values.push(value);
        } else if i >= self.start && i < self.start + self.values.len() {
            self.values[i - self.start] = value;
        } else if i == self.start + self.values.len() {
            self.values.push(value);
        } else if i + 1 == self.start {
            self.values.insert(0, value);
            self.start = i;
        } else {
            // disjoint write: pad the gap, keeping prior values
            if i < self.start {
                let pad = self.start - i;
                let mut values = vec![0.0; pad];
                values[0] = value;
                values.extend_from_slice(&self.values);
                self.start = i;
                self.values = values;
            } else {
                self.values.resize(i - self.start + 1, 0.0);
                self.values[i - self.start] = value;
            }
        }
    }

    /// Active station range as `[start, end)` indices on the unified grid.
    pub fn active_range(&self) -> (usize, usize) {
        (self.start, self.start + self.values.len())
    }

    pub fn is_active(&self, i: usize) -> bool {
        i >= self.start && i < self.start + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resamples a native `(grid, values)` schedule onto the unified grid.
    ///
    /// The active range covers the stations inside the schedule's native span
    /// range; stations outside it stay inactive.
    pub fn resample(native: &GridValues, s: &[f64]) -> BladeResult<Self> {
        if native.is_empty() {
            return Ok(Self::empty());
        }
        let n = s.len();
        let g0 = native.grid[0];
        let g1 = native.grid[native.grid.len() - 1];

        let idx_s = if g0 > 0.0 {
            s.iter().position(|&si| si >= g0).unwrap_or(n)
        } else {
            0
        };
        let idx_e = if g1 < 1.0 {
            s.iter().position(|&si| si > g1).unwrap_or(n)
        } else {
            n
        };
        if idx_s >= idx_e {
            return Ok(Self::empty());
        }

        let values = if native.grid.len() == 1 {
            vec![native.values[0]; idx_e - idx_s]
        } else {
            remap_to_grid(&native.grid, &native.values, &s[idx_s..idx_e])?
        };
        Ok(Self {
            start: idx_s,
            values,
        })
    }
}

/// Resampled planform: one value per unified-grid station for every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Planform {
    /// Normalized span stations, strictly increasing in [0, 1].
    pub s: Vec<f64>,
    /// Chord (m).
    pub chord: Vec<f64>,
    /// Aerodynamic twist (deg).
    pub twist_deg: Vec<f64>,
    /// Pitch-axis location as fraction of chord from the leading edge.
    pub p_le: Vec<f64>,
    /// Absolute radius (m).
    pub r: Vec<f64>,
    /// Prebend offset (m), positive downwind.
    pub precurve: Vec<f64>,
    /// Presweep offset (m).
    pub presweep: Vec<f64>,
    /// Relative thickness t/c.
    pub rthick: Vec<f64>,
}

impl Planform {
    pub fn n_span(&self) -> usize {
        self.s.len()
    }

    /// Resamples the outer shape onto the unified grid `s`.
    ///
    /// `airfoils` supplies the relative thickness of each airfoil named in
    /// the spanwise placement, in placement order.
    pub fn resample(shape: &OuterShape, airfoils: &[&AirfoilDef], s: &[f64]) -> BladeResult<Self> {
        let chord = remap_to_grid(&shape.chord.grid, &shape.chord.values, s)?;
        let twist_rad = remap_to_grid(&shape.twist.grid, &shape.twist.values, s)?;
        let twist_deg = twist_rad.iter().map(|t| t.to_degrees()).collect();
        let p_le = remap_to_grid(&shape.pitch_axis.grid, &shape.pitch_axis.values, s)?;
        let r = remap_to_grid(
            &shape.reference_axis.z.grid,
            &shape.reference_axis.z.values,
            s,
        )?;
        let precurve = remap_to_grid(
            &shape.reference_axis.x.grid,
            &shape.reference_axis.x.values,
            s,
        )?
        .iter()
        .map(|v| -v)
        .collect();
        let presweep = remap_to_grid(
            &shape.reference_axis.y.grid,
            &shape.reference_axis.y.values,
            s,
        )?;

        let thk_ref: Vec<f64> = airfoils.iter().map(|af| af.relative_thickness).collect();
        let rthick = resample_relative_thickness(&shape.airfoil_position.grid, &thk_ref, s)?;

        Ok(Self {
            s: s.to_vec(),
            chord,
            twist_deg,
            p_le,
            r,
            precurve,
            presweep,
            rthick,
        })
    }

    /// Blade tip radius (m).
    pub fn tip_radius(&self) -> f64 {
        self.r.last().copied().unwrap_or(0.0)
    }
}

/// Relative-thickness resampling with the outboard flattening correction.
///
/// After the first station that reaches the thinnest reference thickness, the
/// distribution is clamped flat at that minimum.
pub fn resample_relative_thickness(
    grid: &[f64],
    thk_ref: &[f64],
    s: &[f64],
) -> BladeResult<Vec<f64>> {
    let mut rthick = remap_to_grid(grid, thk_ref, s)?;
    let thk_min = thk_ref.iter().cloned().fold(f64::MAX, f64::min);

    if let Some(idx_min) = rthick.iter().position(|&t| t <= thk_min + 1e-12) {
        for t in rthick.iter_mut().skip(idx_min + 1) {
            *t = thk_min;
        }
    }
    Ok(rthick)
}
