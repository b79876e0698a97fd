//! # Airfoil Profile Interpolation
//!
//! Turns the discrete reference-airfoil library into a continuous spanwise
//! family: every unified-grid station gets a unit-chord profile blended by
//! relative thickness between the two bracketing reference airfoils.
//!
//! All profiles use one point ordering: from the trailing edge along the
//! suction side, around the leading edge, along the pressure side, back to
//! the trailing edge. Arc positions are normalized to [0, 1] over that path.
//! Reference airfoils are redistributed onto a shared leading-edge-biased
//! arc parameterization before blending, so point `j` means the same surface
//! location on every station.

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::flow::FlowSolver;
use crate::interp::{approx_eq, arc_length, gaussian_smooth, remap_to_grid, Pchip};
use crate::ontology::{AirfoilDef, TeFlap};

/// A single cross-section profile, unit chord, leading edge at the origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirfoilProfile {
    pub points: Vec<[f64; 2]>,
}

impl AirfoilProfile {
    /// Builds a profile from raw ontology coordinates: pairs the x/y arrays,
    /// enforces the suction-side-first ordering, and normalizes to unit
    /// chord with the leading edge at x = 0.
    pub fn from_coordinates(name: &str, x: &[f64], y: &[f64]) -> BladeResult<Self> {
        if x.len() != y.len() || x.len() < 4 {
            return Err(BladeError::invalid_input(
                "coordinates",
                format!("{}/{}", x.len(), y.len()),
                "airfoil needs equal-length x/y arrays with at least 4 points",
            ));
        }
        let mut points: Vec<[f64; 2]> = x.iter().zip(y).map(|(&xi, &yi)| [xi, yi]).collect();

        let le = argmin_x(&points);
        let pre_le_mean: f64 =
            points[..le.max(1)].iter().map(|p| p[1]).sum::<f64>() / le.max(1) as f64;
        if pre_le_mean < 0.0 {
            log::debug!("airfoil '{name}' declared pressure side first; reversing point order");
            points.reverse();
        }

        let mut profile = Self { points };
        profile.normalize();
        Ok(profile)
    }

    /// Index of the leading-edge point (minimum x).
    pub fn le_index(&self) -> usize {
        argmin_x(&self.points)
    }

    /// Shifts the leading edge to x = 0 and rescales to unit chord.
    pub fn normalize(&mut self) {
        let x_min = self
            .points
            .iter()
            .map(|p| p[0])
            .fold(f64::MAX, f64::min);
        let x_max = self
            .points
            .iter()
            .map(|p| p[0])
            .fold(f64::MIN, f64::max);
        let chord = x_max - x_min;
        if chord <= 0.0 {
            return;
        }
        for p in &mut self.points {
            p[0] = (p[0] - x_min) / chord;
            p[1] /= chord;
        }
    }

    /// True when the trailing edge is open (flatback or bluntness).
    pub fn is_flatback(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => (a[1] - b[1]).abs() > 1e-6,
            _ => false,
        }
    }

    /// Normalized arc positions (0 at the suction-side trailing edge, 1 at
    /// the pressure-side trailing edge) and the total unit-chord perimeter.
    pub fn arc_fractions(&self) -> (Vec<f64>, f64) {
        let arc = arc_length(&self.points);
        let total = *arc.last().unwrap_or(&0.0);
        if total <= 0.0 {
            return (arc, 0.0);
        }
        (arc.iter().map(|a| a / total).collect(), total)
    }

    /// Arc fraction of the leading edge.
    pub fn le_fraction(&self) -> f64 {
        let (fractions, _) = self.arc_fractions();
        fractions[self.le_index()]
    }

    /// Profile points in physical section coordinates: chord applied and the
    /// pitch axis moved to the origin.
    pub fn dimensioned(&self, chord: f64, p_le: f64) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|p| [(p[0] - p_le) * chord, p[1] * chord])
            .collect()
    }

    /// Resamples the surface onto `n` points with cosine clustering toward
    /// the leading edge on both sides. Point counts per side are
    /// proportional to side arc length, so the leading edge lands exactly on
    /// a sample.
    pub fn redistribute(&self, n: usize) -> BladeResult<Self> {
        if n < 8 {
            return Err(BladeError::invalid_input(
                "n",
                format!("{n}"),
                "profile redistribution needs at least 8 points",
            ));
        }
        let pts = dedup_consecutive(&self.points);
        let arc = arc_length(&pts);
        let total = *arc.last().unwrap_or(&0.0);
        if total <= 0.0 || pts.len() < 4 {
            return Err(BladeError::invalid_input(
                "profile",
                format!("{} points", pts.len()),
                "degenerate profile cannot be redistributed",
            ));
        }
        let s: Vec<f64> = arc.iter().map(|a| a / total).collect();
        let s_le = s[argmin_x(&pts)];

        let n_ss = ((n as f64 * s_le).round() as usize).clamp(3, n - 3);
        let n_ps = n - n_ss + 1; // leading-edge sample shared

        let mut targets = Vec::with_capacity(n);
        for j in 0..n_ss {
            let theta = std::f64::consts::FRAC_PI_2 * j as f64 / (n_ss - 1) as f64;
            targets.push(s_le * theta.sin());
        }
        for j in 1..n_ps {
            let theta = std::f64::consts::FRAC_PI_2 * j as f64 / (n_ps - 1) as f64;
            targets.push(s_le + (1.0 - s_le) * (1.0 - theta.cos()));
        }

        let xs: Vec<f64> = pts.iter().map(|p| p[0]).collect();
        let ys: Vec<f64> = pts.iter().map(|p| p[1]).collect();
        let px = Pchip::new(&s, &xs)?;
        let py = Pchip::new(&s, &ys)?;

        let points = targets
            .iter()
            .map(|&t| [px.eval(t), py.eval(t)])
            .collect();
        Ok(Self { points })
    }

    /// x-coordinates with the sign flipped ahead of the leading edge, giving
    /// a strictly monotonic abscissa over the whole surface.
    fn signed_x(&self) -> Vec<f64> {
        let le = self.le_index();
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| if i < le { -p[0] } else { p[0] })
            .collect()
    }
}

fn argmin_x(pts: &[[f64; 2]]) -> usize {
    let mut idx = 0;
    for (i, p) in pts.iter().enumerate() {
        if p[0] < pts[idx][0] {
            idx = i;
        }
    }
    idx
}

fn dedup_consecutive(pts: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut out: Vec<[f64; 2]> = Vec::with_capacity(pts.len());
    for &p in pts {
        if let Some(last) = out.last() {
            if (p[0] - last[0]).abs() < 1e-12 && (p[1] - last[1]).abs() < 1e-12 {
                continue;
            }
        }
        out.push(p);
    }
    out
}

/// One reference airfoil prepared for blending: redistributed points plus
/// its relative thickness.
#[derive(Debug, Clone)]
pub struct ReferenceProfile {
    pub name: String,
    pub relative_thickness: f64,
    pub profile: AirfoilProfile,
    pub flatback: bool,
}

/// The spanwise profile family: one profile per unified-grid station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFamily {
    pub stations: Vec<AirfoilProfile>,
}

impl ProfileFamily {
    pub fn station(&self, i: usize) -> BladeResult<&AirfoilProfile> {
        self.stations.get(i).ok_or_else(|| {
            BladeError::internal(format!("profile station {i} out of range"))
        })
    }
}

/// Deduplicates reference airfoils by relative thickness (first label wins),
/// sorts them ascending, and redistributes each onto the canonical
/// parameterization of the thinnest airfoil.
pub fn prepare_references(
    airfoils: &[&AirfoilDef],
    config: &GeometryConfig,
) -> BladeResult<Vec<ReferenceProfile>> {
    let mut refs: Vec<ReferenceProfile> = Vec::new();
    for af in airfoils {
        if refs
            .iter()
            .any(|r| approx_eq(r.relative_thickness, af.relative_thickness))
        {
            continue;
        }
        let raw =
            AirfoilProfile::from_coordinates(&af.name, &af.coordinates.x, &af.coordinates.y)?;
        let flatback = raw.is_flatback();
        refs.push(ReferenceProfile {
            name: af.name.clone(),
            relative_thickness: af.relative_thickness,
            profile: raw,
            flatback,
        });
    }
    if refs.is_empty() {
        return Err(BladeError::malformed("no reference airfoils declared"));
    }
    refs.sort_by(|a, b| {
        a.relative_thickness
            .partial_cmp(&b.relative_thickness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // thinnest airfoil defines the canonical point distribution
    let canonical = refs[0].profile.redistribute(config.n_profile_pts)?;
    let target_sx = canonical.signed_x();
    let canonical_pts = canonical.points.clone();
    refs[0].profile = canonical;

    for r in refs.iter_mut().skip(1) {
        let redist = r.profile.redistribute(config.n_profile_pts)?;
        let src_sx = redist.signed_x();
        let src_y: Vec<f64> = redist.points.iter().map(|p| p[1]).collect();
        let y = remap_to_grid(&src_sx, &src_y, &target_sx)?;
        r.profile = AirfoilProfile {
            points: canonical_pts
                .iter()
                .zip(&y)
                .map(|(p, &yi)| [p[0], yi])
                .collect(),
        };
    }
    Ok(refs)
}

/// Blends the reference family by relative thickness onto every station.
///
/// Each surface point's y-coordinate gets its own monotone spline over
/// thickness; x-coordinates are shared through the canonical
/// parameterization. Stations outside the reference thickness range are
/// clamped to the nearest reference.
pub fn build_family(refs: &[ReferenceProfile], rthick: &[f64]) -> BladeResult<ProfileFamily> {
    if refs.is_empty() {
        return Err(BladeError::malformed("no reference airfoils declared"));
    }
    let n_pts = refs[0].profile.points.len();

    if refs.len() == 1 {
        let mut stations = vec![refs[0].profile.clone(); rthick.len()];
        for st in &mut stations {
            finish_station(st);
        }
        return Ok(ProfileFamily { stations });
    }

    let thk: Vec<f64> = refs.iter().map(|r| r.relative_thickness).collect();
    let (thk_min, thk_max) = (thk[0], thk[thk.len() - 1]);

    // per-point splines over thickness
    let mut splines = Vec::with_capacity(n_pts);
    for j in 0..n_pts {
        let ys: Vec<f64> = refs.iter().map(|r| r.profile.points[j][1]).collect();
        splines.push(Pchip::new(&thk, &ys)?);
    }

    let mut stations = Vec::with_capacity(rthick.len());
    for &t in rthick {
        let tc = t.clamp(thk_min, thk_max);
        let points = (0..n_pts)
            .map(|j| [refs[0].profile.points[j][0], splines[j].eval(tc)])
            .collect();
        let mut st = AirfoilProfile { points };
        finish_station(&mut st);
        stations.push(st);
    }
    Ok(ProfileFamily { stations })
}

/// Per-station cleanup after blending: re-normalize and fair the trailing
/// edge over the outer 5% of chord.
fn finish_station(profile: &mut AirfoilProfile) {
    profile.normalize();
    smooth_trailing_edge(profile);
}

/// Re-interpolates the 95-100% chord band of each surface from the 85-95%
/// band plus the trailing-edge point, removing blending artifacts near an
/// open trailing edge.
fn smooth_trailing_edge(profile: &mut AirfoilProfile) {
    let n = profile.points.len();
    if n < 16 {
        return;
    }
    // suction trailing edge must not sit below the pressure one
    if profile.points[0][1] < profile.points[n - 1][1] {
        profile.points.swap(0, n - 1);
    }
    let le = profile.le_index();

    let side = |range: std::ops::Range<usize>, anchor: usize, pts: &Vec<[f64; 2]>| {
        let mid: Vec<usize> = range
            .clone()
            .filter(|&i| pts[i][0] > 0.85 && pts[i][0] < 0.95)
            .collect();
        let tip: Vec<usize> = range
            .filter(|&i| i != anchor && pts[i][0] >= 0.95)
            .collect();
        (mid, tip)
    };

    for (range, anchor) in [(0..le, 0usize), (le..n, n - 1)] {
        let (mid, tip) = side(range, anchor, &profile.points);
        if mid.len() < 2 || tip.is_empty() {
            continue;
        }
        let mut xs: Vec<f64> = mid.iter().map(|&i| profile.points[i][0]).collect();
        let mut ys: Vec<f64> = mid.iter().map(|&i| profile.points[i][1]).collect();
        xs.push(profile.points[anchor][0]);
        ys.push(profile.points[anchor][1]);

        let tip_x: Vec<f64> = tip.iter().map(|&i| profile.points[i][0]).collect();
        if let Ok(faired) = remap_to_grid(&xs, &ys, &tip_x) {
            for (&i, &y) in tip.iter().zip(&faired) {
                profile.points[i][1] = y;
            }
        }
    }
}

/// Flap-deflected profiles for one station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlapStation {
    /// Deflection angles in degrees, negative first.
    pub angles_deg: Vec<f64>,
    pub profiles: Vec<AirfoilProfile>,
}

/// Requests deflected-profile coordinates from the flow solver for every
/// flap angle and smooths them with a unit-sigma Gaussian to suppress hinge
/// discontinuities.
pub fn deflected_profiles(
    station: &AirfoilProfile,
    flap: &TeFlap,
    solver: &dyn FlowSolver,
    config: &GeometryConfig,
) -> BladeResult<FlapStation> {
    let angles_deg: Vec<f64> = crate::interp::linspace(
        flap.delta_max_neg.to_degrees(),
        flap.delta_max_pos.to_degrees(),
        flap.num_delta,
    );

    let mut profiles = Vec::with_capacity(angles_deg.len());
    for &angle in &angles_deg {
        let raw = solver.deflected_profile(
            &station.points,
            flap.chord_start,
            angle,
            config.n_profile_pts,
        )?;
        let xs: Vec<f64> = raw.iter().map(|p| p[0]).collect();
        let ys: Vec<f64> = raw.iter().map(|p| p[1]).collect();
        let xs = gaussian_smooth(&xs, 1.0);
        let ys = gaussian_smooth(&ys, 1.0);
        profiles.push(AirfoilProfile {
            points: xs.iter().zip(&ys).map(|(&x, &y)| [x, y]).collect(),
        });
    }
    Ok(FlapStation {
        angles_deg,
        profiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Symmetric teardrop with an analytic ordering: TE -> suction -> LE ->
    /// pressure -> TE.
    fn teardrop(n_half: usize, thickness: f64) -> AirfoilProfile {
        let mut points = Vec::new();
        for i in 0..=n_half {
            let x = 1.0 - i as f64 / n_half as f64;
            points.push([x, thickness * (x * (1.0 - x)).sqrt().max(0.0) * 2.0]);
        }
        for i in 1..=n_half {
            let x = i as f64 / n_half as f64;
            points.push([x, -thickness * (x * (1.0 - x)).sqrt().max(0.0) * 2.0]);
        }
        AirfoilProfile { points }
    }

    #[test]
    fn test_orientation_flip_on_pressure_first_input() {
        let td = teardrop(40, 0.1);
        let x: Vec<f64> = td.points.iter().rev().map(|p| p[0]).collect();
        let y: Vec<f64> = td.points.iter().rev().map(|p| p[1]).collect();
        let profile = AirfoilProfile::from_coordinates("t", &x, &y).unwrap();

        let le = profile.le_index();
        let suction_mean: f64 =
            profile.points[..le].iter().map(|p| p[1]).sum::<f64>() / le as f64;
        assert!(suction_mean > 0.0, "suction side must come first");
    }

    #[test]
    fn test_redistribute_keeps_le_and_te() {
        let profile = teardrop(60, 0.09);
        let out = profile.redistribute(200).unwrap();
        assert_eq!(out.points.len(), 200);

        let le = out.le_index();
        assert!(out.points[le][0] < 1e-3, "leading edge lost");
        assert!((out.points[0][0] - 1.0).abs() < 1e-6);
        assert!((out.points[199][0] - 1.0).abs() < 1e-6);

        // leading-edge bias: spacing near the LE is finer than near the TE
        let d_le = (out.points[le][0] - out.points[le - 1][0]).abs()
            + (out.points[le][1] - out.points[le - 1][1]).abs();
        let d_te = (out.points[1][0] - out.points[0][0]).abs()
            + (out.points[1][1] - out.points[0][1]).abs();
        assert!(d_le < d_te);
    }

    #[test]
    fn test_arc_fractions_span_unit_range() {
        let profile = teardrop(50, 0.12);
        let (fr, total) = profile.arc_fractions();
        assert_eq!(fr[0], 0.0);
        assert!((fr.last().unwrap() - 1.0).abs() < 1e-12);
        assert!(total > 2.0); // perimeter exceeds twice the chord

        let le_fr = profile.le_fraction();
        assert!((le_fr - 0.5).abs() < 0.02, "symmetric LE near mid-arc");
    }

    #[test]
    fn test_family_blends_monotonically_in_thickness() {
        let mk = |name: &str, t: f64| {
            let td = teardrop(80, t / 2.0);
            AirfoilDef {
                name: name.into(),
                relative_thickness: t,
                coordinates: crate::ontology::AirfoilCoordinates {
                    x: td.points.iter().map(|p| p[0]).collect(),
                    y: td.points.iter().map(|p| p[1]).collect(),
                },
                ..Default::default()
            }
        };
        let thin = mk("thin", 0.18);
        let thick = mk("thick", 0.40);
        let cfg = GeometryConfig {
            n_profile_pts: 160,
            ..Default::default()
        };
        let refs = prepare_references(&[&thick, &thin], &cfg).unwrap();
        assert_eq!(refs.len(), 2);
        assert!((refs[0].relative_thickness - 0.18).abs() < 1e-12);

        let family = build_family(&refs, &[0.18, 0.29, 0.40]).unwrap();
        let max_y = |st: &AirfoilProfile| {
            st.points.iter().map(|p| p[1]).fold(f64::MIN, f64::max)
        };
        let (a, b, c) = (
            max_y(&family.stations[0]),
            max_y(&family.stations[1]),
            max_y(&family.stations[2]),
        );
        assert!(a < b && b < c, "thickness must grow: {a} {b} {c}");
    }

    #[test]
    fn test_duplicate_thickness_references_collapse() {
        let td = teardrop(40, 0.09);
        let mk = |name: &str| AirfoilDef {
            name: name.into(),
            relative_thickness: 0.18,
            coordinates: crate::ontology::AirfoilCoordinates {
                x: td.points.iter().map(|p| p[0]).collect(),
                y: td.points.iter().map(|p| p[1]).collect(),
            },
            ..Default::default()
        };
        let a = mk("first");
        let b = mk("second");
        let cfg = GeometryConfig {
            n_profile_pts: 120,
            ..Default::default()
        };
        let refs = prepare_references(&[&a, &b], &cfg).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "first");
    }

    #[test]
    fn test_flatback_detection() {
        let mut profile = teardrop(30, 0.1);
        assert!(!profile.is_flatback());
        profile.points.first_mut().unwrap()[1] = 0.02;
        profile.points.last_mut().unwrap()[1] = -0.02;
        assert!(profile.is_flatback());
    }

    #[test]
    fn test_rthick_outside_reference_range_is_clamped() {
        let mk = |name: &str, t: f64| {
            let td = teardrop(60, t / 2.0);
            AirfoilDef {
                name: name.into(),
                relative_thickness: t,
                coordinates: crate::ontology::AirfoilCoordinates {
                    x: td.points.iter().map(|p| p[0]).collect(),
                    y: td.points.iter().map(|p| p[1]).collect(),
                },
                ..Default::default()
            }
        };
        let thin = mk("thin", 0.20);
        let thick = mk("thick", 0.35);
        let cfg = GeometryConfig {
            n_profile_pts: 120,
            ..Default::default()
        };
        let refs = prepare_references(&[&thin, &thick], &cfg).unwrap();
        let family = build_family(&refs, &[0.10, 0.20]).unwrap();

        // station below the thinnest reference equals the thinnest reference
        let y0: Vec<f64> = family.stations[0].points.iter().map(|p| p[1]).collect();
        let y1: Vec<f64> = family.stations[1].points.iter().map(|p| p[1]).collect();
        for (a, b) in y0.iter().zip(&y1) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
