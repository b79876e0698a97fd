//! # Spanwise Polar Tables
//!
//! Blends the reference-airfoil polars into a single 4-D table over angle of
//! attack, span station, Reynolds number and flap deflection. The angle grid
//! is the outermost reference airfoil's declared grid with the endpoints
//! forced to exactly ±180°, closed periodically (equal values at both ends).
//! The Reynolds axis is
//! padded with far-out sentinels (1e1 and 1e15) duplicating the boundary
//! columns, so lookups never extrapolate.
//!
//! Reynolds interpolation is linear in log10(Re) between table columns.
//! Flap-deflection slots start as copies of the undeflected polar and are
//! overwritten by solver-computed sweeps inside the flap span.

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::flow::{FlowSolver, PolarCorrector, PolarRow, SweepRequest};
use crate::interp::{approx_eq, interp_linear, Pchip};
use crate::ontology::{AirData, AirfoilDef, Assembly, TeFlap};
use crate::planform::Planform;
use crate::profile::ProfileFamily;

const RE_PAD_LOW: f64 = 1e1;
const RE_PAD_HIGH: f64 = 1e15;

/// 4-D polar table: `(alpha, span, reynolds, deflection)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolarSet {
    /// Angle of attack grid (rad), ascending, spanning ±pi.
    pub alpha: Vec<f64>,
    /// Reynolds axis including the sentinel pads.
    pub re: Vec<f64>,
    /// Flap deflections (rad); slot 0 is always the undeflected polar.
    pub delta: Vec<f64>,
    pub cl: Array4<f64>,
    pub cd: Array4<f64>,
    pub cm: Array4<f64>,
}

impl PolarSet {
    pub fn n_span(&self) -> usize {
        self.cl.shape()[1]
    }

    /// Lift coefficient at an arbitrary angle and Reynolds number, linear in
    /// alpha and in log10(Re).
    pub fn cl_at(&self, alpha: f64, span: usize, re: f64, delta_slot: usize) -> BladeResult<f64> {
        self.coeff_at(&self.cl, alpha, span, re, delta_slot)
    }

    pub fn cd_at(&self, alpha: f64, span: usize, re: f64, delta_slot: usize) -> BladeResult<f64> {
        self.coeff_at(&self.cd, alpha, span, re, delta_slot)
    }

    pub fn cm_at(&self, alpha: f64, span: usize, re: f64, delta_slot: usize) -> BladeResult<f64> {
        self.coeff_at(&self.cm, alpha, span, re, delta_slot)
    }

    fn coeff_at(
        &self,
        table: &Array4<f64>,
        alpha: f64,
        span: usize,
        re: f64,
        delta_slot: usize,
    ) -> BladeResult<f64> {
        if span >= self.n_span() || delta_slot >= self.delta.len() {
            return Err(BladeError::invalid_input(
                "polar lookup",
                format!("span {span}, slot {delta_slot}"),
                "index outside the polar table",
            ));
        }
        let (k0, k1, t) = self.re_bracket(re);
        let col = |k: usize| -> BladeResult<f64> {
            let ys: Vec<f64> = (0..self.alpha.len())
                .map(|a| table[[a, span, k, delta_slot]])
                .collect();
            interp_linear(&self.alpha, &ys, alpha)
        };
        let (y0, y1) = (col(k0)?, col(k1)?);
        Ok(y0 + t * (y1 - y0))
    }

    /// Bracketing Reynolds columns and the log10 interpolation weight.
    fn re_bracket(&self, re: f64) -> (usize, usize, f64) {
        let n = self.re.len();
        if re <= self.re[0] {
            return (0, 0, 0.0);
        }
        if re >= self.re[n - 1] {
            return (n - 1, n - 1, 0.0);
        }
        let k = self.re.partition_point(|&v| v <= re) - 1;
        let (l0, l1) = (self.re[k].log10(), self.re[k + 1].log10());
        let t = (re.log10() - l0) / (l1 - l0);
        (k, k + 1, t)
    }
}

/// Resamples solver/reference polar rows onto the canonical angle grid
/// (rad), clamping outside the measured range.
fn resample_rows(
    alpha_rad: &[f64],
    grid: &[f64],
    values: &[f64],
) -> BladeResult<Vec<f64>> {
    alpha_rad
        .iter()
        .map(|&a| interp_linear(grid, values, a))
        .collect()
}

/// Averages the ±180° endpoints so the polar closes periodically.
fn close_periodic(values: &mut [f64]) {
    if values.len() < 2 {
        return;
    }
    let avg = (values[0] + values[values.len() - 1]) / 2.0;
    values[0] = avg;
    let n = values.len();
    values[n - 1] = avg;
}

struct ReferencePolars {
    relative_thickness: f64,
    /// Per canonical Reynolds column (unpadded): cl, cd, cm on the alpha
    /// grid.
    cl: Vec<Vec<f64>>,
    cd: Vec<Vec<f64>>,
    cm: Vec<Vec<f64>>,
}

/// Builds the undeflected polar table for every span station.
///
/// `flap_slots` reserves that many deflection slots beyond slot 0, each
/// initialized with the undeflected polar.
pub fn build_polar_set(
    airfoils: &[&AirfoilDef],
    rthick: &[f64],
    flap_slots: usize,
) -> BladeResult<PolarSet> {
    // deduplicate by thickness, first declaration wins
    let mut refs: Vec<&AirfoilDef> = Vec::new();
    for af in airfoils {
        if !refs
            .iter()
            .any(|r| approx_eq(r.relative_thickness, af.relative_thickness))
        {
            refs.push(af);
        }
    }
    // canonical angle grid: the outermost reference's declared grid with the
    // endpoints forced to exactly ±pi
    let outer = refs
        .iter()
        .rev()
        .find(|af| !af.polars.is_empty())
        .ok_or_else(|| BladeError::malformed("no airfoil declares any polar"))?;
    let mut alpha = outer.polars[0].c_l.grid.clone();
    if alpha.len() < 2 {
        return Err(BladeError::malformed(format!(
            "airfoil '{}' polar grid needs at least 2 angles",
            outer.name
        )));
    }
    alpha.sort_by(|a, b| a.total_cmp(b));
    let n_last = alpha.len() - 1;
    alpha[0] = -std::f64::consts::PI;
    alpha[n_last] = std::f64::consts::PI;

    refs.sort_by(|a, b| {
        a.relative_thickness
            .partial_cmp(&b.relative_thickness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // canonical Reynolds axis before padding
    let mut re_core: Vec<f64> = refs
        .iter()
        .flat_map(|af| af.polars.iter())
        .map(|p| p.re)
        .collect();
    re_core.sort_by(|a, b| a.total_cmp(b));
    re_core.dedup_by(|a, b| approx_eq(*a, *b));

    let mut prepared = Vec::with_capacity(refs.len());
    for af in &refs {
        prepared.push(prepare_reference(af, &alpha, &re_core)?);
    }

    let n_alpha = alpha.len();
    let n_span = rthick.len();
    let n_re = re_core.len() + 2;
    let n_delta = flap_slots + 1;
    let thk: Vec<f64> = prepared.iter().map(|r| r.relative_thickness).collect();
    let (thk_min, thk_max) = (thk[0], thk[thk.len() - 1]);

    let mut cl = Array4::zeros((n_alpha, n_span, n_re, n_delta));
    let mut cd = Array4::zeros((n_alpha, n_span, n_re, n_delta));
    let mut cm = Array4::zeros((n_alpha, n_span, n_re, n_delta));

    for (ri_core, _) in re_core.iter().enumerate() {
        for ai in 0..n_alpha {
            let blend = |pick: &dyn Fn(&ReferencePolars) -> f64| -> BladeResult<Vec<f64>> {
                if prepared.len() == 1 {
                    return Ok(vec![pick(&prepared[0]); n_span]);
                }
                let ys: Vec<f64> = prepared.iter().map(|r| pick(r)).collect();
                let spline = Pchip::new(&thk, &ys)?;
                Ok(rthick
                    .iter()
                    .map(|&t| spline.eval(t.clamp(thk_min, thk_max)))
                    .collect())
            };
            let cls = blend(&|r| r.cl[ri_core][ai])?;
            let cds = blend(&|r| r.cd[ri_core][ai])?;
            let cms = blend(&|r| r.cm[ri_core][ai])?;

            // padded Reynolds columns duplicate the boundary columns
            let cols: Vec<usize> = if ri_core == 0 && re_core.len() == 1 {
                (0..n_re).collect()
            } else if ri_core == 0 {
                vec![0, 1]
            } else if ri_core == re_core.len() - 1 {
                vec![ri_core + 1, n_re - 1]
            } else {
                vec![ri_core + 1]
            };
            for si in 0..n_span {
                for &ci in &cols {
                    for di in 0..n_delta {
                        cl[[ai, si, ci, di]] = cls[si];
                        cd[[ai, si, ci, di]] = cds[si];
                        cm[[ai, si, ci, di]] = cms[si];
                    }
                }
            }
        }
    }

    let mut re = Vec::with_capacity(n_re);
    re.push(RE_PAD_LOW);
    re.extend_from_slice(&re_core);
    re.push(RE_PAD_HIGH);

    Ok(PolarSet {
        alpha,
        re,
        delta: vec![0.0; n_delta],
        cl,
        cd,
        cm,
    })
}

/// Resamples one reference airfoil's polars onto the canonical angle grid
/// and fills every canonical Reynolds column, interpolating linearly in
/// log10(Re) between the Reynolds numbers it actually declares.
fn prepare_reference(
    af: &AirfoilDef,
    alpha: &[f64],
    re_core: &[f64],
) -> BladeResult<ReferencePolars> {
    if af.polars.is_empty() {
        return Err(BladeError::malformed(format!(
            "airfoil '{}' declares no polars",
            af.name
        )));
    }
    let mut own: Vec<(f64, Vec<f64>, Vec<f64>, Vec<f64>)> = Vec::new();
    for p in &af.polars {
        let mut cl = resample_rows(alpha, &p.c_l.grid, &p.c_l.values)?;
        let mut cd = resample_rows(alpha, &p.c_d.grid, &p.c_d.values)?;
        let mut cm = resample_rows(alpha, &p.c_m.grid, &p.c_m.values)?;
        close_periodic(&mut cl);
        close_periodic(&mut cd);
        close_periodic(&mut cm);
        own.push((p.re, cl, cd, cm));
    }
    own.sort_by(|a, b| a.0.total_cmp(&b.0));

    let pick = |target: f64, idx: usize| -> Vec<f64> {
        let get = |k: usize| match idx {
            0 => &own[k].1,
            1 => &own[k].2,
            _ => &own[k].3,
        };
        if target <= own[0].0 {
            return get(0).clone();
        }
        if target >= own[own.len() - 1].0 {
            return get(own.len() - 1).clone();
        }
        let k = own.partition_point(|o| o.0 <= target) - 1;
        let (l0, l1) = (own[k].0.log10(), own[k + 1].0.log10());
        let t = (target.log10() - l0) / (l1 - l0);
        get(k)
            .iter()
            .zip(get(k + 1))
            .map(|(a, b)| a + t * (b - a))
            .collect()
    };

    let mut cl = Vec::with_capacity(re_core.len());
    let mut cd = Vec::with_capacity(re_core.len());
    let mut cm = Vec::with_capacity(re_core.len());
    for &r in re_core {
        cl.push(pick(r, 0));
        cd.push(pick(r, 1));
        cm.push(pick(r, 2));
    }
    Ok(ReferencePolars {
        relative_thickness: af.relative_thickness,
        cl,
        cd,
        cm,
    })
}

/// Computes flap-deflected polars for every station inside the flap span and
/// writes them into the deflection slots of the table.
///
/// The local flow state comes from the assembly scalars: section speed is
/// the tip speed scaled by span fraction, giving the Reynolds and Mach
/// numbers for the sweep. Raw sweeps get the 3-D rotational correction and
/// the ±180° extrapolation before resampling onto the table grid.
#[allow(clippy::too_many_arguments)]
pub fn add_flap_polars(
    set: &mut PolarSet,
    family: &ProfileFamily,
    flap: &TeFlap,
    planform: &Planform,
    assembly: &Assembly,
    air: &AirData,
    solver: &dyn FlowSolver,
    corrector: &dyn PolarCorrector,
    config: &GeometryConfig,
) -> BladeResult<()> {
    let n_span = planform.n_span();
    if set.n_span() != n_span {
        return Err(BladeError::internal(
            "polar table span axis does not match the planform",
        ));
    }

    let mut delta_written = false;
    for i in 0..n_span {
        let s = planform.s[i];
        if s < flap.span_start || s > flap.span_end {
            continue;
        }

        let speed = assembly.max_ts * s;
        let reynolds = speed * planform.chord[i] / air.kin_visc;
        let mach = speed / air.speed_sound;
        log::info!(
            "flap polars at s={s:.3}: Re={reynolds:.3e}, Ma={mach:.3}, {} deflections",
            flap.num_delta
        );

        let station =
            crate::profile::deflected_profiles(family.station(i)?, flap, solver, config)?;
        if !delta_written {
            set.delta = std::iter::once(0.0)
                .chain(station.angles_deg.iter().map(|a| a.to_radians()))
                .collect();
            delta_written = true;
        }

        for (k, profile) in station.profiles.iter().enumerate() {
            let slot = k + 1;
            if slot >= set.cl.shape()[3] {
                return Err(BladeError::internal(
                    "flap deflection slot outside the polar table",
                ));
            }
            let rows = solver.polar_sweep(&profile.points, &SweepRequest::standard(reynolds, mach))?;
            if rows.len() < 2 {
                log::warn!(
                    "no usable flap polar at s={s:.3}, deflection {:.1} deg; keeping the \
                     undeflected polar",
                    station.angles_deg[k]
                );
                continue;
            }
            let corrected = corrector.correct_3d(
                &rows,
                s,
                planform.chord[i] / planform.tip_radius().max(1e-9),
                assembly.tsr,
            );
            let extended = corrector.extrapolate(&corrected, config.cd_max);
            write_rows(set, &extended, i, slot)?;
        }
    }
    Ok(())
}

/// Resamples corrected polar rows (degrees) onto the table's angle grid and
/// stores them across every Reynolds column of the given slot.
fn write_rows(set: &mut PolarSet, rows: &[PolarRow], span: usize, slot: usize) -> BladeResult<()> {
    let grid: Vec<f64> = rows.iter().map(|r| r.alpha_deg.to_radians()).collect();
    let mut cl = resample_rows(&set.alpha, &grid, &rows.iter().map(|r| r.cl).collect::<Vec<_>>())?;
    let mut cd = resample_rows(&set.alpha, &grid, &rows.iter().map(|r| r.cd).collect::<Vec<_>>())?;
    let mut cm = resample_rows(&set.alpha, &grid, &rows.iter().map(|r| r.cm).collect::<Vec<_>>())?;
    close_periodic(&mut cl);
    close_periodic(&mut cd);
    close_periodic(&mut cm);

    let n_re = set.re.len();
    for ai in 0..set.alpha.len() {
        for ri in 0..n_re {
            set.cl[[ai, span, ri, slot]] = cl[ai];
            set.cd[[ai, span, ri, slot]] = cd[ai];
            set.cm[[ai, span, ri, slot]] = cm[ai];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::NoCorrection;
    use crate::interp::linspace;
    use crate::ontology::{AirfoilCoordinates, GridValues, PolarDef};
    use crate::profile::AirfoilProfile;
    use std::f64::consts::PI;

    fn polar(re: f64, cl_scale: f64) -> PolarDef {
        let grid = vec![-PI, -0.3, 0.0, 0.3, PI];
        PolarDef {
            re,
            c_l: GridValues::new(grid.clone(), vec![0.1, -cl_scale, 0.0, cl_scale, 0.0]),
            c_d: GridValues::new(grid.clone(), vec![0.5, 0.02, 0.01, 0.02, 0.5]),
            c_m: GridValues::new(grid, vec![0.0, -0.05, -0.05, -0.05, 0.0]),
        }
    }

    fn airfoil(name: &str, thk: f64, polars: Vec<PolarDef>) -> AirfoilDef {
        AirfoilDef {
            name: name.into(),
            relative_thickness: thk,
            coordinates: AirfoilCoordinates::default(),
            polars,
        }
    }

    #[test]
    fn test_table_shape_and_padding() {
        let thin = airfoil("thin", 0.18, vec![polar(1e6, 1.0), polar(5e6, 1.2)]);
        let thick = airfoil("thick", 0.4, vec![polar(1e6, 0.8)]);
        let set = build_polar_set(&[&thin, &thick], &[0.18, 0.3, 0.4], 0).unwrap();

        assert_eq!(set.re.len(), 4); // 2 cores + 2 pads
        assert_eq!(set.re[0], RE_PAD_LOW);
        assert_eq!(set.re[3], RE_PAD_HIGH);
        assert_eq!(set.cl.shape()[1], 3);
        assert_eq!(set.cl.shape()[3], 1);

        // pads duplicate the boundary columns
        for ai in 0..set.alpha.len() {
            assert_eq!(set.cl[[ai, 0, 0, 0]], set.cl[[ai, 0, 1, 0]]);
            assert_eq!(set.cl[[ai, 0, 3, 0]], set.cl[[ai, 0, 2, 0]]);
        }
    }

    #[test]
    fn test_alpha_grid_comes_from_outermost_reference() {
        // the root airfoil declares a denser angle grid; the table's angle
        // axis follows the outermost airfoil's declared grid with the
        // endpoints forced to exactly ±pi
        let dense_grid = vec![-PI, -1.0, -0.5, -0.2, 0.0, 0.2, 0.5, 1.0, PI];
        let dense = PolarDef {
            re: 1e6,
            c_l: GridValues::new(dense_grid.clone(), vec![0.0; 9]),
            c_d: GridValues::new(dense_grid.clone(), vec![0.02; 9]),
            c_m: GridValues::new(dense_grid, vec![0.0; 9]),
        };
        let root = airfoil("root", 0.4, vec![dense]);
        let tip = airfoil("tip", 0.18, vec![polar(1e6, 1.0)]);
        let set = build_polar_set(&[&root, &tip], &[0.4, 0.18], 0).unwrap();

        assert_eq!(set.alpha.len(), 5);
        assert_eq!(set.alpha[0], -PI);
        assert_eq!(set.alpha[4], PI);
        assert!((set.alpha[1] + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_closure() {
        let af = airfoil("a", 0.2, vec![polar(1e6, 1.0)]);
        let set = build_polar_set(&[&af], &[0.2], 0).unwrap();
        let last = set.alpha.len() - 1;
        for ri in 0..set.re.len() {
            assert_eq!(set.cl[[0, 0, ri, 0]], set.cl[[last, 0, ri, 0]]);
            assert_eq!(set.cd[[0, 0, ri, 0]], set.cd[[last, 0, ri, 0]]);
        }
    }

    #[test]
    fn test_thickness_blend_is_between_references() {
        let thin = airfoil("thin", 0.18, vec![polar(1e6, 1.0)]);
        let thick = airfoil("thick", 0.4, vec![polar(1e6, 0.6)]);
        let set = build_polar_set(&[&thin, &thick], &[0.18, 0.29, 0.4], 0).unwrap();

        let cl_mid = set.cl_at(0.3, 1, 1e6, 0).unwrap();
        let cl_thin = set.cl_at(0.3, 0, 1e6, 0).unwrap();
        let cl_thick = set.cl_at(0.3, 2, 1e6, 0).unwrap();
        assert!(cl_mid <= cl_thin && cl_mid >= cl_thick, "{cl_thick} <= {cl_mid} <= {cl_thin}");
    }

    #[test]
    fn test_re_interpolation_linear_in_log() {
        let af = airfoil("a", 0.2, vec![polar(1e5, 1.0), polar(1e7, 2.0)]);
        let set = build_polar_set(&[&af], &[0.2], 0).unwrap();

        let at = |re: f64| set.cl_at(0.3, 0, re, 0).unwrap();
        // geometric midpoint of the Reynolds range is the arithmetic
        // midpoint of the coefficients
        let mid = at(1e6);
        assert!((mid - (at(1e5) + at(1e7)) / 2.0).abs() < 1e-9);
    }

    struct StubSolver;

    impl FlowSolver for StubSolver {
        fn polar_sweep(
            &self,
            _profile: &[[f64; 2]],
            _req: &SweepRequest,
        ) -> BladeResult<Vec<PolarRow>> {
            Ok((-180..=180)
                .step_by(5)
                .map(|a| PolarRow {
                    alpha_deg: a as f64,
                    cl: 2.0,
                    cd: 0.1,
                    cm: -0.1,
                })
                .collect())
        }

        fn deflected_profile(
            &self,
            profile: &[[f64; 2]],
            _hinge_chord: f64,
            _deflection_deg: f64,
            _n_points: usize,
        ) -> BladeResult<Vec<[f64; 2]>> {
            Ok(profile.to_vec())
        }
    }

    #[test]
    fn test_flap_polars_fill_slots_inside_span_only() {
        let af = airfoil("a", 0.2, vec![polar(1e6, 1.0)]);
        let n = 5;
        let mut set = build_polar_set(&[&af], &vec![0.2; n], 2).unwrap();
        assert_eq!(set.cl.shape()[3], 3);

        let planform = Planform {
            s: linspace(0.0, 1.0, n),
            chord: vec![2.0; n],
            twist_deg: vec![0.0; n],
            p_le: vec![0.5; n],
            r: linspace(0.0, 60.0, n),
            precurve: vec![0.0; n],
            presweep: vec![0.0; n],
            rthick: vec![0.2; n],
        };
        let family = ProfileFamily {
            stations: vec![
                AirfoilProfile {
                    points: vec![[1.0, 0.0], [0.5, 0.1], [0.0, 0.0], [0.5, -0.1], [1.0, 0.0]],
                };
                n
            ],
        };
        let flap = TeFlap {
            span_start: 0.7,
            span_end: 1.0,
            chord_start: 0.8,
            delta_max_neg: -0.17,
            delta_max_pos: 0.17,
            num_delta: 2,
        };
        let assembly = Assembly {
            tsr: 9.0,
            max_ts: 80.0,
        };
        add_flap_polars(
            &mut set,
            &family,
            &flap,
            &planform,
            &assembly,
            &AirData::default(),
            &StubSolver,
            &NoCorrection,
            &GeometryConfig::default(),
        )
        .unwrap();

        assert_eq!(set.delta.len(), 3);
        assert!((set.delta[1] + 0.17).abs() < 1e-9);

        // inside the flap span the deflected slot holds the stub polar
        let inside = set.cl_at(0.1, 4, 1e6, 1).unwrap();
        assert!((inside - 2.0).abs() < 1e-9);
        // outside it still holds the undeflected copy
        let outside = set.cl_at(0.3, 1, 1e6, 1).unwrap();
        let undeflected = set.cl_at(0.3, 1, 1e6, 0).unwrap();
        assert!((outside - undeflected).abs() < 1e-12);
    }
}
