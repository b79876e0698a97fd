//! # Planform Control Points
//!
//! Optimization loops do not move every grid station; they move a handful of
//! control points and regenerate the planform from them. The control radii
//! are the blade root, the end of the cylindrical root section, and evenly
//! spaced stations from maximum chord to the tip.

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::interp::{interp_linear, linspace, remap_to_grid, remap_to_value};
use crate::layout::{Layer, Structure};
use crate::ontology::GridValues;
use crate::planform::Planform;

/// Planform and tracked-layer state reduced to a few control radii.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlPoints {
    /// Control radii (normalized span), strictly increasing from 0 to 1.
    pub r: Vec<f64>,
    pub chord: Vec<f64>,
    pub twist_deg: Vec<f64>,
    pub precurve: Vec<f64>,
    pub presweep: Vec<f64>,
    pub rthick: Vec<f64>,
    /// Spar-cap ply thickness at the control radii, 0 outside the layer's
    /// active span range. One schedule drives both spar caps.
    pub spar_thickness: Vec<f64>,
    /// Trailing-edge reinforcement ply thickness at the control radii.
    pub te_thickness: Vec<f64>,
}

impl ControlPoints {
    fn check(&self) -> BladeResult<()> {
        if self.r.len() < 4 {
            return Err(BladeError::invalid_input(
                "ctrl_pts",
                format!("{} radii", self.r.len()),
                "need at least 4 control radii",
            ));
        }
        if self.r.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BladeError::invalid_input(
                "ctrl_pts",
                "non-monotonic radii",
                "control radii must be strictly increasing",
            ));
        }
        for (name, v) in [
            ("chord", &self.chord),
            ("twist_deg", &self.twist_deg),
            ("precurve", &self.precurve),
            ("presweep", &self.presweep),
            ("rthick", &self.rthick),
            ("spar_thickness", &self.spar_thickness),
            ("te_thickness", &self.te_thickness),
        ] {
            if v.len() != self.r.len() {
                return Err(BladeError::invalid_input(
                    name,
                    format!("{} values", v.len()),
                    "control values must match the number of radii",
                ));
            }
        }
        Ok(())
    }
}

/// Fits control points to a resampled planform and to the tracked
/// structural layers.
///
/// The radii are `[0, r_cylinder, linspace(r_max_chord, 1, n - 2)]` where
/// `r_cylinder` is the outermost station still at cylinder thickness and
/// `r_max_chord` the station of maximum chord. Spar-cap and trailing-edge
/// reinforcement thickness is sampled from the layers' native schedules,
/// 0 where the layer does not extend. Every tracked layer named by the
/// config must exist.
pub fn fit(
    planform: &Planform,
    structure: &Structure,
    config: &GeometryConfig,
) -> BladeResult<ControlPoints> {
    let n = config.n_ctrl_pts;
    if n < 4 {
        return Err(BladeError::invalid_input(
            "n_ctrl_pts",
            format!("{n}"),
            "need at least 4 control points",
        ));
    }

    let i_max_chord = planform
        .chord
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let r_max_chord = planform.s[i_max_chord];

    let r_cylinder = cylinder_end(planform, i_max_chord, r_max_chord)?;

    let mut r = Vec::with_capacity(n);
    r.push(0.0);
    r.push(r_cylinder);
    r.extend(linspace(r_max_chord, 1.0, n - 2));

    let at = |values: &[f64]| -> BladeResult<Vec<f64>> {
        r.iter()
            .map(|&ri| remap_to_value(&planform.s, values, ri))
            .collect()
    };

    if config.spar_layers.is_empty() {
        return Err(BladeError::invalid_input(
            "spar_layers",
            "<empty>",
            "need at least one spar cap layer name",
        ));
    }
    for name in tracked_names(config) {
        tracked_layer(structure, name)?;
    }
    let spar = sample_thickness(tracked_layer(structure, &config.spar_layers[0])?, &r)?;
    let te = sample_thickness(tracked_layer(structure, &config.te_layer)?, &r)?;

    let ctrl = ControlPoints {
        chord: at(&planform.chord)?,
        twist_deg: at(&planform.twist_deg)?,
        precurve: at(&planform.precurve)?,
        presweep: at(&planform.presweep)?,
        rthick: at(&planform.rthick)?,
        spar_thickness: spar,
        te_thickness: te,
        r,
    };
    ctrl.check()?;
    Ok(ctrl)
}

fn tracked_names(config: &GeometryConfig) -> impl Iterator<Item = &str> {
    config
        .spar_layers
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(config.te_layer.as_str()))
}

fn tracked_layer<'a>(structure: &'a Structure, name: &str) -> BladeResult<&'a Layer> {
    structure
        .layers
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| BladeError::layer_not_found(name))
}

/// Samples a layer's native thickness schedule at the control radii; radii
/// outside the schedule's span range read 0 (the layer is absent there).
fn sample_thickness(layer: &Layer, r: &[f64]) -> BladeResult<Vec<f64>> {
    let Some(gv) = &layer.thickness else {
        return Ok(vec![0.0; r.len()]);
    };
    if gv.grid.len() < 2 {
        return Ok(vec![0.0; r.len()]);
    }
    let (lo, hi) = (gv.grid[0], gv.grid[gv.grid.len() - 1]);
    r.iter()
        .map(|&ri| {
            if ri < lo || ri > hi {
                Ok(0.0)
            } else {
                remap_to_value(&gv.grid, &gv.values, ri)
            }
        })
        .collect()
}

/// Writes the control-point thickness schedules back onto the tracked
/// structural layers, remapped over the full spanwise grid. The spar-cap
/// schedule is applied to every spar layer the config names.
pub fn apply_thickness(
    ctrl: &ControlPoints,
    structure: &mut Structure,
    s: &[f64],
    config: &GeometryConfig,
) -> BladeResult<()> {
    ctrl.check()?;
    let spar = remap_to_grid(&ctrl.r, &ctrl.spar_thickness, s)?;
    for name in &config.spar_layers {
        set_thickness(structure, name, s, &spar)?;
    }
    let te = remap_to_grid(&ctrl.r, &ctrl.te_thickness, s)?;
    set_thickness(structure, &config.te_layer, s, &te)
}

fn set_thickness(
    structure: &mut Structure,
    name: &str,
    s: &[f64],
    values: &[f64],
) -> BladeResult<()> {
    let layer = structure
        .layers
        .iter_mut()
        .find(|l| l.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| BladeError::layer_not_found(name))?;
    layer.thickness = Some(GridValues::new(s.to_vec(), values.to_vec()));
    Ok(())
}

/// Radius where the cylindrical root section ends.
///
/// The outermost station still at cylinder thickness wins. When no station is
/// exactly cylindrical, the relative-thickness distribution over the root
/// section is inverted at 0.98. A root that is already thinner than that puts
/// the control radius halfway to maximum chord.
fn cylinder_end(planform: &Planform, i_max_chord: usize, r_max_chord: f64) -> BladeResult<f64> {
    if let Some(i) = planform.rthick.iter().rposition(|&t| t >= 1.0 - 1e-3) {
        let r = planform.s[i];
        if r > 0.0 && r < r_max_chord {
            return Ok(r);
        }
    }

    let end = i_max_chord.max(1) + 1;
    let thk = &planform.rthick[..end];
    if thk[0] < 0.98 {
        let r = r_max_chord / 2.0;
        log::debug!("no cylinder section found, placing control radius at {r:.4}");
        return Ok(r);
    }
    // rthick is descending over the root section, interp_linear flips it
    interp_linear(thk, &planform.s[..end], 0.98)
}

/// Regenerates the distributed planform fields from (possibly modified)
/// control points, keeping the spanwise grid unchanged.
pub fn regenerate(ctrl: &ControlPoints, planform: &mut Planform) -> BladeResult<()> {
    ctrl.check()?;
    planform.chord = remap_to_grid(&ctrl.r, &ctrl.chord, &planform.s)?;
    planform.twist_deg = remap_to_grid(&ctrl.r, &ctrl.twist_deg, &planform.s)?;
    planform.precurve = remap_to_grid(&ctrl.r, &ctrl.precurve, &planform.s)?;
    planform.presweep = remap_to_grid(&ctrl.r, &ctrl.presweep, &planform.s)?;
    planform.rthick = remap_to_grid(&ctrl.r, &ctrl.rthick, &planform.s)?
        .iter()
        .map(|t| t.clamp(0.0, 1.0))
        .collect();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Placement;

    fn demo_structure() -> Structure {
        let bounds_layer = |name: &str, grid: Vec<f64>, values: Vec<f64>| Layer {
            name: name.into(),
            material: "ud".into(),
            thickness: Some(GridValues::new(grid, values)),
            fiber_orientation: None,
            placement: Placement::Bounds {
                start: None,
                end: None,
            },
        };
        Structure {
            layers: vec![
                bounds_layer("Spar_Cap_SS", vec![0.1, 0.9], vec![0.04, 0.01]),
                bounds_layer("Spar_Cap_PS", vec![0.1, 0.9], vec![0.04, 0.01]),
                bounds_layer("TE_reinforcement", vec![0.0, 0.95], vec![0.01, 0.005]),
            ],
            webs: vec![],
        }
    }

    fn demo_planform(n: usize) -> Planform {
        let s = linspace(0.0, 1.0, n);
        let chord: Vec<f64> = s
            .iter()
            .map(|&si| {
                if si < 0.25 {
                    2.6 + 3.6 * si
                } else {
                    3.5 - 2.5 / 0.75 * (si - 0.25)
                }
            })
            .collect();
        let rthick: Vec<f64> = s
            .iter()
            .map(|&si| if si <= 0.1 { 1.0 } else { (1.0 - si).max(0.18) })
            .collect();
        Planform {
            twist_deg: s.iter().map(|&si| 14.0 * (1.0 - si)).collect(),
            p_le: vec![0.4; n],
            r: s.iter().map(|&si| si * 60.0).collect(),
            precurve: vec![0.0; n],
            presweep: vec![0.0; n],
            chord,
            rthick,
            s,
        }
    }

    #[test]
    fn test_fit_radii_structure() {
        let pf = demo_planform(41);
        let cfg = GeometryConfig::default();
        let ctrl = fit(&pf, &demo_structure(), &cfg).unwrap();

        assert_eq!(ctrl.r.len(), cfg.n_ctrl_pts);
        assert_eq!(ctrl.r[0], 0.0);
        assert_eq!(*ctrl.r.last().unwrap(), 1.0);
        assert!(ctrl.r.windows(2).all(|w| w[1] > w[0]));
        // second radius is the cylinder end, third the max-chord station
        assert!((ctrl.r[1] - 0.1).abs() < 0.03);
        assert!((ctrl.r[2] - 0.25).abs() < 0.03);
        assert!((ctrl.chord[2] - 3.5).abs() < 0.05);
    }

    #[test]
    fn test_regenerate_scales_with_control_values() {
        let mut pf = demo_planform(41);
        let cfg = GeometryConfig::default();
        let mut ctrl = fit(&pf, &demo_structure(), &cfg).unwrap();

        for c in &mut ctrl.chord {
            *c *= 1.2;
        }
        let max_before = pf.chord.iter().cloned().fold(f64::MIN, f64::max);
        regenerate(&ctrl, &mut pf).unwrap();
        let max_after = pf.chord.iter().cloned().fold(f64::MIN, f64::max);
        assert!(max_after > max_before * 1.1);
        assert_eq!(pf.chord.len(), pf.s.len());
    }

    #[test]
    fn test_regenerate_rejects_mismatched_lengths() {
        let mut pf = demo_planform(21);
        let cfg = GeometryConfig::default();
        let mut ctrl = fit(&pf, &demo_structure(), &cfg).unwrap();
        ctrl.chord.pop();
        assert!(regenerate(&ctrl, &mut pf).is_err());
    }

    #[test]
    fn test_fit_without_cylinder_section() {
        let mut pf = demo_planform(41);
        for t in &mut pf.rthick {
            *t = (*t).min(0.9);
        }
        let ctrl = fit(&pf, &demo_structure(), &GeometryConfig::default()).unwrap();
        assert!(ctrl.r.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_fit_samples_tracked_thickness() {
        let pf = demo_planform(41);
        let cfg = GeometryConfig::default();
        let ctrl = fit(&pf, &demo_structure(), &cfg).unwrap();

        assert_eq!(ctrl.spar_thickness.len(), ctrl.r.len());
        assert_eq!(ctrl.te_thickness.len(), ctrl.r.len());
        // the root radius sits outside the spar cap's active range
        assert_eq!(ctrl.spar_thickness[0], 0.0);
        assert!(ctrl.spar_thickness[2] > 0.0);
        // the TE schedule starts at the root
        assert!((ctrl.te_thickness[0] - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_fit_rejects_missing_tracked_layer() {
        let pf = demo_planform(41);
        let mut structure = demo_structure();
        structure.layers.retain(|l| l.name != "TE_reinforcement");
        let err = fit(&pf, &structure, &GeometryConfig::default()).unwrap_err();
        assert!(matches!(err, BladeError::LayerNotFound { .. }));
    }

    #[test]
    fn test_apply_thickness_writes_full_grid_schedules() {
        let pf = demo_planform(41);
        let cfg = GeometryConfig::default();
        let mut structure = demo_structure();
        let mut ctrl = fit(&pf, &structure, &cfg).unwrap();
        for t in &mut ctrl.spar_thickness {
            *t *= 2.0;
        }
        apply_thickness(&ctrl, &mut structure, &pf.s, &cfg).unwrap();

        for name in ["Spar_Cap_SS", "Spar_Cap_PS"] {
            let layer = structure.layers.iter().find(|l| l.name == name).unwrap();
            let gv = layer.thickness.as_ref().unwrap();
            assert_eq!(gv.grid, pf.s);
            // mid-span thickness follows the doubled control values
            let mid = gv.values[gv.values.len() / 2];
            assert!(mid > 0.03, "spar thickness not applied: {mid}");
        }
    }

    #[test]
    fn test_regenerate_is_deterministic_for_fixed_control_points() {
        let mut pf = demo_planform(41);
        let cfg = GeometryConfig::default();
        let ctrl = fit(&pf, &demo_structure(), &cfg).unwrap();

        regenerate(&ctrl, &mut pf).unwrap();
        let first = pf.clone();
        regenerate(&ctrl, &mut pf).unwrap();

        assert_eq!(pf.chord, first.chord);
        assert_eq!(pf.twist_deg, first.twist_deg);
        assert_eq!(pf.precurve, first.precurve);
        assert_eq!(pf.presweep, first.presweep);
        assert_eq!(pf.rthick, first.rthick);
    }
}
