//! # External Flow Solver Interface
//!
//! The pipeline needs a boundary-layer solver twice: to generate
//! flap-deflected profile coordinates and to compute polars for those
//! profiles. Both are external concerns, reached through the [`FlowSolver`]
//! trait so tests and optimization loops can inject stand-ins.
//!
//! [`XfoilRunner`] is the production implementation: a blocking subprocess
//! per request with file-based I/O. Non-convergence is handled by a bounded
//! retry loop that raises the panel count, and a failed minimum-angle sweep
//! triggers a preliminary low-resolution descent to seed the solution before
//! the recorded run.
//!
//! Post-processing of raw polars (3-D rotational correction, stall-region
//! extrapolation to ±180°) belongs to an external polar library; the
//! [`PolarCorrector`] trait captures its contract.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::errors::{BladeError, BladeResult};

/// One row of a computed polar. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarRow {
    pub alpha_deg: f64,
    pub cl: f64,
    pub cd: f64,
    pub cm: f64,
}

/// An angle-of-attack sweep request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepRequest {
    pub reynolds: f64,
    pub mach: f64,
    pub aoa_min_deg: f64,
    pub aoa_max_deg: f64,
    pub aoa_step_deg: f64,
}

impl SweepRequest {
    /// Standard sweep used for flap polars.
    pub fn standard(reynolds: f64, mach: f64) -> Self {
        Self {
            reynolds,
            mach,
            aoa_min_deg: -20.0,
            aoa_max_deg: 25.0,
            aoa_step_deg: 0.5,
        }
    }

    /// Reduced minimum angle for thin outboard sections that refuse to
    /// converge down to -20 degrees.
    pub fn outboard(reynolds: f64, mach: f64) -> Self {
        Self {
            aoa_min_deg: -13.5,
            ..Self::standard(reynolds, mach)
        }
    }
}

/// Boundary-layer solver contract: profile geometry in, polar rows out.
pub trait FlowSolver {
    /// Runs an angle-of-attack sweep on the given unit-chord profile.
    fn polar_sweep(&self, profile: &[[f64; 2]], req: &SweepRequest) -> BladeResult<Vec<PolarRow>>;

    /// Generates profile coordinates with a trailing-edge flap deflected by
    /// `deflection_deg` about a hinge at `hinge_chord` fraction of chord.
    fn deflected_profile(
        &self,
        profile: &[[f64; 2]],
        hinge_chord: f64,
        deflection_deg: f64,
        n_points: usize,
    ) -> BladeResult<Vec<[f64; 2]>>;
}

/// Polar post-processing contract (external correction library).
pub trait PolarCorrector {
    /// Applies the 3-D rotational (stall-delay) correction for a rotating
    /// blade section at `r_over_r` span fraction with chord ratio `c_over_r`
    /// and tip-speed ratio `tsr`.
    fn correct_3d(
        &self,
        rows: &[PolarRow],
        r_over_r: f64,
        c_over_r: f64,
        tsr: f64,
    ) -> Vec<PolarRow>;

    /// Extrapolates a measured sweep to the full ±180° range using a
    /// flat-plate model capped at `cd_max`.
    fn extrapolate(&self, rows: &[PolarRow], cd_max: f64) -> Vec<PolarRow>;
}

/// Identity corrector: returns polars unchanged. Useful when the external
/// correction library is unavailable and in tests.
#[derive(Debug, Clone, Default)]
pub struct NoCorrection;

impl PolarCorrector for NoCorrection {
    fn correct_3d(&self, rows: &[PolarRow], _: f64, _: f64, _: f64) -> Vec<PolarRow> {
        rows.to_vec()
    }

    fn extrapolate(&self, rows: &[PolarRow], _cd_max: f64) -> Vec<PolarRow> {
        rows.to_vec()
    }
}

// Panel discretization bounds for the retry loop.
const PANELS_INITIAL: usize = 310;
const PANELS_STEP: usize = 50;
const PANELS_MAX: usize = 480;

// Acceptance thresholds: the sweep must reach positive stall, hold enough
// rows for interpolation, and contain the negative-stall region.
const ACCEPT_MAX_AOA: f64 = 19.0;
const ACCEPT_MIN_ROWS: usize = 40;
const ACCEPT_MIN_AOA: f64 = -12.5;

/// Blocking XFOIL subprocess driver with temp-file I/O.
#[derive(Debug, Clone)]
pub struct XfoilRunner {
    executable: String,
    work_dir: PathBuf,
    iter_limit: usize,
}

impl XfoilRunner {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            work_dir: std::env::temp_dir(),
            iter_limit: 10,
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    fn write_profile(&self, profile: &[[f64; 2]]) -> BladeResult<PathBuf> {
        let path = self.path("airfoil.txt");
        let body: String = profile
            .iter()
            .map(|p| format!("{:.6} {:.6}\n", p[0], p[1]))
            .collect();
        fs::write(&path, body)
            .map_err(|e| BladeError::file_error("write", path.display().to_string(), e.to_string()))?;
        Ok(path)
    }

    fn run_script(&self, script: &str) -> BladeResult<()> {
        let script_path = self.path("solver_input.txt");
        fs::write(&script_path, script).map_err(|e| {
            BladeError::file_error("write", script_path.display().to_string(), e.to_string())
        })?;

        let input = fs::File::open(&script_path).map_err(|e| {
            BladeError::file_error("open", script_path.display().to_string(), e.to_string())
        })?;
        let status = Command::new(&self.executable)
            .current_dir(&self.work_dir)
            .stdin(Stdio::from(input))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| BladeError::FlowSolver {
                reason: format!("failed to launch '{}': {e}", self.executable),
            })?;
        if !status.success() {
            // XFOIL frequently exits non-zero after an otherwise usable run;
            // the output file decides whether the run counts.
            log::debug!("flow solver exited with {status}");
        }
        Ok(())
    }

    /// Writes the sweep script: load + re-panel + viscous sweep, one ALFA
    /// command per angle so a single unconverged point does not kill the
    /// whole polar.
    fn sweep_script(
        &self,
        req: &SweepRequest,
        panels: usize,
        preliminary_descent: bool,
        polar_name: &str,
    ) -> String {
        let mut s = String::new();
        s.push_str("PLOP\nG\n\n");
        s.push_str("LOAD\nairfoil.txt\n");
        s.push_str("GDES\nUNIT\nEXEC\n\n");
        s.push_str(&format!("PPAR\nN\n{panels}\nP\n1.6\nT\n0.12\nR\n0.08\n\n\n"));
        s.push_str("OPER\nVISC\n");
        s.push_str(&format!("{}\n", req.reynolds));
        s.push_str(&format!("MACH\n{}\n", req.mach));
        s.push_str(&format!("ITER\n{}\n", self.iter_limit));

        if preliminary_descent {
            // unsaved descent to the minimum angle to seed the solution
            let n = ((0.0 - req.aoa_min_deg) / req.aoa_step_deg) as usize + 1;
            for i in 0..n {
                s.push_str(&format!("ALFA {}\n", 0.0 - i as f64 * req.aoa_step_deg));
            }
        }

        s.push_str("PACC\n\n\n");
        let n = ((req.aoa_max_deg - req.aoa_min_deg) / req.aoa_step_deg) as usize + 1;
        for i in 0..n {
            s.push_str(&format!(
                "ALFA {}\n",
                req.aoa_min_deg + i as f64 * req.aoa_step_deg
            ));
        }
        s.push_str(&format!("PWRT\n{polar_name}\n\n"));
        s.push_str("QUIT\n");
        s
    }

    /// Parses the saved polar table, skipping the 12-line header.
    fn parse_polar(&self, polar_name: &str) -> Vec<PolarRow> {
        let path = self.path(polar_name);
        let Ok(text) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        text.lines()
            .skip(12)
            .filter_map(|line| {
                let cols: Vec<f64> = line
                    .split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect();
                // columns: alpha, cl, cd, cdp, cm, ...
                if cols.len() >= 5 {
                    Some(PolarRow {
                        alpha_deg: cols[0],
                        cl: cols[1],
                        cd: cols[2],
                        cm: cols[4],
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    fn cleanup(&self, names: &[&str]) {
        for name in names {
            let _ = fs::remove_file(self.path(name));
        }
    }
}

impl FlowSolver for XfoilRunner {
    fn polar_sweep(&self, profile: &[[f64; 2]], req: &SweepRequest) -> BladeResult<Vec<PolarRow>> {
        self.write_profile(profile)?;

        let polar_name = "polar_out.txt";
        let mut panels = PANELS_INITIAL;
        let mut preliminary_descent = false;
        let mut best: Vec<PolarRow> = Vec::new();

        loop {
            self.cleanup(&[polar_name]);
            let script = self.sweep_script(req, panels, preliminary_descent, polar_name);
            self.run_script(&script)?;
            let rows = self.parse_polar(polar_name);

            if rows.len() < 2 {
                // min-angle convergence failure: seed with a descent next try
                preliminary_descent = true;
                log::warn!(
                    "flow solver convergence issues at Re={:.3e} (no usable rows)",
                    req.reynolds
                );
            } else {
                let a_max = rows.last().map(|r| r.alpha_deg).unwrap_or(0.0);
                let a_min = rows.first().map(|r| r.alpha_deg).unwrap_or(0.0);
                if rows.len() > best.len() {
                    best = rows.clone();
                }
                if a_max > ACCEPT_MAX_AOA && rows.len() >= ACCEPT_MIN_ROWS && a_min < ACCEPT_MIN_AOA
                {
                    self.cleanup(&[polar_name, "airfoil.txt", "solver_input.txt"]);
                    return Ok(rows);
                }
            }

            panels += PANELS_STEP;
            if panels > PANELS_MAX {
                log::warn!(
                    "flow solver did not converge at Re={:.3e} after panel refinement to {}; \
                     continuing with best available polar ({} rows)",
                    req.reynolds,
                    PANELS_MAX,
                    best.len()
                );
                self.cleanup(&[polar_name, "airfoil.txt", "solver_input.txt"]);
                return Ok(best);
            }
            log::warn!("refining flow solver paneling to {panels} nodes");
        }
    }

    fn deflected_profile(
        &self,
        profile: &[[f64; 2]],
        hinge_chord: f64,
        deflection_deg: f64,
        n_points: usize,
    ) -> BladeResult<Vec<[f64; 2]>> {
        self.write_profile(profile)?;
        let out_name = "flapped.txt";
        self.cleanup(&[out_name]);

        // GDES flap at (hinge_chord, mid-thickness), re-panel, save buffer
        let mut s = String::new();
        s.push_str("PLOP\nG\n\n");
        s.push_str("LOAD\nairfoil.txt\n");
        s.push_str("GDES\nUNIT\n");
        s.push_str(&format!("FLAP\n{hinge_chord}\n999\n0.5\n{deflection_deg}\n"));
        s.push_str("EXEC\n\n");
        s.push_str(&format!("PPAR\nN\n{n_points}\n\n\n"));
        s.push_str(&format!("SAVE\n{out_name}\n"));
        s.push_str("QUIT\n");
        self.run_script(&s)?;

        let path = self.path(out_name);
        let text = fs::read_to_string(&path).map_err(|e| BladeError::FlowSolver {
            reason: format!("no deflected-profile output: {e}"),
        })?;
        let pts: Vec<[f64; 2]> = text
            .lines()
            .filter_map(|line| {
                let cols: Vec<f64> = line
                    .split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect();
                if cols.len() == 2 {
                    Some([cols[0], cols[1]])
                } else {
                    None
                }
            })
            .collect();
        self.cleanup(&[out_name, "airfoil.txt", "solver_input.txt"]);

        if pts.len() < 3 {
            return Err(BladeError::FlowSolver {
                reason: format!(
                    "deflected-profile output too short ({} points)",
                    pts.len()
                ),
            });
        }
        Ok(pts)
    }
}
