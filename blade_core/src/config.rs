//! # Pipeline Configuration
//!
//! Parameters that control the geometry pipeline: grid sizes, numeric
//! tolerances, geometric clamping limits, and the names of the composite
//! layers whose structural regions are tracked for strain recovery.

use serde::{Deserialize, Serialize};

/// Configuration for the blade geometry pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Number of spanwise control points fitted for optimization loops.
    pub n_ctrl_pts: usize,

    /// Target spanwise grid size. The built grid has exactly this many
    /// points when the composite boundary count allows it.
    pub n_span: usize,

    /// Number of points per interpolated airfoil profile.
    pub n_profile_pts: usize,

    /// Tolerance used to snap near-duplicate spanwise coordinates and to
    /// pull arc boundaries that are numerically close to 0 or 1 onto the
    /// exact endpoint.
    pub snap_tol: f64,

    /// Maximum fraction of the local LE/TE chord distance a layer defined by
    /// rotation+offset may occupy before offset and width are clamped.
    pub max_chord_ratio: f64,

    /// Drag-coefficient cutoff for the stall-region polar extrapolation
    /// applied to flow-solver output.
    pub cd_max: f64,

    /// Names of the spar cap layers, suction side first, then pressure side.
    pub spar_layers: Vec<String>,

    /// Name of the trailing-edge reinforcement layer.
    pub te_layer: String,

    /// Path to the external boundary-layer solver executable. Empty when no
    /// flap polars are requested.
    pub flow_solver_path: String,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            n_ctrl_pts: 5,
            n_span: 50,
            n_profile_pts: 200,
            snap_tol: 1e-8,
            max_chord_ratio: 0.8,
            cd_max: 1.5,
            spar_layers: vec!["Spar_Cap_SS".to_string(), "Spar_Cap_PS".to_string()],
            te_layer: "TE_reinforcement".to_string(),
            flow_solver_path: String::new(),
        }
    }
}

impl GeometryConfig {
    /// Creates a config for quick tests (coarse grids).
    pub fn coarse() -> Self {
        Self {
            n_span: 20,
            n_profile_pts: 80,
            ..Default::default()
        }
    }

    /// Creates a high-resolution config for final structural analysis.
    pub fn fine() -> Self {
        Self {
            n_span: 100,
            n_profile_pts: 400,
            ..Default::default()
        }
    }

    /// Returns true when two spanwise coordinates should be treated as the
    /// same required grid point.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.snap_tol.max(1e-8 * b.abs())
    }
}
