//! # Blade Ontology Input Model
//!
//! Serde model for the blade ontology document (windIO-style YAML): outer
//! aerodynamic shape, internal 2-D FEM structure, reference airfoil library
//! with polars, material library, and the optional trailing-edge flap
//! declaration. Schema validation against the published JSON schema is an
//! external concern; this module only requires the fields the pipeline
//! consumes.
//!
//! Composite layers and webs arrive with heterogeneous boundary definitions
//! (explicit arc bounds, rotation+offset, fixed anchors, references to other
//! layers). Those stay as loosely-typed optional fields here and are lowered
//! onto the typed [`crate::layout::Placement`] union when the structural
//! model is built.

use serde::{Deserialize, Serialize};

use crate::errors::{BladeError, BladeResult};

/// A spanwise-distributed quantity: values on a (possibly partial)
/// normalized span grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GridValues {
    pub grid: Vec<f64>,
    pub values: Vec<f64>,
}

impl GridValues {
    pub fn new(grid: Vec<f64>, values: Vec<f64>) -> Self {
        Self { grid, values }
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// First and last spanwise coordinate, when present.
    pub fn span_range(&self) -> Option<(f64, f64)> {
        match (self.grid.first(), self.grid.last()) {
            (Some(&a), Some(&b)) => Some((a, b)),
            _ => None,
        }
    }
}

/// A quantity that is either a spanwise schedule or fixed to a named
/// reference ("twist" for rotations; a layer name or "LE"/"TE" for arc
/// bounds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScheduleOrRef {
    Fixed { fixed: String },
    Schedule(GridValues),
}

impl ScheduleOrRef {
    pub fn as_schedule(&self) -> Option<&GridValues> {
        match self {
            ScheduleOrRef::Schedule(gv) => Some(gv),
            ScheduleOrRef::Fixed { .. } => None,
        }
    }

    pub fn as_fixed(&self) -> Option<&str> {
        match self {
            ScheduleOrRef::Fixed { fixed } => Some(fixed),
            ScheduleOrRef::Schedule(_) => None,
        }
    }
}

/// Midpoint anchored to the leading or trailing edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedMidpoint {
    pub fixed: String,
}

/// The three reference-axis curves (x: prebend direction, y: sweep,
/// z: radial).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceAxis {
    pub x: GridValues,
    pub y: GridValues,
    pub z: GridValues,
}

/// Spanwise airfoil placement: which reference airfoil governs at which
/// span fraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirfoilPosition {
    pub grid: Vec<f64>,
    pub labels: Vec<String>,
}

/// Outer aerodynamic shape of the blade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OuterShape {
    pub airfoil_position: AirfoilPosition,
    pub chord: GridValues,
    /// Twist in radians, positive toward feather.
    pub twist: GridValues,
    /// Pitch-axis location as fraction of chord from the leading edge.
    pub pitch_axis: GridValues,
    pub reference_axis: ReferenceAxis,
}

/// One composite layer definition as it appears in the ontology. Which
/// boundary convention applies is decided by the populated field combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    #[serde(default)]
    pub material: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiber_orientation: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_nd_arc: Option<ScheduleOrRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_nd_arc: Option<ScheduleOrRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midpoint_nd_arc: Option<FixedMidpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<ScheduleOrRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_x_pa: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// When set, this layer belongs to the named shear web and takes its
    /// bounds from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
}

/// One shear web definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<ScheduleOrRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_y_pa: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_x_pa: Option<GridValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_nd_arc: Option<ScheduleOrRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_nd_arc: Option<ScheduleOrRef>,
}

/// Internal 2-D FEM structure: layers and webs on their own partial grids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternalStructure {
    #[serde(default)]
    pub reference_axis: Option<ReferenceAxis>,
    #[serde(default)]
    pub webs: Vec<WebDef>,
    #[serde(default)]
    pub layers: Vec<LayerDef>,
}

/// Trailing-edge flap device declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeFlap {
    pub span_start: f64,
    pub span_end: f64,
    /// Chord fraction where the flap hinge sits.
    pub chord_start: f64,
    pub delta_max_neg: f64,
    pub delta_max_pos: f64,
    pub num_delta: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AerodynamicControl {
    #[serde(default)]
    pub te_flaps: Vec<TeFlap>,
}

/// The blade component of the ontology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BladeComponent {
    pub outer_shape_bem: OuterShape,
    pub internal_structure_2d_fem: InternalStructure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aerodynamic_control: Option<AerodynamicControl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    pub blade: BladeComponent,
}

/// One polar table at a given Reynolds number. Angle grids are in radians.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolarDef {
    pub re: f64,
    pub c_l: GridValues,
    pub c_d: GridValues,
    pub c_m: GridValues,
}

/// A reference airfoil: point cloud plus polars per Reynolds number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirfoilDef {
    pub name: String,
    pub relative_thickness: f64,
    pub coordinates: AirfoilCoordinates,
    #[serde(default)]
    pub polars: Vec<PolarDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirfoilCoordinates {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Scalar for isotropic materials, one value per principal axis for
/// orthotropic ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScalarOrAxes {
    Scalar(f64),
    Axes(Vec<f64>),
}

impl ScalarOrAxes {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            ScalarOrAxes::Scalar(v) => Some(*v),
            ScalarOrAxes::Axes(_) => None,
        }
    }

    pub fn axis(&self, i: usize) -> Option<f64> {
        match self {
            ScalarOrAxes::Scalar(v) => Some(*v),
            ScalarOrAxes::Axes(v) => v.get(i).copied(),
        }
    }
}

/// Material library entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: String,
    /// True for orthotropic materials (E, G, nu given per principal axis).
    #[serde(default)]
    pub orth: bool,
    pub rho: f64,
    #[serde(rename = "E")]
    pub e: ScalarOrAxes,
    #[serde(rename = "G", skip_serializing_if = "Option::is_none")]
    pub g: Option<ScalarOrAxes>,
    pub nu: ScalarOrAxes,
}

/// Ambient air data needed for flap-polar Reynolds/Mach numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirData {
    /// Kinematic viscosity (m^2/s).
    pub kin_visc: f64,
    /// Speed of sound (m/s).
    pub speed_sound: f64,
}

impl Default for AirData {
    fn default() -> Self {
        Self {
            kin_visc: 1.460e-5,
            speed_sound: 340.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub air_data: AirData,
}

/// Assembly-level configuration scalars carried through to downstream tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assembly {
    /// Tip-speed ratio.
    #[serde(default)]
    pub tsr: f64,
    /// Maximum blade-tip speed (m/s).
    #[serde(default, rename = "maxTS")]
    pub max_ts: f64,
}

/// The full blade ontology document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BladeOntology {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assembly: Assembly,
    pub components: Components,
    #[serde(default)]
    pub environment: Environment,
    pub airfoils: Vec<AirfoilDef>,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
}

impl BladeOntology {
    /// Parses an ontology document from YAML text.
    pub fn from_yaml(text: &str) -> BladeResult<Self> {
        let doc: BladeOntology = serde_yaml::from_str(text)?;
        doc.check_consistency()?;
        Ok(doc)
    }

    /// Loads and parses an ontology document from a file.
    pub fn from_file(path: &str) -> BladeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BladeError::file_error("read", path, e.to_string()))?;
        Self::from_yaml(&text)
    }

    /// Looks up a reference airfoil by name.
    pub fn airfoil(&self, name: &str) -> BladeResult<&AirfoilDef> {
        self.airfoils
            .iter()
            .find(|af| af.name == name)
            .ok_or_else(|| BladeError::airfoil_not_found(name))
    }

    /// Minimal structural sanity checks before the pipeline runs.
    fn check_consistency(&self) -> BladeResult<()> {
        let shape = &self.components.blade.outer_shape_bem;
        if shape.airfoil_position.grid.len() != shape.airfoil_position.labels.len() {
            return Err(BladeError::malformed(
                "airfoil_position grid and labels differ in length",
            ));
        }
        if shape.chord.is_empty() {
            return Err(BladeError::malformed("outer shape has no chord distribution"));
        }
        for label in &shape.airfoil_position.labels {
            if !self.airfoils.iter().any(|af| &af.name == label) {
                return Err(BladeError::airfoil_not_found(label.clone()));
            }
        }
        for field in [&shape.chord, &shape.twist, &shape.pitch_axis] {
            if field.grid.len() != field.values.len() {
                return Err(BladeError::malformed(
                    "outer shape field grid and values differ in length",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
name: demo_blade
assembly:
  tsr: 9.0
  maxTS: 80.0
components:
  blade:
    outer_shape_bem:
      airfoil_position:
        grid: [0.0, 1.0]
        labels: [circle, tip_af]
      chord:
        grid: [0.0, 1.0]
        values: [3.0, 1.0]
      twist:
        grid: [0.0, 1.0]
        values: [0.2, 0.0]
      pitch_axis:
        grid: [0.0, 1.0]
        values: [0.5, 0.35]
      reference_axis:
        x: {grid: [0.0, 1.0], values: [0.0, 0.0]}
        y: {grid: [0.0, 1.0], values: [0.0, 0.0]}
        z: {grid: [0.0, 1.0], values: [0.0, 60.0]}
    internal_structure_2d_fem:
      webs:
        - name: web_fore
          rotation: {fixed: twist}
          offset_x_pa: {grid: [0.1, 0.9], values: [-0.4, -0.2]}
      layers:
        - name: shell_skin
          material: glass_triax
          thickness: {grid: [0.0, 1.0], values: [0.005, 0.002]}
        - name: spar_cap_ss
          material: glass_ud
          thickness: {grid: [0.1, 0.9], values: [0.04, 0.01]}
          rotation: {fixed: twist}
          width: {grid: [0.1, 0.9], values: [0.6, 0.3]}
          side: suction
airfoils:
  - name: circle
    relative_thickness: 1.0
    coordinates:
      x: [1.0, 0.5, 0.0, 0.5, 1.0]
      y: [0.0, 0.5, 0.0, -0.5, 0.0]
    polars:
      - re: 1.0e6
        c_l: {grid: [-3.14159, 3.14159], values: [0.0, 0.0]}
        c_d: {grid: [-3.14159, 3.14159], values: [0.5, 0.5]}
        c_m: {grid: [-3.14159, 3.14159], values: [0.0, 0.0]}
  - name: tip_af
    relative_thickness: 0.18
    coordinates:
      x: [1.0, 0.5, 0.0, 0.5, 1.0]
      y: [0.0, 0.09, 0.0, -0.09, 0.0]
    polars:
      - re: 1.0e6
        c_l: {grid: [-3.14159, 0.0, 3.14159], values: [0.0, 0.5, 0.0]}
        c_d: {grid: [-3.14159, 0.0, 3.14159], values: [0.02, 0.01, 0.02]}
        c_m: {grid: [-3.14159, 0.0, 3.14159], values: [0.0, -0.1, 0.0]}
materials:
  - name: glass_triax
    orth: true
    rho: 1920.0
    E: [21.0e9, 14.0e9, 14.0e9]
    G: [8.0e9, 7.0e9, 7.0e9]
    nu: [0.48, 0.3, 0.3]
  - name: glass_ud
    rho: 1940.0
    E: 41.0e9
    nu: 0.28
"#
    }

    #[test]
    fn test_parse_minimal_document() {
        let doc = BladeOntology::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(doc.name, "demo_blade");
        assert_eq!(doc.airfoils.len(), 2);
        assert_eq!(doc.components.blade.internal_structure_2d_fem.layers.len(), 2);

        let spar = &doc.components.blade.internal_structure_2d_fem.layers[1];
        assert_eq!(spar.rotation.as_ref().unwrap().as_fixed(), Some("twist"));
        assert!(spar.width.is_some());
        assert_eq!(spar.side.as_deref(), Some("suction"));
    }

    #[test]
    fn test_schedule_or_ref_parses_both_forms() {
        let fixed: ScheduleOrRef = serde_yaml::from_str("{fixed: twist}").unwrap();
        assert_eq!(fixed.as_fixed(), Some("twist"));

        let sched: ScheduleOrRef =
            serde_yaml::from_str("{grid: [0.0, 1.0], values: [0.1, 0.2]}").unwrap();
        assert_eq!(sched.as_schedule().unwrap().grid.len(), 2);
    }

    #[test]
    fn test_unknown_airfoil_label_rejected() {
        let text = minimal_yaml().replace("labels: [circle, tip_af]", "labels: [circle, ghost]");
        let err = BladeOntology::from_yaml(&text).unwrap_err();
        assert!(matches!(err, BladeError::AirfoilNotFound { .. }));
    }

    #[test]
    fn test_material_scalar_and_axes() {
        let doc = BladeOntology::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(doc.materials[0].e.axis(1), Some(14.0e9));
        assert_eq!(doc.materials[1].e.scalar(), Some(41.0e9));
        assert!(doc.materials[1].g.is_none());
    }
}
