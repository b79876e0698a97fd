//! # Blade Model Pipeline
//!
//! Ties the stages together: one call takes a parsed ontology document to a
//! fully resolved blade model on the unified spanwise grid, and a second
//! entry point regenerates the model after an optimizer moves the planform
//! control points.
//!
//! Stage order matters. The grid must exist before anything is resampled,
//! profiles must exist before composite bounds (the geometric placement
//! conventions intersect the section surface), and bounds must exist before
//! stacking.

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::control::{self, ControlPoints};
use crate::errors::{BladeError, BladeResult};
use crate::flow::{FlowSolver, PolarCorrector};
use crate::grid::{build_span_grid, RequiredPoints};
use crate::layout::{resolve_bounds, ResolvedStructure, Structure};
use crate::materials::MaterialLibrary;
use crate::ontology::{AirfoilDef, BladeOntology};
use crate::planform::Planform;
use crate::polar::{add_flap_polars, build_polar_set, PolarSet};
use crate::profile::{build_family, prepare_references, ProfileFamily};
use crate::section::{build_layups, check_coverage, SectionLayup};

/// The fully resolved blade model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BladeModel {
    pub name: String,
    pub config: GeometryConfig,
    pub planform: Planform,
    pub family: ProfileFamily,
    pub structure: ResolvedStructure,
    pub layups: Vec<SectionLayup>,
    pub polars: PolarSet,
    pub ctrl_pts: ControlPoints,
    pub materials: MaterialLibrary,
    /// Source document, kept for regeneration. Not part of the serialized
    /// model output.
    #[serde(skip)]
    ontology: BladeOntology,
}

impl BladeModel {
    /// Runs the full pipeline on a parsed ontology document.
    pub fn initialize(ontology: BladeOntology, config: GeometryConfig) -> BladeResult<Self> {
        log::info!("initializing blade model '{}'", ontology.name);

        let materials = MaterialLibrary::from_defs(&ontology.materials)?;
        let mut structure =
            Structure::from_ontology(&ontology.components.blade.internal_structure_2d_fem)?;
        for layer in &structure.layers {
            if !materials.contains(&layer.material) {
                return Err(BladeError::material_not_found(format!(
                    "{} (layer '{}')",
                    layer.material, layer.name
                )));
            }
        }

        // unified spanwise grid: root, tip, every composite boundary, flap
        // span bounds
        let mut required = RequiredPoints::new(&config);
        required.insert(0.0);
        required.insert(1.0);
        structure.harvest_span_points(&mut required);
        if let Some(control) = &ontology.components.blade.aerodynamic_control {
            for flap in &control.te_flaps {
                required.insert(flap.span_start);
                required.insert(flap.span_end);
            }
        }
        let s = build_span_grid(&required, &config)?;
        log::debug!("spanwise grid has {} stations", s.len());

        let shape = &ontology.components.blade.outer_shape_bem;
        let airfoils = placed_airfoils(&ontology)?;
        let planform = Planform::resample(shape, &airfoils, &s)?;

        let refs = prepare_references(&airfoils, &config)?;
        let family = build_family(&refs, &planform.rthick)?;

        let resolved = resolve_bounds(&structure, &planform, &family, &config)?;
        let layups = build_layups(&resolved, &planform, &family, &config)?;
        if let Err(e) = check_coverage(&layups) {
            log::warn!("composite coverage check failed: {e}");
        }

        let polars = build_polar_set(&airfoils, &planform.rthick, flap_slots(&ontology))?;
        let ctrl_pts = control::fit(&planform, &structure, &config)?;

        Ok(Self {
            name: ontology.name.clone(),
            config,
            planform,
            family,
            structure: resolved,
            layups,
            polars,
            ctrl_pts,
            materials,
            ontology,
        })
    }

    /// Loads an ontology file and runs the pipeline.
    pub fn from_file(path: &str, config: GeometryConfig) -> BladeResult<Self> {
        let ontology = BladeOntology::from_file(path)?;
        Self::initialize(ontology, config)
    }

    /// Regenerates the model from moved control points. The spanwise grid is
    /// kept unchanged, so stations stay aligned with the composite
    /// boundaries harvested at initialization. The tracked spar-cap and
    /// trailing-edge thickness schedules are written back onto the layers
    /// before the composite stages re-run.
    pub fn update(&mut self, ctrl_pts: ControlPoints) -> BladeResult<()> {
        log::info!("updating blade model '{}' from control points", self.name);
        control::regenerate(&ctrl_pts, &mut self.planform)?;
        self.ctrl_pts = ctrl_pts;

        let airfoils = placed_airfoils(&self.ontology)?;
        let refs = prepare_references(&airfoils, &self.config)?;
        self.family = build_family(&refs, &self.planform.rthick)?;

        let mut structure =
            Structure::from_ontology(&self.ontology.components.blade.internal_structure_2d_fem)?;
        control::apply_thickness(&self.ctrl_pts, &mut structure, &self.planform.s, &self.config)?;
        self.structure = resolve_bounds(&structure, &self.planform, &self.family, &self.config)?;
        self.layups = build_layups(&self.structure, &self.planform, &self.family, &self.config)?;
        if let Err(e) = check_coverage(&self.layups) {
            log::warn!("composite coverage check failed: {e}");
        }
        self.polars = build_polar_set(
            &airfoils,
            &self.planform.rthick,
            flap_slots(&self.ontology),
        )?;
        Ok(())
    }

    /// Fills the flap-deflection slots of the polar table using the external
    /// flow solver and polar corrector.
    pub fn compute_flap_polars(
        &mut self,
        solver: &dyn FlowSolver,
        corrector: &dyn PolarCorrector,
    ) -> BladeResult<()> {
        let Some(control) = &self.ontology.components.blade.aerodynamic_control else {
            log::info!("no aerodynamic control devices declared, nothing to compute");
            return Ok(());
        };
        for flap in &control.te_flaps {
            add_flap_polars(
                &mut self.polars,
                &self.family,
                flap,
                &self.planform,
                &self.ontology.assembly,
                &self.ontology.environment.air_data,
                solver,
                corrector,
                &self.config,
            )?;
        }
        Ok(())
    }

    pub fn n_span(&self) -> usize {
        self.planform.n_span()
    }
}

/// Reference airfoils in spanwise placement order.
fn placed_airfoils(ontology: &BladeOntology) -> BladeResult<Vec<&AirfoilDef>> {
    ontology
        .components
        .blade
        .outer_shape_bem
        .airfoil_position
        .labels
        .iter()
        .map(|label| ontology.airfoil(label))
        .collect()
}

/// Deflection slots the polar table must reserve.
fn flap_slots(ontology: &BladeOntology) -> usize {
    ontology
        .components
        .blade
        .aerodynamic_control
        .as_ref()
        .map(|c| c.te_flaps.iter().map(|f| f.num_delta).max().unwrap_or(0))
        .unwrap_or(0)
}
