//! # blade_core
//!
//! Wind turbine blade geometry engine: remaps a blade ontology document
//! (outer shape, airfoil library, composite internal structure) onto a
//! single shared spanwise grid and resolves every composite layer and shear
//! web down to explicit arc-fraction bounds and per-station material stacks.
//!
//! The pipeline, in stage order:
//!
//! 1. [`ontology`] parses the YAML document.
//! 2. [`grid`] builds the unified spanwise grid around the required
//!    composite boundary stations.
//! 3. [`planform`] resamples chord, twist, pitch axis and reference axis.
//! 4. [`profile`] blends the reference airfoils into per-station profiles.
//! 5. [`layout`] resolves layer/web placements to start/end arc fractions.
//! 6. [`section`] stacks the resolved layers into per-station regions.
//! 7. [`polar`] blends polars into a 4-D table over angle of attack, span,
//!    Reynolds number and flap deflection.
//! 8. [`control`] reduces the planform to control points and regenerates it
//!    after an optimizer moves them.
//!
//! [`blade::BladeModel`] orchestrates the stages; [`flow`] holds the
//! external flow-solver and polar-correction contracts.

pub mod blade;
pub mod config;
pub mod control;
pub mod errors;
pub mod flow;
pub mod grid;
pub mod interp;
pub mod layout;
pub mod materials;
pub mod ontology;
pub mod planform;
pub mod polar;
pub mod profile;
pub mod section;

pub use blade::BladeModel;
pub use config::GeometryConfig;
pub use control::ControlPoints;
pub use errors::{BladeError, BladeResult};
pub use flow::{FlowSolver, NoCorrection, PolarCorrector, XfoilRunner};
pub use ontology::BladeOntology;
pub use planform::{Planform, SpanSeries};
pub use polar::PolarSet;
