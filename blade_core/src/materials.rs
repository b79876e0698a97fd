//! # Material Library
//!
//! Normalizes the ontology's material entries into a uniform three-axis
//! representation: isotropic materials are broadcast across all axes, and a
//! missing shear modulus on an isotropic entry is synthesized from E and nu.

use serde::{Deserialize, Serialize};

use crate::errors::{BladeError, BladeResult};
use crate::ontology::{MaterialDef, ScalarOrAxes};

/// A normalized material: every elastic property on all three principal
/// axes, SI units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub orth: bool,
    /// Density (kg/m^3).
    pub rho: f64,
    /// Young's moduli (Pa).
    pub e: [f64; 3],
    /// Shear moduli (Pa).
    pub g: [f64; 3],
    /// Poisson's ratios.
    pub nu: [f64; 3],
}

/// Name-indexed material collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
}

impl MaterialLibrary {
    /// Normalizes the ontology entries. Isotropic entries without a shear
    /// modulus get `G = E / (2 (1 + nu))` with a warning; an orthotropic
    /// entry without one is a fatal input error.
    pub fn from_defs(defs: &[MaterialDef]) -> BladeResult<Self> {
        let mut materials = Vec::with_capacity(defs.len());
        for def in defs {
            materials.push(normalize(def)?);
        }
        Ok(Self { materials })
    }

    pub fn get(&self, name: &str) -> BladeResult<&Material> {
        self.materials
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| BladeError::material_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.iter().any(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }
}

fn axes(name: &str, field: &str, v: &ScalarOrAxes) -> BladeResult<[f64; 3]> {
    match v {
        ScalarOrAxes::Scalar(x) => Ok([*x; 3]),
        ScalarOrAxes::Axes(xs) if xs.len() >= 3 => Ok([xs[0], xs[1], xs[2]]),
        ScalarOrAxes::Axes(xs) => Err(BladeError::invalid_input(
            field,
            format!("{} values", xs.len()),
            format!("material '{name}' needs 3 values per orthotropic property"),
        )),
    }
}

fn normalize(def: &MaterialDef) -> BladeResult<Material> {
    let e = axes(&def.name, "E", &def.e)?;
    let nu = axes(&def.name, "nu", &def.nu)?;

    let g = match &def.g {
        Some(g) => axes(&def.name, "G", g)?,
        None if def.orth => {
            return Err(BladeError::invalid_input(
                "G",
                "missing",
                format!("orthotropic material '{}' must declare shear moduli", def.name),
            ));
        }
        None => {
            let g_iso = e[0] / (2.0 * (1.0 + nu[0]));
            log::warn!(
                "material '{}' has no shear modulus; using isotropic G = E/(2(1+nu)) = {:.3e} Pa",
                def.name,
                g_iso
            );
            [g_iso; 3]
        }
    };

    Ok(Material {
        name: def.name.clone(),
        orth: def.orth,
        rho: def.rho,
        e,
        g,
        nu,
    })
}
