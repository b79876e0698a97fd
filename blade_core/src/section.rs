//! # Per-Station Composite Stacks
//!
//! Converts resolved arc-fraction layer bounds into the per-station stack
//! description a cross-section solver consumes: each surface is split into
//! chordwise regions at every layer boundary, and each region carries the
//! ordered list of plies covering it. Shear webs get their own stacks, and a
//! section with an open (flatback) trailing edge gets an implicit closing
//! web that inherits the suction-side trailing-edge stack.
//!
//! Region bounds are reported as chordwise x/c positions on the
//! twist-rotated section, increasing from the leading edge, which is the
//! ordering downstream section solvers expect.

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::layout::{arc_to_chordwise, ResolvedLayer, ResolvedStructure, Side};
use crate::planform::Planform;
use crate::profile::ProfileFamily;

const ARC_TOL: f64 = 1e-6;

/// One ply inside a region stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackPly {
    pub layer: String,
    pub material: String,
    /// Ply thickness (m).
    pub thickness: f64,
    /// Fiber orientation (deg).
    pub fiber_orientation_deg: f64,
}

/// A chordwise region of one surface with its ply stack, outermost first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// Chordwise bounds (x/c on the rotated section), `x_start < x_end`.
    pub x_start: f64,
    pub x_end: f64,
    pub plies: Vec<StackPly>,
}

/// A shear web stack at one station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebLayup {
    pub name: String,
    /// Chordwise position of the web (x/c on the rotated section).
    pub x_nd: f64,
    pub plies: Vec<StackPly>,
}

/// The region index a tracked layer occupies on its surface, used to locate
/// spar caps and trailing-edge reinforcements for downstream sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedRegion {
    pub layer: String,
    pub side: Side,
    pub region: usize,
}

/// Complete composite description of one spanwise station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionLayup {
    pub station: usize,
    pub suction: Vec<Region>,
    pub pressure: Vec<Region>,
    pub webs: Vec<WebLayup>,
    pub flatback: bool,
    pub tracked: Vec<TrackedRegion>,
}

/// An arc segment a layer covers, already unwrapped across the seam.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    end: f64,
}

/// Unwraps a layer's arc bounds into plain segments; a trailing-edge layer
/// whose end wrapped past the seam yields two. Bounds within the configured
/// snap tolerance of 0 or 1 are pulled onto the exact endpoint.
fn layer_segments(start: f64, end: f64, config: &GeometryConfig) -> Vec<Segment> {
    let snap = |v: f64| {
        if config.is_close(v, 0.0) {
            0.0
        } else if config.is_close(v, 1.0) {
            1.0
        } else {
            v
        }
    };
    let (s, e) = (snap(start), snap(end));
    if s <= e {
        vec![Segment { start: s, end: e }]
    } else {
        vec![
            Segment { start: s, end: 1.0 },
            Segment { start: 0.0, end: e },
        ]
    }
}

fn intersect(seg: Segment, lo: f64, hi: f64) -> Option<Segment> {
    let s = seg.start.max(lo);
    let e = seg.end.min(hi);
    if e - s > ARC_TOL {
        Some(Segment { start: s, end: e })
    } else {
        None
    }
}

/// Builds the composite layup for every spanwise station.
pub fn build_layups(
    resolved: &ResolvedStructure,
    planform: &Planform,
    family: &ProfileFamily,
    config: &GeometryConfig,
) -> BladeResult<Vec<SectionLayup>> {
    let n = planform.n_span();
    let mut layups = Vec::with_capacity(n);
    for i in 0..n {
        layups.push(build_station(i, resolved, planform, family, config)?);
    }
    Ok(layups)
}

fn active_ply(layer: &ResolvedLayer, i: usize) -> Option<StackPly> {
    let thickness = layer.thickness.get(i)?;
    if thickness <= 0.0 {
        return None;
    }
    Some(StackPly {
        layer: layer.name.clone(),
        material: layer.material.clone(),
        thickness,
        fiber_orientation_deg: layer.fiber_orientation.get(i).unwrap_or(0.0),
    })
}

fn build_station(
    i: usize,
    resolved: &ResolvedStructure,
    planform: &Planform,
    family: &ProfileFamily,
    config: &GeometryConfig,
) -> BladeResult<SectionLayup> {
    let profile = family.station(i)?;
    let twist_rad = planform.twist_deg[i].to_radians();
    let p_le = planform.p_le[i];
    let le = resolved.le_nd[i];
    let to_x = |arc: f64| arc_to_chordwise(profile, twist_rad, p_le, arc);

    // shell layers active at this station, with their surface segments
    let mut shell: Vec<(&ResolvedLayer, StackPly, Vec<Segment>)> = Vec::new();
    for layer in &resolved.layers {
        if layer.web.is_some() {
            continue;
        }
        let Some(ply) = active_ply(layer, i) else {
            continue;
        };
        let (Some(s), Some(e)) = (layer.start_nd.get(i), layer.end_nd.get(i)) else {
            log::debug!(
                "layer '{}' has thickness but no bounds at station {i}; skipping",
                layer.name
            );
            continue;
        };
        shell.push((layer, ply, layer_segments(s, e, config)));
    }

    let mut surfaces = Vec::with_capacity(2);
    for (side, lo, hi) in [(Side::Suction, 0.0, le), (Side::Pressure, le, 1.0)] {
        let mut dps = vec![lo, hi];
        for (_, _, segments) in &shell {
            for seg in segments {
                if let Some(clipped) = intersect(*seg, lo, hi) {
                    dps.push(clipped.start);
                    dps.push(clipped.end);
                }
            }
        }
        dps.sort_by(|a, b| a.total_cmp(b));
        dps.dedup_by(|a, b| (*a - *b).abs() <= ARC_TOL);

        // regions in arc order, stacked with every covering layer
        let mut regions = Vec::with_capacity(dps.len().saturating_sub(1));
        for w in dps.windows(2) {
            let (d0, d1) = (w[0], w[1]);
            let plies: Vec<StackPly> = shell
                .iter()
                .filter(|(_, _, segments)| {
                    segments.iter().any(|seg| {
                        seg.start <= d0 + ARC_TOL && seg.end >= d1 - ARC_TOL
                    })
                })
                .map(|(_, ply, _)| ply.clone())
                .collect();
            let (xa, xb) = (to_x(d0)?, to_x(d1)?);
            regions.push(Region {
                x_start: xa.min(xb),
                x_end: xa.max(xb),
                plies,
            });
        }
        // report regions from the leading edge toward the trailing edge
        if side == Side::Suction {
            regions.reverse();
        }
        surfaces.push(regions);
    }
    let pressure = surfaces.pop().unwrap_or_default();
    let suction = surfaces.pop().unwrap_or_default();

    // tracked layers: which region holds the layer's arc midpoint
    let mut tracked = Vec::new();
    let tracked_names: Vec<&str> = config
        .spar_layers
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(config.te_layer.as_str()))
        .collect();
    for name in tracked_names {
        let Ok(layer) = resolved.layer(name) else {
            continue;
        };
        let (Some(s), Some(e)) = (layer.start_nd.get(i), layer.end_nd.get(i)) else {
            continue;
        };
        let mid = if s <= e {
            (s + e) / 2.0
        } else {
            ((s + e + 1.0) / 2.0) % 1.0
        };
        let (side, regions) = if mid <= le {
            (Side::Suction, &suction)
        } else {
            (Side::Pressure, &pressure)
        };
        let mid_x = to_x(mid)?;
        if let Some(idx) = regions
            .iter()
            .position(|r| r.x_start - ARC_TOL <= mid_x && mid_x <= r.x_end + ARC_TOL)
        {
            tracked.push(TrackedRegion {
                layer: name.to_string(),
                side,
                region: idx,
            });
        }
    }

    // shear webs with their member layers, in declaration order
    let mut webs = Vec::new();
    for web in &resolved.webs {
        let (Some(s), Some(_e)) = (web.start_nd.get(i), web.end_nd.get(i)) else {
            continue;
        };
        let plies: Vec<StackPly> = resolved
            .layers
            .iter()
            .filter(|l| l.web.as_deref() == Some(web.name.as_str()))
            .filter_map(|l| active_ply(l, i))
            .collect();
        if plies.is_empty() {
            continue;
        }
        webs.push(WebLayup {
            name: web.name.clone(),
            x_nd: to_x(s)?,
            plies,
        });
    }

    // an open trailing edge is closed by an implicit web carrying the
    // suction-side trailing-edge stack
    let flatback = profile.is_flatback();
    if flatback {
        if let Some(te_region) = suction.last() {
            if !te_region.plies.is_empty() {
                webs.push(WebLayup {
                    name: "te_closure".into(),
                    x_nd: 1.0,
                    plies: te_region.plies.clone(),
                });
            }
        }
    }

    Ok(SectionLayup {
        station: i,
        suction,
        pressure,
        webs,
        flatback,
        tracked,
    })
}

/// Sanity check used after stacking: every shell region of every station
/// must carry at least one ply, or the skin does not close the section.
pub fn check_coverage(layups: &[SectionLayup]) -> BladeResult<()> {
    for layup in layups {
        for (side, regions) in [("suction", &layup.suction), ("pressure", &layup.pressure)] {
            if let Some(idx) = regions.iter().position(|r| r.plies.is_empty()) {
                return Err(BladeError::invalid_input(
                    "layup",
                    format!("station {}, {side} region {idx}", layup.station),
                    "surface region has no plies; the shell does not cover the section",
                ));
            }
        }
    }
    Ok(())
}
