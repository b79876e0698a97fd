//! # Composite Layout Resolution
//!
//! Lowers the loosely-typed layer/web definitions of the ontology onto a
//! typed placement union, then resolves every placement convention down to
//! the one canonical form: start/end arc fractions per spanwise station.
//!
//! Resolution runs in two phases. Geometric conventions (rotation + offset +
//! width, anchored midpoints) are evaluated first, station by station, by
//! intersecting the placement axis with the dimensional section profile.
//! Cross-references ("start where that layer ends") are evaluated second, in
//! dependency order, copying the referenced series bit-for-bit; a reference
//! cycle is a fatal input error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::GeometryConfig;
use crate::errors::{BladeError, BladeResult};
use crate::grid::RequiredPoints;
use crate::interp::interp_linear;
use crate::ontology::{GridValues, InternalStructure, LayerDef, ScheduleOrRef, WebDef};
use crate::planform::{Planform, SpanSeries};
use crate::profile::{AirfoilProfile, ProfileFamily};

/// Which surface a width-based layer sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Suction,
    Pressure,
}

/// Midpoint anchor for width-based layers without a placement axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    LeadingEdge,
    TrailingEdge,
}

/// One arc boundary before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundSpec {
    /// Explicit spanwise schedule of arc fractions.
    Schedule(GridValues),
    /// Pinned to the leading edge at every station.
    FixedLe,
    /// Pinned to the trailing edge at every station.
    FixedTe,
    /// Adjacent to another layer: a start takes that layer's end and an end
    /// takes that layer's start.
    FixedToLayer(String),
}

/// Placement-axis rotation: either a schedule or locked to section twist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RotationSpec {
    Schedule(GridValues),
    MatchTwist,
}

/// The placement conventions a layer can use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// Explicit or referenced bounds; `None` on a side means full coverage
    /// up to that edge of the arc range.
    Bounds {
        start: Option<BoundSpec>,
        end: Option<BoundSpec>,
    },
    /// A placement axis (rotation about the pitch axis, chordwise offset)
    /// and a width centered on the axis intersection with one surface.
    RotationOffset {
        rotation: RotationSpec,
        offset: GridValues,
        width: GridValues,
        side: Side,
    },
    /// A width centered on the leading or trailing edge.
    Midpoint { anchor: Anchor, width: GridValues },
    /// Bounds come from the named shear web.
    Web(String),
}

/// A composite layer lowered from the ontology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub material: String,
    pub thickness: Option<GridValues>,
    pub fiber_orientation: Option<GridValues>,
    pub placement: Placement,
}

/// A shear web lowered from the ontology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Web {
    pub name: String,
    pub placement: Placement,
}

/// The lowered structural model, still on native schedules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Structure {
    pub layers: Vec<Layer>,
    pub webs: Vec<Web>,
}

impl Structure {
    /// Lowers the ontology's internal structure onto typed placements.
    ///
    /// Inconsistent definitions degrade with a warning where a safe default
    /// exists (unknown side token, missing rotation); a layer naming a web
    /// that does not exist is fatal.
    pub fn from_ontology(structure: &InternalStructure) -> BladeResult<Self> {
        let mut webs = Vec::with_capacity(structure.webs.len());
        for def in &structure.webs {
            webs.push(Web {
                name: def.name.clone(),
                placement: lower_web_placement(def)?,
            });
        }

        let mut layers = Vec::with_capacity(structure.layers.len());
        for def in &structure.layers {
            let placement = if let Some(web_name) = &def.web {
                if !webs.iter().any(|w| &w.name == web_name) {
                    return Err(BladeError::web_not_found(web_name.clone()));
                }
                Placement::Web(web_name.clone())
            } else {
                lower_layer_placement(def)
            };
            layers.push(Layer {
                name: def.name.clone(),
                material: def.material.clone(),
                thickness: def.thickness.clone(),
                fiber_orientation: def.fiber_orientation.clone(),
                placement,
            });
        }
        Ok(Self { layers, webs })
    }

    /// Feeds every native schedule endpoint into the required-point set and
    /// snaps the schedule endpoints onto the accepted coordinates, so the
    /// unified grid and the schedules agree bit-for-bit.
    pub fn harvest_span_points(&mut self, req: &mut RequiredPoints) {
        let mut snap = |gv: &mut GridValues| {
            if gv.grid.is_empty() {
                return;
            }
            let n = gv.grid.len();
            gv.grid[0] = req.insert(gv.grid[0]);
            gv.grid[n - 1] = req.insert(gv.grid[n - 1]);
        };

        for layer in &mut self.layers {
            if let Some(gv) = &mut layer.thickness {
                snap(gv);
            }
            if let Some(gv) = &mut layer.fiber_orientation {
                snap(gv);
            }
            snap_placement(&mut layer.placement, &mut snap);
        }
        for web in &mut self.webs {
            snap_placement(&mut web.placement, &mut snap);
        }
    }
}

fn snap_placement(placement: &mut Placement, snap: &mut impl FnMut(&mut GridValues)) {
    match placement {
        Placement::Bounds { start, end } => {
            for bound in [start, end] {
                if let Some(BoundSpec::Schedule(gv)) = bound.as_mut() {
                    snap(gv);
                }
            }
        }
        Placement::RotationOffset {
            rotation,
            offset,
            width,
            ..
        } => {
            if let RotationSpec::Schedule(gv) = rotation {
                snap(gv);
            }
            snap(offset);
            snap(width);
        }
        Placement::Midpoint { width, .. } => snap(width),
        Placement::Web(_) => {}
    }
}

fn lower_bound(spec: &ScheduleOrRef) -> BoundSpec {
    match spec {
        ScheduleOrRef::Schedule(gv) => BoundSpec::Schedule(gv.clone()),
        ScheduleOrRef::Fixed { fixed } => match fixed.as_str() {
            "LE" => BoundSpec::FixedLe,
            "TE" => BoundSpec::FixedTe,
            other => BoundSpec::FixedToLayer(other.to_string()),
        },
    }
}

fn lower_rotation(name: &str, rotation: Option<&ScheduleOrRef>) -> RotationSpec {
    match rotation {
        Some(ScheduleOrRef::Schedule(gv)) => RotationSpec::Schedule(gv.clone()),
        Some(ScheduleOrRef::Fixed { fixed }) if fixed == "twist" => RotationSpec::MatchTwist,
        Some(ScheduleOrRef::Fixed { fixed }) => {
            log::warn!("'{name}': unknown rotation reference '{fixed}', setting rotation to 0");
            RotationSpec::Schedule(GridValues::new(vec![0.0, 1.0], vec![0.0, 0.0]))
        }
        None => {
            log::warn!("'{name}': width placement without rotation, using section twist");
            RotationSpec::MatchTwist
        }
    }
}

fn lower_side(name: &str, side: Option<&str>) -> Side {
    match side.map(str::to_ascii_lowercase).as_deref() {
        Some("suction") => Side::Suction,
        Some("pressure") => Side::Pressure,
        Some(other) => {
            log::warn!("'{name}': unknown side '{other}', assuming suction");
            Side::Suction
        }
        None => {
            log::warn!("'{name}': width placement without side, assuming suction");
            Side::Suction
        }
    }
}

fn lower_layer_placement(def: &LayerDef) -> Placement {
    if let (Some(mid), Some(width)) = (&def.midpoint_nd_arc, &def.width) {
        let anchor = match mid.fixed.as_str() {
            "TE" => Anchor::TrailingEdge,
            "LE" => Anchor::LeadingEdge,
            other => {
                log::warn!(
                    "'{}': unknown midpoint anchor '{other}', assuming leading edge",
                    def.name
                );
                Anchor::LeadingEdge
            }
        };
        return Placement::Midpoint {
            anchor,
            width: width.clone(),
        };
    }

    if let Some(width) = &def.width {
        return Placement::RotationOffset {
            rotation: lower_rotation(&def.name, def.rotation.as_ref()),
            offset: def.offset_x_pa.clone().unwrap_or_default(),
            width: width.clone(),
            side: lower_side(&def.name, def.side.as_deref()),
        };
    }

    Placement::Bounds {
        start: def.start_nd_arc.as_ref().map(lower_bound),
        end: def.end_nd_arc.as_ref().map(lower_bound),
    }
}

fn lower_web_placement(def: &WebDef) -> BladeResult<Placement> {
    let offset = def.offset_y_pa.as_ref().or(def.offset_x_pa.as_ref());
    if def.rotation.is_some() || offset.is_some() {
        return Ok(Placement::RotationOffset {
            rotation: lower_rotation(&def.name, def.rotation.as_ref()),
            offset: offset.cloned().unwrap_or_default(),
            width: GridValues::default(),
            side: Side::Suction,
        });
    }
    match (&def.start_nd_arc, &def.end_nd_arc) {
        (Some(start), Some(end)) => Ok(Placement::Bounds {
            start: Some(lower_bound(start)),
            end: Some(lower_bound(end)),
        }),
        _ => Err(BladeError::invalid_input(
            "web",
            def.name.clone(),
            "needs either rotation/offset or explicit start and end arcs",
        )),
    }
}

/// A layer with fully resolved per-station bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedLayer {
    pub name: String,
    pub material: String,
    /// Shear web this layer belongs to, when any.
    pub web: Option<String>,
    pub thickness: SpanSeries,
    pub fiber_orientation: SpanSeries,
    pub start_nd: SpanSeries,
    pub end_nd: SpanSeries,
    pub side: Option<Side>,
}

/// A web with fully resolved per-station bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedWeb {
    pub name: String,
    pub start_nd: SpanSeries,
    pub end_nd: SpanSeries,
}

/// The resolved structural model on the unified grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedStructure {
    pub layers: Vec<ResolvedLayer>,
    pub webs: Vec<ResolvedWeb>,
    /// Leading-edge arc fraction per station.
    pub le_nd: Vec<f64>,
}

impl ResolvedStructure {
    pub fn layer(&self, name: &str) -> BladeResult<&ResolvedLayer> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| BladeError::layer_not_found(name))
    }

    pub fn web(&self, name: &str) -> BladeResult<&ResolvedWeb> {
        self.webs
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| BladeError::web_not_found(name))
    }
}

/// Dimensional section geometry cached per station for intersections.
struct StationGeometry {
    points: Vec<[f64; 2]>,
    /// Cumulative dimensional arc length per point.
    arc: Vec<f64>,
    total: f64,
    le_index: usize,
}

impl StationGeometry {
    fn new(profile: &AirfoilProfile, chord: f64, p_le: f64) -> Self {
        let points = profile.dimensioned(chord, p_le);
        let arc = crate::interp::arc_length(&points);
        let total = *arc.last().unwrap_or(&0.0);
        let le_index = profile.le_index();
        Self {
            points,
            arc,
            total,
            le_index,
        }
    }

    /// Arc fraction where the axis through `(offset, rotation)` crosses the
    /// requested surface. The axis passes through the point `offset` along
    /// the rotated chord line from the pitch axis, perpendicular to that
    /// line.
    fn axis_intersection(&self, side: Side, rotation: f64, offset: f64) -> BladeResult<f64> {
        let (sin, cos) = rotation.sin_cos();
        let (ox, oy) = (offset * cos, offset * sin);
        // signed distance along the rotated chord direction
        let dist = |p: [f64; 2]| (p[0] - ox) * cos + (p[1] - oy) * sin;

        let range = match side {
            Side::Suction => 0..self.le_index,
            Side::Pressure => self.le_index..self.points.len() - 1,
        };
        for i in range {
            let (da, db) = (dist(self.points[i]), dist(self.points[i + 1]));
            if da == 0.0 {
                return Ok(self.arc[i] / self.total);
            }
            if da * db < 0.0 {
                let t = da / (da - db);
                let a = self.arc[i] + t * (self.arc[i + 1] - self.arc[i]);
                return Ok(a / self.total);
            }
        }
        Err(BladeError::invalid_input(
            "placement axis",
            format!("rotation {rotation:.4} rad, offset {offset:.4} m"),
            "axis does not intersect the section surface on the requested side",
        ))
    }

    /// Arc fraction at the leading edge.
    fn le_fraction(&self) -> f64 {
        if self.total > 0.0 {
            self.arc[self.le_index] / self.total
        } else {
            0.0
        }
    }
}

/// Resolves every layer and web of `structure` to start/end arc fractions on
/// the unified grid.
pub fn resolve_bounds(
    structure: &Structure,
    planform: &Planform,
    family: &ProfileFamily,
    config: &GeometryConfig,
) -> BladeResult<ResolvedStructure> {
    let n = planform.n_span();
    if family.stations.len() != n {
        return Err(BladeError::internal(format!(
            "profile family has {} stations, planform has {n}",
            family.stations.len()
        )));
    }

    let geometry: Vec<StationGeometry> = (0..n)
        .map(|i| StationGeometry::new(&family.stations[i], planform.chord[i], planform.p_le[i]))
        .collect();
    let le_nd: Vec<f64> = geometry.iter().map(StationGeometry::le_fraction).collect();

    let mut layers: Vec<ResolvedLayer> = Vec::with_capacity(structure.layers.len());
    for layer in &structure.layers {
        let thickness = match &layer.thickness {
            Some(gv) => SpanSeries::resample(gv, &planform.s)?,
            None => SpanSeries::empty(),
        };
        let fiber_orientation = match &layer.fiber_orientation {
            Some(gv) => SpanSeries::resample(gv, &planform.s)?,
            None => {
                let (a, b) = thickness.active_range();
                SpanSeries::over_range(a, vec![0.0; b - a])
            }
        };
        let web = match &layer.placement {
            Placement::Web(name) => Some(name.clone()),
            _ => None,
        };
        let side = match &layer.placement {
            Placement::RotationOffset { side, .. } => Some(*side),
            _ => None,
        };
        layers.push(ResolvedLayer {
            name: layer.name.clone(),
            material: layer.material.clone(),
            web,
            thickness,
            fiber_orientation,
            start_nd: SpanSeries::empty(),
            end_nd: SpanSeries::empty(),
            side,
        });
    }

    // phase 1: geometric conventions, station by station
    for (li, layer) in structure.layers.iter().enumerate() {
        match &layer.placement {
            Placement::RotationOffset {
                rotation,
                offset,
                width,
                side,
            } => {
                let (start, end) = resolve_width_layer(
                    &layer.name,
                    rotation,
                    offset,
                    width,
                    *side,
                    &layers[li].thickness,
                    planform,
                    &geometry,
                    config,
                )?;
                layers[li].start_nd = start;
                layers[li].end_nd = end;
            }
            Placement::Midpoint { anchor, width } => {
                let (start, end) = resolve_midpoint_layer(
                    *anchor,
                    width,
                    &layers[li].thickness,
                    planform,
                    &geometry,
                    &le_nd,
                )?;
                layers[li].start_nd = start;
                layers[li].end_nd = end;
            }
            Placement::Bounds { .. } | Placement::Web(_) => {}
        }
    }

    // phase 2: explicit bounds, edge anchors and cross-references
    let order = reference_order(&structure.layers)?;
    let index: HashMap<&str, usize> = structure
        .layers
        .iter()
        .enumerate()
        .map(|(i, l)| (l.name.as_str(), i))
        .collect();

    for li in order {
        let Placement::Bounds { start, end } = &structure.layers[li].placement else {
            continue;
        };
        let (a, b) = layers[li].thickness.active_range();
        let resolve_side = |spec: &Option<BoundSpec>,
                            is_start: bool,
                            layers: &[ResolvedLayer]|
         -> BladeResult<SpanSeries> {
            match spec {
                None => Ok(SpanSeries::over_range(
                    a,
                    vec![if is_start { 0.0 } else { 1.0 }; b - a],
                )),
                Some(BoundSpec::Schedule(gv)) => SpanSeries::resample(gv, &planform.s),
                Some(BoundSpec::FixedTe) => Ok(SpanSeries::over_range(
                    a,
                    vec![if is_start { 0.0 } else { 1.0 }; b - a],
                )),
                Some(BoundSpec::FixedLe) => {
                    Ok(SpanSeries::over_range(a, le_nd[a..b].to_vec()))
                }
                Some(BoundSpec::FixedToLayer(other)) => {
                    let &oi = index.get(other.as_str()).ok_or_else(|| {
                        BladeError::layer_not_found(other.clone())
                    })?;
                    // adjacency: our start is their end and vice versa
                    let series = if is_start {
                        &layers[oi].end_nd
                    } else {
                        &layers[oi].start_nd
                    };
                    Ok(series.clone())
                }
            }
        };
        layers[li].start_nd = resolve_side(start, true, &layers)?;
        layers[li].end_nd = resolve_side(end, false, &layers)?;
    }

    // webs, after layers so web bounds may reference resolved layers
    let mut webs: Vec<ResolvedWeb> = Vec::with_capacity(structure.webs.len());
    for web in &structure.webs {
        let (start_nd, end_nd) = match &web.placement {
            Placement::RotationOffset {
                rotation, offset, ..
            } => resolve_web_axis(&web.name, rotation, offset, planform, &geometry, config)?,
            Placement::Bounds {
                start: Some(start),
                end: Some(end),
            } => {
                let fetch = |spec: &BoundSpec, is_start: bool| -> BladeResult<SpanSeries> {
                    match spec {
                        BoundSpec::Schedule(gv) => SpanSeries::resample(gv, &planform.s),
                        BoundSpec::FixedTe => Ok(SpanSeries::full(n, if is_start { 0.0 } else { 1.0 })),
                        BoundSpec::FixedLe => Ok(SpanSeries::over_range(0, le_nd.clone())),
                        BoundSpec::FixedToLayer(other) => {
                            let &oi = index.get(other.as_str()).ok_or_else(|| {
                                BladeError::layer_not_found(other.clone())
                            })?;
                            Ok(if is_start {
                                layers[oi].end_nd.clone()
                            } else {
                                layers[oi].start_nd.clone()
                            })
                        }
                    }
                };
                (fetch(start, true)?, fetch(end, false)?)
            }
            _ => {
                return Err(BladeError::invalid_input(
                    "web",
                    web.name.clone(),
                    "unresolvable placement",
                ))
            }
        };
        webs.push(ResolvedWeb {
            name: web.name.clone(),
            start_nd,
            end_nd,
        });
    }

    // web-bound layers inherit the web arcs
    for layer in &mut layers {
        if let Some(web_name) = layer.web.clone() {
            let web = webs
                .iter()
                .find(|w| w.name == web_name)
                .ok_or_else(|| BladeError::web_not_found(web_name.clone()))?;
            layer.start_nd = web.start_nd.clone();
            layer.end_nd = web.end_nd.clone();
        }
    }

    Ok(ResolvedStructure {
        layers,
        webs,
        le_nd,
    })
}

/// Topological order of layers so every reference target resolves before its
/// referrer. A cycle among references is fatal.
fn reference_order(layers: &[Layer]) -> BladeResult<Vec<usize>> {
    let index: HashMap<&str, usize> = layers
        .iter()
        .enumerate()
        .map(|(i, l)| (l.name.as_str(), i))
        .collect();
    let deps = |i: usize| -> Vec<usize> {
        let Placement::Bounds { start, end } = &layers[i].placement else {
            return Vec::new();
        };
        [start, end]
            .iter()
            .filter_map(|b| match b {
                Some(BoundSpec::FixedToLayer(name)) => index.get(name.as_str()).copied(),
                _ => None,
            })
            .collect()
    };

    let mut state = vec![0u8; layers.len()]; // 0 unvisited, 1 visiting, 2 done
    let mut order = Vec::with_capacity(layers.len());
    let mut stack: Vec<String> = Vec::new();

    fn visit(
        i: usize,
        layers: &[Layer],
        deps: &dyn Fn(usize) -> Vec<usize>,
        state: &mut [u8],
        order: &mut Vec<usize>,
        stack: &mut Vec<String>,
    ) -> BladeResult<()> {
        match state[i] {
            2 => return Ok(()),
            1 => {
                let mut chain = stack.clone();
                chain.push(layers[i].name.clone());
                return Err(BladeError::ReferenceCycle {
                    chain: chain.join(" -> "),
                });
            }
            _ => {}
        }
        state[i] = 1;
        stack.push(layers[i].name.clone());
        for d in deps(i) {
            visit(d, layers, deps, state, order, stack)?;
        }
        stack.pop();
        state[i] = 2;
        order.push(i);
        Ok(())
    }

    for i in 0..layers.len() {
        visit(i, layers, &deps, &mut state, &mut order, &mut stack)?;
    }
    Ok(order)
}

#[allow(clippy::too_many_arguments)]
fn resolve_width_layer(
    name: &str,
    rotation: &RotationSpec,
    offset: &GridValues,
    width: &GridValues,
    side: Side,
    thickness: &SpanSeries,
    planform: &Planform,
    geometry: &[StationGeometry],
    config: &GeometryConfig,
) -> BladeResult<(SpanSeries, SpanSeries)> {
    let rotation_series = match rotation {
        RotationSpec::Schedule(gv) => Some(SpanSeries::resample(gv, &planform.s)?),
        RotationSpec::MatchTwist => None,
    };
    let offset_series = SpanSeries::resample(offset, &planform.s)?;
    let width_series = SpanSeries::resample(width, &planform.s)?;

    let ratio = config.max_chord_ratio;
    let mut start = SpanSeries::empty();
    let mut end = SpanSeries::empty();
    let mut clamped = 0usize;

    let (a, b) = thickness.active_range();
    for i in a..b {
        let t = thickness.get(i).unwrap_or(0.0);
        if t <= 0.0 {
            continue;
        }
        let chord = planform.chord[i];
        let p_le = planform.p_le[i];
        let rot = match &rotation_series {
            Some(s) => s.get(i).unwrap_or(0.0),
            None => -planform.twist_deg[i].to_radians(),
        };
        let mut off = offset_series.get(i).unwrap_or(0.0);
        let mut w = width_series.get(i).unwrap_or(0.0);

        let max_te = ratio * chord * (1.0 - p_le);
        let max_le = ratio * chord * p_le;
        if off + w / 2.0 > max_te || off - w / 2.0 < -max_le {
            w = 2.0 * max_te.min(max_le);
            off = 0.0;
            clamped += 1;
        }

        let geom = &geometry[i];
        let mid = geom.axis_intersection(side, rot, off)?;
        let half = w / (2.0 * geom.total);
        start.set(i, mid - half);
        end.set(i, mid + half);
    }

    if clamped > 0 {
        log::warn!(
            "'{name}': width placement exceeds {:.0}% of chord at {clamped} station(s); \
             width reduced and offset reset to the pitch axis",
            config.max_chord_ratio * 100.0
        );
    }
    Ok((start, end))
}

fn resolve_midpoint_layer(
    anchor: Anchor,
    width: &GridValues,
    thickness: &SpanSeries,
    planform: &Planform,
    geometry: &[StationGeometry],
    le_nd: &[f64],
) -> BladeResult<(SpanSeries, SpanSeries)> {
    let width_series = SpanSeries::resample(width, &planform.s)?;
    let mut start = SpanSeries::empty();
    let mut end = SpanSeries::empty();

    let (a, b) = thickness.active_range();
    for i in a..b {
        let t = thickness.get(i).unwrap_or(0.0);
        if t <= 0.0 {
            continue;
        }
        let geom = &geometry[i];
        if geom.total <= 0.0 {
            continue;
        }
        let mid = match anchor {
            Anchor::TrailingEdge => 1.0,
            Anchor::LeadingEdge => le_nd[i],
        };
        let w = width_series.get(i).unwrap_or(0.0);
        let half = w / (2.0 * geom.total);

        let s = mid - half;
        let mut e = mid + half;
        // trailing-edge layers wrap around the arc seam
        if e > 1.0 {
            e -= 1.0;
        }
        start.set(i, s);
        end.set(i, e);
    }
    Ok((start, end))
}

fn resolve_web_axis(
    name: &str,
    rotation: &RotationSpec,
    offset: &GridValues,
    planform: &Planform,
    geometry: &[StationGeometry],
    config: &GeometryConfig,
) -> BladeResult<(SpanSeries, SpanSeries)> {
    let rotation_series = match rotation {
        RotationSpec::Schedule(gv) => Some(SpanSeries::resample(gv, &planform.s)?),
        RotationSpec::MatchTwist => None,
    };
    let offset_series = SpanSeries::resample(offset, &planform.s)?;

    // the web exists where its offset schedule is active; with a rotation
    // schedule but no offset, where the rotation is active
    let (a, b) = if offset_series.is_empty() {
        rotation_series
            .as_ref()
            .map(|s| s.active_range())
            .unwrap_or((0, 0))
    } else {
        offset_series.active_range()
    };
    if a >= b {
        return Err(BladeError::invalid_input(
            "web",
            name,
            "rotation/offset placement has no active span range",
        ));
    }

    let ratio = config.max_chord_ratio;
    let mut start = SpanSeries::empty();
    let mut end = SpanSeries::empty();
    let mut clamped = 0usize;

    for i in a..b {
        let chord = planform.chord[i];
        let p_le = planform.p_le[i];
        let rot = match &rotation_series {
            Some(s) => s.get(i).unwrap_or(0.0),
            None => -planform.twist_deg[i].to_radians(),
        };
        let mut off = offset_series.get(i).unwrap_or(0.0);

        let max_te = ratio * chord * (1.0 - p_le);
        let max_le = ratio * chord * p_le;
        if off > max_te {
            off = max_te;
            clamped += 1;
        } else if off < -max_le {
            off = -max_le;
            clamped += 1;
        }

        let geom = &geometry[i];
        let ss = geom.axis_intersection(Side::Suction, rot, off)?;
        let ps = geom.axis_intersection(Side::Pressure, rot, off)?;
        start.set(i, ss);
        end.set(i, ps);
    }

    if clamped > 0 {
        log::warn!(
            "'{name}': web offset exceeds {:.0}% of chord at {clamped} station(s); \
             offset clamped to the chord limit",
            config.max_chord_ratio * 100.0
        );
    }
    Ok((start, end))
}

/// Maps an arc fraction to a chordwise (x/c) position on the rotated
/// section, used when composite regions are re-expressed chordwise.
pub fn arc_to_chordwise(
    profile: &AirfoilProfile,
    twist_rad: f64,
    p_le: f64,
    arc_fraction: f64,
) -> BladeResult<f64> {
    let rotated: Vec<[f64; 2]> = profile
        .points
        .iter()
        .map(|p| {
            let (x, y) = crate::interp::rotate_point(p_le, 0.0, p[0], p[1], -twist_rad);
            [x, y]
        })
        .collect();
    let arc = crate::interp::arc_length(&rotated);
    let total = *arc.last().unwrap_or(&0.0);
    if total <= 0.0 {
        return Err(BladeError::internal("degenerate profile in arc mapping"));
    }
    let fractions: Vec<f64> = arc.iter().map(|v| v / total).collect();
    let xs: Vec<f64> = rotated.iter().map(|p| p[0]).collect();

    let le = profile.le_index();
    let le_fr = fractions[le];
    if arc_fraction <= le_fr {
        interp_linear(&fractions[..=le], &xs[..=le], arc_fraction)
    } else {
        interp_linear(&fractions[le..], &xs[le..], arc_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::linspace;
    use crate::ontology::FixedMidpoint;

    fn teardrop(n_half: usize, thickness: f64) -> AirfoilProfile {
        let mut points = Vec::new();
        for i in 0..=n_half {
            let x = 1.0 - i as f64 / n_half as f64;
            points.push([x, thickness * (x * (1.0 - x)).sqrt() * 2.0]);
        }
        for i in 1..=n_half {
            let x = i as f64 / n_half as f64;
            points.push([x, -thickness * (x * (1.0 - x)).sqrt() * 2.0]);
        }
        AirfoilProfile { points }
    }

    fn flat_planform(n: usize) -> Planform {
        Planform {
            s: linspace(0.0, 1.0, n),
            chord: vec![2.0; n],
            twist_deg: vec![0.0; n],
            p_le: vec![0.5; n],
            r: linspace(0.0, 60.0, n),
            precurve: vec![0.0; n],
            presweep: vec![0.0; n],
            rthick: vec![0.2; n],
        }
    }

    fn flat_family(n: usize) -> ProfileFamily {
        ProfileFamily {
            stations: vec![teardrop(100, 0.1); n],
        }
    }

    fn full_thickness() -> Option<GridValues> {
        Some(GridValues::new(vec![0.0, 1.0], vec![0.01, 0.01]))
    }

    #[test]
    fn test_lowering_detects_conventions() {
        let def = LayerDef {
            name: "spar".into(),
            rotation: Some(ScheduleOrRef::Fixed {
                fixed: "twist".into(),
            }),
            width: Some(GridValues::new(vec![0.0, 1.0], vec![0.5, 0.5])),
            offset_x_pa: Some(GridValues::new(vec![0.0, 1.0], vec![0.0, 0.0])),
            side: Some("pressure".into()),
            ..Default::default()
        };
        match lower_layer_placement(&def) {
            Placement::RotationOffset {
                rotation, side, ..
            } => {
                assert_eq!(rotation, RotationSpec::MatchTwist);
                assert_eq!(side, Side::Pressure);
            }
            other => panic!("wrong placement: {other:?}"),
        }

        let te = LayerDef {
            name: "te".into(),
            midpoint_nd_arc: Some(FixedMidpoint { fixed: "TE".into() }),
            width: Some(GridValues::new(vec![0.0, 1.0], vec![0.3, 0.3])),
            ..Default::default()
        };
        assert!(matches!(
            lower_layer_placement(&te),
            Placement::Midpoint {
                anchor: Anchor::TrailingEdge,
                ..
            }
        ));

        let skin = LayerDef {
            name: "skin".into(),
            ..Default::default()
        };
        assert!(matches!(
            lower_layer_placement(&skin),
            Placement::Bounds {
                start: None,
                end: None
            }
        ));
    }

    #[test]
    fn test_symmetric_axis_intersection() {
        let n = 5;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let geom = StationGeometry::new(&fam.stations[0], pf.chord[0], pf.p_le[0]);

        let ss = geom.axis_intersection(Side::Suction, 0.0, 0.0).unwrap();
        let ps = geom.axis_intersection(Side::Pressure, 0.0, 0.0).unwrap();
        // symmetric section, zero twist, mid-chord pitch axis: the two
        // crossings mirror about the leading edge
        assert!((ss + ps - 1.0).abs() < 1e-2, "ss={ss} ps={ps}");
        assert!(ss < geom.le_fraction());
        assert!(ps > geom.le_fraction());
    }

    #[test]
    fn test_width_layer_bounds_centered_on_axis() {
        let n = 5;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let structure = Structure {
            layers: vec![Layer {
                name: "spar_ss".into(),
                material: "ud".into(),
                thickness: full_thickness(),
                fiber_orientation: None,
                placement: Placement::RotationOffset {
                    rotation: RotationSpec::MatchTwist,
                    offset: GridValues::new(vec![0.0, 1.0], vec![0.0, 0.0]),
                    width: GridValues::new(vec![0.0, 1.0], vec![0.4, 0.4]),
                    side: Side::Suction,
                },
            }],
            webs: vec![],
        };
        let resolved =
            resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap();
        let layer = &resolved.layers[0];

        for i in 0..n {
            let s = layer.start_nd.get(i).unwrap();
            let e = layer.end_nd.get(i).unwrap();
            assert!(s < e);
            // width 0.4 m on a perimeter slightly over twice the chord
            let geom = StationGeometry::new(&fam.stations[i], pf.chord[i], pf.p_le[i]);
            assert!((e - s - 0.4 / geom.total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_oversized_width_is_clamped() {
        let n = 3;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let cfg = GeometryConfig::default();
        let structure = Structure {
            layers: vec![Layer {
                name: "wide".into(),
                material: "ud".into(),
                thickness: full_thickness(),
                fiber_orientation: None,
                placement: Placement::RotationOffset {
                    rotation: RotationSpec::MatchTwist,
                    offset: GridValues::new(vec![0.0, 1.0], vec![0.0, 0.0]),
                    // wider than the whole chord
                    width: GridValues::new(vec![0.0, 1.0], vec![5.0, 5.0]),
                    side: Side::Suction,
                },
            }],
            webs: vec![],
        };
        let resolved = resolve_bounds(&structure, &pf, &fam, &cfg).unwrap();
        let layer = &resolved.layers[0];

        let geom = StationGeometry::new(&fam.stations[0], pf.chord[0], pf.p_le[0]);
        let expect = 2.0 * cfg.max_chord_ratio * pf.chord[0] * 0.5 / geom.total;
        let got = layer.end_nd.get(0).unwrap() - layer.start_nd.get(0).unwrap();
        assert!((got - expect).abs() < 1e-9, "got {got}, expected {expect}");
    }

    #[test]
    fn test_te_midpoint_wraps_past_seam() {
        let n = 3;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let structure = Structure {
            layers: vec![Layer {
                name: "te_reinf".into(),
                material: "ud".into(),
                thickness: full_thickness(),
                fiber_orientation: None,
                placement: Placement::Midpoint {
                    anchor: Anchor::TrailingEdge,
                    width: GridValues::new(vec![0.0, 1.0], vec![0.5, 0.5]),
                },
            }],
            webs: vec![],
        };
        let resolved =
            resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap();
        let layer = &resolved.layers[0];
        let s = layer.start_nd.get(1).unwrap();
        let e = layer.end_nd.get(1).unwrap();
        assert!(s > 0.9, "start near the seam, got {s}");
        assert!(e < 0.1, "end wrapped past the seam, got {e}");
    }

    #[test]
    fn test_fixed_reference_copies_bit_for_bit() {
        let n = 5;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let structure = Structure {
            layers: vec![
                Layer {
                    name: "spar_ss".into(),
                    material: "ud".into(),
                    thickness: full_thickness(),
                    fiber_orientation: None,
                    placement: Placement::RotationOffset {
                        rotation: RotationSpec::MatchTwist,
                        offset: GridValues::new(vec![0.0, 1.0], vec![0.1, 0.1]),
                        width: GridValues::new(vec![0.0, 1.0], vec![0.4, 0.4]),
                        side: Side::Suction,
                    },
                },
                Layer {
                    name: "panel".into(),
                    material: "core".into(),
                    thickness: full_thickness(),
                    fiber_orientation: None,
                    placement: Placement::Bounds {
                        start: Some(BoundSpec::FixedToLayer("spar_ss".into())),
                        end: Some(BoundSpec::FixedTe),
                    },
                },
            ],
            webs: vec![],
        };
        let resolved =
            resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap();
        let spar = resolved.layer("spar_ss").unwrap();
        let panel = resolved.layer("panel").unwrap();
        for i in 0..n {
            assert_eq!(panel.start_nd.get(i), spar.end_nd.get(i));
            assert_eq!(panel.end_nd.get(i), Some(1.0));
        }
    }

    #[test]
    fn test_reference_cycle_is_fatal() {
        let n = 3;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let mk = |name: &str, other: &str| Layer {
            name: name.into(),
            material: "ud".into(),
            thickness: full_thickness(),
            fiber_orientation: None,
            placement: Placement::Bounds {
                start: Some(BoundSpec::FixedToLayer(other.into())),
                end: Some(BoundSpec::FixedTe),
            },
        };
        let structure = Structure {
            layers: vec![mk("a", "b"), mk("b", "a")],
            webs: vec![],
        };
        let err = resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap_err();
        assert!(matches!(err, BladeError::ReferenceCycle { .. }));
    }

    #[test]
    fn test_web_axis_straddles_leading_edge() {
        let n = 5;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let structure = Structure {
            layers: vec![],
            webs: vec![Web {
                name: "web_fore".into(),
                placement: Placement::RotationOffset {
                    rotation: RotationSpec::MatchTwist,
                    offset: GridValues::new(vec![0.2, 0.8], vec![-0.3, -0.3]),
                    width: GridValues::default(),
                    side: Side::Suction,
                },
            }],
        };
        let resolved =
            resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap();
        let web = &resolved.webs[0];
        assert!(web.start_nd.get(0).is_none(), "web inactive at the root");

        let i = 2; // s = 0.5, inside the web span
        let s = web.start_nd.get(i).unwrap();
        let e = web.end_nd.get(i).unwrap();
        assert!(s < resolved.le_nd[i] && resolved.le_nd[i] < e);
    }

    #[test]
    fn test_web_layer_inherits_web_bounds() {
        let n = 5;
        let pf = flat_planform(n);
        let fam = flat_family(n);
        let structure = Structure {
            layers: vec![Layer {
                name: "web_skin".into(),
                material: "biax".into(),
                thickness: full_thickness(),
                fiber_orientation: None,
                placement: Placement::Web("web_fore".into()),
            }],
            webs: vec![Web {
                name: "web_fore".into(),
                placement: Placement::RotationOffset {
                    rotation: RotationSpec::MatchTwist,
                    offset: GridValues::new(vec![0.0, 1.0], vec![-0.2, -0.2]),
                    width: GridValues::default(),
                    side: Side::Suction,
                },
            }],
        };
        let resolved =
            resolve_bounds(&structure, &pf, &fam, &GeometryConfig::default()).unwrap();
        let layer = resolved.layer("web_skin").unwrap();
        let web = resolved.web("web_fore").unwrap();
        for i in 0..n {
            assert_eq!(layer.start_nd.get(i), web.start_nd.get(i));
            assert_eq!(layer.end_nd.get(i), web.end_nd.get(i));
        }
    }

    #[test]
    fn test_harvest_snaps_schedule_endpoints() {
        let cfg = GeometryConfig {
            snap_tol: 1e-4,
            ..Default::default()
        };
        let mut req = RequiredPoints::new(&cfg);
        req.insert(0.0);
        req.insert(1.0);
        req.insert(0.3);

        let mut structure = Structure {
            layers: vec![Layer {
                name: "spar".into(),
                material: "ud".into(),
                thickness: Some(GridValues::new(
                    vec![0.30001, 0.9],
                    vec![0.04, 0.01],
                )),
                fiber_orientation: None,
                placement: Placement::Bounds {
                    start: None,
                    end: None,
                },
            }],
            webs: vec![],
        };
        structure.harvest_span_points(&mut req);
        let gv = structure.layers[0].thickness.as_ref().unwrap();
        assert_eq!(gv.grid[0], 0.3, "endpoint must snap onto the grid point");
        assert_eq!(req.len(), 4); // 0, 0.3, 0.9, 1
    }

    #[test]
    fn test_arc_to_chordwise_le_maps_to_zero() {
        let profile = teardrop(100, 0.1);
        let le_fr = profile.le_fraction();
        let x = arc_to_chordwise(&profile, 0.0, 0.0, le_fr).unwrap();
        assert!(x.abs() < 1e-6);
        let x_te = arc_to_chordwise(&profile, 0.0, 0.0, 0.0).unwrap();
        assert!((x_te - 1.0).abs() < 1e-6);
    }
}
