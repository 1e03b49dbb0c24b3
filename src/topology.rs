//! TopoJSON decoding: shared arcs are resolved into standalone county polygons.

use crate::error::MapError;
use crate::types::RegionShape;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Raw boundary payload as fetched. Object collections stay untyped until a
/// specific one is decoded, so unrelated objects (states, nation) can't fail
/// the load.
#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub transform: Option<Transform>,
    pub arcs: Vec<Vec<Vec<f64>>>,
    pub objects: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    id: Option<FeatureId>,
    #[serde(default)]
    arcs: Option<serde_json::Value>,
    #[serde(default)]
    geometries: Option<Vec<RawGeometry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureId {
    Number(u64),
    Text(String),
}

impl FeatureId {
    fn to_fips(&self) -> Option<u32> {
        match self {
            FeatureId::Number(n) => u32::try_from(*n).ok(),
            FeatureId::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Decodes every geometry of the object collection `object_name` into a region
/// shape, in payload order.
pub fn decode(topology: &Topology, object_name: &str) -> Result<Vec<RegionShape>, MapError> {
    if topology.kind != "Topology" {
        return Err(MapError::decode(format!(
            "expected a Topology payload, got type {:?}",
            topology.kind
        )));
    }

    let object = topology
        .objects
        .get(object_name)
        .ok_or_else(|| MapError::decode(format!("topology has no object named {:?}", object_name)))?;

    let collection: RawGeometry = serde_json::from_value(object.clone())
        .map_err(|e| MapError::decode(format!("object {:?} is malformed: {}", object_name, e)))?;

    let geometries = match (collection.kind.as_deref(), collection.geometries) {
        (Some("GeometryCollection"), Some(geometries)) => geometries,
        (kind, _) => {
            return Err(MapError::decode(format!(
                "object {:?} must be a GeometryCollection, got {:?}",
                object_name, kind
            )))
        }
    };

    let arcs = decode_arcs(topology)?;
    let mut shapes = Vec::with_capacity(geometries.len());

    for (position, geometry) in geometries.into_iter().enumerate() {
        let kind = match geometry.kind.as_deref() {
            Some(kind) => kind,
            None => {
                debug!("Skipping null geometry at position {}", position);
                continue;
            }
        };

        let id = geometry
            .id
            .as_ref()
            .ok_or_else(|| MapError::decode(format!("geometry at position {} has no id", position)))?;
        let id = id
            .to_fips()
            .ok_or_else(|| MapError::decode(format!("geometry at position {} has a non-numeric id {:?}", position, id)))?;

        let polygons = match kind {
            "Polygon" => {
                let rings: Vec<Vec<i64>> = arc_refs(&geometry.arcs, id)?;
                polygon(&rings, &arcs)?.into_iter().collect()
            }
            "MultiPolygon" => {
                let parts: Vec<Vec<Vec<i64>>> = arc_refs(&geometry.arcs, id)?;
                let mut polygons = Vec::with_capacity(parts.len());
                for rings in &parts {
                    polygons.extend(polygon(rings, &arcs)?);
                }
                polygons
            }
            other => {
                return Err(MapError::decode(format!(
                    "geometry {} is a {}, expected Polygon or MultiPolygon",
                    id, other
                )))
            }
        };

        shapes.push(RegionShape {
            id,
            geometry: MultiPolygon::new(polygons),
        });
    }

    debug!("Decoded {} region shapes from {:?}", shapes.len(), object_name);
    Ok(shapes)
}

fn arc_refs<T: serde::de::DeserializeOwned>(
    arcs: &Option<serde_json::Value>,
    id: u32,
) -> Result<T, MapError> {
    let value = arcs
        .as_ref()
        .ok_or_else(|| MapError::decode(format!("geometry {} has no arcs", id)))?;
    serde_json::from_value(value.clone())
        .map_err(|e| MapError::decode(format!("geometry {} has malformed arcs: {}", id, e)))
}

/// Resolves every arc to absolute coordinates, undoing quantization and delta
/// encoding when the topology carries a transform.
fn decode_arcs(topology: &Topology) -> Result<Vec<Vec<Coord<f64>>>, MapError> {
    topology
        .arcs
        .iter()
        .enumerate()
        .map(|(arc_index, arc)| {
            let (mut x, mut y) = (0.0, 0.0);
            arc.iter()
                .map(|position| {
                    if position.len() < 2 {
                        return Err(MapError::decode(format!(
                            "arc {} has a position with {} coordinates",
                            arc_index,
                            position.len()
                        )));
                    }
                    Ok(match &topology.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        }
                        None => Coord { x: position[0], y: position[1] },
                    })
                })
                .collect()
        })
        .collect()
}

fn polygon(rings: &[Vec<i64>], arcs: &[Vec<Coord<f64>>]) -> Result<Option<Polygon<f64>>, MapError> {
    let mut rings = rings.iter().map(|r| ring(r, arcs));
    let exterior = match rings.next() {
        Some(exterior) => exterior?,
        None => return Ok(None),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Polygon::new(exterior, interiors)))
}

/// Stitches arcs into one ring. A negative index `~i` walks arc `i` backwards,
/// and consecutive arcs share their joint point.
fn ring(refs: &[i64], arcs: &[Vec<Coord<f64>>]) -> Result<LineString<f64>, MapError> {
    let mut points: Vec<Coord<f64>> = Vec::new();

    for &arc_ref in refs {
        let (index, reversed) = if arc_ref < 0 { (!arc_ref, true) } else { (arc_ref, false) };
        let arc = usize::try_from(index)
            .ok()
            .and_then(|i| arcs.get(i))
            .ok_or_else(|| MapError::decode(format!("arc index {} out of range ({} arcs)", arc_ref, arcs.len())))?;

        points.pop();
        if reversed {
            points.extend(arc.iter().rev());
        } else {
            points.extend(arc.iter());
        }
    }

    let first = *points
        .first()
        .ok_or_else(|| MapError::decode("ring references no coordinates"))?;
    while points.len() < 4 {
        points.push(first);
    }

    Ok(LineString::new(points))
}
