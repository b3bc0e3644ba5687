use crate::types::CountyShape;
use anyhow::{Result, anyhow};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::collections::HashMap;

/// TopoJSON container: named geometry objects over a shared arc pool.
/// Quantized topologies carry a transform and delta-encoded arcs.
#[derive(Debug, Deserialize)]
pub struct Topology {
    pub transform: Option<Transform>,
    pub objects: HashMap<String, TopoGeometry>,
    pub arcs: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        #[serde(default)]
        id: Option<serde_json::Value>,
        arcs: Vec<Vec<i32>>,
    },
    MultiPolygon {
        #[serde(default)]
        id: Option<serde_json::Value>,
        arcs: Vec<Vec<Vec<i32>>>,
    },
    #[serde(other)]
    Other,
}

impl Topology {
    /// Extract the `counties` object as concrete county shapes.
    /// Geometries without a usable numeric id are skipped and counted.
    pub fn county_shapes(&self) -> Result<Vec<CountyShape>> {
        let object = self
            .objects
            .get("counties")
            .ok_or_else(|| anyhow!("Topology has no 'counties' object"))?;

        let arcs = self.decode_arcs();

        let geometries: &[TopoGeometry] = match object {
            TopoGeometry::GeometryCollection { geometries } => geometries,
            other => std::slice::from_ref(other),
        };

        let mut shapes = Vec::with_capacity(geometries.len());
        let mut skipped = 0usize;

        for geometry in geometries {
            match geometry {
                TopoGeometry::Polygon { id, arcs: rings } => match fips_of(id) {
                    Some(fips) => shapes.push(CountyShape {
                        fips,
                        geometry: MultiPolygon::new(vec![assemble_polygon(rings, &arcs)?]),
                    }),
                    None => skipped += 1,
                },
                TopoGeometry::MultiPolygon { id, arcs: polys } => match fips_of(id) {
                    Some(fips) => {
                        let polygons = polys
                            .iter()
                            .map(|rings| assemble_polygon(rings, &arcs))
                            .collect::<Result<Vec<_>>>()?;
                        shapes.push(CountyShape {
                            fips,
                            geometry: MultiPolygon::new(polygons),
                        });
                    }
                    None => skipped += 1,
                },
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            println!("Skipped {} county geometries without a usable id", skipped);
        }

        Ok(shapes)
    }

    /// Resolve the shared arc pool to absolute coordinates. Quantized arcs
    /// are delta-encoded: each position is a running sum pushed through the
    /// transform.
    fn decode_arcs(&self) -> Vec<Vec<Coord<f64>>> {
        self.arcs
            .iter()
            .map(|arc| match &self.transform {
                Some(t) => {
                    let mut x = 0.0;
                    let mut y = 0.0;
                    arc.iter()
                        .filter(|p| p.len() >= 2)
                        .map(|p| {
                            x += p[0];
                            y += p[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        })
                        .collect()
                }
                None => arc
                    .iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| Coord { x: p[0], y: p[1] })
                    .collect(),
            })
            .collect()
    }
}

fn fips_of(id: &Option<serde_json::Value>) -> Option<u32> {
    match id {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn assemble_polygon(rings: &[Vec<i32>], arcs: &[Vec<Coord<f64>>]) -> Result<Polygon<f64>> {
    let mut iter = rings.iter();
    let exterior = iter
        .next()
        .ok_or_else(|| anyhow!("Polygon geometry with no rings"))?;
    let exterior = LineString::new(assemble_ring(exterior, arcs)?);
    let interiors = iter
        .map(|ring| assemble_ring(ring, arcs).map(LineString::new))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Stitch a ring from arc indices. A negative index is the bitwise
/// complement of an arc to traverse in reverse; consecutive arcs share
/// their junction point, which is emitted only once.
fn assemble_ring(arc_ids: &[i32], arcs: &[Vec<Coord<f64>>]) -> Result<Vec<Coord<f64>>> {
    let mut points: Vec<Coord<f64>> = Vec::new();

    for &id in arc_ids {
        let (index, reversed) = if id >= 0 {
            (id as usize, false)
        } else {
            ((!id) as usize, true)
        };
        let arc = arcs
            .get(index)
            .ok_or_else(|| anyhow!("Arc index {} out of bounds ({} arcs)", id, arcs.len()))?;

        let mut segment = arc.clone();
        if reversed {
            segment.reverse();
        }
        if !points.is_empty() && !segment.is_empty() {
            segment.remove(0);
        }
        points.extend(segment);
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topology(value: serde_json::Value) -> Topology {
        serde_json::from_value(value).expect("valid topology")
    }

    #[test]
    fn decodes_quantized_arcs_through_transform() {
        let topo = topology(json!({
            "type": "Topology",
            "transform": { "scale": [0.5, 2.0], "translate": [10.0, 0.0] },
            "objects": {},
            "arcs": [[[0, 0], [2, 1], [2, -1]]]
        }));

        let arcs = topo.decode_arcs();
        assert_eq!(
            arcs[0],
            vec![
                Coord { x: 10.0, y: 0.0 },
                Coord { x: 11.0, y: 2.0 },
                Coord { x: 12.0, y: 0.0 },
            ]
        );
    }

    #[test]
    fn assembles_ring_from_forward_and_reversed_arcs() {
        let arcs = vec![
            vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 }],
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 0.0, y: 10.0 },
                Coord { x: 10.0, y: 10.0 },
                Coord { x: 10.0, y: 0.0 },
            ],
        ];

        // Arc 1 traversed in reverse closes the square back to the origin.
        let ring = assemble_ring(&[0, -2], &arcs).unwrap();
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[2], Coord { x: 10.0, y: 10.0 });
    }

    #[test]
    fn junction_points_are_not_duplicated() {
        let arcs = vec![
            vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 5.0, y: 5.0 }],
            vec![Coord { x: 5.0, y: 5.0 }, Coord { x: 0.0, y: 0.0 }],
        ];
        let ring = assemble_ring(&[0, 1], &arcs).unwrap();
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn extracts_county_shapes_and_skips_missing_ids() {
        let topo = topology(json!({
            "type": "Topology",
            "objects": {
                "counties": {
                    "type": "GeometryCollection",
                    "geometries": [
                        { "type": "Polygon", "id": 1001, "arcs": [[0]] },
                        { "type": "Polygon", "arcs": [[0]] }
                    ]
                }
            },
            "arcs": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]
        }));

        let shapes = topo.county_shapes().unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].fips, 1001);
        assert_eq!(shapes[0].geometry.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn missing_counties_object_is_an_error() {
        let topo = topology(json!({
            "type": "Topology",
            "objects": {},
            "arcs": []
        }));
        assert!(topo.county_shapes().is_err());
    }
}
