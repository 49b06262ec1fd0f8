//! Vector export of a label raster
//!
//! Every 4-connected group of cells sharing one label becomes a polygon
//! (holes included) carrying the label as `segment_id` and an empty
//! `class` attribute, ready to be filled in by a classification step.

use anyhow::{Context, Result};
use geo::{Area, Coord, LineString, Orient, Polygon};
use geo::orient::Direction;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use ndarray::{Array2, ArrayView2};
use serde_json::Map;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use crate::config::VectorFormat;
use crate::geo_core::GeoTransform;
use crate::io::ensure_parent_dir;

/// One polygon of a segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPolygon {
    pub segment_id: i64,
    pub polygon: Polygon<f64>,
}

type Vertex = (i64, i64);

/// Unit step of a boundary edge, `(dx, dy)` with x along columns and y along rows
fn direction(from: Vertex, to: Vertex) -> Vertex {
    (to.0 - from.0, to.1 - from.1)
}

/// 4-connected components; returns the component index of each cell and
/// the label of each component, in raster scan order.
fn connected_components(
    labels: ArrayView2<'_, i64>,
    skip: Option<i64>,
) -> (Array2<usize>, Vec<i64>) {
    let (rows, cols) = labels.dim();
    let mut component = Array2::from_elem((rows, cols), usize::MAX);
    let mut component_labels = Vec::new();
    let mut queue = VecDeque::new();

    for r in 0..rows {
        for c in 0..cols {
            let label = labels[[r, c]];
            if component[[r, c]] != usize::MAX || skip == Some(label) {
                continue;
            }
            let k = component_labels.len();
            component_labels.push(label);
            component[[r, c]] = k;
            queue.push_back((r, c));
            while let Some((qr, qc)) = queue.pop_front() {
                let neighbours = [
                    (qr.wrapping_sub(1), qc),
                    (qr + 1, qc),
                    (qr, qc.wrapping_sub(1)),
                    (qr, qc + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows
                        && nc < cols
                        && component[[nr, nc]] == usize::MAX
                        && labels[[nr, nc]] == label
                    {
                        component[[nr, nc]] = k;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }
    (component, component_labels)
}

/// Boundary edges of every component, oriented with the component on the left.
fn boundary_edges(component: ArrayView2<'_, usize>, n_components: usize) -> Vec<Vec<(Vertex, Vertex)>> {
    let (rows, cols) = component.dim();
    let mut edges = vec![Vec::new(); n_components];
    let outside = |r: isize, c: isize, k: usize| {
        r < 0 || c < 0 || r as usize >= rows || c as usize >= cols || component[[r as usize, c as usize]] != k
    };

    for ((r, c), &k) in component.indexed_iter() {
        if k == usize::MAX {
            continue;
        }
        let (ri, ci) = (r as isize, c as isize);
        let (x, y) = (c as i64, r as i64);
        if outside(ri - 1, ci, k) {
            edges[k].push(((x, y), (x + 1, y)));
        }
        if outside(ri, ci + 1, k) {
            edges[k].push(((x + 1, y), (x + 1, y + 1)));
        }
        if outside(ri + 1, ci, k) {
            edges[k].push(((x + 1, y + 1), (x, y + 1)));
        }
        if outside(ri, ci - 1, k) {
            edges[k].push(((x, y + 1), (x, y)));
        }
    }
    edges
}

/// Chain edges into closed rings. At a corner shared by two diagonal
/// cells the walk turns right, away from the interior, so a hole touching
/// the outline at one corner stays a ring of its own.
fn link_rings(edges: &[(Vertex, Vertex)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, &(from, _)) in edges.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let mut ring = vec![edges[first].0];
        let mut current = first;
        loop {
            let (from, to) = edges[current];
            ring.push(to);
            let heading = direction(from, to);
            let left = (-heading.1, heading.0);
            let right = (heading.1, -heading.0);
            let candidates: Vec<usize> = outgoing
                .get(&to)
                .map(|list| {
                    list.iter()
                        .copied()
                        .filter(|&e| e == first || !used[e])
                        .collect()
                })
                .unwrap_or_default();
            let next = [right, heading, left].iter().find_map(|&want| {
                candidates
                    .iter()
                    .copied()
                    .find(|&e| direction(edges[e].0, edges[e].1) == want)
            });
            match next {
                Some(e) if e == first => break,
                Some(e) => {
                    used[e] = true;
                    current = e;
                }
                None => break,
            }
        }
        rings.push(simplify_ring(ring));
    }
    rings
}

// Drop vertices in the middle of straight runs; the ring stays closed.
fn simplify_ring(ring: Vec<Vertex>) -> Vec<Vertex> {
    let open = &ring[..ring.len() - 1];
    let n = open.len();
    let mut kept: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = open[(i + n - 1) % n];
            let next = open[(i + 1) % n];
            direction(prev, open[i]) != direction(open[i], next)
        })
        .map(|i| open[i])
        .collect();
    if let Some(&start) = kept.first() {
        kept.push(start);
    }
    kept
}

/// Twice the signed area; positive for rings with the interior on the left
fn signed_area2(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

fn to_line_string(ring: &[Vertex], transform: Option<&GeoTransform>) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| {
            let (wx, wy) = match transform {
                Some(gt) => gt.apply(y as f64, x as f64),
                None => (x as f64, y as f64),
            };
            Coord { x: wx, y: wy }
        })
        .collect()
}

/// Polygons of every 4-connected group of equal labels, in raster scan
/// order of their first cell. Cells equal to `skip` produce no polygon.
///
/// Without a transform the coordinates are in pixel units, x along
/// columns and y along rows.
pub fn segment_polygons(
    labels: ArrayView2<'_, i64>,
    transform: Option<GeoTransform>,
    skip: Option<i64>,
) -> Vec<SegmentPolygon> {
    let (component, component_labels) = connected_components(labels, skip);
    let edges = boundary_edges(component.view(), component_labels.len());

    let mut polygons = Vec::new();
    for (k, component_edges) in edges.iter().enumerate() {
        let rings = link_rings(component_edges);
        let (mut outers, holes): (Vec<_>, Vec<_>) =
            rings.into_iter().partition(|ring| signed_area2(ring) > 0);
        // a 4-connected group has one outer ring
        outers.sort_by_key(|ring| std::cmp::Reverse(signed_area2(ring)));
        let mut outers = outers.into_iter();
        let Some(exterior) = outers.next() else {
            continue;
        };

        let interiors = holes
            .iter()
            .map(|ring| to_line_string(ring, transform.as_ref()))
            .collect();
        let polygon = Polygon::new(to_line_string(&exterior, transform.as_ref()), interiors);
        polygons.push(SegmentPolygon {
            segment_id: component_labels[k],
            polygon: polygon.orient(Direction::Default),
        });
        for extra in outers {
            tracing::warn!("Segment {} has a detached outer ring", component_labels[k]);
            polygons.push(SegmentPolygon {
                segment_id: component_labels[k],
                polygon: Polygon::new(to_line_string(&extra, transform.as_ref()), vec![])
                    .orient(Direction::Default),
            });
        }
    }
    polygons
}

fn segments_to_geojson(polygons: &[SegmentPolygon]) -> GeoJson {
    let features = polygons
        .iter()
        .map(|segment| {
            let geometry = Geometry::new(Value::from(&segment.polygon));
            let mut properties = Map::new();
            properties.insert("segment_id".to_string(), serde_json::json!(segment.segment_id));
            properties.insert("class".to_string(), serde_json::json!(""));
            let mut feature = Feature::from(geometry);
            feature.properties = Some(properties);
            feature
        })
        .collect();
    GeoJson::from(FeatureCollection {
        bbox: None,
        foreign_members: None,
        features,
    })
}

#[cfg(feature = "gdal")]
fn write_segments_with_gdal(
    polygons: &[SegmentPolygon],
    crs: Option<&str>,
    format: VectorFormat,
    output: &Path,
) -> Result<()> {
    use gdal::spatial_ref::SpatialRef;
    use gdal::vector::{FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal};
    use gdal::DriverManager;

    let driver = DriverManager::get_driver_by_name(format.driver_name())
        .with_context(|| format!("{} driver not available", format.driver_name()))?;
    if output.exists() {
        std::fs::remove_file(output)
            .with_context(|| format!("Failed to replace existing file {:?}", output))?;
    }
    let mut dataset = driver
        .create_vector_only(output)
        .with_context(|| format!("Failed to create {:?}", output))?;
    let srs = crs
        .map(SpatialRef::from_definition)
        .transpose()
        .context("Invalid spatial reference")?;
    let mut layer = dataset
        .create_layer(LayerOptions {
            name: "segments",
            srs: srs.as_ref(),
            ty: OGRwkbGeometryType::wkbPolygon,
            ..Default::default()
        })
        .context("Failed to create layer")?;
    layer
        .create_defn_fields(&[
            ("segment_id", OGRFieldType::OFTInteger64),
            ("class", OGRFieldType::OFTString),
        ])
        .context("Failed to create fields")?;

    for segment in polygons {
        let geometry = segment
            .polygon
            .to_gdal()
            .context("Failed to convert polygon geometry")?;
        layer
            .create_feature_fields(
                geometry,
                &["segment_id", "class"],
                &[
                    FieldValue::Integer64Value(segment.segment_id),
                    FieldValue::StringValue(String::new()),
                ],
            )
            .context("Failed to create feature in layer")?;
    }
    Ok(())
}

/// Polygonize `labels` and write one feature per polygon to `path`.
///
/// GeoJSON is always available; GeoPackage and Shapefile go through GDAL,
/// which also records `crs` in the layer. Returns the feature count.
pub fn export_segments_vector<P: AsRef<Path>>(
    labels: ArrayView2<'_, i64>,
    transform: Option<GeoTransform>,
    crs: Option<&str>,
    path: P,
    format: VectorFormat,
) -> Result<usize> {
    let path = path.as_ref();
    let polygons = segment_polygons(labels, transform, None);
    tracing::info!("Exporting {} segment polygons to {:?}", polygons.len(), path);
    ensure_parent_dir(path)?;

    match format {
        VectorFormat::GeoJson => {
            let _ = crs;
            std::fs::write(path, segments_to_geojson(&polygons).to_string())
                .with_context(|| format!("Failed to write GeoJSON file: {:?}", path))?;
        }
        #[cfg(feature = "gdal")]
        format => write_segments_with_gdal(&polygons, crs, format, path)?,
        #[cfg(not(feature = "gdal"))]
        format => anyhow::bail!(
            "Writing {} requires the 'gdal' feature; use the geojson format instead",
            format.driver_name()
        ),
    }
    Ok(polygons.len())
}

/// Total area of the polygons of `segment_id`
pub fn segment_area(polygons: &[SegmentPolygon], segment_id: i64) -> f64 {
    polygons
        .iter()
        .filter(|p| p.segment_id == segment_id)
        .map(|p| p.polygon.unsigned_area())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::BoundingRect;
    use ndarray::array;

    #[test]
    fn test_two_segments() {
        let labels = array![[1i64, 1, 2], [1, 1, 2]];
        let polygons = segment_polygons(labels.view(), None, None);
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].segment_id, 1);
        assert_eq!(polygons[1].segment_id, 2);
        assert_eq!(polygons[0].polygon.unsigned_area(), 4.0);
        assert_eq!(polygons[1].polygon.unsigned_area(), 2.0);
        // straight runs collapse to the four corners
        assert_eq!(polygons[0].polygon.exterior().0.len(), 5);
    }

    #[test]
    fn test_hole_is_kept() {
        let labels = array![[1i64, 1, 1], [1, 2, 1], [1, 1, 1]];
        let polygons = segment_polygons(labels.view(), None, None);
        assert_eq!(polygons.len(), 2);
        let ring = &polygons[0];
        assert_eq!(ring.segment_id, 1);
        assert_eq!(ring.polygon.interiors().len(), 1);
        assert_eq!(ring.polygon.unsigned_area(), 8.0);
        assert_eq!(segment_area(&polygons, 2), 1.0);
    }

    #[test]
    fn test_diagonal_cells_are_separate() {
        let labels = array![[1i64, 0], [0, 1]];
        let polygons = segment_polygons(labels.view(), None, None);
        assert_eq!(polygons.len(), 4);
        assert_eq!(polygons.iter().filter(|p| p.segment_id == 1).count(), 2);
        assert!(polygons.iter().all(|p| p.polygon.unsigned_area() == 1.0));
    }

    #[test]
    fn test_ring_touching_itself_at_a_corner() {
        // the 0 inside touches the outside 0s only diagonally
        let labels = array![
            [1i64, 1, 1, 0],
            [1, 0, 1, 0],
            [1, 1, 0, 0],
        ];
        let polygons = segment_polygons(labels.view(), None, Some(0));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].polygon.interiors().len(), 1);
        assert_eq!(polygons[0].polygon.unsigned_area(), 7.0);
    }

    #[test]
    fn test_skip_label() {
        let labels = array![[0i64, 3], [0, 3]];
        let polygons = segment_polygons(labels.view(), None, Some(0));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].segment_id, 3);
    }

    #[test]
    fn test_georeferenced_coordinates() {
        let labels = array![[5i64]];
        let gt = GeoTransform::north_up(100.0, 50.0, 2.0, 2.0);
        let polygons = segment_polygons(labels.view(), Some(gt), None);
        let rect = polygons[0].polygon.bounding_rect().unwrap();
        assert_eq!(rect.min(), Coord { x: 100.0, y: 48.0 });
        assert_eq!(rect.max(), Coord { x: 102.0, y: 50.0 });
    }

    #[test]
    fn test_export_geojson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("segments.geojson");
        let labels = array![[1i64, 1, 2], [1, 1, 2]];
        let count =
            export_segments_vector(labels.view(), None, None, &path, VectorFormat::GeoJson).unwrap();
        assert_eq!(count, 2);

        let geojson: GeoJson = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        let GeoJson::FeatureCollection(fc) = geojson else {
            panic!("expected a feature collection");
        };
        let ids: Vec<_> = fc
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["segment_id"].clone())
            .collect();
        assert_eq!(ids, vec![serde_json::json!(1), serde_json::json!(2)]);
        assert_eq!(fc.features[0].properties.as_ref().unwrap()["class"], serde_json::json!(""));
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_gpkg_export_needs_gdal() {
        let dir = tempfile::tempdir().unwrap();
        let labels = array![[1i64]];
        let path = dir.path().join("segments.gpkg");
        assert!(export_segments_vector(labels.view(), None, None, &path, VectorFormat::GeoPackage).is_err());
    }
}
