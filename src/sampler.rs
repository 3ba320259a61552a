//! Geodesic grid sampler.
//!
//! Turns a bounding box and a real-world spacing into a deterministic grid of
//! sample points. Distances are measured along WGS84 geodesics, not in degree
//! space, so the grid is metrically even regardless of latitude.

use geo::{Bearing, Contains, Coord, Destination, Distance, Geodesic, LineString, Point, Polygon};

use crate::coords::{GeoBoundingBox, SamplePoint};

/// Points along one geodesic edge, stepped every `spacing_m` meters with the
/// final step clamped to the edge's true length. Yields the point and its
/// cumulative arc length from `start`.
fn walk_edge(start: Point, end: Point, spacing_m: f64) -> Vec<(Point, f64)> {
    let edge_len = Geodesic.distance(start, end);
    let bearing = Geodesic.bearing(start, end);
    let count = (edge_len / spacing_m).ceil() as usize;

    let mut points = Vec::with_capacity(count + 1);
    for i in 0..=count {
        let s = (spacing_m * i as f64).min(edge_len);
        points.push((Geodesic.destination(start, bearing, s), s));
    }
    points
}

/// Generate the sample grid for `bbox` with `spacing_m` meters between
/// neighboring points.
///
/// The box's north edge is walked west to east; from each edge point a column
/// is walked south to the box's south latitude. Each emitted point carries its
/// arc length along the north edge (`x_offset_m`) and down its column
/// (`y_offset_m`).
///
/// If `clip_polygon` is given as a list of `(lat, lon)` vertices, only points
/// strictly inside the polygon are retained.
pub fn generate_grid(
    bbox: &GeoBoundingBox,
    spacing_m: f64,
    clip_polygon: Option<&[(f64, f64)]>,
) -> Vec<SamplePoint> {
    let nw = Point::new(bbox.nw.1, bbox.nw.0);
    let ne = Point::new(bbox.se.1, bbox.nw.0);

    let polygon = clip_polygon.map(|vertices| {
        let ring: Vec<Coord> = vertices
            .iter()
            .map(|&(lat, lon)| Coord { x: lon, y: lat })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    });

    let mut output = Vec::new();
    for (top, x_offset_m) in walk_edge(nw, ne, spacing_m) {
        let bottom = Point::new(top.x(), bbox.se.0);
        for (pt, y_offset_m) in walk_edge(top, bottom, spacing_m) {
            if let Some(poly) = &polygon {
                if !poly.contains(&pt) {
                    continue;
                }
            }
            output.push(SamplePoint {
                lat: pt.y(),
                lon: pt.x(),
                x_offset_m,
                y_offset_m,
            });
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bbox() -> GeoBoundingBox {
        GeoBoundingBox::new((35.6425, -82.5587), (35.6401, -82.5544)).unwrap()
    }

    #[test]
    fn test_edge_point_count() {
        let nw = Point::new(-82.5587, 35.6425);
        let ne = Point::new(-82.5544, 35.6425);
        let edge_len = Geodesic.distance(nw, ne);
        let spacing = 5.0;

        let pts = walk_edge(nw, ne, spacing);
        assert_eq!(pts.len(), (edge_len / spacing).ceil() as usize + 1);

        // No offset past the true edge length; the last lands exactly on it.
        for (_, s) in &pts {
            assert!(*s <= edge_len);
        }
        assert!((pts.last().unwrap().1 - edge_len).abs() < 1e-9);
    }

    #[test]
    fn test_grid_covers_box() {
        let bbox = test_bbox();
        let grid = generate_grid(&bbox, 5.0, None);

        // The demo box is roughly 390m x 265m at 5m spacing: many rows and
        // columns, every point inside the box (with a hair of slack for
        // geodesic/loxodrome divergence at the edges).
        assert!(grid.len() > 100);
        let columns = grid.iter().filter(|p| p.y_offset_m == 0.0).count();
        assert!(columns > 1);
        assert!(grid.iter().any(|p| p.y_offset_m > 0.0));
        for p in &grid {
            assert!(p.lat <= bbox.nw.0 + 1e-6 && p.lat >= bbox.se.0 - 1e-6);
            assert!(p.lon >= bbox.nw.1 - 1e-6 && p.lon <= bbox.se.1 + 1e-6);
        }
    }

    #[test]
    fn test_grid_is_deterministic() {
        let bbox = test_bbox();
        let a = generate_grid(&bbox, 7.5, None);
        let b = generate_grid(&bbox, 7.5, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_polygon_clip_is_subset() {
        let bbox = test_bbox();
        // Triangle over the western half of the box.
        let polygon = [
            (35.6425, -82.5587),
            (35.6401, -82.5587),
            (35.6413, -82.5565),
        ];

        let full = generate_grid(&bbox, 10.0, None);
        let clipped = generate_grid(&bbox, 10.0, Some(&polygon));

        assert!(!clipped.is_empty());
        assert!(clipped.len() < full.len());
        for p in &clipped {
            assert!(full.contains(p));
        }

        // Membership agrees with a direct point-in-polygon test.
        let ring: Vec<Coord> = polygon.iter().map(|&(lat, lon)| Coord { x: lon, y: lat }).collect();
        let poly = Polygon::new(LineString::from(ring), vec![]);
        for p in &clipped {
            assert!(poly.contains(&Point::new(p.lon, p.lat)));
        }
    }
}
