//! Delaunay triangulation of scattered 2D points (Bowyer-Watson).
//!
//! Backs the linear height-map interpolation and the triangulated contour
//! renderer. Points are (x, y) pairs in whatever planar space the caller
//! uses; raster synthesis passes (lon, lat).

/// A triangulation over an owned copy of the input points.
pub struct Triangulation {
    pub points: Vec<(f64, f64)>,
    /// Vertex indices into `points`, counter-clockwise.
    pub triangles: Vec<[usize; 3]>,
}

/// Signed double area of triangle abc; positive when counter-clockwise.
fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// True if `p` lies strictly inside the circumcircle of ccw triangle abc.
fn in_circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let (ax, ay) = (a.0 - p.0, a.1 - p.1);
    let (bx, by) = (b.0 - p.0, b.1 - p.1);
    let (cx, cy) = (c.0 - p.0, c.1 - p.1);

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

/// Triangulate `points`. Exact duplicate points must be removed by the
/// caller; fewer than 3 points yields an empty triangle list.
pub fn triangulate(points: &[(f64, f64)]) -> Triangulation {
    let n = points.len();
    if n < 3 {
        return Triangulation {
            points: points.to_vec(),
            triangles: Vec::new(),
        };
    }

    // Working copy with a super-triangle appended that encloses everything.
    let mut verts = points.to_vec();
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(f64::MIN_POSITIVE);
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;
    verts.push((mid_x - 20.0 * span, mid_y - span));
    verts.push((mid_x + 20.0 * span, mid_y - span));
    verts.push((mid_x, mid_y + 20.0 * span));

    let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for point_idx in 0..n {
        let p = verts[point_idx];

        // Triangles whose circumcircle swallows the new point.
        let mut bad = Vec::new();
        for (t_idx, t) in triangles.iter().enumerate() {
            if in_circumcircle(verts[t[0]], verts[t[1]], verts[t[2]], p) {
                bad.push(t_idx);
            }
        }

        // Boundary of the cavity: edges used by exactly one bad triangle.
        let mut edges: Vec<(usize, usize, bool)> = Vec::new(); // (a, b, shared)
        for &t_idx in &bad {
            let t = triangles[t_idx];
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                match edges
                    .iter_mut()
                    .find(|(ea, eb, _)| (*ea == b && *eb == a) || (*ea == a && *eb == b))
                {
                    Some(edge) => edge.2 = true,
                    None => edges.push((a, b, false)),
                }
            }
        }

        for &t_idx in bad.iter().rev() {
            triangles.swap_remove(t_idx);
        }

        // Re-triangulate the cavity around the new point, keeping ccw order.
        for (a, b, shared) in edges {
            if shared {
                continue;
            }
            let tri = if orient(verts[a], verts[b], p) > 0.0 {
                [a, b, point_idx]
            } else {
                [b, a, point_idx]
            };
            triangles.push(tri);
        }
    }

    // Drop every triangle that touches the super-triangle.
    triangles.retain(|t| t.iter().all(|&v| v < n));

    Triangulation {
        points: points.to_vec(),
        triangles,
    }
}

impl Triangulation {
    /// Barycentric weights of `p` in triangle `tri`; weights are all in
    /// [0, 1] (within `eps`) exactly when `p` lies inside the triangle.
    pub fn barycentric(&self, tri: [usize; 3], p: (f64, f64)) -> [f64; 3] {
        let a = self.points[tri[0]];
        let b = self.points[tri[1]];
        let c = self.points[tri[2]];
        let area = orient(a, b, c);
        if area == 0.0 {
            return [f64::NAN; 3];
        }
        let w0 = orient(b, c, p) / area;
        let w1 = orient(c, a, p) / area;
        let w2 = orient(a, b, p) / area;
        [w0, w1, w2]
    }
}
