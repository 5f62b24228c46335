//! Geometric fingerprints computed from tessellation.
//!
//! Fingerprints give subshapes a small geometric descriptor used to
//! re-identify them after rebuilds when topological lookup misses.

use std::collections::HashMap;

use arbor_kernel_math::{Point3, Vec3};
use arbor_kernel_tessellate::Mesh;
use arbor_kernel_topo::{EdgeId, FaceId};

/// Face descriptor: area-weighted centroid, total area, averaged normal.
#[derive(Debug, Clone, Copy)]
pub struct FaceFingerprint {
    /// Area-weighted centroid of the face's triangles.
    pub centroid: Point3,
    /// Total triangle area.
    pub size: f64,
    /// Normalized sum of triangle normals.
    pub normal: Vec3,
}

/// Edge descriptor: midpoint and length.
#[derive(Debug, Clone, Copy)]
pub struct EdgeFingerprint {
    /// Midpoint of the edge.
    pub midpoint: Point3,
    /// Straight-line length.
    pub length: f64,
}

/// Compute fingerprints for every face in the mesh.
pub fn face_fingerprints(mesh: &Mesh) -> HashMap<FaceId, FaceFingerprint> {
    struct Acc {
        weighted_centroid: Vec3,
        area: f64,
        normal: Vec3,
    }
    let mut acc: HashMap<FaceId, Acc> = HashMap::new();

    for (tri, &face_idx) in mesh.indices.chunks(3).zip(&mesh.face_map) {
        let p = |i: u32| -> Point3 {
            let o = i as usize * 3;
            Point3::new(
                mesh.positions[o] as f64,
                mesh.positions[o + 1] as f64,
                mesh.positions[o + 2] as f64,
            )
        };
        let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
        let cross = (b - a).cross(&(c - a));
        let area = cross.norm() * 0.5;
        let centroid = (a.coords + b.coords + c.coords) / 3.0;
        let face = mesh.faces[face_idx as usize];
        let entry = acc.entry(face).or_insert(Acc {
            weighted_centroid: Vec3::zeros(),
            area: 0.0,
            normal: Vec3::zeros(),
        });
        entry.weighted_centroid += centroid * area;
        entry.area += area;
        entry.normal += cross * 0.5;
    }

    acc.into_iter()
        .map(|(face, a)| {
            let size = a.area.max(1e-30);
            (
                face,
                FaceFingerprint {
                    centroid: Point3::from(a.weighted_centroid / size),
                    size: a.area,
                    normal: if a.normal.norm() > 1e-30 {
                        a.normal.normalize()
                    } else {
                        Vec3::zeros()
                    },
                },
            )
        })
        .collect()
}

/// Compute fingerprints for every edge segment in the mesh.
pub fn edge_fingerprints(mesh: &Mesh) -> HashMap<EdgeId, EdgeFingerprint> {
    let mut out = HashMap::new();
    for (seg, &idx) in mesh.edges.chunks(6).zip(&mesh.edge_map) {
        let a = Point3::new(seg[0] as f64, seg[1] as f64, seg[2] as f64);
        let b = Point3::new(seg[3] as f64, seg[4] as f64, seg[5] as f64);
        out.insert(
            mesh.edge_handles[idx as usize],
            EdgeFingerprint {
                midpoint: Point3::from((a.coords + b.coords) * 0.5),
                length: (b - a).norm(),
            },
        );
    }
    out
}

/// Distance between two face fingerprints: centroid distance scaled by
/// size, plus a normal-deviation penalty.
pub fn fingerprint_distance(a: &FaceFingerprint, b: &FaceFingerprint) -> f64 {
    let scale = a.size.max(b.size).sqrt().max(1e-9);
    let centroid_term = (a.centroid - b.centroid).norm() / scale;
    let normal_term = 1.0 - a.normal.dot(&b.normal);
    centroid_term + normal_term
}
