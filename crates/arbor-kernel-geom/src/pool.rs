//! Append-only geometry pools.
//!
//! Surfaces and curves are stored once and referenced by branded index so
//! many topology entities can share a single geometry record (every face
//! of a planar body may point at the same plane). Pools never remove or
//! relocate entries; indices stay valid for the life of the model.

use crate::{Curve2, Curve3, Surface};

/// Index of a surface in the geometry pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceIndex(pub u32);

/// Index of a 3D curve in the geometry pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Curve3Index(pub u32);

/// Index of a 2D curve in the geometry pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Curve2Index(pub u32);

/// Index of a p-curve attachment in the geometry pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PCurveIndex(pub u32);

/// A 2D curve lying in the parameter space of a surface.
///
/// Used to parameterize an edge on a particular face.
#[derive(Debug, Clone, Copy)]
pub struct PCurve {
    /// The 2D curve in the surface's (u, v) space.
    pub curve: Curve2Index,
    /// The surface the curve is parameterized on.
    pub surface: SurfaceIndex,
}

/// Append-only storage for surfaces, curves and p-curve attachments.
#[derive(Debug, Clone, Default)]
pub struct GeometryPool {
    surfaces: Vec<Box<dyn Surface>>,
    curves3: Vec<Curve3>,
    curves2: Vec<Curve2>,
    pcurves: Vec<PCurve>,
}

impl GeometryPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface, returning its index.
    pub fn add_surface(&mut self, surface: Box<dyn Surface>) -> SurfaceIndex {
        let idx = SurfaceIndex(self.surfaces.len() as u32);
        self.surfaces.push(surface);
        idx
    }

    /// Add a 3D curve, returning its index.
    pub fn add_curve3(&mut self, curve: Curve3) -> Curve3Index {
        let idx = Curve3Index(self.curves3.len() as u32);
        self.curves3.push(curve);
        idx
    }

    /// Add a 2D curve, returning its index.
    pub fn add_curve2(&mut self, curve: Curve2) -> Curve2Index {
        let idx = Curve2Index(self.curves2.len() as u32);
        self.curves2.push(curve);
        idx
    }

    /// Add a p-curve attachment, returning its index.
    pub fn add_pcurve(&mut self, pcurve: PCurve) -> PCurveIndex {
        let idx = PCurveIndex(self.pcurves.len() as u32);
        self.pcurves.push(pcurve);
        idx
    }

    /// Look up a surface.
    pub fn surface(&self, idx: SurfaceIndex) -> &dyn Surface {
        self.surfaces[idx.0 as usize].as_ref()
    }

    /// Look up a 3D curve.
    pub fn curve3(&self, idx: Curve3Index) -> &Curve3 {
        &self.curves3[idx.0 as usize]
    }

    /// Look up a 2D curve.
    pub fn curve2(&self, idx: Curve2Index) -> &Curve2 {
        &self.curves2[idx.0 as usize]
    }

    /// Look up a p-curve attachment.
    pub fn pcurve(&self, idx: PCurveIndex) -> PCurve {
        self.pcurves[idx.0 as usize]
    }

    /// Number of surfaces in the pool.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Number of 3D curves in the pool.
    pub fn curve3_count(&self) -> usize {
        self.curves3.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plane;
    use arbor_kernel_math::{Point2, Point3};

    #[test]
    fn test_pool_indices_stable() {
        let mut pool = GeometryPool::new();
        let s0 = pool.add_surface(Box::new(Plane::xy()));
        let s1 = pool.add_surface(Box::new(Plane::yz()));
        assert_eq!(s0, SurfaceIndex(0));
        assert_eq!(s1, SurfaceIndex(1));

        let c = pool.add_curve2(Curve2::Line {
            p0: Point2::new(0.0, 0.0),
            p1: Point2::new(1.0, 0.0),
        });
        let pc = pool.add_pcurve(PCurve {
            curve: c,
            surface: s0,
        });
        assert_eq!(pool.pcurve(pc).surface, s0);
        assert_eq!(pool.surface_count(), 2);
    }

    #[test]
    fn test_shared_surface_lookup() {
        let mut pool = GeometryPool::new();
        let s = pool.add_surface(Box::new(Plane::xy()));
        // Many "faces" can share this surface; lookup evaluates the same plane
        let p = pool.surface(s).evaluate(Point2::new(2.0, 3.0));
        assert!((p - Point3::new(2.0, 3.0, 0.0)).norm() < 1e-12);
    }
}
